// src/cleaning/validators.rs

//! Required-field validation for cleaned records.
//!
//! Validation failures are fatal for the record: they are surfaced to the
//! caller immediately and never retried.

use crate::error::{AppError, Result};
use crate::models::{Company, Deal, TeamMember};

/// A cleaned company must have a usable name and at least one piece of
/// substance beyond it.
pub fn validate_company(company: &Company) -> Result<()> {
    if company.name.len() < 2 {
        return Err(AppError::validation(format!(
            "company name too short: '{}'",
            company.name
        )));
    }

    let has_info = company.website.is_some()
        || company.description.is_some()
        || company.funding_amount.is_some()
        || company
            .sector
            .as_deref()
            .is_some_and(|s| s != "Uncategorized");
    if !has_info {
        return Err(AppError::validation(format!(
            "company '{}' has no supporting fields",
            company.name
        )));
    }

    Ok(())
}

/// A cleaned member needs a plausible name.
pub fn validate_member(member: &TeamMember) -> Result<()> {
    if member.name.len() < 2 {
        return Err(AppError::validation(format!(
            "member name too short: '{}'",
            member.name
        )));
    }
    Ok(())
}

/// A cleaned deal needs its natural key plus funding substance.
pub fn validate_deal(deal: &Deal) -> Result<()> {
    if deal.startup_name.is_empty() {
        return Err(AppError::validation("deal missing startup name"));
    }
    if deal.source_article_url.is_empty() {
        return Err(AppError::validation(format!(
            "deal '{}' missing source article",
            deal.startup_name
        )));
    }
    if deal.funding_amount.is_none() && deal.funding_amount_description.is_none() {
        return Err(AppError::validation(format!(
            "deal '{}' missing funding information",
            deal.startup_name
        )));
    }
    if deal.round_type.is_none() {
        return Err(AppError::validation(format!(
            "deal '{}' missing round type",
            deal.startup_name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_needs_substance() {
        let bare = Company {
            name: "Acme".into(),
            sector: Some("Uncategorized".into()),
            ..Company::default()
        };
        assert!(validate_company(&bare).is_err());

        let with_site = Company {
            website: Some("https://acme.example".into()),
            ..bare
        };
        assert!(validate_company(&with_site).is_ok());
    }

    #[test]
    fn test_member_name_length() {
        let short = TeamMember {
            name: "J".into(),
            ..TeamMember::default()
        };
        assert!(validate_member(&short).is_err());

        let ok = TeamMember {
            name: "Jane Doe".into(),
            ..TeamMember::default()
        };
        assert!(validate_member(&ok).is_ok());
    }

    #[test]
    fn test_deal_requires_funding_and_round() {
        let mut deal = Deal {
            startup_name: "Rocketly".into(),
            source_article_url: "https://news.example/a1".into(),
            ..Deal::default()
        };
        assert!(validate_deal(&deal).is_err());

        deal.funding_amount_description = Some("$5M".into());
        assert!(validate_deal(&deal).is_err());

        deal.round_type = Some("Seed".into());
        assert!(validate_deal(&deal).is_ok());
    }
}
