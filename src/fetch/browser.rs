// src/fetch/browser.rs

//! Browser-rendering transport using chromiumoxide.
//!
//! The browser process is launched lazily on first use and reused for the
//! lifetime of the transport. Each fetch renders in a fresh page.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::Mutex;

use super::transport::{Transport, TransportKind};
use super::FetchRequest;
use crate::config::FetchConfig;
use crate::error::FetchError;

/// Full-rendering transport for JavaScript-heavy sites.
pub struct BrowserTransport {
    user_agent: String,
    timeout: Duration,
    selector_wait: Duration,
    executable: Option<String>,
    browser: Mutex<Option<Browser>>,
}

impl BrowserTransport {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.browser_timeout_secs),
            selector_wait: Duration::from_secs(config.selector_wait_secs),
            executable: config.browser_executable.clone(),
            browser: Mutex::new(None),
        }
    }

    async fn launch(&self) -> Result<Browser, FetchError> {
        let mut builder = BrowserConfig::builder()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", self.user_agent));
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| FetchError::Render(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Render(format!("browser launch: {e}")))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        log::info!("Launched headless browser");
        Ok(browser)
    }

    async fn render(&self, page: &Page, request: &FetchRequest) -> Result<String, FetchError> {
        let timeout = request.timeout_override.unwrap_or(self.timeout);

        match tokio::time::timeout(timeout, page.goto(request.url.as_str())).await {
            Err(_) => return Err(FetchError::Timeout(timeout)),
            Ok(Err(e)) => return Err(FetchError::Render(format!("navigation: {e}"))),
            Ok(Ok(_)) => {}
        }
        let _ = page.wait_for_navigation().await;

        if let Some(selector) = &request.wait_selector {
            self.wait_for_selector(page, selector).await;
        }

        let value = page
            .evaluate("document.documentElement.outerHTML")
            .await
            .map_err(|e| FetchError::Render(format!("content read: {e}")))?;
        value
            .into_value::<String>()
            .map_err(|e| FetchError::Render(format!("content decode: {e:?}")))
    }

    /// Best-effort readiness wait; a missing selector never fails the fetch.
    async fn wait_for_selector(&self, page: &Page, selector: &str) {
        let deadline = Instant::now() + self.selector_wait;
        loop {
            if page.find_element(selector).await.is_ok() {
                return;
            }
            if Instant::now() >= deadline {
                log::warn!(
                    "Timed out waiting for selector '{}' after {:?}; continuing",
                    selector,
                    self.selector_wait
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

#[async_trait]
impl Transport for BrowserTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Browser
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<String, FetchError> {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        let Some(browser) = guard.as_ref() else {
            return Err(FetchError::Render("browser unavailable".into()));
        };

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Render(format!("new page: {e}")))?;
        drop(guard);

        let result = self.render(&page, request).await;
        let _ = page.close().await;
        result
    }
}
