//! Shared browser behind the [`PageLoader`] interface
//!
//! One Chrome process serves every scrape attempt; each attempt gets its own
//! fresh tab. The browser is launched lazily and health-checked on every page
//! request, so a crashed Chrome is replaced transparently.
//!
//! The lock is a `tokio::sync::Mutex` because it is held across CDP calls.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::BrowserConfig;
use crate::browser::{BrowserError, BrowserWrapper, launch_browser};
use crate::error::PageError;
use crate::page::{BrowserPage, PageLoader, ProductPage};

pub struct BrowserManager {
    config: BrowserConfig,
    browser: Arc<Mutex<Option<BrowserWrapper>>>,
}

impl BrowserManager {
    /// Manager for `config`; nothing is launched until the first page request
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            browser: Arc::new(Mutex::new(None)),
        }
    }

    fn user_data_dir(&self) -> PathBuf {
        std::env::temp_dir().join(format!(
            "kodegen_product_scraper_{}_{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ))
    }

    /// Open a blank tab, launching or relaunching Chrome as needed
    async fn open_tab(&self) -> Result<chromiumoxide::Page, BrowserError> {
        let mut guard = self.browser.lock().await;

        let health = match guard.as_ref() {
            Some(wrapper) => Some(wrapper.browser().version().await.map(|_| ())),
            None => None,
        };
        match health {
            Some(Ok(())) => debug!("Browser health check passed"),
            Some(Err(e)) => {
                warn!("Browser health check failed: {}. Relaunching", e);
                if let Some(crashed) = guard.take() {
                    crashed.close().await;
                }
            }
            None => {}
        }

        if guard.is_none() {
            info!("Launching browser");
            let (browser, handler, dir) = launch_browser(&self.config, self.user_data_dir()).await?;
            *guard = Some(BrowserWrapper::new(browser, handler, dir));
        }

        let wrapper = guard
            .as_ref()
            .ok_or_else(|| BrowserError::LaunchFailed("browser not available".to_string()))?;

        wrapper
            .browser()
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))
    }

    pub async fn is_browser_running(&self) -> bool {
        self.browser.lock().await.is_some()
    }

    /// Close Chrome and remove its profile directory. Safe to call repeatedly.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        if let Some(wrapper) = self.browser.lock().await.take() {
            info!("Shutting down browser");
            wrapper.close().await;
        }
        Ok(())
    }
}

#[async_trait]
impl PageLoader for BrowserManager {
    async fn new_page(&self) -> Result<Box<dyn ProductPage>, PageError> {
        let page = self.open_tab().await?;
        Ok(Box::new(BrowserPage::new(page)))
    }
}
