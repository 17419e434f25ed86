#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kodegen_tools_product_scraper::{
    Element, HtmlPage, NoBackoff, PageError, PageLoader, ProductPage, ScrapeSettings, Scraper,
    SiteRegistry, WaitUntil,
};

/// Serves fixture HTML, one document per attempt; the last one repeats
pub struct ScriptedLoader {
    pages: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedLoader {
    pub fn new(pages: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn always(html: &str) -> Arc<Self> {
        Self::new(&[html])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageLoader for ScriptedLoader {
    async fn new_page(&self) -> Result<Box<dyn ProductPage>, PageError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let html = &self.pages[n.min(self.pages.len() - 1)];
        Ok(Box::new(HtmlPage::from_html(html.clone())))
    }
}

/// Page whose navigation always times out
pub struct TimeoutPage;

#[async_trait]
impl ProductPage for TimeoutPage {
    async fn goto(
        &self,
        url: &str,
        _wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<(), PageError> {
        Err(PageError::Timeout {
            url: url.to_string(),
            timeout,
        })
    }

    async fn query_selector_all(&self, _selector: &str) -> Result<Vec<Element>, PageError> {
        Ok(Vec::new())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, PageError> {
        Err(PageError::Unsupported("evaluate"))
    }

    async fn close(&self) {}
}

#[derive(Default)]
pub struct TimeoutLoader {
    calls: AtomicUsize,
}

impl TimeoutLoader {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageLoader for TimeoutLoader {
    async fn new_page(&self) -> Result<Box<dyn ProductPage>, PageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TimeoutPage))
    }
}

/// Settings with no wall-clock waits
pub fn fast_settings() -> ScrapeSettings {
    ScrapeSettings {
        default_wait: Duration::ZERO,
        request_delay: Duration::ZERO,
        ..ScrapeSettings::default()
    }
}

pub fn scraper(loader: Arc<dyn PageLoader>, registry: SiteRegistry) -> Scraper {
    Scraper::new(loader, Arc::new(registry), fast_settings()).with_backoff(Arc::new(NoBackoff))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("kodegen_tools_product_scraper=debug")
        .with_test_writer()
        .try_init();
}
