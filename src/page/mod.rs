//! Page-loading collaborator interface
//!
//! The extraction engine never talks to chromiumoxide or scraper directly. It
//! sees a [`ProductPage`] that can navigate, answer `querySelectorAll`-style
//! queries with detached [`Element`] snapshots, and (optionally) evaluate
//! scripts. Two implementations ship with the crate:
//!
//! - [`BrowserPage`] - a live Chromium tab driven over CDP
//! - [`HtmlPage`] - a static HTML snapshot (HTTP fetch or fixture)

mod chromium;
mod html;

pub use chromium::BrowserPage;
pub use html::{HtmlPage, HttpLoader};

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PageError;

/// Lifecycle event `goto` waits for before returning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    /// Return once the DOM is parsed
    DomContentLoaded,
    /// Return once the `load` event fired
    #[default]
    Load,
}

/// Rendered size of an element in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub width: f64,
    pub height: f64,
}

/// Detached snapshot of a DOM element
///
/// Snapshots are taken in one round-trip per query, so extraction never holds
/// remote object handles across await points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Tag name, lower-case
    #[serde(default)]
    pub tag: String,
    /// `textContent` of the element
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// Bounding box, `None` when the page cannot measure layout
    #[serde(default)]
    pub rect: Option<Rect>,
}

impl Element {
    /// Trimmed text content
    pub fn text_content(&self) -> &str {
        self.text.trim()
    }

    /// Attribute value, `None` when absent or blank
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// A loaded (or loadable) product page
#[async_trait]
pub trait ProductPage: Send + Sync {
    /// Navigate to `url`, failing with [`PageError::Timeout`] after `timeout`
    async fn goto(&self, url: &str, wait_until: WaitUntil, timeout: Duration)
    -> Result<(), PageError>;

    /// Snapshot every element matching `selector`, in document order
    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, PageError>;

    /// Evaluate a script in the page and return its JSON result
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, PageError>;

    /// Release the page. Errors are logged by implementations, never raised.
    async fn close(&self);

    /// First element matching `selector`
    async fn query_selector(&self, selector: &str) -> Result<Option<Element>, PageError> {
        Ok(self.query_selector_all(selector).await?.into_iter().next())
    }

    /// Current document title, empty when the page has none
    async fn title(&self) -> Result<String, PageError> {
        Ok(self
            .query_selector("title")
            .await?
            .map(|el| el.text_content().to_string())
            .unwrap_or_default())
    }
}

/// Hands out a fresh page for each scrape attempt
#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn ProductPage>, PageError>;
}

/// Run a query, treating a selector the page engine rejects as "no match"
///
/// Profiles are user-editable, so a typo in one selector must not abort the
/// whole attempt. Any other page error still propagates.
pub(crate) async fn select_all(
    page: &dyn ProductPage,
    selector: &str,
) -> Result<Vec<Element>, PageError> {
    match page.query_selector_all(selector).await {
        Ok(elements) => Ok(elements),
        Err(PageError::InvalidSelector(sel)) => {
            tracing::debug!("Skipping invalid selector '{}'", sel);
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}
