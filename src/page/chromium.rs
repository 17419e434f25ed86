//! Live Chromium tab behind the [`ProductPage`] interface

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Element, ProductPage, WaitUntil};
use crate::error::PageError;

/// Snapshot script for `query_selector_all`
///
/// `__SELECTOR__` is replaced with a JSON string literal. Invalid selectors are
/// reported in-band so they can be told apart from a crashed page.
const SNAPSHOT_SCRIPT: &str = r#"(() => {
  let nodes;
  try {
    nodes = document.querySelectorAll(__SELECTOR__);
  } catch (e) {
    return { invalid: true, elements: [] };
  }
  const elements = Array.from(nodes).map((el) => {
    const attributes = {};
    for (const a of el.attributes) attributes[a.name] = a.value;
    const r = el.getBoundingClientRect();
    return {
      tag: el.tagName.toLowerCase(),
      text: el.textContent || "",
      attributes,
      rect: { width: r.width, height: r.height },
    };
  });
  return { invalid: false, elements };
})()"#;

/// True once the navigated document has been parsed
const DOM_READY_SCRIPT: &str =
    "document.readyState !== 'loading' && location.href !== 'about:blank'";

const DOM_READY_POLL: Duration = Duration::from_millis(100);

#[derive(Deserialize)]
struct Snapshot {
    invalid: bool,
    elements: Vec<Element>,
}

/// A chromiumoxide page owned by one scrape attempt
pub struct BrowserPage {
    page: Page,
}

impl BrowserPage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Poll until the new document is parsed; bounded by the caller's timeout.
    /// Evaluation fails while the old context is torn down, so errors just retry.
    async fn wait_for_dom_ready(&self) {
        loop {
            match self.evaluate(DOM_READY_SCRIPT).await {
                Ok(Value::Bool(true)) => return,
                Ok(_) => {}
                Err(e) => debug!("DOM not ready yet: {}", e),
            }
            tokio::time::sleep(DOM_READY_POLL).await;
        }
    }
}

#[async_trait]
impl ProductPage for BrowserPage {
    async fn goto(
        &self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<(), PageError> {
        let navigation = async {
            match wait_until {
                WaitUntil::Load => {
                    self.page
                        .goto(url)
                        .await
                        .map_err(|e| PageError::Navigation(format!("{url}: {e}")))?;
                }
                WaitUntil::DomContentLoaded => {
                    // Page.navigate answers once the request is committed;
                    // `Page::goto` would also hold out for the load event.
                    let params = NavigateParams::builder()
                        .url(url)
                        .build()
                        .map_err(|e| PageError::Navigation(format!("{url}: {e}")))?;
                    self.page
                        .execute(params)
                        .await
                        .map_err(|e| PageError::Navigation(format!("{url}: {e}")))?;
                    self.wait_for_dom_ready().await;
                }
            }
            Ok::<(), PageError>(())
        };

        tokio::time::timeout(timeout, navigation)
            .await
            .map_err(|_| PageError::Timeout {
                url: url.to_string(),
                timeout,
            })?
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, PageError> {
        let literal = serde_json::to_string(selector)
            .map_err(|e| PageError::Evaluation(e.to_string()))?;
        let script = SNAPSHOT_SCRIPT.replace("__SELECTOR__", &literal);

        let value = self.evaluate(&script).await?;
        let snapshot: Snapshot = serde_json::from_value(value)
            .map_err(|e| PageError::Evaluation(format!("unexpected snapshot shape: {e}")))?;

        if snapshot.invalid {
            return Err(PageError::InvalidSelector(selector.to_string()));
        }
        Ok(snapshot.elements)
    }

    async fn evaluate(&self, script: &str) -> Result<Value, PageError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| PageError::Evaluation(e.to_string()))?;

        // Scripts that return `undefined` carry no value at all
        Ok(result.into_value().unwrap_or(Value::Null))
    }

    async fn close(&self) {
        debug!("Closing browser page");
        if let Err(e) = self.page.clone().close().await {
            warn!("Failed to close browser page: {}", e);
        }
    }
}
