//! Static HTML snapshot behind the [`ProductPage`] interface
//!
//! Backed by `scraper`, so storefronts that render product data server-side can
//! be scraped over plain HTTP, and tests can run the full cascade against
//! fixture documents without a browser.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use scraper::{Html, Selector};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::{Element, PageLoader, ProductPage, WaitUntil};
use crate::error::PageError;
use crate::utils::constants::CHROME_USER_AGENT;

type Query = (String, oneshot::Sender<Result<Vec<Element>, PageError>>);

/// Handle to a document parsed once and queried on a blocking thread
///
/// `scraper::Html` is not `Send`, so the tree stays on the thread that built
/// it. The thread exits when the last handle is dropped.
struct ParsedDocument {
    queries: mpsc::UnboundedSender<Query>,
}

impl ParsedDocument {
    fn spawn(html: String, parses: Arc<AtomicUsize>) -> Self {
        let (queries, mut rx) = mpsc::unbounded_channel::<Query>();
        tokio::task::spawn_blocking(move || {
            let document = Html::parse_document(&html);
            parses.fetch_add(1, Ordering::Relaxed);
            debug!("Parsed static document ({} bytes)", html.len());

            while let Some((selector, reply)) = rx.blocking_recv() {
                let _ = reply.send(snapshot(&document, &selector));
            }
        });
        Self { queries }
    }

    async fn query(&self, selector: &str) -> Result<Vec<Element>, PageError> {
        let stopped = || PageError::Evaluation("document worker stopped".to_string());
        let (reply, answer) = oneshot::channel();
        self.queries
            .send((selector.to_string(), reply))
            .map_err(|_| stopped())?;
        answer.await.map_err(|_| stopped())?
    }
}

/// A page whose DOM is a fixed HTML document
pub struct HtmlPage {
    client: Option<reqwest::Client>,
    html: RwLock<Option<String>>,
    parsed: RwLock<Option<Arc<ParsedDocument>>>,
    parses: Arc<AtomicUsize>,
}

impl HtmlPage {
    /// Page preloaded with `html`; `goto` succeeds without fetching anything
    pub fn from_html(html: impl Into<String>) -> Self {
        Self {
            client: None,
            html: RwLock::new(Some(html.into())),
            parsed: RwLock::new(None),
            parses: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Empty page that fetches its document over HTTP on `goto`
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Some(client),
            html: RwLock::new(None),
            parsed: RwLock::new(None),
            parses: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Parsed form of the current document, parsing it on first use
    fn document(&self) -> Option<Arc<ParsedDocument>> {
        if let Some(parsed) = self.parsed.read().as_ref() {
            return Some(parsed.clone());
        }
        let mut parsed = self.parsed.write();
        if parsed.is_none() {
            let html = self.html.read().clone()?;
            *parsed = Some(Arc::new(ParsedDocument::spawn(html, self.parses.clone())));
        }
        parsed.clone()
    }

    async fn fetch(
        client: &reqwest::Client,
        url: &str,
        timeout: Duration,
    ) -> Result<String, PageError> {
        let response = client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, url, timeout))?;

        let response = response
            .error_for_status()
            .map_err(|e| PageError::Navigation(format!("{url}: {e}")))?;

        response.text().await.map_err(|e| classify(e, url, timeout))
    }
}

fn classify(err: reqwest::Error, url: &str, timeout: Duration) -> PageError {
    if err.is_timeout() {
        PageError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else {
        PageError::from(err)
    }
}

/// Snapshot every match of `selector` in `document`
fn snapshot(document: &Html, selector: &str) -> Result<Vec<Element>, PageError> {
    let selector =
        Selector::parse(selector).map_err(|_| PageError::InvalidSelector(selector.to_string()))?;

    Ok(document
        .select(&selector)
        .map(|el| Element {
            tag: el.value().name().to_ascii_lowercase(),
            text: el.text().collect::<String>(),
            attributes: el
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            rect: None,
        })
        .collect())
}

#[async_trait]
impl ProductPage for HtmlPage {
    async fn goto(
        &self,
        url: &str,
        _wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<(), PageError> {
        match &self.client {
            Some(client) => {
                debug!("Fetching {} over HTTP", url);
                let html = Self::fetch(client, url, timeout).await?;
                *self.html.write() = Some(html);
                self.parsed.write().take();
                Ok(())
            }
            None if self.html.read().is_some() => Ok(()),
            None => Err(PageError::Navigation(format!(
                "{url}: page has neither a document nor an HTTP client"
            ))),
        }
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, PageError> {
        match self.document() {
            Some(document) => document.query(selector).await,
            None => Ok(Vec::new()),
        }
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, PageError> {
        Err(PageError::Unsupported("script evaluation on static HTML"))
    }

    async fn close(&self) {
        self.parsed.write().take();
        self.html.write().take();
    }
}

/// [`PageLoader`] fetching static HTML with reqwest
#[derive(Clone)]
pub struct HttpLoader {
    client: reqwest::Client,
}

impl HttpLoader {
    /// Build a loader that presents itself like a desktop Chrome in `language`
    pub fn new(language: &str) -> Result<Self, PageError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        let accept_language = format!("{language},{};q=0.9,en;q=0.8", primary_subtag(language));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&accept_language)
                .map_err(|e| PageError::Http(format!("invalid language '{language}': {e}")))?,
        );

        let client = reqwest::Client::builder()
            .user_agent(CHROME_USER_AGENT)
            .default_headers(headers)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }
}

fn primary_subtag(language: &str) -> &str {
    language.split(['-', '_']).next().unwrap_or(language)
}

#[async_trait]
impl PageLoader for HttpLoader {
    async fn new_page(&self) -> Result<Box<dyn ProductPage>, PageError> {
        Ok(Box::new(HtmlPage::with_client(self.client.clone())))
    }
}
