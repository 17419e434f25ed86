//! Retry orchestration
//!
//! A scrape request walks a small state machine:
//!
//! ```text
//! Attempting(1) -> Success
//!               -> Attempting(2) -> ... -> Attempting(max) -> Exhausted
//! ```
//!
//! Every attempt gets a fresh page from the [`PageLoader`]. Page errors,
//! bot walls and incomplete extractions are all retried the same way after a
//! fixed backoff. Cancellation is honoured between attempts and during backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use url::Url;
use uuid::Uuid;

use crate::Config;
use crate::error::{AttemptError, PageError};
use crate::extract::extract_product;
use crate::page::{PageLoader, ProductPage};
use crate::profiles::{SiteProfile, SiteRegistry};
use crate::result::{ExtractionResult, FailureKind, ScrapeFailure, is_bot_block_title};
use crate::utils::constants::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_TIMEOUT_MS, DEFAULT_WAIT_MS,
    LAZY_LOAD_SCRIPT,
};

/// Pause between a failed attempt and the next one
#[async_trait]
pub trait Backoff: Send + Sync {
    /// Wait before attempt `next_attempt`
    async fn wait(&self, next_attempt: u32);
}

/// The same delay before every retry
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff(pub Duration);

#[async_trait]
impl Backoff for FixedBackoff {
    async fn wait(&self, _next_attempt: u32) {
        tokio::time::sleep(self.0).await;
    }
}

/// Retry immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

#[async_trait]
impl Backoff for NoBackoff {
    async fn wait(&self, _next_attempt: u32) {}
}

/// Tuning for the orchestrator, resolved from [`Config`]
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    /// Settle wait when the site profile sets none
    pub default_wait: Duration,
    /// Navigation timeout when the site profile sets none
    pub default_timeout: Duration,
    /// Parallel workers in [`Scraper::scrape_many`]
    pub concurrency: usize,
    /// Courtesy pause a worker takes after each URL
    pub request_delay: Duration,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            default_wait: Duration::from_millis(DEFAULT_WAIT_MS),
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            concurrency: 3,
            request_delay: Duration::ZERO,
        }
    }
}

impl ScrapeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts.clamp(1, DEFAULT_MAX_ATTEMPTS),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            default_wait: Duration::from_millis(config.default_wait_ms),
            default_timeout: Duration::from_millis(config.default_timeout_ms),
            concurrency: config.concurrency.max(1),
            request_delay: Duration::from_millis(config.request_delay_ms),
        }
    }
}

enum AttemptState {
    Attempting(u32),
    Success(ExtractionResult),
    Exhausted { attempts: u32, reason: String },
}

/// Drives scrape requests against a page loader and a profile registry
#[derive(Clone)]
pub struct Scraper {
    loader: Arc<dyn PageLoader>,
    registry: Arc<SiteRegistry>,
    backoff: Arc<dyn Backoff>,
    settings: ScrapeSettings,
}

impl Scraper {
    /// Scraper with a fixed backoff taken from `settings`
    pub fn new(
        loader: Arc<dyn PageLoader>,
        registry: Arc<SiteRegistry>,
        settings: ScrapeSettings,
    ) -> Self {
        Self {
            backoff: Arc::new(FixedBackoff(settings.retry_backoff)),
            loader,
            registry,
            settings,
        }
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn settings(&self) -> &ScrapeSettings {
        &self.settings
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    /// Scrape one product URL
    pub async fn scrape(&self, url: &str) -> Result<ExtractionResult, ScrapeFailure> {
        self.scrape_with_cancel(url, &CancellationToken::new()).await
    }

    /// Scrape one product URL, giving up early once `cancel` fires
    pub async fn scrape_with_cancel(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ExtractionResult, ScrapeFailure> {
        let span = info_span!("scrape", url = %url, request_id = %Uuid::new_v4());
        self.run(url, cancel).instrument(span).await
    }

    async fn run(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ExtractionResult, ScrapeFailure> {
        if let Err(reason) = check_url(url) {
            warn!("Rejecting URL: {}", reason);
            return Err(ScrapeFailure::new(url, FailureKind::InvalidUrl, reason, 0));
        }

        let profile = self.registry.lookup(url);
        let max = self.settings.max_attempts.clamp(1, DEFAULT_MAX_ATTEMPTS);
        let mut last_reason = String::new();
        let mut state = AttemptState::Attempting(1);

        loop {
            state = match state {
                AttemptState::Attempting(n) => {
                    if cancel.is_cancelled() {
                        return Err(self.cancelled(url, n - 1, last_reason));
                    }

                    info!("Attempt {}/{}", n, max);
                    match self.attempt(url, profile).await {
                        Ok(result) => AttemptState::Success(result),
                        Err(e) => {
                            warn!("Attempt {}/{} failed: {}", n, max, e);
                            last_reason = e.to_string();

                            if n >= max {
                                AttemptState::Exhausted {
                                    attempts: n,
                                    reason: last_reason.clone(),
                                }
                            } else {
                                tokio::select! {
                                    _ = cancel.cancelled() => {
                                        return Err(self.cancelled(url, n, last_reason));
                                    }
                                    _ = self.backoff.wait(n + 1) => AttemptState::Attempting(n + 1),
                                }
                            }
                        }
                    }
                }
                AttemptState::Success(result) => {
                    info!("Scrape succeeded");
                    return Ok(result);
                }
                AttemptState::Exhausted { attempts, reason } => {
                    warn!("Giving up after {} attempt(s): {}", attempts, reason);
                    return Err(ScrapeFailure::new(
                        url,
                        FailureKind::Exhausted,
                        reason,
                        attempts,
                    ));
                }
            };
        }
    }

    fn cancelled(&self, url: &str, attempts: u32, last_reason: String) -> ScrapeFailure {
        info!("Scrape cancelled after {} attempt(s)", attempts);
        let reason = if last_reason.is_empty() {
            "cancelled before first attempt".to_string()
        } else {
            last_reason
        };
        ScrapeFailure::new(url, FailureKind::Cancelled, reason, attempts)
    }

    /// One attempt on a fresh page; the page is closed whatever the outcome
    async fn attempt(
        &self,
        url: &str,
        profile: Option<&SiteProfile>,
    ) -> Result<ExtractionResult, AttemptError> {
        let page = self.loader.new_page().await?;
        let outcome = self.attempt_on(page.as_ref(), url, profile).await;
        page.close().await;
        outcome
    }

    async fn attempt_on(
        &self,
        page: &dyn ProductPage,
        url: &str,
        profile: Option<&SiteProfile>,
    ) -> Result<ExtractionResult, AttemptError> {
        let timeout = profile
            .and_then(|p| p.timeout)
            .unwrap_or(self.settings.default_timeout);
        let wait_until = profile.map(|p| p.wait_until).unwrap_or_default();

        page.goto(url, wait_until, timeout).await?;

        let settle = profile
            .and_then(|p| p.wait_time)
            .unwrap_or(self.settings.default_wait);
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }

        let title = page.title().await?;
        if is_bot_block_title(&title) {
            return Err(PageError::Blocked(title).into());
        }

        match page.evaluate(LAZY_LOAD_SCRIPT).await {
            Ok(_) | Err(PageError::Unsupported(_)) => {}
            Err(e) => debug!("Lazy-load scroll failed: {}", e),
        }

        let fields = extract_product(page, url, profile).await?;
        ExtractionResult::assemble(fields, url).validate()
    }

    /// Scrape many URLs with at most `concurrency` in flight
    ///
    /// Results come back in input order.
    pub async fn scrape_many(
        &self,
        urls: &[String],
    ) -> Vec<Result<ExtractionResult, ScrapeFailure>> {
        self.scrape_many_with_cancel(urls, &CancellationToken::new())
            .await
    }

    pub async fn scrape_many_with_cancel(
        &self,
        urls: &[String],
        cancel: &CancellationToken,
    ) -> Vec<Result<ExtractionResult, ScrapeFailure>> {
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency));
        let mut join_set = JoinSet::new();

        for (index, url) in urls.iter().cloned().enumerate() {
            let scraper = self.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();

            join_set.spawn(async move {
                let outcome = match semaphore.acquire().await {
                    Ok(_permit) => {
                        let outcome = scraper.scrape_with_cancel(&url, &cancel).await;
                        if !scraper.settings.request_delay.is_zero() {
                            tokio::select! {
                                _ = cancel.cancelled() => {}
                                _ = tokio::time::sleep(scraper.settings.request_delay) => {}
                            }
                        }
                        outcome
                    }
                    Err(e) => Err(ScrapeFailure::new(
                        &url,
                        FailureKind::Cancelled,
                        format!("worker pool closed: {e}"),
                        0,
                    )),
                };
                (index, outcome)
            });
        }

        let mut results: Vec<Option<Result<ExtractionResult, ScrapeFailure>>> =
            (0..urls.len()).map(|_| None).collect();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => results[index] = Some(outcome),
                Err(e) => warn!("Scrape worker failed: {}", e),
            }
        }

        results
            .into_iter()
            .zip(urls)
            .map(|(slot, url)| {
                slot.unwrap_or_else(|| {
                    Err(ScrapeFailure::new(
                        url,
                        FailureKind::Exhausted,
                        "scrape worker panicked",
                        0,
                    ))
                })
            })
            .collect()
    }
}

/// Only absolute http(s) URLs with a host are scraped
fn check_url(url: &str) -> Result<(), String> {
    let parsed = Url::parse(url).map_err(|e| format!("unparseable URL: {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", parsed.scheme()));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err("URL has no host".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_check() {
        assert!(check_url("https://www.zara.com/tr/p1.html").is_ok());
        assert!(check_url("http://localhost:8080/p").is_ok());
        assert!(check_url("ftp://x.com/p").is_err());
        assert!(check_url("/relative/path").is_err());
        assert!(check_url("not a url").is_err());
    }

    #[test]
    fn settings_from_config_clamp_zero_values() {
        let config = Config {
            max_attempts: 0,
            concurrency: 0,
            ..Config::default()
        };
        let settings = ScrapeSettings::from_config(&config);
        assert_eq!(settings.max_attempts, 1);
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.default_timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }

    #[test]
    fn settings_never_exceed_the_attempt_bound() {
        let config = Config {
            max_attempts: 10,
            ..Config::default()
        };
        let settings = ScrapeSettings::from_config(&config);
        assert_eq!(settings.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }
}
