//! Product-data extraction for e-commerce product pages
//!
//! Given a product URL, loads the page (Chromium via chromiumoxide, or static
//! HTML via reqwest) and runs a tiered extraction cascade: JSON-LD and meta
//! tags, a per-site custom extractor, profile and generic selectors, and a
//! currency regex. Output is a normalized [`ExtractionResult`] or a typed
//! [`ScrapeFailure`] once retries are exhausted.

mod browser;
pub mod browser_setup;
pub mod domain;
pub mod error;
pub mod extract;
pub mod image_url;
pub mod issues;
mod manager;
pub mod orchestrator;
pub mod page;
pub mod price;
pub mod profiles;
pub mod result;
pub mod utils;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::constants::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_TIMEOUT_MS, DEFAULT_WAIT_MS,
};

pub use browser::{BrowserError, BrowserResult, download_managed_browser, find_browser_executable};
pub use error::{AttemptError, PageError, ProfileError};
pub use extract::ProductFields;
pub use issues::{ImportIssue, IssueSink};
pub use manager::BrowserManager;
pub use orchestrator::{Backoff, FixedBackoff, NoBackoff, ScrapeSettings, Scraper};
pub use page::{BrowserPage, Element, HtmlPage, HttpLoader, PageLoader, ProductPage, WaitUntil};
pub use profiles::{CustomExtractor, ExtractorCatalog, SelectorSet, SiteProfile, SiteRegistry};
pub use result::{ExtractionResult, FailureKind, ScrapeFailure};

/// Environment variable naming a config file, used when no path is given
pub const CONFIG_ENV: &str = "PRODUCT_SCRAPER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Attempts per URL before giving up, at most three
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// URLs scraped in parallel by batch runs
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pause after each URL, per worker, to go easy on storefronts
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_wait_ms")]
    pub default_wait_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    #[serde(default)]
    pub loader: LoaderKind,

    /// Extra site profiles merged over the built-in set
    #[serde(default)]
    pub profiles_path: Option<PathBuf>,

    #[serde(default)]
    pub browser: BrowserConfig,
}

/// How pages are loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    /// Headless Chromium; runs page scripts
    #[default]
    Browser,
    /// Plain HTTP fetch of the server-rendered HTML
    Http,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default = "default_disable_security")]
    pub disable_security: bool,

    #[serde(default)]
    pub window: WindowConfig,

    /// UI and `Accept-Language` locale; storefronts localize prices by it
    #[serde(default = "default_language")]
    pub language: String,

    /// Chrome binary to use instead of searching the system
    #[serde(default)]
    pub executable: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}
fn default_concurrency() -> usize {
    3
}
fn default_request_delay_ms() -> u64 {
    1_500
}
fn default_wait_ms() -> u64 {
    DEFAULT_WAIT_MS
}
fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_headless() -> bool {
    true
}

fn default_disable_security() -> bool {
    false
}

fn default_language() -> String {
    "tr-TR".to_string()
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            concurrency: default_concurrency(),
            request_delay_ms: default_request_delay_ms(),
            default_wait_ms: default_wait_ms(),
            default_timeout_ms: default_timeout_ms(),
            loader: LoaderKind::default(),
            profiles_path: None,
            browser: BrowserConfig::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: default_disable_security(),
            window: WindowConfig::default(),
            language: default_language(),
            executable: None,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Config {
    /// Reject tuning values the orchestrator cannot honour
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=DEFAULT_MAX_ATTEMPTS).contains(&self.max_attempts) {
            anyhow::bail!(
                "max_attempts must be between 1 and {DEFAULT_MAX_ATTEMPTS}, got {}",
                self.max_attempts
            );
        }
        utils::validate_navigation_timeout(Some(self.default_timeout_ms), DEFAULT_TIMEOUT_MS)
            .map_err(|e| anyhow::anyhow!("default_timeout_ms: {e}"))?;
        utils::validate_settle_wait(Some(self.default_wait_ms), DEFAULT_WAIT_MS)
            .map_err(|e| anyhow::anyhow!("default_wait_ms: {e}"))?;
        Ok(())
    }
}

/// Load configuration
///
/// Uses `path` if given, else the file named by `PRODUCT_SCRAPER_CONFIG`, else
/// `config.yaml` in the working directory. An explicitly named file must
/// exist; a missing `config.yaml` means defaults.
pub fn load_yaml_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let explicit = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    let config_path = match explicit {
        Some(path) => path,
        None => {
            let fallback = PathBuf::from("config.yaml");
            if !fallback.exists() {
                return Ok(Config::default());
            }
            fallback
        }
    };

    let contents = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config {}", config_path.display()))?;
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("Invalid config {}", config_path.display()))?;
    config.validate()?;

    info!("Loaded config from {}", config_path.display());
    Ok(config)
}

/// A ready scraper plus the browser it may own
pub struct Engine {
    scraper: Scraper,
    browser: Option<Arc<BrowserManager>>,
}

impl Engine {
    pub fn scraper(&self) -> &Scraper {
        &self.scraper
    }

    /// Close the browser, if one was started
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        match &self.browser {
            Some(manager) => manager.shutdown().await,
            None => Ok(()),
        }
    }
}

/// Wire loader, profile registry and orchestrator together from `config`
pub fn build_engine(config: &Config) -> anyhow::Result<Engine> {
    let registry = SiteRegistry::load(config.profiles_path.as_deref())
        .context("Failed to load site profiles")?;
    info!("{} site profile(s) available", registry.len());

    let (loader, browser): (Arc<dyn PageLoader>, Option<Arc<BrowserManager>>) = match config.loader
    {
        LoaderKind::Browser => {
            let manager = Arc::new(BrowserManager::new(config.browser.clone()));
            (manager.clone() as Arc<dyn PageLoader>, Some(manager))
        }
        LoaderKind::Http => {
            let loader = HttpLoader::new(&config.browser.language)
                .context("Failed to build HTTP client")?;
            (Arc::new(loader) as Arc<dyn PageLoader>, None)
        }
    };

    let scraper = Scraper::new(loader, Arc::new(registry), ScrapeSettings::from_config(config));
    Ok(Engine { scraper, browser })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str(
            "max_attempts: 2\nloader: http\nbrowser:\n  language: en-US\n",
        )
        .unwrap();

        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.loader, LoaderKind::Http);
        assert_eq!(config.browser.language, "en-US");
        assert!(config.browser.headless);
        assert_eq!(config.browser.window.width, 1920);
        assert_eq!(config.retry_backoff_ms, DEFAULT_RETRY_BACKOFF_MS);
        assert_eq!(config.concurrency, 3);
    }

    #[test]
    fn explicit_config_file_is_loaded_and_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "concurrency: 5\nrequest_delay_ms: 0").unwrap();
        let config = load_yaml_config(Some(file.path())).unwrap();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.request_delay_ms, 0);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "default_timeout_ms: 0").unwrap();
        assert!(load_yaml_config(Some(bad.path())).is_err());

        let mut too_many = tempfile::NamedTempFile::new().unwrap();
        writeln!(too_many, "max_attempts: 4").unwrap();
        assert!(load_yaml_config(Some(too_many.path())).is_err());
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        assert!(load_yaml_config(Some(Path::new("/nonexistent/config.yaml"))).is_err());
    }

    #[tokio::test]
    async fn http_engine_needs_no_browser() {
        let config = Config {
            loader: LoaderKind::Http,
            ..Config::default()
        };
        let engine = build_engine(&config).unwrap();
        assert!(engine.scraper().registry().len() >= 5);
        engine.shutdown().await.unwrap();
    }
}
