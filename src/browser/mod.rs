//! Chromium lifecycle: locating, launching and tearing down the browser
//! that backs [`BrowserPage`](crate::page::BrowserPage)

mod wrapper;

pub use crate::browser_setup::{download_managed_browser, find_browser_executable, launch_browser};
pub use wrapper::BrowserWrapper;

use thiserror::Error;

use crate::error::PageError;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to find browser executable: {0}")]
    NotFound(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type BrowserResult<T> = Result<T, BrowserError>;

/// Browser failures surface to the orchestrator as transient page errors
impl From<BrowserError> for PageError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::PageCreationFailed(msg) => PageError::Navigation(msg),
            other => PageError::Launch(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_failures_become_page_launch_errors() {
        let err: PageError = BrowserError::NotFound("chromium".into()).into();
        assert!(matches!(err, PageError::Launch(msg) if msg.contains("chromium")));

        let err: PageError = BrowserError::PageCreationFailed("target closed".into()).into();
        assert_eq!(err, PageError::Navigation("target closed".into()));
    }
}
