//! Owned browser process plus its CDP event-handler task

use std::path::PathBuf;

use chromiumoxide::browser::Browser;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A launched browser, its handler task, and the profile directory it writes to
///
/// The handler task is aborted on drop. Dropping does not stop Chrome cleanly;
/// call [`BrowserWrapper::close`] for that.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Close Chrome, wait for the process to exit, then remove its profile directory
    ///
    /// Each step is best-effort: a crashed browser fails the first two, and the
    /// directory is removed regardless.
    pub(crate) async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        self.cleanup_user_data_dir();
    }

    /// Remove the profile directory; Chrome must have exited so no files are locked
    fn cleanup_user_data_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            info!("Removing browser profile directory {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to remove browser profile directory {}: {}",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();

        if let Some(path) = &self.user_data_dir {
            warn!(
                "Browser dropped without close(); profile directory left behind: {}",
                path.display()
            );
        }
    }
}
