//! Browser automation seam.
//!
//! [`BrowserController`] is the page-level surface the harness drives:
//! navigate, read the title, click, type and capture screenshots. With the
//! `chromium` feature, [`ChromiumBrowserController`] implements it over the
//! Chrome DevTools Protocol via `chromiumoxide`.
//!
//! Controllers hold one page. Every operation acts on that page until
//! [`BrowserController::close`] is called; after that, operations fail with
//! [`BrowserError::Closed`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

pub mod config;
#[cfg(feature = "chromium")]
pub mod chromium;

pub use config::BrowserSettings;
#[cfg(feature = "chromium")]
pub use chromium::{launch_config, ChromiumBrowserController};

/// Errors raised by a [`BrowserController`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrowserError {
    /// A required argument was empty or whitespace.
    #[error("{0} must not be empty")]
    EmptyArgument(&'static str),
    /// The controller was closed.
    #[error("browser is closed")]
    Closed,
    /// The configured browser executable does not exist.
    #[error("browser executable not found at {0}")]
    ExecutableNotFound(String),
    /// The launch configuration was rejected.
    #[error("invalid browser configuration: {0}")]
    Config(String),
    /// The browser process could not be started or reached.
    #[error("failed to launch browser: {0}")]
    Launch(String),
    /// Navigation failed or timed out.
    #[error("navigation to {url} failed: {reason}")]
    Navigation {
        /// Target URL.
        url: String,
        /// Underlying failure.
        reason: String,
    },
    /// No element matched the selector.
    #[error("no element matches {selector}: {reason}")]
    ElementNotFound {
        /// CSS selector.
        selector: String,
        /// Underlying failure.
        reason: String,
    },
    /// The element was found but the click or input failed.
    #[error("interaction with {selector} failed: {reason}")]
    Interaction {
        /// CSS selector.
        selector: String,
        /// Underlying failure.
        reason: String,
    },
    /// Capturing or writing the screenshot failed.
    #[error("screenshot to {path} failed: {reason}")]
    Screenshot {
        /// Destination file.
        path: String,
        /// Underlying failure.
        reason: String,
    },
    /// Any other protocol failure, such as reading the page title.
    #[error("browser protocol error: {0}")]
    Protocol(String),
}

/// Page-level browser automation.
#[async_trait]
pub trait BrowserController: Send + Sync {
    /// Title of the page at `url`, navigating first if the page is elsewhere.
    ///
    /// # Errors
    ///
    /// [`BrowserError::EmptyArgument`] for a blank URL, otherwise any
    /// navigation or protocol failure.
    async fn get_page_title(&self, url: &str) -> Result<String, BrowserError>;

    /// Title of the current page without navigating.
    ///
    /// # Errors
    ///
    /// [`BrowserError::Protocol`] if the title cannot be read.
    async fn current_page_title(&self) -> Result<String, BrowserError>;

    /// Load `url` and wait for the navigation to finish.
    ///
    /// # Errors
    ///
    /// [`BrowserError::EmptyArgument`] or [`BrowserError::Navigation`].
    async fn navigate_to(&self, url: &str) -> Result<(), BrowserError>;

    /// Click the first element matching `selector`.
    ///
    /// # Errors
    ///
    /// [`BrowserError::ElementNotFound`] or [`BrowserError::Interaction`].
    async fn click_element(&self, selector: &str) -> Result<(), BrowserError>;

    /// Replace the value of the first element matching `selector` with `text`.
    ///
    /// # Errors
    ///
    /// [`BrowserError::ElementNotFound`] or [`BrowserError::Interaction`].
    async fn input_text(&self, selector: &str, text: &str) -> Result<(), BrowserError>;

    /// Save a PNG of the current page and return where it was written.
    ///
    /// # Errors
    ///
    /// [`BrowserError::Screenshot`] if capture or writing fails.
    async fn take_screenshot(&self, path: &Path) -> Result<PathBuf, BrowserError>;

    /// Release the page and the browser. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Implementations may report teardown failures; the controller is
    /// unusable afterwards either way.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// What [`visit_page`] observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageVisit {
    /// URL that was loaded.
    pub url: String,
    /// Page title after loading.
    pub title: String,
    /// Where the screenshot was written.
    pub screenshot: PathBuf,
}

/// Navigate to `url`, read its title and save a screenshot.
///
/// # Errors
///
/// The first failing controller operation.
pub async fn visit_page(
    controller: &dyn BrowserController,
    url: &str,
    screenshot: &Path,
) -> Result<PageVisit, BrowserError> {
    require(url, "url")?;
    controller.navigate_to(url).await?;
    let title = controller.current_page_title().await?;
    let screenshot = controller.take_screenshot(screenshot).await?;
    info!(url = url, title = %title, screenshot = %screenshot.display(), "Page visited");
    Ok(PageVisit {
        url: url.to_string(),
        title,
        screenshot,
    })
}

/// Reject blank arguments before any browser round trip.
pub(crate) fn require<'a>(value: &'a str, what: &'static str) -> Result<&'a str, BrowserError> {
    if value.trim().is_empty() {
        Err(BrowserError::EmptyArgument(what))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_rejects_blank() {
        assert_eq!(require("  ", "url"), Err(BrowserError::EmptyArgument("url")));
        assert_eq!(require("", "selector"), Err(BrowserError::EmptyArgument("selector")));
        assert_eq!(require("#q", "selector"), Ok("#q"));
    }

    #[test]
    fn test_error_messages() {
        let err = BrowserError::ElementNotFound {
            selector: "#missing".into(),
            reason: "timeout".into(),
        };
        assert_eq!(err.to_string(), "no element matches #missing: timeout");
        assert_eq!(BrowserError::EmptyArgument("url").to_string(), "url must not be empty");
    }
}
