//! Chromium-backed [`BrowserController`] over the DevTools Protocol.
//!
//! The protocol handler runs in its own tokio task for the life of the
//! controller. Page handles are cloned out of the session lock so slow
//! operations never block [`BrowserController::close`] from being queued.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{require, BrowserController, BrowserError, BrowserSettings};
use crate::config::ConfigLoader;

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);

const LAUNCH_ARGS: &[&str] = &[
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-breakpad",
    "--disable-component-update",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-popup-blocking",
    "--disable-sync",
    "--no-first-run",
    "--no-default-browser-check",
    "--password-store=basic",
    "--use-mock-keychain",
];

/// Build the `chromiumoxide` launch configuration for `settings`.
///
/// # Errors
///
/// [`BrowserError::ExecutableNotFound`] when an explicit executable is
/// missing, [`BrowserError::Config`] when no browser can be located.
pub fn launch_config(settings: &BrowserSettings) -> Result<BrowserConfig, BrowserError> {
    if let Some(path) = &settings.executable {
        if !path.exists() {
            return Err(BrowserError::ExecutableNotFound(path.display().to_string()));
        }
    }

    let mut builder = BrowserConfig::builder()
        .request_timeout(settings.timeout())
        .launch_timeout(LAUNCH_TIMEOUT)
        .args(LAUNCH_ARGS.iter().copied());
    if !settings.headless {
        builder = builder.with_head();
    }
    if settings.no_sandbox {
        builder = builder.no_sandbox();
    }
    if let Some(path) = &settings.executable {
        builder = builder.chrome_executable(path);
    }
    builder.build().map_err(BrowserError::Config)
}

struct Session {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

/// [`BrowserController`] driving a local Chromium through `chromiumoxide`.
pub struct ChromiumBrowserController {
    settings: BrowserSettings,
    session: Mutex<Option<Session>>,
}

impl ChromiumBrowserController {
    /// Start a browser with `settings` and open a blank page.
    ///
    /// # Errors
    ///
    /// Configuration errors from [`launch_config`], or
    /// [`BrowserError::Launch`] if the process or first page fails.
    pub async fn launch(settings: BrowserSettings) -> Result<Self, BrowserError> {
        let config = launch_config(&settings)?;
        info!(
            headless = settings.headless,
            timeout_ms = settings.timeout_ms,
            "Launching Chromium"
        );

        let (browser, mut events) = Browser::launch(config).await.map_err(|e| {
            error!(error = %e, "Failed to launch Chromium");
            BrowserError::Launch(e.to_string())
        })?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler reported an error");
                }
            }
            debug!("Browser handler stopped");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                error!(error = %e, "Failed to open initial page");
                return Err(BrowserError::Launch(e.to_string()));
            }
        };

        info!("Chromium ready");
        Ok(Self {
            settings,
            session: Mutex::new(Some(Session { browser, page, handler })),
        })
    }

    /// Launch with the `browser.*` keys of `loader`.
    ///
    /// # Errors
    ///
    /// As [`ChromiumBrowserController::launch`].
    pub async fn from_loader(loader: &ConfigLoader) -> Result<Self, BrowserError> {
        Self::launch(BrowserSettings::from_loader(loader)).await
    }

    /// The settings the browser was launched with.
    #[must_use]
    pub const fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    async fn page(&self) -> Result<Page, BrowserError> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.page.clone())
            .ok_or(BrowserError::Closed)
    }

    async fn find(&self, selector: &str) -> Result<chromiumoxide::Element, BrowserError> {
        let selector = require(selector, "selector")?;
        self.page()
            .await?
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::ElementNotFound {
                selector: selector.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl BrowserController for ChromiumBrowserController {
    async fn get_page_title(&self, url: &str) -> Result<String, BrowserError> {
        let url = require(url, "url")?;
        let current = self
            .page()
            .await?
            .url()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        if current.as_deref() != Some(url) {
            self.navigate_to(url).await?;
        }
        self.current_page_title().await
    }

    async fn current_page_title(&self) -> Result<String, BrowserError> {
        let title = self
            .page()
            .await?
            .get_title()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?
            .unwrap_or_default();
        debug!(title = %title, "Read page title");
        Ok(title)
    }

    async fn navigate_to(&self, url: &str) -> Result<(), BrowserError> {
        let url = require(url, "url")?;
        info!(url = url, "Navigating");
        let page = self.page().await?;
        let navigation = match page.goto(url).await {
            Ok(page) => page.wait_for_navigation().await.map(|_| ()),
            Err(e) => Err(e),
        };
        navigation.map_err(|e| {
            error!(url = url, error = %e, "Navigation failed");
            BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })
    }

    async fn click_element(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self.find(selector).await?;
        element.click().await.map_err(|e| {
            error!(selector = selector, error = %e, "Click failed");
            BrowserError::Interaction {
                selector: selector.to_string(),
                reason: e.to_string(),
            }
        })?;
        debug!(selector = selector, "Clicked element");
        Ok(())
    }

    async fn input_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let element = self.find(selector).await?;
        let interaction = |e: chromiumoxide::error::CdpError| {
            error!(selector = selector, error = %e, "Text input failed");
            BrowserError::Interaction {
                selector: selector.to_string(),
                reason: e.to_string(),
            }
        };
        element.click().await.map_err(interaction)?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await
            .map_err(interaction)?;
        element.type_str(text).await.map_err(interaction)?;
        debug!(selector = selector, chars = text.chars().count(), "Entered text");
        Ok(())
    }

    async fn take_screenshot(&self, path: &Path) -> Result<PathBuf, BrowserError> {
        let target = self.settings.resolve_screenshot_path(path);
        let failure = |reason: String| BrowserError::Screenshot {
            path: target.display().to_string(),
            reason,
        };
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| failure(e.to_string()))?;
        }

        self.page()
            .await?
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), &target)
            .await
            .map_err(|e| {
                error!(path = %target.display(), error = %e, "Screenshot failed");
                failure(e.to_string())
            })?;
        info!(path = %target.display(), "Screenshot saved");
        Ok(target)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let Some(Session {
            mut browser,
            page,
            handler,
        }) = self.session.lock().await.take()
        else {
            return Ok(());
        };

        info!("Closing browser");
        if let Err(e) = page.close().await {
            warn!(error = %e, "Failed to close page");
        }
        if let Err(e) = browser.close().await {
            error!(error = %e, "Failed to close browser");
        }
        if let Err(e) = browser.wait().await {
            warn!(error = %e, "Failed to reap browser process");
        }
        handler.abort();
        info!("Browser closed");
        Ok(())
    }
}

impl Drop for ChromiumBrowserController {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            warn!("Browser controller dropped without close, killing browser");
            session.handler.abort();
        }
    }
}

impl fmt::Debug for ChromiumBrowserController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChromiumBrowserController")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_executable_is_reported() {
        let settings = BrowserSettings::default().with_executable("/definitely/not/chrome");
        let err = launch_config(&settings).unwrap_err();
        assert_eq!(
            err,
            BrowserError::ExecutableNotFound("/definitely/not/chrome".into())
        );
    }

    #[test]
    fn test_config_builds_with_explicit_executable() {
        let fake_chrome = NamedTempFile::new().unwrap();
        let settings = BrowserSettings::default()
            .with_headless(false)
            .with_timeout(Duration::from_secs(5))
            .with_executable(fake_chrome.path());
        assert!(launch_config(&settings).is_ok());
    }

    #[tokio::test]
    async fn test_launch_fails_before_spawning() {
        let settings = BrowserSettings::default().with_executable("/definitely/not/chrome");
        let err = ChromiumBrowserController::launch(settings).await.unwrap_err();
        assert!(matches!(err, BrowserError::ExecutableNotFound(_)));
    }
}
