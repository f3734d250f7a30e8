//! Browser launch settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigLoader;

/// Key for headless mode.
pub const HEADLESS_KEY: &str = "browser.headless";
/// Key for the protocol request timeout in milliseconds.
pub const TIMEOUT_KEY: &str = "browser.timeout";
/// Key for the directory relative screenshot paths land in.
pub const SCREENSHOT_PATH_KEY: &str = "browser.screenshot.path";
/// Key for an explicit browser executable. Blank means auto-detect.
pub const EXECUTABLE_KEY: &str = "browser.executable";
/// Key for disabling the Chromium sandbox.
pub const NO_SANDBOX_KEY: &str = "browser.no.sandbox";

/// Default headless mode.
pub const DEFAULT_HEADLESS: bool = true;
/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default screenshot directory.
pub const DEFAULT_SCREENSHOT_PATH: &str = "screenshots";

/// Settings for launching a browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a visible window.
    pub headless: bool,
    /// Per-request protocol timeout in milliseconds.
    pub timeout_ms: u64,
    /// Directory that relative screenshot paths are resolved against.
    pub screenshot_dir: PathBuf,
    /// Browser binary. `None` lets the driver find one.
    pub executable: Option<PathBuf>,
    /// Pass `--no-sandbox`, needed when running as root in containers.
    pub no_sandbox: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: DEFAULT_HEADLESS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            screenshot_dir: PathBuf::from(DEFAULT_SCREENSHOT_PATH),
            executable: None,
            no_sandbox: false,
        }
    }
}

impl BrowserSettings {
    /// Read every `browser.*` key from `loader`, falling back to the defaults.
    #[must_use]
    pub fn from_loader(loader: &ConfigLoader) -> Self {
        let executable = loader.get_string(EXECUTABLE_KEY, "");
        Self {
            headless: loader.get_bool(HEADLESS_KEY, DEFAULT_HEADLESS),
            timeout_ms: u64::try_from(loader.get_int(
                TIMEOUT_KEY,
                i64::try_from(DEFAULT_TIMEOUT_MS).unwrap_or(i64::MAX),
            ))
            .unwrap_or(DEFAULT_TIMEOUT_MS),
            screenshot_dir: PathBuf::from(loader.get_string(SCREENSHOT_PATH_KEY, DEFAULT_SCREENSHOT_PATH)),
            executable: (!executable.trim().is_empty()).then(|| PathBuf::from(executable)),
            no_sandbox: loader.get_bool(NO_SANDBOX_KEY, false),
        }
    }

    /// Set headless mode.
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the screenshot directory.
    #[must_use]
    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }

    /// Use a specific browser binary.
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Request timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Where a screenshot requested at `path` is written.
    ///
    /// Absolute paths are kept; relative ones go under `screenshot_dir`.
    #[must_use]
    pub fn resolve_screenshot_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.screenshot_dir.join(path)
        }
    }
}
