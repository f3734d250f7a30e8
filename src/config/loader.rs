//! Layered configuration lookup.
//!
//! A key resolves against four layers, first hit wins:
//!
//! 1. environment variable named by upper-casing the key and replacing `.`
//!    with `_` (`task.pool.size` -> `TASK_POOL_SIZE`)
//! 2. property overrides set on the loader at runtime
//! 3. the properties file loaded at construction
//! 4. the caller's default
//!
//! Typed getters never fail: malformed numbers fall back to the default and
//! are logged at error level. Values are parsed exactly as stored, so a
//! padded `" 42 "` is malformed.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use parking_lot::RwLock;
use tracing::{debug, error, info};

/// File loaded by [`ConfigLoader::new`], relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "application.properties";

/// Resolves configuration keys across env, overrides, file and defaults.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    overrides: RwLock<HashMap<String, String>>,
    file_values: HashMap<String, String>,
    source: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load [`DEFAULT_CONFIG_FILE`] if it exists.
    #[must_use]
    pub fn new() -> Self {
        Self::from_file(DEFAULT_CONFIG_FILE)
    }

    /// Load `key=value` or `key: value` lines from `path`.
    ///
    /// A missing file is not an error: the file layer is simply empty.
    #[must_use]
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let (file_values, loaded) = load_properties(path);
        Self {
            overrides: RwLock::new(HashMap::new()),
            file_values,
            source: loaded.then(|| path.to_path_buf()),
        }
    }

    /// Use the given pairs as the file layer without touching the filesystem.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            overrides: RwLock::new(HashMap::new()),
            file_values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            source: None,
        }
    }

    /// Builder form of [`ConfigLoader::set_property`].
    #[must_use]
    pub fn with_property(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Set a runtime override. Environment variables still take precedence.
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) {
        self.overrides.write().insert(key.into(), value.into());
    }

    /// Remove a runtime override, returning its previous value.
    pub fn clear_property(&self, key: &str) -> Option<String> {
        self.overrides.write().remove(key)
    }

    /// Path of the properties file, if one was loaded.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Resolve `key` through every layer except the default.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<String> {
        if let Ok(value) = std::env::var(env_key(key)) {
            return Some(value);
        }
        if let Some(value) = self.overrides.read().get(key) {
            return Some(value.clone());
        }
        self.file_values.get(key).cloned()
    }

    /// String value of `key`, or `default`.
    #[must_use]
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.lookup(key).unwrap_or_else(|| default.to_string())
    }

    /// Integer value of `key`, or `default` if absent or not an integer.
    #[must_use]
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get_parsed(key, default, "integer")
    }

    /// Floating-point value of `key`, or `default` if absent or not a number.
    #[must_use]
    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get_parsed(key, default, "number")
    }

    /// Boolean value of `key`.
    ///
    /// A present value is `true` only if it equals `"true"` ignoring case;
    /// anything else reads as `false`. `default` applies only when absent.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.lookup(key)
            .map_or(default, |v| v.eq_ignore_ascii_case("true"))
    }

    fn get_parsed<T>(&self, key: &str, default: T, kind: &str) -> T
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(raw) = self.lookup(key) else {
            return default;
        };
        match raw.parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                error!(key = key, value = %raw, error = %e, "Configuration value is not a valid {kind}");
                default
            }
        }
    }
}

/// Environment variable consulted for `key`.
#[must_use]
pub fn env_key(key: &str) -> String {
    key.to_uppercase().replace('.', "_")
}

/// Returns the parsed pairs and whether the file was found.
fn load_properties(path: &Path) -> (HashMap<String, String>, bool) {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "Configuration file not found, using defaults");
            return (HashMap::new(), false);
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to load configuration file");
            return (HashMap::new(), false);
        }
    };

    let values = parse_properties(&contents);
    info!(path = %path.display(), entries = values.len(), "Loaded configuration file");
    (values, true)
}

/// Parse `.properties` text literally.
///
/// Lines are `key=value`, `key: value` or `key value`. Blank lines and lines
/// starting with `#` or `!` are skipped. A trailing backslash continues the
/// logical line. Values are never interpolated: `$HOME` stays `$HOME`.
fn parse_properties(contents: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    let mut lines = contents.lines();

    while let Some(first) = lines.next() {
        let first = first.trim_start();
        if first.is_empty() || first.starts_with('#') || first.starts_with('!') {
            continue;
        }

        let mut logical = String::from(first);
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical);
        debug!(key = %key, "Configuration entry loaded");
        values.insert(key, value);
    }
    values
}

/// An odd number of trailing backslashes escapes the line break.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (String, String) {
    let mut key = String::new();
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    key.push(unescape(escaped));
                }
            }
            '=' | ':' => return (key, unescape_all(chars.skip_while(|c| c.is_whitespace()))),
            c if c.is_whitespace() => {
                while chars.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                }
                if matches!(chars.peek(), Some('=' | ':')) {
                    chars.next();
                }
                return (key, unescape_all(chars.skip_while(|c| c.is_whitespace())));
            }
            c => key.push(c),
        }
    }
    (key, String::new())
}

fn unescape_all(mut chars: impl Iterator<Item = char>) -> String {
    let mut out = String::new();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(unescape(escaped));
            }
        } else {
            out.push(c);
        }
    }
    out
}

const fn unescape(c: char) -> char {
    match c {
        't' => '\t',
        'n' => '\n',
        'r' => '\r',
        'f' => '\u{c}',
        other => other,
    }
}
