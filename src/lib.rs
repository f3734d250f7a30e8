//! # browseruse
//!
//! Building blocks for a browser-automation agent: a bounded task scheduler,
//! an HTML parsing adapter, a placeholder LLM service and layered
//! configuration.
//!
//! ## Task scheduling
//!
//! [`SimpleTaskScheduler`](core::SimpleTaskScheduler) runs blocking closures on
//! a bounded pool of dedicated OS threads. Each submission returns a
//! [`TaskHandle`](core::TaskHandle) that completes exactly once: with success,
//! the task's error, a panic, or a timeout.
//!
//! ```rust,ignore
//! use browseruse::core::{SimpleTaskScheduler, Task, TaskScheduler};
//! use browseruse::config::SchedulerConfig;
//!
//! let scheduler = SimpleTaskScheduler::new(SchedulerConfig::new().with_pool_size(4))?;
//!
//! let handle = scheduler.execute_async(Task::new(|| println!("working")));
//! handle.wait()?;
//!
//! // Batches complete once every member has finished.
//! let batch = scheduler.execute_async_tasks(vec![
//!     Task::new(|| {}),
//!     Task::fallible(|| anyhow::bail!("page not found")),
//! ]);
//! assert!(batch.wait().is_err());
//!
//! scheduler.shutdown();
//! ```
//!
//! Under saturation (every worker busy and the backlog full) the submitting
//! thread runs the task itself, which throttles producers.
//!
//! ## Configuration
//!
//! [`ConfigLoader`](config::ConfigLoader) resolves keys from the environment,
//! then per-instance overrides, then `application.properties`, then the
//! caller's default.
//!
//! ## Browser, HTML and LLM
//!
//! [`browser::BrowserController`], [`html::HtmlParser`] and
//! [`llm::LlmService`] are the seams the harness binary drives; see
//! `src/bin/harness.rs`. The `chromium` feature (on by default) adds
//! [`browser::ChromiumBrowserController`].

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Browser automation seam and the Chromium adapter.
pub mod browser;
/// Task scheduling: handles, the bounded pool and the scheduler.
pub mod core;
/// Layered configuration and typed settings.
pub mod config;
/// HTML parsing adapter.
pub mod html;
/// Language-model service seam.
pub mod llm;
/// Shared utilities.
pub mod util;
