//! Headless-browser session automation for Substack.
//!
//! Substack has no API for signing in or publishing, so quill drives a real
//! browser through the same pages a person would use. [`AutomationService`]
//! owns the session lifecycle:
//!
//! * create a session (one headless browser each)
//! * sign in with an email and a one-time code, or an emailed link
//! * persist the captured cookies and local storage to a JSON store
//! * reconnect a logged-in session after a restart by replaying that bundle
//! * publish or draft posts through the editor
//! * sweep old browsers and old records on a schedule
//!
//! Element lookups are [`locator::Cascade`]s: ordered strategies from most to
//! least specific, so small page changes degrade to a logged fallback rather
//! than a failure.

pub mod browser;
pub mod cleanup;
pub mod clock;
pub mod config;
mod context;
pub mod credential;
pub mod error;
pub mod extract;
pub mod locator;
mod login;
pub mod provider;
pub mod publish;
mod reconnect;
pub mod registry;
pub mod selectors;
pub mod service;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use browser::{BrowserLauncher, BrowserPage, ChromeLauncher};
pub use cleanup::{CleanupReport, spawn_scheduler};
pub use clock::{Clock, SystemClock};
pub use config::{AutomationConfig, CleanupPolicy, CredentialConfig, Timeouts};
pub use error::{QuillError, Result};
pub use provider::Provider;
pub use service::AutomationService;
pub use store::SessionStore;

pub use quill_protocol as protocol;
