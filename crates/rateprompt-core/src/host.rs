//! Capabilities the host application provides to the scheduler.
//!
//! The core never talks to a platform directly. The live application
//! version, the native rating dialog and the wall clock all come in through
//! these traits, so platform branching stays in the host integration.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of the live application version.
pub trait AppVersionProvider: Send + Sync {
    /// The running build's version, or `None` when it cannot be determined.
    fn current_version(&self) -> Option<String>;
}

impl<F> AppVersionProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn current_version(&self) -> Option<String> {
        self()
    }
}

/// A version fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticVersion(Option<String>);

impl StaticVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(Some(version.into()))
    }

    pub fn unknown() -> Self {
        Self(None)
    }
}

impl AppVersionProvider for StaticVersion {
    fn current_version(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Reads the version from an environment variable on every call.
///
/// Unset or empty variables count as an unknown version.
#[derive(Debug, Clone)]
pub struct EnvVersion {
    var: String,
}

impl EnvVersion {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl AppVersionProvider for EnvVersion {
    fn current_version(&self) -> Option<String> {
        std::env::var(&self.var).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Presents the native rating prompt.
///
/// Fire-and-forget. Platform-level rate limiting is the implementation's
/// business, not the scheduler's.
pub trait PromptInvoker: Send + Sync {
    fn present_rating_prompt(&self);
}

impl<F> PromptInvoker for F
where
    F: Fn() + Send + Sync,
{
    fn present_rating_prompt(&self) {
        self()
    }
}

/// Wall clock used for first-open dates and the days gate.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
