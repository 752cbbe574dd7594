//! Rating request scheduler.
//!
//! Owns the counter store and the single pending request. Usage signals go
//! in through [`RequestScheduler::record_session`] and
//! [`RequestScheduler::record_significant_event`]; both cancel whatever is
//! pending so a deferred prompt never lands on top of fresh user activity.
//! [`RequestScheduler::request_evaluation`] then either decides right away
//! or schedules a one-shot re-check on the host's [`Executor`].
//!
//! ## Usage
//!
//! ```ignore
//! let scheduler = RequestScheduler::new(config, store, host)?;
//! scheduler.record_session()?;
//! scheduler.request_evaluation(RequestDelay::default())?;
//! ```
//!
//! The policy is evaluated when the request fires, not when it is
//! scheduled. Mutating calls are expected to come from one logical owner;
//! internal locks only make the deferred fire safe against that owner.

mod executor;
mod pending;

pub use executor::{Executor, ManualExecutor, Task, TokioExecutor};
pub use pending::PendingState;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::counters::{CounterSnapshot, CounterStore};
use crate::error::Result;
use crate::host::{AppVersionProvider, Clock, PromptInvoker, SystemClock};
use crate::policy::{self, PolicyVerdict, PromptConfig};
use pending::{ActionToken, PendingSlot};

/// Delay used when the caller has no preference.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(2);

/// When a requested evaluation should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDelay {
    /// Evaluate synchronously.
    Immediate,
    /// Evaluate once the duration has elapsed.
    After(Duration),
    /// Only cancel what is pending.
    Never,
}

impl Default for RequestDelay {
    fn default() -> Self {
        RequestDelay::After(DEFAULT_REQUEST_DELAY)
    }
}

impl From<Option<Duration>> for RequestDelay {
    /// `None` means "immediately".
    fn from(delay: Option<Duration>) -> Self {
        match delay {
            Some(d) => RequestDelay::After(d),
            None => RequestDelay::Immediate,
        }
    }
}

/// What a call to [`RequestScheduler::request_evaluation`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// Evaluated immediately and the prompt was presented.
    Prompted,
    /// Evaluated immediately and the policy said no.
    NotEligible,
    /// A deferred re-check is pending.
    Scheduled,
    /// `RequestDelay::Never`: pending work cancelled, nothing scheduled.
    Suppressed,
}

/// Host capabilities the scheduler runs against.
#[derive(Clone)]
pub struct HostServices {
    pub version: Arc<dyn AppVersionProvider>,
    pub prompt: Arc<dyn PromptInvoker>,
    pub executor: Arc<dyn Executor>,
    pub clock: Arc<dyn Clock>,
}

impl HostServices {
    /// Services backed by the system clock.
    pub fn new(
        version: Arc<dyn AppVersionProvider>,
        prompt: Arc<dyn PromptInvoker>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            version,
            prompt,
            executor,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// State reachable from deferred tasks.
struct Shared<S> {
    config: PromptConfig,
    store: Mutex<S>,
    version: Arc<dyn AppVersionProvider>,
    prompt: Arc<dyn PromptInvoker>,
    clock: Arc<dyn Clock>,
}

impl<S: CounterStore> Shared<S> {
    fn lock_store(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn live_version(&self) -> Option<String> {
        let version = self.version.current_version();
        if version.is_none() {
            warn!("application version unavailable; check the host version provider");
        }
        version
    }

    /// Start a fresh accumulation window when the app version changed.
    fn check_version(&self) -> Result<()> {
        let Some(live) = self.live_version() else {
            return Ok(());
        };

        let mut store = self.lock_store();
        let stored = store.current_app_version_for_counters()?;
        if stored.as_deref() == Some(live.as_str()) {
            return Ok(());
        }

        info!(
            from = stored.as_deref().unwrap_or("none"),
            to = %live,
            "app version changed, resetting rating counters"
        );
        store.begin_version_window(&live)?;
        Ok(())
    }

    fn verdict(&self) -> Result<PolicyVerdict> {
        let version = self.live_version();
        let snapshot = self.lock_store().snapshot()?;
        Ok(policy::evaluate(
            &snapshot,
            &self.config.thresholds,
            version.as_deref(),
            self.clock.now(),
        ))
    }

    /// Evaluate the policy and, on a yes, prompt and persist.
    ///
    /// Snapshot, version stamp, reset and observer all happen under one
    /// store lock. The observer runs only once the stamp and reset are
    /// stored; the prompt itself runs after the lock is released.
    fn decide(&self) -> Result<bool> {
        let version = self.live_version();
        {
            let mut store = self.lock_store();
            let snapshot = store.snapshot()?;
            let verdict = policy::evaluate(
                &snapshot,
                &self.config.thresholds,
                version.as_deref(),
                self.clock.now(),
            );
            if !verdict.passed() {
                debug!(?verdict, "rating prompt conditions not met");
                return Ok(false);
            }

            // Counters restart so repeat prompts are possible with ignore_app_version
            store.mark_prompted(version.as_deref())?;
            if let Some(observer) = &self.config.on_decision {
                observer(snapshot);
            }
        }

        info!(version = version.as_deref().unwrap_or("unknown"), "presenting rating prompt");
        self.prompt.present_rating_prompt();
        Ok(true)
    }

    fn fire(&self, token: &ActionToken) {
        if !token.begin_fire() {
            debug!(request = token.id(), "skipping cancelled rating request");
            return;
        }

        match self.decide() {
            Ok(true) => debug!(request = token.id(), "deferred rating request prompted"),
            Ok(false) => debug!(request = token.id(), "deferred rating request not eligible"),
            Err(e) => error!(request = token.id(), "deferred rating request failed: {e}"),
        }
        token.finish_fire();
    }
}

/// Debounced, cancellable rating request manager.
pub struct RequestScheduler<S: CounterStore + 'static> {
    shared: Arc<Shared<S>>,
    pending: Mutex<PendingSlot>,
    executor: Arc<dyn Executor>,
}

impl<S: CounterStore + 'static> RequestScheduler<S> {
    /// Create a scheduler, resetting the counters if the app version changed
    /// since they were accumulated.
    ///
    /// # Errors
    /// Returns an error if the counter store fails.
    pub fn new(config: PromptConfig, store: S, host: HostServices) -> Result<Self> {
        let shared = Arc::new(Shared {
            config,
            store: Mutex::new(store),
            version: host.version,
            prompt: host.prompt,
            clock: host.clock,
        });
        shared.check_version()?;

        Ok(Self {
            shared,
            pending: Mutex::new(PendingSlot::default()),
            executor: host.executor,
        })
    }

    // ── Signals ──────────────────────────────────────────────────────

    /// Count an app session.
    ///
    /// Sets the first-open date on the first session of this version.
    pub fn record_session(&self) -> Result<()> {
        self.cancel_pending();

        let now = self.shared.clock.now();
        let mut store = self.shared.lock_store();
        let sessions = store.app_sessions_count()?;
        store.set_app_sessions_count(sessions.saturating_add(1))?;
        if store.first_open_date()?.is_none() {
            store.set_first_open_date(Some(now))?;
        }
        Ok(())
    }

    /// Count a significant event with weight 1.
    pub fn record_event(&self) -> Result<()> {
        self.record_significant_event(1)
    }

    /// Count a significant event.
    ///
    /// `weight` is not validated; a negative weight decrements the count.
    pub fn record_significant_event(&self, weight: i64) -> Result<()> {
        self.cancel_pending();

        let mut store = self.shared.lock_store();
        let events = store.rating_events_count()?;
        store.set_rating_events_count(events.saturating_add(weight))?;
        Ok(())
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Ask for a rating prompt, subject to the policy.
    ///
    /// Always cancels the pending request first. Deferred requests evaluate
    /// the policy when they fire.
    ///
    /// # Errors
    /// Returns an error if an immediate evaluation hits a store failure.
    pub fn request_evaluation(&self, delay: RequestDelay) -> Result<RequestOutcome> {
        match delay {
            RequestDelay::Never => {
                self.cancel_pending();
                Ok(RequestOutcome::Suppressed)
            }
            RequestDelay::Immediate => {
                self.cancel_pending();
                if self.shared.decide()? {
                    Ok(RequestOutcome::Prompted)
                } else {
                    Ok(RequestOutcome::NotEligible)
                }
            }
            RequestDelay::After(duration) => {
                let mut slot = self.lock_pending();
                let token = slot.replace();
                info!(request = token.id(), delay = ?duration, "rating request scheduled");

                let shared = Arc::clone(&self.shared);
                self.executor
                    .schedule(duration, Box::new(move || shared.fire(&token)));
                Ok(RequestOutcome::Scheduled)
            }
        }
    }

    /// Cancel the pending request if it has not started firing.
    ///
    /// Safe to call at any time; returns whether anything was cancelled.
    pub fn cancel_pending(&self) -> bool {
        let cancelled = self.lock_pending().cancel();
        if cancelled {
            info!("cancelling pending rating request");
        }
        cancelled
    }

    /// Clear sessions, events and first-open date.
    ///
    /// Cancels the pending request as well, since its counters are gone.
    pub fn reset_counters(&self) -> Result<()> {
        self.cancel_pending();
        self.shared.lock_store().reset_rating_counters()?;
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn pending_state(&self) -> PendingState {
        self.lock_pending().state()
    }

    pub fn snapshot(&self) -> Result<CounterSnapshot> {
        Ok(self.shared.lock_store().snapshot()?)
    }

    /// Policy breakdown against the current counters. No side effects.
    pub fn verdict(&self) -> Result<PolicyVerdict> {
        self.shared.verdict()
    }

    pub fn app_version(&self) -> Option<String> {
        self.shared.version.current_version()
    }

    pub fn config(&self) -> &PromptConfig {
        &self.shared.config
    }

    /// Read the underlying store.
    pub fn with_store<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.shared.lock_store())
    }

    fn lock_pending(&self) -> MutexGuard<'_, PendingSlot> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<S: CounterStore + 'static> Drop for RequestScheduler<S> {
    fn drop(&mut self) {
        // A request must not outlive its owner
        self.lock_pending().cancel();
    }
}
