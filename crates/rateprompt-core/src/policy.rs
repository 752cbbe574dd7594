//! Rating prompt policy.
//!
//! Combines four independent gates into one decision:
//!
//! - **Days**: wall-clock time since the first session of this version
//! - **Sessions**: number of counted app sessions
//! - **Events**: weighted count of significant events
//! - **Version**: the live version has not been prompted yet (unless
//!   `ignore_app_version` is set)
//!
//! Evaluation is pure. The caller supplies the counters, the live version
//! and `now`, so the same inputs always produce the same verdict.
//!
//! Thresholds are not validated. A negative threshold is trivially met by
//! any non-negative counter, which is exactly what the comparisons produce.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::counters::CounterSnapshot;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Prompt thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum days since the first session before prompting.
    #[serde(default)]
    pub days_until_prompt: i64,
    /// Sessions required before prompting.
    #[serde(default)]
    pub sessions_until_prompt: i64,
    /// Weighted significant events required before prompting.
    #[serde(default)]
    pub events_until_prompt: i64,
    /// Set to false to limit prompting to once per app version.
    #[serde(default)]
    pub ignore_app_version: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            days_until_prompt: 0,
            sessions_until_prompt: 0,
            events_until_prompt: 0,
            ignore_app_version: false,
        }
    }
}

impl Thresholds {
    pub fn new(days_until_prompt: i64, sessions_until_prompt: i64, events_until_prompt: i64) -> Self {
        Self {
            days_until_prompt,
            sessions_until_prompt,
            events_until_prompt,
            ignore_app_version: false,
        }
    }

    pub fn ignoring_app_version(mut self, ignore: bool) -> Self {
        self.ignore_app_version = ignore;
        self
    }
}

/// Handler invoked once per positive decision with the pre-prompt counters.
pub type DecisionObserver = Arc<dyn Fn(CounterSnapshot) + Send + Sync>;

/// Thresholds plus the optional decision observer.
#[derive(Clone, Default)]
pub struct PromptConfig {
    pub thresholds: Thresholds,
    pub on_decision: Option<DecisionObserver>,
}

impl PromptConfig {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            on_decision: None,
        }
    }

    /// Attach a decision observer.
    ///
    /// The observer runs while the counter store is held; it must not call
    /// back into the scheduler that owns this config.
    pub fn on_decision<F>(mut self, observer: F) -> Self
    where
        F: Fn(CounterSnapshot) + Send + Sync + 'static,
    {
        self.on_decision = Some(Arc::new(observer));
        self
    }
}

impl fmt::Debug for PromptConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptConfig")
            .field("thresholds", &self.thresholds)
            .field("on_decision", &self.on_decision.as_ref().map(|_| "<observer>"))
            .finish()
    }
}

/// Outcome of each gate for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub days_passed: bool,
    pub sessions_passed: bool,
    pub events_passed: bool,
    pub version_passed: bool,
}

impl PolicyVerdict {
    /// True when every gate is open.
    pub fn passed(&self) -> bool {
        self.days_passed && self.sessions_passed && self.events_passed && self.version_passed
    }
}

/// Evaluate every gate against the given counters.
///
/// `current_version` is `None` when the host cannot determine its version;
/// it then only equals an absent `last_version_prompted_for_rating`.
pub fn evaluate(
    counters: &CounterSnapshot,
    thresholds: &Thresholds,
    current_version: Option<&str>,
    now: DateTime<Utc>,
) -> PolicyVerdict {
    PolicyVerdict {
        days_passed: days_passed(counters.first_open_date, thresholds.days_until_prompt, now),
        sessions_passed: counters.app_sessions_count >= thresholds.sessions_until_prompt,
        events_passed: counters.rating_events_count >= thresholds.events_until_prompt,
        version_passed: thresholds.ignore_app_version
            || counters.last_version_prompted_for_rating.as_deref() != current_version,
    }
}

/// Whether every condition to prompt is satisfied.
pub fn should_prompt(
    counters: &CounterSnapshot,
    thresholds: &Thresholds,
    current_version: Option<&str>,
    now: DateTime<Utc>,
) -> bool {
    evaluate(counters, thresholds, current_version, now).passed()
}

fn days_passed(first_open: Option<DateTime<Utc>>, days_until_prompt: i64, now: DateTime<Utc>) -> bool {
    match first_open {
        // No session counted yet: only a zero-day threshold is met
        None => days_until_prompt == 0,
        Some(first_open) => {
            let elapsed_ms = (now - first_open).num_milliseconds();
            elapsed_ms >= days_until_prompt.saturating_mul(MILLIS_PER_DAY)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn counters(sessions: i64, events: i64, first_open: Option<DateTime<Utc>>) -> CounterSnapshot {
        CounterSnapshot {
            last_version_prompted_for_rating: None,
            rating_events_count: events,
            app_sessions_count: sessions,
            first_open_date: first_open,
        }
    }

    #[test]
    fn zero_thresholds_ignoring_version_always_pass() {
        let thresholds = Thresholds::default().ignoring_app_version(true);
        let now = Utc::now();
        let mut c = counters(0, 0, None);
        c.last_version_prompted_for_rating = Some("1.0".into());

        assert!(should_prompt(&c, &thresholds, Some("1.0"), now));
        assert!(should_prompt(&c, &thresholds, None, now));
    }

    #[test]
    fn missing_first_open_only_passes_zero_days() {
        let now = Utc::now();
        let c = counters(10, 10, None);

        let verdict = evaluate(&c, &Thresholds::new(0, 0, 0), Some("1"), now);
        assert!(verdict.days_passed);

        let verdict = evaluate(&c, &Thresholds::new(1, 0, 0), Some("1"), now);
        assert!(!verdict.days_passed);
        assert!(!verdict.passed());
    }

    #[test]
    fn days_use_elapsed_time_not_calendar_days() {
        let first_open = Utc::now();
        let thresholds = Thresholds::new(2, 0, 0);
        let c = counters(0, 0, Some(first_open));

        let almost = first_open + Duration::days(2) - Duration::milliseconds(1);
        assert!(!evaluate(&c, &thresholds, Some("1"), almost).days_passed);

        let exactly = first_open + Duration::days(2);
        assert!(evaluate(&c, &thresholds, Some("1"), exactly).days_passed);
    }

    #[test]
    fn clock_behind_first_open_fails_zero_days() {
        let first_open = Utc::now();
        let c = counters(0, 0, Some(first_open));
        let verdict = evaluate(&c, &Thresholds::default(), Some("1"), first_open - Duration::seconds(5));
        assert!(!verdict.days_passed);
    }

    #[test]
    fn session_and_event_thresholds_are_inclusive() {
        let now = Utc::now();
        let thresholds = Thresholds::new(0, 3, 5);

        assert!(!evaluate(&counters(2, 5, None), &thresholds, Some("1"), now).sessions_passed);
        assert!(evaluate(&counters(3, 5, None), &thresholds, Some("1"), now).sessions_passed);
        assert!(!evaluate(&counters(3, 4, None), &thresholds, Some("1"), now).events_passed);
        assert!(should_prompt(&counters(3, 5, None), &thresholds, Some("1"), now));
    }

    #[test]
    fn negative_thresholds_are_trivially_met() {
        let now = Utc::now();
        let thresholds = Thresholds::new(-1, -5, -5);
        assert!(should_prompt(&counters(0, 0, Some(now)), &thresholds, Some("1"), now));
    }

    #[test]
    fn version_gate_blocks_same_version() {
        let now = Utc::now();
        let mut c = counters(0, 0, None);
        c.last_version_prompted_for_rating = Some("7".into());
        let thresholds = Thresholds::default();

        assert!(!evaluate(&c, &thresholds, Some("7"), now).version_passed);
        assert!(evaluate(&c, &thresholds, Some("8"), now).version_passed);
    }

    #[test]
    fn unknown_version_matches_only_absent_record() {
        let now = Utc::now();
        let thresholds = Thresholds::default();
        let mut c = counters(0, 0, None);

        // Never prompted and version unknown: gate closed
        assert!(!evaluate(&c, &thresholds, None, now).version_passed);

        c.last_version_prompted_for_rating = Some("7".into());
        assert!(evaluate(&c, &thresholds, None, now).version_passed);
    }

    #[test]
    fn prompt_config_debug_hides_observer() {
        let config = PromptConfig::new(Thresholds::default()).on_decision(|_| {});
        let rendered = format!("{config:?}");
        assert!(rendered.contains("<observer>"));
    }
}
