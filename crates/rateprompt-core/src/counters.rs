//! Persisted usage counters and the store they live in.
//!
//! Counters are scoped to one application version: sessions, significant
//! events and the first-open date accumulate under the version recorded in
//! `current_app_version_for_counters` and are wiped together by
//! [`CounterStore::reset_rating_counters`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Read-only copy of the counters the policy looks at.
///
/// Handed to the decision observer on every positive decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub last_version_prompted_for_rating: Option<String>,
    pub rating_events_count: i64,
    pub app_sessions_count: i64,
    pub first_open_date: Option<DateTime<Utc>>,
}

/// Storage capability for rating counters.
///
/// Each field has its own getter and setter so any key-value backend can
/// implement it directly. Multi-field sequences (resets, snapshots) are
/// provided on top and rely on the caller holding exclusive access.
pub trait CounterStore: Send {
    /// Updated with the live app version whenever a prompt is shown.
    fn last_version_prompted_for_rating(&self) -> Result<Option<String>, StoreError>;
    fn set_last_version_prompted_for_rating(
        &mut self,
        version: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Weighted significant-event count for the current version.
    fn rating_events_count(&self) -> Result<i64, StoreError>;
    fn set_rating_events_count(&mut self, count: i64) -> Result<(), StoreError>;

    /// Session count for the current version.
    fn app_sessions_count(&self) -> Result<i64, StoreError>;
    fn set_app_sessions_count(&mut self, count: i64) -> Result<(), StoreError>;

    /// First session of the current version.
    fn first_open_date(&self) -> Result<Option<DateTime<Utc>>, StoreError>;
    fn set_first_open_date(&mut self, date: Option<DateTime<Utc>>) -> Result<(), StoreError>;

    /// Version the counters above were accumulated under.
    fn current_app_version_for_counters(&self) -> Result<Option<String>, StoreError>;
    fn set_current_app_version_for_counters(
        &mut self,
        version: Option<&str>,
    ) -> Result<(), StoreError>;

    fn snapshot(&self) -> Result<CounterSnapshot, StoreError> {
        Ok(CounterSnapshot {
            last_version_prompted_for_rating: self.last_version_prompted_for_rating()?,
            rating_events_count: self.rating_events_count()?,
            app_sessions_count: self.app_sessions_count()?,
            first_open_date: self.first_open_date()?,
        })
    }

    /// Clear sessions, events and first-open date.
    ///
    /// Leaves both version fields untouched.
    fn reset_rating_counters(&mut self) -> Result<(), StoreError> {
        self.set_first_open_date(None)?;
        self.set_app_sessions_count(0)?;
        self.set_rating_events_count(0)?;
        Ok(())
    }

    /// Reset the counters, then record `version` as the one they belong to.
    ///
    /// The version is written last: if the reset fails the stored version
    /// still differs from the live one and the next start retries.
    fn begin_version_window(&mut self, version: &str) -> Result<(), StoreError> {
        self.reset_rating_counters()?;
        self.set_current_app_version_for_counters(Some(version))
    }

    /// Record a shown prompt: reset the counters, then stamp `version` as
    /// the last one prompted for.
    ///
    /// A failed reset leaves the version gate open.
    fn mark_prompted(&mut self, version: Option<&str>) -> Result<(), StoreError> {
        self.reset_rating_counters()?;
        self.set_last_version_prompted_for_rating(version)
    }
}

/// In-memory counter store.
///
/// Starts empty, like a fresh install. Useful for embedding hosts that
/// persist elsewhere and for tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryCounterStore {
    pub last_version_prompted_for_rating: Option<String>,
    pub rating_events_count: i64,
    pub app_sessions_count: i64,
    pub first_open_date: Option<DateTime<Utc>>,
    pub current_app_version_for_counters: Option<String>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for MemoryCounterStore {
    fn last_version_prompted_for_rating(&self) -> Result<Option<String>, StoreError> {
        Ok(self.last_version_prompted_for_rating.clone())
    }

    fn set_last_version_prompted_for_rating(
        &mut self,
        version: Option<&str>,
    ) -> Result<(), StoreError> {
        self.last_version_prompted_for_rating = version.map(str::to_string);
        Ok(())
    }

    fn rating_events_count(&self) -> Result<i64, StoreError> {
        Ok(self.rating_events_count)
    }

    fn set_rating_events_count(&mut self, count: i64) -> Result<(), StoreError> {
        self.rating_events_count = count;
        Ok(())
    }

    fn app_sessions_count(&self) -> Result<i64, StoreError> {
        Ok(self.app_sessions_count)
    }

    fn set_app_sessions_count(&mut self, count: i64) -> Result<(), StoreError> {
        self.app_sessions_count = count;
        Ok(())
    }

    fn first_open_date(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.first_open_date)
    }

    fn set_first_open_date(&mut self, date: Option<DateTime<Utc>>) -> Result<(), StoreError> {
        self.first_open_date = date;
        Ok(())
    }

    fn current_app_version_for_counters(&self) -> Result<Option<String>, StoreError> {
        Ok(self.current_app_version_for_counters.clone())
    }

    fn set_current_app_version_for_counters(
        &mut self,
        version: Option<&str>,
    ) -> Result<(), StoreError> {
        self.current_app_version_for_counters = version.map(str::to_string);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> MemoryCounterStore {
        MemoryCounterStore {
            last_version_prompted_for_rating: Some("41".into()),
            rating_events_count: 7,
            app_sessions_count: 3,
            first_open_date: Some(Utc::now()),
            current_app_version_for_counters: Some("42".into()),
        }
    }

    #[test]
    fn reset_clears_accumulators_only() {
        let mut store = populated();
        store.reset_rating_counters().unwrap();

        assert_eq!(store.app_sessions_count, 0);
        assert_eq!(store.rating_events_count, 0);
        assert!(store.first_open_date.is_none());
        assert_eq!(store.last_version_prompted_for_rating.as_deref(), Some("41"));
        assert_eq!(store.current_app_version_for_counters.as_deref(), Some("42"));
    }

    #[test]
    fn snapshot_copies_the_four_policy_fields() {
        let store = populated();
        let snapshot = store.snapshot().unwrap();

        assert_eq!(snapshot.last_version_prompted_for_rating.as_deref(), Some("41"));
        assert_eq!(snapshot.rating_events_count, 7);
        assert_eq!(snapshot.app_sessions_count, 3);
        assert_eq!(snapshot.first_open_date, store.first_open_date);
    }

    #[test]
    fn fresh_store_is_empty() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.snapshot().unwrap(), CounterSnapshot::default());
        assert!(store.current_app_version_for_counters().unwrap().is_none());
    }
}
