//! Single pending request slot.
//!
//! ## State Transitions
//!
//! ```text
//! Absent -> Scheduled -> Firing -> Fired
//!                    \-> Cancelled
//! ```
//!
//! `Fired` and `Cancelled` are terminal. A new request never revives an old
//! action; it cancels it and installs a fresh one.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingState {
    /// Nothing was ever scheduled.
    Absent,
    /// Waiting for its delay to elapse.
    Scheduled,
    /// Delay elapsed, decision in progress. Cancellation no longer applies.
    Firing,
    Fired,
    Cancelled,
}

/// Shared handle between the scheduler slot and the deferred task.
///
/// Every transition happens under the token's lock, so a cancel and a fire
/// racing each other resolve to exactly one winner.
#[derive(Debug, Clone)]
pub(crate) struct ActionToken {
    id: u64,
    state: Arc<Mutex<PendingState>>,
}

impl ActionToken {
    fn scheduled(id: u64) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(PendingState::Scheduled)),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn state(&self) -> PendingState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `Scheduled -> Cancelled`. Returns false when there was nothing to cancel.
    pub(crate) fn cancel(&self) -> bool {
        self.transition(PendingState::Scheduled, PendingState::Cancelled)
    }

    /// `Scheduled -> Firing`. Returns false when the action must not run.
    pub(crate) fn begin_fire(&self) -> bool {
        self.transition(PendingState::Scheduled, PendingState::Firing)
    }

    pub(crate) fn finish_fire(&self) {
        self.transition(PendingState::Firing, PendingState::Fired);
    }

    fn transition(&self, from: PendingState, to: PendingState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }
}

/// Slot holding the latest action, if any.
#[derive(Debug, Default)]
pub(crate) struct PendingSlot {
    current: Option<ActionToken>,
    next_id: u64,
}

impl PendingSlot {
    pub(crate) fn state(&self) -> PendingState {
        self.current
            .as_ref()
            .map(ActionToken::state)
            .unwrap_or(PendingState::Absent)
    }

    /// Cancel the current action if it is still scheduled.
    pub(crate) fn cancel(&self) -> bool {
        self.current.as_ref().map(ActionToken::cancel).unwrap_or(false)
    }

    /// Cancel the current action, then install and return a new one.
    pub(crate) fn replace(&mut self) -> ActionToken {
        self.cancel();
        self.next_id += 1;
        let token = ActionToken::scheduled(self.next_id);
        self.current = Some(token.clone());
        token
    }
}
