//! # rateprompt Core Library
//!
//! Decides when to ask a user for an in-app rating and manages the single
//! deferred, cancellable request that performs the ask.
//!
//! ## Architecture
//!
//! - **Policy**: a pure evaluator over usage counters (days since first
//!   open, sessions, significant events, app-version gate)
//! - **Scheduler**: owns the counter store and at most one pending request;
//!   resets counters on app upgrades and after every prompt
//! - **Storage**: SQLite-backed counter store and TOML-based configuration
//! - **Host**: traits for the app version, the native prompt and the clock
//!
//! ## Key Components
//!
//! - [`RequestScheduler`]: debounced request manager
//! - [`should_prompt`]: the policy decision
//! - [`CounterStore`]: storage capability for counters
//! - [`Config`]: thresholds and request delay on disk

pub mod counters;
pub mod error;
pub mod host;
pub mod policy;
pub mod scheduler;
pub mod storage;

pub use counters::{CounterSnapshot, CounterStore, MemoryCounterStore};
pub use error::{ConfigError, CoreError, StoreError};
pub use host::{AppVersionProvider, Clock, EnvVersion, ManualClock, PromptInvoker, StaticVersion, SystemClock};
pub use policy::{evaluate, should_prompt, DecisionObserver, PolicyVerdict, PromptConfig, Thresholds};
pub use scheduler::{
    Executor, HostServices, ManualExecutor, PendingState, RequestDelay, RequestOutcome,
    RequestScheduler, TokioExecutor, DEFAULT_REQUEST_DELAY,
};
pub use storage::{data_dir, Config, SqliteCounterStore};
