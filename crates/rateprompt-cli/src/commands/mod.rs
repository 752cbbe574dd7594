pub mod config;
pub mod counters;
pub mod evaluate;

use std::sync::{Arc, Mutex};

use rateprompt_core::{
    CounterSnapshot, HostServices, RequestScheduler, SqliteCounterStore, StaticVersion,
    TokioExecutor,
};

pub const APP_VERSION_ENV: &str = "RATEPROMPT_APP_VERSION";

/// `--app-version`, then `$RATEPROMPT_APP_VERSION`, then this binary's version.
pub fn resolve_app_version(flag: Option<String>) -> String {
    flag.filter(|v| !v.trim().is_empty())
        .or_else(|| {
            std::env::var(APP_VERSION_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
        })
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
}

/// A scheduler over the on-disk store, driven by a local tokio runtime.
pub struct Context {
    pub runtime: tokio::runtime::Runtime,
    pub scheduler: RequestScheduler<SqliteCounterStore>,
    pub config: rateprompt_core::Config,
    /// Snapshot handed to the decision observer, if a prompt happened.
    pub decision: Arc<Mutex<Option<CounterSnapshot>>>,
}

impl Context {
    pub fn open(app_version: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        let config = rateprompt_core::Config::load()?;

        let decision = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&decision);
        let prompt_config = config.prompt_config().on_decision(move |snapshot| {
            tracing::info!(?snapshot, "rating prompt decision");
            *sink.lock().unwrap_or_else(|e| e.into_inner()) = Some(snapshot);
        });

        let host = HostServices::new(
            Arc::new(StaticVersion::new(app_version)),
            Arc::new(|| eprintln!("rating prompt presented")),
            Arc::new(TokioExecutor::new(runtime.handle().clone())),
        );
        let scheduler = RequestScheduler::new(prompt_config, SqliteCounterStore::open()?, host)?;

        Ok(Self {
            runtime,
            scheduler,
            config,
            decision,
        })
    }

    pub fn decided(&self) -> Option<CounterSnapshot> {
        self.decision
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
