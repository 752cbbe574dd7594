use std::time::Duration;

use clap::Args;
use rateprompt_core::{RequestDelay, RequestOutcome};
use serde_json::json;

use super::Context;

/// Extra wait after the delay so the deferred check has run before exit.
const SETTLE: Duration = Duration::from_millis(50);

#[derive(Args)]
pub struct EvaluateArgs {
    /// Evaluate right now instead of after the configured delay
    #[arg(long, conflicts_with_all = ["never", "delay_ms"])]
    immediate: bool,
    /// Only cancel; never evaluate
    #[arg(long, conflicts_with = "delay_ms")]
    never: bool,
    /// Override the configured delay (milliseconds)
    #[arg(long)]
    delay_ms: Option<u64>,
}

impl EvaluateArgs {
    fn delay(&self, configured: RequestDelay) -> RequestDelay {
        if self.immediate {
            RequestDelay::Immediate
        } else if self.never {
            RequestDelay::Never
        } else if let Some(ms) = self.delay_ms {
            RequestDelay::After(Duration::from_millis(ms))
        } else {
            configured
        }
    }
}

pub fn run(app_version: &str, args: EvaluateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open(app_version)?;
    let delay = args.delay(ctx.config.request_delay());

    let outcome = ctx.scheduler.request_evaluation(delay)?;
    if let (RequestOutcome::Scheduled, RequestDelay::After(wait)) = (outcome, delay) {
        // The sleep must be created inside the runtime
        ctx.runtime.block_on(async { tokio::time::sleep(wait + SETTLE).await });
    }

    let decision = ctx.decided();
    let report = json!({
        "outcome": outcome,
        "pending": ctx.scheduler.pending_state(),
        "prompted": decision.is_some(),
        "decision": decision,
        "counters": ctx.scheduler.snapshot()?,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
