use rateprompt_core::CounterStore;
use serde_json::json;

use super::Context;

pub fn session(app_version: &str) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open(app_version)?;
    ctx.scheduler.record_session()?;
    println!("{}", serde_json::to_string_pretty(&ctx.scheduler.snapshot()?)?);
    Ok(())
}

pub fn event(app_version: &str, weight: i64) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open(app_version)?;
    ctx.scheduler.record_significant_event(weight)?;
    println!("{}", serde_json::to_string_pretty(&ctx.scheduler.snapshot()?)?);
    Ok(())
}

pub fn reset(app_version: &str) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open(app_version)?;
    ctx.scheduler.reset_counters()?;
    println!("{}", serde_json::to_string_pretty(&ctx.scheduler.snapshot()?)?);
    Ok(())
}

pub fn status(app_version: &str) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::open(app_version)?;
    let verdict = ctx.scheduler.verdict()?;
    let counters_version = ctx
        .scheduler
        .with_store(|store| store.current_app_version_for_counters())?;

    let status = json!({
        "app_version": app_version,
        "counters_version": counters_version,
        "counters": ctx.scheduler.snapshot()?,
        "thresholds": ctx.config.thresholds,
        "verdict": verdict,
        "eligible": verdict.passed(),
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
