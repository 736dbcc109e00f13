//! Stability command implementations

use crate::cli::output::{format_crash_json, format_crash_table, format_savings};
use crate::cli::{CliResult, StabilityClearArgs, StabilityStatusArgs};
use crate::config::FloeConfig;
use crate::stability::StabilityLedger;

fn open_ledger(config: &FloeConfig) -> StabilityLedger {
    StabilityLedger::open(config.state_dir(), config.stability.max_crash_count)
}

/// Handle `floe stability status`
pub fn handle_stability_status(args: &StabilityStatusArgs, config: &FloeConfig) -> CliResult<String> {
    let ledger = open_ledger(config);
    let state = ledger.snapshot()?;
    let report = ledger.savings_report()?;

    if args.json {
        return Ok(format_crash_json(&state, &report)?);
    }

    if state.crashes.is_empty() && state.running.is_empty() {
        return Ok(format!("✓ No crash history\n{}", format_savings(&report)));
    }
    Ok(format!(
        "{}\n{}",
        format_crash_table(&state, ledger.max_crash_count()),
        format_savings(&report)
    ))
}

/// Handle `floe stability clear <ID>`
pub fn handle_stability_clear(args: &StabilityClearArgs, config: &FloeConfig) -> CliResult<String> {
    if open_ledger(config).clear_crash_history(&args.model_id)? {
        Ok(format!("✓ Cleared crash history for {}", args.model_id))
    } else {
        Ok(format!("No crash history for {}", args.model_id))
    }
}

/// Handle `floe stability clear-running`
pub fn handle_stability_clear_running(config: &FloeConfig) -> CliResult<String> {
    let converted = open_ledger(config).clear_all_running()?;
    Ok(format!("✓ Recorded {} interrupted run(s) as crashes", converted))
}
