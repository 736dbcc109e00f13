//! Sync health command implementation

use crate::cli::output::{format_failures_table, format_sync_health_json, format_sync_stats_table};
use crate::cli::{CliResult, SyncHealthArgs};
use crate::config::FloeConfig;
use crate::sync::SyncLedger;

/// Handle `floe sync-health`
pub fn handle_sync_health(args: &SyncHealthArgs, config: &FloeConfig) -> CliResult<String> {
    let ledger = SyncLedger::open(config.sync_ledger_path())?;
    let stats = ledger.stats(args.hours)?;
    let failures = ledger.failed_syncs(args.hours)?;

    if args.json {
        return Ok(format_sync_health_json(&stats, &failures)?);
    }

    let mut output = format_sync_stats_table(&stats);
    if failures.is_empty() {
        output.push_str("\n✓ No failed syncs");
    } else {
        output.push_str(&format!(
            "\n✗ {} failed sync(s); their targets may be stale:\n{}",
            failures.len(),
            format_failures_table(&failures)
        ));
    }
    Ok(output)
}
