//! Output formatting helpers for CLI commands

use crate::routing::{RoutingDecision, Venue};
use crate::stability::{SavingsReport, StateDocument};
use crate::sync::{SyncResult, SyncStats};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

/// Colored venue label
pub fn venue_label(venue: Venue) -> String {
    match venue {
        Venue::Local => venue.as_str().green().bold().to_string(),
        Venue::Cloud => venue.as_str().cyan().bold().to_string(),
    }
}

/// One-line decision summary
pub fn format_decision(model: &str, decision: &RoutingDecision) -> String {
    let gate = decision
        .gate
        .map(|g| format!("Gate {}: ", g))
        .unwrap_or_default();
    let details = decision
        .details
        .as_deref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default();
    format!(
        "{} → {} - {}{}{}",
        model,
        venue_label(decision.venue),
        gate,
        decision.reason.description(),
        details
    )
}

/// Format a decision as JSON
pub fn format_decision_json(
    model: &str,
    policy: &str,
    decision: &RoutingDecision,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&json!({
        "model": model,
        "policy": policy,
        "decision": decision,
    }))
}

/// Format crash ledger state as a table
pub fn format_crash_table(state: &StateDocument, max_crash_count: u32) -> String {
    let mut table = new_table(vec!["Model", "Crashes", "Last Crash", "Last Error", "Status"]);

    for (model, record) in &state.crashes {
        let status = if record.count >= max_crash_count {
            "Blacklisted".red().to_string()
        } else {
            "Watching".yellow().to_string()
        };
        let last_error = record
            .history
            .last()
            .map(|event| event.error.as_str())
            .unwrap_or("-");
        table.add_row(vec![
            Cell::new(model),
            Cell::new(record.count),
            Cell::new(
                record
                    .last_crash
                    .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(last_error),
            Cell::new(status),
        ]);
    }

    for (model, marker) in &state.running {
        table.add_row(vec![
            Cell::new(model),
            Cell::new("-"),
            Cell::new(marker.started_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new("Run in progress or interrupted"),
            Cell::new("Running".cyan().to_string()),
        ]);
    }

    table.to_string()
}

/// Format run savings as a short summary
pub fn format_savings(report: &SavingsReport) -> String {
    format!(
        "Runs: {} local, {} cloud ({:.1}% local) · {} model(s) with crash history",
        report.local_runs, report.cloud_runs, report.local_percentage, report.crashed_models
    )
}

/// Format crash ledger state as JSON
pub fn format_crash_json(
    state: &StateDocument,
    report: &SavingsReport,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&json!({
        "state": state,
        "savings": report,
    }))
}

/// Format sync ledger stats as a table
pub fn format_sync_stats_table(stats: &SyncStats) -> String {
    let mut table = new_table(vec!["Metric", "Value"]);
    let rate = format!("{:.1}%", stats.success_rate);
    let rate = if stats.total == 0 || stats.success_rate >= 99.0 {
        rate.green().to_string()
    } else if stats.success_rate >= 90.0 {
        rate.yellow().to_string()
    } else {
        rate.red().to_string()
    };

    table.add_row(vec![Cell::new("Period"), Cell::new(format!("{}h", stats.period_hours))]);
    table.add_row(vec![Cell::new("Total syncs"), Cell::new(stats.total)]);
    table.add_row(vec![Cell::new("Successful"), Cell::new(stats.successful)]);
    table.add_row(vec![Cell::new("Verified"), Cell::new(stats.verified)]);
    table.add_row(vec![Cell::new("Failed"), Cell::new(stats.failed)]);
    table.add_row(vec![Cell::new("Success rate"), Cell::new(rate)]);
    table.add_row(vec![
        Cell::new("Avg duration"),
        Cell::new(format!("{:.2}s", stats.avg_duration_seconds)),
    ]);
    table.add_row(vec![Cell::new("Rows synced"), Cell::new(stats.total_rows)]);

    table.to_string()
}

/// Format failed syncs as a table
pub fn format_failures_table(failures: &[SyncResult]) -> String {
    let mut table = new_table(vec!["Table", "Direction", "Kind", "Attempts", "Error", "At"]);
    for f in failures {
        table.add_row(vec![
            Cell::new(&f.table_id),
            Cell::new(format!("{} → {}", f.source_engine, f.target_engine)),
            Cell::new(f.error_kind.as_str()),
            Cell::new(f.attempt),
            Cell::new(f.error.as_deref().unwrap_or("-")),
            Cell::new(f.synced_at.format("%Y-%m-%d %H:%M:%S").to_string()),
        ]);
    }
    table.to_string()
}

/// Format sync health as JSON
pub fn format_sync_health_json(
    stats: &SyncStats,
    failures: &[SyncResult],
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&json!({
        "stats": stats,
        "failures": failures,
    }))
}
