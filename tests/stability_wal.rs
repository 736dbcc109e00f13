//! Crash ledger behaviour across process restarts

use floe::stability::StabilityLedger;
use tempfile::TempDir;

#[test]
fn test_unfinished_run_is_a_crash_after_restart() {
    let dir = TempDir::new().unwrap();
    {
        let ledger = StabilityLedger::open(dir.path(), 3);
        ledger.mark_running("model.shop.orders").unwrap();
        // process dies here
    }

    let ledger = StabilityLedger::open(dir.path(), 3);
    assert!(ledger.was_crash("model.shop.orders").unwrap());
    assert_eq!(ledger.crash_count("model.shop.orders"), 1);

    ledger.mark_running("model.shop.orders").unwrap();
    ledger.mark_success("model.shop.orders").unwrap();
    assert_eq!(ledger.crash_count("model.shop.orders"), 1);

    let reopened = StabilityLedger::open(dir.path(), 3);
    assert_eq!(reopened.crash_count("model.shop.orders"), 1);
    assert!(reopened.snapshot().unwrap().running.is_empty());
}

#[test]
fn test_successful_run_is_not_a_crash() {
    let dir = TempDir::new().unwrap();
    let ledger = StabilityLedger::open(dir.path(), 3);
    ledger.mark_running("model.a").unwrap();
    ledger.mark_success("model.a").unwrap();

    let reopened = StabilityLedger::open(dir.path(), 3);
    assert!(!reopened.was_crash("model.a").unwrap());
    assert_eq!(reopened.savings_report().unwrap().local_runs, 1);
}

#[test]
fn test_blacklist_starts_exactly_at_threshold() {
    let dir = TempDir::new().unwrap();
    let ledger = StabilityLedger::open(dir.path(), 3);
    ledger.mark_crash("model.big", Some("OOM")).unwrap();
    ledger.mark_crash("model.big", None).unwrap();
    assert!(!ledger.is_blacklisted("model.big"));

    ledger.mark_crash("model.big", None).unwrap();
    assert!(ledger.is_blacklisted("model.big"));

    assert!(ledger.clear_crash_history("model.big").unwrap());
    assert!(!ledger.is_blacklisted("model.big"));
}

#[test]
fn test_clear_all_running_converts_markers() {
    let dir = TempDir::new().unwrap();
    let ledger = StabilityLedger::open(dir.path(), 3);
    ledger.mark_running("model.a").unwrap();
    ledger.mark_running("model.b").unwrap();

    assert_eq!(ledger.clear_all_running().unwrap(), 2);
    let reopened = StabilityLedger::open(dir.path(), 3);
    assert_eq!(reopened.crash_count("model.a"), 1);
    assert_eq!(reopened.crash_count("model.b"), 1);
    assert!(reopened.snapshot().unwrap().running.is_empty());
}

#[test]
fn test_corrupt_state_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(floe::stability::STATE_FILE), "{not json").unwrap();
    let ledger = StabilityLedger::open(dir.path(), 3);
    assert_eq!(ledger.crash_count("model.a"), 0);
    ledger.mark_crash("model.a", None).unwrap();
    assert_eq!(StabilityLedger::open(dir.path(), 3).crash_count("model.a"), 1);
}
