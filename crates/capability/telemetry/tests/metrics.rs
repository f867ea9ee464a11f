use gw_telemetry::{metrics, record_persist_failure, record_register_read_failed};

#[test]
fn counters_are_monotonic() {
    let before = metrics().snapshot();
    record_register_read_failed();
    record_persist_failure();
    let after = metrics().snapshot();
    assert!(after.register_reads_failed > before.register_reads_failed);
    assert!(after.persist_failures > before.persist_failures);
}
