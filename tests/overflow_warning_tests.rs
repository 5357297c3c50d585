//! Buffer overflow is reported through rate-limited `log` warnings.

use std::time::Duration;

use femtologging_ws::{
    TransportConfig,
    test_utils::{CoreHarness, ScriptedOutcome, ScriptedRemote},
};
use logtest::Logger;
use serial_test::serial;

fn overflow_warnings(logger: &mut Logger) -> Vec<String> {
    let mut found = Vec::new();
    while let Some(record) = logger.pop() {
        if record.level() == log::Level::Warn && record.args().contains("oldest envelopes") {
            found.push(record.args().to_owned());
        }
    }
    found
}

#[test]
#[serial]
fn overflow_warnings_are_rate_limited() {
    let mut logger = Logger::start();
    let mut config = TransportConfig::new("ws://collector.test/logs").with_max_buffer_size(1);
    config.warn_interval = Duration::from_secs(3600);
    let remote = ScriptedRemote::with_fallback(ScriptedOutcome::Pending);
    let mut harness = CoreHarness::connected(config, remote);

    harness.write("first");
    harness.write("second");
    let warnings = overflow_warnings(&mut logger);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("buffer full; dropped 1 oldest"));

    harness.write("third");
    harness.write("fourth");
    assert!(overflow_warnings(&mut logger).is_empty());

    harness.core.close();
    let warnings = overflow_warnings(&mut logger);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("dropped 2 oldest envelopes before close"));
}
