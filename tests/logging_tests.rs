use tldr::setup_logging;

#[test]
fn test_logging_setup() {
    let result = std::panic::catch_unwind(|| {
        setup_logging();
    });

    assert!(result.is_ok(), "setup_logging function should not panic");
}

#[test]
fn test_logging_setup_is_repeatable() {
    // The bot binary and the test harness may both install a subscriber.
    setup_logging();
    setup_logging();
    tracing::info!("still logging after a second setup");
}
