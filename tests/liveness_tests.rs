//! Tests for slow liveness-check classification

use dbtrack::LivenessThresholds;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_tiering() {
    let thresholds = LivenessThresholds::default();

    assert_eq!(thresholds.level_for(Duration::from_millis(120)), None);
    assert_eq!(
        thresholds.level_for(Duration::from_millis(750)),
        Some(Level::INFO)
    );
    assert_eq!(
        thresholds.level_for(Duration::from_millis(1500)),
        Some(Level::WARN)
    );
    assert_eq!(
        thresholds.level_for(Duration::from_secs(10)),
        Some(Level::ERROR)
    );
}

#[test]
fn test_log_slow_check_does_not_panic_without_pid() {
    let thresholds = LivenessThresholds::default();
    thresholds.log_slow_check(Duration::from_millis(1200), None);
    thresholds.log_slow_check(Duration::from_millis(10), Some(4242));
}

#[test]
fn test_subsecond_thresholds() {
    let thresholds = LivenessThresholds {
        info_ms: 5,
        warn_ms: 50,
        error_ms: 500,
    };

    assert_eq!(
        thresholds.level_for(Duration::from_millis(6)),
        Some(Level::INFO)
    );
    assert_eq!(
        thresholds.level_for(Duration::from_millis(501)),
        Some(Level::ERROR)
    );
}
