//! Slow liveness-check classification
//!
//! A liveness probe that takes longer than usual is an early signal of a
//! saturated server or a degrading network path. Probes are timed and the
//! elapsed round trip is logged through tiered thresholds; fast checks stay
//! silent.

use std::time::Duration;
use tracing::{error, info, warn, Level};

/// Latency thresholds for liveness-check logging, in milliseconds.
///
/// A check strictly slower than a threshold is logged at that tier's level.
#[derive(Debug, Clone)]
pub struct LivenessThresholds {
    /// Elapsed ms above which the check is logged at INFO
    pub info_ms: u64,
    /// Elapsed ms above which the check is logged at WARN
    pub warn_ms: u64,
    /// Elapsed ms above which the check is logged at ERROR
    pub error_ms: u64,
}

impl Default for LivenessThresholds {
    fn default() -> Self {
        Self {
            info_ms: 500,
            warn_ms: 1000,
            error_ms: 3000,
        }
    }
}

impl LivenessThresholds {
    /// Classify an elapsed round trip into a log level.
    ///
    /// Returns `None` for checks at or under the INFO threshold.
    #[must_use]
    pub fn level_for(&self, elapsed: Duration) -> Option<Level> {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        if ms > self.error_ms {
            Some(Level::ERROR)
        } else if ms > self.warn_ms {
            Some(Level::WARN)
        } else if ms > self.info_ms {
            Some(Level::INFO)
        } else {
            None
        }
    }

    /// Log a slow liveness check against the session it was run on.
    pub fn log_slow_check(&self, elapsed: Duration, backend_pid: Option<i32>) {
        let ms = elapsed.as_millis();
        let pid = backend_pid.unwrap_or(0);
        match self.level_for(elapsed) {
            Some(level) if level == Level::ERROR => {
                error!("{ms} ms to check liveness on connection with backend pid {pid}");
            }
            Some(level) if level == Level::WARN => {
                warn!("{ms} ms to check liveness on connection with backend pid {pid}");
            }
            Some(_) => {
                info!("{ms} ms to check liveness on connection with backend pid {pid}");
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let thresholds = LivenessThresholds::default();
        assert_eq!(thresholds.info_ms, 500);
        assert_eq!(thresholds.warn_ms, 1000);
        assert_eq!(thresholds.error_ms, 3000);
    }

    #[test]
    fn test_fast_checks_stay_silent() {
        let thresholds = LivenessThresholds::default();
        assert_eq!(thresholds.level_for(Duration::from_millis(0)), None);
        assert_eq!(thresholds.level_for(Duration::from_millis(500)), None);
    }

    #[test]
    fn test_tier_boundaries_are_strict() {
        let thresholds = LivenessThresholds::default();
        assert_eq!(
            thresholds.level_for(Duration::from_millis(501)),
            Some(Level::INFO)
        );
        assert_eq!(
            thresholds.level_for(Duration::from_millis(1000)),
            Some(Level::INFO)
        );
        assert_eq!(
            thresholds.level_for(Duration::from_millis(1001)),
            Some(Level::WARN)
        );
        assert_eq!(
            thresholds.level_for(Duration::from_millis(3001)),
            Some(Level::ERROR)
        );
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = LivenessThresholds {
            info_ms: 10,
            warn_ms: 20,
            error_ms: 30,
        };
        assert_eq!(
            thresholds.level_for(Duration::from_millis(15)),
            Some(Level::INFO)
        );
        assert_eq!(
            thresholds.level_for(Duration::from_millis(25)),
            Some(Level::WARN)
        );
        assert_eq!(
            thresholds.level_for(Duration::from_millis(31)),
            Some(Level::ERROR)
        );
    }
}
