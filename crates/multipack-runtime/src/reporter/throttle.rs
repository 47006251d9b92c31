//! Progress throttling.
//!
//! Rate-limits progress updates per target to avoid flooding the terminal.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use multipack_core::{Progress, Target};

/// Default interval between two progress updates of one target.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Rate-limiter for progress updates.
///
/// Ensures progress events are not emitted more frequently than the
/// configured interval.
pub struct ProgressThrottle {
    last_emit: Option<Instant>,
    min_interval: Duration,
}

impl ProgressThrottle {
    /// Create a new throttle with the specified minimum interval.
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: None,
            min_interval,
        }
    }

    /// Check if enough time has passed to emit another progress update.
    pub fn should_emit(&mut self) -> bool {
        let now = Instant::now();
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }

    /// Force the next check to return true.
    pub const fn reset(&mut self) {
        self.last_emit = None;
    }
}

/// One throttle per target. 0% and 100% always pass.
pub struct ProgressLimiter {
    interval: Duration,
    per_target: HashMap<Target, ProgressThrottle>,
}

impl ProgressLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            per_target: HashMap::new(),
        }
    }

    /// Whether `progress` should be rendered.
    pub fn admit(&mut self, progress: &Progress) -> bool {
        let throttle = self
            .per_target
            .entry(progress.target.clone())
            .or_insert_with(|| ProgressThrottle::new(self.interval));

        if progress.is_boundary() {
            // A finished build must not delay the first update of the next one.
            throttle.reset();
            if progress.value <= 0.0 {
                throttle.should_emit();
            }
            return true;
        }
        throttle.should_emit()
    }
}

impl Default for ProgressLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(target: &str, value: f64) -> Progress {
        Progress {
            target: Target::new(target).unwrap(),
            value,
            label: String::new(),
        }
    }

    #[test]
    fn test_throttle_respects_interval() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(50));
        assert!(throttle.should_emit());
        assert!(!throttle.should_emit()); // Too soon

        std::thread::sleep(Duration::from_millis(60));
        assert!(throttle.should_emit()); // Enough time passed
    }

    #[test]
    fn test_throttle_reset() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(10));
        throttle.should_emit();
        assert!(!throttle.should_emit());

        throttle.reset();
        assert!(throttle.should_emit());
    }

    #[test]
    fn test_boundaries_never_dropped() {
        let mut limiter = ProgressLimiter::new(Duration::from_secs(60));
        assert!(limiter.admit(&progress("ios", 0.0)));
        assert!(!limiter.admit(&progress("ios", 0.3)));
        assert!(!limiter.admit(&progress("ios", 0.6)));
        assert!(limiter.admit(&progress("ios", 1.0)));
        assert!(limiter.admit(&progress("ios", 0.0)));
        assert!(limiter.admit(&progress("ios", 1.0)));
    }

    #[test]
    fn test_targets_limited_independently() {
        let mut limiter = ProgressLimiter::new(Duration::from_secs(60));
        assert!(limiter.admit(&progress("ios", 0.2)));
        assert!(limiter.admit(&progress("android", 0.2)));
        assert!(!limiter.admit(&progress("ios", 0.4)));
        assert!(!limiter.admit(&progress("android", 0.4)));
    }
}
