//! Capture rate limiting.

use std::time::{Duration, Instant};

use tracing::warn;

/// Lets at most one frame through per `1 / rate` seconds.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Option<Duration>,
    last: Option<Instant>,
}

impl RateLimiter {
    /// `None` disables limiting. Non-finite or non-positive rates are treated as `None`.
    pub fn new(rate_hz: Option<f32>) -> Self {
        let min_interval = match rate_hz {
            Some(rate) if rate.is_finite() && rate > 0.0 => {
                Some(Duration::from_secs_f64(1.0 / rate as f64))
            }
            Some(rate) => {
                warn!("Ignoring invalid capture rate {}", rate);
                None
            }
            None => None,
        };
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    pub fn allow_at(&mut self, now: Instant) -> bool {
        let Some(min_interval) = self.min_interval else {
            return true;
        };
        match self.last {
            Some(last) if now.saturating_duration_since(last) < min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
