//! Monotonic timers with `start`/`on`/`lerp` semantics.
//!
//! All reads within one tick must use the `now` passed into that tick's
//! `UpdateState` call, not wall-clock time taken mid-computation, or a
//! single tick could observe a timer flip from on to off partway through.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Timer {
    duration: Duration,
    expires_at: Option<Instant>,
}

impl Timer {
    pub fn new(duration: Duration) -> Self {
        Timer {
            duration,
            expires_at: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.expires_at = Some(now + self.duration);
    }

    pub fn on(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(expiry) if expiry > now)
    }

    /// `a + (b - a) * (1 - remaining/duration)`. An off timer returns `b`.
    pub fn lerp(&self, now: Instant, a: f64, b: f64) -> f64 {
        let Some(expiry) = self.expires_at else {
            return b;
        };
        if expiry <= now {
            return b;
        }
        let remaining = (expiry - now).as_secs_f64();
        let total = self.duration.as_secs_f64();
        if total <= 0.0 {
            return b;
        }
        let frac = 1.0 - (remaining / total).clamp(0.0, 1.0);
        a + (b - a) * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn fresh_timer_is_off() {
        let timer = Timer::new(Duration::from_millis(100));
        assert!(!timer.on(Instant::now()));
    }

    #[test]
    fn started_timer_is_on_until_expiry() {
        let mut timer = Timer::new(Duration::from_millis(100));
        let start = Instant::now();
        timer.start(start);
        assert!(timer.on(start));
        assert!(!timer.on(start + Duration::from_millis(101)));
    }

    #[test]
    fn lerp_returns_b_when_off() {
        let timer = Timer::new(Duration::from_millis(100));
        assert_approx_eq!(timer.lerp(Instant::now(), 1.0, 2.0), 2.0);
    }

    #[test]
    fn lerp_returns_a_just_after_start() {
        let mut timer = Timer::new(Duration::from_millis(100));
        let start = Instant::now();
        timer.start(start);
        assert_approx_eq!(timer.lerp(start, 1.0, 2.0), 1.0, 1e-2);
    }

    #[test]
    fn lerp_moves_toward_b_as_time_elapses() {
        let mut timer = Timer::new(Duration::from_millis(100));
        let start = Instant::now();
        timer.start(start);
        let mid = timer.lerp(start + Duration::from_millis(50), 0.0, 1.0);
        assert_approx_eq!(mid, 0.5, 1e-2);
    }
}
