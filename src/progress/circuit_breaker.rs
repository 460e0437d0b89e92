use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open { tripped_at: Instant },
    HalfOpen,
}

/// Stops hammering the remote tier after repeated flush failures.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: u8,
    last_failure_time: Option<Instant>,
    trip_threshold: u8,
    trip_window: Duration,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(trip_threshold: u8) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            trip_threshold: trip_threshold.max(1),
            trip_window: Duration::from_secs(120),
            cooldown: Duration::from_secs(60),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn is_request_allowed(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open { tripped_at } => {
                if tripped_at.elapsed() >= self.cooldown {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.last_failure_time = None;
        self.state = CircuitState::Closed;
    }

    pub fn record_failure(&mut self) {
        let now = Instant::now();

        if let Some(last_fail) = self.last_failure_time {
            if now.duration_since(last_fail) > self.trip_window {
                self.failure_count = 1;
            } else {
                self.failure_count = self.failure_count.saturating_add(1);
            }
        } else {
            self.failure_count = 1;
        }

        self.last_failure_time = Some(now);

        if self.state == CircuitState::HalfOpen || self.failure_count >= self.trip_threshold {
            self.state = CircuitState::Open { tripped_at: now };
            tracing::warn!(
                "Remote progress circuit opened, failure_count={}",
                self.failure_count
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_threshold() {
        let mut breaker = CircuitBreaker::new(2);
        breaker.record_failure();
        assert!(breaker.is_request_allowed());
        breaker.record_failure();
        assert!(!breaker.is_request_allowed());
    }

    #[test]
    fn half_opens_after_cooldown_and_closes_on_success() {
        let mut breaker = CircuitBreaker::new(1).with_cooldown(Duration::ZERO);
        breaker.record_failure();
        assert!(matches!(breaker.state(), CircuitState::Open { .. }));

        assert!(breaker.is_request_allowed());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn failed_half_open_call_reopens() {
        let mut breaker = CircuitBreaker::new(3).with_cooldown(Duration::ZERO);
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert!(breaker.is_request_allowed());
        breaker.record_failure();
        assert!(matches!(breaker.state(), CircuitState::Open { .. }));
    }
}
