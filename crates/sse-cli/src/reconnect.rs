//! Bounded reconnect backoff for the watch command

use std::time::Duration;

/// Exponential backoff without jitter
#[derive(Clone, Copy, Debug)]
pub struct Backoff {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
        }
    }
}

impl Backoff {
    /// Use the server's `retry:` hint as the starting delay
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay.min(self.max_delay);
        self
    }

    /// Delay before reconnect attempt number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let initial = self.initial_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();
        let exponent = self.factor.powf(f64::from(attempt));
        Duration::from_secs_f64((initial * exponent).min(max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let backoff = Backoff::default();

        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(8));
        assert_eq!(backoff.delay(10), Duration::from_secs(30));
    }

    #[test]
    fn test_server_hint_sets_initial_delay() {
        let backoff = Backoff::default().with_initial_delay(Duration::from_millis(500));

        assert_eq!(backoff.delay(0), Duration::from_millis(500));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
    }

    #[test]
    fn test_hint_is_capped() {
        let backoff = Backoff::default().with_initial_delay(Duration::from_secs(600));
        assert_eq!(backoff.delay(0), Duration::from_secs(30));
    }
}
