use std::time::Duration;

/// Reconnect schedule: the same delay every time, no retry ceiling
#[derive(Debug)]
pub struct FixedDelay {
    delay: Duration,
    current_attempt: u32,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            current_attempt: 0,
        }
    }

    /// Delay to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        self.current_attempt = self.current_attempt.saturating_add(1);

        log::warn!(
            "⏳ Reconnect attempt {} in {}s",
            self.current_attempt,
            self.delay.as_secs_f64()
        );

        self.delay
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}
