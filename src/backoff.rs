use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

const MAX_EXPONENT: u32 = 10;

/// Exponential backoff with full jitter
///
/// Each call to [`next_delay`](Self::next_delay) returns a random delay in
/// `[0, base * 2^exp]` and bumps the exponent, capped at 2^10. If the
/// previous delay was handed out long ago (more than the largest possible
/// delay) the exponent starts over. Delays saturate at [`Duration::MAX`].
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    exp: u32,
    last_invocation: Option<Instant>,
}

impl ExponentialBackoff {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            exp: 0,
            last_invocation: None,
        }
    }

    /// Largest delay this backoff can ever return
    pub fn max_delay(&self) -> Duration {
        self.scaled(MAX_EXPONENT)
    }

    /// Upper bound of the delay the next call may return
    pub fn ceiling(&self) -> Duration {
        self.scaled(self.exp)
    }

    fn scaled(&self, exp: u32) -> Duration {
        self.base.checked_mul(1 << exp).unwrap_or(Duration::MAX)
    }

    pub fn next_delay(&mut self) -> Duration {
        let now = Instant::now();
        if let Some(last) = self.last_invocation {
            if now.duration_since(last) > self.max_delay() {
                self.exp = 0;
            }
        }
        self.last_invocation = Some(now);

        let ceiling = self.ceiling();
        self.exp = (self.exp + 1).min(MAX_EXPONENT);

        let secs = rand::thread_rng().gen_range(0.0..=ceiling.as_secs_f64());
        Duration::try_from_secs_f64(secs).map_or(ceiling, |delay| delay.min(ceiling))
    }

    pub fn reset(&mut self) {
        self.exp = 0;
        self.last_invocation = None;
    }
}
