use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Fixed number of attempts with a linearly growing pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    Exhausted(E),
    Cancelled,
}

impl RetryPolicy {
    pub fn run<T, E, F>(&self, operation: &str, stop: &AtomicBool, op: F) -> Result<T, RetryError<E>>
    where
        E: std::fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        self.run_while(operation, stop, op, |_| true)
    }

    /// Like [`RetryPolicy::run`], but gives up at once on errors `retryable` rejects.
    pub fn run_while<T, E, F, P>(
        &self,
        operation: &str,
        stop: &AtomicBool,
        mut op: F,
        retryable: P,
    ) -> Result<T, RetryError<E>>
    where
        E: std::fmt::Display,
        F: FnMut() -> Result<T, E>,
        P: Fn(&E) -> bool,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            if stop.load(Ordering::Relaxed) {
                return Err(RetryError::Cancelled);
            }

            match op() {
                Ok(value) => return Ok(value),
                Err(error) if !retryable(&error) => {
                    tracing::warn!(operation, attempt, error = %error, "permanent failure, not retrying");
                    return Err(RetryError::Exhausted(error));
                }
                Err(error) if attempt >= attempts => {
                    tracing::warn!(operation, attempt, error = %error, "giving up after final attempt");
                    return Err(RetryError::Exhausted(error));
                }
                Err(error) => {
                    let pause = self.backoff * attempt;
                    tracing::warn!(
                        operation,
                        attempt,
                        retry_in_ms = pause.as_millis() as u64,
                        error = %error,
                        "attempt failed, retrying"
                    );
                    if !sleep_unless_stopped(pause, stop) {
                        return Err(RetryError::Cancelled);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Sleeps for `duration` in short slices. Returns `false` when `stop` was raised.
pub fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let slice = remaining.min(SLEEP_SLICE);
        std::thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
    !stop.load(Ordering::Relaxed)
}
