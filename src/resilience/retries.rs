//! Bounded retry.

use std::fmt::Display;

/// Run `op` until it succeeds or `max_attempts` attempts have failed.
///
/// `op` receives the 1-based attempt number. On success returns the value and
/// the attempt that produced it; otherwise the last error. A bound of zero is
/// treated as one attempt.
pub fn retry_bounded<T, E, F>(max_attempts: u32, mut op: F) -> Result<(T, u32), E>
where
    E: Display,
    F: FnMut(u32) -> Result<T, E>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok((value, attempt)),
            Err(e) if attempt < max_attempts => {
                tracing::warn!(attempt, max_attempts, error = %e, "Attempt failed, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
