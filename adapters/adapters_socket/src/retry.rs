//! Retry Module
//!
//! Loops that repeat a system call while it fails with a transient error. Interrupted
//! calls are retried without limit; resolver "try again" answers are retried a bounded
//! number of times.

/// Repeat `op` for as long as it fails with an error `is_transient` accepts
pub(crate) fn until_settled<T, E>(
    mut op: impl FnMut() -> Result<T, E>,
    is_transient: impl Fn(&E) -> bool,
) -> Result<T, E> {
    loop {
        match op() {
            Err(err) if is_transient(&err) => continue,
            settled => return settled,
        }
    }
}

/// Repeat `op` at most `retries` more times after a transient failure
///
/// # Arguments
///
/// * `retries` - Additional attempts after the first one
/// * `op` - The operation
/// * `is_transient` - Whether a failure is worth another attempt
///
/// # Returns
///
/// The first success, the first non-transient error, or the last transient error once
/// the retries are used up.
pub(crate) fn bounded<T, E>(
    retries: usize,
    mut op: impl FnMut() -> Result<T, E>,
    is_transient: impl Fn(&E) -> bool,
) -> Result<T, E> {
    let mut remaining = retries;
    loop {
        match op() {
            Err(err) if remaining > 0 && is_transient(&err) => {
                remaining -= 1;
                log::trace!("transient failure, {} retries left", remaining);
            }
            settled => return settled,
        }
    }
}
