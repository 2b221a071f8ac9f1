//! Timeout Module
//!
//! Shared timeout policy for connect, accept and readiness waits. The signed-millisecond
//! form used at the API boundary maps as follows: `0` returns immediately, a negative value
//! blocks indefinitely, a positive value bounds the wait.

use std::time::Duration;

/// Wait policy for blocking socket operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeout {
    /// Do not wait; report "not ready" at once
    Immediate,
    /// Wait at most this long
    After(Duration),
    /// Wait until the operation completes
    Infinite,
}

impl Timeout {
    /// Build a timeout from signed milliseconds
    pub fn from_millis(ms: i64) -> Self {
        match ms {
            0 => Timeout::Immediate,
            ms if ms < 0 => Timeout::Infinite,
            ms => Timeout::After(Duration::from_millis(ms as u64)),
        }
    }

    /// Signed-millisecond form
    ///
    /// Bounded waits are rounded up so that a sub-millisecond wait never degrades into an
    /// immediate return.
    pub fn as_millis(&self) -> i64 {
        match self {
            Timeout::Immediate => 0,
            Timeout::Infinite => -1,
            Timeout::After(d) => {
                let mut ms = d.as_millis();
                if d.subsec_nanos() % 1_000_000 != 0 {
                    ms += 1;
                }
                i64::try_from(ms).unwrap_or(i64::MAX)
            }
        }
    }

    /// Millisecond argument for `poll`-style waits, saturated to `i32::MAX`
    pub fn as_poll_millis(&self) -> i32 {
        let ms = self.as_millis();
        if ms < 0 {
            -1
        } else {
            i32::try_from(ms).unwrap_or(i32::MAX)
        }
    }

    pub fn is_immediate(&self) -> bool {
        self.as_millis() == 0
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Timeout::Infinite)
    }
}

impl From<i32> for Timeout {
    fn from(ms: i32) -> Self {
        Timeout::from_millis(ms as i64)
    }
}

impl From<i64> for Timeout {
    fn from(ms: i64) -> Self {
        Timeout::from_millis(ms)
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Timeout::Immediate
        } else {
            Timeout::After(d)
        }
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(d: Option<Duration>) -> Self {
        d.map(Timeout::from).unwrap_or(Timeout::Infinite)
    }
}
