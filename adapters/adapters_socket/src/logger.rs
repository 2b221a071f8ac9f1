//! Logger Module
//!
//! Sink for operator-facing warnings such as a buffer size the kernel refused to grant.
//! Diagnostics that only matter while debugging go straight to the `log` facade instead.

/// Receiver of transport warnings
#[cfg_attr(test, mockall::automock)]
pub trait WarningSink {
    fn warning(&self, message: &str);
}

/// Forwards warnings to the `log` facade at `warn` level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWarningSink;

impl WarningSink for LogWarningSink {
    fn warning(&self, message: &str) {
        log::warn!("{}", message);
    }
}
