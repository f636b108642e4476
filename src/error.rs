//! Reduction status codes.
//!
//! A single enum doubles as the success/limit status reported by the driver
//! and as the fault type threaded through internal `Result`s. Faults raised
//! deep inside a tour are caught at the `_ex` wrappers and recorded on the
//! reducer, so callers only ever see a status.

use thiserror::Error;

/// Outcome of a reduction run.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedStatus {
    /// The reduction ran to completion (including auto-abort convergence).
    #[error("success")]
    Success,
    /// Generic block reduction failure (numeric fault outside LLL/enumeration).
    #[error("failure: general block reduction error")]
    BkzFailure,
    /// The time budget was exhausted at a tour boundary.
    #[error("failure: time limit exceeded in block reduction")]
    BkzTimeLimit,
    /// The loop budget was exhausted at a tour boundary.
    #[error("failure: loop limit exceeded in block reduction")]
    BkzLoopsLimit,
    /// Enumeration hit a numeric fault (non-finite centers or norms).
    #[error("failure: error in enumeration")]
    EnumFailure,
    /// Nearest-plane size reduction hit a numeric fault.
    #[error("failure: error in Babai nearest-plane reduction")]
    BabaiFailure,
    /// LLL hit a numeric fault (precision loss, overflow, stalled loop).
    #[error("failure: error in LLL reduction")]
    LllFailure,
    /// Invalid parameters, reported before any basis mutation.
    #[error("failure: invalid parameters")]
    ParamFailure,
}

impl RedStatus {
    pub fn is_success(self) -> bool {
        matches!(self, RedStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(RedStatus::Success.to_string(), "success");
        assert!(RedStatus::LllFailure.to_string().contains("LLL"));
        assert!(RedStatus::Success.is_success());
        assert!(!RedStatus::BkzTimeLimit.is_success());
    }
}
