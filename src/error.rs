//! Error and outcome types shared by the draw engine, the runner and the
//! test-harness helpers.
//!
//! Draws return [`DrawResult`], so strategies propagate overruns and
//! discards with `?` instead of unwinding. Only [`Failure`] (an interesting
//! trial) and [`CheckError`] (a harness verdict) ever reach the caller.

use std::time::Duration;

use thiserror::Error;

/// Result of every draw made against a `ConjectureData`.
pub type DrawResult<T> = Result<T, DrawError>;

/// Reasons a draw could not produce a value.
///
/// `Overrun` and `Discard` are the normal "this example is invalid" outcomes
/// and are recovered by the runner. The remaining variants indicate a
/// strategy asked for something impossible, and end the run with
/// `RunResult::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DrawError {
    /// The draw needed more bytes than the buffer (or `max_length`) allows.
    #[error("overran the end of the buffer")]
    Overrun,

    /// The example was rejected, by a filter or an explicit assumption.
    #[error("example discarded: {0}")]
    Discard(&'static str),

    /// Attempted to draw after the data was frozen.
    #[error("cannot draw from frozen data")]
    Frozen,

    /// `min > max` for a bounded integer draw.
    #[error("invalid range: min_value > max_value")]
    InvalidRange,

    /// Weighted choice over no weights, or weights with no positive mass.
    #[error("weighted choice needs at least one positive finite weight")]
    EmptyWeights,
}

impl DrawError {
    /// True for the outcomes caused by running out of bytes.
    pub fn is_overrun(&self) -> bool {
        matches!(self, DrawError::Overrun)
    }

    /// True for a misconfigured strategy rather than an unlucky example.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            DrawError::Frozen | DrawError::InvalidRange | DrawError::EmptyWeights
        )
    }
}

/// Why a trial was marked interesting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    /// The property returned `false`.
    #[error("property returned false")]
    Falsified,

    /// The property panicked.
    #[error("property panicked: {0}")]
    Panicked(String),

    /// The property ran past the configured per-trial deadline.
    #[error("deadline exceeded: took {elapsed:?}, allowed {deadline:?}")]
    DeadlineExceeded { elapsed: Duration, deadline: Duration },
}

impl Failure {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Failure::DeadlineExceeded { .. })
    }
}

/// Verdicts returned by the harness helpers in [`crate::harness`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    /// A generated value failed the check. `value` is the `Debug` rendering of
    /// the minimized counterexample.
    #[error("falsifying example: {value} ({failure})")]
    Falsified { value: String, failure: Failure },

    /// `find_any` ran out of budget without the condition ever holding.
    #[error("no example satisfying the condition found in {valid} examples")]
    NoExampleFound { valid: u32 },

    /// Too many examples were discarded to finish the run.
    #[error("unable to satisfy assumptions: {valid} valid examples, {invalid} discarded")]
    Exhausted { valid: u32, invalid: u32 },

    /// The strategy cannot produce values at all, e.g. `integers(5, 1)`.
    #[error("invalid strategy: {0}")]
    InvalidArgument(DrawError),

    /// The minimized buffer did not reproduce a value on final replay.
    #[error("failing example could not be replayed")]
    Flaky,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(DrawError::Overrun.to_string(), "overran the end of the buffer");
        assert_eq!(
            DrawError::Discard("filter").to_string(),
            "example discarded: filter"
        );
        let err = CheckError::Falsified {
            value: "-1".to_string(),
            failure: Failure::Falsified,
        };
        assert_eq!(
            err.to_string(),
            "falsifying example: -1 (property returned false)"
        );
    }

    #[test]
    fn test_classification() {
        assert!(DrawError::Overrun.is_overrun());
        assert!(!DrawError::Discard("x").is_overrun());
        assert!(DrawError::InvalidRange.is_usage_error());
        assert!(DrawError::EmptyWeights.is_usage_error());
        assert!(!DrawError::Discard("x").is_usage_error());
        assert!(!DrawError::Overrun.is_usage_error());
        assert!(Failure::DeadlineExceeded {
            elapsed: Duration::from_millis(5),
            deadline: Duration::from_millis(1),
        }
        .is_timeout());
        assert!(!Failure::Falsified.is_timeout());
    }
}
