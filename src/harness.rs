//! Test-harness helpers built on the runner.
//!
//! These drive a strategy through a [`ConjectureRunner`] with a plain value
//! predicate and hand back either a value or a [`CheckError`]:
//!
//! - [`assert_all_examples`] checks a predicate holds for every generated
//!   value and reports a minimized counterexample otherwise.
//! - [`find_any`] searches for any value satisfying a predicate, without
//!   shrinking.
//! - [`minimal`] searches for a value satisfying a predicate and shrinks it.
//!
//! Every returned value is re-drawn from the final buffer, so what the caller
//! sees is exactly what replaying that buffer produces.

use std::fmt::Debug;

use log::debug;

use crate::data::{ConjectureData, ConjectureResult};
use crate::engine::{ConjectureRunner, RunResult, RunnerConfig};
use crate::error::{CheckError, DrawResult, Failure};
use crate::strategy::Strategy;

/// Examples `find_any` tries before giving up.
pub const FIND_ANY_EXAMPLES: u32 = 10_000;

/// Examples `minimal` tries while looking for a first match.
pub const MINIMAL_EXAMPLES: u32 = 50_000;

/// Draw a value from `strategy` by replaying `buffer`.
pub fn replay_value<S: Strategy>(strategy: &S, buffer: &[u8]) -> DrawResult<S::Value> {
    let mut data = ConjectureData::for_buffer(buffer.to_vec());
    data.draw(strategy)
}

/// Settings shared by the helpers: `from_env` with the per-trial deadline
/// switched off.
pub fn harness_config() -> RunnerConfig {
    RunnerConfig::from_env().with_deadline(None)
}

fn run_predicate<S, P>(runner: &mut ConjectureRunner, strategy: &S, predicate: P, interesting_when: bool) -> RunResult
where
    S: Strategy,
    P: Fn(&S::Value) -> bool,
{
    runner.run(|data| {
        let value = data.draw(strategy)?;
        Ok(predicate(&value) != interesting_when)
    })
}

fn counterexample<S>(strategy: &S, result: &ConjectureResult) -> Result<S::Value, CheckError>
where
    S: Strategy,
{
    replay_value(strategy, &result.buffer).map_err(|e| {
        debug!("final replay of {} bytes failed: {}", result.buffer.len(), e);
        CheckError::Flaky
    })
}

/// Check that `predicate` holds for every value `strategy` generates.
pub fn assert_all_examples<S, P>(strategy: &S, predicate: P) -> Result<(), CheckError>
where
    S: Strategy,
    S::Value: Debug,
    P: Fn(&S::Value) -> bool,
{
    assert_all_examples_with_config(harness_config(), strategy, predicate)
}

pub fn assert_all_examples_with_config<S, P>(
    config: RunnerConfig,
    strategy: &S,
    predicate: P,
) -> Result<(), CheckError>
where
    S: Strategy,
    S::Value: Debug,
    P: Fn(&S::Value) -> bool,
{
    let mut runner = ConjectureRunner::new(config);
    match run_predicate(&mut runner, strategy, predicate, false) {
        RunResult::Passed => Ok(()),
        RunResult::Exhausted { valid, invalid } => Err(CheckError::Exhausted { valid, invalid }),
        RunResult::Error(error) => Err(CheckError::InvalidArgument(error)),
        RunResult::Failed(result) => {
            let value = counterexample(strategy, &result)?;
            Err(CheckError::Falsified {
                value: format!("{:?}", value),
                failure: result.failure.unwrap_or(Failure::Falsified),
            })
        }
    }
}

/// Find some value from `strategy` satisfying `predicate`. The value is
/// returned as first found, not shrunk.
pub fn find_any<S, P>(strategy: &S, predicate: P) -> Result<S::Value, CheckError>
where
    S: Strategy,
    S::Value: Debug,
    P: Fn(&S::Value) -> bool,
{
    let config = harness_config()
        .with_max_examples(FIND_ANY_EXAMPLES)
        .with_max_shrinks(0);
    search(config, strategy, predicate)
}

/// Find the simplest value from `strategy` satisfying `predicate`.
///
/// Pass `|_| true` to get the simplest value the strategy can produce.
pub fn minimal<S, P>(strategy: &S, predicate: P) -> Result<S::Value, CheckError>
where
    S: Strategy,
    S::Value: Debug,
    P: Fn(&S::Value) -> bool,
{
    let config = harness_config().with_max_examples(MINIMAL_EXAMPLES);
    minimal_with_config(config, strategy, predicate)
}

pub fn minimal_with_config<S, P>(config: RunnerConfig, strategy: &S, predicate: P) -> Result<S::Value, CheckError>
where
    S: Strategy,
    S::Value: Debug,
    P: Fn(&S::Value) -> bool,
{
    search(config, strategy, predicate)
}

fn search<S, P>(config: RunnerConfig, strategy: &S, predicate: P) -> Result<S::Value, CheckError>
where
    S: Strategy,
    S::Value: Debug,
    P: Fn(&S::Value) -> bool,
{
    let mut runner = ConjectureRunner::new(config);
    match run_predicate(&mut runner, strategy, predicate, true) {
        RunResult::Passed => Err(CheckError::NoExampleFound {
            valid: runner.stats.valid_examples,
        }),
        RunResult::Exhausted { valid, invalid } => Err(CheckError::Exhausted { valid, invalid }),
        RunResult::Error(error) => Err(CheckError::InvalidArgument(error)),
        RunResult::Failed(result) => {
            let value = counterexample(strategy, &result)?;
            match result.failure {
                None | Some(Failure::Falsified) => Ok(value),
                // The predicate itself panicked or ran too long.
                Some(failure) => Err(CheckError::Falsified {
                    value: format!("{:?}", value),
                    failure,
                }),
            }
        }
    }
}
