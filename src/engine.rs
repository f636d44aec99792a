//! ConjectureRunner - the test execution engine
//!
//! Orchestrates a property-based test run: a generation phase that feeds
//! fresh buffers to the test until one fails or the budget runs out, and a
//! shrinking phase that minimizes the failing buffer.

use std::any::Any;
use std::env;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::data::{ConjectureData, ConjectureResult, Status};
use crate::error::{DrawError, Failure};
use crate::shrinking::{ShrinkConfig, Shrinker};

/// Configuration for the ConjectureRunner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Valid examples to run before declaring the property passed
    pub max_examples: u32,

    /// Discards allowed per requested example before the run is exhausted
    pub max_invalid_ratio: u32,

    /// Maximum number of accepted shrinks
    pub max_shrinks: u32,

    /// Maximum test executions while shrinking
    pub max_shrink_calls: u32,

    /// Random seed for deterministic execution
    pub seed: u64,

    /// Bytes a single example may consume
    pub buffer_size: usize,

    /// Maximum time allowed for the generation phase
    pub max_time: Option<Duration>,

    /// A passing trial slower than this counts as a failure
    pub deadline: Option<Duration>,

    /// Maximum time allowed for shrinking phase
    pub shrink_timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_examples: 100,
            max_invalid_ratio: 10,
            max_shrinks: 500,
            max_shrink_calls: 10_000,
            seed: 0,
            buffer_size: 8192,
            max_time: Some(Duration::from_secs(60)),
            deadline: Some(Duration::from_millis(200)),
            shrink_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl RunnerConfig {
    /// Defaults, with `CONJECTURE_SEED` and `CONJECTURE_MAX_EXAMPLES` applied
    /// when set.
    pub fn from_env() -> Self {
        let mut config = RunnerConfig::default();
        if let Some(seed) = env_var("CONJECTURE_SEED") {
            config.seed = seed;
        }
        if let Some(max_examples) = env_var("CONJECTURE_MAX_EXAMPLES") {
            config.max_examples = max_examples;
        }
        config
    }

    pub fn with_max_examples(mut self, max_examples: u32) -> Self {
        self.max_examples = max_examples;
        self
    }

    pub fn with_max_invalid_ratio(mut self, ratio: u32) -> Self {
        self.max_invalid_ratio = ratio;
        self
    }

    pub fn with_max_shrinks(mut self, max_shrinks: u32) -> Self {
        self.max_shrinks = max_shrinks;
        self
    }

    pub fn with_max_shrink_calls(mut self, max_shrink_calls: u32) -> Self {
        self.max_shrink_calls = max_shrink_calls;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_max_time(mut self, max_time: Option<Duration>) -> Self {
        self.max_time = max_time;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_shrink_timeout(mut self, shrink_timeout: Option<Duration>) -> Self {
        self.shrink_timeout = shrink_timeout;
        self
    }

    pub fn shrink_config(&self) -> ShrinkConfig {
        ShrinkConfig {
            max_shrinks: self.max_shrinks,
            max_calls: self.max_shrink_calls,
            timeout: self.shrink_timeout,
        }
    }
}

fn env_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring unparseable {}={:?}", name, raw);
            None
        }
    }
}

/// Statistics about test execution
#[derive(Debug, Clone, Default)]
pub struct RunnerStats {
    /// Total examples generated
    pub examples_generated: u32,

    /// Examples that ran to completion and passed
    pub valid_examples: u32,

    /// Examples discarded by a filter or assumption
    pub invalid_examples: u32,

    /// Examples that ran out of bytes
    pub overrun_examples: u32,

    /// Examples that were interesting (failed the test)
    pub interesting_examples: u32,

    /// Test executions made while shrinking
    pub shrink_calls: u32,

    /// Accepted shrinks
    pub shrinks: u32,

    /// Shrink candidates that did not reproduce the failure
    pub shrink_divergences: u32,

    /// Trials that failed by exceeding the deadline
    pub timeouts: u32,

    pub total_runtime: Duration,
    pub generation_time: Duration,
    pub shrinking_time: Duration,

    /// Average time per generated example
    pub avg_test_time: Duration,
}

impl RunnerStats {
    /// Examples thrown away without running to completion.
    pub fn discarded(&self) -> u32 {
        self.invalid_examples + self.overrun_examples
    }
}

/// Phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Generating examples
    Running,
    /// A failing example was found
    Failed,
    /// Too many examples were discarded
    Exhausted,
    /// The budget was used up without a failure
    Done,
    /// A strategy could not draw at all
    Errored,
}

/// Result of running the entire property-based test
#[derive(Debug, Clone, PartialEq)]
pub enum RunResult {
    /// Test passed - no counterexamples found
    Passed,
    /// Test failed - counterexample found and shrunk
    Failed(ConjectureResult),
    /// Too many discards to reach the example budget
    Exhausted { valid: u32, invalid: u32 },
    /// The test hit a misconfigured strategy; no further examples were run
    Error(DrawError),
}

/// Run `test` against `data` once and seal the result.
///
/// `Ok(true)` passes, `Ok(false)` and panics are failures, a discard marks
/// the example invalid and an overrun leaves it overrun. Any other draw error
/// marks it invalid and is recorded on the result. A passing trial that took
/// longer than `deadline` is a failure too.
pub fn execute<F>(
    mut data: ConjectureData,
    test: &mut F,
    deadline: Option<Duration>,
) -> ConjectureResult
where
    F: FnMut(&mut ConjectureData) -> Result<bool, DrawError>,
{
    let started = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| test(&mut data)));
    let elapsed = started.elapsed();

    match outcome {
        Ok(Ok(true)) => {
            if let Some(deadline) = deadline {
                if elapsed > deadline {
                    data.mark_interesting(Failure::DeadlineExceeded { elapsed, deadline });
                }
            }
        }
        Ok(Ok(false)) => data.mark_interesting(Failure::Falsified),
        Ok(Err(DrawError::Overrun)) => data.status = Status::Overrun,
        Ok(Err(DrawError::Discard(_))) => data.mark_invalid(),
        Ok(Err(error)) => data.mark_error(error),
        Err(payload) => data.mark_interesting(Failure::Panicked(panic_message(payload.as_ref()))),
    }
    data.into_result()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Main test execution engine
///
/// Owns the run's random generator: each trial gets its own `ChaCha8Rng`
/// seeded from it, so a run is reproducible from `RunnerConfig::seed`.
#[derive(Debug)]
pub struct ConjectureRunner {
    /// Configuration for this runner
    pub config: RunnerConfig,

    /// Statistics about execution
    pub stats: RunnerStats,

    state: RunState,
    rng: ChaCha8Rng,
}

impl ConjectureRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            stats: RunnerStats::default(),
            state: RunState::Running,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run a property-based test with the given test function.
    ///
    /// The test draws its inputs from the `ConjectureData` it is handed and
    /// returns `Ok(true)` to pass, `Ok(false)` to fail, or the `DrawError`
    /// from a draw (usually via `?`).
    pub fn run<F>(&mut self, mut test: F) -> RunResult
    where
        F: FnMut(&mut ConjectureData) -> Result<bool, DrawError>,
    {
        debug!("starting test run with {:?}", self.config);
        let started = Instant::now();
        self.state = RunState::Running;

        let interesting = self.generation_phase(&mut test, started);
        self.stats.generation_time = started.elapsed();

        let result = match interesting {
            Err(error) => {
                self.state = RunState::Errored;
                RunResult::Error(error)
            }
            Ok(Some(result)) => {
                self.state = RunState::Failed;
                RunResult::Failed(self.shrinking_phase(result, &mut test))
            }
            Ok(None) if self.state == RunState::Exhausted => RunResult::Exhausted {
                valid: self.stats.valid_examples,
                invalid: self.stats.discarded(),
            },
            Ok(None) => {
                self.state = RunState::Done;
                debug!("no failing example in {} valid examples", self.stats.valid_examples);
                RunResult::Passed
            }
        };

        self.stats.total_runtime = started.elapsed();
        result
    }

    /// Generation phase - try to find an interesting (failing) example.
    ///
    /// The first trial replays an all-zero buffer, which draws the simplest
    /// value of every strategy. A usage error from any trial ends the phase.
    fn generation_phase<F>(
        &mut self,
        test: &mut F,
        started: Instant,
    ) -> Result<Option<ConjectureResult>, DrawError>
    where
        F: FnMut(&mut ConjectureData) -> Result<bool, DrawError>,
    {
        let discard_limit = self
            .config
            .max_examples
            .saturating_mul(self.config.max_invalid_ratio);
        let mut test_time = Duration::ZERO;

        while self.stats.valid_examples < self.config.max_examples {
            if self.config.max_time.map_or(false, |limit| started.elapsed() >= limit) {
                debug!(
                    "max_time reached after {} examples",
                    self.stats.examples_generated
                );
                break;
            }
            if self.stats.discarded() > discard_limit {
                warn!(
                    "giving up after {} discarded examples ({} valid)",
                    self.stats.discarded(),
                    self.stats.valid_examples
                );
                self.state = RunState::Exhausted;
                return Ok(None);
            }

            let data = if self.stats.examples_generated == 0 {
                ConjectureData::for_buffer(vec![0; self.config.buffer_size])
            } else {
                let rng = ChaCha8Rng::seed_from_u64(self.rng.gen());
                ConjectureData::for_rng(rng, self.config.buffer_size)
            };
            self.stats.examples_generated += 1;

            let trial_started = Instant::now();
            let result = execute(data, test, self.config.deadline);
            test_time += trial_started.elapsed();
            self.stats.avg_test_time = test_time / self.stats.examples_generated;

            trace!(
                "example {}: {:?} after {} bytes",
                self.stats.examples_generated,
                result.status,
                result.buffer.len()
            );
            match result.status {
                Status::Valid => self.stats.valid_examples += 1,
                Status::Invalid => {
                    self.stats.invalid_examples += 1;
                    if let Some(error) = result.error {
                        warn!(
                            "example {} stopped by {}; ending run",
                            self.stats.examples_generated, error
                        );
                        return Err(error);
                    }
                }
                Status::Overrun => self.stats.overrun_examples += 1,
                Status::Interesting => {
                    self.stats.interesting_examples += 1;
                    if result.failure.as_ref().map_or(false, Failure::is_timeout) {
                        self.stats.timeouts += 1;
                    }
                    debug!(
                        "example {} failed ({:?}), buffer length {}",
                        self.stats.examples_generated,
                        result.failure,
                        result.buffer.len()
                    );
                    return Ok(Some(result));
                }
            }
        }
        Ok(None)
    }

    /// Shrinking phase - minimize the interesting example
    fn shrinking_phase<F>(&mut self, initial: ConjectureResult, test: &mut F) -> ConjectureResult
    where
        F: FnMut(&mut ConjectureData) -> Result<bool, DrawError>,
    {
        if self.config.max_shrinks == 0 {
            return initial;
        }
        let started = Instant::now();
        let deadline = self.config.deadline;
        let mut shrinker = Shrinker::new(
            initial,
            |buffer: &[u8]| execute(ConjectureData::for_buffer(buffer.to_vec()), &mut *test, deadline),
            self.config.shrink_config(),
        );
        let result = shrinker.shrink();

        self.stats.shrink_calls += shrinker.calls;
        self.stats.shrinks += shrinker.shrinks;
        self.stats.shrink_divergences += shrinker.divergences;
        self.stats.shrinking_time = started.elapsed();
        result
    }

    /// Run `test` once against a fixed buffer, e.g. to re-check a shrunk
    /// counterexample.
    pub fn replay<F>(&self, buffer: &[u8], mut test: F) -> ConjectureResult
    where
        F: FnMut(&mut ConjectureData) -> Result<bool, DrawError>,
    {
        execute(ConjectureData::for_buffer(buffer.to_vec()), &mut test, self.config.deadline)
    }
}
