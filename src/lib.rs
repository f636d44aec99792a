//! # conjecture-engine
//!
//! The generation and shrinking core of a property-based testing library.
//!
//! Every random decision a strategy makes is read from a byte buffer through
//! [`ConjectureData`]. Generation fills that buffer from a seeded generator;
//! replay reads it back. Because values are a pure function of the buffer,
//! a failing example can be minimized by shrinking its bytes, and the
//! simplest value of every strategy is the one produced by zero bytes.
//!
//! ```
//! use conjecture_engine::{assert_all_examples, integers, CheckError, Failure};
//!
//! let err = assert_all_examples(&integers(-1000, 1000), |x| *x >= 0).unwrap_err();
//! assert_eq!(
//!     err,
//!     CheckError::Falsified { value: "-1".to_string(), failure: Failure::Falsified }
//! );
//! ```

pub mod data;
pub mod distributions;
pub mod engine;
pub mod error;
pub mod harness;
pub mod ints;
pub mod minimize;
pub mod shrinking;
pub mod slices;
pub mod source;
pub mod strategies;
pub mod strategy;

// Re-export core types for easy access
pub use data::{Block, ConjectureData, ConjectureResult, Draw, DrawKind, Example, Status};
pub use engine::{execute, ConjectureRunner, RunResult, RunState, RunnerConfig, RunnerStats};
pub use error::{CheckError, DrawError, DrawResult, Failure};
pub use harness::{assert_all_examples, find_any, minimal};
pub use shrinking::{ShrinkConfig, Shrinker};
pub use slices::{slices, Slice};
pub use source::ByteSource;
pub use strategies::{any_integer, booleans, bytes, integers, optional, sampled_from, vecs};
pub use strategy::{composite, just, one_of, BoxedStrategy, Strategy};
