//! # ConjectureData: the draw engine
//!
//! `ConjectureData` sits between a [`ByteSource`] and the strategies. Every
//! value a strategy produces is built from primitive draws, and every
//! primitive draw is built from [`ConjectureData::draw_bits`], which reads
//! whole bytes from the source and records them on the trace.
//!
//! The trace is what makes shrinking possible: replaying the recorded buffer
//! through the same sequence of draws yields the same values, and mutating
//! the buffer yields related values.
//!
//! ```
//! use conjecture_engine::data::ConjectureData;
//!
//! let mut data = ConjectureData::for_buffer(vec![0, 0, 0, 5]);
//! let x = data.draw_integer(0, 10).unwrap();
//! assert_eq!(x, 0);
//! ```
//!
//! Three kinds of record are kept while drawing:
//! - **Blocks**: one per `draw_bits` call, the unit the shrinker minimizes.
//! - **Draws**: one per public primitive (`draw_integer`, `draw_boolean`,
//!   `draw_bytes`, `weighted_choice`, `draw_choice`) with its decoded value.
//! - **Examples**: nested spans opened around every strategy draw, used by the
//!   shrinker as deletion units.

use byteorder::{BigEndian, ByteOrder};
use log::trace;
use rand_chacha::ChaCha8Rng;

use crate::distributions::weighted;
use crate::error::{DrawError, DrawResult, Failure};
use crate::ints::{bounded_int, integer_range, Sampler};
use crate::source::ByteSource;
use crate::strategy::Strategy;

/// Default cap on bytes a freshly generated example may consume.
pub const DEFAULT_MAX_LENGTH: usize = 8 * 1024;

/// Lifecycle status of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Status {
    /// Ran out of bytes.
    Overrun = 0,
    /// Discarded by a filter or an assumption.
    Invalid = 1,
    /// Still drawing, or completed without failing.
    #[default]
    Valid = 2,
    /// The property failed.
    Interesting = 3,
}

/// A contiguous run of buffer bytes produced by a single `draw_bits` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    pub start: usize,
    pub end: usize,
}

impl Block {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Interpretation attached to a recorded draw.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DrawKind {
    Integer { min: i64, max: i64, value: i64 },
    Boolean { value: bool },
    Bytes { value: Vec<u8> },
    Choice { options: usize, index: usize },
}

/// One primitive draw: which bytes produced which value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Draw {
    pub start: usize,
    pub end: usize,
    pub kind: DrawKind,
}

impl Draw {
    pub fn width(&self) -> usize {
        self.end - self.start
    }
}

/// A labelled span of the buffer corresponding to one strategy draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    /// Label for this example/span
    pub label: &'static str,

    /// Start position in the buffer
    pub start: usize,

    /// End position in the buffer
    pub end: usize,

    /// Depth of nesting when this example was created
    pub depth: usize,

    /// Whether the draw inside this span failed
    pub discarded: bool,
}

impl Example {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Shortlex sort key: shorter buffers first, then lexicographic.
pub fn sort_key(buffer: &[u8]) -> (usize, &[u8]) {
    (buffer.len(), buffer)
}

/// True if `left` strictly precedes `right` in shortlex order.
pub fn precedes(left: &[u8], right: &[u8]) -> bool {
    sort_key(left) < sort_key(right)
}

/// The sealed trace of a finished test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConjectureResult {
    pub status: Status,
    /// Bytes actually consumed, in order.
    pub buffer: Vec<u8>,
    pub blocks: Vec<Block>,
    pub draws: Vec<Draw>,
    pub examples: Vec<Example>,
    pub failure: Option<Failure>,
    /// Set when the test was stopped by a misconfigured strategy.
    pub error: Option<DrawError>,
}

impl ConjectureResult {
    pub fn is_interesting(&self) -> bool {
        self.status == Status::Interesting
    }

    pub fn sort_key(&self) -> (usize, &[u8]) {
        sort_key(&self.buffer)
    }
}

/// Draw engine state for one test case.
#[derive(Debug, Clone)]
pub struct ConjectureData {
    source: ByteSource,
    pub max_length: usize,
    buffer: Vec<u8>,
    blocks: Vec<Block>,
    draws: Vec<Draw>,
    examples: Vec<Example>,
    open_examples: Vec<usize>,
    pub status: Status,
    pub frozen: bool,
    failure: Option<Failure>,
    error: Option<DrawError>,
}

impl ConjectureData {
    fn with_source(source: ByteSource, max_length: usize) -> ConjectureData {
        ConjectureData {
            source,
            max_length,
            buffer: Vec::new(),
            blocks: Vec::new(),
            draws: Vec::new(),
            examples: Vec::new(),
            open_examples: Vec::new(),
            status: Status::Valid,
            frozen: false,
            failure: None,
            error: None,
        }
    }

    /// Fresh generation from a seed, capped at `DEFAULT_MAX_LENGTH` bytes.
    pub fn new(seed: u64) -> ConjectureData {
        ConjectureData::with_source(ByteSource::random(seed), DEFAULT_MAX_LENGTH)
    }

    /// Fresh generation from an already seeded generator.
    pub fn for_rng(rng: ChaCha8Rng, max_length: usize) -> ConjectureData {
        ConjectureData::with_source(ByteSource::from_rng(rng), max_length)
    }

    /// Replay of a fixed buffer. Reads past its end overrun.
    pub fn for_buffer<B: Into<Vec<u8>>>(buffer: B) -> ConjectureData {
        let buffer = buffer.into();
        let max_length = buffer.len();
        ConjectureData::with_source(ByteSource::replay(buffer), max_length)
    }

    /// Number of bytes consumed so far.
    pub fn index(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    fn check_drawable(&self) -> DrawResult<()> {
        if self.frozen {
            return Err(DrawError::Frozen);
        }
        if self.status == Status::Overrun {
            return Err(DrawError::Overrun);
        }
        Ok(())
    }

    /// Append `n` bytes from the source to the buffer as one block.
    fn read(&mut self, n: usize) -> DrawResult<Block> {
        self.check_drawable()?;
        let start = self.buffer.len();
        if start + n > self.max_length {
            self.status = Status::Overrun;
            return Err(DrawError::Overrun);
        }
        self.buffer.resize(start + n, 0);
        if let Err(e) = self.source.fill(&mut self.buffer[start..]) {
            self.buffer.truncate(start);
            self.status = Status::Overrun;
            return Err(e);
        }
        let block = Block { start, end: start + n };
        self.blocks.push(block);
        Ok(block)
    }

    /// Draw an `n`-bit unsigned integer (`n <= 64`).
    ///
    /// Reads `ceil(n / 8)` bytes, interprets them big-endian and masks off the
    /// unused high bits. `n == 0` reads nothing.
    pub fn draw_bits(&mut self, n: u32) -> DrawResult<u64> {
        if n > 64 {
            return Err(DrawError::InvalidRange);
        }
        if n == 0 {
            self.check_drawable()?;
            return Ok(0);
        }
        let n_bytes = ((n + 7) / 8) as usize;
        let block = self.read(n_bytes)?;
        let mut padded = [0u8; 8];
        padded[8 - n_bytes..].copy_from_slice(&self.buffer[block.start..block.end]);
        let raw = BigEndian::read_u64(&padded);
        Ok(if n == 64 { raw } else { raw & ((1u64 << n) - 1) })
    }

    fn record(&mut self, start: usize, kind: DrawKind) {
        let end = self.buffer.len();
        self.draws.push(Draw { start, end, kind });
    }

    /// Integer in `[min, max]`, biased toward the bounds and toward zero.
    pub fn draw_integer(&mut self, min: i64, max: i64) -> DrawResult<i64> {
        let start = self.index();
        let value = integer_range(self, min, max)?;
        self.record(start, DrawKind::Integer { min, max, value });
        Ok(value)
    }

    /// Boolean that is `true` with probability `p`. One byte per draw; the
    /// zero byte is `false`.
    pub fn draw_boolean(&mut self, p: f64) -> DrawResult<bool> {
        let start = self.index();
        let value = weighted(self, p)?;
        self.record(start, DrawKind::Boolean { value });
        Ok(value)
    }

    /// `n` raw bytes as a single block.
    pub fn draw_bytes(&mut self, n: usize) -> DrawResult<Vec<u8>> {
        let block = self.read(n)?;
        let value = self.buffer[block.start..block.end].to_vec();
        self.record(block.start, DrawKind::Bytes { value: value.clone() });
        Ok(value)
    }

    /// Index into `weights`, chosen with probability proportional to weight.
    pub fn weighted_choice(&mut self, weights: &[f64]) -> DrawResult<usize> {
        let sampler = Sampler::new(weights)?;
        let start = self.index();
        let index = sampler.sample(self)?;
        self.record(
            start,
            DrawKind::Choice {
                options: weights.len(),
                index,
            },
        );
        Ok(index)
    }

    /// Uniform index in `0..options`, shrinking toward zero.
    pub fn draw_choice(&mut self, options: usize) -> DrawResult<usize> {
        if options == 0 {
            return Err(DrawError::EmptyWeights);
        }
        let start = self.index();
        let index = bounded_int(self, options as u64 - 1)? as usize;
        self.record(start, DrawKind::Choice { options, index });
        Ok(index)
    }

    /// Discard this example unless `condition` holds.
    pub fn assume(&mut self, condition: bool) -> DrawResult<()> {
        if condition {
            Ok(())
        } else {
            Err(DrawError::Discard("assumption failed"))
        }
    }

    /// Draw a value from `strategy`, wrapped in an example span.
    pub fn draw<S: Strategy + ?Sized>(&mut self, strategy: &S) -> DrawResult<S::Value> {
        self.start_example(strategy.label());
        let result = strategy.do_draw(self);
        self.stop_example(result.is_err());
        result
    }

    pub fn start_example(&mut self, label: &'static str) {
        if self.frozen {
            return;
        }
        let start = self.index();
        self.examples.push(Example {
            label,
            start,
            end: start,
            depth: self.open_examples.len(),
            discarded: false,
        });
        self.open_examples.push(self.examples.len() - 1);
    }

    pub fn stop_example(&mut self, discard: bool) {
        if self.frozen {
            return;
        }
        if let Some(i) = self.open_examples.pop() {
            let end = self.index();
            let example = &mut self.examples[i];
            example.end = end;
            example.discarded = discard;
        }
    }

    pub fn mark_invalid(&mut self) {
        if !self.frozen && self.status == Status::Valid {
            self.status = Status::Invalid;
        }
    }

    /// Mark invalid because a strategy could not draw at all, keeping the
    /// error so the runner can stop instead of retrying.
    pub fn mark_error(&mut self, error: DrawError) {
        if !self.frozen && self.status == Status::Valid {
            self.status = Status::Invalid;
            self.error = Some(error);
        }
    }

    pub fn mark_interesting(&mut self, failure: Failure) {
        if !self.frozen && self.status == Status::Valid {
            self.status = Status::Interesting;
            self.failure = Some(failure);
        }
    }

    /// Close any open spans and stop accepting draws.
    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        let end = self.index();
        while let Some(i) = self.open_examples.pop() {
            self.examples[i].end = end;
        }
        self.frozen = true;
        trace!(
            "froze data: status={:?} length={} draws={}",
            self.status,
            self.buffer.len(),
            self.draws.len()
        );
    }

    /// Freeze and snapshot the trace.
    pub fn as_result(&mut self) -> ConjectureResult {
        self.freeze();
        ConjectureResult {
            status: self.status,
            buffer: self.buffer.clone(),
            blocks: self.blocks.clone(),
            draws: self.draws.clone(),
            examples: self.examples.clone(),
            failure: self.failure.clone(),
            error: self.error,
        }
    }

    /// Freeze and consume into the sealed trace.
    pub fn into_result(mut self) -> ConjectureResult {
        self.freeze();
        ConjectureResult {
            status: self.status,
            buffer: self.buffer,
            blocks: self.blocks,
            draws: self.draws,
            examples: self.examples,
            failure: self.failure,
            error: self.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conjecture_data_creation() {
        let data = ConjectureData::new(42);
        assert_eq!(data.status, Status::Valid);
        assert_eq!(data.max_length, DEFAULT_MAX_LENGTH);
        assert_eq!(data.index(), 0);
        assert!(!data.frozen);
    }

    #[test]
    fn test_draw_bits_masks_and_is_big_endian() {
        let mut data = ConjectureData::for_buffer(vec![0xFF, 0x01, 0x02, 0xAB]);
        assert_eq!(data.draw_bits(4).unwrap(), 0x0F);
        assert_eq!(data.draw_bits(16).unwrap(), 0x0102);
        assert_eq!(data.draw_bits(1).unwrap(), 1);
        assert_eq!(data.blocks().len(), 3);
        assert_eq!(data.blocks()[1], Block { start: 1, end: 3 });
    }

    #[test]
    fn test_draw_bits_zero_reads_nothing() {
        let mut data = ConjectureData::for_buffer(Vec::new());
        assert_eq!(data.draw_bits(0).unwrap(), 0);
        assert_eq!(data.index(), 0);
    }

    #[test]
    fn test_draw_bits_64() {
        let mut data = ConjectureData::for_buffer(vec![0xFF; 8]);
        assert_eq!(data.draw_bits(64).unwrap(), u64::MAX);
    }

    #[test]
    fn test_overrun_is_sticky() {
        let mut data = ConjectureData::for_buffer(vec![1]);
        assert_eq!(data.draw_bits(16), Err(DrawError::Overrun));
        assert_eq!(data.status, Status::Overrun);
        assert_eq!(data.draw_bits(8), Err(DrawError::Overrun));
        assert_eq!(data.index(), 0);
    }

    #[test]
    fn test_max_length_overrun_for_fresh_data() {
        let mut data = ConjectureData::for_rng(
            rand::SeedableRng::seed_from_u64(3),
            4,
        );
        assert!(data.draw_bytes(4).is_ok());
        assert_eq!(data.draw_bytes(1), Err(DrawError::Overrun));
    }

    #[test]
    fn test_draws_are_recorded_with_values() {
        let mut data = ConjectureData::for_buffer(vec![0, 0, 0xFF, 9, 9]);
        let x = data.draw_integer(0, 10).unwrap();
        let b = data.draw_boolean(0.5).unwrap();
        let bytes = data.draw_bytes(2).unwrap();
        assert_eq!(x, 0);
        assert!(b);
        assert_eq!(bytes, vec![9, 9]);
        let draws = data.draws();
        assert_eq!(draws.len(), 3);
        assert_eq!(
            draws[0].kind,
            DrawKind::Integer {
                min: 0,
                max: 10,
                value: 0
            }
        );
        assert_eq!(draws[1].kind, DrawKind::Boolean { value: true });
        assert_eq!(draws[1].width(), 1);
        assert_eq!(draws[0].width(), 2);
        assert_eq!(draws[2].start, 3);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let mut fresh = ConjectureData::new(99);
        let values: Vec<i64> = (0..20).map(|_| fresh.draw_integer(-50, 50).unwrap()).collect();
        let buffer = fresh.as_result().buffer;

        let mut replay = ConjectureData::for_buffer(buffer.clone());
        let replayed: Vec<i64> = (0..20).map(|_| replay.draw_integer(-50, 50).unwrap()).collect();
        assert_eq!(values, replayed);
        assert_eq!(replay.as_result().buffer, buffer);
    }

    #[test]
    fn test_frozen_data_rejects_draws() {
        let mut data = ConjectureData::new(0);
        data.freeze();
        assert_eq!(data.draw_bits(8), Err(DrawError::Frozen));
    }

    #[test]
    fn test_examples_nest_and_close_on_freeze() {
        let mut data = ConjectureData::for_buffer(vec![1, 2, 3]);
        data.start_example("outer");
        data.draw_bits(8).unwrap();
        data.start_example("inner");
        data.draw_bits(8).unwrap();
        data.stop_example(false);
        data.start_example("unclosed");
        data.draw_bits(8).unwrap();
        let result = data.as_result();
        assert_eq!(result.examples.len(), 3);
        assert_eq!(result.examples[0].label, "outer");
        assert_eq!((result.examples[0].start, result.examples[0].end), (0, 3));
        assert_eq!((result.examples[1].start, result.examples[1].end), (1, 2));
        assert_eq!(result.examples[1].depth, 1);
        assert_eq!(result.examples[2].end, 3);
    }

    #[test]
    fn test_weighted_choice_and_choice() {
        let mut data = ConjectureData::for_buffer(vec![0; 16]);
        assert_eq!(data.weighted_choice(&[1.0, 2.0, 3.0]).unwrap(), 0);
        assert_eq!(data.draw_choice(5).unwrap(), 0);
        assert_eq!(data.weighted_choice(&[]), Err(DrawError::EmptyWeights));
        assert_eq!(data.draw_choice(0), Err(DrawError::EmptyWeights));
    }

    #[test]
    fn test_mark_interesting_only_once() {
        let mut data = ConjectureData::new(1);
        data.mark_interesting(Failure::Falsified);
        data.mark_interesting(Failure::Panicked("later".into()));
        let result = data.into_result();
        assert!(result.is_interesting());
        assert_eq!(result.failure, Some(Failure::Falsified));
    }

    #[test]
    fn test_mark_error_is_kept_on_the_result() {
        let mut data = ConjectureData::for_buffer(vec![0; 4]);
        let err = data.draw_integer(5, 1).unwrap_err();
        data.mark_error(err);
        let result = data.into_result();
        assert_eq!(result.status, Status::Invalid);
        assert_eq!(result.error, Some(DrawError::InvalidRange));
    }

    #[test]
    fn test_shortlex_ordering() {
        assert!(precedes(&[9], &[0, 0]));
        assert!(precedes(&[0, 1], &[0, 2]));
        assert!(!precedes(&[1, 2], &[1, 2]));
    }
}
