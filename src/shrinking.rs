//! Buffer shrinking.
//!
//! The shrinker owns the current shrink target, a failing `ConjectureResult`,
//! and repeatedly proposes smaller buffers. A candidate is only accepted if
//! it strictly precedes the target in shortlex order and replaying it through
//! the test still produces an interesting result. Passes run until none of
//! them makes progress or a cap is hit, so the result is locally minimal.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use byteorder::{BigEndian, ByteOrder};
use log::{debug, trace};

use crate::data::{precedes, ConjectureResult, DrawKind};
use crate::ints::{encode_integer, shrink_target};
use crate::minimize::minimize_integer;

/// Limits on a single shrink run.
#[derive(Debug, Clone)]
pub struct ShrinkConfig {
    /// Accepted shrinks before stopping.
    pub max_shrinks: u32,
    /// Test executions before stopping.
    pub max_calls: u32,
    pub timeout: Option<Duration>,
}

impl Default for ShrinkConfig {
    fn default() -> Self {
        ShrinkConfig {
            max_shrinks: 500,
            max_calls: 10_000,
            timeout: Some(Duration::from_secs(300)),
        }
    }
}

pub struct Shrinker<F> {
    target: ConjectureResult,
    test: F,
    config: ShrinkConfig,
    seen: HashSet<Vec<u8>>,
    accepted: Vec<Vec<u8>>,
    started: Instant,
    /// Number of test executions
    pub calls: u32,
    /// Number of accepted candidates
    pub shrinks: u32,
    /// Candidates that replayed as not interesting
    pub divergences: u32,
}

impl<F> Shrinker<F>
where
    F: FnMut(&[u8]) -> ConjectureResult,
{
    /// `initial` must be interesting; `test` replays a buffer and returns the
    /// sealed result.
    pub fn new(initial: ConjectureResult, test: F, config: ShrinkConfig) -> Self {
        let mut seen = HashSet::new();
        seen.insert(initial.buffer.clone());
        Shrinker {
            target: initial,
            test,
            config,
            seen,
            accepted: Vec::new(),
            started: Instant::now(),
            calls: 0,
            shrinks: 0,
            divergences: 0,
        }
    }

    pub fn target(&self) -> &ConjectureResult {
        &self.target
    }

    /// Every buffer accepted as a new target, in order.
    pub fn accepted(&self) -> &[Vec<u8>] {
        &self.accepted
    }

    fn exhausted(&self) -> bool {
        self.shrinks >= self.config.max_shrinks
            || self.calls >= self.config.max_calls
            || self
                .config
                .timeout
                .map_or(false, |limit| self.started.elapsed() >= limit)
    }

    /// Test `candidate` and adopt it as the new target if it is smaller and
    /// still interesting. Buffers already tried are skipped.
    pub fn consider(&mut self, candidate: &[u8]) -> bool {
        if self.exhausted() || !precedes(candidate, &self.target.buffer) {
            return false;
        }
        if !self.seen.insert(candidate.to_vec()) {
            return false;
        }
        self.calls += 1;
        let result = (self.test)(candidate);
        if !result.is_interesting() {
            self.divergences += 1;
            trace!(
                "shrink candidate of length {} replayed as {:?}",
                candidate.len(),
                result.status
            );
            return false;
        }
        // Replay may consume only a prefix of the candidate.
        if !precedes(&result.buffer, &self.target.buffer) {
            return false;
        }
        debug!(
            "accepted shrink: length {} -> {}",
            self.target.buffer.len(),
            result.buffer.len()
        );
        self.seen.insert(result.buffer.clone());
        self.accepted.push(result.buffer.clone());
        self.target = result;
        self.shrinks += 1;
        true
    }

    /// Run all passes to a fixed point and return the final target.
    pub fn shrink(&mut self) -> ConjectureResult {
        self.started = Instant::now();
        debug!(
            "shrinking buffer of length {} ({} blocks, {} examples)",
            self.target.buffer.len(),
            self.target.blocks.len(),
            self.target.examples.len()
        );

        while !self.exhausted() {
            let mut made_progress = false;
            made_progress |= self.delete_examples();
            made_progress |= self.delete_spans();
            made_progress |= self.zero_examples();
            made_progress |= self.minimize_integer_draws();
            made_progress |= self.redistribute_integer_draws();
            made_progress |= self.minimize_blocks();
            made_progress |= self.sort_blocks();
            made_progress |= self.lower_bytes();
            if !made_progress {
                break;
            }
        }

        debug!(
            "shrinking finished: length {}, {} calls, {} shrinks, {} divergences",
            self.target.buffer.len(),
            self.calls,
            self.shrinks,
            self.divergences
        );
        self.target.clone()
    }

    fn splice(&self, start: usize, end: usize, replacement: &[u8]) -> Vec<u8> {
        let buffer = &self.target.buffer;
        let mut candidate = Vec::with_capacity(buffer.len() - (end - start) + replacement.len());
        candidate.extend_from_slice(&buffer[..start]);
        candidate.extend_from_slice(replacement);
        candidate.extend_from_slice(&buffer[end..]);
        candidate
    }

    /// Remove whole example spans.
    fn delete_examples(&mut self) -> bool {
        let before = self.shrinks;
        let mut i = 0;
        while i < self.target.examples.len() && !self.exhausted() {
            let example = &self.target.examples[i];
            let (start, end) = (example.start, example.end);
            if end > start && end <= self.target.buffer.len() {
                let candidate = self.splice(start, end, &[]);
                if self.consider(&candidate) {
                    continue;
                }
            }
            i += 1;
        }
        self.shrinks > before
    }

    /// Remove contiguous runs of bytes, largest runs first.
    fn delete_spans(&mut self) -> bool {
        let before = self.shrinks;
        for k in [8, 4, 2, 1] {
            let mut i = 0;
            while i + k <= self.target.buffer.len() && !self.exhausted() {
                let candidate = self.splice(i, i + k, &[]);
                if !self.consider(&candidate) {
                    i += 1;
                }
            }
        }
        self.shrinks > before
    }

    /// Replace every byte of an example span with zero.
    fn zero_examples(&mut self) -> bool {
        let before = self.shrinks;
        let mut i = 0;
        while i < self.target.examples.len() && !self.exhausted() {
            let (start, end) = (self.target.examples[i].start, self.target.examples[i].end);
            if end <= self.target.buffer.len() && self.target.buffer[start..end].iter().any(|&b| b != 0) {
                let zeros = vec![0; end - start];
                let candidate = self.splice(start, end, &zeros);
                self.consider(&candidate);
            }
            i += 1;
        }
        self.shrinks > before
    }

    fn replace_integer_draw(&mut self, index: usize, min: i64, max: i64, value: i64) -> bool {
        let (start, end) = match self.target.draws.get(index) {
            Some(draw) => match draw.kind {
                DrawKind::Integer { min: m, max: n, .. } if m == min && n == max => {
                    (draw.start, draw.end)
                }
                _ => return false,
            },
            None => return false,
        };
        match encode_integer(min, max, value) {
            Some(bytes) => {
                let candidate = self.splice(start, end, &bytes);
                self.consider(&candidate)
            }
            None => false,
        }
    }

    /// Re-encode each integer draw as a value closer to its shrink target,
    /// using the canonical encoding rather than editing bytes in place.
    fn minimize_integer_draws(&mut self) -> bool {
        let before = self.shrinks;
        let mut i = 0;
        while i < self.target.draws.len() && !self.exhausted() {
            if let DrawKind::Integer { min, max, value } = self.target.draws[i].kind {
                let target = shrink_target(min, max);
                let distance = (value as i128 - target as i128).unsigned_abs() as u64;
                let above = value >= target;
                if distance > 0 {
                    minimize_integer(distance, |d| {
                        let candidate = if above {
                            target as i128 + d as i128
                        } else {
                            target as i128 - d as i128
                        };
                        self.replace_integer_draw(i, min, max, candidate as i64)
                    });
                }
            }
            i += 1;
        }
        self.shrinks > before
    }

    fn integer_draw(&self, index: usize) -> Option<(usize, usize, i64, i64, i64)> {
        let draw = self.target.draws.get(index)?;
        match draw.kind {
            DrawKind::Integer { min, max, value } => Some((draw.start, draw.end, min, max, value)),
            _ => None,
        }
    }

    /// Lower integer draw `i` to `new_first` and raise draw `j` by the same
    /// amount.
    fn shift_between_draws(&mut self, i: usize, j: usize, new_first: i64) -> bool {
        let (first, second) = match (self.integer_draw(i), self.integer_draw(j)) {
            (Some(first), Some(second)) => (first, second),
            _ => return false,
        };
        let (start1, end1, min1, max1, value1) = first;
        let (start2, end2, min2, max2, value2) = second;
        if new_first >= value1 || end1 > start2 {
            return false;
        }
        let new_second = value2 as i128 + (value1 as i128 - new_first as i128);
        if new_second > max2 as i128 {
            return false;
        }
        let (bytes1, bytes2) = match (
            encode_integer(min1, max1, new_first),
            encode_integer(min2, max2, new_second as i64),
        ) {
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        };
        let buffer = &self.target.buffer;
        let mut candidate = Vec::with_capacity(buffer.len());
        candidate.extend_from_slice(&buffer[..start1]);
        candidate.extend_from_slice(&bytes1);
        candidate.extend_from_slice(&buffer[end1..start2]);
        candidate.extend_from_slice(&bytes2);
        candidate.extend_from_slice(&buffer[end2..]);
        self.consider(&candidate)
    }

    /// Move magnitude from each integer draw onto the next one, for
    /// properties that depend on a sum rather than on individual values.
    fn redistribute_integer_draws(&mut self) -> bool {
        let before = self.shrinks;
        let mut i = 0;
        while i < self.target.draws.len() && !self.exhausted() {
            let next = (i + 1..self.target.draws.len()).find(|&j| self.integer_draw(j).is_some());
            if let (Some((_, _, min, max, value)), Some(j)) = (self.integer_draw(i), next) {
                let target = shrink_target(min, max);
                if value > target {
                    let distance = (value as i128 - target as i128) as u64;
                    minimize_integer(distance, |d| {
                        self.shift_between_draws(i, j, (target as i128 + d as i128) as i64)
                    });
                }
            }
            i += 1;
        }
        self.shrinks > before
    }

    fn try_block_value(&mut self, index: usize, value: u64) -> bool {
        let block = match self.target.blocks.get(index) {
            Some(block) => *block,
            None => return false,
        };
        let width = block.len();
        if width == 0 || width > 8 || (width < 8 && value >> (8 * width) != 0) {
            return false;
        }
        let mut bytes = [0u8; 8];
        BigEndian::write_uint(&mut bytes[..width], value, width);
        let candidate = self.splice(block.start, block.end, &bytes[..width]);
        self.consider(&candidate)
    }

    /// Minimize each block as a big-endian integer. Blocks wider than eight
    /// bytes are only tried at zero.
    fn minimize_blocks(&mut self) -> bool {
        let before = self.shrinks;
        let mut i = 0;
        while i < self.target.blocks.len() && !self.exhausted() {
            let block = self.target.blocks[i];
            let bytes = &self.target.buffer[block.start..block.end];
            if bytes.iter().any(|&b| b != 0) {
                if block.len() <= 8 {
                    let current = BigEndian::read_uint(bytes, block.len());
                    minimize_integer(current, |v| self.try_block_value(i, v));
                } else {
                    let zeros = vec![0; block.len()];
                    let candidate = self.splice(block.start, block.end, &zeros);
                    self.consider(&candidate);
                }
            }
            i += 1;
        }
        self.shrinks > before
    }

    /// Put the contents of equal-width blocks into ascending order, first all
    /// at once and then by swapping out-of-order pairs.
    fn sort_blocks(&mut self) -> bool {
        let before = self.shrinks;
        let mut widths: Vec<usize> = self.target.blocks.iter().map(|b| b.len()).collect();
        widths.sort_unstable();
        widths.dedup();

        for width in widths {
            if self.exhausted() {
                break;
            }
            let group: Vec<usize> = self
                .target
                .blocks
                .iter()
                .enumerate()
                .filter(|(_, b)| b.len() == width)
                .map(|(i, _)| i)
                .collect();
            if group.len() < 2 {
                continue;
            }

            let contents: Vec<Vec<u8>> = group
                .iter()
                .map(|&i| {
                    let b = self.target.blocks[i];
                    self.target.buffer[b.start..b.end].to_vec()
                })
                .collect();
            let mut sorted = contents.clone();
            sorted.sort();
            if sorted != contents {
                let mut candidate = self.target.buffer.clone();
                for (&i, value) in group.iter().zip(&sorted) {
                    let b = self.target.blocks[i];
                    candidate[b.start..b.end].copy_from_slice(value);
                }
                if self.consider(&candidate) {
                    continue;
                }
            }

            for pair in group.windows(2) {
                if self.exhausted() {
                    break;
                }
                let (a, b) = match (self.target.blocks.get(pair[0]), self.target.blocks.get(pair[1])) {
                    (Some(a), Some(b)) if a.len() == width && b.len() == width => (*a, *b),
                    _ => break,
                };
                let left = self.target.buffer[a.start..a.end].to_vec();
                let right = self.target.buffer[b.start..b.end].to_vec();
                if left > right {
                    let mut candidate = self.target.buffer.clone();
                    candidate[a.start..a.end].copy_from_slice(&right);
                    candidate[b.start..b.end].copy_from_slice(&left);
                    self.consider(&candidate);
                }
            }
        }
        self.shrinks > before
    }

    /// Zero, halve or decrement individual bytes.
    fn lower_bytes(&mut self) -> bool {
        let before = self.shrinks;
        let mut i = 0;
        while i < self.target.buffer.len() && !self.exhausted() {
            let byte = self.target.buffer[i];
            for lowered in [0, byte / 2, byte.saturating_sub(1)] {
                if lowered < byte {
                    let candidate = self.splice(i, i + 1, &[lowered]);
                    if self.consider(&candidate) {
                        break;
                    }
                }
            }
            i += 1;
        }
        self.shrinks > before
    }
}
