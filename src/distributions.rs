// General distribution functions and utilities.
// This module contains probability distributions and repetition
// control that are used across different data types.

use crate::data::ConjectureData;
use crate::error::DrawResult;

/// Boolean that is `true` with probability `probability`.
///
/// Always reads exactly one byte, so forced outcomes (`p <= 0`, `p >= 1`)
/// keep the buffer aligned with the non-forced case. The zero byte is
/// `false` for every probability below one.
///
/// Any other `p` is rounded to a multiple of 1/256 and clamped to
/// `[1/256, 255/256]`: `p = 0.0001` comes out true once in 256 draws, and
/// `p = 0.9999` false once in 256.
pub fn weighted(data: &mut ConjectureData, probability: f64) -> DrawResult<bool> {
    let byte = data.draw_bits(8)?;
    if !(probability > 0.0) {
        return Ok(false);
    }
    if probability >= 1.0 {
        return Ok(true);
    }
    let truthy = ((probability * 256.0).round() as u64).clamp(1, 255);
    Ok(byte >= 256 - truthy)
}

/// Drives a variable-length loop such as a collection's element count.
///
/// Decisions forced by `min_count` / `max_count` read no bytes; the free
/// ones each read a single weighted boolean, so deleting an element's
/// continue byte together with the element shortens the collection.
#[derive(Debug, Clone)]
pub struct Repeat {
    min_count: u64,
    max_count: u64,
    p_continue: f64,

    current_count: u64,
}

impl Repeat {
    pub fn new(min_count: u64, max_count: u64, expected_count: f64) -> Repeat {
        Repeat {
            min_count,
            max_count,
            p_continue: 1.0 - 1.0 / (1.0 + expected_count),
            current_count: 0,
        }
    }

    pub fn count(&self) -> u64 {
        self.current_count
    }

    pub fn should_continue(&mut self, data: &mut ConjectureData) -> DrawResult<bool> {
        if self.current_count < self.min_count {
            self.current_count += 1;
            return Ok(true);
        } else if self.current_count >= self.max_count {
            return Ok(false);
        }

        let result = weighted(data, self.p_continue)?;
        if result {
            self.current_count += 1;
        }
        Ok(result)
    }
}
