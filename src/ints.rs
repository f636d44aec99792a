// Integer generation functions for the draw engine.
// This module contains utilities for generating bounded integers,
// boundary-biased integer ranges and weighted index sampling.
//
// Every function here is written so that an all-zero buffer produces the
// simplest value, and lexicographically smaller bytes produce values closer
// to the shrink target.

use std::cmp::{Ord, Ordering, PartialOrd, Reverse};
use std::collections::BinaryHeap;
use std::mem;

use crate::data::ConjectureData;
use crate::distributions::weighted;
use crate::error::{DrawError, DrawResult};

/// Selector byte values at or above this pick a boundary value instead of a
/// uniform one, i.e. roughly one draw in eight.
const BOUNDARY_SELECTOR: u64 = 224;

/// Uniform integer in `[0, max]` by rejection sampling on the bit length of
/// `max`. Zero bytes give zero; `max == 0` reads nothing.
pub fn bounded_int(data: &mut ConjectureData, max: u64) -> DrawResult<u64> {
    let bitlength = 64 - max.leading_zeros();
    if bitlength == 0 {
        return Ok(0);
    }
    loop {
        let probe = data.draw_bits(bitlength)?;
        if probe <= max {
            return Ok(probe);
        }
    }
}

/// The value in `[min, max]` that shrinking moves toward: zero, clamped.
pub fn shrink_target(min: i64, max: i64) -> i64 {
    0i64.clamp(min, max)
}

/// The boundary values of `[min, max]`, simplest first, without duplicates.
fn boundary_values(min: i64, max: i64) -> Vec<i64> {
    let mut values = vec![shrink_target(min, max)];
    for candidate in [min, max] {
        if !values.contains(&candidate) {
            values.push(candidate);
        }
    }
    values
}

/// Integer in `[min, max]` that hits the bounds with non-negligible
/// probability.
///
/// Layout: one selector byte, then the bytes of a uniform draw around the
/// shrink target (a sign bit first when the range straddles it). A selector
/// of `BOUNDARY_SELECTOR` or more replaces the uniform value with one of the
/// boundary values. The selector comes first so any boundary-chosen value is
/// lexicographically larger than the uniform encoding of every value.
pub fn integer_range(data: &mut ConjectureData, min: i64, max: i64) -> DrawResult<i64> {
    if min > max {
        return Err(DrawError::InvalidRange);
    }
    if min == max {
        return Ok(min);
    }

    let selector = data.draw_bits(8)?;
    let target = shrink_target(min, max);
    let uniform = if target == min {
        let offset = bounded_int(data, (max as i128 - min as i128) as u64)?;
        (min as i128 + offset as i128) as i64
    } else if target == max {
        let offset = bounded_int(data, (max as i128 - min as i128) as u64)?;
        (max as i128 - offset as i128) as i64
    } else {
        // min < 0 < max
        let negative = data.draw_bits(1)? == 1;
        if negative {
            let magnitude = 1 + bounded_int(data, (-(min as i128) - 1) as u64)? as i128;
            (-magnitude) as i64
        } else {
            bounded_int(data, max as u64)? as i64
        }
    };

    if selector >= BOUNDARY_SELECTOR {
        let boundaries = boundary_values(min, max);
        let index = (selector - BOUNDARY_SELECTOR) as usize % boundaries.len();
        Ok(boundaries[index])
    } else {
        Ok(uniform)
    }
}

fn push_bounded(out: &mut Vec<u8>, max: u64, value: u64) {
    let bitlength = 64 - max.leading_zeros();
    if bitlength == 0 {
        return;
    }
    let n_bytes = ((bitlength + 7) / 8) as usize;
    out.extend_from_slice(&value.to_be_bytes()[8 - n_bytes..]);
}

/// The shortest, lexicographically smallest bytes for which
/// [`integer_range`] returns `value`, or `None` if `value` is out of range.
pub fn encode_integer(min: i64, max: i64, value: i64) -> Option<Vec<u8>> {
    if min > max || value < min || value > max {
        return None;
    }
    if min == max {
        return Some(Vec::new());
    }
    let span = (max as i128 - min as i128) as u64;
    let target = shrink_target(min, max);
    let mut out = vec![0];
    if target == min {
        push_bounded(&mut out, span, (value as i128 - min as i128) as u64);
    } else if target == max {
        push_bounded(&mut out, span, (max as i128 - value as i128) as u64);
    } else if value < 0 {
        out.push(1);
        push_bounded(
            &mut out,
            (-(min as i128) - 1) as u64,
            (-(value as i128) - 1) as u64,
        );
    } else {
        out.push(0);
        push_bounded(&mut out, max as u64, value as u64);
    }
    Some(out)
}

#[derive(Debug, Clone)]
struct SamplerEntry {
    primary: usize,
    alternate: usize,
    use_alternate: f32,
}

impl SamplerEntry {
    fn single(i: usize) -> SamplerEntry {
        SamplerEntry {
            primary: i,
            alternate: i,
            use_alternate: 0.0,
        }
    }
}

impl Ord for SamplerEntry {
    fn cmp(&self, other: &SamplerEntry) -> Ordering {
        self.primary
            .cmp(&other.primary)
            .then(self.alternate.cmp(&other.alternate))
    }
}

impl PartialOrd for SamplerEntry {
    fn partial_cmp(&self, other: &SamplerEntry) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SamplerEntry {
    fn eq(&self, other: &SamplerEntry) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SamplerEntry {}

/// Walker alias table over a fixed set of weights.
///
/// Sampling costs one bounded index draw plus one weighted boolean, and the
/// table is sorted so that zero bytes select the lowest index.
#[derive(Debug, Clone)]
pub struct Sampler {
    table: Vec<SamplerEntry>,
}

impl Sampler {
    pub fn new(weights: &[f64]) -> DrawResult<Sampler> {
        if weights.is_empty() || weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(DrawError::EmptyWeights);
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(DrawError::EmptyWeights);
        }

        let mut table = Vec::new();

        let mut small = BinaryHeap::new();
        let mut large = BinaryHeap::new();

        let n = weights.len() as f64;
        let mut scaled_probabilities: Vec<f64> = weights.iter().map(|w| n * w / total).collect();

        for (i, scaled) in scaled_probabilities.iter().enumerate() {
            if (scaled - 1.0).abs() < f64::EPSILON {
                table.push(SamplerEntry::single(i))
            } else if *scaled > 1.0 {
                large.push(Reverse(i));
            } else {
                small.push(Reverse(i));
            }
        }

        loop {
            let (lo, hi) = match (small.peek(), large.peek()) {
                (Some(&Reverse(lo)), Some(&Reverse(hi))) => (lo, hi),
                _ => break,
            };
            small.pop();
            large.pop();

            scaled_probabilities[hi] = (scaled_probabilities[hi] + scaled_probabilities[lo]) - 1.0;
            table.push(SamplerEntry {
                primary: lo,
                alternate: hi,
                use_alternate: (1.0 - scaled_probabilities[lo]) as f32,
            });

            if scaled_probabilities[hi] < 1.0 {
                small.push(Reverse(hi))
            } else if scaled_probabilities[hi] > 1.0 {
                large.push(Reverse(hi))
            } else {
                table.push(SamplerEntry::single(hi))
            }
        }
        for &Reverse(i) in small.iter() {
            table.push(SamplerEntry::single(i))
        }
        for &Reverse(i) in large.iter() {
            table.push(SamplerEntry::single(i))
        }

        for entry in table.iter_mut() {
            if entry.alternate < entry.primary {
                mem::swap(&mut entry.primary, &mut entry.alternate);
                entry.use_alternate = 1.0 - entry.use_alternate;
            }
        }

        table.sort();
        Ok(Sampler { table })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn sample(&self, data: &mut ConjectureData) -> DrawResult<usize> {
        let i = bounded_int(data, self.table.len() as u64 - 1)? as usize;
        let entry = &self.table[i];
        let use_alternate = weighted(data, entry.use_alternate as f64)?;
        if use_alternate {
            Ok(entry.alternate)
        } else {
            Ok(entry.primary)
        }
    }
}

/// Relative weight of each bit length `1..=63` for unbounded integers,
/// heavily favouring small magnitudes.
pub const GOOD_BITLENGTH_WEIGHTS: [f64; 63] = [
    4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0, // 1 byte
    2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, // 2 bytes
    1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, // 3 bytes
    0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, // 4 bytes
    0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, // 5 bytes
    0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, // 6 bytes
    0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, // 7 bytes
    0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, // 8 bytes (last bit spare for sign)
];

/// Sampler over [`GOOD_BITLENGTH_WEIGHTS`].
pub fn good_bitlengths() -> DrawResult<Sampler> {
    Sampler::new(&GOOD_BITLENGTH_WEIGHTS)
}

/// Signed integer whose bit length is drawn from `bitlengths` first.
pub fn integer_from_bitlengths(data: &mut ConjectureData, bitlengths: &Sampler) -> DrawResult<i64> {
    let bitlength = bitlengths.sample(data)? as u32 + 1;
    let base = data.draw_bits(bitlength)? as i64;
    let sign = data.draw_bits(1)?;
    if sign > 0 {
        Ok(-base)
    } else {
        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeros() -> ConjectureData {
        ConjectureData::for_buffer(vec![0; 64])
    }

    #[test]
    fn test_bounded_int_zero_max_reads_nothing() {
        let mut data = ConjectureData::for_buffer(Vec::new());
        assert_eq!(bounded_int(&mut data, 0).unwrap(), 0);
    }

    #[test]
    fn test_bounded_int_rejects_out_of_range() {
        // max = 5 needs 3 bits: 7 and 6 are rejected, 4 accepted.
        let mut data = ConjectureData::for_buffer(vec![7, 6, 4]);
        assert_eq!(bounded_int(&mut data, 5).unwrap(), 4);
        assert_eq!(data.index(), 3);
    }

    #[test]
    fn test_integer_range_zero_bytes_give_shrink_target() {
        assert_eq!(integer_range(&mut zeros(), -10, 10).unwrap(), 0);
        assert_eq!(integer_range(&mut zeros(), 5, 10).unwrap(), 5);
        assert_eq!(integer_range(&mut zeros(), -10, -3).unwrap(), -3);
        assert_eq!(integer_range(&mut zeros(), 7, 7).unwrap(), 7);
    }

    #[test]
    fn test_integer_range_negative_encoding() {
        // selector 0, sign bit set, magnitude offset 0 -> -1
        let mut data = ConjectureData::for_buffer(vec![0, 1, 0, 0]);
        assert_eq!(integer_range(&mut data, -1000, 1000).unwrap(), -1);
    }

    #[test]
    fn test_integer_range_boundaries() {
        let mut data = ConjectureData::for_buffer(vec![BOUNDARY_SELECTOR as u8 + 1, 0]);
        assert_eq!(integer_range(&mut data, 0, 100).unwrap(), 100);
        let mut data = ConjectureData::for_buffer(vec![BOUNDARY_SELECTOR as u8, 3]);
        assert_eq!(integer_range(&mut data, 0, 100).unwrap(), 0);
        let mut data = ConjectureData::for_buffer(vec![BOUNDARY_SELECTOR as u8 + 1, 0, 0, 0]);
        assert_eq!(integer_range(&mut data, -50, 50).unwrap(), -50);
    }

    #[test]
    fn test_integer_range_stays_in_bounds() {
        let mut data = ConjectureData::new(11);
        for _ in 0..500 {
            let v = integer_range(&mut data, -3, 1000).unwrap();
            assert!((-3..=1000).contains(&v));
        }
    }

    #[test]
    fn test_integer_range_extreme_bounds() {
        let mut data = ConjectureData::new(5);
        for _ in 0..100 {
            integer_range(&mut data, i64::MIN, i64::MAX).unwrap();
        }
        let mut data = ConjectureData::for_buffer(vec![0, 1, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(integer_range(&mut data, i64::MIN, i64::MAX).unwrap(), -1);
    }

    #[test]
    fn test_integer_range_invalid() {
        assert_eq!(integer_range(&mut zeros(), 3, 2), Err(DrawError::InvalidRange));
    }

    #[test]
    fn test_encode_integer_replays_to_value() {
        let cases = [
            (-1000, 1000, -1),
            (-1000, 1000, 999),
            (-1000, 1000, -1000),
            (5, 300, 77),
            (-300, -5, -6),
            (i64::MIN, i64::MAX, i64::MIN),
            (i64::MIN, i64::MAX, i64::MAX),
        ];
        for (min, max, value) in cases {
            let bytes = encode_integer(min, max, value).unwrap();
            assert_eq!(bytes[0], 0);
            let mut data = ConjectureData::for_buffer(bytes.clone());
            assert_eq!(integer_range(&mut data, min, max).unwrap(), value);
            assert_eq!(data.index(), bytes.len());
        }
        assert_eq!(encode_integer(-1000, 1000, -1).unwrap(), vec![0, 1, 0, 0]);
        assert_eq!(encode_integer(4, 4, 4).unwrap(), Vec::<u8>::new());
        assert_eq!(encode_integer(0, 10, 11), None);
    }

    #[test]
    fn test_sampler_respects_zero_weights() {
        let sampler = Sampler::new(&[0.0, 1.0, 0.0]).unwrap();
        let mut data = ConjectureData::new(3);
        for _ in 0..200 {
            assert_eq!(sampler.sample(&mut data).unwrap(), 1);
        }
    }

    #[test]
    fn test_sampler_rejects_bad_weights() {
        assert!(Sampler::new(&[]).is_err());
        assert!(Sampler::new(&[0.0, 0.0]).is_err());
        assert!(Sampler::new(&[1.0, f64::NAN]).is_err());
        assert!(Sampler::new(&[1.0, -1.0]).is_err());
    }

    #[test]
    fn test_sampler_zero_bytes_pick_first() {
        let sampler = Sampler::new(&[1.0, 5.0, 2.0]).unwrap();
        assert_eq!(sampler.sample(&mut zeros()).unwrap(), 0);
    }

    #[test]
    fn test_good_bitlengths_table_is_valid() {
        assert!(GOOD_BITLENGTH_WEIGHTS.iter().all(|w| w.is_finite() && *w > 0.0));
        let sampler = good_bitlengths().unwrap();
        assert_eq!(sampler.len(), GOOD_BITLENGTH_WEIGHTS.len());
    }

    #[test]
    fn test_integer_from_bitlengths() {
        let sampler = good_bitlengths().unwrap();
        assert_eq!(integer_from_bitlengths(&mut zeros(), &sampler).unwrap(), 0);
        let mut data = ConjectureData::new(8);
        for _ in 0..100 {
            integer_from_bitlengths(&mut data, &sampler).unwrap();
        }
    }
}
