//! Slices into a sequence of known size.

use std::fmt;

use crate::data::ConjectureData;
use crate::error::{DrawError, DrawResult};
use crate::strategies::{integers, optional};
use crate::strategy::{just, BoxedStrategy, Strategy};

/// A `start:stop:step` slice with optional endpoints. `step` is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: i64,
}

impl Slice {
    /// Resolve against a sequence of `length` elements, returning concrete
    /// `(start, stop, step)` clamped the way Python's `slice.indices` does.
    pub fn indices(&self, length: i64) -> (i64, i64, i64) {
        let step = self.step;
        let (lower, upper) = if step < 0 {
            (-1, length - 1)
        } else {
            (0, length)
        };
        let clamp = |bound: i64| {
            if bound < 0 {
                (bound + length).max(lower)
            } else {
                bound.min(upper)
            }
        };
        let start = match self.start {
            Some(s) => clamp(s),
            None if step < 0 => upper,
            None => lower,
        };
        let stop = match self.stop {
            Some(s) => clamp(s),
            None if step < 0 => lower,
            None => upper,
        };
        (start, stop, step)
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn bound(b: Option<i64>) -> String {
            b.map_or_else(|| "None".to_string(), |v| v.to_string())
        }
        write!(
            f,
            "slice({}, {}, {})",
            bound(self.start),
            bound(self.stop),
            self.step
        )
    }
}

/// Strategy for slices into a sequence of `size` elements.
#[derive(Debug, Clone)]
pub struct Slices {
    size: i64,
    start: BoxedStrategy<Option<i64>>,
    stop: BoxedStrategy<Option<i64>>,
}

/// Slices valid for a sequence of `size` elements: `start` in `0..size`,
/// `stop` in `0..=size`, either possibly `None`, and a nonzero `step` whose
/// sign follows the direction from start to stop.
///
/// For `size == 0` the start is always `None` and the step always 1, since
/// every slice of an empty sequence is empty. A negative `size` fails every
/// draw with `DrawError::InvalidRange`.
pub fn slices(size: i64) -> Slices {
    let start = if size > 0 {
        optional(integers(0, size - 1)).boxed()
    } else {
        just(None).boxed()
    };
    let stop = if size >= 0 {
        optional(integers(0, size)).boxed()
    } else {
        just(None).boxed()
    };
    Slices { size, start, stop }
}

impl Strategy for Slices {
    type Value = Slice;

    fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<Slice> {
        if self.size < 0 {
            return Err(DrawError::InvalidRange);
        }
        let start = data.draw(&self.start)?;
        let stop = data.draw(&self.stop)?;
        let max_step = match (start, stop) {
            (None, None) => self.size,
            (None, Some(stop)) => stop,
            (Some(start), None) => start,
            (Some(start), Some(stop)) => (start - stop).abs(),
        };
        let mut step = data.draw(&integers(1, max_step.max(1)))?;
        if stop.unwrap_or(0) < start.unwrap_or(0) {
            step = -step;
        }
        Ok(Slice { start, stop, step })
    }

    fn label(&self) -> &'static str {
        "slices"
    }
}
