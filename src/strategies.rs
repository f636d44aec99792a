//! Built-in strategies.
//!
//! Each of these bottoms out in one of the `ConjectureData` primitives, so
//! an all-zero buffer always yields the simplest value: the integer closest
//! to zero, `false`, the first option, an empty or minimum-size collection.

use std::fmt;

use crate::data::ConjectureData;
use crate::distributions::Repeat;
use crate::error::{DrawError, DrawResult};
use crate::ints::{good_bitlengths, integer_from_bitlengths};
use crate::strategy::{just, one_of, OneOf, Strategy};

/// Integers in an inclusive range.
#[derive(Debug, Clone, Copy)]
pub struct Integers {
    min: i64,
    max: i64,
}

/// Integers in `[min, max]`. An empty range fails every draw with
/// `DrawError::InvalidRange`.
pub fn integers(min: i64, max: i64) -> Integers {
    Integers { min, max }
}

impl Strategy for Integers {
    type Value = i64;

    fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<i64> {
        data.draw_integer(self.min, self.max)
    }

    fn label(&self) -> &'static str {
        "integers"
    }
}

/// Unbounded integers, weighted heavily toward small magnitudes.
#[derive(Debug, Clone, Copy)]
pub struct AnyInteger;

pub fn any_integer() -> AnyInteger {
    AnyInteger
}

impl Strategy for AnyInteger {
    type Value = i64;

    fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<i64> {
        let bitlengths = good_bitlengths()?;
        integer_from_bitlengths(data, &bitlengths)
    }

    fn label(&self) -> &'static str {
        "any_integer"
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Booleans;

/// Fair booleans.
pub fn booleans() -> Booleans {
    Booleans
}

impl Strategy for Booleans {
    type Value = bool;

    fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<bool> {
        data.draw_boolean(0.5)
    }

    fn label(&self) -> &'static str {
        "booleans"
    }
}

/// Uniform choice from a fixed list, shrinking toward the first element.
#[derive(Debug, Clone)]
pub struct SampledFrom<T> {
    values: Vec<T>,
}

pub fn sampled_from<T: Clone>(values: Vec<T>) -> SampledFrom<T> {
    SampledFrom { values }
}

impl<T: Clone> Strategy for SampledFrom<T> {
    type Value = T;

    fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<T> {
        let i = data.draw_choice(self.values.len())?;
        Ok(self.values[i].clone())
    }

    fn label(&self) -> &'static str {
        "sampled_from"
    }
}

/// Choice from a list with explicit relative weights.
#[derive(Debug, Clone)]
pub struct WeightedFrom<T> {
    weights: Vec<f64>,
    values: Vec<T>,
}

pub fn weighted_from<T: Clone>(pairs: Vec<(f64, T)>) -> WeightedFrom<T> {
    let (weights, values) = pairs.into_iter().unzip();
    WeightedFrom { weights, values }
}

impl<T: Clone> Strategy for WeightedFrom<T> {
    type Value = T;

    fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<T> {
        let i = data.weighted_choice(&self.weights)?;
        Ok(self.values[i].clone())
    }

    fn label(&self) -> &'static str {
        "weighted_from"
    }
}

/// `Some` of the inner strategy or `None`. Zero bytes give `Some` of the
/// inner strategy's simplest value; `None` needs a nonzero choice byte.
pub fn optional<S>(inner: S) -> OneOf<Option<S::Value>>
where
    S: Strategy + 'static,
    S::Value: Clone + 'static,
{
    one_of(vec![inner.map(Some).boxed(), just(None).boxed()])
}

/// Variable-length vectors of elements drawn from `element`.
#[derive(Clone)]
pub struct Vecs<S> {
    element: S,
    min_size: u64,
    max_size: u64,
    average_size: f64,
}

impl<S> fmt::Debug for Vecs<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vecs")
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .field("average_size", &self.average_size)
            .finish()
    }
}

/// Vectors of any length up to 100, averaging around 10 elements.
pub fn vecs<S: Strategy>(element: S) -> Vecs<S> {
    Vecs {
        element,
        min_size: 0,
        max_size: 100,
        average_size: 10.0,
    }
}

impl<S: Strategy> Vecs<S> {
    pub fn min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        if self.max_size < min_size {
            self.max_size = min_size;
        }
        self
    }

    pub fn max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn average_size(mut self, average_size: f64) -> Self {
        self.average_size = average_size;
        self
    }
}

impl<S: Strategy> Strategy for Vecs<S> {
    type Value = Vec<S::Value>;

    fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<Vec<S::Value>> {
        if self.min_size > self.max_size {
            return Err(DrawError::InvalidRange);
        }
        let expected = self
            .average_size
            .max(self.min_size as f64)
            .min(self.max_size as f64);
        let mut repeat = Repeat::new(self.min_size, self.max_size, expected);
        let mut out = Vec::new();
        loop {
            // The continue flag and the element share a span so that the
            // shrinker can delete both together.
            data.start_example("vec_element");
            let more = match repeat.should_continue(data) {
                Ok(more) => more,
                Err(e) => {
                    data.stop_example(true);
                    return Err(e);
                }
            };
            if !more {
                data.stop_example(false);
                break;
            }
            let element = data.draw(&self.element);
            data.stop_example(element.is_err());
            out.push(element?);
        }
        Ok(out)
    }

    fn label(&self) -> &'static str {
        "vecs"
    }
}

/// Fixed-length raw byte strings.
#[derive(Debug, Clone, Copy)]
pub struct Bytes {
    len: usize,
}

pub fn bytes(len: usize) -> Bytes {
    Bytes { len }
}

impl Strategy for Bytes {
    type Value = Vec<u8>;

    fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<Vec<u8>> {
        data.draw_bytes(self.len)
    }

    fn label(&self) -> &'static str {
        "bytes"
    }
}
