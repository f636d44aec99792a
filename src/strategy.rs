//! Strategy trait and combinators.
//!
//! A strategy is an immutable description of how to turn draws into a value.
//! Strategies never hold mutable state, so the same strategy can be replayed
//! against any buffer and yield the same value for the same bytes.

use std::fmt;
use std::rc::Rc;

use crate::data::ConjectureData;
use crate::error::{DrawError, DrawResult};

/// Attempts a `filter` makes before discarding the example.
pub const FILTER_RETRIES: usize = 3;

/// A composable, replayable value generator.
pub trait Strategy {
    /// The type of values this strategy generates
    type Value;

    /// Produce a value. Call through [`ConjectureData::draw`] rather than
    /// directly so the draw is wrapped in an example span.
    fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<Self::Value>;

    /// Label recorded on the example span around each draw.
    fn label(&self) -> &'static str {
        "strategy"
    }

    /// Apply a pure transform to every value. Reads no extra bytes.
    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        Self: Sized,
        F: Fn(Self::Value) -> U,
    {
        Map { inner: self, f }
    }

    /// Keep only values satisfying `predicate`, retrying up to
    /// [`FILTER_RETRIES`] times before discarding the example.
    fn filter<F>(self, predicate: F) -> Filter<Self, F>
    where
        Self: Sized,
        F: Fn(&Self::Value) -> bool,
    {
        Filter {
            inner: self,
            predicate,
        }
    }

    /// Draw a value, build a second strategy from it and draw from that.
    fn flat_map<S, F>(self, f: F) -> FlatMap<Self, F>
    where
        Self: Sized,
        S: Strategy,
        F: Fn(Self::Value) -> S,
    {
        FlatMap { inner: self, f }
    }

    /// Type-erase this strategy.
    fn boxed(self) -> BoxedStrategy<Self::Value>
    where
        Self: Sized + 'static,
    {
        BoxedStrategy(Rc::new(self))
    }
}

/// A cheaply clonable, type-erased strategy.
pub struct BoxedStrategy<T>(Rc<dyn Strategy<Value = T>>);

impl<T> Clone for BoxedStrategy<T> {
    fn clone(&self) -> Self {
        BoxedStrategy(Rc::clone(&self.0))
    }
}

impl<T> fmt::Debug for BoxedStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoxedStrategy({})", self.0.label())
    }
}

impl<T> Strategy for BoxedStrategy<T> {
    type Value = T;

    fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<T> {
        self.0.do_draw(data)
    }

    fn label(&self) -> &'static str {
        self.0.label()
    }
}

pub struct Map<S, F> {
    inner: S,
    f: F,
}

impl<S, F, U> Strategy for Map<S, F>
where
    S: Strategy,
    F: Fn(S::Value) -> U,
{
    type Value = U;

    fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<U> {
        let value = data.draw(&self.inner)?;
        Ok((self.f)(value))
    }

    fn label(&self) -> &'static str {
        "map"
    }
}

pub struct Filter<S, F> {
    inner: S,
    predicate: F,
}

impl<S, F> Strategy for Filter<S, F>
where
    S: Strategy,
    F: Fn(&S::Value) -> bool,
{
    type Value = S::Value;

    fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<S::Value> {
        for _ in 0..FILTER_RETRIES {
            let value = data.draw(&self.inner)?;
            if (self.predicate)(&value) {
                return Ok(value);
            }
        }
        Err(DrawError::Discard("filter retries exhausted"))
    }

    fn label(&self) -> &'static str {
        "filter"
    }
}

pub struct FlatMap<S, F> {
    inner: S,
    f: F,
}

impl<S, F, T> Strategy for FlatMap<S, F>
where
    S: Strategy,
    T: Strategy,
    F: Fn(S::Value) -> T,
{
    type Value = T::Value;

    fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<T::Value> {
        let value = data.draw(&self.inner)?;
        let next = (self.f)(value);
        data.draw(&next)
    }

    fn label(&self) -> &'static str {
        "flat_map"
    }
}

/// Strategy defined by a drawing closure, for dependent generation.
pub struct Composite<F> {
    f: F,
}

/// Build a strategy from a closure that draws from `ConjectureData` directly.
pub fn composite<T, F>(f: F) -> Composite<F>
where
    F: Fn(&mut ConjectureData) -> DrawResult<T>,
{
    Composite { f }
}

impl<F, T> Strategy for Composite<F>
where
    F: Fn(&mut ConjectureData) -> DrawResult<T>,
{
    type Value = T;

    fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<T> {
        (self.f)(data)
    }

    fn label(&self) -> &'static str {
        "composite"
    }
}

/// A strategy that always produces the same value
#[derive(Debug, Clone)]
pub struct Just<T> {
    value: T,
}

pub fn just<T: Clone>(value: T) -> Just<T> {
    Just { value }
}

impl<T: Clone> Strategy for Just<T> {
    type Value = T;

    fn do_draw(&self, _data: &mut ConjectureData) -> DrawResult<T> {
        Ok(self.value.clone())
    }

    fn label(&self) -> &'static str {
        "just"
    }
}

/// Picks one of several strategies, shrinking toward the first.
#[derive(Debug, Clone)]
pub struct OneOf<T> {
    options: Vec<BoxedStrategy<T>>,
}

pub fn one_of<T>(options: Vec<BoxedStrategy<T>>) -> OneOf<T> {
    OneOf { options }
}

impl<T> Strategy for OneOf<T> {
    type Value = T;

    fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<T> {
        let i = data.draw_choice(self.options.len())?;
        data.draw(&self.options[i])
    }

    fn label(&self) -> &'static str {
        "one_of"
    }
}

macro_rules! tuple_strategy {
    ($($name:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($name: Strategy),+> Strategy for ($($name,)+) {
            type Value = ($($name::Value,)+);

            fn do_draw(&self, data: &mut ConjectureData) -> DrawResult<Self::Value> {
                let ($($name,)+) = self;
                Ok(($(data.draw($name)?,)+))
            }

            fn label(&self) -> &'static str {
                "tuple"
            }
        }
    };
}

tuple_strategy!(A);
tuple_strategy!(A, B);
tuple_strategy!(A, B, C);
tuple_strategy!(A, B, C, D);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::integers;

    #[test]
    fn test_map_reads_no_extra_bytes() {
        let plain = integers(0, 100);
        let mapped = integers(0, 100).map(|x| x * 2);
        let mut a = ConjectureData::new(5);
        let mut b = ConjectureData::new(5);
        let x = a.draw(&plain).unwrap();
        let y = b.draw(&mapped).unwrap();
        assert_eq!(x * 2, y);
        assert_eq!(a.index(), b.index());
    }

    #[test]
    fn test_filter_discards_after_retries() {
        let never = integers(0, 10).filter(|_| false);
        let mut data = ConjectureData::new(1);
        assert_eq!(
            data.draw(&never),
            Err(DrawError::Discard("filter retries exhausted"))
        );
        assert_eq!(data.examples().iter().filter(|e| e.label == "integers").count(), FILTER_RETRIES);
    }

    #[test]
    fn test_filter_keeps_valid_values() {
        let even = integers(0, 1000).filter(|x| x % 2 == 0);
        let mut data = ConjectureData::new(2);
        for _ in 0..50 {
            match data.draw(&even) {
                Ok(x) => assert_eq!(x % 2, 0),
                Err(e) => assert_eq!(e, DrawError::Discard("filter retries exhausted")),
            }
        }
    }

    #[test]
    fn test_flat_map_dependent_generation() {
        let strategy = integers(0, 5).flat_map(|n| {
            composite(move |data| {
                let mut out = Vec::new();
                for _ in 0..n {
                    out.push(data.draw(&integers(0, 9))?);
                }
                Ok(out)
            })
        });
        let mut data = ConjectureData::new(3);
        for _ in 0..20 {
            let v = data.draw(&strategy).unwrap();
            assert!(v.len() <= 5);
            assert!(v.iter().all(|x| (0..=9).contains(x)));
        }
    }

    #[test]
    fn test_one_of_zero_bytes_pick_first() {
        let strategy = one_of(vec![just(1).boxed(), just(2).boxed()]);
        let mut data = ConjectureData::for_buffer(vec![0]);
        assert_eq!(data.draw(&strategy).unwrap(), 1);
        let mut data = ConjectureData::for_buffer(vec![1]);
        assert_eq!(data.draw(&strategy).unwrap(), 2);
    }

    #[test]
    fn test_one_of_empty_is_an_error() {
        let strategy: OneOf<i64> = one_of(Vec::new());
        let mut data = ConjectureData::new(0);
        assert_eq!(data.draw(&strategy), Err(DrawError::EmptyWeights));
    }

    #[test]
    fn test_tuples_and_labels() {
        let strategy = (integers(0, 3), just("x"), integers(-3, 0));
        let mut data = ConjectureData::for_buffer(vec![0; 8]);
        assert_eq!(data.draw(&strategy).unwrap(), (0, "x", 0));
        let labels: Vec<_> = data.examples().iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["tuple", "integers", "just", "integers"]);
    }

    #[test]
    fn test_composite_draws_are_labelled() {
        let pair = composite(|data| Ok((data.draw(&integers(0, 3))?, data.draw_boolean(0.5)?)));
        let mut data = ConjectureData::for_buffer(vec![0; 4]);
        assert_eq!(data.draw(&pair).unwrap(), (0, false));
        assert_eq!(data.examples()[0].label, "composite");
        assert_eq!(data.examples()[1].label, "integers");
    }

    #[test]
    fn test_boxed_is_clonable() {
        let boxed = integers(0, 3).boxed();
        let copy = boxed.clone();
        assert_eq!(copy.label(), "integers");
        assert_eq!(format!("{:?}", copy), "BoxedStrategy(integers)");
    }
}
