//! Test the core draw operations
//!
//! Covers the byte layout of each primitive, replay determinism, overrun
//! behaviour and the trace (blocks, draws, examples) recorded for shrinking.

use conjecture_engine::{
    data::{ConjectureData, DrawKind, Status},
    error::DrawError,
    strategies::{integers, vecs},
    strategy::Strategy,
};

#[test]
fn test_draw_integer_basic() {
    let mut data = ConjectureData::new(1000);
    for _ in 0..100 {
        let value = data.draw_integer(0, 10).unwrap();
        assert!((0..=10).contains(&value));
    }
}

#[test]
fn test_draw_integer_single_value_reads_nothing() {
    let mut data = ConjectureData::for_buffer(Vec::new());
    assert_eq!(data.draw_integer(7, 7), Ok(7));
    assert_eq!(data.index(), 0);
}

#[test]
fn test_draw_integer_reaches_bounds() {
    let mut data = ConjectureData::new(5);
    let values: Vec<i64> = (0..500)
        .map(|_| data.draw_integer(-1_000_000, 1_000_000).unwrap())
        .collect();
    assert!(values.contains(&-1_000_000));
    assert!(values.contains(&1_000_000));
    assert!(values.contains(&0));
}

#[test]
fn test_draw_boolean_basic() {
    let mut data = ConjectureData::new(1000);
    let trues = (0..1000).filter(|_| data.draw_boolean(0.5).unwrap()).count();
    assert!((400..600).contains(&trues), "{} trues", trues);
}

#[test]
fn test_draw_boolean_forced_still_reads_a_byte() {
    let mut data = ConjectureData::for_buffer(vec![0, 0]);
    assert_eq!(data.draw_boolean(1.0), Ok(true));
    assert_eq!(data.draw_boolean(0.0), Ok(false));
    assert_eq!(data.index(), 2);
}

#[test]
fn test_draw_bytes() {
    let mut data = ConjectureData::for_buffer(vec![1, 2, 3, 4, 5]);
    assert_eq!(data.draw_bytes(3), Ok(vec![1, 2, 3]));
    assert_eq!(data.draw_bytes(0), Ok(Vec::new()));
    assert_eq!(data.draw_bytes(3), Err(DrawError::Overrun));
    assert_eq!(data.status, Status::Overrun);
}

#[test]
fn test_weighted_choice_distribution() {
    let mut data = ConjectureData::new(77);
    let mut counts = [0usize; 3];
    for _ in 0..3000 {
        counts[data.weighted_choice(&[1.0, 0.0, 3.0]).unwrap()] += 1;
    }
    assert_eq!(counts[1], 0);
    assert!(counts[2] > counts[0] * 2, "{:?}", counts);
}

#[test]
fn test_weighted_choice_invalid_weights() {
    let mut data = ConjectureData::new(1);
    assert_eq!(data.weighted_choice(&[0.0]), Err(DrawError::EmptyWeights));
    assert_eq!(
        data.weighted_choice(&[f64::INFINITY]),
        Err(DrawError::EmptyWeights)
    );
}

#[test]
fn test_replay_gives_identical_values() {
    let strategy = vecs(integers(-500, 500));
    let mut fresh = ConjectureData::new(2024);
    let value = fresh.draw(&strategy).unwrap();
    let flag = fresh.draw_boolean(0.3).unwrap();
    let result = fresh.into_result();

    let mut replay = ConjectureData::for_buffer(result.buffer.clone());
    assert_eq!(replay.draw(&strategy).unwrap(), value);
    assert_eq!(replay.draw_boolean(0.3).unwrap(), flag);
    let replayed = replay.into_result();
    assert_eq!(replayed.buffer, result.buffer);
    assert_eq!(replayed.draws, result.draws);
    assert_eq!(replayed.examples, result.examples);
}

#[test]
fn test_blocks_cover_the_buffer() {
    let mut data = ConjectureData::new(9);
    data.draw(&vecs(integers(0, 70_000))).unwrap();
    data.draw_bytes(4).unwrap();
    let result = data.into_result();

    let mut position = 0;
    for block in &result.blocks {
        assert_eq!(block.start, position);
        position = block.end;
    }
    assert_eq!(position, result.buffer.len());
}

#[test]
fn test_draws_record_values() {
    let mut data = ConjectureData::for_buffer(vec![0, 0, 5, 200, 1]);
    data.draw_integer(-10, 10).unwrap();
    data.draw_boolean(0.5).unwrap();
    data.draw_choice(2).unwrap();
    let kinds: Vec<DrawKind> = data.draws().iter().map(|d| d.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            DrawKind::Integer {
                min: -10,
                max: 10,
                value: 5
            },
            DrawKind::Boolean { value: true },
            DrawKind::Choice {
                options: 2,
                index: 1
            },
        ]
    );
}

#[test]
fn test_discarded_examples_are_marked() {
    let never = integers(0, 3).filter(|_| false);
    let mut data = ConjectureData::new(3);
    assert!(data.draw(&never).is_err());
    let result = data.into_result();
    let filter_span = result
        .examples
        .iter()
        .find(|e| e.label == "filter")
        .unwrap();
    assert!(filter_span.discarded);
    assert_eq!(filter_span.depth, 0);
}

#[test]
fn test_assume() {
    let mut data = ConjectureData::new(0);
    assert_eq!(data.assume(true), Ok(()));
    assert!(matches!(data.assume(false), Err(DrawError::Discard(_))));
}
