//! Property tests for the bounded sample buffer.

use proptest::prelude::*;
use std::collections::VecDeque;

use voice_stream_buffer::SampleBuffer;

#[derive(Debug, Clone)]
enum Op {
    Add(Vec<f32>),
    Read(usize),
    Clear,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => prop::collection::vec(-1.0f32..1.0, 0..40).prop_map(Op::Add),
        3 => (0usize..40).prop_map(Op::Read),
        1 => Just(Op::Clear),
    ]
}

proptest! {
    #[test]
    fn length_never_exceeds_capacity(
        capacity in 0usize..32,
        batches in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 0..80), 0..20),
    ) {
        let buffer = SampleBuffer::with_capacity(capacity);
        for batch in &batches {
            buffer.add_samples(batch);
            prop_assert!(buffer.len() <= capacity);
        }
    }

    #[test]
    fn behaves_like_bounded_fifo(capacity in 0usize..32, ops in prop::collection::vec(op(), 0..60)) {
        let buffer = SampleBuffer::with_capacity(capacity);
        let mut model: VecDeque<f32> = VecDeque::new();

        for op in ops {
            match op {
                Op::Add(samples) => {
                    buffer.add_samples(&samples);
                    model.extend(samples);
                    while model.len() > capacity {
                        model.pop_front();
                    }
                }
                Op::Read(n) => {
                    let expected: Vec<f32> = model.drain(..n.min(model.len())).collect();
                    let (samples, count) = buffer.read_samples(n);
                    prop_assert_eq!(count, expected.len());
                    prop_assert_eq!(samples, expected);
                }
                Op::Clear => {
                    buffer.clear_buffer();
                    model.clear();
                }
            }
            prop_assert_eq!(buffer.len(), model.len());
        }
    }

    #[test]
    fn draining_returns_exactly_what_was_stored(
        capacity in 1usize..64,
        samples in prop::collection::vec(-1.0f32..1.0, 0..64),
    ) {
        let buffer = SampleBuffer::with_capacity(capacity);
        buffer.add_samples(&samples);

        let skip = samples.len().saturating_sub(capacity);
        let mut drained = Vec::new();
        loop {
            let (chunk, count) = buffer.read_samples(capacity);
            if count == 0 {
                break;
            }
            drained.extend(chunk);
        }

        prop_assert_eq!(&drained[..], &samples[skip..]);
        prop_assert!(buffer.is_empty());
    }
}
