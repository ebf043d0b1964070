//! Property tests for delta replay against a direct model.
//!
//! Random bases and random copy/insert programs are encoded into real
//! delta streams, replayed through the engine under arbitrary pull
//! granularities, and compared byte for byte with the model output.

use proptest::prelude::*;

use odbread::{CancelFlag, DeltaReplay, ReplayContext, SliceSource};

#[derive(Clone, Debug)]
enum Op {
    /// Copy `size` bytes from `offset` in the base.
    Copy { offset: usize, size: usize },
    /// Insert a literal run.
    Insert(Vec<u8>),
}

fn encode_size_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let bits = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(bits);
            return;
        }
        out.push(bits | 0x80);
    }
}

fn encode_delta(base_len: usize, result_len: usize, ops: &[Op]) -> Vec<u8> {
    let mut delta = Vec::new();
    encode_size_varint(base_len as u64, &mut delta);
    encode_size_varint(result_len as u64, &mut delta);
    for op in ops {
        match op {
            Op::Copy { offset, size } => {
                let mut cmd = 0x80u8;
                let mut fields = Vec::new();
                for i in 0..4 {
                    let b = ((offset >> (8 * i)) & 0xff) as u8;
                    if b != 0 {
                        cmd |= 1 << i;
                        fields.push(b);
                    }
                }
                // Size 0x10000 is the implicit default (no size bytes).
                if *size != 0x10000 {
                    for i in 0..3 {
                        let b = ((size >> (8 * i)) & 0xff) as u8;
                        if b != 0 {
                            cmd |= 0x10 << i;
                            fields.push(b);
                        }
                    }
                }
                delta.push(cmd);
                delta.extend_from_slice(&fields);
            }
            Op::Insert(literal) => {
                delta.push(literal.len() as u8);
                delta.extend_from_slice(literal);
            }
        }
    }
    delta
}

fn model_output(base: &[u8], ops: &[Op]) -> Vec<u8> {
    let mut out = Vec::new();
    for op in ops {
        match op {
            Op::Copy { offset, size } => out.extend_from_slice(&base[*offset..offset + size]),
            Op::Insert(literal) => out.extend_from_slice(literal),
        }
    }
    out
}

fn op_strategy(base_len: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..base_len, 1usize..=64).prop_map(move |(offset, size)| {
            let size = size.min(base_len - offset);
            Op::Copy { offset, size }
        }),
        proptest::collection::vec(any::<u8>(), 1..=127).prop_map(Op::Insert),
    ]
}

fn base_and_ops() -> impl Strategy<Value = (Vec<u8>, Vec<Op>)> {
    proptest::collection::vec(any::<u8>(), 1..4096).prop_flat_map(|base| {
        let ops = proptest::collection::vec(op_strategy(base.len()), 1..24);
        (Just(base), ops)
    })
}

proptest! {
    #[test]
    fn replay_matches_model((base, ops) in base_and_ops(), chunk in 1usize..512) {
        let expected = model_output(&base, &ops);
        let delta = encode_delta(base.len(), expected.len(), &ops);

        let mut replay = DeltaReplay::new(
            SliceSource::new(&base),
            SliceSource::new(&delta),
            ReplayContext::default(),
            CancelFlag::new(),
        ).unwrap();
        prop_assert_eq!(replay.result_len(), expected.len() as u64);

        let mut out = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            let n = replay.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        replay.verify_complete().unwrap();
        prop_assert_eq!(out, expected);
    }

    /// Large inserts straddle preload refills; exercise outputs well past
    /// one buffer's worth of instruction bytes.
    #[test]
    fn long_insert_programs_survive_refills(
        runs in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 100..=127), 600..700),
    ) {
        let ops: Vec<Op> = runs.into_iter().map(Op::Insert).collect();
        let base = [0u8; 1];
        let expected = model_output(&base, &ops);
        let delta = encode_delta(base.len(), expected.len(), &ops);

        let mut replay = DeltaReplay::new(
            SliceSource::new(&base),
            SliceSource::new(&delta),
            ReplayContext::default(),
            CancelFlag::new(),
        ).unwrap();
        let mut out = Vec::new();
        replay.read_to_end(&mut out).unwrap();
        prop_assert_eq!(out, expected);
    }
}
