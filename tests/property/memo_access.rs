//! Property tests for memoized random access.
//!
//! Any interleaving of seeks and reads over a `MemoStream` must observe
//! exactly the bytes of the fully materialized source, and never pull a
//! source byte twice.

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;

use odbread::{ByteSource, MemoStream, ResolveError, SliceSource};

#[derive(Clone, Debug)]
enum Access {
    Seek(usize),
    Read(usize),
}

struct CountingSource<S> {
    inner: S,
    pulled: Rc<Cell<u64>>,
}

impl<S: ByteSource> ByteSource for CountingSource<S> {
    fn pull(&mut self, out: &mut [u8]) -> Result<usize, ResolveError> {
        let n = self.inner.pull(out)?;
        self.pulled.set(self.pulled.get() + n as u64);
        Ok(n)
    }
}

fn access_strategy(len: usize) -> impl Strategy<Value = Access> {
    prop_oneof![
        (0..=len).prop_map(Access::Seek),
        (1..=64usize).prop_map(Access::Read),
    ]
}

fn data_and_accesses() -> impl Strategy<Value = (Vec<u8>, Vec<Access>)> {
    proptest::collection::vec(any::<u8>(), 1..2048).prop_flat_map(|data| {
        let accesses = proptest::collection::vec(access_strategy(data.len()), 1..64);
        (Just(data), accesses)
    })
}

proptest! {
    #[test]
    fn any_access_order_observes_source_bytes((data, accesses) in data_and_accesses()) {
        let len = data.len();
        let pulled = Rc::new(Cell::new(0u64));
        let source = CountingSource {
            inner: SliceSource::new(&data),
            pulled: Rc::clone(&pulled),
        };
        let mut stream = MemoStream::new(source, len as u64);

        let mut cursor = 0usize;
        for access in accesses {
            match access {
                Access::Seek(offset) => {
                    stream.seek_to(offset as u64).unwrap();
                    cursor = offset;
                }
                Access::Read(want) => {
                    let mut buf = vec![0u8; want];
                    let n = stream.read(&mut buf).unwrap();
                    let expected = want.min(len - cursor);
                    prop_assert_eq!(n, expected);
                    prop_assert_eq!(&buf[..n], &data[cursor..cursor + n]);
                    cursor += n;
                }
            }
        }

        // At-most-once pull per source byte.
        prop_assert!(pulled.get() <= len as u64);
    }
}
