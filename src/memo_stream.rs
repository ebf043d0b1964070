//! Random-access reads over a forward-only byte source.
//!
//! Delta copy opcodes address arbitrary offsets into the base object, but
//! the base is produced by a decompressor that only yields bytes in order.
//! `MemoStream` bridges the two: every byte pulled from the source is
//! retained in an append-only buffer addressed by absolute offset, so a
//! backward seek is a cursor move and a forward seek pulls from the source
//! until the memoized frontier covers the target.
//!
//! Memory grows monotonically with the highest offset requested, bounded by
//! the base object's declared length (the resolver enforces a size cap on
//! that length before construction). No eviction happens; the source is
//! pulled at most once per byte.
//!
//! # Invariants
//! - `cursor <= buf.len() <= total_len`.
//! - Bytes observed through `read` at a given offset are identical to the
//!   fully materialized source at that offset, for any read/seek order.

use crate::errors::{DeltaFault, ResolveError};
use crate::source::ByteSource;

/// Pull granularity when advancing the frontier.
const FILL_CHUNK: usize = 8 * 1024;

/// Seekable view over a forward-only source with full memoization.
pub struct MemoStream<S> {
    source: S,
    /// Every byte pulled so far, in order, addressed by absolute offset.
    buf: Vec<u8>,
    /// Read cursor into `buf`.
    cursor: usize,
    /// Declared total length of the underlying object.
    total_len: u64,
    source_done: bool,
}

impl<S: ByteSource> MemoStream<S> {
    /// Wraps `source`, whose fully materialized length is `total_len`.
    #[must_use]
    pub fn new(source: S, total_len: u64) -> Self {
        Self {
            source,
            buf: Vec::new(),
            cursor: 0,
            total_len,
            source_done: false,
        }
    }

    /// Declared total length of the stream.
    #[inline]
    #[must_use]
    pub fn total_len(&self) -> u64 {
        self.total_len
    }

    /// Sets the declared length before any byte has been pulled.
    ///
    /// The delta header carrying the base length is parsed after the base
    /// stream is opened, so the replay engine fixes the length up once the
    /// header varints are decoded.
    pub(crate) fn set_total_len(&mut self, total_len: u64) {
        debug_assert!(self.buf.is_empty() && self.cursor == 0);
        self.total_len = total_len;
    }

    /// Current absolute read position.
    #[inline]
    #[must_use]
    pub fn position(&self) -> u64 {
        self.cursor as u64
    }

    /// Moves the read cursor to `offset`.
    ///
    /// Offsets inside the memoized region reposition without I/O; offsets
    /// beyond the frontier advance the source. Seeking past the declared
    /// length fails with `CopyOutOfRange` since only delta copy opcodes
    /// drive seeks.
    pub fn seek_to(&mut self, offset: u64) -> Result<(), DeltaFault> {
        if offset > self.total_len {
            return Err(DeltaFault::CopyOutOfRange {
                base_offset: offset,
                size: 0,
                base_len: self.total_len,
            });
        }
        self.cursor = offset as usize;
        Ok(())
    }

    /// Reads up to `out.len()` bytes at the current cursor.
    ///
    /// Returns 0 at the declared end of the stream, or when the source
    /// dries up before `total_len`; the replay engine distinguishes the two
    /// and converts the latter into a truncated-base fault.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize, ResolveError> {
        let remaining_total = self.total_len.saturating_sub(self.cursor as u64);
        let want = (out.len() as u64).min(remaining_total) as usize;
        if want == 0 {
            return Ok(0);
        }

        let target = self.cursor + want;
        self.fill_to(target)?;

        let available = self.buf.len().saturating_sub(self.cursor);
        let n = want.min(available);
        out[..n].copy_from_slice(&self.buf[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }

    /// Advances the memoized frontier to at least `target` bytes, or until
    /// the source is exhausted.
    fn fill_to(&mut self, target: usize) -> Result<(), ResolveError> {
        let mut chunk = [0u8; FILL_CHUNK];
        while self.buf.len() < target && !self.source_done {
            let n = self.source.pull(&mut chunk)?;
            if n == 0 {
                self.source_done = true;
                break;
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }
}
