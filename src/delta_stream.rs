//! Pull-based replay of Git delta edit scripts.
//!
//! A delta payload opens with two size varints (base length, result length)
//! followed by opcodes: copy (high bit set; mask bits 0x01..0x08 select
//! offset bytes, 0x10..0x40 select size bytes, little-endian) and insert
//! (low 7 bits give a literal length of 1..=127; command byte 0x00 is
//! reserved and malformed). A copy size of zero encodes 0x10000 per the
//! pack format.
//!
//! The engine is pull-based: the consumer requests N bytes at a time and
//! the engine never buffers more output than requested. Input arrives
//! through a 64 KiB preload buffer; refills compact the unread tail so a
//! multi-byte field interrupted by a refill is reassembled without losing
//! bytes. The only suspension points are the delta refill and the base
//! read, never the middle of a sub-field.
//!
//! # Invariants
//! - Total bytes produced equals the header-declared result length; any
//!   deviation at end-of-stream is a hard fault, never a short result.
//! - The base stream is owned exclusively by this replay and dropped with
//!   it.

use crate::cancel::CancelFlag;
use crate::errors::{DeltaFault, ResolveError};
use crate::memo_stream::MemoStream;
use crate::source::ByteSource;
use crate::varint;

/// Preload buffer size for the delta instruction stream.
pub const PRELOAD_BUF_SIZE: usize = 64 * 1024;

/// Error-reporting context: which pack entry this delta came from.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReplayContext {
    /// Pack holding the delta entry, if packed.
    pub pack_id: Option<u16>,
    /// Entry offset within the pack (or 0 for loose-adjacent uses).
    pub offset: u64,
}

/// Replay mode. Exactly one variant is active; `Idle` is both the initial
/// state and the state after any copy or insert completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReplayState {
    Idle,
    Copying { remaining: u64 },
    Inserting { remaining: u8 },
}

/// Streaming delta decoder over a seekable base and a forward-only delta
/// instruction source.
pub struct DeltaReplay<B, D> {
    base: MemoStream<B>,
    delta: D,
    buf: Box<[u8]>,
    buf_pos: usize,
    buf_len: usize,
    delta_eof: bool,
    /// Absolute position in the delta stream of the next unread byte.
    consumed: u64,
    state: ReplayState,
    result_len: u64,
    produced: u64,
    context: ReplayContext,
    cancel: CancelFlag,
}

impl<B: ByteSource, D: ByteSource> DeltaReplay<B, D> {
    /// Parses the delta header and prepares replay.
    ///
    /// Reads the base-length and result-length varints from `delta`,
    /// refilling as needed, then wraps `base` in a `MemoStream` sized to
    /// the declared base length.
    pub fn new(
        base: B,
        delta: D,
        context: ReplayContext,
        cancel: CancelFlag,
    ) -> Result<Self, ResolveError> {
        let mut replay = Self {
            base: MemoStream::new(base, 0),
            delta,
            buf: vec![0u8; PRELOAD_BUF_SIZE].into_boxed_slice(),
            buf_pos: 0,
            buf_len: 0,
            delta_eof: false,
            consumed: 0,
            state: ReplayState::Idle,
            result_len: 0,
            produced: 0,
            context,
            cancel,
        };

        let base_len = replay.read_header_varint()?;
        let result_len = replay.read_header_varint()?;

        replay.base.set_total_len(base_len);
        replay.result_len = result_len;
        Ok(replay)
    }

    /// Header-declared length of the reconstructed object.
    #[inline]
    #[must_use]
    pub fn result_len(&self) -> u64 {
        self.result_len
    }

    /// Header-declared length of the base object.
    #[inline]
    #[must_use]
    pub fn base_len(&self) -> u64 {
        self.base.total_len()
    }

    /// Bytes produced so far.
    #[inline]
    #[must_use]
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Fails unless the replay has produced exactly the declared length.
    ///
    /// Call after `read` returns 0; a deficit means the delta stream ended
    /// early and the partial output must be discarded.
    pub fn verify_complete(&self) -> Result<(), ResolveError> {
        if self.produced == self.result_len {
            Ok(())
        } else {
            Err(self.fault(DeltaFault::OutputDeficit {
                declared: self.result_len,
                produced: self.produced,
            }))
        }
    }

    /// Reads up to `out.len()` reconstructed bytes.
    ///
    /// Returns 0 exactly when the delta instruction stream is exhausted
    /// with no opcode in flight.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize, ResolveError> {
        let mut written = 0usize;

        while written < out.len() {
            match self.state {
                ReplayState::Idle => {
                    let Some(opcode) = self.next_byte()? else {
                        break; // terminal: delta stream exhausted
                    };

                    if (opcode & 0x80) != 0 {
                        let (base_offset, size) = self.decode_copy_fields(opcode)?;
                        let out_of_range = base_offset
                            .checked_add(size)
                            .map_or(true, |end| end > self.base.total_len());
                        if out_of_range {
                            return Err(self.fault(DeltaFault::CopyOutOfRange {
                                base_offset,
                                size,
                                base_len: self.base.total_len(),
                            }));
                        }
                        self.base
                            .seek_to(base_offset)
                            .map_err(|fault| self.fault(fault))?;
                        self.state = ReplayState::Copying { remaining: size };
                    } else if opcode == 0 {
                        return Err(self.fault(DeltaFault::ZeroInsert {
                            at: self.consumed - 1,
                        }));
                    } else {
                        self.state = ReplayState::Inserting {
                            remaining: opcode & 0x7f,
                        };
                    }
                }
                ReplayState::Copying { remaining } => {
                    self.cancel.check()?;
                    let want = remaining.min((out.len() - written) as u64) as usize;
                    let n = self.base.read(&mut out[written..written + want])?;
                    if n == 0 {
                        return Err(self.fault(DeltaFault::TruncatedBase { at: self.consumed }));
                    }
                    self.account_output(n)?;
                    written += n;
                    let remaining = remaining - n as u64;
                    self.state = if remaining == 0 {
                        ReplayState::Idle
                    } else {
                        ReplayState::Copying { remaining }
                    };
                }
                ReplayState::Inserting { remaining } => {
                    if self.buf_pos >= self.buf_len && !self.refill()? {
                        return Err(self.fault(DeltaFault::TruncatedDelta { at: self.consumed }));
                    }
                    let avail = self.buf_len - self.buf_pos;
                    let n = (remaining as usize).min(out.len() - written).min(avail);
                    out[written..written + n]
                        .copy_from_slice(&self.buf[self.buf_pos..self.buf_pos + n]);
                    self.buf_pos += n;
                    self.consumed += n as u64;
                    self.account_output(n)?;
                    written += n;
                    let remaining = remaining - n as u8;
                    self.state = if remaining == 0 {
                        ReplayState::Idle
                    } else {
                        ReplayState::Inserting { remaining }
                    };
                }
            }
        }

        Ok(written)
    }

    /// Drives the replay to completion, appending into `out`.
    ///
    /// Validates the produced length against the header's declared result
    /// length; on any error `out` is unreliable and must be discarded.
    pub fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<(), ResolveError> {
        let mut chunk = [0u8; 8 * 1024];
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        self.verify_complete()
    }

    fn fault(&self, fault: DeltaFault) -> ResolveError {
        ResolveError::Corrupt {
            pack_id: self.context.pack_id,
            offset: self.context.offset,
            fault,
        }
    }

    fn account_output(&mut self, n: usize) -> Result<(), ResolveError> {
        self.produced += n as u64;
        if self.produced > self.result_len {
            return Err(self.fault(DeltaFault::OutputOverrun {
                declared: self.result_len,
            }));
        }
        Ok(())
    }

    /// Refills the preload buffer, compacting the unread tail so partially
    /// consumed multi-byte fields survive the refill.
    fn refill(&mut self) -> Result<bool, ResolveError> {
        if self.delta_eof {
            return Ok(false);
        }
        self.cancel.check()?;

        self.buf.copy_within(self.buf_pos..self.buf_len, 0);
        self.buf_len -= self.buf_pos;
        self.buf_pos = 0;

        let n = self.delta.pull(&mut self.buf[self.buf_len..])?;
        if n == 0 {
            self.delta_eof = true;
            return Ok(false);
        }
        self.buf_len += n;
        Ok(true)
    }

    /// Consumes one byte from the delta stream, refilling as needed.
    fn next_byte(&mut self) -> Result<Option<u8>, ResolveError> {
        if self.buf_pos >= self.buf_len && !self.refill()? {
            return Ok(None);
        }
        let byte = self.buf[self.buf_pos];
        self.buf_pos += 1;
        self.consumed += 1;
        Ok(Some(byte))
    }

    /// Like `next_byte`, but EOF mid-opcode is a truncation fault.
    fn next_byte_or_truncated(&mut self) -> Result<u8, ResolveError> {
        self.next_byte()?
            .ok_or_else(|| self.fault(DeltaFault::TruncatedDelta { at: self.consumed }))
    }

    /// Decodes the offset/size sub-fields of a copy opcode.
    ///
    /// Each set mask bit consumes one byte, OR-ed in at the matching
    /// little-endian shift. A raw size of 0 decodes to 0x10000.
    fn decode_copy_fields(&mut self, opcode: u8) -> Result<(u64, u64), ResolveError> {
        let mut base_offset = 0u64;
        let mut size = 0u64;

        for (bit, shift) in [(0x01u8, 0u32), (0x02, 8), (0x04, 16), (0x08, 24)] {
            if (opcode & bit) != 0 {
                base_offset |= (self.next_byte_or_truncated()? as u64) << shift;
            }
        }
        for (bit, shift) in [(0x10u8, 0u32), (0x20, 8), (0x40, 16)] {
            if (opcode & bit) != 0 {
                size |= (self.next_byte_or_truncated()? as u64) << shift;
            }
        }

        if size == 0 {
            size = 0x10000;
        }

        Ok((base_offset, size))
    }

    /// Reads a header size varint, refilling until it terminates.
    fn read_header_varint(&mut self) -> Result<u64, ResolveError> {
        loop {
            let mut pos = self.buf_pos;
            match varint::read_size(&self.buf[..self.buf_len], &mut pos) {
                Ok(Some(value)) => {
                    self.consumed += (pos - self.buf_pos) as u64;
                    self.buf_pos = pos;
                    return Ok(value);
                }
                Ok(None) => {
                    if !self.refill()? {
                        return Err(self.fault(DeltaFault::TruncatedDelta {
                            at: self.consumed,
                        }));
                    }
                }
                Err(_) => {
                    return Err(self.fault(DeltaFault::VarintOverflow { at: self.consumed }));
                }
            }
        }
    }
}

impl<B: ByteSource, D: ByteSource> ByteSource for DeltaReplay<B, D> {
    #[inline]
    fn pull(&mut self, out: &mut [u8]) -> Result<usize, ResolveError> {
        self.read(out)
    }
}
