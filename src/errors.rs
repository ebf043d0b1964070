//! Error types for object resolution.
//!
//! Errors are stage-specific: varint decoding, inflation, delta replay, and
//! chain resolution each have their own enum, composed into `ResolveError`
//! at the resolver boundary. All enums are hand-rolled with `Display` and
//! `Error` impls; variants carry enough context (pack id, entry offset,
//! delta byte position) for diagnosis without a debugger.
//!
//! None of these conditions are retried internally: corrupt data cannot
//! succeed on retry without external repair, and a failed resolution never
//! returns partial bytes.

use std::fmt;
use std::io;

use crate::object_id::ObjectId;

/// Errors from variable-length integer decoding.
///
/// Insufficient buffered bytes are *not* an error; codecs report that case
/// as `Ok(None)` so streaming callers can refill and retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum VarintError {
    /// A continuation sequence would exceed the maximum representable length.
    Overflow,
}

impl fmt::Display for VarintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow => write!(f, "varint exceeds 64-bit range"),
        }
    }
}

impl std::error::Error for VarintError {}

/// Errors from zlib inflation of pack or loose payloads.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum InflateError {
    /// The compressed stream ended before the declared output was produced.
    Truncated,
    /// The zlib stream is malformed.
    Corrupt,
}

impl fmt::Display for InflateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated zlib stream"),
            Self::Corrupt => write!(f, "corrupt zlib stream"),
        }
    }
}

impl std::error::Error for InflateError {}

/// Faults raised by the delta replay state machine.
///
/// `at` is the byte position within the inflated delta stream where the
/// fault was detected, counted from the start of the delta header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeltaFault {
    /// The delta stream ended mid-opcode or mid-header.
    TruncatedDelta { at: u64 },
    /// The base stream ended before a copy opcode was satisfied.
    TruncatedBase { at: u64 },
    /// A header varint overflowed the addressable range.
    VarintOverflow { at: u64 },
    /// Insert opcode with zero length (reserved command byte 0x00).
    ZeroInsert { at: u64 },
    /// Copy opcode addressed bytes beyond the base object.
    CopyOutOfRange {
        base_offset: u64,
        size: u64,
        base_len: u64,
    },
    /// Delta header's base length disagrees with the base object's own
    /// declared length.
    BaseSizeMismatch { header: u64, base: u64 },
    /// Replay produced more bytes than the header declared.
    OutputOverrun { declared: u64 },
    /// Replay finished with fewer bytes than the header declared.
    OutputDeficit { declared: u64, produced: u64 },
}

impl fmt::Display for DeltaFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TruncatedDelta { at } => {
                write!(f, "delta stream truncated at byte {at}")
            }
            Self::TruncatedBase { at } => {
                write!(f, "base stream exhausted during copy at delta byte {at}")
            }
            Self::VarintOverflow { at } => {
                write!(f, "delta header varint overflow at byte {at}")
            }
            Self::ZeroInsert { at } => {
                write!(f, "zero-length insert opcode at delta byte {at}")
            }
            Self::CopyOutOfRange {
                base_offset,
                size,
                base_len,
            } => write!(
                f,
                "copy of {size} bytes at base offset {base_offset} exceeds base length {base_len}"
            ),
            Self::BaseSizeMismatch { header, base } => write!(
                f,
                "delta header declares base length {header}, base object is {base} bytes"
            ),
            Self::OutputOverrun { declared } => {
                write!(f, "delta output exceeds declared length {declared}")
            }
            Self::OutputDeficit { declared, produced } => {
                write!(
                    f,
                    "delta produced {produced} bytes, header declared {declared}"
                )
            }
        }
    }
}

impl std::error::Error for DeltaFault {}

/// Errors surfaced by `Resolver::resolve`.
#[derive(Debug)]
#[non_exhaustive]
pub enum ResolveError {
    /// I/O error reading pack or loose data.
    Io(io::Error),
    /// zlib inflation failed.
    Inflate {
        pack_id: Option<u16>,
        offset: u64,
        source: InflateError,
    },
    /// Pack entry header is malformed at the given offset.
    EntryHeader {
        pack_id: u16,
        offset: u64,
        detail: &'static str,
    },
    /// Delta replay detected corrupt object data.
    Corrupt {
        pack_id: Option<u16>,
        offset: u64,
        fault: DeltaFault,
    },
    /// Materialized byte count differs from the header-declared length.
    LengthMismatch { declared: u64, produced: u64 },
    /// A delta chain revisited a `(pack, offset)` pair on its own path.
    CycleDetected { pack_id: u16, offset: u64 },
    /// The index collaborator could not locate a delta's base object.
    UnresolvableBase { oid: Option<ObjectId>, detail: &'static str },
    /// Loose object file is malformed.
    LooseCorrupt { detail: &'static str },
    /// A declared size exceeds the configured cap.
    ObjectTooLarge { size: u64, max: u64 },
    /// Cooperative cancellation was signalled.
    Aborted,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Inflate {
                pack_id,
                offset,
                source,
            } => match pack_id {
                Some(id) => write!(f, "pack {id} offset {offset}: {source}"),
                None => write!(f, "loose object: {source}"),
            },
            Self::EntryHeader {
                pack_id,
                offset,
                detail,
            } => write!(f, "pack {pack_id} offset {offset}: {detail}"),
            Self::Corrupt {
                pack_id,
                offset,
                fault,
            } => match pack_id {
                Some(id) => write!(f, "corrupt object in pack {id} at offset {offset}: {fault}"),
                None => write!(f, "corrupt object at offset {offset}: {fault}"),
            },
            Self::LengthMismatch { declared, produced } => {
                write!(
                    f,
                    "object length mismatch: declared {declared}, produced {produced}"
                )
            }
            Self::CycleDetected { pack_id, offset } => {
                write!(f, "delta cycle through pack {pack_id} offset {offset}")
            }
            Self::UnresolvableBase { oid, detail } => match oid {
                Some(oid) => write!(f, "unresolvable delta base {oid}: {detail}"),
                None => write!(f, "unresolvable delta base: {detail}"),
            },
            Self::LooseCorrupt { detail } => write!(f, "corrupt loose object: {detail}"),
            Self::ObjectTooLarge { size, max } => {
                write!(f, "object size {size} exceeds cap {max}")
            }
            Self::Aborted => write!(f, "resolution aborted by cooperative cancellation"),
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Inflate { source, .. } => Some(source),
            Self::Corrupt { fault, .. } => Some(fault),
            _ => None,
        }
    }
}

impl From<io::Error> for ResolveError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}
