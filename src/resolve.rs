//! Delta-chain resolution and object materialization.
//!
//! `Resolver::resolve` turns a storage descriptor into the object's exact
//! bytes. Whole entries (loose or packed) decompress directly; delta
//! entries open their base recursively, wrap it in a `MemoStream`, and
//! stream the reconstruction through `DeltaReplay`. Streams compose
//! lazily, so a chain of depth K holds exactly K live base streams, each
//! dropped as its enclosing hop completes.
//!
//! Index lookup and pack byte access are collaborators behind the
//! `Locator` and `PackSource` traits; this module never builds pack
//! indexes or constructs loose-object paths itself.
//!
//! # Invariants
//! - The materialized byte count equals the object's declared length.
//! - A delta chain that revisits a `(pack, offset)` pair fails with
//!   `CycleDetected`; no depth limit is imposed on well-formed chains.
//! - Errors never leave partial bytes observable to the caller.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::cancel::CancelFlag;
use crate::delta_stream::{DeltaReplay, ReplayContext};
use crate::descriptor::{BaseRef, ObjectDescriptor, ObjectKind};
use crate::errors::{DeltaFault, InflateError, ResolveError};
use crate::limits::ResolveLimits;
use crate::object_id::{ObjectFormat, ObjectId};
use crate::pack_store::PackSource;
use crate::source::{ByteSource, ReadSource};
use crate::varint;

/// Safety allowance for loose object headers (`"commit <size>\0"`).
const LOOSE_HEADER_MAX_BYTES: usize = 64;

/// Drain granularity when materializing a stream.
const DRAIN_CHUNK: usize = 32 * 1024;

/// Index-lookup collaborator.
///
/// Maps content hashes and pack offsets back to storage descriptors. The
/// resolver only needs this to re-anchor a delta's base reference.
pub trait Locator {
    /// Locates an object by content hash.
    fn locate(&self, oid: &ObjectId) -> Result<Option<ObjectDescriptor>, ResolveError>;

    /// Locates the object whose entry header starts at `offset` in pack
    /// `pack_id`.
    fn locate_by_pack_offset(
        &self,
        pack_id: u16,
        offset: u64,
    ) -> Result<ObjectDescriptor, ResolveError>;
}

/// A fully materialized object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedObject {
    /// Object kind, taken from the chain's terminal whole entry.
    pub kind: ObjectKind,
    /// The exact object bytes.
    pub bytes: Vec<u8>,
}

/// Entry header parsed from pack bytes.
struct RawEntry {
    type_tag: u8,
    size: u64,
    data_start: usize,
    /// Present for OFS_DELTA (distance) entries.
    ofs_distance: Option<u64>,
    /// Present for REF_DELTA entries.
    base_oid: Option<ObjectId>,
}

/// Resolves storage descriptors into object bytes.
///
/// Each `resolve` call is an independent computation; the resolver holds
/// no mutable state, so one instance may serve any number of concurrent
/// callers.
pub struct Resolver<'a, L, P> {
    locator: &'a L,
    packs: &'a P,
    format: ObjectFormat,
    limits: ResolveLimits,
    cancel: CancelFlag,
}

impl<'a, L: Locator, P: PackSource> Resolver<'a, L, P> {
    /// Creates a resolver with default limits and no cancellation source.
    #[must_use]
    pub fn new(locator: &'a L, packs: &'a P, format: ObjectFormat) -> Self {
        Self {
            locator,
            packs,
            format,
            limits: ResolveLimits::default(),
            cancel: CancelFlag::new(),
        }
    }

    /// Replaces the resolver's limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ResolveLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Attaches a cooperative cancellation flag.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Materializes the object described by `descriptor`.
    ///
    /// # Errors
    /// All failure kinds in `ResolveError`; none are retried internally,
    /// and no partial bytes are ever returned.
    pub fn resolve(&self, descriptor: &ObjectDescriptor) -> Result<ResolvedObject, ResolveError> {
        let mut visited = HashSet::new();
        let (kind, declared_len, mut stream) = self.open_stream(descriptor, &mut visited)?;

        let mut bytes = Vec::with_capacity(declared_len.min(self.limits.max_object_bytes) as usize);
        let mut chunk = [0u8; DRAIN_CHUNK];
        loop {
            self.cancel.check()?;
            let n = stream.pull(&mut chunk)?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            if bytes.len() as u64 > declared_len {
                return Err(ResolveError::LengthMismatch {
                    declared: declared_len,
                    produced: bytes.len() as u64,
                });
            }
        }

        if bytes.len() as u64 != declared_len {
            return Err(ResolveError::LengthMismatch {
                declared: declared_len,
                produced: bytes.len() as u64,
            });
        }

        Ok(ResolvedObject { kind, bytes })
    }

    /// Opens a lazy byte stream for the object, recursing through delta
    /// bases. Returns the chain's terminal object kind, the declared
    /// length, and the stream producing exactly that many bytes.
    fn open_stream<'s>(
        &'s self,
        descriptor: &ObjectDescriptor,
        visited: &mut HashSet<(u16, u64)>,
    ) -> Result<(ObjectKind, u64, Box<dyn ByteSource + 's>), ResolveError> {
        match descriptor {
            ObjectDescriptor::Loose { path } => self.open_loose(path),
            ObjectDescriptor::PackedWhole {
                pack_id,
                offset,
                kind,
            } => self.open_packed_whole(*pack_id, *offset, *kind),
            ObjectDescriptor::PackedDelta {
                pack_id,
                offset,
                base,
            } => self.open_packed_delta(*pack_id, *offset, base, visited),
        }
    }

    fn open_packed_whole<'s>(
        &'s self,
        pack_id: u16,
        offset: u64,
        kind: ObjectKind,
    ) -> Result<(ObjectKind, u64, Box<dyn ByteSource + 's>), ResolveError> {
        let pack = self.packs.pack_bytes(pack_id)?;
        let entry = self.entry_at(pack, pack_id, offset)?;

        let entry_kind = ObjectKind::from_entry_type(entry.type_tag).ok_or(
            ResolveError::EntryHeader {
                pack_id,
                offset,
                detail: "descriptor says whole object, pack entry is a delta",
            },
        )?;
        if entry_kind != kind {
            return Err(ResolveError::EntryHeader {
                pack_id,
                offset,
                detail: "pack entry kind does not match descriptor",
            });
        }
        if entry.size > self.limits.max_object_bytes {
            return Err(ResolveError::ObjectTooLarge {
                size: entry.size,
                max: self.limits.max_object_bytes,
            });
        }

        let decoder = ZlibDecoder::new(&pack[entry.data_start..]);
        let stream = ReadSource::new(decoder, Some(pack_id), offset);
        Ok((kind, entry.size, Box::new(stream)))
    }

    fn open_packed_delta<'s>(
        &'s self,
        pack_id: u16,
        offset: u64,
        base: &BaseRef,
        visited: &mut HashSet<(u16, u64)>,
    ) -> Result<(ObjectKind, u64, Box<dyn ByteSource + 's>), ResolveError> {
        if !visited.insert((pack_id, offset)) {
            return Err(ResolveError::CycleDetected { pack_id, offset });
        }

        let pack = self.packs.pack_bytes(pack_id)?;
        let entry = self.entry_at(pack, pack_id, offset)?;

        if entry.size > self.limits.max_delta_bytes {
            return Err(ResolveError::ObjectTooLarge {
                size: entry.size,
                max: self.limits.max_delta_bytes,
            });
        }

        // The pack bytes are authoritative for the base reference; the
        // descriptor must agree on the reference form.
        let base_descriptor = match (entry.ofs_distance, entry.base_oid, base) {
            (Some(distance), None, BaseRef::ByOffset { distance: expected })
                if distance == *expected =>
            {
                if distance == 0 || distance > offset {
                    return Err(ResolveError::EntryHeader {
                        pack_id,
                        offset,
                        detail: "OFS_DELTA base distance underflows the pack",
                    });
                }
                self.locator
                    .locate_by_pack_offset(pack_id, offset - distance)?
            }
            (None, Some(oid), BaseRef::ByHash(expected)) if oid == *expected => self
                .locator
                .locate(&oid)?
                .ok_or(ResolveError::UnresolvableBase {
                    oid: Some(oid),
                    detail: "base hash not present in index",
                })?,
            (None, None, _) => {
                return Err(ResolveError::EntryHeader {
                    pack_id,
                    offset,
                    detail: "descriptor says delta, pack entry is a whole object",
                })
            }
            _ => {
                return Err(ResolveError::EntryHeader {
                    pack_id,
                    offset,
                    detail: "pack entry base reference does not match descriptor",
                })
            }
        };

        let (base_kind, base_len, base_stream) = self.open_stream(&base_descriptor, visited)?;

        let decoder = ZlibDecoder::new(&pack[entry.data_start..]);
        let delta_stream = ReadSource::new(decoder, Some(pack_id), offset);
        let replay = DeltaReplay::new(
            base_stream,
            delta_stream,
            ReplayContext {
                pack_id: Some(pack_id),
                offset,
            },
            self.cancel.clone(),
        )?;

        // The delta header's base length must agree with the base object's
        // own declared length; a disagreement means one of them lies.
        if replay.base_len() != base_len {
            return Err(ResolveError::Corrupt {
                pack_id: Some(pack_id),
                offset,
                fault: DeltaFault::BaseSizeMismatch {
                    header: replay.base_len(),
                    base: base_len,
                },
            });
        }

        let result_len = replay.result_len();
        if result_len > self.limits.max_object_bytes {
            return Err(ResolveError::ObjectTooLarge {
                size: result_len,
                max: self.limits.max_object_bytes,
            });
        }

        Ok((base_kind, result_len, Box::new(replay)))
    }

    /// Parses the entry header at `offset`: object-header varint plus, for
    /// delta types, the base reference (OFS distance or base OID).
    fn entry_at(&self, pack: &[u8], pack_id: u16, offset: u64) -> Result<RawEntry, ResolveError> {
        let start = usize::try_from(offset).map_err(|_| ResolveError::EntryHeader {
            pack_id,
            offset,
            detail: "entry offset exceeds addressable range",
        })?;
        if start >= pack.len() {
            return Err(ResolveError::EntryHeader {
                pack_id,
                offset,
                detail: "entry offset beyond pack end",
            });
        }

        // Bound header parsing to a small window; a header that does not
        // terminate within it is corrupt.
        let window_end = start
            .saturating_add(self.limits.max_header_bytes)
            .min(pack.len());
        let window = &pack[start..window_end];
        let mut pos = 0usize;

        let (type_tag, size) = match varint::read_object_header(window, &mut pos) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => {
                return Err(ResolveError::EntryHeader {
                    pack_id,
                    offset,
                    detail: "entry header truncated or exceeds safety bound",
                })
            }
            Err(_) => {
                return Err(ResolveError::EntryHeader {
                    pack_id,
                    offset,
                    detail: "entry size varint overflow",
                })
            }
        };

        let mut ofs_distance = None;
        let mut base_oid = None;
        match type_tag {
            1..=4 => {}
            6 => match varint::read_ofs_distance(window, &mut pos) {
                Ok(Some(distance)) => ofs_distance = Some(distance),
                Ok(None) => {
                    return Err(ResolveError::EntryHeader {
                        pack_id,
                        offset,
                        detail: "OFS_DELTA distance truncated",
                    })
                }
                Err(_) => {
                    return Err(ResolveError::EntryHeader {
                        pack_id,
                        offset,
                        detail: "OFS_DELTA distance varint overflow",
                    })
                }
            },
            7 => {
                let oid_len = self.format.oid_len() as usize;
                let end = start + pos + oid_len;
                if end > pack.len() {
                    return Err(ResolveError::EntryHeader {
                        pack_id,
                        offset,
                        detail: "REF_DELTA base hash truncated",
                    });
                }
                base_oid = ObjectId::try_from_slice(&pack[start + pos..end]);
                pos += oid_len;
            }
            _ => {
                return Err(ResolveError::EntryHeader {
                    pack_id,
                    offset,
                    detail: "invalid object type tag",
                })
            }
        }

        Ok(RawEntry {
            type_tag,
            size,
            data_start: start + pos,
            ofs_distance,
            base_oid,
        })
    }

    fn open_loose<'s>(
        &'s self,
        path: &std::path::Path,
    ) -> Result<(ObjectKind, u64, Box<dyn ByteSource + 's>), ResolveError> {
        let file = File::open(path)?;
        let mut decoder = ZlibDecoder::new(file);

        // Decompress just enough to cover the "<kind> <size>\0" header.
        let mut hdr = [0u8; LOOSE_HEADER_MAX_BYTES];
        let mut filled = 0usize;
        let nul = loop {
            if let Some(i) = memchr::memchr(0, &hdr[..filled]) {
                break i;
            }
            if filled == hdr.len() {
                return Err(ResolveError::LooseCorrupt {
                    detail: "header exceeds 64 bytes",
                });
            }
            let n = decoder
                .read(&mut hdr[filled..])
                .map_err(map_loose_inflate)?;
            if n == 0 {
                return Err(ResolveError::LooseCorrupt {
                    detail: "stream ended before header terminator",
                });
            }
            filled += n;
        };

        let (kind, size) = parse_loose_header(&hdr[..nul])?;
        if size > self.limits.max_object_bytes {
            return Err(ResolveError::ObjectTooLarge {
                size,
                max: self.limits.max_object_bytes,
            });
        }

        // Bytes past the NUL already pulled from the decoder belong to the
        // payload; replay them ahead of the remaining stream.
        let leftover = hdr[nul + 1..filled].to_vec();
        let stream = PrefixSource {
            prefix: leftover,
            pos: 0,
            inner: ReadSource::new(decoder, None, 0),
        };
        Ok((kind, size, Box::new(stream)))
    }
}

fn map_loose_inflate(err: std::io::Error) -> ResolveError {
    let source = match err.kind() {
        std::io::ErrorKind::UnexpectedEof => InflateError::Truncated,
        _ => InflateError::Corrupt,
    };
    ResolveError::Inflate {
        pack_id: None,
        offset: 0,
        source,
    }
}

/// Parses `"<kind> <size>"` (the loose header minus its NUL terminator).
fn parse_loose_header(header: &[u8]) -> Result<(ObjectKind, u64), ResolveError> {
    let space = memchr::memchr(b' ', header).ok_or(ResolveError::LooseCorrupt {
        detail: "missing space in object header",
    })?;
    let (kind_bytes, rest) = header.split_at(space);
    let size_bytes = &rest[1..];

    let kind = [
        ObjectKind::Commit,
        ObjectKind::Tree,
        ObjectKind::Blob,
        ObjectKind::Tag,
    ]
    .into_iter()
    .find(|kind| kind.header_name() == kind_bytes)
    .ok_or(ResolveError::LooseCorrupt {
        detail: "unknown object kind in header",
    })?;

    let size = parse_decimal(size_bytes).ok_or(ResolveError::LooseCorrupt {
        detail: "invalid size in object header",
    })?;
    Ok((kind, size))
}

fn parse_decimal(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let mut out = 0u64;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        out = out.checked_mul(10)?.checked_add((b - b'0') as u64)?;
    }
    Some(out)
}

/// Replays a prefix buffer before delegating to the inner source.
struct PrefixSource<S> {
    prefix: Vec<u8>,
    pos: usize,
    inner: S,
}

impl<S: ByteSource> ByteSource for PrefixSource<S> {
    fn pull(&mut self, out: &mut [u8]) -> Result<usize, ResolveError> {
        if self.pos < self.prefix.len() {
            let remaining = &self.prefix[self.pos..];
            let n = remaining.len().min(out.len());
            out[..n].copy_from_slice(&remaining[..n]);
            self.pos += n;
            return Ok(n);
        }
        self.inner.pull(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_loose_header_accepts_all_kinds() {
        assert_eq!(
            parse_loose_header(b"blob 42").unwrap(),
            (ObjectKind::Blob, 42)
        );
        assert_eq!(
            parse_loose_header(b"commit 0").unwrap(),
            (ObjectKind::Commit, 0)
        );
        assert_eq!(
            parse_loose_header(b"tree 123456").unwrap(),
            (ObjectKind::Tree, 123456)
        );
        assert_eq!(parse_loose_header(b"tag 7").unwrap(), (ObjectKind::Tag, 7));
    }

    #[test]
    fn parse_loose_header_rejects_malformed() {
        assert!(parse_loose_header(b"blob").is_err());
        assert!(parse_loose_header(b"blob ").is_err());
        assert!(parse_loose_header(b"blob 1x").is_err());
        assert!(parse_loose_header(b"link 4").is_err());
    }

    #[test]
    fn parse_decimal_overflow_guard() {
        assert_eq!(parse_decimal(b"18446744073709551615"), Some(u64::MAX));
        assert_eq!(parse_decimal(b"18446744073709551616"), None);
        assert_eq!(parse_decimal(b""), None);
    }

    #[test]
    fn prefix_source_replays_then_delegates() {
        use crate::source::SliceSource;

        let mut src = PrefixSource {
            prefix: b"abc".to_vec(),
            pos: 0,
            inner: SliceSource::new(b"def"),
        };
        let mut out = [0u8; 2];
        assert_eq!(src.pull(&mut out).unwrap(), 2);
        assert_eq!(&out, b"ab");
        assert_eq!(src.pull(&mut out).unwrap(), 1);
        assert_eq!(&out[..1], b"c");
        assert_eq!(src.pull(&mut out).unwrap(), 2);
        assert_eq!(&out, b"de");
        assert_eq!(src.pull(&mut out).unwrap(), 1);
        assert_eq!(src.pull(&mut out).unwrap(), 0);
    }
}
