//! Forward-only byte source abstraction.
//!
//! The replay engine and memo stream are parameterized over `ByteSource`
//! rather than a concrete decompressor. `pull` is the single suspension
//! point of the whole pipeline: a cooperative driver may interleave other
//! work between calls, and the engines never hold partially decoded opcode
//! sub-fields anywhere but their own state, so suspension never loses
//! bytes.
//!
//! `ReadSource` is the blocking realization, adapting any `std::io::Read`
//! (typically `flate2::read::ZlibDecoder` over pack or loose bytes).

use std::io::Read;

use crate::errors::{InflateError, ResolveError};

/// A forward-only producer of bytes.
///
/// `pull` fills a prefix of `out` and returns the byte count; zero means
/// the source is exhausted. Sources are consumed exactly once and never
/// rewound; random access is layered on top by `MemoStream`.
pub trait ByteSource {
    /// Pulls up to `out.len()` bytes from the source.
    fn pull(&mut self, out: &mut [u8]) -> Result<usize, ResolveError>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    #[inline]
    fn pull(&mut self, out: &mut [u8]) -> Result<usize, ResolveError> {
        (**self).pull(out)
    }
}

/// Blocking `ByteSource` over a `std::io::Read`.
///
/// Decompressor errors are mapped to the inflate taxonomy: an unexpected
/// EOF is a truncated stream, anything else malformed input. The optional
/// pack context is attached so faults deep in a delta chain still name
/// their origin.
pub struct ReadSource<R> {
    inner: R,
    pack_id: Option<u16>,
    offset: u64,
}

impl<R: Read> ReadSource<R> {
    /// Wraps a reader with pack context for error reporting.
    pub fn new(inner: R, pack_id: Option<u16>, offset: u64) -> Self {
        Self {
            inner,
            pack_id,
            offset,
        }
    }
}

impl<R: Read> ByteSource for ReadSource<R> {
    fn pull(&mut self, out: &mut [u8]) -> Result<usize, ResolveError> {
        self.inner.read(out).map_err(|err| {
            let source = match err.kind() {
                std::io::ErrorKind::UnexpectedEof => InflateError::Truncated,
                _ => InflateError::Corrupt,
            };
            ResolveError::Inflate {
                pack_id: self.pack_id,
                offset: self.offset,
                source,
            }
        })
    }
}

/// In-memory `ByteSource` used by tests and by fully materialized bases.
pub struct SliceSource<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    /// Wraps a byte slice.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }
}

impl ByteSource for SliceSource<'_> {
    fn pull(&mut self, out: &mut [u8]) -> Result<usize, ResolveError> {
        let remaining = &self.bytes[self.pos..];
        let n = remaining.len().min(out.len());
        out[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_source_pulls_in_order() {
        let mut src = SliceSource::new(b"abcdef");
        let mut buf = [0u8; 4];
        assert_eq!(src.pull(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(src.pull(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(src.pull(&mut buf).unwrap(), 0);
    }

    #[test]
    fn read_source_maps_eof_to_truncated() {
        struct FailingReader;
        impl Read for FailingReader {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "eof",
                ))
            }
        }

        let mut src = ReadSource::new(FailingReader, Some(7), 99);
        let err = src.pull(&mut [0u8; 1]).unwrap_err();
        match err {
            ResolveError::Inflate {
                pack_id: Some(7),
                offset: 99,
                source: InflateError::Truncated,
            } => {}
            other => panic!("unexpected error: {other}"),
        }
    }
}
