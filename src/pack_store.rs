//! Raw pack byte access for the resolver.
//!
//! The resolver reads entry headers and compressed payloads straight from
//! pack bytes keyed by pack id. `MmapPackStore` serves real repositories
//! via read-only memory maps; `VecPackStore` serves tests and callers that
//! already hold pack bytes in memory.

use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::Mmap;

use crate::errors::ResolveError;

/// Provides raw pack file bytes by pack id.
///
/// Implementations must return the full pack contents, including the
/// 12-byte header and trailing checksum; offset validation happens in the
/// resolver.
pub trait PackSource {
    /// Returns the bytes of the pack identified by `pack_id`.
    fn pack_bytes(&self, pack_id: u16) -> Result<&[u8], ResolveError>;
}

/// Memory-mapped pack store.
///
/// Packs are mapped once at construction, in caller-supplied order; the
/// position in the path list is the pack id.
pub struct MmapPackStore {
    maps: Vec<Mmap>,
}

impl MmapPackStore {
    /// Maps every pack file in `paths`.
    ///
    /// The maps assume the packs are stable for the store's lifetime; this
    /// engine is read-only and Git never rewrites a pack in place.
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> io::Result<Self> {
        let mut maps = Vec::with_capacity(paths.len());
        for path in paths {
            let file = File::open(path)?;
            // SAFETY: read-only map of pack data assumed stable while the
            // store is alive.
            let mmap = unsafe { Mmap::map(&file)? };
            maps.push(mmap);
        }
        Ok(Self { maps })
    }
}

impl PackSource for MmapPackStore {
    fn pack_bytes(&self, pack_id: u16) -> Result<&[u8], ResolveError> {
        self.maps
            .get(pack_id as usize)
            .map(|m| m.as_ref())
            .ok_or_else(|| {
                ResolveError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("pack id {pack_id} out of range"),
                ))
            })
    }
}

/// In-memory pack store.
#[derive(Debug, Default)]
pub struct VecPackStore {
    packs: Vec<Vec<u8>>,
}

impl VecPackStore {
    /// Creates a store over already-loaded pack byte vectors.
    #[must_use]
    pub fn new(packs: Vec<Vec<u8>>) -> Self {
        Self { packs }
    }
}

impl PackSource for VecPackStore {
    fn pack_bytes(&self, pack_id: u16) -> Result<&[u8], ResolveError> {
        self.packs
            .get(pack_id as usize)
            .map(|p| p.as_slice())
            .ok_or_else(|| {
                ResolveError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("pack id {pack_id} out of range"),
                ))
            })
    }
}
