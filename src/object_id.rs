//! Content hash types for object-database lookups.
//!
//! `ObjectId` stores SHA-1 and SHA-256 object identifiers in a fixed-size,
//! zero-heap container. Equality, ordering, and hashing are byte-wise over
//! the valid prefix only.
//!
//! # Invariants
//! - `len` is always 20 or 32.
//! - Only `bytes[0..len]` contains valid data; the tail is zero-padded.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Object ID format, which determines the hash byte length.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ObjectFormat {
    /// SHA-1 object IDs (20 bytes).
    #[default]
    Sha1 = 1,
    /// SHA-256 object IDs (32 bytes).
    Sha256 = 2,
}

impl ObjectFormat {
    /// Returns the byte length for hashes in this format.
    #[inline]
    #[must_use]
    pub const fn oid_len(self) -> u8 {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }
}

/// Fixed-size storage for a SHA-1 or SHA-256 content hash.
///
/// The length discriminator travels with the bytes so callers can handle
/// raw slices without knowing the repository's object format in advance.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ObjectId {
    len: u8,
    bytes: [u8; 32],
}

impl ObjectId {
    /// Creates an `ObjectId` from a 20-byte SHA-1 hash.
    #[inline]
    #[must_use]
    pub fn sha1(bytes: [u8; 20]) -> Self {
        let mut storage = [0u8; 32];
        storage[..20].copy_from_slice(&bytes);
        Self {
            len: 20,
            bytes: storage,
        }
    }

    /// Creates an `ObjectId` from a 32-byte SHA-256 hash.
    #[inline]
    #[must_use]
    pub fn sha256(bytes: [u8; 32]) -> Self {
        Self { len: 32, bytes }
    }

    /// Creates an `ObjectId` from a slice, returning `None` for lengths
    /// other than 20 or 32.
    #[must_use]
    pub fn try_from_slice(bytes: &[u8]) -> Option<Self> {
        match bytes.len() {
            20 | 32 => {
                let mut storage = [0u8; 32];
                storage[..bytes.len()].copy_from_slice(bytes);
                Some(Self {
                    len: bytes.len() as u8,
                    bytes: storage,
                })
            }
            _ => None,
        }
    }

    /// Returns the hash bytes; the slice length is always 20 or 32.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        debug_assert!(self.len == 20 || self.len == 32, "invalid OID len: {}", self.len);
        &self.bytes[..self.len as usize]
    }

    /// Returns the hash length in bytes (20 or 32).
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u8 {
        self.len
    }

    /// Always `false` for valid instances; provided for slice-API symmetry.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the object format implied by the stored length.
    #[inline]
    #[must_use]
    pub const fn format(&self) -> ObjectFormat {
        if self.len == 20 {
            ObjectFormat::Sha1
        } else {
            ObjectFormat::Sha256
        }
    }

    /// Renders the hash as lowercase hex, matching Git's canonical form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        use std::fmt::Write as _;
        let mut out = String::with_capacity(self.len as usize * 2);
        for byte in self.as_slice() {
            let _ = write!(&mut out, "{byte:02x}");
        }
        out
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_slice() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl PartialEq for ObjectId {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for ObjectId {}

impl Hash for ObjectId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl PartialOrd for ObjectId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_layout_and_padding() {
        let oid = ObjectId::sha1([0xab; 20]);
        assert_eq!(oid.len(), 20);
        assert_eq!(oid.format(), ObjectFormat::Sha1);
        assert!(oid.bytes[20..].iter().all(|&b| b == 0));
    }

    #[test]
    fn try_from_slice_rejects_other_lengths() {
        assert!(ObjectId::try_from_slice(&[0u8; 20]).is_some());
        assert!(ObjectId::try_from_slice(&[0u8; 32]).is_some());
        assert!(ObjectId::try_from_slice(&[0u8; 0]).is_none());
        assert!(ObjectId::try_from_slice(&[0u8; 19]).is_none());
        assert!(ObjectId::try_from_slice(&[0u8; 33]).is_none());
    }

    #[test]
    fn hex_rendering() {
        let mut bytes = [0u8; 20];
        bytes[0] = 0x0f;
        bytes[19] = 0xf0;
        let oid = ObjectId::sha1(bytes);
        let hex = oid.to_hex();
        assert_eq!(hex.len(), 40);
        assert!(hex.starts_with("0f"));
        assert!(hex.ends_with("f0"));
        assert_eq!(hex, format!("{oid}"));
    }

    #[test]
    fn byte_wise_equality_ignores_format_tag() {
        let a = ObjectId::sha1([0x11; 20]);
        let b = ObjectId::try_from_slice(&[0x11; 20]).unwrap();
        assert_eq!(a, b);
        assert!(a < ObjectId::sha1([0x12; 20]));
    }
}
