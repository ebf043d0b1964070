//! Object storage descriptors.
//!
//! A descriptor says where an object's raw bytes live; it is produced by
//! the index-lookup collaborator and consumed by the resolver. Descriptors
//! are plain value data — freely copyable, never owning resources.

use std::path::PathBuf;

use crate::object_id::ObjectId;

/// Object kind for whole (non-delta) entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    /// Maps a pack entry type tag (1..=4) to a kind.
    #[must_use]
    pub fn from_entry_type(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Commit),
            2 => Some(Self::Tree),
            3 => Some(Self::Blob),
            4 => Some(Self::Tag),
            _ => None,
        }
    }

    /// The loose-object header name for this kind.
    #[must_use]
    pub fn header_name(self) -> &'static [u8] {
        match self {
            Self::Commit => b"commit",
            Self::Tree => b"tree",
            Self::Blob => b"blob",
            Self::Tag => b"tag",
        }
    }
}

/// How a delta entry references its base object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BaseRef {
    /// Base lies earlier in the same pack, at `entry_offset - distance`.
    ByOffset { distance: u64 },
    /// Base located by content hash, possibly in another pack or loose.
    ByHash(ObjectId),
}

/// Locator for where an object's raw bytes live.
///
/// Matching is exhaustive in the resolver; adding a storage form is a
/// deliberate API change, so this enum is not `#[non_exhaustive]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjectDescriptor {
    /// A standalone zlib-compressed file holding one whole object.
    Loose { path: PathBuf },
    /// A whole (non-delta) entry inside a pack.
    PackedWhole {
        pack_id: u16,
        offset: u64,
        kind: ObjectKind,
    },
    /// A delta entry inside a pack, reconstructed against a base.
    PackedDelta {
        pack_id: u16,
        offset: u64,
        base: BaseRef,
    },
}
