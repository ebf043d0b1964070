//! Read-only materialization of Git objects from pack and loose storage.
//!
//! ## Scope
//! This crate turns a storage descriptor (loose file, whole pack entry, or
//! delta pack entry) into the object's exact bytes. It decodes pack entry
//! headers, inflates zlib payloads, and replays delta chains of any depth
//! through a streaming copy/insert state machine. Index construction and
//! object writing are out of scope; index lookup is a collaborator behind
//! the `Locator` trait.
//!
//! ## Key invariants
//! - Materialized output is byte-exact: the produced length always equals
//!   the declared length, or resolution fails with no partial bytes.
//! - Base bytes are pulled from the decompressor at most once; backward
//!   copy targets are served from the memoized buffer.
//! - Delta chains are bounded by cycle detection on `(pack, offset)`
//!   pairs, not by a fixed depth limit.
//! - A chain of depth K holds exactly K live base streams; streams compose
//!   lazily and are dropped as each hop completes.
//! - Truncated input is always distinguished from malformed input, at the
//!   codec level (`Ok(None)` versus `Err`) and in the error taxonomy.
//!
//! ## Resolution flow (one object)
//! 1) Look at the descriptor: loose, packed whole, or packed delta.
//! 2) Whole entries: parse the entry or loose header, inflate the payload.
//! 3) Delta entries: parse the base reference, re-anchor it through the
//!    `Locator`, open the base stream recursively, then stream the delta
//!    replay over a `MemoStream`-wrapped base.
//! 4) Drain the stream, enforcing size caps and the declared length.
//!
//! ## Notable entry points
//! - `Resolver::resolve`: descriptor in, `ResolvedObject` out.
//! - `DeltaReplay`: the streaming copy/insert engine, usable standalone.
//! - `MemoStream`: random-access reads over a forward-only source.
//! - `varint`: the three pack varint flavors.
//! - `MmapPackStore` / `VecPackStore`: `PackSource` implementations.

pub mod varint;

mod cancel;
mod delta_stream;
mod descriptor;
mod errors;
mod limits;
mod memo_stream;
mod object_id;
mod pack_store;
mod resolve;
mod source;

pub use cancel::CancelFlag;
pub use delta_stream::{DeltaReplay, ReplayContext, PRELOAD_BUF_SIZE};
pub use descriptor::{BaseRef, ObjectDescriptor, ObjectKind};
pub use errors::{DeltaFault, InflateError, ResolveError, VarintError};
pub use limits::ResolveLimits;
pub use memo_stream::MemoStream;
pub use object_id::{ObjectFormat, ObjectId};
pub use pack_store::{MmapPackStore, PackSource, VecPackStore};
pub use resolve::{Locator, ResolvedObject, Resolver};
pub use source::{ByteSource, ReadSource, SliceSource};
