//! Size caps for object resolution.
//!
//! Declared sizes are validated against these caps before any buffer is
//! sized from untrusted pack data. Within the caps, base objects are
//! memoized in full; there is no eviction.

/// Limits applied by the resolver.
#[derive(Clone, Copy, Debug)]
pub struct ResolveLimits {
    /// Maximum bytes to parse for a single pack entry header.
    pub max_header_bytes: usize,
    /// Maximum materialized object size (applies per chain hop).
    pub max_object_bytes: u64,
    /// Maximum inflated delta payload size (the edit script itself).
    pub max_delta_bytes: u64,
}

impl ResolveLimits {
    /// Creates a limits struct.
    #[must_use]
    pub const fn new(max_header_bytes: usize, max_object_bytes: u64, max_delta_bytes: u64) -> Self {
        Self {
            max_header_bytes,
            max_object_bytes,
            max_delta_bytes,
        }
    }
}

impl Default for ResolveLimits {
    fn default() -> Self {
        Self {
            max_header_bytes: 64,
            max_object_bytes: 512 * 1024 * 1024, // 512 MiB
            max_delta_bytes: 512 * 1024 * 1024,
        }
    }
}
