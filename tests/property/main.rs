//! Property-based tests for the replay and memoization engines.
//!
//! Run with: `cargo test --test property`

mod delta_replay;
mod memo_access;
