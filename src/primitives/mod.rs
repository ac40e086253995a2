//! Low-level primitives beneath the btree page format.
//!
//! Includes byte utilities, allocation-unit address translation, the database
//! descriptor, format configuration, and the cache-owned page frames.

/// Byte-level utilities and fixed-width field access.
pub mod bytes;

/// Paging primitives: addresses, descriptor, options, and frames.
///
/// Everything here is format and bookkeeping only; file I/O and eviction
/// policy belong to the cache layer built on top.
pub mod pager;
