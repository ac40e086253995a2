//! Btree page storage.
//!
//! Everything that interprets the bytes of a page once the cache layer has
//! made it resident.

/// Btree page format.
pub mod btree;
