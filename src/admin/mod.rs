#![forbid(unsafe_code)]

//! Database file administration: creation, descriptor and page inspection,
//! and whole-file verification.
//!
//! These operations back the `btpage` command-line tool and return
//! serializable reports instead of printing.

mod create;
mod error;
mod info;
mod inspect;
mod util;
mod verify;

/// Creates an empty database file.
pub use create::{create, CreateReport};

/// Error types for administrative operations.
pub use error::{AdminError, Result};

/// Descriptor inspection.
pub use info::{info, InfoReport};

/// Single-page inspection.
pub use inspect::{inspect_page, ChecksumStatus, IndexSummary, ItemReport, PageReport};

/// Whole-file verification.
pub use verify::{verify, VerifyFinding, VerifyReport, VerifySeverity};

#[cfg(test)]
mod tests;
