#![forbid(unsafe_code)]
//! Shared identifiers, errors, and checksum helpers for the page format.

use std::fmt;

/// Page checksum computation.
pub mod checksum;

pub use checksum::{page_checksum, Checksum, Crc32Fast};

/// File location expressed as a count of allocation units from file start.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Addr(pub u32);

impl Addr {
    /// The first page in the file, always the first leaf page. It is created
    /// once and never relocated.
    pub const FIRST_PAGE: Addr = Addr(0);
    /// The largest possible address, never a real location.
    pub const INVALID: Addr = Addr(u32::MAX);

    /// Returns `true` unless this is [`Addr::INVALID`].
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }

    /// Maps [`Addr::INVALID`] to `None`.
    pub fn valid(self) -> Option<Addr> {
        self.is_valid().then_some(self)
    }

    /// Maps `None` to [`Addr::INVALID`].
    pub fn or_invalid(addr: Option<Addr>) -> Addr {
        addr.unwrap_or(Addr::INVALID)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("invalid")
        }
    }
}

/// Log sequence number stored in every page header. Produced by the logging
/// layer; this crate only carries it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Lsn {
    /// Log file number.
    pub file: u32,
    /// Byte offset within the log file.
    pub offset: u32,
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.file, self.offset)
    }
}

/// Errors raised while encoding or decoding on-disk structures.
#[derive(thiserror::Error, Debug)]
pub enum BtPageError {
    /// Underlying I/O failure (only raised by file-facing helpers).
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// The database descriptor has a bad magic number or unsupported version.
    #[error("corrupt descriptor: {0}")]
    CorruptDescriptor(&'static str),
    /// A page header could not be decoded.
    #[error("corrupt page header: {0}")]
    CorruptHeader(&'static str),
    /// The stored page checksum does not match the page contents.
    #[error("page checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch {
        /// Checksum read from the page header.
        stored: u32,
        /// Checksum recomputed over the page bytes.
        computed: u32,
    },
    /// An item payload exceeds the 24-bit length field.
    #[error("item length {len} exceeds the on-page maximum")]
    ItemTooLarge {
        /// Requested payload length in bytes.
        len: u64,
    },
    /// The item sequence on a page violates the pairing rules of its type.
    #[error("malformed page: {0}")]
    MalformedPage(&'static str),
    /// An address or offset does not fit the representable range.
    #[error("out of range: {0}")]
    OutOfRange(&'static str),
    /// A byte offset is not a multiple of the allocation unit.
    #[error("offset {offset} is not a multiple of the allocation unit {unit}")]
    Misaligned {
        /// Offending byte offset.
        offset: u64,
        /// Allocation unit size in bytes.
        unit: u32,
    },
    /// The caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BtPageError>;
