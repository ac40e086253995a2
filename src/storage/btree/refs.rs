//! Fixed-size payloads that follow reference item headers.
//!
//! Only the framing is checked here; whether an address or length makes
//! sense is up to the btree and cache layers that follow the reference.

use std::ops::Range;

use crate::primitives::bytes::be;
use crate::types::{Addr, BtPageError, Result};

/// Encoded size of an [`OffPageRef`].
pub const OFFPAGE_REF_LEN: usize = 16;
/// Encoded size of an [`OverflowRef`].
pub const OVERFLOW_REF_LEN: usize = 8;

const OFFP_RECORDS: Range<usize> = 0..8;
const OFFP_ADDR: Range<usize> = 8..12;
const OFFP_LEVEL: usize = 12;
const OFFP_RESERVED: Range<usize> = 13..16;

const OVFL_LEN: Range<usize> = 0..4;
const OVFL_ADDR: Range<usize> = 4..8;

const _: () = assert!(OFFP_RESERVED.end == OFFPAGE_REF_LEN);
const _: () = assert!(OVFL_ADDR.end == OVERFLOW_REF_LEN);

/// Reference to a child subtree with its aggregate record count.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct OffPageRef {
    /// Records in the referenced subtree.
    pub records: u64,
    /// Root address of the subtree.
    pub addr: Addr,
    /// Tree level of the subtree root.
    pub level: u8,
}

impl OffPageRef {
    /// Encodes the reference; reserved bytes are zero.
    pub fn encode(&self) -> [u8; OFFPAGE_REF_LEN] {
        let mut out = [0u8; OFFPAGE_REF_LEN];
        be::put_u64(&mut out, OFFP_RECORDS, self.records);
        be::put_u32(&mut out, OFFP_ADDR, self.addr.0);
        out[OFFP_LEVEL] = self.level;
        out
    }

    /// Decodes a reference from exactly [`OFFPAGE_REF_LEN`] bytes.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() != OFFPAGE_REF_LEN {
            return Err(BtPageError::MalformedPage(
                "off-page reference has the wrong length",
            ));
        }
        Ok(Self {
            records: be::get_u64(src, OFFP_RECORDS),
            addr: Addr(be::get_u32(src, OFFP_ADDR)),
            level: src[OFFP_LEVEL],
        })
    }
}

/// Reference to data relocated to overflow pages.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct OverflowRef {
    /// Length of the overflow data in bytes.
    pub len: u32,
    /// Address of the first overflow page.
    pub addr: Addr,
}

impl OverflowRef {
    /// Encodes the reference.
    pub fn encode(&self) -> [u8; OVERFLOW_REF_LEN] {
        let mut out = [0u8; OVERFLOW_REF_LEN];
        be::put_u32(&mut out, OVFL_LEN, self.len);
        be::put_u32(&mut out, OVFL_ADDR, self.addr.0);
        out
    }

    /// Decodes a reference from exactly [`OVERFLOW_REF_LEN`] bytes.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() != OVERFLOW_REF_LEN {
            return Err(BtPageError::MalformedPage(
                "overflow reference has the wrong length",
            ));
        }
        Ok(Self {
            len: be::get_u32(src, OVFL_LEN),
            addr: Addr(be::get_u32(src, OVFL_ADDR)),
        })
    }
}
