use crate::primitives::bytes::align_up;
use crate::storage::btree::page::PAGE_HDR_LEN;
use crate::types::{Addr, BtPageError, Result};

/// Smallest allocation unit accepted by [`AllocUnit::new`].
pub const MIN_ALLOC_SIZE: u32 = 512;

/// Allocation-unit size configured at database open.
///
/// All on-page addresses are counts of allocation units; this type converts
/// them to and from byte offsets. Page sizes and the extent size must be
/// multiples of the unit, which [`super::FormatOptions::validate`] checks once
/// at open rather than on every call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AllocUnit {
    size: u32,
}

impl AllocUnit {
    /// Wraps `size`, which must be a power of two of at least 512 bytes.
    pub fn new(size: u32) -> Result<Self> {
        if size < MIN_ALLOC_SIZE {
            return Err(BtPageError::Invalid("allocation unit smaller than 512 bytes"));
        }
        if !size.is_power_of_two() {
            return Err(BtPageError::Invalid("allocation unit not a power of two"));
        }
        Ok(Self { size })
    }

    /// Allocation unit size in bytes.
    pub const fn size(self) -> u32 {
        self.size
    }

    /// Byte offset of `addr`.
    pub fn to_offset(self, addr: Addr) -> Result<u64> {
        if !addr.is_valid() {
            return Err(BtPageError::OutOfRange("cannot translate the invalid address"));
        }
        // Below 2^63 for every valid address and unit.
        Ok(u64::from(addr.0) * u64::from(self.size))
    }

    /// Address of the unit starting at `offset`.
    pub fn to_addr(self, offset: u64) -> Result<Addr> {
        let unit = u64::from(self.size);
        if offset % unit != 0 {
            return Err(BtPageError::Misaligned {
                offset,
                unit: self.size,
            });
        }
        let raw = u32::try_from(offset / unit)
            .map_err(|_| BtPageError::OutOfRange("offset beyond addressable units"))?;
        let addr = Addr(raw);
        if !addr.is_valid() {
            return Err(BtPageError::OutOfRange("offset maps to the invalid address"));
        }
        Ok(addr)
    }

    /// Rounds `bytes` up to a whole number of units.
    pub fn round_up(self, bytes: u64) -> Result<u64> {
        align_up(bytes, u64::from(self.size)).ok_or(BtPageError::OutOfRange("size overflows"))
    }

    /// Bytes needed for an overflow page holding `len` data bytes.
    pub fn overflow_bytes(self, len: u32) -> Result<u32> {
        let bytes = self.round_up(u64::from(len) + PAGE_HDR_LEN as u64)?;
        u32::try_from(bytes).map_err(|_| BtPageError::OutOfRange("overflow page exceeds 4GB"))
    }

    /// Number of allocation units spanned by an overflow page of `len` bytes.
    pub fn overflow_units(self, len: u32) -> Result<u32> {
        Ok(self.overflow_bytes(len)? / self.size)
    }
}
