#![forbid(unsafe_code)]
//! Fixed-width big-endian field access and alignment helpers shared by the
//! on-disk codecs.

pub mod be {
    //! Big-endian reads and writes at fixed byte ranges.
    //!
    //! Every on-disk structure declares its fields as `Range<usize>` constants;
    //! these helpers panic if a range does not have the width of the integer,
    //! which can only happen through a mistyped constant.

    use core::ops::Range;

    /// Reads a `u16` from `src[at]`.
    #[inline]
    pub fn get_u16(src: &[u8], at: Range<usize>) -> u16 {
        let mut raw = [0u8; 2];
        raw.copy_from_slice(&src[at]);
        u16::from_be_bytes(raw)
    }

    /// Reads a `u32` from `src[at]`.
    #[inline]
    pub fn get_u32(src: &[u8], at: Range<usize>) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&src[at]);
        u32::from_be_bytes(raw)
    }

    /// Reads a `u64` from `src[at]`.
    #[inline]
    pub fn get_u64(src: &[u8], at: Range<usize>) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&src[at]);
        u64::from_be_bytes(raw)
    }

    /// Writes `v` into `dst[at]`.
    #[inline]
    pub fn put_u16(dst: &mut [u8], at: Range<usize>, v: u16) {
        dst[at].copy_from_slice(&v.to_be_bytes());
    }

    /// Writes `v` into `dst[at]`.
    #[inline]
    pub fn put_u32(dst: &mut [u8], at: Range<usize>, v: u32) {
        dst[at].copy_from_slice(&v.to_be_bytes());
    }

    /// Writes `v` into `dst[at]`.
    #[inline]
    pub fn put_u64(dst: &mut [u8], at: Range<usize>, v: u64) {
        dst[at].copy_from_slice(&v.to_be_bytes());
    }
}

/// Rounds `v` up to the next multiple of `align`, which must be a power of two.
///
/// Returns `None` on overflow.
#[inline]
pub const fn align_up(v: u64, align: u64) -> Option<u64> {
    debug_assert!(align.is_power_of_two());
    match v.checked_add(align - 1) {
        Some(sum) => Some(sum & !(align - 1)),
        None => None,
    }
}

/// Copies `N` bytes out of `src` starting at `off`, or `None` if truncated.
#[inline]
pub fn take_array<const N: usize>(src: &[u8], off: usize) -> Option<[u8; N]> {
    let end = off.checked_add(N)?;
    let slice = src.get(off..end)?;
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    Some(out)
}
