#![forbid(unsafe_code)]

use std::ops::Range;

const ZEROES: [u8; 8] = [0u8; 8];

/// Incremental checksum used for page verification.
pub trait Checksum {
    /// Clears any accumulated state.
    fn reset(&mut self);
    /// Feeds `bytes` into the running checksum.
    fn update(&mut self, bytes: &[u8]);
    /// Returns the checksum of everything fed since the last reset.
    fn finalize(&self) -> u32;
}

/// CRC-32 (IEEE) backed by `crc32fast`.
pub struct Crc32Fast {
    inner: crc32fast::Hasher,
}

impl Default for Crc32Fast {
    fn default() -> Self {
        Self {
            inner: crc32fast::Hasher::new(),
        }
    }
}

impl Checksum for Crc32Fast {
    fn reset(&mut self) {
        self.inner.reset();
    }

    fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    fn finalize(&self) -> u32 {
        self.inner.clone().finalize()
    }
}

/// CRC-32 of `page` with the bytes in `skip` fed as zeroes.
///
/// The page buffer is never copied or modified. `skip` is clamped to the
/// buffer, so a short buffer simply hashes what it has.
pub fn page_checksum(page: &[u8], skip: Range<usize>) -> u32 {
    let mut hasher = Crc32Fast::default();
    checksum_with_hole(&mut hasher, page, skip);
    hasher.finalize()
}

fn checksum_with_hole<C: Checksum>(hasher: &mut C, page: &[u8], skip: Range<usize>) {
    let start = skip.start.min(page.len());
    let end = skip.end.clamp(start, page.len());
    hasher.update(&page[..start]);
    let mut hole = end - start;
    while hole > 0 {
        let n = hole.min(ZEROES.len());
        hasher.update(&ZEROES[..n]);
        hole -= n;
    }
    hasher.update(&page[end..]);
}
