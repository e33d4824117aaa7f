//! Block-size selection.
//!
//! Block sizes are powers of two from 128 KiB to 16 MiB inclusive. For a file
//! of size `S` the chosen block size is the smallest `B` in the table such
//! that `S < 2000 * B`, clamped to the table maximum.

/// Block sizes available to the protocol, smallest first.
pub const BLOCK_SIZES: [u32; 8] = [
    128 * 1024,
    256 * 1024,
    512 * 1024,
    1024 * 1024,
    2 * 1024 * 1024,
    4 * 1024 * 1024,
    8 * 1024 * 1024,
    16 * 1024 * 1024,
];

/// Smallest block size in the table (128 KiB).
pub const MIN_BLOCK_SIZE: u32 = BLOCK_SIZES[0];

/// Largest block size in the table (16 MiB).
pub const MAX_BLOCK_SIZE: u32 = BLOCK_SIZES[BLOCK_SIZES.len() - 1];

/// Select the block size for a file of the given size.
#[must_use]
pub fn block_size(file_size: u64) -> u32 {
    for &candidate in &BLOCK_SIZES {
        if file_size < 2000 * u64::from(candidate) {
            return candidate;
        }
    }
    MAX_BLOCK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_gets_minimum_block() {
        assert_eq!(block_size(0), 128 * 1024);
    }

    #[test]
    fn two_hundred_mb_fits_minimum_block() {
        // 200e6 < 2000 * 128 KiB (~262e6)
        assert_eq!(block_size(200_000_000), 128 * 1024);
    }

    #[test]
    fn one_gib_selects_512_kib() {
        // The 512 KiB fixed point holds for the decimal gigabyte
        // (1_000_000_000 < 2000 * 512 KiB), not the binary one: 2^30 itself
        // overshoots 2000 * 512 KiB and falls through to 1 MiB.
        assert_eq!(block_size(1_000_000_000), 512 * 1024);
    }

    #[test]
    fn one_hundred_gib_clamps_to_max() {
        assert_eq!(block_size(100u64 * 1024 * 1024 * 1024), MAX_BLOCK_SIZE);
    }

    #[test]
    fn monotone_across_table() {
        let mut prev = 0u32;
        for exp in 0..40u32 {
            let size = 1u64 << exp;
            let b = block_size(size);
            assert!(b >= prev);
            prev = b;
        }
    }
}
