//! Constants and index permutation for the 802.16 (WirelessMAN) OFDM transmit profile
//!
//! The default profile has 96 information bits per block, a rate-1/2 tail-biting convolutional
//! code with generator polynomials `171` and `133` (octal), a block interleaver of depth 16 over
//! 192 coded bits, and QPSK modulation.

use crate::{Error, Interleaver};

/// Default 15-bit randomizer seed (`011011100010101`, first stage leftmost)
pub const SEED: u16 = 0b011_0111_0001_0101;

/// Number of information bits per block
pub const BLOCK_LEN: usize = 96;

/// Generator polynomials (octal `171` for output X, `133` for output Y)
pub const CODE_POLYNOMIALS: [usize; 2] = [0o171, 0o133];

/// Number of coded bits per block (and per interleaver block)
pub const NCBPS: usize = 2 * BLOCK_LEN;

/// Interleaver depth (number of columns)
pub const INTERLEAVER_DEPTH: usize = 16;

/// Number of coded bits per QPSK symbol
pub const BITS_PER_SYMBOL: usize = 2;

/// Returns destination index of coded bit `k` for the two-step block interleaver.
///
/// # Parameters
///
/// - `k`: Index of coded bit within its block. Must be less than `ncbps`.
///
/// - `ncbps`: Number of coded bits per block.
///
/// - `depth`: Interleaver depth `d`. Must divide `ncbps`.
///
/// - `bits_per_symbol`: Number of coded bits per modulation symbol, which determines
///   `s = max(bits_per_symbol / 2, 1)`.
///
/// # Notes
///
/// The first step maps adjacent coded bits onto nonadjacent positions:
/// `m = (ncbps / d) * (k mod d) + floor(k / d)`. The second step alternates adjacent bits between
/// less and more significant constellation bits:
/// `j = s * floor(m / s) + (m + ncbps - floor(d * m / ncbps)) mod s`. For `s = 1` the second step
/// is the identity.
#[must_use]
pub fn interleaved_index(k: usize, ncbps: usize, depth: usize, bits_per_symbol: usize) -> usize {
    let s = (bits_per_symbol / 2).max(1);
    let m = (ncbps / depth) * (k % depth) + k / depth;
    s * (m / s) + (m + ncbps - depth * m / ncbps) % s
}

/// Returns block interleaver for given block parameters.
///
/// The returned interleaver maps coded bit `k` to position `interleaved_index(k, ...)` of its
/// output.
///
/// # Errors
///
/// Returns an error if `ncbps` is `0`, if `depth` is `0` or does not divide `ncbps`, if
/// `bits_per_symbol` is `0`, or if the resulting index map is not a permutation.
///
/// # Examples
///
/// ```
/// use wmantx::wman;
///
/// let interleaver = wman::interleaver(wman::NCBPS, wman::INTERLEAVER_DEPTH, 2)?;
/// assert_eq!(interleaver.len(), 192);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn interleaver(
    ncbps: usize,
    depth: usize,
    bits_per_symbol: usize,
) -> Result<Interleaver, Error> {
    check_interleaver_params(ncbps, depth, bits_per_symbol)?;
    let out_index_given_in_index: Vec<usize> = (0 .. ncbps)
        .map(|k| interleaved_index(k, ncbps, depth, bits_per_symbol))
        .collect();
    Interleaver::from_destinations(&out_index_given_in_index)
}

/// Checks validity of interleaver parameters.
fn check_interleaver_params(
    ncbps: usize,
    depth: usize,
    bits_per_symbol: usize,
) -> Result<(), Error> {
    if ncbps == 0 {
        return Err(Error::InvalidInput(
            "Number of coded bits per block cannot be zero".to_string(),
        ));
    }
    if depth == 0 || ncbps % depth != 0 {
        return Err(Error::InvalidInput(format!(
            "Interleaver depth {depth} must be a positive divisor of {ncbps}"
        )));
    }
    if bits_per_symbol == 0 {
        return Err(Error::InvalidInput(
            "Number of bits per symbol cannot be zero".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests_of_functions {
    use super::*;

    #[test]
    fn test_interleaved_index() {
        // First step only (QPSK)
        assert_eq!(interleaved_index(0, NCBPS, INTERLEAVER_DEPTH, 2), 0);
        assert_eq!(interleaved_index(1, NCBPS, INTERLEAVER_DEPTH, 2), 12);
        assert_eq!(interleaved_index(15, NCBPS, INTERLEAVER_DEPTH, 2), 180);
        assert_eq!(interleaved_index(16, NCBPS, INTERLEAVER_DEPTH, 2), 1);
        assert_eq!(interleaved_index(191, NCBPS, INTERLEAVER_DEPTH, 2), 191);
        // Second step active (16-QAM)
        assert_eq!(interleaved_index(0, NCBPS, INTERLEAVER_DEPTH, 4), 0);
        assert_eq!(interleaved_index(16, NCBPS, INTERLEAVER_DEPTH, 4), 1);
        assert_eq!(interleaved_index(1, NCBPS, INTERLEAVER_DEPTH, 4), 13);
    }

    #[test]
    fn test_interleaver() {
        // Invalid input
        assert!(interleaver(0, 16, 2).is_err());
        assert!(interleaver(192, 0, 2).is_err());
        assert!(interleaver(192, 7, 2).is_err());
        assert!(interleaver(192, 16, 0).is_err());
        // Valid input
        for bits_per_symbol in [1, 2, 4, 6] {
            let interleaver = interleaver(NCBPS, INTERLEAVER_DEPTH, bits_per_symbol).unwrap();
            assert_eq!(interleaver.length, NCBPS);
        }
        let interleaver = interleaver(NCBPS, INTERLEAVER_DEPTH, BITS_PER_SYMBOL).unwrap();
        for k in 0 .. NCBPS {
            assert_eq!(
                interleaver.out_index_given_in_index(k),
                interleaved_index(k, NCBPS, INTERLEAVER_DEPTH, BITS_PER_SYMBOL)
            );
        }
    }

    #[test]
    fn test_permutation_is_bijection() {
        let mut seen = [false; NCBPS];
        for k in 0 .. NCBPS {
            let j = interleaved_index(k, NCBPS, INTERLEAVER_DEPTH, BITS_PER_SYMBOL);
            assert!(j < NCBPS);
            assert!(!seen[j], "index {j} used twice");
            seen[j] = true;
        }
        assert!(seen.iter().all(|&used| used));
    }

    #[test]
    fn test_check_interleaver_params() {
        assert!(check_interleaver_params(0, 16, 2).is_err());
        assert!(check_interleaver_params(192, 0, 2).is_err());
        assert!(check_interleaver_params(192, 10, 2).is_err());
        assert!(check_interleaver_params(192, 16, 0).is_err());
        assert!(check_interleaver_params(192, 16, 2).is_ok());
    }
}
