//! # Some useful functions for driving and checking the transmit chain
//!
//! The [`random_bits`] function returns a given number of random bits; the [`bits_from_hex`] and
//! [`hex_from_bits`] functions convert between bits (MSB first) and hexadecimal strings; and the
//! [`error_count`] function returns the number of errors in a sequence with respect to a
//! reference sequence.
//!
//! # Examples
//!
//! The code below illustrates the usage of the functions in this module.
//! ```
//! use wmantx::utils;
//!
//! let bits = utils::random_bits(96);
//! let hex = utils::hex_from_bits(&bits);
//! assert_eq!(utils::bits_from_hex(&hex)?, bits);
//! assert_eq!(utils::error_count(&bits, &bits), 0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use itertools::Itertools;
use rand::Rng;

use crate::{Bit, Error};

/// Returns given number of random bits.
///
/// # Parameters
///
/// - `num_bits`: Number of random bits to be generated.
///
/// # Returns
///
/// - `bits`: Random bits.
#[must_use]
pub fn random_bits(num_bits: usize) -> Vec<Bit> {
    let mut rng = rand::rng();
    (0 .. num_bits)
        .map(|_| Bit::from(rng.random_bool(0.5)))
        .collect()
}

/// Returns bits represented by a hexadecimal string, MSB of the first digit first.
///
/// # Parameters
///
/// - `hex`: Hexadecimal digits (either case), optionally preceded by `0x`. Underscores are
///   ignored.
///
/// # Errors
///
/// Returns an error if `hex` contains anything other than hexadecimal digits and underscores
/// after the optional prefix.
pub fn bits_from_hex(hex: &str) -> Result<Vec<Bit>, Error> {
    let digits = hex.strip_prefix("0x").unwrap_or(hex);
    let mut bits = Vec::with_capacity(4 * digits.len());
    for ch in digits.chars().filter(|&ch| ch != '_') {
        let Some(nibble) = ch.to_digit(16) else {
            return Err(Error::InvalidInput(format!(
                "Invalid hexadecimal digit '{ch}' in \"{hex}\""
            )));
        };
        bits.extend((0 .. 4).rev().map(|shift| Bit::from((nibble >> shift) & 1 == 1)));
    }
    Ok(bits)
}

/// Returns uppercase hexadecimal string for given bits, MSB first.
///
/// If the number of bits is not a multiple of `4`, the last digit is padded with `Zero` bits on
/// the right.
#[must_use]
pub fn hex_from_bits(bits: &[Bit]) -> String {
    bits.iter()
        .chunks(4)
        .into_iter()
        .map(|nibble_bits| {
            let (nibble, num) = nibble_bits.fold((0u32, 0u32), |(acc, num), &bit| {
                ((acc << 1) | u32::from(bit.is_one()), num + 1)
            });
            let nibble = nibble << (4 - num);
            // OK to unwrap: Nibble is always less than 16.
            std::char::from_digit(nibble, 16)
                .unwrap()
                .to_ascii_uppercase()
        })
        .collect()
}

/// Returns number of errors in a sequence with respect to a reference sequence.
///
/// # Parameters
///
/// - `seq`: Sequence in which errors must be counted.
///
/// - `ref_seq`: Reference sequence to which the given sequence is compared.
///
/// # Returns
///
/// - `err_count`: Number of positions in which the two sequences differ. If they are of different
///   lengths, then the longer sequence is effectively truncated to the length of the shorter one.
pub fn error_count<T: PartialEq>(seq: &[T], ref_seq: &[T]) -> usize {
    ref_seq
        .iter()
        .zip(seq.iter())
        .filter(|&(x, y)| x != y)
        .count()
}
