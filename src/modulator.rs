//! Gray-coded QPSK mapper with Q15 fixed-point output

use itertools::Itertools;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::stream::{accept_guard, Stage};
use crate::{Bit, Error};

/// Magnitude of each QPSK component in Q15 format (`round(2^15 / sqrt(2))`)
pub const QPSK_AMPLITUDE: i16 = 23170;

/// Scale factor from Q15 to floating point
const Q15_SCALE: f64 = 32768.0;

/// Complex baseband symbol with Q15 fixed-point components
#[derive(Clone, Eq, PartialEq, Hash, Debug, Copy, Default, Deserialize, Serialize)]
pub struct Symbol {
    /// In-phase component
    pub i: i16,
    /// Quadrature component
    pub q: i16,
}

impl Symbol {
    /// Returns QPSK symbol for a pair of bits.
    ///
    /// `b0` selects the sign of the in-phase component and `b1` that of the quadrature component,
    /// with `Zero` mapping to `+QPSK_AMPLITUDE` and `One` to `-QPSK_AMPLITUDE`.
    ///
    /// # Examples
    ///
    /// ```
    /// use wmantx::{Bit, Symbol};
    ///
    /// let sym = Symbol::from_bits(Bit::Zero, Bit::One);
    /// assert_eq!((sym.i, sym.q), (23170, -23170));
    /// ```
    #[must_use]
    pub fn from_bits(b0: Bit, b1: Bit) -> Self {
        Self {
            i: component_for_bit(b0),
            q: component_for_bit(b1),
        }
    }

    /// Returns symbol as a floating-point complex number.
    #[must_use]
    pub fn to_complex(self) -> Complex<f64> {
        Complex::new(f64::from(self.i) / Q15_SCALE, f64::from(self.q) / Q15_SCALE)
    }
}

impl From<Symbol> for Complex<f64> {
    fn from(sym: Symbol) -> Self {
        sym.to_complex()
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.i, self.q)
    }
}

/// Returns Q15 component value for given bit.
fn component_for_bit(bit: Bit) -> i16 {
    match bit {
        Bit::Zero => QPSK_AMPLITUDE,
        Bit::One => -QPSK_AMPLITUDE,
    }
}

/// Returns QPSK symbols for given bits.
///
/// # Errors
///
/// Returns an error if the number of bits is odd.
///
/// # Examples
///
/// ```
/// use wmantx::{modulate, Bit};
/// use Bit::{One, Zero};
///
/// let syms = modulate(&[Zero, One, One, One])?;
/// assert_eq!(syms.len(), 2);
/// assert_eq!((syms[1].i, syms[1].q), (-23170, -23170));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn modulate(bits: &[Bit]) -> Result<Vec<Symbol>, Error> {
    if bits.len() % 2 != 0 {
        return Err(Error::InvalidInput(format!(
            "Expected an even number of bits for QPSK (found {})",
            bits.len()
        )));
    }
    Ok(bits
        .iter()
        .tuples()
        .map(|(&b0, &b1)| Symbol::from_bits(b0, b1))
        .collect())
}

/// Streaming QPSK mapper
///
/// The first bit of each pair is held until the second one arrives; a symbol becomes available
/// only when the second bit of a pair is accepted.
#[derive(Clone, Eq, PartialEq, Debug, Copy, Default)]
pub struct Modulator {
    /// First bit of the pair being collected
    first_bit: Option<Bit>,
    /// Symbol waiting to be popped
    output: Option<Symbol>,
}

impl Modulator {
    /// Returns mapper with no pending bit or symbol.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the next accepted bit completes a pair.
    #[must_use]
    pub fn expects_second_bit(&self) -> bool {
        self.first_bit.is_some()
    }

    /// Returns `true` if a symbol is waiting to be popped.
    #[must_use]
    pub fn has_symbol(&self) -> bool {
        self.output.is_some()
    }
}

impl Stage for Modulator {
    type Input = Bit;
    type Output = Symbol;

    fn is_ready(&self) -> bool {
        self.first_bit.is_none() || self.output.is_none()
    }

    fn push(&mut self, bit: Bit) -> bool {
        if !accept_guard(self.is_ready(), "Modulator") {
            return false;
        }
        match self.first_bit.take() {
            None => self.first_bit = Some(bit),
            Some(b0) => self.output = Some(Symbol::from_bits(b0, bit)),
        }
        true
    }

    fn pop(&mut self) -> Option<Symbol> {
        self.output.take()
    }

    fn reset(&mut self) {
        self.first_bit = None;
        self.output = None;
    }
}
