//! Randomizer based on a 15-stage linear-feedback shift register (generator `1 + x^14 + x^15`)

use log::debug;

use crate::stream::{accept_guard, Stage};
use crate::{Bit, Error};

/// Number of stages in the shift register
const NUM_STAGES: u32 = 15;

/// Mask covering all stages of the shift register
const STATE_MASK: u16 = (1 << NUM_STAGES) - 1;

/// Randomizer that whitens a bit stream, re-seeding itself at the start of every block
///
/// The register stages `1` to `15` are held in a `u16`, with stage `1` in bit `14` and stage `15`
/// in bit `0`. For each accepted bit, the feedback `stage15 ^ stage14` is XORed onto the input
/// bit, and the register shifts by one stage with the feedback entering stage `1`. After the last
/// bit of a block the register is re-loaded with the seed.
#[derive(Clone, Eq, PartialEq, Debug, Copy)]
pub struct Scrambler {
    /// Seed loaded at the start of every block
    seed: u16,
    /// Current register contents
    state: u16,
    /// Number of bits per block
    block_len: usize,
    /// Position of the next accepted bit within its block
    block_pos: usize,
    /// Whitened bit waiting to be popped
    output: Option<Bit>,
}

impl Scrambler {
    /// Returns randomizer with given seed and block length.
    ///
    /// # Parameters
    ///
    /// - `seed`: Register contents at the start of every block (stage `1` in bit `14`).
    ///
    /// - `block_len`: Number of bits after which the register is re-seeded.
    ///
    /// # Errors
    ///
    /// Returns an error if `seed` is `0` or wider than 15 bits, or if `block_len` is `0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use wmantx::{wman, Scrambler};
    ///
    /// let scrambler = Scrambler::new(wman::SEED, wman::BLOCK_LEN)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(seed: u16, block_len: usize) -> Result<Self, Error> {
        check_seed(seed)?;
        if block_len == 0 {
            return Err(Error::InvalidInput(
                "Randomizer block length cannot be zero".to_string(),
            ));
        }
        Ok(Self {
            seed,
            state: seed,
            block_len,
            block_pos: 0,
            output: None,
        })
    }

    /// Re-loads the register with the seed without processing any data.
    ///
    /// The position within the current block is not affected.
    pub fn load_seed(&mut self) {
        self.state = self.seed;
        debug!("Randomizer re-seeded with {:#06x}", self.seed);
    }

    /// Returns current register contents.
    #[must_use]
    pub fn state(&self) -> u16 {
        self.state
    }

    /// Returns position of the next accepted bit within its block.
    #[must_use]
    pub fn block_pos(&self) -> usize {
        self.block_pos
    }

    /// Returns whitened version of given bit, and advances the register.
    fn whiten(&mut self, bit: Bit) -> Bit {
        let feedback = (self.state ^ (self.state >> 1)) & 1;
        self.state = ((feedback << (NUM_STAGES - 1)) | (self.state >> 1)) & STATE_MASK;
        if self.block_pos == self.block_len - 1 {
            self.block_pos = 0;
            self.state = self.seed;
        } else {
            self.block_pos += 1;
        }
        bit ^ Bit::from(feedback == 1)
    }
}

impl Stage for Scrambler {
    type Input = Bit;
    type Output = Bit;

    fn is_ready(&self) -> bool {
        self.output.is_none()
    }

    fn push(&mut self, bit: Bit) -> bool {
        if !accept_guard(self.is_ready(), "Randomizer") {
            return false;
        }
        self.output = Some(self.whiten(bit));
        true
    }

    fn pop(&mut self) -> Option<Bit> {
        self.output.take()
    }

    fn reset(&mut self) {
        self.state = self.seed;
        self.block_pos = 0;
        self.output = None;
    }
}

/// Checks validity of randomizer seed.
pub(crate) fn check_seed(seed: u16) -> Result<(), Error> {
    if seed == 0 || seed > STATE_MASK {
        return Err(Error::InvalidInput(format!(
            "Randomizer seed must be a nonzero 15-bit value (found {seed:#x})"
        )));
    }
    Ok(())
}

/// Returns whitened bits for given input bits.
///
/// # Parameters
///
/// - `bits`: Bits to be whitened. The register is re-seeded every `block_len` bits, starting with
///   the first.
///
/// - `seed`: Register contents at the start of every block.
///
/// - `block_len`: Number of bits per block.
///
/// # Errors
///
/// Returns an error if `seed` is `0` or wider than 15 bits, or if `block_len` is `0`.
///
/// # Examples
///
/// ```
/// use wmantx::{scramble, wman, Bit};
///
/// let bits = vec![Bit::Zero; 8];
/// let whitened = scramble(&bits, wman::SEED, wman::BLOCK_LEN)?;
/// assert_eq!(scramble(&whitened, wman::SEED, wman::BLOCK_LEN)?, bits);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn scramble(bits: &[Bit], seed: u16, block_len: usize) -> Result<Vec<Bit>, Error> {
    let mut scrambler = Scrambler::new(seed, block_len)?;
    Ok(bits.iter().map(|&bit| scrambler.whiten(bit)).collect())
}
