//! Block interleaver, and its double-buffered streaming form

use log::debug;

use crate::stream::{accept_guard, Stage};
use crate::{Bit, Error};

/// Interleaver for sequences of a given length
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Interleaver {
    /// Length of input/output sequence
    pub(crate) length: usize,
    /// Input index for each output index (needed in interleaving)
    pub(crate) all_in_index_given_out_index: Vec<usize>,
    /// Output index for each input index (needed in deinterleaving)
    pub(crate) all_out_index_given_in_index: Vec<usize>,
}

impl Interleaver {
    /// Returns interleaver corresponding to a given permutation.
    ///
    /// # Parameters
    ///
    /// - `perm`: Permutation of integers in `[0, L)` for some positive integer `L`. If the
    ///   interleaver input is the sequence `x[0], x[1], ..., x[L-1]`, then its output is the
    ///   sequence `x[perm[0]], x[perm[1]], ..., x[perm[L-1]]`.
    ///
    /// # Errors
    ///
    /// Returns an error if `perm` is not a permutation of the integers in `[0, L)` for some
    /// positive integer `L`.
    ///
    /// # Examples
    ///
    /// ```
    /// use wmantx::Interleaver;
    ///
    /// let perm = [0, 3, 2, 5, 4, 7, 6, 1];
    /// let interleaver = Interleaver::new(&perm)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(perm: &[usize]) -> Result<Self, Error> {
        check_permutation(perm)?;
        Ok(Self::from_valid_perm(perm.to_vec()))
    }

    /// Returns interleaver that writes each input element to a given output position.
    ///
    /// # Parameters
    ///
    /// - `dest`: Permutation of integers in `[0, L)` for some positive integer `L`. Input element
    ///   `x[k]` lands at position `dest[k]` of the interleaver output.
    ///
    /// # Errors
    ///
    /// Returns an error if `dest` is not a permutation of the integers in `[0, L)` for some
    /// positive integer `L`.
    ///
    /// # Examples
    ///
    /// ```
    /// use wmantx::Interleaver;
    ///
    /// let interleaver = Interleaver::from_destinations(&[2, 0, 1])?;
    /// let mut output = Vec::new();
    /// interleaver.interleave(&['a', 'b', 'c'], &mut output)?;
    /// assert_eq!(output, ['b', 'c', 'a']);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_destinations(dest: &[usize]) -> Result<Self, Error> {
        check_permutation(dest)?;
        let mut perm_vec: Vec<usize> = (0 .. dest.len()).collect();
        perm_vec.sort_by_key(|&k| dest[k]);
        Ok(Self::from_valid_perm(perm_vec))
    }

    /// Returns length of input/output sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the interleaver has zero length (never the case for a valid one).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns output position of input element `in_index`.
    ///
    /// # Panics
    ///
    /// Panics if `in_index` is not less than the interleaver length.
    #[must_use]
    pub fn out_index_given_in_index(&self, in_index: usize) -> usize {
        self.all_out_index_given_in_index[in_index]
    }

    /// Generates interleaver output given its input.
    ///
    /// # Parameters
    ///
    /// - `input`: Interleaver input.
    ///
    /// - `output`: Buffer for interleaver output (any pre-existing contents will be cleared).
    ///
    /// # Errors
    ///
    /// Returns an error if `input.len()` is not equal to `self.length`.
    ///
    /// # Examples
    ///
    /// ```
    /// use wmantx::Interleaver;
    ///
    /// let perm = [0, 3, 2, 5, 4, 7, 6, 1];
    /// let interleaver = Interleaver::new(&perm)?;
    /// let input = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];
    /// let mut output = Vec::new();
    /// interleaver.interleave(&input, &mut output)?;
    /// assert_eq!(output, ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b']);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn interleave<T: Copy>(&self, input: &[T], output: &mut Vec<T>) -> Result<(), Error> {
        if input.len() != self.length {
            return Err(Error::InvalidInput(format!(
                "Invalid interleaver input length (expected {}, found {})",
                self.length,
                input.len()
            )));
        }
        output.clear();
        for out_index in 0 .. self.length {
            output.push(input[self.all_in_index_given_out_index[out_index]]);
        }
        Ok(())
    }

    /// Generates interleaver input given its output.
    ///
    /// # Parameters
    ///
    /// - `output`: Interleaver output.
    ///
    /// - `input`: Buffer for interleaver input (any pre-existing contents will be cleared).
    ///
    /// # Errors
    ///
    /// Returns an error if `output.len()` is not equal to `self.length`.
    ///
    /// # Examples
    ///
    /// ```
    /// use wmantx::Interleaver;
    ///
    /// let perm = [0, 3, 2, 5, 4, 7, 6, 1];
    /// let interleaver = Interleaver::new(&perm)?;
    /// let output = ['a', 'd', 'c', 'f', 'e', 'h', 'g', 'b'];
    /// let mut input = Vec::new();
    /// interleaver.deinterleave(&output, &mut input)?;
    /// assert_eq!(input, ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h']);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn deinterleave<T: Copy>(&self, output: &[T], input: &mut Vec<T>) -> Result<(), Error> {
        if output.len() != self.length {
            return Err(Error::InvalidInput(format!(
                "Invalid interleaver output length (expected {}, found {})",
                self.length,
                output.len()
            )));
        }
        input.clear();
        for in_index in 0 .. self.length {
            input.push(output[self.all_out_index_given_in_index[in_index]]);
        }
        Ok(())
    }

    /// Returns interleaver corresponding to a valid permutation.
    fn from_valid_perm(perm_vec: Vec<usize>) -> Self {
        let length = perm_vec.len();
        let all_in_index_given_out_index: Vec<usize> = perm_vec;
        let mut all_out_index_given_in_index: Vec<usize> = (0 .. length).collect();
        all_out_index_given_in_index.sort_by_key(|&k| all_in_index_given_out_index[k]);
        Self {
            length,
            all_in_index_given_out_index,
            all_out_index_given_in_index,
        }
    }
}

/// Checks that given indices form a permutation of all integers in `[0, L)`, with `L > 0`.
fn check_permutation(perm: &[usize]) -> Result<(), Error> {
    if perm.is_empty() {
        return Err(Error::InvalidInput(
            "Permutation defining interleaver cannot be empty".to_string(),
        ));
    }
    let mut perm_sorted = perm.to_vec();
    perm_sorted.sort_unstable();
    if !perm_sorted.into_iter().eq(0 .. perm.len()) {
        return Err(Error::InvalidInput(format!(
            "Expected permutation of all integers in the range [0, {}), found {:?}",
            perm.len(),
            perm
        )));
    }
    Ok(())
}

/// Identifier of one of the two storage banks of a double-buffered interleaver
#[derive(Clone, Eq, PartialEq, Debug, Copy)]
pub enum Bank {
    /// First bank (written first after reset)
    A,
    /// Second bank
    B,
}

impl Bank {
    /// Returns the other bank.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Bank::A => Bank::B,
            Bank::B => Bank::A,
        }
    }

    /// Returns index of the bank in a two-element array.
    fn index(self) -> usize {
        match self {
            Bank::A => 0,
            Bank::B => 1,
        }
    }
}

/// Streaming block interleaver with two alternating ("ping-pong") storage banks
///
/// Coded bit `k` of block `N` is written to position `interleaver.out_index_given_in_index(k)`
/// of the write bank, while the read bank (holding block `N-1`) is read out in natural order. The
/// read pointer never overtakes the write pointer, so exactly one bit comes out per bit that goes
/// in, and the output lags the input by one block. The two banks swap roles once all bits of the
/// write bank have been written and all bits of the read bank have been read.
///
/// The read bank of the first block has never been written: it holds all-`Zero` bits, so the
/// first output block is a start-up transient and does not depend on the input.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct PingPongInterleaver {
    /// Permutation applied within each block
    interleaver: Interleaver,
    /// Storage banks `A` and `B`
    banks: [Vec<Bit>; 2],
    /// Bank currently in write role (the other is in read role)
    write_bank: Bank,
    /// Number of bits written to the write bank in the current interval
    num_written: usize,
    /// Number of bits read from the read bank in the current interval
    num_read: usize,
    /// Number of bank swaps since reset
    num_swaps: u64,
}

impl PingPongInterleaver {
    /// Returns streaming interleaver using given block permutation.
    ///
    /// # Examples
    ///
    /// ```
    /// use wmantx::{wman, Bit, PingPongInterleaver, Stage};
    ///
    /// let interleaver = wman::interleaver(wman::NCBPS, wman::INTERLEAVER_DEPTH, 2)?;
    /// let mut stage = PingPongInterleaver::new(interleaver);
    /// assert!(stage.push(Bit::One));
    /// assert_eq!(stage.pop(), Some(Bit::Zero)); // Start-up transient
    /// assert_eq!(stage.pop(), None);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[must_use]
    pub fn new(interleaver: Interleaver) -> Self {
        let length = interleaver.length;
        Self {
            interleaver,
            banks: [vec![Bit::Zero; length], vec![Bit::Zero; length]],
            write_bank: Bank::A,
            num_written: 0,
            num_read: 0,
            num_swaps: 0,
        }
    }

    /// Returns bank currently in write role.
    #[must_use]
    pub fn write_bank(&self) -> Bank {
        self.write_bank
    }

    /// Returns number of bank swaps since reset.
    #[must_use]
    pub fn num_swaps(&self) -> u64 {
        self.num_swaps
    }

    /// Returns `true` while the read side is still reading the never-written bank.
    #[must_use]
    pub fn in_startup_transient(&self) -> bool {
        self.num_swaps == 0
    }

    /// Swaps bank roles once the current interval is complete on both sides.
    fn swap_if_interval_done(&mut self) {
        if self.num_written == self.interleaver.length && self.num_read == self.interleaver.length
        {
            self.write_bank = self.write_bank.other();
            self.num_written = 0;
            self.num_read = 0;
            self.num_swaps += 1;
            debug!(
                "Interleaver swap {}: now writing bank {:?}",
                self.num_swaps, self.write_bank
            );
        }
    }
}

impl Stage for PingPongInterleaver {
    type Input = Bit;
    type Output = Bit;

    fn is_ready(&self) -> bool {
        self.num_written < self.interleaver.length
    }

    fn push(&mut self, bit: Bit) -> bool {
        if !accept_guard(self.is_ready(), "Interleaver") {
            return false;
        }
        let out_index = self.interleaver.out_index_given_in_index(self.num_written);
        self.banks[self.write_bank.index()][out_index] = bit;
        self.num_written += 1;
        self.swap_if_interval_done();
        true
    }

    fn pop(&mut self) -> Option<Bit> {
        if self.num_read >= self.num_written {
            return None;
        }
        let bit = self.banks[self.write_bank.other().index()][self.num_read];
        self.num_read += 1;
        self.swap_if_interval_done();
        Some(bit)
    }

    fn reset(&mut self) {
        for bank in &mut self.banks {
            bank.fill(Bit::Zero);
        }
        self.write_bank = Bank::A;
        self.num_written = 0;
        self.num_read = 0;
        self.num_swaps = 0;
    }
}


#[cfg(test)]
mod tests_of_ping_pong_interleaver {
    use super::*;
    use crate::utils;
    use Bit::{One, Zero};

    fn small_stage() -> PingPongInterleaver {
        PingPongInterleaver::new(Interleaver::from_destinations(&[2, 0, 3, 1]).unwrap())
    }

    /// Pushes bits one at a time, popping after each push, and returns all popped bits.
    fn run_lockstep(stage: &mut PingPongInterleaver, bits: &[Bit]) -> Vec<Bit> {
        let mut output = Vec::new();
        for &bit in bits {
            assert!(stage.push(bit));
            output.extend(stage.pop());
        }
        output
    }

    #[test]
    fn test_bank_other() {
        assert_eq!(Bank::A.other(), Bank::B);
        assert_eq!(Bank::B.other(), Bank::A);
        assert_eq!(Bank::A.index(), 0);
        assert_eq!(Bank::B.index(), 1);
    }

    #[test]
    fn test_startup_transient_and_latency() {
        let mut stage = small_stage();
        assert!(stage.in_startup_transient());
        // Block 0 reads the never-written bank
        let output = run_lockstep(&mut stage, &[One, One, Zero, One]);
        assert_eq!(output, [Zero, Zero, Zero, Zero]);
        assert_eq!(stage.num_swaps(), 1);
        assert_eq!(stage.write_bank(), Bank::B);
        assert!(!stage.in_startup_transient());
        // Block 1 reads block 0, permuted
        let output = run_lockstep(&mut stage, &[Zero, Zero, Zero, Zero]);
        assert_eq!(output, [One, One, One, Zero]);
        assert_eq!(stage.write_bank(), Bank::A);
    }

    #[test]
    fn test_matches_block_interleaver() {
        let interleaver = Interleaver::from_destinations(&[2, 0, 3, 1]).unwrap();
        let mut stage = PingPongInterleaver::new(interleaver.clone());
        let blocks: Vec<Vec<Bit>> = (0 .. 5).map(|_| utils::random_bits(4)).collect();
        let mut output = Vec::new();
        for block in &blocks {
            output.extend(run_lockstep(&mut stage, block));
        }
        let mut expected = Vec::new();
        for (block, out_chunk) in blocks.iter().zip(output.chunks_exact(4).skip(1)) {
            interleaver.interleave(block, &mut expected).unwrap();
            assert_eq!(out_chunk, expected.as_slice());
        }
    }

    #[test]
    fn test_back_pressure() {
        let mut stage = small_stage();
        // Reader stalled: the write side fills one block and then refuses further input
        for bit in [One, Zero, One, One] {
            assert!(stage.is_ready());
            assert!(stage.push(bit));
        }
        assert!(!stage.is_ready());
        // Reader drains the transient block, after which the banks swap
        for _ in 0 .. 4 {
            assert_eq!(stage.pop(), Some(Zero));
        }
        assert_eq!(stage.pop(), None);
        assert!(stage.is_ready());
        assert_eq!(stage.num_swaps(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not ready")]
    fn test_push_when_not_ready() {
        let mut stage = small_stage();
        for _ in 0 .. 5 {
            stage.push(One);
        }
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_push_when_not_ready_is_rejected() {
        let mut stage = small_stage();
        for bit in [One, Zero, One, One] {
            assert!(stage.push(bit));
        }
        let before = stage.clone();
        assert!(!stage.push(Zero));
        assert_eq!(stage, before);
        assert_eq!(stage.num_swaps(), 0);
    }

    #[test]
    fn test_reset() {
        let mut stage = small_stage();
        run_lockstep(&mut stage, &[One, One, One, One, One, One]);
        stage.reset();
        assert_eq!(stage, small_stage());
    }
}
