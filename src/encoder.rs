//! Tail-biting feedforward convolutional encoder

use std::collections::VecDeque;

use log::debug;

use crate::stream::{accept_guard, Stage};
use crate::{Bit, Error};

/// State of a convolutional encoder (contents of its shift register)
#[derive(Clone, Eq, PartialEq, Debug, Copy, Default)]
pub(crate) struct State(pub(crate) usize);

/// State machine for feedforward convolutional encoder
#[derive(Clone, Eq, PartialEq, Debug)]
pub(crate) struct StateMachine {
    /// Code polynomials
    pub(crate) code_polynomials: Vec<usize>,
    /// Memory length
    pub(crate) memory_len: usize,
    /// Number of states
    pub(crate) num_states: usize,
    /// Number of output bits
    pub(crate) num_output_bits: usize,
    /// Buffer for output bits
    output_bits: Vec<Bit>,
    /// Current state
    pub(crate) state: State,
}

impl StateMachine {
    /// Returns state machine for convolutional encoder corresponding to given code polynomials.
    ///
    /// # Parameters
    ///
    /// - `code_polynomials`: Integer representations of the generator polynomials for the code.
    ///   Must have length `N >= 2` for a code of rate `1/N`. For a code of constraint length `L`,
    ///   the largest polynomial must be in the range `[2^(L-1), 2^L)`, and every polynomial must
    ///   be in the range `[1, 2^L)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of code polynomials is less than `2`, or if any of them is
    /// `0`, or if the constraint length is less than `2`.
    ///
    /// # Notes
    ///
    /// Let `b_{n,0}`, `b_{n,1}`, ... , `b_{n,L-1}` be the `L`-bit binary representation of
    /// `code_polynomials[n]`, with `b_{n,0}` being the MSB. The input-output relationship of the
    /// state machine can then be described as follows. Let `x_{k}` be the input bit at time `k`,
    /// and let `y_{n,k}` be output bit `n` at time `k`. Then,
    /// `y_{n,k} = sum_{i=0}^{L-1} b_{n,i} * x_{k-i}`.
    ///
    /// The bits `x_{k-1}`, `x_{k-2}`, ... , `x_{k-L+1}` constitute the binary representation of
    /// the state at time `k`, with `x_{k-1}` being the MSB. The output bits at time `k` are to be
    /// read out in the order `y_{0,k}`, `y_{1,k}`, ... , `y_{N-1,k}`.
    pub(crate) fn new(code_polynomials: &[usize]) -> Result<Self, Error> {
        let constraint_len = constraint_length(code_polynomials)?;
        Ok(Self {
            code_polynomials: code_polynomials.to_vec(),
            memory_len: constraint_len - 1,
            num_states: 1 << (constraint_len - 1),
            num_output_bits: code_polynomials.len(),
            output_bits: vec![Bit::Zero; code_polynomials.len()],
            state: State(0),
        })
    }

    /// Generates output bits for given input bit, and updates state.
    fn generate_output_bits(&mut self, input_bit: Bit) {
        self.output_bits.clear();
        let aug_state_index = self.augmented_state_index(input_bit);
        for &code_poly in &self.code_polynomials {
            self.output_bits.push(bitxor(aug_state_index & code_poly));
        }
        self.state = State(aug_state_index >> 1);
    }

    /// Returns state machine to the all-zero state, with cleared output bits.
    fn reset(&mut self) {
        self.state = State(0);
        self.output_bits.fill(Bit::Zero);
    }

    /// Shifts given input bit into the state without generating output bits.
    fn shift_in(&mut self, input_bit: Bit) {
        self.state = State(self.augmented_state_index(input_bit) >> 1);
    }

    /// Returns integer obtained by augmenting current state on the left with given input bit.
    fn augmented_state_index(&self, input_bit: Bit) -> usize {
        match input_bit {
            Bit::Zero => self.state.0,
            Bit::One => self.num_states + self.state.0,
        }
    }
}

/// Returns constraint length corresponding to given code polynomials.
fn constraint_length(code_polynomials: &[usize]) -> Result<usize, Error> {
    if code_polynomials.len() < 2 {
        return Err(Error::InvalidInput(
            "Expected at least two code polynomials".to_string(),
        ));
    }
    if code_polynomials.contains(&0) {
        return Err(Error::InvalidInput(
            "Code polynomials cannot be 0".to_string(),
        ));
    }
    let largest_poly = code_polynomials.iter().copied().max().unwrap_or_default();
    // OK to cast `u32` to `usize`: Numbers involved will always be small enough.
    let constraint_len = (usize::BITS - largest_poly.leading_zeros()) as usize;
    if constraint_len < 2 {
        return Err(Error::InvalidInput(format!(
            "Constraint length must be at least 2 (found {constraint_len})"
        )));
    }
    Ok(constraint_len)
}

/// Returns XOR of bits in the binary representation of given integer.
fn bitxor(num: usize) -> Bit {
    match num.count_ones() % 2 {
        0 => Bit::Zero,
        _ => Bit::One,
    }
}

/// Returns state holding the last `memory_len` bits of given block (most recent bit as MSB).
fn tail_biting_state(info_bits: &[Bit], memory_len: usize) -> State {
    info_bits[info_bits.len() - memory_len ..]
        .iter()
        .enumerate()
        .fold(State(0), |state, (i, &bit)| {
            State(state.0 | (usize::from(bit) << i))
        })
}

/// Generates code bits from tail-biting convolutional encoder.
///
/// # Parameters
///
/// - `info_bits`: Information bits to be encoded. The encoder state is initialized with the last
///   `memory_len` of these bits, so that the final state equals the initial state.
///
/// - `code_polynomials`: Integer representations of the generator polynomials for the code (see
///   [`crate::wman::CODE_POLYNOMIALS`] for the 802.16 code).
///
/// # Returns
///
/// - `code_bits`: Code bits, with the output bits for information bit `k` at positions
///   `N*k, N*k+1, ..., N*k+N-1` for a code of rate `1/N`.
///
/// # Errors
///
/// Returns an error if `code_polynomials` is invalid, or if there are fewer information bits than
/// the memory length of the code.
///
/// # Examples
///
/// ```
/// use wmantx::{encode_tail_biting, utils, wman};
///
/// let info_bits = utils::bits_from_hex("558AC4A53A1724E163AC2BF9")?;
/// let code_bits = encode_tail_biting(&info_bits, &wman::CODE_POLYNOMIALS)?;
/// assert_eq!(
///     utils::hex_from_bits(&code_bits),
///     "2833E48D392026D5B6DC5E4AF47ADD29494B6C89151348CA"
/// );
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn encode_tail_biting(
    info_bits: &[Bit],
    code_polynomials: &[usize],
) -> Result<Vec<Bit>, Error> {
    let mut sm = StateMachine::new(code_polynomials)?;
    check_block_len(info_bits.len(), sm.memory_len)?;
    sm.state = tail_biting_state(info_bits, sm.memory_len);
    let mut code_bits = Vec::with_capacity(info_bits.len() * sm.num_output_bits);
    for &info_bit in info_bits {
        sm.generate_output_bits(info_bit);
        code_bits.extend(&sm.output_bits);
    }
    Ok(code_bits)
}

/// Checks that a block is long enough to hold a full tail-biting state.
pub(crate) fn check_block_len(block_len: usize, memory_len: usize) -> Result<(), Error> {
    if block_len < memory_len || block_len == 0 {
        return Err(Error::InvalidInput(format!(
            "Block length {block_len} must be positive and at least the memory length {memory_len}"
        )));
    }
    Ok(())
}

/// Phase of an encoder lane
#[derive(Clone, Eq, PartialEq, Debug, Copy)]
enum Phase {
    /// Collecting the information bits of a block
    Buffering,
    /// Encoding a fully buffered block
    Encoding,
}

/// One of the two alternating encoder instances
#[derive(Clone, Eq, PartialEq, Debug)]
struct Lane {
    /// Current phase
    phase: Phase,
    /// Information bits of the block
    info_bits: Vec<Bit>,
    /// State captured from the last bits of the block while buffering
    preload: StateMachine,
    /// Shift register used while encoding
    register: StateMachine,
    /// Number of information bits encoded so far
    num_encoded: usize,
}

impl Lane {
    /// Returns empty lane for blocks of given length.
    fn new(sm: &StateMachine, block_len: usize) -> Self {
        Self {
            phase: Phase::Buffering,
            info_bits: Vec::with_capacity(block_len),
            preload: sm.clone(),
            register: sm.clone(),
            num_encoded: 0,
        }
    }

    /// Empties the lane and returns it to the buffering phase.
    fn clear(&mut self) {
        self.phase = Phase::Buffering;
        self.info_bits.clear();
        self.preload.reset();
        self.register.reset();
        self.num_encoded = 0;
    }
}

/// Streaming rate-`1/N` tail-biting convolutional encoder
///
/// Blocks of information bits are buffered in two alternating lanes: while the lane holding block
/// `N` is being encoded, block `N+1` is buffered in the other lane. While a block is buffered, its
/// last `memory_len` bits are shifted into the lane's pre-load register, which becomes the initial
/// state of the shift register when encoding starts. Each encoded information bit yields `N` code
/// bits through a small emit queue, so the code bits of one information bit are always handed out
/// before the next information bit is encoded.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ConvEncoder {
    /// Alternating lanes, indexed by block parity
    lanes: [Lane; 2],
    /// Number of information bits per block
    block_len: usize,
    /// Memory length of the code
    memory_len: usize,
    /// Lane receiving input bits
    fill_lane: usize,
    /// Lane being encoded
    encode_lane: usize,
    /// Code bits waiting to be popped
    emit_queue: VecDeque<Bit>,
    /// Number of blocks fully encoded since reset
    num_blocks_encoded: u64,
}

impl ConvEncoder {
    /// Returns streaming encoder for given code polynomials and block length.
    ///
    /// # Errors
    ///
    /// Returns an error if `code_polynomials` is invalid, or if `block_len` is less than the
    /// memory length of the code.
    ///
    /// # Examples
    ///
    /// ```
    /// use wmantx::{wman, ConvEncoder, Stage};
    ///
    /// let mut encoder = ConvEncoder::new(&wman::CODE_POLYNOMIALS, wman::BLOCK_LEN)?;
    /// assert!(encoder.is_ready());
    /// assert_eq!(encoder.pop(), None); // Nothing until a full block is buffered
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(code_polynomials: &[usize], block_len: usize) -> Result<Self, Error> {
        let sm = StateMachine::new(code_polynomials)?;
        check_block_len(block_len, sm.memory_len)?;
        Ok(Self {
            lanes: [Lane::new(&sm, block_len), Lane::new(&sm, block_len)],
            block_len,
            memory_len: sm.memory_len,
            fill_lane: 0,
            encode_lane: 0,
            emit_queue: VecDeque::with_capacity(sm.num_output_bits),
            num_blocks_encoded: 0,
        })
    }

    /// Returns number of blocks fully encoded since reset.
    #[must_use]
    pub fn num_blocks_encoded(&self) -> u64 {
        self.num_blocks_encoded
    }

    /// Encodes the next buffered information bit into the emit queue, if there is one.
    fn encode_next_bit(&mut self) {
        let lane = &mut self.lanes[self.encode_lane];
        if lane.phase != Phase::Encoding {
            return;
        }
        if lane.num_encoded == 0 {
            lane.register.state = lane.preload.state;
        }
        lane.register.generate_output_bits(lane.info_bits[lane.num_encoded]);
        self.emit_queue.extend(&lane.register.output_bits);
        lane.num_encoded += 1;
        if lane.num_encoded == self.block_len {
            debug_assert_eq!(
                lane.register.state, lane.preload.state,
                "tail-biting encoder did not return to its initial state"
            );
            lane.clear();
            self.num_blocks_encoded += 1;
            debug!(
                "Encoder lane {} done with block {}",
                self.encode_lane, self.num_blocks_encoded
            );
            self.encode_lane ^= 1;
        }
    }
}

impl Stage for ConvEncoder {
    type Input = Bit;
    type Output = Bit;

    fn is_ready(&self) -> bool {
        self.lanes[self.fill_lane].phase == Phase::Buffering
    }

    fn push(&mut self, bit: Bit) -> bool {
        if !accept_guard(self.is_ready(), "Encoder") {
            return false;
        }
        let lane = &mut self.lanes[self.fill_lane];
        lane.info_bits.push(bit);
        if lane.info_bits.len() > self.block_len - self.memory_len {
            lane.preload.shift_in(bit);
        }
        if lane.info_bits.len() == self.block_len {
            lane.phase = Phase::Encoding;
            self.fill_lane ^= 1;
        }
        true
    }

    fn pop(&mut self) -> Option<Bit> {
        if self.emit_queue.is_empty() {
            self.encode_next_bit();
        }
        self.emit_queue.pop_front()
    }

    fn reset(&mut self) {
        for lane in &mut self.lanes {
            lane.clear();
        }
        self.fill_lane = 0;
        self.encode_lane = 0;
        self.emit_queue.clear();
        self.num_blocks_encoded = 0;
    }
}
