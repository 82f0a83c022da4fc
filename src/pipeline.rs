//! Transmit chain composed of randomizer, encoder, interleaver and mapper
//!
//! The chain advances in lock-step ticks. On each tick the mapper hands out a symbol if the
//! downstream consumer is ready, every inter-stage link then moves as many bits as the receiving
//! stage accepts (at most two), and finally the randomizer takes the offered input bit if it has
//! room. A stall anywhere propagates upstream one stage per tick through the ready handshakes.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::scrambler::check_seed;
use crate::stream::{accept_guard, transfer, Stage, Tap, TAP_CAPACITY};
use crate::{wman, Bit, ConvEncoder, Error, Modulator, PingPongInterleaver, Scrambler, Symbol};

/// Largest supported constraint length of the convolutional code
const MAX_CONSTRAINT_LEN: usize = 7;

/// Parameters of the transmit chain
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct TxParams {
    /// 15-bit randomizer seed (stage `1` in bit `14`)
    pub seed: u16,
    /// Number of information bits per block
    pub block_len: usize,
    /// Generator polynomials of the rate-1/2 convolutional code
    pub code_polynomials: Vec<usize>,
    /// Number of coded bits per block
    pub ncbps: usize,
    /// Interleaver depth
    pub interleaver_depth: usize,
    /// Number of coded bits per symbol
    pub bits_per_symbol: usize,
}

impl Default for TxParams {
    fn default() -> Self {
        Self {
            seed: wman::SEED,
            block_len: wman::BLOCK_LEN,
            code_polynomials: wman::CODE_POLYNOMIALS.to_vec(),
            ncbps: wman::NCBPS,
            interleaver_depth: wman::INTERLEAVER_DEPTH,
            bits_per_symbol: wman::BITS_PER_SYMBOL,
        }
    }
}

impl TxParams {
    /// Checks validity of the parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the seed is `0` or wider than 15 bits, if the code does not have
    /// exactly two polynomials, if a polynomial is `0` or wider than 7 bits, if `ncbps` is not
    /// twice `block_len`, if the interleaver depth does not divide `ncbps`, or if the number of
    /// bits per symbol is not `2`.
    pub fn validate(&self) -> Result<(), Error> {
        check_seed(self.seed)?;
        if self.code_polynomials.len() != 2 {
            return Err(Error::InvalidInput(format!(
                "Expected two code polynomials for a rate-1/2 code (found {})",
                self.code_polynomials.len()
            )));
        }
        if let Some(&poly) = self
            .code_polynomials
            .iter()
            .find(|&&poly| poly == 0 || poly >= 1 << MAX_CONSTRAINT_LEN)
        {
            return Err(Error::InvalidInput(format!(
                "Code polynomial {poly:#o} must be nonzero and fit in {MAX_CONSTRAINT_LEN} bits"
            )));
        }
        if self.ncbps != 2 * self.block_len {
            return Err(Error::InvalidInput(format!(
                "Coded block length {} must be twice the information block length {}",
                self.ncbps, self.block_len
            )));
        }
        if self.interleaver_depth == 0 || self.ncbps % self.interleaver_depth != 0 {
            return Err(Error::InvalidInput(format!(
                "Interleaver depth {} must be a positive divisor of {}",
                self.interleaver_depth, self.ncbps
            )));
        }
        if self.bits_per_symbol != 2 {
            return Err(Error::InvalidInput(format!(
                "Only QPSK (2 bits per symbol) is supported (found {})",
                self.bits_per_symbol
            )));
        }
        Ok(())
    }
}

/// Bits seen on each inter-stage link during one tick
#[derive(Clone, Eq, PartialEq, Debug, Copy, Default)]
pub struct Taps {
    /// Randomizer output (encoder input)
    pub scrambled: Tap,
    /// Encoder output (interleaver input)
    pub coded: Tap,
    /// Interleaver output (mapper input)
    pub interleaved: Tap,
}

/// Outcome of one tick of the transmit chain
#[derive(Clone, Eq, PartialEq, Debug, Copy, Default)]
pub struct Tick {
    /// Whether the offered input bit was accepted
    pub accepted: bool,
    /// Symbol handed to the downstream consumer
    pub symbol: Option<Symbol>,
    /// Debug taps on the inter-stage links
    pub taps: Taps,
}

/// Counters kept for observability only
#[derive(Clone, Eq, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
pub struct PipelineStatus {
    /// Number of ticks since reset
    pub num_ticks: u64,
    /// Number of input bits accepted
    pub num_bits_accepted: u64,
    /// Number of symbols handed downstream
    pub num_symbols_emitted: u64,
    /// Number of ticks on which an offered input bit was refused
    pub num_input_stall_ticks: u64,
    /// Number of ticks on which a symbol was held back because downstream was not ready
    pub num_output_stall_ticks: u64,
    /// Number of blocks fully encoded
    pub num_blocks_encoded: u64,
    /// Number of interleaver bank swaps
    pub num_bank_swaps: u64,
}

/// Complete transmit chain with a single bit input and a single symbol output
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Pipeline {
    /// Parameters used to build the chain
    params: TxParams,
    /// Randomizer stage
    scrambler: Scrambler,
    /// Encoder stage
    encoder: ConvEncoder,
    /// Interleaver stage
    interleaver: PingPongInterleaver,
    /// Mapper stage
    modulator: Modulator,
    /// Whether input bits are accepted at all
    enabled: bool,
    /// Observability counters
    status: PipelineStatus,
}

impl Pipeline {
    /// Returns transmit chain for given parameters, enabled and freshly reset.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are invalid (see [`TxParams::validate`]).
    ///
    /// # Examples
    ///
    /// ```
    /// use wmantx::{Pipeline, TxParams};
    ///
    /// let pipeline = Pipeline::new(TxParams::default())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(params: TxParams) -> Result<Self, Error> {
        params.validate()?;
        let scrambler = Scrambler::new(params.seed, params.block_len)?;
        let encoder = ConvEncoder::new(&params.code_polynomials, params.block_len)?;
        let interleaver = PingPongInterleaver::new(wman::interleaver(
            params.ncbps,
            params.interleaver_depth,
            params.bits_per_symbol,
        )?);
        Ok(Self {
            params,
            scrambler,
            encoder,
            interleaver,
            modulator: Modulator::new(),
            enabled: true,
            status: PipelineStatus::default(),
        })
    }

    /// Returns parameters used to build the chain.
    #[must_use]
    pub fn params(&self) -> &TxParams {
        &self.params
    }

    /// Returns observability counters.
    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            num_blocks_encoded: self.encoder.num_blocks_encoded(),
            num_bank_swaps: self.interleaver.num_swaps(),
            ..self.status
        }
    }

    /// Sets whether input bits are accepted at all.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns `true` if input bits are accepted at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Re-loads the randomizer with its seed.
    pub fn load(&mut self) {
        self.scrambler.load_seed();
    }

    /// Returns `true` while the interleaver output is still the start-up transient.
    #[must_use]
    pub fn in_startup_transient(&self) -> bool {
        self.interleaver.in_startup_transient()
    }

    /// Advances the chain by one tick.
    ///
    /// # Parameters
    ///
    /// - `input`: Bit offered by the upstream source on this tick, if any.
    ///
    /// - `downstream_ready`: Whether the downstream consumer takes a symbol on this tick.
    ///
    /// # Returns
    ///
    /// - `tick`: Whether the offered bit was accepted (if not, it must be offered again), the
    ///   symbol handed downstream, and the bits seen on each inter-stage link.
    pub fn tick(&mut self, input: Option<Bit>, downstream_ready: bool) -> Tick {
        self.status.num_ticks += 1;
        let symbol = if downstream_ready {
            self.modulator.pop()
        } else {
            if self.modulator.has_symbol() {
                self.status.num_output_stall_ticks += 1;
            }
            None
        };
        if symbol.is_some() {
            self.status.num_symbols_emitted += 1;
        }
        let taps = self.advance();
        let accepted = match input {
            Some(bit) if self.is_ready() => self.accept(bit),
            Some(_) => {
                self.status.num_input_stall_ticks += 1;
                false
            }
            None => false,
        };
        Tick {
            accepted,
            symbol,
            taps,
        }
    }

    /// Pushes all given bits through the chain with downstream always ready, and returns the
    /// symbols that come out while doing so.
    ///
    /// Because of the interleaver latency, the symbols for the last block only come out once the
    /// following block has been pushed.
    pub fn run(&mut self, bits: &[Bit]) -> Vec<Symbol> {
        let mut syms = Vec::with_capacity(bits.len());
        let mut bits_iter = bits.iter().copied().peekable();
        while let Some(&bit) = bits_iter.peek() {
            let tick = self.tick(Some(bit), true);
            if tick.accepted {
                bits_iter.next();
            }
            syms.extend(tick.symbol);
        }
        syms
    }

    /// Moves bits across all inter-stage links, downstream links first.
    fn advance(&mut self) -> Taps {
        let mut taps = Taps::default();
        transfer(
            &mut self.interleaver,
            &mut self.modulator,
            TAP_CAPACITY,
            &mut taps.interleaved,
        );
        transfer(
            &mut self.encoder,
            &mut self.interleaver,
            TAP_CAPACITY,
            &mut taps.coded,
        );
        transfer(&mut self.scrambler, &mut self.encoder, 1, &mut taps.scrambled);
        taps
    }

    /// Hands an input bit to the randomizer.
    fn accept(&mut self, bit: Bit) -> bool {
        let accepted = self.scrambler.push(bit);
        if accepted {
            self.status.num_bits_accepted += 1;
        }
        accepted
    }
}

impl Stage for Pipeline {
    type Input = Bit;
    type Output = Symbol;

    fn is_ready(&self) -> bool {
        self.enabled && self.scrambler.is_ready()
    }

    fn push(&mut self, bit: Bit) -> bool {
        if !accept_guard(self.is_ready(), "Transmit chain") {
            return false;
        }
        self.accept(bit)
    }

    fn pop(&mut self) -> Option<Symbol> {
        self.tick(None, true).symbol
    }

    fn reset(&mut self) {
        self.scrambler.reset();
        self.encoder.reset();
        self.interleaver.reset();
        self.modulator.reset();
        self.status = PipelineStatus::default();
        debug!("Transmit chain reset");
    }
}


#[cfg(test)]
mod tests_of_pipeline {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::{encode_tail_biting, modulate, scramble, utils};

    const GOLDEN_INPUT: &str = "ACBCD2114DAE1577C6DBF4C9";
    const GOLDEN_INTERLEAVED: &str = "4B047DFA42F2A5D5F61C021A5851E9A309A24FD58086BD1E";

    fn default_pipeline() -> Pipeline {
        Pipeline::new(TxParams::default()).unwrap()
    }

    /// Idles the chain until it stops producing symbols.
    fn flush(pipeline: &mut Pipeline, syms: &mut Vec<Symbol>) {
        for _ in 0 .. 4 * wman::BLOCK_LEN {
            syms.extend(pipeline.tick(None, true).symbol);
        }
    }

    fn run_and_flush(pipeline: &mut Pipeline, bits: &[Bit]) -> Vec<Symbol> {
        let mut syms = pipeline.run(bits);
        flush(pipeline, &mut syms);
        syms
    }

    /// Returns symbols for given blocks, computed block by block.
    fn reference_symbols(blocks: &[Vec<Bit>]) -> Vec<Symbol> {
        let interleaver = wman::interleaver(wman::NCBPS, wman::INTERLEAVER_DEPTH, 2).unwrap();
        let mut syms = Vec::new();
        let mut interleaved = Vec::new();
        for block in blocks {
            let scrambled = scramble(block, wman::SEED, wman::BLOCK_LEN).unwrap();
            let coded = encode_tail_biting(&scrambled, &wman::CODE_POLYNOMIALS).unwrap();
            interleaver.interleave(&coded, &mut interleaved).unwrap();
            syms.extend(modulate(&interleaved).unwrap());
        }
        syms
    }

    /// Drives the chain with random stalls on both sides until all bits are accepted, and then
    /// idles it until it stops producing symbols.
    fn run_with_stalls(
        bits: &[Bit],
        input_valid_prob: f64,
        downstream_ready_prob: f64,
        rng: &mut StdRng,
    ) -> Vec<Symbol> {
        let mut pipeline = default_pipeline();
        let mut syms = Vec::new();
        let mut next_bit = 0;
        while next_bit < bits.len() {
            let input = if rng.random_bool(input_valid_prob) {
                Some(bits[next_bit])
            } else {
                None
            };
            let tick = pipeline.tick(input, rng.random_bool(downstream_ready_prob));
            if tick.accepted {
                next_bit += 1;
            }
            syms.extend(tick.symbol);
        }
        flush(&mut pipeline, &mut syms);
        syms
    }

    #[test]
    fn test_new() {
        assert!(Pipeline::new(TxParams {
            interleaver_depth: 10,
            ..TxParams::default()
        })
        .is_err());
        let pipeline = default_pipeline();
        assert!(pipeline.is_enabled());
        assert!(pipeline.is_ready());
        assert!(pipeline.in_startup_transient());
        assert_eq!(pipeline.params(), &TxParams::default());
        assert_eq!(pipeline.status(), PipelineStatus::default());
    }

    #[test]
    fn test_golden_steady_state() {
        let block = utils::bits_from_hex(GOLDEN_INPUT).unwrap();
        let num_blocks = 4;
        let mut pipeline = default_pipeline();
        let syms = run_and_flush(&mut pipeline, &block.repeat(num_blocks));
        // The last block stays in the interleaver, and the first one out is the start-up transient
        assert_eq!(syms.len(), num_blocks * wman::BLOCK_LEN);
        assert!(syms[.. wman::BLOCK_LEN]
            .iter()
            .all(|&sym| sym == Symbol::from_bits(Bit::Zero, Bit::Zero)));
        let golden = modulate(&utils::bits_from_hex(GOLDEN_INTERLEAVED).unwrap()).unwrap();
        for out_block in syms[wman::BLOCK_LEN ..].chunks_exact(wman::BLOCK_LEN) {
            assert_eq!(out_block, golden.as_slice());
        }
        assert!(!pipeline.in_startup_transient());
    }

    #[test]
    fn test_taps() {
        let block = utils::bits_from_hex(GOLDEN_INPUT).unwrap();
        let mut pipeline = default_pipeline();
        let mut scrambled = Vec::new();
        let mut coded = Vec::new();
        let mut interleaved = Vec::new();
        let mut next_bit = 0;
        while interleaved.len() < 2 * wman::NCBPS {
            let tick = pipeline.tick(Some(block[next_bit % wman::BLOCK_LEN]), true);
            if tick.accepted {
                next_bit += 1;
            }
            scrambled.extend_from_slice(tick.taps.scrambled.bits());
            coded.extend_from_slice(tick.taps.coded.bits());
            interleaved.extend_from_slice(tick.taps.interleaved.bits());
        }
        assert_eq!(
            utils::hex_from_bits(&scrambled[.. wman::BLOCK_LEN]),
            "558AC4A53A1724E163AC2BF9"
        );
        assert_eq!(
            utils::hex_from_bits(&coded[.. wman::NCBPS]),
            "2833E48D392026D5B6DC5E4AF47ADD29494B6C89151348CA"
        );
        assert!(interleaved[.. wman::NCBPS].iter().all(|&bit| bit == Bit::Zero));
        assert_eq!(
            utils::hex_from_bits(&interleaved[wman::NCBPS .. 2 * wman::NCBPS]),
            GOLDEN_INTERLEAVED
        );
    }

    #[test]
    fn test_rate() {
        let num_blocks = 6;
        let bits = utils::random_bits(num_blocks * wman::BLOCK_LEN);
        let mut pipeline = default_pipeline();
        let syms = run_and_flush(&mut pipeline, &bits);
        let status = pipeline.status();
        // One symbol per information bit, with the last block held back by the interleaver and
        // replaced by the start-up transient
        assert_eq!(syms.len(), num_blocks * wman::BLOCK_LEN);
        assert_eq!(status.num_symbols_emitted, syms.len() as u64);
        assert_eq!(status.num_bits_accepted, (num_blocks * wman::BLOCK_LEN) as u64);
        assert_eq!(status.num_blocks_encoded, num_blocks as u64);
        assert_eq!(status.num_bank_swaps, num_blocks as u64);
        // Nothing stalls when downstream is always ready
        assert_eq!(status.num_input_stall_ticks, 0);
        assert_eq!(status.num_output_stall_ticks, 0);
    }

    #[test]
    fn test_random_data_matches_block_reference() {
        let blocks: Vec<Vec<Bit>> = (0 .. 5).map(|_| utils::random_bits(wman::BLOCK_LEN)).collect();
        let mut pipeline = default_pipeline();
        let syms = run_and_flush(&mut pipeline, &blocks.concat());
        assert_eq!(syms[wman::BLOCK_LEN ..], reference_symbols(&blocks[.. 4]));
    }

    #[test]
    fn test_determinism() {
        let bits = utils::random_bits(7 * wman::BLOCK_LEN + 31);
        let first = default_pipeline().run(&bits);
        let second = default_pipeline().run(&bits);
        assert_eq!(first, second);
    }

    #[test]
    fn test_back_pressure() {
        let mut rng = StdRng::seed_from_u64(7);
        let bits = utils::random_bits(6 * wman::BLOCK_LEN);
        let unstalled = run_with_stalls(&bits, 1.0, 1.0, &mut rng);
        assert_eq!(unstalled.len(), bits.len());
        for (input_valid_prob, downstream_ready_prob) in [(1.0, 0.3), (0.4, 1.0), (0.7, 0.5)] {
            let stalled = run_with_stalls(&bits, input_valid_prob, downstream_ready_prob, &mut rng);
            assert_eq!(stalled, unstalled);
        }
    }

    #[test]
    fn test_long_downstream_stall() {
        let bits = utils::random_bits(4 * wman::BLOCK_LEN);
        let expected = run_and_flush(&mut default_pipeline(), &bits);
        let mut pipeline = default_pipeline();
        let mut syms = Vec::new();
        let mut next_bit = 0;
        let mut num_ticks = 0;
        while next_bit < bits.len() {
            // Downstream stops for a long stretch in the middle
            let downstream_ready = !(150 .. 1000).contains(&num_ticks);
            let tick = pipeline.tick(Some(bits[next_bit]), downstream_ready);
            if tick.accepted {
                next_bit += 1;
            }
            syms.extend(tick.symbol);
            num_ticks += 1;
        }
        assert!(pipeline.status().num_input_stall_ticks > 0);
        assert!(pipeline.status().num_output_stall_ticks > 0);
        flush(&mut pipeline, &mut syms);
        assert_eq!(syms, expected);
    }

    #[test]
    fn test_enable() {
        let mut pipeline = default_pipeline();
        pipeline.set_enabled(false);
        assert!(!pipeline.is_ready());
        let tick = pipeline.tick(Some(Bit::One), true);
        assert!(!tick.accepted);
        assert_eq!(pipeline.status().num_input_stall_ticks, 1);
        pipeline.set_enabled(true);
        assert!(pipeline.tick(Some(Bit::One), true).accepted);
    }

    #[test]
    fn test_load_and_reset() {
        let block = utils::bits_from_hex(GOLDEN_INPUT).unwrap();
        let mut pipeline = default_pipeline();
        pipeline.run(&block[.. 40]);
        pipeline.reset();
        assert_eq!(pipeline, default_pipeline());
        // Re-seeding at a block boundary changes nothing
        pipeline.load();
        assert_eq!(pipeline, default_pipeline());
    }

    #[test]
    fn test_stage_interface() {
        let block = utils::bits_from_hex(GOLDEN_INPUT).unwrap();
        let mut pipeline = default_pipeline();
        let mut syms = Vec::new();
        for &bit in &block.repeat(4) {
            while !pipeline.is_ready() {
                syms.extend(pipeline.pop());
            }
            assert!(pipeline.push(bit));
        }
        let golden = modulate(&utils::bits_from_hex(GOLDEN_INTERLEAVED).unwrap()).unwrap();
        assert!(syms.len() >= 2 * wman::BLOCK_LEN);
        assert_eq!(syms[wman::BLOCK_LEN .. 2 * wman::BLOCK_LEN], golden);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not ready")]
    fn test_push_when_disabled() {
        let mut pipeline = default_pipeline();
        pipeline.set_enabled(false);
        pipeline.push(Bit::One);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_push_when_not_ready_is_rejected() {
        // Disabled
        let mut pipeline = default_pipeline();
        pipeline.set_enabled(false);
        let before = pipeline.clone();
        assert!(!pipeline.push(Bit::One));
        assert_eq!(pipeline, before);
        // Randomizer output not yet taken by the encoder
        pipeline.set_enabled(true);
        assert!(pipeline.push(Bit::One));
        let before = pipeline.clone();
        assert!(!pipeline.push(Bit::Zero));
        assert_eq!(pipeline, before);
        assert_eq!(pipeline.status().num_bits_accepted, 1);
    }
}
