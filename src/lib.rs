//! This crate implements the channel-coding and mapping chain of a WirelessMAN (IEEE 802.16)
//! OFDM transmitter. Information bits are whitened by a randomizer that is re-seeded every block,
//! encoded by a rate-1/2 tail-biting convolutional encoder with generators `171` and `133`
//! (octal), permuted by a block interleaver with two alternating storage banks, and mapped onto
//! Gray-coded QPSK symbols with Q15 fixed-point components.
//!
//! Each stage is available both as a block-level function and as a streaming [`Stage`] with
//! ready/valid back-pressure on both sides; the [`Pipeline`] composes the streaming stages into a
//! single chain that advances in lock-step ticks. The [`verify`] module checks the chain against
//! the reference test vectors.
//!
//! # Examples
//!
//! ```
//! use wmantx::{utils, Pipeline, TxParams};
//!
//! let mut pipeline = Pipeline::new(TxParams::default())?;
//! let bits = utils::random_bits(3 * 96);
//! let syms = pipeline.run(&bits);
//! // The first block of symbols is the interleaver start-up transient
//! assert!(syms.len() >= 96);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(
    clippy::complexity,
    clippy::pedantic,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_allocation,
    unused_import_braces,
    unused_qualifications
)]

mod common;
mod encoder;
mod interleaver;
mod modulator;
pub mod pipeline;
mod scrambler;
mod stream;
pub mod utils;
pub mod verify;
pub mod wman;

pub use common::{Bit, Error};
pub use encoder::{encode_tail_biting, ConvEncoder};
pub use interleaver::{Bank, Interleaver, PingPongInterleaver};
pub use modulator::{modulate, Modulator, Symbol, QPSK_AMPLITUDE};
pub use pipeline::{Pipeline, PipelineStatus, Taps, Tick, TxParams};
pub use scrambler::{scramble, Scrambler};
pub use stream::{Stage, Tap, TAP_CAPACITY};
