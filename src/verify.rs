//! Golden-vector self-check of the transmit chain
//!
//! The reference block from the WirelessMAN OFDM PHY test vectors is pushed through the chain
//! repeatedly, under random stalls on both the input and the output side, while a
//! [`GoldenVerifier`] compares the debug taps and the output symbols block by block against the
//! expected randomizer, encoder, interleaver and mapper outputs. Several checks can be run in
//! parallel, and their reports are saved to a JSON file.

use std::fs::File;
use std::io::BufWriter;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{modulate, utils, Bit, Error, Pipeline, PipelineStatus, Symbol, Tick, TxParams};

/// Information bits of the reference block
pub const GOLDEN_INPUT: &str = "ACBCD2114DAE1577C6DBF4C9";

/// Randomizer output for the reference block
pub const GOLDEN_SCRAMBLED: &str = "558AC4A53A1724E163AC2BF9";

/// Encoder output for the reference block
pub const GOLDEN_CODED: &str = "2833E48D392026D5B6DC5E4AF47ADD29494B6C89151348CA";

/// Interleaver output for the reference block
pub const GOLDEN_INTERLEAVED: &str = "4B047DFA42F2A5D5F61C021A5851E9A309A24FD58086BD1E";

/// Expected stage outputs for the reference block
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct GoldenVectors {
    /// Information bits
    pub input: Vec<Bit>,
    /// Randomizer output
    pub scrambled: Vec<Bit>,
    /// Encoder output
    pub coded: Vec<Bit>,
    /// Interleaver output
    pub interleaved: Vec<Bit>,
    /// Mapper output
    pub symbols: Vec<Symbol>,
}

impl GoldenVectors {
    /// Returns expected stage outputs for the reference block.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the reference hexadecimal strings cannot be parsed.
    ///
    /// # Examples
    ///
    /// ```
    /// use wmantx::verify::GoldenVectors;
    ///
    /// let golden = GoldenVectors::new()?;
    /// assert_eq!(golden.input.len(), 96);
    /// assert_eq!(golden.symbols.len(), 96);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new() -> Result<Self, Error> {
        let interleaved = utils::bits_from_hex(GOLDEN_INTERLEAVED)?;
        Ok(Self {
            input: utils::bits_from_hex(GOLDEN_INPUT)?,
            scrambled: utils::bits_from_hex(GOLDEN_SCRAMBLED)?,
            coded: utils::bits_from_hex(GOLDEN_CODED)?,
            symbols: modulate(&interleaved)?,
            interleaved,
        })
    }
}

/// Block-by-block comparison results for one stage
#[derive(Clone, Eq, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
pub struct StageReport {
    /// Number of blocks compared against the reference
    pub num_blocks_checked: usize,
    /// Number of compared blocks matching the reference exactly
    pub num_blocks_passed: usize,
    /// Number of start-up transient blocks not compared
    pub num_blocks_skipped: usize,
    /// Total number of mismatching items in compared blocks
    pub num_errors: usize,
}

impl StageReport {
    /// Returns `true` if every compared block matched the reference.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.num_blocks_passed == self.num_blocks_checked
    }
}

/// Collects the items seen at one stage into blocks and compares them against the reference.
#[derive(Clone, Eq, PartialEq, Debug)]
struct BlockChecker<T> {
    /// Name of the stage, for logging
    name: &'static str,
    /// Reference block
    expected: Vec<T>,
    /// Items of the block being collected
    current: Vec<T>,
    /// Number of leading blocks to skip
    num_transient_blocks: usize,
    /// Number of blocks to compare
    num_blocks: usize,
    /// Results so far
    report: StageReport,
}

impl<T: Copy + PartialEq> BlockChecker<T> {
    /// Returns checker for a stage.
    fn new(
        name: &'static str,
        expected: &[T],
        num_transient_blocks: usize,
        num_blocks: usize,
    ) -> Self {
        Self {
            name,
            expected: expected.to_vec(),
            current: Vec::with_capacity(expected.len()),
            num_transient_blocks,
            num_blocks,
            report: StageReport::default(),
        }
    }

    /// Returns `true` once the desired number of blocks has been compared.
    fn is_done(&self) -> bool {
        self.report.num_blocks_checked >= self.num_blocks
    }

    /// Records an item seen at the stage.
    fn observe(&mut self, item: T) {
        if self.is_done() {
            return;
        }
        self.current.push(item);
        if self.current.len() < self.expected.len() {
            return;
        }
        let block_index = self.report.num_blocks_skipped + self.report.num_blocks_checked;
        if block_index < self.num_transient_blocks {
            self.report.num_blocks_skipped += 1;
        } else {
            let num_errors = utils::error_count(&self.current, &self.expected);
            self.report.num_blocks_checked += 1;
            if num_errors == 0 {
                self.report.num_blocks_passed += 1;
            } else {
                self.report.num_errors += num_errors;
                warn!(
                    "{} block {block_index} differs from reference in {num_errors} positions",
                    self.name
                );
            }
        }
        self.current.clear();
    }
}

/// Results of all stage comparisons
#[derive(Clone, Eq, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
pub struct VerifierReport {
    /// Randomizer output
    pub scrambled: StageReport,
    /// Encoder output
    pub coded: StageReport,
    /// Interleaver output
    pub interleaved: StageReport,
    /// Mapper output
    pub symbols: StageReport,
}

impl VerifierReport {
    /// Returns `true` if every compared block of every stage matched the reference.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.scrambled.passed()
            && self.coded.passed()
            && self.interleaved.passed()
            && self.symbols.passed()
    }
}

/// Observer that checks every stage of the chain against the reference block
///
/// The chain must be fed the reference block over and over, starting from reset. The first
/// interleaver and mapper output blocks are the start-up transient, and are skipped.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct GoldenVerifier {
    /// Checker for the randomizer output
    scrambled: BlockChecker<Bit>,
    /// Checker for the encoder output
    coded: BlockChecker<Bit>,
    /// Checker for the interleaver output
    interleaved: BlockChecker<Bit>,
    /// Checker for the mapper output
    symbols: BlockChecker<Symbol>,
}

impl GoldenVerifier {
    /// Returns verifier comparing `num_blocks` blocks at every stage.
    ///
    /// # Examples
    ///
    /// ```
    /// use wmantx::verify::{GoldenVectors, GoldenVerifier};
    /// use wmantx::{Pipeline, TxParams};
    ///
    /// let golden = GoldenVectors::new()?;
    /// let mut verifier = GoldenVerifier::new(&golden, 2);
    /// let mut pipeline = Pipeline::new(TxParams::default())?;
    /// let mut next_bit = 0;
    /// while !verifier.is_done() {
    ///     let tick = pipeline.tick(Some(golden.input[next_bit % 96]), true);
    ///     if tick.accepted {
    ///         next_bit += 1;
    ///     }
    ///     verifier.observe(&tick);
    /// }
    /// assert!(verifier.passed());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[must_use]
    pub fn new(golden: &GoldenVectors, num_blocks: usize) -> Self {
        Self {
            scrambled: BlockChecker::new("Randomizer", &golden.scrambled, 0, num_blocks),
            coded: BlockChecker::new("Encoder", &golden.coded, 0, num_blocks),
            interleaved: BlockChecker::new("Interleaver", &golden.interleaved, 1, num_blocks),
            symbols: BlockChecker::new("Mapper", &golden.symbols, 1, num_blocks),
        }
    }

    /// Records the taps and the output symbol of one tick.
    pub fn observe(&mut self, tick: &Tick) {
        for &bit in tick.taps.scrambled.bits() {
            self.scrambled.observe(bit);
        }
        for &bit in tick.taps.coded.bits() {
            self.coded.observe(bit);
        }
        for &bit in tick.taps.interleaved.bits() {
            self.interleaved.observe(bit);
        }
        if let Some(sym) = tick.symbol {
            self.symbols.observe(sym);
        }
    }

    /// Returns `true` once the desired number of blocks has been compared at every stage.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.scrambled.is_done()
            && self.coded.is_done()
            && self.interleaved.is_done()
            && self.symbols.is_done()
    }

    /// Returns `true` if no mismatch has been seen so far.
    ///
    /// Once a mismatch is seen, this stays `false`.
    #[must_use]
    pub fn no_mismatch_so_far(&self) -> bool {
        self.report().passed()
    }

    /// Returns `true` if all desired blocks have been compared and all of them matched.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.is_done() && self.no_mismatch_so_far()
    }

    /// Returns results of all stage comparisons so far.
    #[must_use]
    pub fn report(&self) -> VerifierReport {
        VerifierReport {
            scrambled: self.scrambled.report,
            coded: self.coded.report,
            interleaved: self.interleaved.report,
            symbols: self.symbols.report,
        }
    }
}

/// Parameters for a golden-vector check under random stalls
#[derive(Clone, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub struct CheckParams {
    /// Number of blocks to compare at every stage
    pub num_blocks: usize,
    /// Probability that an input bit is offered on a tick
    pub input_valid_prob: f64,
    /// Probability that the downstream consumer is ready on a tick
    pub downstream_ready_prob: f64,
    /// Seed for the random stall pattern
    pub rng_seed: u64,
    /// Maximum number of ticks before the check gives up
    pub max_ticks: u64,
}

impl Default for CheckParams {
    fn default() -> Self {
        Self {
            num_blocks: 20,
            input_valid_prob: 1.0,
            downstream_ready_prob: 1.0,
            rng_seed: 0,
            max_ticks: 1_000_000,
        }
    }
}

/// Results of a golden-vector check
#[derive(Clone, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub struct CheckReport {
    /// Parameters of the check
    pub params: CheckParams,
    /// Results of all stage comparisons
    pub stages: VerifierReport,
    /// Chain counters at the end of the check
    pub status: PipelineStatus,
    /// Whether all desired blocks were compared at every stage and all of them matched
    pub passed: bool,
}

impl std::fmt::Display for CheckReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "seed {:>3}, P(input) {:.2}, P(ready) {:.2}: {} ({} mapper blocks matched, {} ticks)",
            self.params.rng_seed,
            self.params.input_valid_prob,
            self.params.downstream_ready_prob,
            if self.passed { "PASS" } else { "FAIL" },
            self.stages.symbols.num_blocks_passed,
            self.status.num_ticks,
        )
    }
}

/// Runs a golden-vector check, and returns its results.
///
/// # Errors
///
/// Returns an error if `params` is invalid.
///
/// # Examples
///
/// ```
/// use wmantx::verify::{self, CheckParams};
///
/// let params = CheckParams {
///     num_blocks: 3,
///     downstream_ready_prob: 0.5,
///     ..CheckParams::default()
/// };
/// let report = verify::run_golden_check(&params)?;
/// assert!(report.passed);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn run_golden_check(params: &CheckParams) -> Result<CheckReport, Error> {
    check_params(params)?;
    let golden = GoldenVectors::new()?;
    let mut pipeline = Pipeline::new(TxParams::default())?;
    let mut verifier = GoldenVerifier::new(&golden, params.num_blocks);
    let mut rng = StdRng::seed_from_u64(params.rng_seed);
    let mut next_bit = 0;
    while !verifier.is_done() && pipeline.status().num_ticks < params.max_ticks {
        let input = rng
            .random_bool(params.input_valid_prob)
            .then_some(golden.input[next_bit % golden.input.len()]);
        let tick = pipeline.tick(input, rng.random_bool(params.downstream_ready_prob));
        if tick.accepted {
            next_bit += 1;
        }
        verifier.observe(&tick);
    }
    if !verifier.is_done() {
        warn!(
            "Golden check with seed {} ran out of ticks after {} ticks",
            params.rng_seed, params.max_ticks
        );
    }
    let report = CheckReport {
        params: *params,
        stages: verifier.report(),
        status: pipeline.status(),
        passed: verifier.passed(),
    };
    info!("Golden check done: {report}");
    Ok(report)
}

/// Runs golden-vector checks in parallel, and saves their results to a JSON file.
///
/// # Parameters
///
/// - `all_params`: Parameters for each check.
///
/// - `json_filename`: Name of the JSON file to which results must be saved.
///
/// # Errors
///
/// Returns an error if any parameters are invalid, or if the results cannot be saved.
pub fn run_golden_checks(
    all_params: &[CheckParams],
    json_filename: &str,
) -> Result<Vec<CheckReport>, Error> {
    let all_reports = all_params
        .par_iter()
        .map(run_golden_check)
        .collect::<Result<Vec<CheckReport>, Error>>()?;
    save_all_reports_to_file(&all_reports, json_filename)?;
    Ok(all_reports)
}

/// Saves results of golden-vector checks to a JSON file.
fn save_all_reports_to_file(
    all_reports: &[CheckReport],
    json_filename: &str,
) -> Result<(), Error> {
    let writer = BufWriter::new(File::create(json_filename)?);
    serde_json::to_writer_pretty(writer, all_reports)?;
    info!("Saved {} check reports to {json_filename}", all_reports.len());
    Ok(())
}

/// Checks validity of check parameters.
fn check_params(params: &CheckParams) -> Result<(), Error> {
    if params.num_blocks == 0 {
        return Err(Error::InvalidInput(
            "Number of blocks to check cannot be zero".to_string(),
        ));
    }
    for (name, prob) in [
        ("input", params.input_valid_prob),
        ("downstream ready", params.downstream_ready_prob),
    ] {
        if !(prob > 0.0 && prob <= 1.0) {
            return Err(Error::InvalidInput(format!(
                "Probability of {name} must be in (0, 1] (found {prob})"
            )));
        }
    }
    if params.max_ticks == 0 {
        return Err(Error::InvalidInput(
            "Maximum number of ticks cannot be zero".to_string(),
        ));
    }
    Ok(())
}



#[cfg(test)]
mod tests_of_functions {
    use super::*;

    #[test]
    fn test_run_golden_check() {
        for (input_valid_prob, downstream_ready_prob) in [(1.0, 1.0), (0.6, 1.0), (1.0, 0.4)] {
            let params = CheckParams {
                num_blocks: 4,
                input_valid_prob,
                downstream_ready_prob,
                rng_seed: 11,
                ..CheckParams::default()
            };
            let report = run_golden_check(&params).unwrap();
            assert!(report.passed);
            assert_eq!(report.stages.symbols.num_blocks_checked, 4);
            assert_eq!(report.params, params);
        }
    }

    #[test]
    fn test_run_golden_check_out_of_ticks() {
        let params = CheckParams {
            max_ticks: 100,
            ..CheckParams::default()
        };
        let report = run_golden_check(&params).unwrap();
        assert!(!report.passed);
        assert_eq!(report.status.num_ticks, 100);
        assert_eq!(report.stages.symbols.num_blocks_checked, 0);
    }

    #[test]
    fn test_run_golden_checks() {
        let all_params: Vec<CheckParams> = (0 .. 3)
            .map(|rng_seed| CheckParams {
                num_blocks: 2,
                downstream_ready_prob: 0.5,
                rng_seed,
                ..CheckParams::default()
            })
            .collect();
        let json_path = std::env::temp_dir().join("wmantx_test_run_golden_checks.json");
        let json_filename = json_path.to_str().unwrap();
        let all_reports = run_golden_checks(&all_params, json_filename).unwrap();
        assert_eq!(all_reports.len(), 3);
        assert!(all_reports.iter().all(|report| report.passed));
        let saved: Vec<CheckReport> =
            serde_json::from_reader(File::open(json_filename).unwrap()).unwrap();
        assert_eq!(saved, all_reports);
        std::fs::remove_file(json_filename).unwrap();
        // Invalid parameters
        let all_params = [CheckParams {
            num_blocks: 0,
            ..CheckParams::default()
        }];
        assert!(run_golden_checks(&all_params, json_filename).is_err());
    }

    #[test]
    fn test_check_params() {
        assert!(check_params(&CheckParams::default()).is_ok());
        let invalid = [
            CheckParams {
                num_blocks: 0,
                ..CheckParams::default()
            },
            CheckParams {
                input_valid_prob: 0.0,
                ..CheckParams::default()
            },
            CheckParams {
                downstream_ready_prob: 1.5,
                ..CheckParams::default()
            },
            CheckParams {
                downstream_ready_prob: f64::NAN,
                ..CheckParams::default()
            },
            CheckParams {
                max_ticks: 0,
                ..CheckParams::default()
            },
        ];
        for params in invalid {
            assert!(check_params(&params).is_err());
        }
    }

    #[test]
    fn test_display() {
        let report = CheckReport {
            params: CheckParams::default(),
            stages: VerifierReport::default(),
            status: PipelineStatus::default(),
            passed: true,
        };
        assert_eq!(
            report.to_string(),
            "seed   0, P(input) 1.00, P(ready) 1.00: PASS (0 mapper blocks matched, 0 ticks)"
        );
    }
}
