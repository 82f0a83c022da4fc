//! This crate checks a WirelessMAN OFDM transmit chain (randomizer, tail-biting convolutional
//! encoder, ping-pong interleaver and QPSK mapper) against the reference test vectors, with random
//! stalls on both its input and its output. Check parameters are specified on the command line,
//! and check results are saved to a JSON file.
//!
//! Build the executable with `cargo build --release` and then run `./target/release/wmantx -h` for
//! help on the command-line interface. Set `RUST_LOG=debug` to follow bank swaps and encoder lane
//! hand-offs.

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

use anyhow::{bail, Result};
use clap::{crate_name, crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use std::time::Instant;
use wmantx::verify::{self, CheckParams};

/// Main function
fn main() -> Result<()> {
    env_logger::init();
    let timer = Instant::now();
    let matches = command_line_parser().get_matches();
    let json_filename = &json_filename_from_matches(&matches);
    let all_reports = verify::run_golden_checks(&all_check_params(&matches), json_filename)?;
    for report in &all_reports {
        println!("{report}");
    }
    eprintln!("Elapsed time: {:.3?}", timer.elapsed());
    let num_failed = all_reports.iter().filter(|report| !report.passed).count();
    if num_failed > 0 {
        bail!("{num_failed} of {} golden checks failed", all_reports.len());
    }
    Ok(())
}

/// Returns command line parser.
fn command_line_parser() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about("Checks the WirelessMAN OFDM transmit chain against reference test vectors")
        .arg(num_blocks())
        .arg(downstream_ready_prob())
        .arg(input_valid_prob())
        .arg(first_rng_seed())
        .arg(num_seeds())
        .arg(max_ticks())
        .arg(json_filename())
}

/// Returns argument for number of blocks to be checked.
fn num_blocks() -> Arg {
    Arg::new("num_blocks")
        .short('n')
        .value_parser(value_parser!(usize))
        .default_value("20")
        .help("Number of blocks to be checked at every stage")
}

/// Returns argument for probabilities of downstream being ready.
fn downstream_ready_prob() -> Arg {
    Arg::new("downstream_ready_prob")
        .short('p')
        .value_parser(value_parser!(f64))
        .action(ArgAction::Append)
        .num_args(1 ..)
        .default_values(["1.0", "0.5", "0.1"])
        .help("Probabilities that downstream is ready on a tick")
}

/// Returns argument for probability of input being offered.
fn input_valid_prob() -> Arg {
    Arg::new("input_valid_prob")
        .short('i')
        .value_parser(value_parser!(f64))
        .default_value("1.0")
        .help("Probability that an input bit is offered on a tick")
}

/// Returns argument for first seed of random stall patterns.
fn first_rng_seed() -> Arg {
    Arg::new("first_rng_seed")
        .short('r')
        .value_parser(value_parser!(u64))
        .default_value("0")
        .help("First seed for random stall patterns")
}

/// Returns argument for number of seeds per probability.
fn num_seeds() -> Arg {
    Arg::new("num_seeds")
        .short('s')
        .value_parser(value_parser!(u64))
        .default_value("4")
        .help("Number of stall patterns per downstream-ready probability")
}

/// Returns argument for maximum number of ticks per check.
fn max_ticks() -> Arg {
    Arg::new("max_ticks")
        .short('x')
        .value_parser(value_parser!(u64))
        .default_value("1000000")
        .help("Maximum number of ticks per check")
}

/// Returns argument for name of JSON file to which results must be saved.
fn json_filename() -> Arg {
    Arg::new("json_filename")
        .short('f')
        .default_value("results.json")
        .help("Name of JSON file to which results must be saved")
}

/// Returns check parameters based on command-line arguments.
fn all_check_params(matches: &ArgMatches) -> Vec<CheckParams> {
    let first_rng_seed = first_rng_seed_from_matches(matches);
    let mut all_params = Vec::new();
    for downstream_ready_prob in all_downstream_ready_probs_from_matches(matches) {
        // Seeds stop at `u64::MAX` rather than wrapping around
        let all_rng_seeds = (0 .. num_seeds_from_matches(matches))
            .map_while(|offset| first_rng_seed.checked_add(offset));
        for rng_seed in all_rng_seeds {
            all_params.push(CheckParams {
                num_blocks: num_blocks_from_matches(matches),
                input_valid_prob: input_valid_prob_from_matches(matches),
                downstream_ready_prob,
                rng_seed,
                max_ticks: max_ticks_from_matches(matches),
            });
        }
    }
    // OK to unwrap: All command-line arguments have default values, so an error cannot occur
    // in any of the associated functions called above.
    all_params
}

/// Returns number of blocks to be checked.
fn num_blocks_from_matches(matches: &ArgMatches) -> usize {
    *matches.get_one("num_blocks").unwrap()
}

/// Returns all probabilities of downstream being ready.
fn all_downstream_ready_probs_from_matches(matches: &ArgMatches) -> Vec<f64> {
    matches
        .get_many::<f64>("downstream_ready_prob")
        .unwrap()
        .copied()
        .collect()
}

/// Returns probability of input being offered.
fn input_valid_prob_from_matches(matches: &ArgMatches) -> f64 {
    *matches.get_one("input_valid_prob").unwrap()
}

/// Returns first seed of random stall patterns.
fn first_rng_seed_from_matches(matches: &ArgMatches) -> u64 {
    *matches.get_one("first_rng_seed").unwrap()
}

/// Returns number of seeds per probability.
fn num_seeds_from_matches(matches: &ArgMatches) -> u64 {
    *matches.get_one("num_seeds").unwrap()
}

/// Returns maximum number of ticks per check.
fn max_ticks_from_matches(matches: &ArgMatches) -> u64 {
    *matches.get_one("max_ticks").unwrap()
}

/// Returns name of JSON file to which check results must be saved.
fn json_filename_from_matches(matches: &ArgMatches) -> String {
    matches
        .get_one::<String>("json_filename")
        .unwrap()
        .to_string()
}
