//! Command line driver for the nougat simulator.
//!
//! Assembles one or more warrior files, runs rounds, and prints scores.
//! Exit codes: 0 on a clean run, 1 when a warrior fails to assemble or
//! load, 2 for usage and I/O problems.

#![deny(clippy::all)]
#![warn(clippy::pedantic, clippy::nursery)]

use std::{env, fs, process::ExitCode};

use nougat_core::{
    Mars, MarsConfig, Outcome, RecordingTracer, Tracer,
};
use redcode::Program;

/// Usage text printed for `--help` and flag errors
const USAGE: &str = "usage: nougat [options] <warrior.red>...

options:
  --core-size <n>   cells in the core             (default 8000)
  --cycles <n>      cycles before a draw          (default 80000)
  --processes <n>   per-warrior process cap       (default 8000)
  --length <n>      max instructions per warrior  (default 100)
  --distance <n>    min separation between bases  (default 100)
  --rounds <n>      rounds to play                (default 1)
  --seed <n>        placement seed                (default 0)
  --trace <path>    write the last round's trace CSV to <path>
  --help            print this help";

/// Everything parsed from the command line
struct Options {
    /// Warrior source paths, in load order
    files: Vec<String>,
    /// Round configuration assembled from the flags
    config: MarsConfig,
    /// Number of rounds to play
    rounds: u32,
    /// Base placement seed; round `r` uses `seed + r`
    seed: u64,
    /// Where to write the final round's trace CSV
    trace: Option<String>,
}

/// A fatal CLI error carrying its exit code
struct CliError {
    /// Message for stderr
    message: String,
    /// Process exit code
    code: u8,
}

impl CliError {
    /// An assembly or load failure: exit code 1
    fn parse(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: 1,
        }
    }

    /// A usage or I/O failure: exit code 2
    fn other(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: 2,
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if err.code == 0 {
                println!("{}", err.message);
            } else {
                eprintln!("nougat: {}", err.message);
            }
            ExitCode::from(err.code)
        }
    }
}

/// Parse arguments, assemble warriors, play the rounds, print scores
fn run() -> Result<(), CliError> {
    let options = parse_args(env::args().skip(1))?;

    let mut programs = Vec::with_capacity(options.files.len());
    for path in &options.files {
        let source = fs::read_to_string(path).map_err(|err| {
            CliError::other(format!("cannot read {path}: {err}"))
        })?;
        let program =
            redcode_asm::assemble(path, &source).map_err(|err| {
                CliError::parse(err.render(&source))
            })?;
        programs.push(program);
    }

    let refs: Vec<&Program> = programs.iter().collect();
    let mut wins = vec![0_u32; programs.len()];
    let mut ties = vec![0_u32; programs.len()];
    let mut final_trace: Option<String> = None;

    for round in 0..options.rounds {
        let mut mars = Mars::new(options.config.clone())
            .map_err(|err| CliError::other(err.to_string()))?;
        let last_round = round + 1 == options.rounds;
        if options.trace.is_some() && last_round {
            mars.set_tracer(Tracer::Recording(RecordingTracer::default()));
        }
        let pids = mars
            .place_and_load(&refs, options.seed.wrapping_add(round.into()))
            .map_err(|err| CliError::parse(err.to_string()))?;
        let result = mars.run();

        match &result.outcome {
            Outcome::Win { pid } => {
                if let Some(index) = pids.iter().position(|p| p == pid) {
                    wins[index] += 1;
                }
            }
            Outcome::Draw { survivors } => {
                for pid in survivors {
                    if let Some(index) =
                        pids.iter().position(|p| p == pid)
                    {
                        ties[index] += 1;
                    }
                }
            }
        }
        println!(
            "round {}: {} after {} cycles",
            round + 1,
            describe(&result.outcome, &mars),
            result.cycles
        );
        if last_round {
            if let Tracer::Recording(recording) = mars.tracer() {
                final_trace = Some(recording.export_csv());
            }
        }
    }

    println!();
    for (index, path) in options.files.iter().enumerate() {
        let name = programs[index]
            .metadata
            .name
            .as_deref()
            .unwrap_or(path.as_str());
        println!(
            "{name}: {} wins, {} ties, {} losses",
            wins[index],
            ties[index],
            options.rounds - wins[index] - ties[index]
        );
    }

    if let (Some(path), Some(csv)) = (&options.trace, final_trace) {
        fs::write(path, csv).map_err(|err| {
            CliError::other(format!("cannot write {path}: {err}"))
        })?;
    }
    Ok(())
}

/// Render an outcome with warrior names
fn describe(outcome: &Outcome, mars: &Mars) -> String {
    match outcome {
        Outcome::Win { pid } => format!(
            "{} wins",
            mars.warrior_name(*pid).unwrap_or("unknown warrior")
        ),
        Outcome::Draw { survivors } if survivors.is_empty() => {
            "all warriors died".to_owned()
        }
        Outcome::Draw { .. } => "draw".to_owned(),
    }
}

/// Parse flags and warrior paths
fn parse_args(
    args: impl Iterator<Item = String>,
) -> Result<Options, CliError> {
    let mut options = Options {
        files: Vec::new(),
        config: MarsConfig::default(),
        rounds: 1,
        seed: 0,
        trace: None,
    };
    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                return Err(CliError {
                    message: USAGE.to_owned(),
                    code: 0,
                })
            }
            "--core-size" => {
                options.config.core_size = numeric(&arg, args.next())?;
                options.config.read_limit = options.config.core_size;
                options.config.write_limit = options.config.core_size;
            }
            "--cycles" => {
                options.config.max_cycles = numeric(&arg, args.next())?;
            }
            "--processes" => {
                options.config.max_processes =
                    numeric(&arg, args.next())?;
            }
            "--length" => {
                options.config.max_length = numeric(&arg, args.next())?;
            }
            "--distance" => {
                options.config.min_distance = numeric(&arg, args.next())?;
            }
            "--rounds" => options.rounds = numeric(&arg, args.next())?,
            "--seed" => options.seed = numeric(&arg, args.next())?,
            "--trace" => {
                options.trace = Some(args.next().ok_or_else(|| {
                    CliError::other("--trace needs a path")
                })?);
            }
            flag if flag.starts_with('-') => {
                return Err(CliError::other(format!(
                    "unknown flag {flag}\n{USAGE}"
                )))
            }
            _ => options.files.push(arg),
        }
    }
    if options.files.is_empty() {
        return Err(CliError::other(format!(
            "no warrior files given\n{USAGE}"
        )));
    }
    if options.rounds == 0 {
        return Err(CliError::other("--rounds must be at least 1"));
    }
    Ok(options)
}

/// Parse a flag's numeric argument
fn numeric<T: std::str::FromStr>(
    flag: &str,
    value: Option<String>,
) -> Result<T, CliError> {
    value
        .as_deref()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| {
            CliError::other(format!("{flag} needs a numeric argument"))
        })
}
