// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Squares developer CLI: plan a reconfiguration, verify a grid, replay a
//! schedule.
//!
//! Exit codes: 0 done, 1 stall, 2 invalid configuration, 3 unequal module
//! counts.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use squares_core::{Environment, PhaseResult, PlanError, Planner, Schedule};

/// Exit code for a completed plan or a passing check.
const EXIT_DONE: u8 = 0;
/// Exit code for a planner stall.
const EXIT_STALL: u8 = 1;
/// Exit code for a malformed or disconnected configuration.
const EXIT_INVALID_CONFIG: u8 = 2;
/// Exit code for mismatched start/goal module counts.
const EXIT_UNEQUAL_COUNT: u8 = 3;

#[derive(Parser)]
#[command(name = "squares-cli", version, about = "Sliding-squares reconfiguration planner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan a reconfiguration from a start grid to a goal grid.
    Plan {
        /// Path to the start configuration grid.
        start: PathBuf,
        /// Path to the goal configuration grid.
        goal: PathBuf,
        /// Write the schedule as JSON to this path.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Give up after this many ticks.
        #[arg(long, default_value_t = 100_000)]
        max_ticks: u64,
        /// Print a schedule summary table.
        #[arg(long)]
        stats: bool,
    },
    /// Check that a grid file parses and is 4-connected.
    Verify {
        /// Path to the configuration grid.
        file: PathBuf,
    },
    /// Re-apply a JSON schedule to a start grid and print the result.
    Replay {
        /// Path to the start configuration grid.
        start: PathBuf,
        /// Path to the JSON schedule.
        schedule: PathBuf,
        /// Optional goal grid the final configuration must match.
        #[arg(long)]
        expect: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run(&Cli::parse()) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_INVALID_CONFIG)
        }
    }
}

fn run(cli: &Cli) -> Result<u8> {
    match &cli.command {
        Command::Plan {
            start,
            goal,
            out,
            max_ticks,
            stats,
        } => plan(start, goal, out.as_deref(), *max_ticks, *stats),
        Command::Verify { file } => verify(file),
        Command::Replay {
            start,
            schedule,
            expect,
        } => replay(start, schedule, expect.as_deref()),
    }
}

fn read(path: &std::path::Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn plan(
    start: &std::path::Path,
    goal: &std::path::Path,
    out: Option<&std::path::Path>,
    max_ticks: u64,
    stats: bool,
) -> Result<u8> {
    let start_text = read(start)?;
    let goal_text = read(goal)?;
    let mut planner = match Planner::from_grids(&start_text, &goal_text) {
        Ok(planner) => planner,
        Err(err @ PlanError::UnequalCount { .. }) => {
            eprintln!("error: {err}");
            return Ok(EXIT_UNEQUAL_COUNT);
        }
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(EXIT_INVALID_CONFIG);
        }
    };

    let mut outcome = PhaseResult::InProgress;
    for _ in 0..max_ticks {
        outcome = planner.execute_step();
        match outcome {
            PhaseResult::Done | PhaseResult::Stall(_) => break,
            PhaseResult::InProgress | PhaseResult::PhaseAdvanced => {}
        }
    }

    let schedule = planner.schedule();
    if let Some(path) = out {
        let json = serde_json::to_string_pretty(schedule).context("serializing schedule")?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }
    if stats {
        print_stats(schedule);
    }

    match outcome {
        PhaseResult::Done => {
            println!("done: {} steps, {} ticks", schedule.len(), planner.tick());
            Ok(EXIT_DONE)
        }
        PhaseResult::Stall(reason) => {
            eprintln!("{reason}");
            Ok(EXIT_STALL)
        }
        PhaseResult::InProgress | PhaseResult::PhaseAdvanced => {
            eprintln!("stalled: max ticks reached in {}", planner.phase_id());
            Ok(EXIT_STALL)
        }
    }
}

fn verify(file: &std::path::Path) -> Result<u8> {
    let text = read(file)?;
    match Environment::from_grid(&text) {
        Ok(env) => {
            println!(
                "ok: {} modules, perimeter {}",
                env.len(),
                env.perimeter()
            );
            Ok(EXIT_DONE)
        }
        Err(err) => {
            eprintln!("invalid: {err}");
            Ok(EXIT_INVALID_CONFIG)
        }
    }
}

fn replay(
    start: &std::path::Path,
    schedule_path: &std::path::Path,
    expect: Option<&std::path::Path>,
) -> Result<u8> {
    let start_text = read(start)?;
    let mut env = match Environment::from_grid(&start_text) {
        Ok(env) => env,
        Err(err) => {
            eprintln!("invalid: {err}");
            return Ok(EXIT_INVALID_CONFIG);
        }
    };
    let schedule_json = read(schedule_path)?;
    let schedule: Schedule =
        serde_json::from_str(&schedule_json).context("parsing schedule JSON")?;

    if let Err(err) = schedule.replay(&mut env) {
        eprintln!("replay rejected: {err}");
        return Ok(EXIT_STALL);
    }
    print!("{}", env.render());

    if let Some(goal_path) = expect {
        let goal_text = read(goal_path)?;
        let goal = match Environment::from_grid(&goal_text) {
            Ok(goal_env) => goal_env.snapshot(),
            Err(err) => {
                eprintln!("invalid: {err}");
                return Ok(EXIT_INVALID_CONFIG);
            }
        };
        if env.snapshot() != goal {
            eprintln!("final configuration does not match the expected goal");
            return Ok(EXIT_STALL);
        }
        println!("matches expected goal");
    }
    Ok(EXIT_DONE)
}

fn print_stats(schedule: &Schedule) {
    let stats = schedule.stats();
    let mut table = Table::new();
    table
        .set_header(vec!["metric", "value"])
        .add_row(vec!["makespan".to_string(), stats.makespan.to_string()])
        .add_row(vec!["total moves".to_string(), stats.total_moves.to_string()])
        .add_row(vec!["parallelism".to_string(), format!("{:.2}", stats.parallelism)]);
    println!("{table}");
}
