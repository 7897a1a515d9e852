//! Headless Battle Runner
//!
//! Runs one battle (or a seeded batch) between two army lists and prints
//! the result as JSON or a text summary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use wargame_sim::battle::execution::{run_simulation, SimulationResult};
use wargame_sim::core::config::SimulationConfig;
use wargame_sim::core::error::Result;
use wargame_sim::core::types::ArmyTag;
use wargame_sim::data::army_list::ArmyList;

/// Headless Battle Runner - simulate a battle between two army lists
#[derive(Parser, Debug)]
#[command(name = "battle_runner")]
#[command(about = "Simulate a tabletop battle between two army lists")]
struct Args {
    /// Army list JSON for army A
    #[arg(long)]
    army_a: PathBuf,

    /// Army list JSON for army B
    #[arg(long)]
    army_b: PathBuf,

    /// Simulation config TOML
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed (overrides the config)
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    max_rounds: Option<u32>,

    /// Strategy profile name (loaded from data/strategy_profiles/)
    #[arg(long)]
    strategy: Option<String>,

    /// Use beam search with this width
    #[arg(long)]
    beam_width: Option<usize>,

    /// Named terrain layout
    #[arg(long)]
    terrain: Option<String>,

    /// Roll dice instead of using expected damage
    #[arg(long)]
    dice: bool,

    /// Number of battles to run; seeds are seed, seed + 1, ...
    #[arg(long, default_value_t = 1)]
    runs: u32,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// Batch output
#[derive(Serialize)]
struct BatchReport {
    runs: u32,
    wins_a: u32,
    wins_b: u32,
    draws: u32,
    win_rate_a: f32,
    win_rate_b: f32,
    mean_vp_a: f32,
    mean_vp_b: f32,
}

fn build_config(args: &Args) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_toml_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(rounds) = args.max_rounds {
        config.max_rounds = rounds;
    }
    if let Some(strategy) = &args.strategy {
        config.strategy_profile = strategy.clone();
    }
    if let Some(width) = args.beam_width {
        config.use_beam_search = true;
        config.beam_width = width;
    }
    if let Some(layout) = &args.terrain {
        config.terrain_layout = Some(layout.clone());
    }
    if args.dice {
        config.use_dice_rolls = true;
        config.random_charge = true;
    }
    config.validate()?;
    Ok(config)
}

fn print_text(result: &SimulationResult) {
    println!("=== Battle Result ===");
    println!("Rounds played: {}", result.rounds_played);
    println!("End reason: {:?}", result.end_reason);
    match result.winner {
        Some(tag) => println!("Winner: Army {}", tag),
        None => println!("Winner: draw"),
    }
    for (tag, army) in [ArmyTag::A, ArmyTag::B].into_iter().zip(&result.armies) {
        let summary = result.summary.get(tag);
        println!(
            "Army {} ({}): {}/{} units, {} VP, dealt {:.1}, took {:.1}",
            tag,
            army.army_name,
            summary.survivors,
            summary.total_units,
            summary.victory_points,
            summary.damage_dealt,
            summary.damage_taken
        );
    }
    if !result.warnings.is_empty() {
        println!("Warnings:");
        for warning in &result.warnings {
            println!("  {}", warning);
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = build_config(args)?;
    let list_a = ArmyList::from_json_file(&args.army_a)?;
    let list_b = ArmyList::from_json_file(&args.army_b)?;

    if args.runs <= 1 {
        let result = run_simulation(config, &list_a, &list_b)?;
        if args.format == "text" {
            print_text(&result);
        } else {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        return Ok(());
    }

    // One engine per run, each with its own seed
    let results: Vec<SimulationResult> = (0..args.runs)
        .into_par_iter()
        .map(|i| {
            let mut run_config = config.clone();
            run_config.seed = config.seed.wrapping_add(i as u64);
            run_simulation(run_config, &list_a, &list_b)
        })
        .collect::<Result<_>>()?;

    let count = |tag: Option<ArmyTag>| results.iter().filter(|r| r.winner == tag).count() as u32;
    let runs = results.len() as f32;
    let report = BatchReport {
        runs: args.runs,
        wins_a: count(Some(ArmyTag::A)),
        wins_b: count(Some(ArmyTag::B)),
        draws: count(None),
        win_rate_a: count(Some(ArmyTag::A)) as f32 / runs,
        win_rate_b: count(Some(ArmyTag::B)) as f32 / runs,
        mean_vp_a: results.iter().map(|r| r.summary.a.victory_points as f32).sum::<f32>() / runs,
        mean_vp_b: results.iter().map(|r| r.summary.b.victory_points as f32).sum::<f32>() / runs,
    };

    if args.format == "text" {
        println!("=== {} battles ===", report.runs);
        println!("Army A wins: {} ({:.1}%)", report.wins_a, report.win_rate_a * 100.0);
        println!("Army B wins: {} ({:.1}%)", report.wins_b, report.win_rate_b * 100.0);
        println!("Draws: {}", report.draws);
        println!("Mean VP: A {:.1} / B {:.1}", report.mean_vp_a, report.mean_vp_b);
    } else {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose { "wargame_sim=debug" } else { "wargame_sim=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
