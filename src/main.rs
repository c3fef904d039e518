//! Woodpusher, a UCI chess engine.
//!
//! This module is the entry point and coordinates the engine's components:
//! position management, evaluation, search, time allocation, the UCI
//! protocol loop and the self-play harness. Run without arguments to speak
//! UCI on stdin/stdout; run `woodpusher selfplay` to simulate games and
//! record the results.

pub mod evaluation;
pub mod moveorder;
pub mod position;
pub mod search;
pub mod selfplay;
pub mod timecontrol;
pub mod transposition;
pub mod uci;

use anyhow::Result;
use clap::{Parser, Subcommand};
use selfplay::Strategy;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "woodpusher",
    version,
    about = "UCI chess engine with a self-play harness"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Play engine-vs-engine games and record CSV/JSON results
    Selfplay {
        /// Number of games per strategy
        #[arg(long, default_value_t = 10)]
        games: u32,
        /// Fixed search depth for the engine strategies
        #[arg(long, default_value_t = 3)]
        depth: i32,
        /// Strategies to exercise
        #[arg(
            long,
            value_enum,
            value_delimiter = ',',
            default_values_t = [Strategy::Random, Strategy::Alphabeta, Strategy::Full]
        )]
        strategies: Vec<Strategy>,
        /// Directory for the result files
        #[arg(long, default_value = "results")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        None => uci::UciEngine::new().run(),
        Some(Command::Selfplay {
            games,
            depth,
            strategies,
            out_dir,
        }) => selfplay::run(games, depth, &strategies, &out_dir),
    }
}
