//! Self-play harness: simulates batches of games per strategy and persists
//! the results as CSV and JSON for later comparison.
//!
//! The strategies map onto the searcher configurations plus a uniform-random
//! baseline, which is what the calibration comparison between plain negamax,
//! basic alpha-beta and the full search needs.

use crate::position::{format_uci_move, Position};
use crate::search::{SearchMode, Searcher};
use anyhow::{Context, Result};
use chess::{BoardStatus, Color, Game, GameResult};
use chrono::Local;
use clap::ValueEnum;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

/// Guard against endless shuffling before the draw rules kick in.
const MAX_GAME_PLIES: usize = 600;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    Random,
    Plain,
    Alphabeta,
    Full,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Random => "random",
            Strategy::Plain => "plain",
            Strategy::Alphabeta => "alphabeta",
            Strategy::Full => "full",
        }
    }

    /// Human-readable name for logs and the summary line.
    pub fn describe(&self) -> &'static str {
        match self {
            Strategy::Random => "Random Choice Strategy",
            Strategy::Plain => "Plain Negamax Strategy",
            Strategy::Alphabeta => "Alpha-Beta Strategy",
            Strategy::Full => "Full Search Strategy",
        }
    }

    fn search_mode(&self) -> Option<SearchMode> {
        match self {
            Strategy::Random => None,
            Strategy::Plain => Some(SearchMode::Plain),
            Strategy::Alphabeta => Some(SearchMode::AlphaBeta),
            Strategy::Full => Some(SearchMode::Full),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_number: u32,
    pub strategy: String,
    pub result: String,
    pub moves: Vec<String>,
}

/// Plays one game with both sides driven by the strategy. Returns the
/// result string and the move list in UCI notation.
fn play_game(strategy: Strategy, depth: i32) -> (String, Vec<String>) {
    let mut game = Game::new();
    let mut position = Position::new();
    let mut moves = Vec::new();
    let mut rng = rand::thread_rng();

    while position.status() == BoardStatus::Ongoing && game.result().is_none() {
        if game.can_declare_draw() {
            game.declare_draw();
            break;
        }
        if moves.len() >= MAX_GAME_PLIES {
            warn!("game exceeded {} plies, adjudicating a draw", MAX_GAME_PLIES);
            break;
        }

        let mv = match strategy.search_mode() {
            None => position.legal_moves().choose(&mut rng).copied(),
            Some(mode) => Searcher::new(mode).search(&position, depth, None, |_| {}),
        };
        let Some(mv) = mv else {
            warn!("no move found in an ongoing game, abandoning it");
            break;
        };

        game.make_move(mv);
        position = position.apply(mv);
        moves.push(format_uci_move(mv));
    }

    (result_string(&game, &position), moves)
}

fn result_string(game: &Game, position: &Position) -> String {
    match game.result() {
        Some(GameResult::WhiteCheckmates) | Some(GameResult::BlackResigns) => "1-0".to_string(),
        Some(GameResult::BlackCheckmates) | Some(GameResult::WhiteResigns) => "0-1".to_string(),
        Some(GameResult::Stalemate)
        | Some(GameResult::DrawAccepted)
        | Some(GameResult::DrawDeclared) => "1/2-1/2".to_string(),
        None => match position.status() {
            // The side to move has been mated
            BoardStatus::Checkmate => match position.side_to_move() {
                Color::White => "0-1".to_string(),
                Color::Black => "1-0".to_string(),
            },
            _ => "1/2-1/2".to_string(),
        },
    }
}

/// Simulates a batch of games for one strategy.
pub fn simulate_games(strategy: Strategy, num_games: u32, depth: i32) -> Vec<GameRecord> {
    let mut results = Vec::new();
    for game_number in 1..=num_games {
        debug!(
            "starting game {} with the {}",
            game_number,
            strategy.describe()
        );
        let (result, moves) = play_game(strategy, depth);
        debug!("game {} ended: {}", game_number, result);
        results.push(GameRecord {
            game_number,
            strategy: strategy.name().to_string(),
            result,
            moves,
        });
    }
    results
}

fn append_csv_records<W: std::io::Write>(
    writer: W,
    write_header: bool,
    results: &[GameRecord],
) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    if write_header {
        csv_writer.write_record(["Strategy", "Game Number", "Result", "Moves"])?;
    }
    for record in results {
        csv_writer.write_record([
            record.strategy.clone(),
            record.game_number.to_string(),
            record.result.clone(),
            record.moves.join(" "),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Appends result rows to the CSV file, writing the header on first use.
pub fn save_results_csv(path: &Path, results: &[GameRecord]) -> Result<()> {
    let write_header = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    append_csv_records(file, write_header, results)?;
    debug!("results appended to {}", path.display());
    Ok(())
}

/// Merges result objects into the JSON array file.
pub fn save_results_json(path: &Path, results: &[GameRecord]) -> Result<()> {
    let mut all: Vec<GameRecord> = if path.exists() {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        serde_json::from_reader(file).with_context(|| format!("parsing {}", path.display()))?
    } else {
        Vec::new()
    };
    all.extend_from_slice(results);

    let file = File::create(path).with_context(|| format!("writing {}", path.display()))?;
    serde_json::to_writer_pretty(file, &all)?;
    debug!("results saved to {}", path.display());
    Ok(())
}

/// Runs the full harness: every strategy for `games` games, results into a
/// timestamped CSV/JSON pair under `out_dir`.
pub fn run(games: u32, depth: i32, strategies: &[Strategy], out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let csv_path = out_dir.join(format!("woodpusher_results_{}.csv", stamp));
    let json_path = out_dir.join(format!("woodpusher_results_{}.json", stamp));

    info!("beginning runs for {} strategies", strategies.len());
    for &strategy in strategies {
        info!(
            "simulating {} games with the {}",
            games,
            strategy.describe()
        );
        let results = simulate_games(strategy, games, depth);
        save_results_csv(&csv_path, &results)?;
        save_results_json(&json_path, &results)?;

        let wins = results.iter().filter(|r| r.result == "1-0").count();
        let win_rate = 100.0 * wins as f64 / games.max(1) as f64;
        println!(
            "Strategy: {}, Games: {}, White win rate: {:.2}%",
            strategy.describe(),
            games,
            win_rate
        );
    }
    info!("all simulations finished, results in {}", out_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_value_names() {
        assert_eq!(Strategy::Random.name(), "random");
        assert_eq!(Strategy::Plain.name(), "plain");
        assert_eq!(Strategy::Alphabeta.name(), "alphabeta");
        assert_eq!(Strategy::Full.name(), "full");
    }

    #[test]
    fn test_csv_row_shape() {
        let records = vec![GameRecord {
            game_number: 1,
            strategy: "full".to_string(),
            result: "1-0".to_string(),
            moves: vec!["e2e4".to_string(), "e7e5".to_string()],
        }];

        let mut buffer = Vec::new();
        append_csv_records(&mut buffer, true, &records).unwrap();
        let written = String::from_utf8(buffer).unwrap();
        assert_eq!(
            written,
            "Strategy,Game Number,Result,Moves\nfull,1,1-0,e2e4 e7e5\n"
        );
    }

    #[test]
    fn test_json_record_shape() {
        let record = GameRecord {
            game_number: 3,
            strategy: "random".to_string(),
            result: "1/2-1/2".to_string(),
            moves: vec!["g1f3".to_string()],
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["game_number"], 3);
        assert_eq!(value["strategy"], "random");
        assert_eq!(value["result"], "1/2-1/2");
        assert_eq!(value["moves"][0], "g1f3");
    }

    #[test]
    fn test_random_game_terminates_with_valid_result() {
        let (result, moves) = play_game(Strategy::Random, 1);
        assert!(["1-0", "0-1", "1/2-1/2"].contains(&result.as_str()));
        assert!(!moves.is_empty());
        assert!(moves.len() <= MAX_GAME_PLIES);
    }

    #[test]
    fn test_engine_game_produces_records() {
        let records = simulate_games(Strategy::Full, 1, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].strategy, "full");
        assert!(!records[0].moves.is_empty());
    }
}
