//! UCI protocol front end.
//!
//! Reads line commands from stdin and drives the search. Searches run on a
//! dedicated worker thread over a private copy of the position, so `stop`
//! stays responsive; a `go` while a search is active is rejected. Stopping
//! sets the shared flag and waits for the worker to acknowledge, bounded by
//! a join timeout.

use crate::position::{format_uci_move, Position};
use crate::search::{SearchMode, SearchProgress, Searcher};
use crate::timecontrol::{self, TimeControl};
use anyhow::Result;
use chess::Color;
use log::{debug, error, warn};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const ENGINE_NAME: &str = "Woodpusher";
const ENGINE_AUTHOR: &str = "the Woodpusher developers";

/// Depth used when `go` carries no explicit depth.
const DEFAULT_DEPTH: i32 = 3;

/// How long `stop` waits for the worker before proceeding regardless.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Parameters recognized on the `go` command line.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GoParams {
    pub depth: Option<i32>,
    pub movetime: Option<u64>,
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: u64,
    pub binc: u64,
    pub movestogo: Option<u32>,
}

/// Parses the tokens after `go`, skipping anything unrecognized.
pub fn parse_go(tokens: &[&str]) -> GoParams {
    let mut params = GoParams::default();
    let mut i = 0;
    while i < tokens.len() {
        let value = tokens.get(i + 1);
        match tokens[i] {
            "depth" => {
                params.depth = value.and_then(|v| v.parse().ok());
                i += 2;
            }
            "movetime" => {
                params.movetime = value.and_then(|v| v.parse().ok());
                i += 2;
            }
            "wtime" => {
                params.wtime = value.and_then(|v| v.parse().ok());
                i += 2;
            }
            "btime" => {
                params.btime = value.and_then(|v| v.parse().ok());
                i += 2;
            }
            "winc" => {
                params.winc = value.and_then(|v| v.parse().ok()).unwrap_or(0);
                i += 2;
            }
            "binc" => {
                params.binc = value.and_then(|v| v.parse().ok()).unwrap_or(0);
                i += 2;
            }
            "movestogo" => {
                params.movestogo = value.and_then(|v| v.parse().ok());
                i += 2;
            }
            // accepted for protocol compatibility, unused
            "nodes" => i += 2,
            _ => i += 1,
        }
    }
    params
}

struct Worker {
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

pub struct UciEngine {
    position: Position,
    stop: Arc<AtomicBool>,
    worker: Option<Worker>,
}

impl UciEngine {
    pub fn new() -> Self {
        UciEngine {
            position: Position::new(),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Main command loop; returns when `quit` is received or stdin closes.
    pub fn run(&mut self) -> Result<()> {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            let parts: Vec<&str> = line.split_whitespace().collect();
            let Some((&cmd, args)) = parts.split_first() else {
                continue;
            };

            match cmd {
                "uci" => self.handle_uci(),
                "isready" => send("readyok"),
                "ucinewgame" => self.handle_ucinewgame(),
                "position" => self.handle_position(args),
                "go" => self.handle_go(args),
                "stop" => self.handle_stop(),
                "quit" => {
                    self.handle_stop();
                    break;
                }
                // accepted but not supported
                "setoption" | "ponderhit" => {}
                _ => debug!("unknown UCI command: {}", line),
            }
        }
        Ok(())
    }

    fn handle_uci(&self) {
        send(&format!(
            "id name {} {}",
            ENGINE_NAME,
            env!("CARGO_PKG_VERSION")
        ));
        send(&format!("id author {}", ENGINE_AUTHOR));
        send("uciok");
    }

    fn handle_ucinewgame(&mut self) {
        self.position = Position::new();
    }

    /// `position [startpos | fen <6 fields>] [moves ...]`. The current
    /// position is replaced only if the whole command parses; a malformed
    /// FEN or move leaves it untouched.
    fn handle_position(&mut self, tokens: &[&str]) {
        if tokens.is_empty() {
            return;
        }

        let (mut position, mut index) = match tokens[0] {
            "startpos" => (Position::new(), 1),
            "fen" => {
                let end = tokens.len().min(7);
                let fen = tokens[1..end].join(" ");
                match Position::from_fen(&fen) {
                    Ok(position) => (position, 7),
                    Err(e) => {
                        error!("rejected position command: {:#}", e);
                        return;
                    }
                }
            }
            _ => {
                debug!("unknown position specifier: {}", tokens[0]);
                return;
            }
        };

        if index < tokens.len() && tokens[index] == "moves" {
            index += 1;
            for token in &tokens[index..] {
                match position.parse_uci_move(token) {
                    Ok(mv) => position = position.apply(mv),
                    Err(e) => {
                        error!("rejected position command: {:#}", e);
                        return;
                    }
                }
            }
        }

        self.position = position;
    }

    /// `go`: starts a search on the worker thread over a private copy of
    /// the position. Rejected while a search is active.
    fn handle_go(&mut self, tokens: &[&str]) {
        if self.search_active() {
            send("info string already searching");
            return;
        }

        let params = parse_go(tokens);
        let depth = params.depth.unwrap_or(DEFAULT_DEPTH);

        let (remaining, increment) = match self.position.side_to_move() {
            Color::White => (params.wtime, params.winc),
            Color::Black => (params.btime, params.binc),
        };
        let tc = TimeControl {
            movetime_ms: params.movetime,
            remaining_ms: remaining,
            increment_ms: increment,
            moves_to_go: params.movestogo,
        };
        let budget = timecontrol::allocate(&tc, self.position.fullmove_number());
        debug!("starting search: depth {}, budget {:?}", depth, budget);

        self.stop.store(false, Ordering::Relaxed);
        let stop = Arc::clone(&self.stop);
        let position = self.position.clone();
        let (done_tx, done_rx) = mpsc::channel();

        let handle = std::thread::spawn(move || {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let mut searcher = Searcher::with_stop(SearchMode::Full, stop);
                let best = searcher.search(&position, depth, budget, send_info);
                let stats = searcher.stats();
                debug!("worker done: {} nodes in {:?}", stats.nodes, stats.elapsed);
                best
            }));
            match outcome {
                Ok(Some(best)) => send(&format!("bestmove {}", format_uci_move(best))),
                Ok(None) => send("bestmove (none)"),
                Err(_) => {
                    error!("search failed; reporting no move");
                    send("bestmove (none)");
                }
            }
            let _ = done_tx.send(());
        });
        self.worker = Some(Worker {
            handle,
            done: done_rx,
        });
    }

    /// `stop`: signal the worker and wait for it to acknowledge, bounded by
    /// the join timeout. On timeout we proceed; the worker keeps polling the
    /// flag and exits on its own.
    fn handle_stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            match worker.done.recv_timeout(STOP_JOIN_TIMEOUT) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    let _ = worker.handle.join();
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "search did not acknowledge stop within {:?}, proceeding",
                        STOP_JOIN_TIMEOUT
                    );
                    self.worker = Some(worker);
                }
            }
        }
    }

    fn search_active(&self) -> bool {
        self.worker
            .as_ref()
            .map_or(false, |w| !w.handle.is_finished())
    }

    #[cfg(test)]
    fn position(&self) -> &Position {
        &self.position
    }
}

impl Default for UciEngine {
    fn default() -> Self {
        UciEngine::new()
    }
}

fn send(line: &str) {
    println!("{}", line);
    let _ = io::stdout().flush();
}

fn send_info(progress: &SearchProgress) {
    let mut line = format!(
        "info depth {} score cp {} nodes {} nps {} time {}",
        progress.depth, progress.score, progress.nodes, progress.nps, progress.time_ms
    );
    if !progress.pv.is_empty() {
        let moves: Vec<String> = progress.pv.iter().map(|&mv| format_uci_move(mv)).collect();
        line.push_str(" pv ");
        line.push_str(&moves.join(" "));
    }
    send(&line);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_go_reads_all_clock_fields() {
        let tokens = [
            "depth", "6", "wtime", "1000", "btime", "2000", "winc", "10", "binc", "20",
            "movestogo", "5",
        ];
        let params = parse_go(&tokens);
        assert_eq!(
            params,
            GoParams {
                depth: Some(6),
                movetime: None,
                wtime: Some(1000),
                btime: Some(2000),
                winc: 10,
                binc: 20,
                movestogo: Some(5),
            }
        );
    }

    #[test]
    fn test_parse_go_skips_unknown_tokens() {
        let params = parse_go(&["ponder", "movetime", "500"]);
        assert_eq!(params.movetime, Some(500));
        assert_eq!(params.depth, None);
    }

    #[test]
    fn test_parse_go_tolerates_bad_numbers() {
        let params = parse_go(&["depth", "banana"]);
        assert_eq!(params.depth, None);
    }

    #[test]
    fn test_position_startpos_with_moves() {
        let mut engine = UciEngine::new();
        engine.handle_position(&["startpos", "moves", "e2e4", "e7e5"]);
        assert_eq!(engine.position().side_to_move(), Color::White);
        assert_eq!(engine.position().fullmove_number(), 2);
        assert_ne!(engine.position().key(), Position::new().key());
    }

    #[test]
    fn test_position_from_fen() {
        let mut engine = UciEngine::new();
        engine.handle_position(&[
            "fen", "k7", "8/8/8/3q4/4P3/8/8/7K", "w", "-", "-", "0", "1",
        ]);
        // Deliberately scrambled FEN fields above: rejected, position kept.
        assert_eq!(engine.position().key(), Position::new().key());

        engine.handle_position(&["fen", "k7/8/8/3q4/4P3/8/8/7K", "w", "-", "-", "0", "11"]);
        assert_eq!(engine.position().fullmove_number(), 11);
    }

    #[test]
    fn test_malformed_fen_leaves_position_unchanged() {
        let mut engine = UciEngine::new();
        engine.handle_position(&["startpos", "moves", "d2d4"]);
        let key = engine.position().key();

        engine.handle_position(&["fen", "this", "is", "not", "a", "fen", "1"]);
        assert_eq!(engine.position().key(), key);
    }

    #[test]
    fn test_illegal_move_leaves_position_unchanged() {
        let mut engine = UciEngine::new();
        let key = engine.position().key();
        engine.handle_position(&["startpos", "moves", "e2e4", "e2e4"]);
        assert_eq!(engine.position().key(), key);
    }

    #[test]
    fn test_go_then_stop_terminates_worker() {
        let mut engine = UciEngine::new();
        engine.handle_go(&["depth", "1"]);
        assert!(engine.worker.is_some());

        // depth 1 finishes almost immediately; stop must join cleanly
        engine.handle_stop();
        assert!(!engine.search_active());
    }

    #[test]
    fn test_stop_interrupts_deep_search() {
        let mut engine = UciEngine::new();
        engine.handle_go(&["depth", "50"]);
        std::thread::sleep(Duration::from_millis(50));
        engine.handle_stop();
        assert!(!engine.search_active());
    }

    #[test]
    fn test_stop_without_search_is_harmless() {
        let mut engine = UciEngine::new();
        engine.handle_stop();
        assert!(!engine.search_active());
    }
}
