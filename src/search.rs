//! Game-tree search: negamax with alpha-beta pruning, a capture-only
//! quiescence extension, transposition and killer tables, and an
//! iterative-deepening driver with cooperative cancellation.
//!
//! Three configurations share the driver and its time/cancellation contract:
//! plain negamax (calibration baseline, no pruning or ordering), alpha-beta
//! with basic capture-first ordering, and the full configuration with the
//! transposition table, killer moves and full heuristic ordering.

use crate::evaluation;
use crate::moveorder::{KillerTable, MoveOrderer};
use crate::position::Position;
use crate::transposition::{Bound, TranspositionTable};
use chess::{ChessMove, Color};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const MAX_SCORE: i32 = 9_999_999;
pub const MIN_SCORE: i32 = -9_999_999;

const TT_SIZE_MB: usize = 16;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SearchMode {
    /// Plain negamax, no pruning, no ordering, static evaluation at depth 0.
    Plain,
    /// Alpha-beta with basic capture-first ordering and quiescence.
    AlphaBeta,
    /// Alpha-beta plus transposition table, killer moves and full ordering.
    Full,
}

/// Counters for one top-level search invocation.
#[derive(Clone, Debug, Default)]
pub struct SearchStats {
    pub nodes: u64,
    pub elapsed: Duration,
}

/// Per-depth progress report handed to the driver's callback.
pub struct SearchProgress<'a> {
    pub depth: i32,
    pub score: i32,
    pub pv: &'a [ChessMove],
    pub nodes: u64,
    pub time_ms: u128,
    pub nps: u64,
}

pub struct Searcher {
    mode: SearchMode,
    stop: Arc<AtomicBool>,
    deadline: Option<Instant>,
    start_time: Instant,
    depth_nodes: u64,
    stats: SearchStats,
    tt: TranspositionTable,
    killers: KillerTable,
    orderer: MoveOrderer,
}

impl Searcher {
    pub fn new(mode: SearchMode) -> Self {
        Searcher::with_stop(mode, Arc::new(AtomicBool::new(false)))
    }

    /// A searcher whose cancellation flag is shared with the caller.
    pub fn with_stop(mode: SearchMode, stop: Arc<AtomicBool>) -> Self {
        Searcher {
            mode,
            stop,
            deadline: None,
            start_time: Instant::now(),
            depth_nodes: 0,
            stats: SearchStats::default(),
            tt: TranspositionTable::new(TT_SIZE_MB),
            killers: KillerTable::new(),
            orderer: MoveOrderer::new(),
        }
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Cooperative cancellation: polled at the entry of every recursive
    /// call, every quiescence call, and the top of each deepening step.
    fn should_stop(&self) -> bool {
        if self.stop.load(Ordering::Relaxed) {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Iterative-deepening driver. Runs the configured searcher at depths
    /// `1..=max_depth`, reporting each completed depth through `progress`,
    /// and returns the best move found. The transposition and killer tables
    /// are created fresh here and persist only across this invocation's
    /// depths.
    pub fn search<F>(
        &mut self,
        position: &Position,
        max_depth: i32,
        budget: Option<Duration>,
        mut progress: F,
    ) -> Option<ChessMove>
    where
        F: FnMut(&SearchProgress),
    {
        self.start_time = Instant::now();
        self.deadline = budget.map(|b| self.start_time + b);
        self.stats = SearchStats::default();
        self.tt = TranspositionTable::new(TT_SIZE_MB);
        self.killers = KillerTable::new();

        let mut best_move = None;

        for depth in 1..=max_depth {
            if self.should_stop() {
                break;
            }

            let depth_start = Instant::now();
            let (score, pv) = self.search_fixed_depth(position, depth);
            let depth_time = depth_start.elapsed();

            self.stats.elapsed = self.start_time.elapsed();
            let nps = (self.depth_nodes as f64 / depth_time.as_secs_f64().max(1e-6)) as u64;

            progress(&SearchProgress {
                depth,
                score,
                pv: &pv,
                nodes: self.stats.nodes,
                time_ms: self.stats.elapsed.as_millis(),
                nps,
            });

            // An interrupted depth may still publish its partial line's
            // first move, overwriting the previous depth's choice.
            if let Some(&first) = pv.first() {
                best_move = Some(first);
            }
            if self.should_stop() {
                break;
            }
        }

        debug!(
            "search finished: mode {:?}, nodes {}, elapsed {:?}, best {:?}",
            self.mode, self.stats.nodes, self.stats.elapsed, best_move
        );
        best_move
    }

    /// One search at a fixed depth with a fresh per-depth node counter.
    pub fn search_fixed_depth(
        &mut self,
        position: &Position,
        depth: i32,
    ) -> (i32, Vec<ChessMove>) {
        self.depth_nodes = 0;
        let result = match self.mode {
            SearchMode::Plain => self.negamax_plain(position, depth),
            SearchMode::AlphaBeta => self.negamax_basic(position, depth, MIN_SCORE, MAX_SCORE),
            SearchMode::Full => self.negamax_full(position, depth, MIN_SCORE, MAX_SCORE, 0),
        };
        self.stats.nodes += self.depth_nodes;
        result
    }

    /// Negamax with alpha-beta pruning, transposition table and killer
    /// moves. Returns the score and the principal variation.
    fn negamax_full(
        &mut self,
        position: &Position,
        depth: i32,
        mut alpha: i32,
        mut beta: i32,
        ply: usize,
    ) -> (i32, Vec<ChessMove>) {
        if self.should_stop() {
            return (0, Vec::new());
        }
        self.depth_nodes += 1;

        let key = position.key();
        if let Some(&entry) = self.tt.probe(key) {
            // Usable only when searched at least as deep as requested; a
            // lower/upper bound narrows the window, never resolves exactly.
            if entry.depth >= depth {
                match entry.bound {
                    Bound::Exact => return (entry.score, pv_from(entry.best_move)),
                    Bound::Lower => alpha = alpha.max(entry.score),
                    Bound::Upper => beta = beta.min(entry.score),
                }
                if alpha >= beta {
                    return (entry.score, pv_from(entry.best_move));
                }
            }
        }

        if depth == 0 {
            return (self.quiescence(position, alpha, beta), Vec::new());
        }

        // Kept for classifying the bound of the result below
        let original_alpha = alpha;

        let mut best_score = MIN_SCORE;
        let mut best_line: Vec<ChessMove> = Vec::new();

        let moves = self
            .orderer
            .order(position, position.legal_moves(), &self.killers);

        for mv in moves {
            let child = position.apply(mv);
            let (child_score, child_line) =
                self.negamax_full(&child, depth - 1, -beta, -alpha, ply + 1);
            let score = -child_score;

            if score > best_score {
                best_score = score;
                best_line.clear();
                best_line.push(mv);
                best_line.extend(child_line);
            }
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                // Quiet moves that refute a line are worth trying early
                // in sibling nodes.
                if !position.is_capture(mv) {
                    self.killers.insert(ply, mv);
                }
                break;
            }
        }

        let bound = if best_score <= original_alpha {
            Bound::Upper
        } else if best_score >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        self.tt
            .store(key, depth, bound, best_score, best_line.first().copied());

        (best_score, best_line)
    }

    /// Alpha-beta with basic capture-first ordering; no transposition table,
    /// no killer moves.
    fn negamax_basic(
        &mut self,
        position: &Position,
        depth: i32,
        mut alpha: i32,
        beta: i32,
    ) -> (i32, Vec<ChessMove>) {
        if self.should_stop() {
            return (0, Vec::new());
        }
        self.depth_nodes += 1;

        if depth == 0 {
            return (self.quiescence(position, alpha, beta), Vec::new());
        }

        let mut best_score = MIN_SCORE;
        let mut best_line: Vec<ChessMove> = Vec::new();

        let moves = self.orderer.order_basic(position, position.legal_moves());

        for mv in moves {
            let child = position.apply(mv);
            let (child_score, child_line) = self.negamax_basic(&child, depth - 1, -beta, -alpha);
            let score = -child_score;

            if score > best_score {
                best_score = score;
                best_line.clear();
                best_line.push(mv);
                best_line.extend(child_line);
            }

            alpha = alpha.max(score);
            if alpha >= beta {
                break;
            }
            if self.should_stop() {
                break;
            }
        }

        (best_score, best_line)
    }

    /// Plain negamax without pruning or ordering; the calibration baseline.
    /// Depth-0 leaves take the static evaluation directly.
    fn negamax_plain(&mut self, position: &Position, depth: i32) -> (i32, Vec<ChessMove>) {
        if self.should_stop() {
            return (0, Vec::new());
        }
        self.depth_nodes += 1;

        if depth == 0 {
            return (self.leaf_eval(position), Vec::new());
        }

        let mut best_score = MIN_SCORE;
        let mut best_line: Vec<ChessMove> = Vec::new();

        for mv in position.legal_moves() {
            let child = position.apply(mv);
            let (child_score, child_line) = self.negamax_plain(&child, depth - 1);
            let score = -child_score;

            if score > best_score {
                best_score = score;
                best_line.clear();
                best_line.push(mv);
                best_line.extend(child_line);
            }

            if self.should_stop() {
                break;
            }
        }

        (best_score, best_line)
    }

    /// Capture-only search that settles tactical dust before the static
    /// evaluation is trusted.
    fn quiescence(&mut self, position: &Position, mut alpha: i32, beta: i32) -> i32 {
        self.depth_nodes += 1;
        if self.should_stop() {
            return 0;
        }

        let stand_pat = self.leaf_eval(position);
        if stand_pat >= beta {
            return beta;
        }
        if alpha < stand_pat {
            alpha = stand_pat;
        }

        for mv in position.legal_moves() {
            if !position.is_capture(mv) {
                continue;
            }
            let child = position.apply(mv);
            let score = -self.quiescence(&child, -beta, -alpha);

            if score >= beta {
                return beta;
            }
            if score > alpha {
                alpha = score;
            }
        }

        alpha
    }

    /// Static evaluation from the side to move's point of view, as negamax
    /// leaves require.
    fn leaf_eval(&self, position: &Position) -> i32 {
        let score = evaluation::evaluate(position);
        match position.side_to_move() {
            Color::White => score,
            Color::Black => -score,
        }
    }
}

fn pv_from(best_move: Option<ChessMove>) -> Vec<ChessMove> {
    match best_move {
        Some(mv) => vec![mv],
        None => Vec::new(),
    }
}
