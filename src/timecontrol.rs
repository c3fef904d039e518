//! Per-move time allocation from clock parameters.
//!
//! Tuned for short increment-based controls (2+1, 5+5): with an increment we
//! can spend a clock fraction plus most of the increment, capped at an
//! eighth of the remaining time; without one we stay more conservative.

use std::time::Duration;

/// Clock information from the protocol's `go` command, for the side to move.
#[derive(Copy, Clone, Debug, Default)]
pub struct TimeControl {
    pub movetime_ms: Option<u64>,
    pub remaining_ms: Option<u64>,
    pub increment_ms: u64,
    pub moves_to_go: Option<u32>,
}

/// Computes the time budget for one move, or `None` when no clock
/// information was given (a purely depth-capped search).
pub fn allocate(tc: &TimeControl, fullmove_number: u32) -> Option<Duration> {
    // Fixed time per move: use 90% to leave a buffer
    if let Some(movetime) = tc.movetime_ms {
        return Some(Duration::from_secs_f64(movetime as f64 / 1000.0 * 0.9));
    }

    let remaining = tc.remaining_ms? as f64 / 1000.0;
    let increment = tc.increment_ms as f64 / 1000.0;
    let moves_played = (fullmove_number / 2) as i64;

    let budget = if increment > 0.0 {
        // The increment comes back every move, so most of it is spendable
        let base = match tc.moves_to_go {
            Some(mtg) if mtg > 0 => remaining / (mtg.max(20)) as f64,
            _ => {
                let moves_remaining = (40 - moves_played).max(20);
                remaining / moves_remaining as f64
            }
        };
        // Never spend more than an eighth of the clock on one move
        (base + increment * 0.9).min(remaining / 8.0)
    } else {
        match tc.moves_to_go {
            Some(mtg) if mtg > 0 => remaining / mtg as f64 * 0.8,
            _ => {
                let moves_remaining = (50 - moves_played).max(25);
                remaining / moves_remaining as f64 * 0.7
            }
        }
    };

    Some(Duration::from_secs_f64(budget))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(budget: Option<Duration>) -> f64 {
        budget.unwrap().as_secs_f64()
    }

    #[test]
    fn test_movetime_uses_ninety_percent() {
        let tc = TimeControl {
            movetime_ms: Some(1000),
            ..Default::default()
        };
        assert!((secs(allocate(&tc, 1)) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_no_clock_means_no_budget() {
        let tc = TimeControl::default();
        assert!(allocate(&tc, 1).is_none());
    }

    #[test]
    fn test_increment_formula() {
        // 60s + 1s increment at move 1: 60/40 + 0.9 = 2.4s
        let tc = TimeControl {
            remaining_ms: Some(60_000),
            increment_ms: 1000,
            ..Default::default()
        };
        assert!((secs(allocate(&tc, 1)) - 2.4).abs() < 1e-9);
    }

    #[test]
    fn test_increment_with_moves_to_go() {
        // Planning horizon never drops below 20 moves: 60/20 + 0.9 = 3.9s
        let tc = TimeControl {
            remaining_ms: Some(60_000),
            increment_ms: 1000,
            moves_to_go: Some(10),
            ..Default::default()
        };
        assert!((secs(allocate(&tc, 1)) - 3.9).abs() < 1e-9);
    }

    #[test]
    fn test_increment_budget_caps_at_eighth_of_clock() {
        // 8s left, 5s increment: the eighth-of-clock cap wins at 1.0s
        let tc = TimeControl {
            remaining_ms: Some(8_000),
            increment_ms: 5000,
            ..Default::default()
        };
        assert!((secs(allocate(&tc, 1)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_increment_with_moves_to_go() {
        // 60s over 10 moves with a 20% buffer: 4.8s
        let tc = TimeControl {
            remaining_ms: Some(60_000),
            increment_ms: 0,
            moves_to_go: Some(10),
            ..Default::default()
        };
        assert!((secs(allocate(&tc, 1)) - 4.8).abs() < 1e-9);
    }

    #[test]
    fn test_no_increment_estimates_moves_remaining() {
        // 60s, no increment, move 1: 0.7 * 60/50 = 0.84s
        let tc = TimeControl {
            remaining_ms: Some(60_000),
            increment_ms: 0,
            ..Default::default()
        };
        assert!((secs(allocate(&tc, 1)) - 0.84).abs() < 1e-9);

        // Late in the game the estimate floors at 25 moves: 0.7 * 60/25 = 1.68s
        assert!((secs(allocate(&tc, 120)) - 1.68).abs() < 1e-9);
    }
}
