//! Transposition table: a bounded, position-keyed cache of search results.
//!
//! Entries are keyed by the position's Zobrist hash and verified against the
//! full hash on probe, so index collisions are harmless. Replacement is
//! depth-preferred: an entry only yields its slot to an equal or deeper
//! search. One table lives for exactly one search invocation.

use chess::ChessMove;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Bound {
    Exact,
    Lower,
    Upper,
}

#[derive(Copy, Clone, Debug)]
pub struct TranspositionEntry {
    pub hash: u64,
    pub depth: i32,
    pub bound: Bound,
    pub score: i32,
    pub best_move: Option<ChessMove>,
}

pub struct TranspositionTable {
    table: Vec<Option<TranspositionEntry>>,
    size: usize,
}

impl TranspositionTable {
    pub fn new(size_mb: usize) -> Self {
        let entry_size = std::mem::size_of::<Option<TranspositionEntry>>();
        let num_entries = (size_mb * 1024 * 1024 / entry_size).max(1);

        TranspositionTable {
            table: vec![None; num_entries],
            size: num_entries,
        }
    }

    pub fn store(
        &mut self,
        hash: u64,
        depth: i32,
        bound: Bound,
        score: i32,
        best_move: Option<ChessMove>,
    ) {
        let index = self.get_index(hash);
        let entry = TranspositionEntry {
            hash,
            depth,
            bound,
            score,
            best_move,
        };

        // Depth-preferred replacement: shallower results never evict deeper ones
        match self.table[index] {
            Some(existing) if existing.depth > depth => {}
            _ => self.table[index] = Some(entry),
        }
    }

    pub fn probe(&self, hash: u64) -> Option<&TranspositionEntry> {
        match &self.table[self.get_index(hash)] {
            Some(entry) if entry.hash == hash => Some(entry),
            _ => None,
        }
    }

    fn get_index(&self, hash: u64) -> usize {
        (hash as usize) % self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_probe() {
        let mut tt = TranspositionTable::new(1);
        let hash = 123456789;

        tt.store(hash, 4, Bound::Exact, 100, None);
        let entry = tt.probe(hash).unwrap();

        assert_eq!(entry.hash, hash);
        assert_eq!(entry.depth, 4);
        assert_eq!(entry.bound, Bound::Exact);
        assert_eq!(entry.score, 100);
        assert_eq!(entry.best_move, None);
    }

    #[test]
    fn test_probe_miss() {
        let mut tt = TranspositionTable::new(1);
        tt.store(123456789, 4, Bound::Exact, 100, None);
        assert!(tt.probe(987654321).is_none());
    }

    #[test]
    fn test_depth_preferred_replacement() {
        let mut tt = TranspositionTable::new(1);
        let hash = 123456789;

        tt.store(hash, 2, Bound::Exact, 100, None);
        tt.store(hash, 4, Bound::Lower, 200, None);
        let entry = tt.probe(hash).unwrap();
        assert_eq!(entry.depth, 4);
        assert_eq!(entry.score, 200);

        // A shallower result must not evict the deeper one.
        tt.store(hash, 1, Bound::Exact, 300, None);
        let entry = tt.probe(hash).unwrap();
        assert_eq!(entry.depth, 4);
        assert_eq!(entry.score, 200);

        // Equal depth replaces, keeping the freshest bounds.
        tt.store(hash, 4, Bound::Upper, 250, None);
        let entry = tt.probe(hash).unwrap();
        assert_eq!(entry.bound, Bound::Upper);
        assert_eq!(entry.score, 250);
    }
}
