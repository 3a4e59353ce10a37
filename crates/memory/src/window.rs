//! Bounded rolling window of conversation turns.
//!
//! The store holds at most `capacity` turns. Appending beyond that evicts the
//! oldest turn first, so the window always holds the most recent exchange in
//! insertion order. System turns are never stored here; the assembler adds
//! the system entry fresh on every request.

use std::collections::VecDeque;

use neutro_core::Turn;

/// Default window size.
pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct MessageStore {
    turns: VecDeque<Turn>,
    capacity: usize,
}

impl MessageStore {
    /// Create a store holding at most `capacity` turns (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a turn, evicting the oldest when full.
    pub fn append(&mut self, turn: Turn) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// The last `min(n, len)` turns, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Turn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Rebuild a window from saved turns, keeping only the newest ones.
    pub fn from_turns(capacity: usize, turns: impl IntoIterator<Item = Turn>) -> Self {
        let mut store = Self::new(capacity);
        for turn in turns {
            store.append(turn);
        }
        store
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
