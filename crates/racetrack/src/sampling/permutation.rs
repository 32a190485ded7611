//! Cyclic walk over a shuffled check/skip table.

/// Position within a fixed boolean table; wraps after the last slot.
#[derive(Debug, Clone)]
pub struct PermutationCursor {
    table: Box<[bool]>,
    next: usize,
}

impl PermutationCursor {
    pub fn new(table: Box<[bool]>) -> Self {
        debug_assert!(!table.is_empty(), "permutation table must not be empty");
        Self { table, next: 0 }
    }

    /// Reads the current slot and moves to the next one.
    #[inline]
    pub fn advance(&mut self) -> bool {
        let checked = self.table[self.next];
        self.next = (self.next + 1) % self.table.len();
        checked
    }

    pub fn position(&self) -> usize {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::RandomSource;

    #[test]
    fn every_window_of_len_replays_the_table() {
        let table = RandomSource::new(Some(3)).permutation(100, 25);
        let mut cursor = PermutationCursor::new(table.clone());

        for _ in 0..3 {
            let window: Vec<bool> = (0..100).map(|_| cursor.advance()).collect();
            assert_eq!(window.as_slice(), &*table);
            assert_eq!(window.iter().filter(|&&b| b).count(), 25);
            assert_eq!(cursor.position(), 0);
        }
    }
}
