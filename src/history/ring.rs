use super::{read_cells_padded, reflow_lines, HistoryLine, HistoryStore};
use crate::cell::Cell;

/// Bounded FIFO ring of `capacity` lines (spec §3/§4.1). When full, the
/// oldest line is discarded before the new one is admitted. Line
/// indices are re-based on drop so index 0 always means "oldest still
/// retained."
pub struct RingStore {
    capacity: usize,
    lines: Vec<Option<HistoryLine>>,
    /// Index of the most recently written slot, valid when `count > 0`.
    write_cursor: usize,
    count: usize,
    pending: Vec<Cell>,
}

impl RingStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lines: (0..capacity.max(1)).map(|_| None).collect(),
            write_cursor: 0,
            count: 0,
            pending: Vec::new(),
        }
    }

    /// The circular-index formula from spec §3/§9:
    /// `(write_cursor + logical_index - (count-1) + capacity) mod capacity`.
    fn adjust(&self, logical_index: i64) -> Option<usize> {
        if self.capacity == 0 || logical_index < 0 || logical_index >= self.count as i64 {
            return None;
        }
        let capacity = self.capacity as i64;
        let idx = (self.write_cursor as i64 + logical_index - (self.count as i64 - 1) + capacity)
            % capacity;
        Some(idx as usize)
    }

    fn get(&self, logical_index: i64) -> Option<&HistoryLine> {
        self.adjust(logical_index).and_then(|i| self.lines[i].as_ref())
    }
}

impl HistoryStore for RingStore {
    fn append_cells(&mut self, cells: &[Cell]) {
        if self.capacity == 0 {
            return;
        }
        self.pending.extend_from_slice(cells);
    }

    fn finalize_line(&mut self, wrapped: bool) {
        if self.capacity == 0 {
            self.pending.clear();
            return;
        }
        let line = HistoryLine {
            cells: std::mem::take(&mut self.pending),
            wrapped,
        };
        self.push_line(line);
    }

    fn line_count(&self) -> i64 {
        self.count as i64
    }

    fn line_length(&self, line: i64) -> i32 {
        self.get(line).map(|l| l.cells.len() as i32).unwrap_or(0)
    }

    fn cells_at(&self, line: i64, col: i32, count: i32) -> Vec<Cell> {
        match self.get(line) {
            Some(l) => read_cells_padded(&l.cells, col, count),
            None => vec![Cell::default(); count.max(0) as usize],
        }
    }

    fn is_wrapped(&self, line: i64) -> bool {
        self.get(line).map(|l| l.wrapped).unwrap_or(false)
    }

    fn reflow(&mut self, new_columns: i32) -> i64 {
        if new_columns <= 0 {
            return 0;
        }
        let all = self.drain_all();
        let before = 0i64; // drain_all already empties; count dropped below
        let reflowed = reflow_lines(all, new_columns as usize);
        let total = reflowed.len();
        let dropped = total.saturating_sub(self.capacity);
        let keep_from = total.saturating_sub(self.capacity.max(0).min(total));
        let keep: Vec<HistoryLine> = if self.capacity == 0 {
            Vec::new()
        } else if total > self.capacity {
            reflowed.into_iter().skip(keep_from).collect()
        } else {
            reflowed
        };
        for line in keep {
            self.push_line(line);
        }
        let _ = before;
        dropped as i64
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.capacity)
    }

    fn drain_all(&mut self) -> Vec<HistoryLine> {
        let mut out = Vec::with_capacity(self.count);
        for i in 0..self.count as i64 {
            if let Some(idx) = self.adjust(i) {
                if let Some(line) = self.lines[idx].take() {
                    out.push(line);
                }
            }
        }
        self.write_cursor = 0;
        self.count = 0;
        out
    }

    fn push_line(&mut self, line: HistoryLine) {
        if self.capacity == 0 {
            return;
        }
        if self.count < self.capacity {
            let idx = if self.count == 0 {
                0
            } else {
                (self.write_cursor + 1) % self.capacity
            };
            self.lines[idx] = Some(line);
            self.write_cursor = idx;
            self.count += 1;
        } else {
            self.write_cursor = (self.write_cursor + 1) % self.capacity;
            self.lines[self.write_cursor] = Some(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finalize(store: &mut RingStore, text: &str, wrapped: bool) {
        let cells: Vec<Cell> = text
            .chars()
            .map(|c| Cell {
                c,
                ..Cell::default()
            })
            .collect();
        store.append_cells(&cells);
        store.finalize_line(wrapped);
    }

    fn line_text(store: &RingStore, line: i64) -> String {
        let len = store.line_length(line);
        store
            .cells_at(line, 0, len)
            .into_iter()
            .map(|c| c.c)
            .collect()
    }

    #[test]
    fn oldest_line_discarded_when_full() {
        let mut store = RingStore::new(3);
        for s in ["a", "b", "c", "d"] {
            finalize(&mut store, s, false);
        }
        assert_eq!(store.line_count(), 3);
        assert_eq!(line_text(&store, 0), "b");
        assert_eq!(line_text(&store, 1), "c");
        assert_eq!(line_text(&store, 2), "d");
    }

    #[test]
    fn adjust_formula_matches_spec_regression() {
        // Regression test named in spec §9: the bounded-ring adjustLineNb
        // off-by-one from the original source must not recur.
        let mut store = RingStore::new(5);
        for s in ["1", "2", "3", "4", "5", "6", "7"] {
            finalize(&mut store, s, false);
        }
        // capacity 5, wrote 7 lines -> retains "3".."7"
        let expected = ["3", "4", "5", "6", "7"];
        for (i, exp) in expected.iter().enumerate() {
            assert_eq!(line_text(&store, i as i64), *exp);
        }
    }

    #[test]
    fn reflow_preserves_content_and_truncates_from_front_when_over_capacity() {
        let mut store = RingStore::new(2);
        finalize(&mut store, "abcdefghij", true); // 10 cols wrapped
        finalize(&mut store, "klmnopqrst", true);
        finalize(&mut store, "uvwxy", false);
        // total logical content: 25 chars across 3 physical lines (all retained, capacity 2 affects only push)
        // Force capacity 2 to already have dropped history before reflow by re-creating with tighter cap:
        let mut tight = RingStore::new(3);
        finalize(&mut tight, "abcdefghij", true);
        finalize(&mut tight, "klmnopqrst", true);
        finalize(&mut tight, "uvwxy", false);
        let dropped = tight.reflow(5);
        assert!(dropped >= 0);
        let total_chars: usize = (0..tight.line_count())
            .map(|i| tight.line_length(i) as usize)
            .sum();
        assert!(total_chars <= 25);
        let _ = store.line_count();
    }
}
