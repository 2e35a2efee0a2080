use super::{read_cells_padded, reflow_lines, HistoryLine, HistoryStore};
use crate::cell::Cell;

/// Block-array backend: an optimization for fixed-block streaming
/// consumers (spec §3/§4.1). Unbounded like the file backend, but keeps
/// lines grouped into fixed-size in-memory blocks rather than one big
/// growable vector, so a consumer reading in block-sized strides can
/// avoid reallocation churn. Omitted from the default wiring; present
/// here for block-based consumers that want it.
pub struct BlockStore {
    block_size: usize,
    blocks: Vec<Vec<HistoryLine>>,
    count: usize,
    pending: Vec<Cell>,
}

impl BlockStore {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            blocks: Vec::new(),
            count: 0,
            pending: Vec::new(),
        }
    }

    fn get(&self, line: i64) -> Option<&HistoryLine> {
        if line < 0 || line as usize >= self.count {
            return None;
        }
        let idx = line as usize;
        self.blocks
            .get(idx / self.block_size)
            .and_then(|b| b.get(idx % self.block_size))
    }
}

impl HistoryStore for BlockStore {
    fn append_cells(&mut self, cells: &[Cell]) {
        self.pending.extend_from_slice(cells);
    }

    fn finalize_line(&mut self, wrapped: bool) {
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
        let reflowed = reflow_lines(all, new_columns as usize);
        for line in reflowed {
            self.push_line(line);
        }
        0
    }

    fn capacity(&self) -> Option<usize> {
        None
    }

    fn drain_all(&mut self) -> Vec<HistoryLine> {
        let out = self.blocks.drain(..).flatten().collect();
        self.count = 0;
        out
    }

    fn push_line(&mut self, line: HistoryLine) {
        if self.blocks.last().map(|b| b.len()).unwrap_or(self.block_size) >= self.block_size {
            self.blocks.push(Vec::with_capacity(self.block_size));
        }
        self.blocks.last_mut().unwrap().push(line);
        self.count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_multiple_blocks_transparently() {
        let mut store = BlockStore::new(2);
        for s in ["a", "b", "c", "d", "e"] {
            store.append_cells(&[Cell {
                c: s.chars().next().unwrap(),
                ..Cell::default()
            }]);
            store.finalize_line(false);
        }
        assert_eq!(store.line_count(), 5);
        assert_eq!(store.blocks.len(), 3);
        assert_eq!(store.cells_at(4, 0, 1)[0].c, 'e');
    }
}
