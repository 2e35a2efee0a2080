use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use super::{read_cells_padded, reflow_lines, storage_error, HistoryLine, HistoryStore};
use crate::cell::{Cell, CellFlags, Rendition};
use crate::color::{Color, DefaultSlot, Intensity};
use crate::error::TermError;

const CELL_WIDTH: usize = 17;
const LINE_HEADER: usize = 5; // wrapped(1) + col_count(4)

/// Unbounded backend: lines appended to a temporary file unlinked at
/// open (vanishes on process exit), with a side-car index file
/// recording the byte offset of each line start. Random access is two
/// reads: one into the index to find the offset, one into the data
/// file at that offset (spec §3/§4.1).
pub struct FileStore {
    files: Option<RefCell<Files>>,
    count: usize,
    pending: Vec<Cell>,
    warned: bool,
}

struct Files {
    data: File,
    index: File,
    data_len: u64,
}

impl FileStore {
    pub fn new() -> io::Result<Self> {
        let data = tempfile::tempfile()?;
        let index = tempfile::tempfile()?;
        Ok(Self {
            files: Some(RefCell::new(Files {
                data,
                index,
                data_len: 0,
            })),
            count: 0,
            pending: Vec::new(),
            warned: false,
        })
    }

    /// A degraded store with no backing files: behaves like `NoneStore`
    /// but keeps the `FileStore` type identity, used when the temp file
    /// could not be opened at construction time.
    pub fn new_noop() -> Self {
        Self {
            files: None,
            count: 0,
            pending: Vec::new(),
            warned: false,
        }
    }

    fn degrade(&mut self, err: io::Error) -> TermError {
        self.files = None;
        if !self.warned {
            self.warned = true;
            tracing::warn!("history file backend failed, degrading to no-op: {err}");
        }
        storage_error("history file backend", err)
    }

    fn read_line_at(files: &mut Files, offset: u64) -> io::Result<HistoryLine> {
        files.data.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; LINE_HEADER];
        files.data.read_exact(&mut header)?;
        let wrapped = header[0] != 0;
        let col_count = u32::from_le_bytes(header[1..5].try_into().unwrap()) as usize;
        let mut buf = vec![0u8; col_count * CELL_WIDTH];
        files.data.read_exact(&mut buf)?;
        let cells = buf.chunks(CELL_WIDTH).map(decode_cell).collect();
        Ok(HistoryLine { cells, wrapped })
    }

    fn offset_of(files: &mut Files, line: i64) -> io::Result<Option<u64>> {
        if line < 0 {
            return Ok(None);
        }
        let pos = (line as u64) * 8;
        files.index.seek(SeekFrom::Start(pos))?;
        let mut buf = [0u8; 8];
        match files.index.read_exact(&mut buf) {
            Ok(()) => Ok(Some(u64::from_le_bytes(buf))),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn append_line(files: &mut Files, line: &HistoryLine) -> io::Result<()> {
        let offset = files.data_len;
        files.index.seek(SeekFrom::End(0))?;
        files.index.write_all(&offset.to_le_bytes())?;

        files.data.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; LINE_HEADER];
        header[0] = line.wrapped as u8;
        header[1..5].copy_from_slice(&(line.cells.len() as u32).to_le_bytes());
        files.data.write_all(&header)?;
        for cell in &line.cells {
            files.data.write_all(&encode_cell(cell))?;
        }
        files.data_len = offset + LINE_HEADER as u64 + (line.cells.len() * CELL_WIDTH) as u64;
        Ok(())
    }
}

impl HistoryStore for FileStore {
    fn append_cells(&mut self, cells: &[Cell]) {
        if self.files.is_none() {
            return;
        }
        self.pending.extend_from_slice(cells);
    }

    fn finalize_line(&mut self, wrapped: bool) {
        if self.files.is_none() {
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
        let Some(cell) = self.files.as_ref() else {
            return 0;
        };
        let mut files = cell.borrow_mut();
        match Self::offset_of(&mut files, line) {
            Ok(Some(offset)) => match Self::read_line_at(&mut files, offset) {
                Ok(l) => l.cells.len() as i32,
                Err(_) => 0,
            },
            _ => 0,
        }
    }

    fn cells_at(&self, line: i64, col: i32, count: i32) -> Vec<Cell> {
        let Some(cell) = self.files.as_ref() else {
            return vec![Cell::default(); count.max(0) as usize];
        };
        let mut files = cell.borrow_mut();
        match Self::offset_of(&mut files, line).and_then(|o| match o {
            Some(offset) => Self::read_line_at(&mut files, offset).map(Some),
            None => Ok(None),
        }) {
            Ok(Some(l)) => read_cells_padded(&l.cells, col, count),
            _ => vec![Cell::default(); count.max(0) as usize],
        }
    }

    fn is_wrapped(&self, line: i64) -> bool {
        let Some(cell) = self.files.as_ref() else {
            return false;
        };
        let mut files = cell.borrow_mut();
        match Self::offset_of(&mut files, line).and_then(|o| match o {
            Some(offset) => Self::read_line_at(&mut files, offset).map(Some),
            None => Ok(None),
        }) {
            Ok(Some(l)) => l.wrapped,
            _ => false,
        }
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
        let Some(cell) = self.files.as_mut() else {
            return Vec::new();
        };
        let files = cell.get_mut();
        let mut out = Vec::with_capacity(self.count);
        for i in 0..self.count as i64 {
            if let Ok(Some(offset)) = Self::offset_of(files, i) {
                if let Ok(line) = Self::read_line_at(files, offset) {
                    out.push(line);
                }
            }
        }
        // Reset backing files to empty.
        if let Ok(data) = tempfile::tempfile() {
            files.data = data;
        }
        if let Ok(index) = tempfile::tempfile() {
            files.index = index;
        }
        files.data_len = 0;
        self.count = 0;
        out
    }

    fn push_line(&mut self, line: HistoryLine) {
        let err = {
            let Some(cell) = self.files.as_mut() else {
                return;
            };
            Self::append_line(cell.get_mut(), &line).err()
        };
        match err {
            None => self.count += 1,
            Some(e) => {
                let _ = self.degrade(e);
            }
        }
    }
}

fn encode_cell(cell: &Cell) -> [u8; CELL_WIDTH] {
    let mut buf = [0u8; CELL_WIDTH];
    buf[0..4].copy_from_slice(&(cell.c as u32).to_le_bytes());
    buf[4..9].copy_from_slice(&encode_color(cell.fg));
    buf[9..14].copy_from_slice(&encode_color(cell.bg));
    buf[14..16].copy_from_slice(&cell.rendition.bits().to_le_bytes());
    buf[16] = cell.flags.bits();
    buf
}

fn decode_cell(buf: &[u8]) -> Cell {
    let c = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    let c = char::from_u32(c).unwrap_or(' ');
    let fg = decode_color(buf[4..9].try_into().unwrap());
    let bg = decode_color(buf[9..14].try_into().unwrap());
    let rendition = Rendition::from_bits_truncate(u16::from_le_bytes(buf[14..16].try_into().unwrap()));
    let flags = CellFlags::from_bits_truncate(buf[16]);
    Cell {
        c,
        fg,
        bg,
        rendition,
        flags,
    }
}

fn encode_color(c: Color) -> [u8; 5] {
    let mut buf = [0u8; 5];
    match c {
        Color::Undefined => buf[0] = 0,
        Color::Default { slot, intensity } => {
            buf[0] = 1;
            buf[1] = (matches!(slot, DefaultSlot::Background) as u8)
                | ((matches!(intensity, Intensity::Bold) as u8) << 1);
        }
        Color::System { index, intensity } => {
            buf[0] = 2;
            buf[1] = index | ((matches!(intensity, Intensity::Bold) as u8) << 3);
        }
        Color::Indexed(i) => {
            buf[0] = 3;
            buf[1] = i;
        }
        Color::Rgb(r, g, b) => {
            buf[0] = 4;
            buf[1] = r;
            buf[2] = g;
            buf[3] = b;
        }
    }
    buf
}

fn decode_color(buf: [u8; 5]) -> Color {
    match buf[0] {
        1 => Color::Default {
            slot: if buf[1] & 1 != 0 {
                DefaultSlot::Background
            } else {
                DefaultSlot::Foreground
            },
            intensity: if buf[1] & 2 != 0 {
                Intensity::Bold
            } else {
                Intensity::Normal
            },
        },
        2 => Color::System {
            index: buf[1] & 0x7,
            intensity: if buf[1] & 0x8 != 0 {
                Intensity::Bold
            } else {
                Intensity::Normal
            },
        },
        3 => Color::Indexed(buf[1]),
        4 => Color::Rgb(buf[1], buf[2], buf[3]),
        _ => Color::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finalize(store: &mut FileStore, text: &str, wrapped: bool) {
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

    #[test]
    fn round_trips_lines_through_data_and_index_files() {
        let mut store = FileStore::new().unwrap();
        finalize(&mut store, "hello", false);
        finalize(&mut store, "world", true);
        assert_eq!(store.line_count(), 2);
        let text: String = store.cells_at(0, 0, 5).into_iter().map(|c| c.c).collect();
        assert_eq!(text, "hello");
        assert!(!store.is_wrapped(0));
        assert!(store.is_wrapped(1));
    }

    #[test]
    fn color_encoding_round_trips_all_variants() {
        let colors = [
            Color::Undefined,
            Color::default_fg(),
            Color::default_bg(),
            Color::system(3),
            Color::system(11),
            Color::Indexed(200),
            Color::Rgb(10, 20, 30),
        ];
        for c in colors {
            assert_eq!(decode_color(encode_color(c)), c);
        }
    }

    #[test]
    fn reflow_preserves_total_cell_count() {
        let mut store = FileStore::new().unwrap();
        finalize(&mut store, "abcdefghij", true);
        finalize(&mut store, "klmno", false);
        let before: i32 = (0..store.line_count())
            .map(|i| store.line_length(i))
            .sum();
        store.reflow(4);
        let after: i32 = (0..store.line_count())
            .map(|i| store.line_length(i))
            .sum();
        assert_eq!(before, after);
    }
}
