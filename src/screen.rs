use unicode_width::UnicodeWidthChar;

use crate::cell::{Cell, CellFlags, LineFlags, Rendition};
use crate::charset::CharsetState;
use crate::color::Color;
use crate::history::{History, HistoryStore};

/// A single archived logical line exported as plain text or HTML by
/// `Screen::write_to_stream`.
pub enum ExportFormat {
    PlainText,
    Html,
}

#[derive(Debug, Clone)]
struct SavedCursor {
    row: u16,
    col: u16,
    fg: Color,
    bg: Color,
    rendition: Rendition,
    charset: CharsetState,
}

/// Start/end coordinates of a selection in absolute (history-aware)
/// space, using a monotonically increasing global row counter so the
/// selection survives both scrolling and history re-basing (spec §3).
#[derive(Debug, Clone, Copy)]
pub struct Selection {
    pub start: (u64, u16),
    pub end: (u64, u16),
    pub column_mode: bool,
}

/// A fixed-size rectangular grid of cells with cursor, margins,
/// rendition state, selection, and (for the primary screen only) a
/// scrollback attachment (spec §3/§4.2).
pub struct Screen {
    rows: u16,
    cols: u16,
    cells: Vec<Cell>,
    line_flags: Vec<LineFlags>,

    cursor_row: u16,
    cursor_col: u16,
    /// xterm's "pending wrap" flag: when the cursor sits at the last
    /// column after a printable write with autowrap on, the wrap
    /// itself is deferred until the *next* character arrives, so that a
    /// cursor-position report taken immediately after filling the last
    /// column still shows the last column, not column 0 of the next row.
    wrap_pending: bool,

    cur_fg: Color,
    cur_bg: Color,
    cur_rendition: Rendition,

    top_margin: u16,
    bottom_margin: u16,
    tab_stops: Vec<bool>,

    pub charset: CharsetState,
    saved: Option<SavedCursor>,

    history: Option<History>,
    /// Global index of the next line that will be appended to history.
    /// Monotonic; never decreases even as the backend drops old lines.
    scroll_count: u64,

    selection: Option<Selection>,
}

impl Screen {
    pub fn new(rows: u16, cols: u16, history: Option<History>) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        let mut screen = Self {
            rows,
            cols,
            cells: vec![Cell::default(); rows as usize * cols as usize],
            line_flags: vec![LineFlags::empty(); rows as usize],
            cursor_row: 0,
            cursor_col: 0,
            wrap_pending: false,
            cur_fg: Color::default_fg(),
            cur_bg: Color::default_bg(),
            cur_rendition: Rendition::empty(),
            top_margin: 0,
            bottom_margin: rows - 1,
            tab_stops: vec![false; cols as usize],
            charset: CharsetState::default(),
            saved: None,
            history,
            scroll_count: 0,
            selection: None,
        };
        screen.init_tab_stops(0);
        screen
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn cursor_row(&self) -> u16 {
        self.cursor_row
    }

    pub fn cursor_col(&self) -> u16 {
        self.cursor_col
    }

    pub fn has_history(&self) -> bool {
        self.history.is_some()
    }

    pub fn history(&self) -> Option<&dyn HistoryStore> {
        self.history.as_ref().map(|h| h.store())
    }

    pub fn history_mut(&mut self) -> Option<&mut dyn HistoryStore> {
        self.history.as_mut().map(|h| h.store_mut())
    }

    pub fn swap_history_backend(&mut self, kind: crate::history::BackendKind) -> crate::error::Result<()> {
        match self.history.as_mut() {
            Some(h) => h.swap_backend(kind),
            None => Ok(()),
        }
    }

    fn index(&self, row: u16, col: u16) -> usize {
        row as usize * self.cols as usize + col as usize
    }

    pub fn cell(&self, row: u16, col: u16) -> Cell {
        if row < self.rows && col < self.cols {
            self.cells[self.index(row, col)]
        } else {
            Cell::default()
        }
    }

    pub fn line_flags(&self, row: u16) -> LineFlags {
        self.line_flags.get(row as usize).copied().unwrap_or_default()
    }

    /// Borrow the full cell grid in row-major order, `rows() * cols()`
    /// entries. Used by `display::ScreenSnapshot` to hand a borrow (not
    /// an owned copy) to an attached `Display` (spec §9 Open Question 2).
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Borrow the per-row line-property flags, `rows()` entries.
    pub fn all_line_flags(&self) -> &[LineFlags] {
        &self.line_flags
    }

    /// Total lines ever pushed to history from this screen, used to
    /// express the current scroll position in absolute (history-aware)
    /// coordinates.
    pub fn scroll_count(&self) -> u64 {
        self.scroll_count
    }

    fn clamp_col(&self, col: i32) -> u16 {
        col.clamp(0, self.cols as i32 - 1) as u16
    }

    fn clamp_row_screen(&self, row: i32) -> u16 {
        row.clamp(0, self.rows as i32 - 1) as u16
    }

    fn clamp_row_margins(&self, row: i32, origin_mode: bool) -> u16 {
        if origin_mode {
            row.clamp(self.top_margin as i32, self.bottom_margin as i32) as u16
        } else {
            self.clamp_row_screen(row)
        }
    }

    // ---------------------------------------------------------------
    // Cursor motion
    // ---------------------------------------------------------------

    pub fn cursor_up(&mut self, n: u16, origin_mode: bool) {
        self.wrap_pending = false;
        let floor = if origin_mode { self.top_margin } else { 0 };
        let new_row = self.cursor_row.saturating_sub(n).max(floor);
        self.cursor_row = new_row;
    }

    pub fn cursor_down(&mut self, n: u16, origin_mode: bool) {
        self.wrap_pending = false;
        let ceil = if origin_mode { self.bottom_margin } else { self.rows - 1 };
        self.cursor_row = (self.cursor_row + n).min(ceil);
    }

    pub fn cursor_left(&mut self, n: u16) {
        self.wrap_pending = false;
        self.cursor_col = self.cursor_col.saturating_sub(n);
    }

    pub fn cursor_right(&mut self, n: u16) {
        self.wrap_pending = false;
        self.cursor_col = (self.cursor_col + n).min(self.cols - 1);
    }

    pub fn set_cursor(&mut self, row: u16, col: u16, origin_mode: bool) {
        self.wrap_pending = false;
        self.cursor_row = self.clamp_row_margins(row as i32, origin_mode);
        self.cursor_col = self.clamp_col(col as i32);
    }

    pub fn set_cursor_row(&mut self, row: u16, origin_mode: bool) {
        self.wrap_pending = false;
        self.cursor_row = self.clamp_row_margins(row as i32, origin_mode);
    }

    pub fn set_cursor_col(&mut self, col: u16) {
        self.wrap_pending = false;
        self.cursor_col = self.clamp_col(col as i32);
    }

    pub fn save_cursor(&mut self) {
        self.saved = Some(SavedCursor {
            row: self.cursor_row,
            col: self.cursor_col,
            fg: self.cur_fg,
            bg: self.cur_bg,
            rendition: self.cur_rendition,
            charset: self.charset.clone(),
        });
    }

    pub fn restore_cursor(&mut self) {
        if let Some(s) = self.saved.clone() {
            self.cursor_row = self.clamp_row_screen(s.row as i32);
            self.cursor_col = self.clamp_col(s.col as i32);
            self.cur_fg = s.fg;
            self.cur_bg = s.bg;
            self.cur_rendition = s.rendition;
            self.charset = s.charset;
            self.wrap_pending = false;
        }
    }

    pub fn set_margins(&mut self, top: u16, bottom: u16) {
        let top = top.min(self.rows - 1);
        let bottom = bottom.min(self.rows - 1);
        if top < bottom {
            self.top_margin = top;
            self.bottom_margin = bottom;
        } else {
            self.top_margin = 0;
            self.bottom_margin = self.rows - 1;
        }
    }

    pub fn margins(&self) -> (u16, u16) {
        (self.top_margin, self.bottom_margin)
    }

    // ---------------------------------------------------------------
    // Cursor movement with scrolling
    // ---------------------------------------------------------------

    /// Line feed: move down, scrolling the margin region if already at
    /// the bottom margin. Does not touch the column.
    pub fn new_line(&mut self) {
        self.wrap_pending = false;
        if self.cursor_row == self.bottom_margin {
            self.scroll_up(1, true);
        } else if self.cursor_row < self.rows - 1 {
            self.cursor_row += 1;
        }
    }

    /// NEL: line feed plus carriage return.
    pub fn next_line(&mut self) {
        self.new_line();
        self.cursor_col = 0;
    }

    /// IND (index): same motion as new_line but never changes column,
    /// used directly by ESC D.
    pub fn index(&mut self) {
        self.new_line();
    }

    /// RI (reverse index): move up, scrolling down at the top margin.
    pub fn reverse_index(&mut self) {
        self.wrap_pending = false;
        if self.cursor_row == self.top_margin {
            self.scroll_down(1);
        } else if self.cursor_row > 0 {
            self.cursor_row -= 1;
        }
    }

    pub fn carriage_return(&mut self) {
        self.wrap_pending = false;
        self.cursor_col = 0;
    }

    pub fn backspace(&mut self) {
        self.wrap_pending = false;
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
        }
    }

    pub fn tabulate(&mut self, n: u16) {
        for _ in 0..n.max(1) {
            match (self.cursor_col + 1..self.cols).find(|&c| self.tab_stops[c as usize]) {
                Some(next) => self.cursor_col = next,
                None => {
                    self.cursor_col = self.cols - 1;
                    break;
                }
            }
        }
    }

    pub fn back_tab(&mut self, n: u16) {
        for _ in 0..n.max(1) {
            match (0..self.cursor_col).rev().find(|&c| self.tab_stops[c as usize]) {
                Some(prev) => self.cursor_col = prev,
                None => {
                    self.cursor_col = 0;
                    break;
                }
            }
        }
    }

    // ---------------------------------------------------------------
    // Text output
    // ---------------------------------------------------------------

    /// Write a single code point at the cursor, honoring insert mode
    /// and autowrap (spec §4.2). A code point that renders double-wide
    /// (CJK, emoji, ...) occupies the cursor cell plus a trailing
    /// `WIDE_SPACER` cell, and the cursor advances by its display width
    /// rather than by one column.
    pub fn display_character(&mut self, cp: char, insert_mode: bool, autowrap: bool) {
        if self.wrap_pending {
            self.line_flags[self.cursor_row as usize].insert(LineFlags::WRAPPED);
            self.new_line();
            self.cursor_col = 0;
            self.wrap_pending = false;
        }

        let width = UnicodeWidthChar::width(cp).unwrap_or(1).max(1) as u16;
        let is_wide = width == 2 && self.cursor_col + 1 < self.cols;

        if insert_mode {
            self.shift_right_from(self.cursor_row, self.cursor_col, if is_wide { 2 } else { 1 });
        }

        let cell = Cell {
            c: cp,
            fg: self.cur_fg,
            bg: self.cur_bg,
            rendition: self.cur_rendition,
            flags: if is_wide { CellFlags::WIDE_CHAR } else { CellFlags::empty() },
        };
        let idx = self.index(self.cursor_row, self.cursor_col);
        self.cells[idx] = cell;

        if is_wide {
            let spacer_idx = self.index(self.cursor_row, self.cursor_col + 1);
            self.cells[spacer_idx] = Cell::wide_spacer();
        }

        let advance = if is_wide { 2 } else { 1 };
        if self.cursor_col + advance >= self.cols {
            self.cursor_col = self.cols - 1;
            if autowrap {
                self.wrap_pending = true;
            }
        } else {
            self.cursor_col += advance;
        }
    }

    fn shift_right_from(&mut self, row: u16, col: u16, n: u16) {
        let base = row as usize * self.cols as usize;
        let col = col as usize;
        let n = n as usize;
        let row_end = base + self.cols as usize;
        let mut i = row_end;
        while i > base + col + n {
            self.cells[i - 1] = self.cells[i - 1 - n];
            i -= 1;
        }
        for j in base + col..(base + col + n).min(row_end) {
            self.cells[j] = Cell::blank_with_bg(self.cur_bg);
        }
    }

    // ---------------------------------------------------------------
    // Editing
    // ---------------------------------------------------------------

    pub fn insert_chars(&mut self, n: u16) {
        self.shift_right_from(self.cursor_row, self.cursor_col, n);
    }

    pub fn delete_chars(&mut self, n: u16) {
        let row = self.cursor_row;
        let col = self.cursor_col as usize;
        let n = n as usize;
        let base = row as usize * self.cols as usize;
        let row_end = base + self.cols as usize;
        let mut dst = base + col;
        let mut src = base + col + n;
        while src < row_end {
            self.cells[dst] = self.cells[src];
            dst += 1;
            src += 1;
        }
        while dst < row_end {
            self.cells[dst] = Cell::blank_with_bg(self.cur_bg);
            dst += 1;
        }
    }

    pub fn erase_chars(&mut self, n: u16) {
        let row = self.cursor_row;
        let start = self.cursor_col;
        let end = (start as u32 + n as u32).min(self.cols as u32) as u16;
        self.erase_region(row, start, row, end.saturating_sub(1));
    }

    pub fn insert_lines(&mut self, n: u16) {
        if self.cursor_row < self.top_margin || self.cursor_row > self.bottom_margin {
            return;
        }
        let old_top = self.top_margin;
        self.top_margin = self.cursor_row;
        self.scroll_down_no_history(n);
        self.top_margin = old_top;
    }

    pub fn delete_lines(&mut self, n: u16) {
        if self.cursor_row < self.top_margin || self.cursor_row > self.bottom_margin {
            return;
        }
        let old_top = self.top_margin;
        self.top_margin = self.cursor_row;
        self.scroll_up(n, false);
        self.top_margin = old_top;
    }

    fn erase_region(&mut self, row0: u16, col0: u16, row1: u16, col1: u16) {
        for row in row0..=row1.min(self.rows - 1) {
            let (start, end) = if row0 == row1 {
                (col0, col1)
            } else if row == row0 {
                (col0, self.cols - 1)
            } else if row == row1 {
                (0, col1)
            } else {
                (0, self.cols - 1)
            };
            for col in start..=end.min(self.cols - 1) {
                let idx = self.index(row, col);
                self.cells[idx] = Cell::blank_with_bg(self.cur_bg);
            }
        }
    }

    pub fn clear_entire_screen(&mut self) {
        for c in self.cells.iter_mut() {
            *c = Cell::blank_with_bg(self.cur_bg);
        }
        for f in self.line_flags.iter_mut() {
            *f = LineFlags::empty();
        }
    }

    pub fn clear_to_end_of_screen(&mut self) {
        self.erase_region(self.cursor_row, self.cursor_col, self.rows - 1, self.cols - 1);
    }

    pub fn clear_to_begin_of_screen(&mut self) {
        self.erase_region(0, 0, self.cursor_row, self.cursor_col);
    }

    pub fn clear_entire_line(&mut self) {
        self.erase_region(self.cursor_row, 0, self.cursor_row, self.cols - 1);
    }

    pub fn clear_to_end_of_line(&mut self) {
        self.erase_region(self.cursor_row, self.cursor_col, self.cursor_row, self.cols - 1);
    }

    pub fn clear_to_begin_of_line(&mut self) {
        self.erase_region(self.cursor_row, 0, self.cursor_row, self.cursor_col);
    }

    // ---------------------------------------------------------------
    // Scrolling
    // ---------------------------------------------------------------

    /// Scroll the margin region up by `n` lines. Lines leaving the top
    /// of a non-alt screen are appended to history; `to_history`
    /// governs whether the outgoing top line is archived (the alt
    /// screen discards it instead, per spec §4.2).
    pub fn scroll_up(&mut self, n: u16, to_history: bool) {
        let n = n.min(self.bottom_margin - self.top_margin + 1);
        for _ in 0..n {
            if to_history && self.top_margin == 0 {
                self.archive_top_line();
            }
            let base = self.top_margin as usize * self.cols as usize;
            let next_base = (self.top_margin as usize + 1) * self.cols as usize;
            let region_end = (self.bottom_margin as usize + 1) * self.cols as usize;
            self.cells.copy_within(next_base..region_end, base);
            let blank_start = self.bottom_margin as usize * self.cols as usize;
            for c in &mut self.cells[blank_start..region_end] {
                *c = Cell::blank_with_bg(self.cur_bg);
            }
            self.line_flags.copy_within(
                (self.top_margin as usize + 1)..=(self.bottom_margin as usize),
                self.top_margin as usize,
            );
            self.line_flags[self.bottom_margin as usize] = LineFlags::empty();
        }
    }

    fn scroll_down_no_history(&mut self, n: u16) {
        self.scroll_down(n);
    }

    pub fn scroll_down(&mut self, n: u16) {
        let n = n.min(self.bottom_margin - self.top_margin + 1);
        for _ in 0..n {
            let base = self.top_margin as usize * self.cols as usize;
            let region_end = (self.bottom_margin as usize + 1) * self.cols as usize;
            let src_end = region_end - self.cols as usize;
            self.cells.copy_within(base..src_end, base + self.cols as usize);
            for c in &mut self.cells[base..base + self.cols as usize] {
                *c = Cell::blank_with_bg(self.cur_bg);
            }
            self.line_flags.copy_within(
                (self.top_margin as usize)..(self.bottom_margin as usize),
                self.top_margin as usize + 1,
            );
            self.line_flags[self.top_margin as usize] = LineFlags::empty();
        }
    }

    fn archive_top_line(&mut self) {
        let wrapped = self.line_flags[0].contains(LineFlags::WRAPPED);
        if let Some(history) = self.history.as_mut() {
            let row_cells: Vec<Cell> = self.cells[0..self.cols as usize].to_vec();
            history.store_mut().append_cells(&row_cells);
            history.store_mut().finalize_line(wrapped);
        }
        self.scroll_count += 1;
    }

    // ---------------------------------------------------------------
    // Rendition
    // ---------------------------------------------------------------

    pub fn set_rendition(&mut self, bits: Rendition) {
        self.cur_rendition |= bits;
    }

    pub fn reset_rendition(&mut self, bits: Rendition) {
        self.cur_rendition &= !bits;
    }

    pub fn set_fg_color(&mut self, color: Color) {
        self.cur_fg = color;
    }

    pub fn set_bg_color(&mut self, color: Color) {
        self.cur_bg = color;
    }

    pub fn set_default_rendition(&mut self) {
        self.cur_rendition = Rendition::empty();
        self.cur_fg = Color::default_fg();
        self.cur_bg = Color::default_bg();
    }

    pub fn current_fg(&self) -> Color {
        self.cur_fg
    }

    pub fn current_bg(&self) -> Color {
        self.cur_bg
    }

    pub fn current_rendition(&self) -> Rendition {
        self.cur_rendition
    }

    // ---------------------------------------------------------------
    // Tabs
    // ---------------------------------------------------------------

    pub fn clear_tab_stops(&mut self) {
        for t in self.tab_stops.iter_mut() {
            *t = false;
        }
    }

    pub fn change_tab_stop(&mut self, set: bool) {
        if (self.cursor_col as usize) < self.tab_stops.len() {
            self.tab_stops[self.cursor_col as usize] = set;
        }
    }

    fn init_tab_stops(&mut self, from_col: u16) {
        let mut col = from_col;
        while col < self.cols {
            if col % 8 == 0 {
                self.tab_stops[col as usize] = true;
            }
            col += 1;
        }
    }

    // ---------------------------------------------------------------
    // Resize
    // ---------------------------------------------------------------

    /// Resize the screen in place. Content is preserved top-left; the
    /// cursor is clamped; tab stops are re-initialized from the old
    /// rightmost stop onward; margins reset to full screen. Reflow is
    /// the caller's responsibility (only the primary screen reflows;
    /// spec §4.2).
    pub fn resize(&mut self, new_rows: u16, new_cols: u16) {
        let new_rows = new_rows.max(1);
        let new_cols = new_cols.max(1);
        let old_rows = self.rows;
        let old_cols = self.cols;

        let mut new_cells = vec![Cell::default(); new_rows as usize * new_cols as usize];
        let mut new_flags = vec![LineFlags::empty(); new_rows as usize];
        for row in 0..old_rows.min(new_rows) {
            for col in 0..old_cols.min(new_cols) {
                new_cells[row as usize * new_cols as usize + col as usize] =
                    self.cells[row as usize * old_cols as usize + col as usize];
            }
            new_flags[row as usize] = self.line_flags[row as usize];
        }

        let old_rightmost_stop = self.tab_stops.iter().rposition(|&t| t).map(|i| i as u16 + 1).unwrap_or(0);
        self.tab_stops = vec![false; new_cols as usize];
        self.cells = new_cells;
        self.line_flags = new_flags;
        self.rows = new_rows;
        self.cols = new_cols;
        self.top_margin = 0;
        self.bottom_margin = new_rows - 1;
        self.init_tab_stops(old_rightmost_stop);
        self.cursor_row = self.cursor_row.min(new_rows - 1);
        self.cursor_col = self.cursor_col.min(new_cols - 1);
        self.wrap_pending = false;
    }

    // ---------------------------------------------------------------
    // Selection & export
    // ---------------------------------------------------------------

    fn global_row_for_visible(&self, visible_row: u16) -> u64 {
        self.scroll_count + visible_row as u64
    }

    pub fn begin_selection(&mut self, row: u16, col: u16, column_mode: bool) {
        let g = self.global_row_for_visible(row);
        self.selection = Some(Selection {
            start: (g, col),
            end: (g, col),
            column_mode,
        });
    }

    pub fn extend_selection(&mut self, row: u16, col: u16) {
        if let Some(sel) = self.selection.as_mut() {
            sel.end = (self.global_row_for_visible(row), col);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Oldest globally-retained row index, used to decide whether a
    /// selection endpoint has scrolled out of the retained window.
    fn history_floor(&self) -> u64 {
        let retained = self.history.as_ref().map(|h| h.store().line_count()).unwrap_or(0) as u64;
        self.scroll_count.saturating_sub(retained)
    }

    /// Drop the selection if either endpoint has scrolled below the
    /// retained-history window (spec §8 property 5). Called after every
    /// history-affecting scroll.
    pub fn prune_selection(&mut self) {
        if let Some(sel) = self.selection {
            let floor = self.history_floor();
            if sel.start.0 < floor || sel.end.0 < floor {
                self.selection = None;
            }
        }
    }

    /// Selected text. `preserve_linebreaks` controls whether row
    /// boundaries become `\n` (true) or are joined (false, following
    /// wrapped-line continuation).
    pub fn selected_text(&self, preserve_linebreaks: bool) -> String {
        let Some(sel) = self.selection else {
            return String::new();
        };
        let (mut start, mut end) = (sel.start, sel.end);
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        let floor = self.history_floor();
        let mut out = String::new();
        let mut g = start.0.max(floor);
        while g <= end.0 {
            let (col_start, col_end) = if sel.column_mode {
                (start.1, end.1)
            } else if g == start.0 && g == end.0 {
                (start.1, end.1)
            } else if g == start.0 {
                (start.1, self.cols - 1)
            } else if g == end.0 {
                (0, end.1)
            } else {
                (0, self.cols - 1)
            };
            let line = self.line_text_at_global(g);
            let char_count = line.chars().count();
            let lo = (col_start as usize).min(char_count);
            let hi = ((col_end as usize) + 1).min(char_count);
            out.extend(line.chars().skip(lo).take(hi.saturating_sub(lo)));
            if preserve_linebreaks && g != end.0 {
                out.push('\n');
            }
            g += 1;
        }
        out
    }

    fn line_text_at_global(&self, global_row: u64) -> String {
        let retained = self.history.as_ref().map(|h| h.store().line_count()).unwrap_or(0) as u64;
        let floor = self.scroll_count.saturating_sub(retained);
        if global_row < self.scroll_count {
            if let Some(history) = self.history.as_ref() {
                let local = (global_row - floor) as i64;
                let len = history.store().line_length(local);
                return history
                    .store()
                    .cells_at(local, 0, len)
                    .into_iter()
                    .map(|c| c.c)
                    .collect();
            }
            return String::new();
        }
        let visible_row = (global_row - self.scroll_count) as u16;
        if visible_row >= self.rows {
            return String::new();
        }
        (0..self.cols).map(|c| self.cell(visible_row, c).c).collect()
    }

    /// Export the given visible-row range as plain text or HTML.
    pub fn write_to_stream(&self, format: ExportFormat, start_row: u16, end_row: u16) -> String {
        let mut out = String::new();
        for row in start_row..=end_row.min(self.rows - 1) {
            let mut prev: Option<(Color, Color, Rendition)> = None;
            for col in 0..self.cols {
                let cell = self.cell(row, col);
                match format {
                    ExportFormat::PlainText => out.push(cell.c),
                    ExportFormat::Html => {
                        let style = (cell.fg, cell.bg, cell.rendition);
                        if prev != Some(style) {
                            if prev.is_some() {
                                out.push_str("</span>");
                            }
                            out.push_str(&format!(
                                "<span data-fg=\"{:?}\" data-bg=\"{:?}\" data-rendition=\"{:#x}\">",
                                cell.fg,
                                cell.bg,
                                cell.rendition.bits()
                            ));
                            prev = Some(style);
                        }
                        out.push(cell.c);
                    }
                }
            }
            if matches!(format, ExportFormat::Html) && prev.is_some() {
                out.push_str("</span>");
            }
            if row != end_row {
                out.push('\n');
            }
        }
        out
    }

    /// Full reset: clear content, reset margins/tabs/charset/cursor.
    /// Modes are reset by the caller (Decoder owns the mode vector).
    pub fn reset(&mut self) {
        self.clear_entire_screen();
        self.cursor_row = 0;
        self.cursor_col = 0;
        self.wrap_pending = false;
        self.cur_fg = Color::default_fg();
        self.cur_bg = Color::default_bg();
        self.cur_rendition = Rendition::empty();
        self.top_margin = 0;
        self.bottom_margin = self.rows - 1;
        self.charset.reset();
        self.saved = None;
        self.selection = None;
        self.tab_stops = vec![false; self.cols as usize];
        self.init_tab_stops(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{BackendKind, History};

    fn screen_with_history(rows: u16, cols: u16, cap: usize) -> Screen {
        Screen::new(rows, cols, Some(History::new(BackendKind::Ring { capacity: cap })))
    }

    #[test]
    fn plain_echo_scenario_a() {
        let mut s = screen_with_history(24, 80, 1000);
        for c in "hello".chars() {
            s.display_character(c, false, true);
        }
        s.carriage_return();
        s.new_line();
        let text: String = (0..5).map(|c| s.cell(0, c).c).collect();
        assert_eq!(text, "hello");
        assert_eq!((s.cursor_row(), s.cursor_col()), (1, 0));
        assert_eq!(s.history().unwrap().line_count(), 0);
        assert!(!s.line_flags(0).contains(LineFlags::WRAPPED));
    }

    #[test]
    fn autowrap_defers_to_next_char_and_marks_wrapped() {
        let mut s = screen_with_history(3, 4, 10);
        for c in "abcd".chars() {
            s.display_character(c, false, true);
        }
        // cursor should still report column 3 (pending wrap), not having
        // moved to row 1 yet.
        assert_eq!((s.cursor_row(), s.cursor_col()), (0, 3));
        s.display_character('e', false, true);
        assert!(s.line_flags(0).contains(LineFlags::WRAPPED));
        assert_eq!(s.cell(1, 0).c, 'e');
    }

    #[test]
    fn scroll_up_archives_top_line_to_history() {
        let mut s = screen_with_history(2, 4, 10);
        for c in "abcd".chars() {
            s.display_character(c, false, true);
        }
        s.display_character('e', false, true); // triggers wrap + scroll only after filling row1
        for c in "fgh".chars() {
            s.display_character(c, false, true);
        }
        s.new_line(); // row1 at bottom margin -> scroll_up
        assert_eq!(s.history().unwrap().line_count(), 1);
    }

    #[test]
    fn selection_survives_scroll_until_history_drops_it() {
        let mut s = screen_with_history(2, 4, 1);
        s.begin_selection(0, 0, false);
        s.extend_selection(0, 2);
        assert!(s.selection().is_some());
        s.archive_top_line(); // scroll_count = 1, history retains 1 line -> floor = 0
        s.prune_selection();
        assert!(s.selection().is_some());
        s.archive_top_line(); // scroll_count = 2, ring capacity 1 -> floor = 1, selection row 0 < floor
        s.prune_selection();
        assert!(s.selection().is_none());
    }

    #[test]
    fn resize_preserves_top_left_content_and_clamps_cursor() {
        let mut s = screen_with_history(5, 10, 10);
        for c in "hi".chars() {
            s.display_character(c, false, true);
        }
        s.set_cursor(4, 9, false);
        s.resize(3, 5);
        assert_eq!(s.cell(0, 0).c, 'h');
        assert_eq!(s.cell(0, 1).c, 'i');
        assert_eq!(s.cursor_row(), 2);
        assert_eq!(s.cursor_col(), 4);
    }

    #[test]
    fn wide_character_occupies_two_columns_with_a_spacer() {
        let mut s = screen_with_history(5, 10, 10);
        s.display_character('\u{6f22}', false, true); // a double-width CJK ideograph
        assert_eq!(s.cell(0, 0).c, '\u{6f22}');
        assert!(s.cell(0, 0).flags.contains(crate::cell::CellFlags::WIDE_CHAR));
        assert!(s.cell(0, 1).flags.contains(crate::cell::CellFlags::WIDE_SPACER));
        assert_eq!(s.cursor_col(), 2);
    }

    #[test]
    fn selected_text_slices_by_char_not_byte_for_multibyte_content() {
        let mut s = screen_with_history(3, 10, 10);
        for c in "h\u{e9}llo".chars() {
            // "h\u{e9}llo" = "h", "é" (2 bytes in UTF-8), "l", "l", "o"
            s.display_character(c, false, true);
        }
        s.begin_selection(0, 0, false);
        s.extend_selection(0, 4);
        assert_eq!(s.selected_text(false), "h\u{e9}llo");
    }
}
