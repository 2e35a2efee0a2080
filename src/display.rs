use serde::Serialize;

use crate::cell::{Cell, LineFlags};
use crate::decoder::CursorStyle;
use crate::screen::Screen;

/// Cursor state handed to a `Display` alongside the grid (spec §4.5/§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CursorSnapshot {
    pub row: u16,
    pub col: u16,
    pub visible: bool,
    pub style: CursorStyleWire,
}

/// Wire-friendly mirror of `decoder::CursorStyle` (kept `Serialize` the
/// way the teacher's `render::frame` types are, for a display that
/// wants to ship frames over IPC or a network socket).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CursorStyleWire {
    Block,
    Underline,
    Bar,
}

impl From<CursorStyle> for CursorStyleWire {
    fn from(style: CursorStyle) -> Self {
        match style {
            CursorStyle::Block => CursorStyleWire::Block,
            CursorStyle::Underline => CursorStyleWire::Underline,
            CursorStyle::Bar => CursorStyleWire::Bar,
        }
    }
}

/// A borrowed, read-only view of the active screen's grid plus cursor
/// and scroll position (spec §4.5's `(image, line_properties, cursor,
/// scroll_position)` tuple). `Screen` keeps ownership of the cell
/// storage; the `Display` only ever sees a borrow for the duration of
/// `Display::set_image` (spec §9 Open Question 2 — the source's
/// `showBulk` free-then-refetch cycle is replaced with a borrow rather
/// than a transferred, owned image).
pub struct ScreenSnapshot<'a> {
    pub rows: u16,
    pub cols: u16,
    pub cells: &'a [Cell],
    pub line_flags: &'a [LineFlags],
    pub cursor: CursorSnapshot,
    /// Absolute row index (history-aware) of visible row 0.
    pub scroll_position: u64,
}

impl<'a> ScreenSnapshot<'a> {
    pub fn from_screen(screen: &'a Screen, cursor_visible: bool, style: CursorStyle) -> Self {
        Self {
            rows: screen.rows(),
            cols: screen.cols(),
            cells: screen.cells(),
            line_flags: screen.all_line_flags(),
            cursor: CursorSnapshot {
                row: screen.cursor_row(),
                col: screen.cursor_col(),
                visible: cursor_visible,
                style: style.into(),
            },
            scroll_position: screen.scroll_count(),
        }
    }

    pub fn cell(&self, row: u16, col: u16) -> Cell {
        if row < self.rows && col < self.cols {
            self.cells[row as usize * self.cols as usize + col as usize]
        } else {
            Cell::default()
        }
    }
}

/// Mouse button identity for `DisplayEvent::Mouse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
}

/// Mouse event phase (press/release/drag), mirroring xterm's mouse
/// protocol vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    Press,
    Release,
    Move,
}

/// Events a `Display` raises toward its `Session` (spec §6's
/// `key_pressed`/`mouse_event`/`resize_requested`/`focus_changed`
/// signals). Replaces the bidirectional signal/slot fan-out the source
/// used with a plain enum a host event loop constructs and feeds to
/// `Session::handle_display_event` (spec §9 Design Notes).
#[derive(Debug, Clone)]
pub enum DisplayEvent {
    Key(crate::keymap::KeyEvent),
    Mouse {
        button: MouseButton,
        col: u16,
        row: u16,
        kind: MouseEventKind,
    },
    ResizeRequested {
        cols: u16,
        rows: u16,
    },
    FocusChanged {
        gained: bool,
    },
}

/// Interface a `Session` consumes to push updates to any attached
/// display (spec §6). Implementors live entirely outside this crate —
/// widget trees, a TUI renderer, a test harness collecting frames,
/// whatever; the core never depends on one concretely.
pub trait Display: Send {
    fn set_image(&mut self, snapshot: ScreenSnapshot<'_>);
    fn set_selection(&mut self, text: &str);
    fn bell(&mut self, message: &str);
}

/// An in-memory `Display` that records the last snapshot it was given,
/// as text. Useful for tests and as the simplest possible host
/// integration; mirrors the `RenderFrame`-collecting test doubles the
/// teacher's own IPC command tests use.
#[derive(Default)]
pub struct RecordingDisplay {
    pub last_text: Option<String>,
    pub last_cursor: Option<CursorSnapshot>,
    pub last_selection: Option<String>,
    pub bells: Vec<String>,
}

impl Display for RecordingDisplay {
    fn set_image(&mut self, snapshot: ScreenSnapshot<'_>) {
        let mut text = String::with_capacity(snapshot.rows as usize * (snapshot.cols as usize + 1));
        for row in 0..snapshot.rows {
            for col in 0..snapshot.cols {
                text.push(snapshot.cell(row, col).c);
            }
            if row + 1 != snapshot.rows {
                text.push('\n');
            }
        }
        self.last_text = Some(text);
        self.last_cursor = Some(snapshot.cursor);
    }

    fn set_selection(&mut self, text: &str) {
        self.last_selection = Some(text.to_string());
    }

    fn bell(&mut self, message: &str) {
        self.bells.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{BackendKind, History};

    #[test]
    fn recording_display_captures_grid_text() {
        let mut screen = Screen::new(2, 3, Some(History::new(BackendKind::None)));
        screen.display_character('h', false, true);
        screen.display_character('i', false, true);
        let mut display = RecordingDisplay::default();
        display.set_image(ScreenSnapshot::from_screen(&screen, true, CursorStyle::Block));
        assert_eq!(display.last_text.as_deref(), Some("hi \n   "));
        assert_eq!(display.last_cursor.unwrap().col, 2);
    }
}
