use bitflags::bitflags;

use crate::color::Color;

bitflags! {
    /// Rendition bit-set (spec §3): bold, faint, italic, underline,
    /// blink, reverse, conceal, strikeout, overline, and a cursor
    /// marker. Equality on `Cell` ignores `CURSOR`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Rendition: u16 {
        const BOLD        = 1 << 0;
        const FAINT        = 1 << 1;
        const ITALIC       = 1 << 2;
        const UNDERLINE    = 1 << 3;
        const BLINK        = 1 << 4;
        const REVERSE      = 1 << 5;
        const CONCEAL      = 1 << 6;
        const STRIKEOUT    = 1 << 7;
        const OVERLINE     = 1 << 8;
        /// Cursor-marker bit: set transiently on the cell under the
        /// cursor when rendering; never persisted or compared by
        /// `Cell::eq`.
        const CURSOR       = 1 << 9;
    }
}

bitflags! {
    /// Per-cell flags for wide-character tracking.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct CellFlags: u8 {
        const WIDE_CHAR   = 1 << 0;
        const WIDE_SPACER = 1 << 1;
    }
}

/// The atomic styled code point (spec §3). Equality is total but
/// ignores the cursor marker bit in `rendition`.
#[derive(Debug, Clone, Copy)]
pub struct Cell {
    pub c: char,
    pub fg: Color,
    pub bg: Color,
    pub rendition: Rendition,
    pub flags: CellFlags,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            c: ' ',
            fg: Color::default_fg(),
            bg: Color::default_bg(),
            rendition: Rendition::empty(),
            flags: CellFlags::empty(),
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.c == other.c
            && self.fg == other.fg
            && self.bg == other.bg
            && (self.rendition - Rendition::CURSOR) == (other.rendition - Rendition::CURSOR)
            && self.flags == other.flags
    }
}
impl Eq for Cell {}

impl Cell {
    pub fn wide_spacer() -> Self {
        Self {
            c: ' ',
            flags: CellFlags::WIDE_SPACER,
            ..Default::default()
        }
    }

    /// Reset to a blank cell carrying the given background (SGR default
    /// attributes, per ECMA-48 erase semantics).
    pub fn blank_with_bg(bg: Color) -> Self {
        Self {
            c: ' ',
            fg: Color::default_fg(),
            bg,
            rendition: Rendition::empty(),
            flags: CellFlags::empty(),
        }
    }
}

bitflags! {
    /// Per-row line properties (spec §3): wrapped, double-width,
    /// double-height (top/bottom half).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct LineFlags: u8 {
        const WRAPPED         = 1 << 0;
        const DOUBLE_WIDTH    = 1 << 1;
        const DOUBLE_HEIGHT_TOP    = 1 << 2;
        const DOUBLE_HEIGHT_BOTTOM = 1 << 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_eq_ignores_cursor_marker() {
        let mut a = Cell::default();
        let mut b = Cell::default();
        a.rendition |= Rendition::CURSOR;
        assert_eq!(a, b);
        b.rendition |= Rendition::BOLD;
        assert_ne!(a, b);
    }

    #[test]
    fn blank_with_bg_keeps_background_only() {
        let cell = Cell::blank_with_bg(Color::system(4));
        assert_eq!(cell.c, ' ');
        assert_eq!(cell.bg, Color::system(4));
        assert_eq!(cell.fg, Color::default_fg());
        assert!(cell.rendition.is_empty());
    }
}
