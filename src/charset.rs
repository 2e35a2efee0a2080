/// One of the four G-set designator slots (G0-G3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GSlot {
    G0,
    G1,
    G2,
    G3,
}

/// Character set selectable into a G-slot. Only the subset actually
/// exercised by real programs (ASCII and DEC special graphics/line
/// drawing) is modeled; anything else designated is accepted and
/// treated as ASCII, matching xterm's liberal behavior for rarely-used
/// national charsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Ascii,
    DecSpecialGraphics,
}

/// Per-screen charset state (spec §3): four G-set slots, the currently
/// selected slot, a line-drawing-graphics flag, and a pound-sign flag
/// (DEC UK national charset maps `#` to `£`).
#[derive(Debug, Clone)]
pub struct CharsetState {
    slots: [Charset; 4],
    active: GSlot,
    pub pound_sign: bool,
    saved: Option<([Charset; 4], GSlot, bool)>,
}

impl Default for CharsetState {
    fn default() -> Self {
        Self {
            slots: [Charset::Ascii; 4],
            active: GSlot::G0,
            pound_sign: false,
            saved: None,
        }
    }
}

impl CharsetState {
    pub fn designate(&mut self, slot: GSlot, charset: Charset) {
        self.slots[slot_index(slot)] = charset;
    }

    pub fn invoke(&mut self, slot: GSlot) {
        self.active = slot;
    }

    pub fn active_charset(&self) -> Charset {
        self.slots[slot_index(self.active)]
    }

    /// Translate a code point through the currently invoked G-set. Only
    /// the DEC special-graphics mapping (line drawing, invoked by `ESC
    /// ( 0`) changes output; ASCII is identity.
    pub fn translate(&self, c: char) -> char {
        match self.active_charset() {
            Charset::Ascii => {
                if self.pound_sign && c == '#' {
                    '£'
                } else {
                    c
                }
            }
            Charset::DecSpecialGraphics => dec_special_graphics(c),
        }
    }

    pub fn save(&mut self) {
        self.saved = Some((self.slots, self.active, self.pound_sign));
    }

    pub fn restore(&mut self) {
        if let Some((slots, active, pound)) = self.saved.take() {
            self.slots = slots;
            self.active = active;
            self.pound_sign = pound;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn slot_index(slot: GSlot) -> usize {
    match slot {
        GSlot::G0 => 0,
        GSlot::G1 => 1,
        GSlot::G2 => 2,
        GSlot::G3 => 3,
    }
}

/// DEC special graphics character set (the VT100 line-drawing set),
/// mapped from ASCII 0x60-0x7e per the xterm/VT520 table.
fn dec_special_graphics(c: char) -> char {
    match c {
        '`' => '◆',
        'a' => '▒',
        'b' => '\u{2409}',
        'c' => '\u{240c}',
        'd' => '\u{240d}',
        'e' => '\u{240a}',
        'f' => '°',
        'g' => '±',
        'h' => '\u{2424}',
        'i' => '\u{240b}',
        'j' => '┘',
        'k' => '┐',
        'l' => '┌',
        'm' => '└',
        'n' => '┼',
        'o' => '⎺',
        'p' => '⎻',
        'q' => '─',
        'r' => '⎼',
        's' => '⎽',
        't' => '├',
        'u' => '┤',
        'v' => '┴',
        'w' => '┬',
        'x' => '│',
        'y' => '≤',
        'z' => '≥',
        '{' => 'π',
        '|' => '≠',
        '}' => '£',
        '~' => '·',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dec_graphics_translates_q_to_horizontal_line() {
        let mut cs = CharsetState::default();
        cs.designate(GSlot::G0, Charset::DecSpecialGraphics);
        cs.invoke(GSlot::G0);
        assert_eq!(cs.translate('q'), '─');
    }

    #[test]
    fn save_restore_round_trips_active_slot() {
        let mut cs = CharsetState::default();
        cs.designate(GSlot::G1, Charset::DecSpecialGraphics);
        cs.invoke(GSlot::G1);
        cs.save();
        cs.invoke(GSlot::G0);
        cs.restore();
        assert_eq!(cs.active_charset(), Charset::DecSpecialGraphics);
    }
}
