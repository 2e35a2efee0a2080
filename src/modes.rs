/// A boolean mode with an independent "saved" shadow slot, used by DEC
/// private-mode save (`CSI ? Pm s`) / restore (`CSI ? Pm r`) sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct SavedFlag {
    pub value: bool,
    saved: Option<bool>,
}

impl SavedFlag {
    pub fn new(value: bool) -> Self {
        Self { value, saved: None }
    }

    pub fn save(&mut self) {
        self.saved = Some(self.value);
    }

    pub fn restore(&mut self) {
        if let Some(v) = self.saved {
            self.value = v;
        }
    }
}

impl From<bool> for SavedFlag {
    fn from(value: bool) -> Self {
        Self::new(value)
    }
}

/// Fixed vector of terminal mode flags (spec §3), each with a saved
/// shadow slot for DEC mode save/restore.
#[derive(Debug, Clone)]
pub struct TerminalModes {
    pub origin: SavedFlag,
    pub wrap: SavedFlag,
    pub insert: SavedFlag,
    pub alt_screen: SavedFlag,
    pub cursor_visible: SavedFlag,
    pub newline_mode: SavedFlag,
    pub column_132: SavedFlag,
    pub app_cursor_keys: SavedFlag,
    pub app_keypad: SavedFlag,
    pub bracketed_paste: SavedFlag,

    // Mouse tracking modes (independent; at most one is normally active
    // but the core does not enforce mutual exclusion, matching xterm).
    pub mouse_button_press: SavedFlag,
    pub mouse_highlight: SavedFlag,
    pub mouse_button_event: SavedFlag,
    pub mouse_any_event: SavedFlag,

    // Mouse reporting encodings.
    pub mouse_utf8: SavedFlag,
    pub mouse_sgr: SavedFlag,
    pub mouse_urxvt: SavedFlag,

    pub focus_events: SavedFlag,
    pub synchronized_output: SavedFlag,
    pub alternate_scroll: SavedFlag,
}

impl Default for TerminalModes {
    fn default() -> Self {
        Self {
            origin: SavedFlag::new(false),
            wrap: SavedFlag::new(true),
            insert: SavedFlag::new(false),
            alt_screen: SavedFlag::new(false),
            cursor_visible: SavedFlag::new(true),
            newline_mode: SavedFlag::new(false),
            column_132: SavedFlag::new(false),
            app_cursor_keys: SavedFlag::new(false),
            app_keypad: SavedFlag::new(false),
            bracketed_paste: SavedFlag::new(false),
            mouse_button_press: SavedFlag::new(false),
            mouse_highlight: SavedFlag::new(false),
            mouse_button_event: SavedFlag::new(false),
            mouse_any_event: SavedFlag::new(false),
            mouse_utf8: SavedFlag::new(false),
            mouse_sgr: SavedFlag::new(false),
            mouse_urxvt: SavedFlag::new(false),
            focus_events: SavedFlag::new(false),
            synchronized_output: SavedFlag::new(false),
            alternate_scroll: SavedFlag::new(false),
        }
    }
}

impl TerminalModes {
    /// Any mouse-tracking mode active (used to decide whether to
    /// translate clicks instead of passing them to the shell).
    pub fn mouse_tracking_active(&self) -> bool {
        self.mouse_button_press.value
            || self.mouse_highlight.value
            || self.mouse_button_event.value
            || self.mouse_any_event.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_flag_round_trips() {
        let mut f = SavedFlag::new(false);
        f.value = true;
        f.save();
        f.value = false;
        f.restore();
        assert!(f.value);
    }

    #[test]
    fn restore_without_save_is_noop() {
        let mut f = SavedFlag::new(true);
        f.restore();
        assert!(f.value);
    }
}
