use bitflags::bitflags;

bitflags! {
    /// Key modifiers held during a key event (spec §4.4/§6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT   = 1 << 0;
        const CTRL    = 1 << 1;
        const ALT     = 1 << 2;
        const META    = 1 << 3;
        const KEYPAD  = 1 << 4;
        /// Wildcard bit used only in an entry's `modifier_mask`: when
        /// set, the modifier check always passes regardless of the held
        /// modifiers (spec §6 `AnyMod`).
        const ANY_MOD = 1 << 5;
    }
}

bitflags! {
    /// Terminal-mode snapshot bits consulted by key-binding state specs
    /// (spec §4.4).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct StateFlags: u8 {
        const NEWLINE          = 1 << 0;
        const ANSI             = 1 << 1;
        const APP_CURSOR_KEYS  = 1 << 2;
        const APP_SCREEN       = 1 << 3;
        const APP_KEYPAD       = 1 << 4;
        /// Wildcard bit: an entry that sets this in its `state_mask`
        /// matches regardless of the current state snapshot.
        const ANY_MODIFIER     = 1 << 5;
    }
}

/// Key identity. Named keys cover the ones whose encoding depends on
/// terminal mode; `Char` is the catch-all for everything the entry
/// table doesn't special-case, falling through to the printable-text
/// rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    Backspace,
    Tab,
    Enter,
    Escape,
    F(u8),
    Char(char),
}

#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
    pub state: StateFlags,
}

/// One of the abstract scroll/edit commands a binding may resolve to
/// instead of a literal byte sequence (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ScrollPageUp,
    ScrollLineDown,
    ScrollToTop,
    ScrollToBottom,
    ToggleScrollLock,
    EraseCharacter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult {
    Bytes(Vec<u8>),
    Command(Command),
}

pub struct KeybindEntry {
    pub key: KeyCode,
    pub modifier_mask: Modifiers,
    pub modifier_match: Modifiers,
    pub state_mask: StateFlags,
    pub state_match: StateFlags,
    pub result: KeyResult,
}

impl KeybindEntry {
    fn matches(&self, event: &KeyEvent) -> bool {
        if event.code != self.key {
            return false;
        }
        let modifiers_ok = self.modifier_mask.contains(Modifiers::ANY_MOD)
            || (event.modifiers & self.modifier_mask) == self.modifier_match;
        let state_ok = self.state_mask.contains(StateFlags::ANY_MODIFIER)
            || (event.state & self.state_mask) == self.state_match;
        modifiers_ok && state_ok
    }
}

fn entry(
    key: KeyCode,
    modifier_mask: Modifiers,
    modifier_match: Modifiers,
    state_mask: StateFlags,
    state_match: StateFlags,
    bytes: &[u8],
) -> KeybindEntry {
    KeybindEntry {
        key,
        modifier_mask,
        modifier_match,
        state_mask,
        state_match,
        result: KeyResult::Bytes(bytes.to_vec()),
    }
}

/// Holds an ordered list of key-binding entries and resolves key events
/// against them, falling back to the printable-text rule when nothing
/// matches (spec §4.4). Entries are normally loaded from a persisted
/// key-bindings file (`config::keybindings`); `KeyTranslator::default()`
/// ships a built-in table covering arrow/navigation/function keys under
/// both normal and application-cursor/keypad modes.
pub struct KeyTranslator {
    entries: Vec<KeybindEntry>,
}

impl KeyTranslator {
    pub fn new(entries: Vec<KeybindEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[KeybindEntry] {
        &self.entries
    }

    pub fn lookup(&self, event: &KeyEvent) -> Option<&KeybindEntry> {
        self.entries.iter().find(|e| e.matches(event))
    }

    /// Resolve a key event to bytes or a command, applying the
    /// printable-text fallback rule when no entry matches (spec §4.4):
    /// Alt prepends ESC, Meta prepends the legacy `CAN '@' s` escape,
    /// Control re-encodes the text as a control byte when possible.
    pub fn translate(&self, event: &KeyEvent, text: Option<&str>) -> Option<KeyResult> {
        if let Some(entry) = self.lookup(event) {
            return Some(entry.result.clone());
        }
        let text = text?;
        if text.is_empty() {
            return None;
        }

        let mut out = Vec::new();
        let encoded_as_control = event.modifiers.contains(Modifiers::CTRL)
            && text.chars().count() == 1
            && control_byte(text.chars().next().unwrap()).is_some();

        if event.modifiers.contains(Modifiers::ALT) {
            out.push(0x1b);
        }
        if event.modifiers.contains(Modifiers::META) {
            out.extend_from_slice(&[0x18, b'@', b's']); // CAN '@' s
        }

        if encoded_as_control {
            out.push(control_byte(text.chars().next().unwrap()).unwrap());
        } else {
            out.extend_from_slice(text.as_bytes());
        }

        Some(KeyResult::Bytes(out))
    }
}

impl Clone for KeyResult {
    fn clone(&self) -> Self {
        match self {
            KeyResult::Bytes(b) => KeyResult::Bytes(b.clone()),
            KeyResult::Command(c) => KeyResult::Command(*c),
        }
    }
}

/// Map a single character to its control byte, if the ASCII control-key
/// convention applies (Ctrl-A..Z, and the punctuation keys `@[\]^_?`).
fn control_byte(c: char) -> Option<u8> {
    let upper = c.to_ascii_uppercase();
    match upper {
        '@'..='_' => Some(upper as u8 & 0x1f),
        '?' => Some(0x7f),
        _ => None,
    }
}

impl Default for KeyTranslator {
    fn default() -> Self {
        use KeyCode::*;
        let any = Modifiers::empty();
        let shift = Modifiers::SHIFT;
        let normal_cursor = StateFlags::empty();
        let app_cursor = StateFlags::APP_CURSOR_KEYS;

        let mut entries = vec![
            // Arrow keys: CSI letter normally, SS3 letter in application
            // cursor-key mode.
            entry(Up, any, Modifiers::empty(), app_cursor, StateFlags::empty(), b"\x1b[A"),
            entry(Up, any, Modifiers::empty(), app_cursor, app_cursor, b"\x1bOA"),
            entry(Down, any, Modifiers::empty(), app_cursor, StateFlags::empty(), b"\x1b[B"),
            entry(Down, any, Modifiers::empty(), app_cursor, app_cursor, b"\x1bOB"),
            entry(Right, any, Modifiers::empty(), app_cursor, StateFlags::empty(), b"\x1b[C"),
            entry(Right, any, Modifiers::empty(), app_cursor, app_cursor, b"\x1bOC"),
            entry(Left, any, Modifiers::empty(), app_cursor, StateFlags::empty(), b"\x1b[D"),
            entry(Left, any, Modifiers::empty(), app_cursor, app_cursor, b"\x1bOD"),
            entry(Home, Modifiers::empty(), Modifiers::empty(), StateFlags::empty(), StateFlags::empty(), b"\x1b[H"),
            entry(End, Modifiers::empty(), Modifiers::empty(), StateFlags::empty(), StateFlags::empty(), b"\x1b[F"),
            entry(PageUp, Modifiers::empty(), Modifiers::empty(), StateFlags::empty(), StateFlags::empty(), b"\x1b[5~"),
            entry(PageDown, Modifiers::empty(), Modifiers::empty(), StateFlags::empty(), StateFlags::empty(), b"\x1b[6~"),
            entry(Insert, Modifiers::empty(), Modifiers::empty(), StateFlags::empty(), StateFlags::empty(), b"\x1b[2~"),
            entry(Delete, Modifiers::empty(), Modifiers::empty(), StateFlags::empty(), StateFlags::empty(), b"\x1b[3~"),
            entry(Backspace, Modifiers::empty(), Modifiers::empty(), StateFlags::empty(), StateFlags::empty(), b"\x7f"),
            entry(Tab, shift, shift, StateFlags::empty(), StateFlags::empty(), b"\x1b[Z"),
            entry(Tab, any, Modifiers::empty(), StateFlags::empty(), StateFlags::empty(), b"\t"),
            entry(Enter, any, Modifiers::empty(), StateFlags::NEWLINE, StateFlags::empty(), b"\r"),
            entry(Enter, any, Modifiers::empty(), StateFlags::NEWLINE, StateFlags::NEWLINE, b"\r\n"),
            entry(Escape, Modifiers::empty(), Modifiers::empty(), StateFlags::empty(), StateFlags::empty(), b"\x1b"),
            entry(F(1), Modifiers::empty(), Modifiers::empty(), StateFlags::empty(), StateFlags::empty(), b"\x1bOP"),
            entry(F(2), Modifiers::empty(), Modifiers::empty(), StateFlags::empty(), StateFlags::empty(), b"\x1bOQ"),
            entry(F(3), Modifiers::empty(), Modifiers::empty(), StateFlags::empty(), StateFlags::empty(), b"\x1bOR"),
            entry(F(4), Modifiers::empty(), Modifiers::empty(), StateFlags::empty(), StateFlags::empty(), b"\x1bOS"),
        ];
        for (n, code) in [(5, 15), (6, 17), (7, 18), (8, 19), (9, 20), (10, 21), (11, 23), (12, 24)] {
            entries.push(entry(
                F(n),
                Modifiers::empty(),
                Modifiers::empty(),
                StateFlags::empty(),
                StateFlags::empty(),
                format!("\x1b[{code}~").as_bytes(),
            ));
        }
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(code: KeyCode, modifiers: Modifiers, state: StateFlags) -> KeyEvent {
        KeyEvent { code, modifiers, state }
    }

    #[test]
    fn arrow_keys_switch_encoding_with_app_cursor_mode() {
        let t = KeyTranslator::default();
        let normal = t.translate(&ev(KeyCode::Up, Modifiers::empty(), StateFlags::empty()), None).unwrap();
        assert_eq!(normal, KeyResult::Bytes(b"\x1b[A".to_vec()));
        let app = t.translate(
            &ev(KeyCode::Up, Modifiers::empty(), StateFlags::APP_CURSOR_KEYS),
            None,
        )
        .unwrap();
        assert_eq!(app, KeyResult::Bytes(b"\x1bOA".to_vec()));
    }

    #[test]
    fn printable_text_with_alt_prepends_escape() {
        let t = KeyTranslator::new(Vec::new());
        let out = t
            .translate(&ev(KeyCode::Char('x'), Modifiers::ALT, StateFlags::empty()), Some("x"))
            .unwrap();
        assert_eq!(out, KeyResult::Bytes(vec![0x1b, b'x']));
    }

    #[test]
    fn control_modifier_encodes_control_byte() {
        let t = KeyTranslator::new(Vec::new());
        let out = t
            .translate(&ev(KeyCode::Char('a'), Modifiers::CTRL, StateFlags::empty()), Some("a"))
            .unwrap();
        assert_eq!(out, KeyResult::Bytes(vec![0x01]));
    }

    #[test]
    fn same_event_yields_byte_equal_output_on_repeat() {
        let t = KeyTranslator::default();
        let event = ev(KeyCode::PageUp, Modifiers::empty(), StateFlags::empty());
        let a = t.translate(&event, None).unwrap();
        let b = t.translate(&event, None).unwrap();
        assert_eq!(a, b);
    }
}
