//! Parser for the key-binding text format (spec §6): line-oriented
//! entries of the shape
//! `key <key-name> [ + <modifier> … ] [ ( state-spec ) ] : "<bytes-or-command>"`.
//!
//! Produces `keymap::KeybindEntry` values directly, so a parsed file
//! can be handed straight to `keymap::KeyTranslator::new`.

use crate::keymap::{Command, KeyCode, KeybindEntry, KeyResult, Modifiers, StateFlags};

/// Parse every `key ...` line in `text`, skipping blank lines and
/// `#`-prefixed comments. Malformed lines are skipped rather than
/// aborting the whole file — one bad entry shouldn't take down the
/// rest of the table.
pub fn parse(text: &str) -> Vec<KeybindEntry> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Option<KeybindEntry> {
    let rest = line.strip_prefix("key ")?.trim();
    let (lhs, rhs) = rest.split_once(':')?;
    let lhs = lhs.trim();
    let rhs = rhs.trim();

    let (name_and_mods, state_spec) = match lhs.find('(') {
        Some(open) => {
            let close = lhs.find(')')?;
            (lhs[..open].trim(), Some(&lhs[open + 1..close]))
        }
        None => (lhs, None),
    };

    let mut parts = name_and_mods.split('+').map(str::trim);
    let key_name = parts.next()?;
    let key = parse_key_name(key_name)?;

    let mut modifier_mask = Modifiers::empty();
    let mut modifier_match = Modifiers::empty();
    for token in parts {
        match token {
            "AnyMod" => modifier_mask |= Modifiers::ANY_MOD,
            "Shift" => {
                modifier_mask |= Modifiers::SHIFT;
                modifier_match |= Modifiers::SHIFT;
            }
            "Ctrl" => {
                modifier_mask |= Modifiers::CTRL;
                modifier_match |= Modifiers::CTRL;
            }
            "Alt" => {
                modifier_mask |= Modifiers::ALT;
                modifier_match |= Modifiers::ALT;
            }
            "Meta" => {
                modifier_mask |= Modifiers::META;
                modifier_match |= Modifiers::META;
            }
            "KeyPad" => {
                modifier_mask |= Modifiers::KEYPAD;
                modifier_match |= Modifiers::KEYPAD;
            }
            _ => {}
        }
    }

    let (state_mask, state_match) = parse_state_spec(state_spec.unwrap_or(""));

    let result = parse_result(rhs)?;

    Some(KeybindEntry {
        key,
        modifier_mask,
        modifier_match,
        state_mask,
        state_match,
        result,
    })
}

fn parse_key_name(name: &str) -> Option<KeyCode> {
    Some(match name {
        "Up" => KeyCode::Up,
        "Down" => KeyCode::Down,
        "Left" => KeyCode::Left,
        "Right" => KeyCode::Right,
        "Home" => KeyCode::Home,
        "End" => KeyCode::End,
        "PageUp" => KeyCode::PageUp,
        "PageDown" => KeyCode::PageDown,
        "Insert" => KeyCode::Insert,
        "Delete" => KeyCode::Delete,
        "Backspace" => KeyCode::Backspace,
        "Tab" => KeyCode::Tab,
        "Enter" | "Return" => KeyCode::Enter,
        "Escape" => KeyCode::Escape,
        other if other.starts_with('F') && other[1..].parse::<u8>().is_ok() => {
            KeyCode::F(other[1..].parse().ok()?)
        }
        other if other.chars().count() == 1 => KeyCode::Char(other.chars().next()?),
        _ => return None,
    })
}

fn parse_state_spec(spec: &str) -> (StateFlags, StateFlags) {
    let mut mask = StateFlags::empty();
    let mut matched = StateFlags::empty();
    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (sign, name) = match token.as_bytes()[0] {
            b'+' => (true, &token[1..]),
            b'-' => (false, &token[1..]),
            _ => (true, token),
        };
        let bit = match name {
            "NewLine" => StateFlags::NEWLINE,
            "Ansi" => StateFlags::ANSI,
            "AppCursorKeys" => StateFlags::APP_CURSOR_KEYS,
            "AppScreen" => StateFlags::APP_SCREEN,
            "AppKeypad" => StateFlags::APP_KEYPAD,
            "AnyModifier" => {
                mask |= StateFlags::ANY_MODIFIER;
                continue;
            }
            _ => continue,
        };
        mask |= bit;
        if sign {
            matched |= bit;
        }
    }
    (mask, matched)
}

fn parse_result(rhs: &str) -> Option<KeyResult> {
    if let Some(quoted) = rhs.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return Some(KeyResult::Bytes(unescape(quoted)));
    }
    let command = match rhs {
        "ScrollPageUp" => Command::ScrollPageUp,
        "ScrollLineDown" => Command::ScrollLineDown,
        "ScrollToTop" => Command::ScrollToTop,
        "ScrollToBottom" => Command::ScrollToBottom,
        "ToggleScrollLock" => Command::ToggleScrollLock,
        "EraseCharacter" => Command::EraseCharacter,
        _ => return None,
    };
    Some(KeyResult::Command(command))
}

/// C-style escape decoding: `\n \r \t \\ \"`, `\xHH` hex bytes, `\0NNN`
/// octal bytes.
fn unescape(text: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => out.push(b'\n'),
            Some('r') => out.push(b'\r'),
            Some('t') => out.push(b'\t'),
            Some('\\') => out.push(b'\\'),
            Some('"') => out.push(b'"'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    out.push(byte);
                }
            }
            Some(other) if other.is_ascii_digit() => {
                let mut digits = String::new();
                digits.push(other);
                digits.extend(chars.by_ref().take(2));
                if let Ok(byte) = u8::from_str_radix(&digits, 8) {
                    out.push(byte);
                }
            }
            Some(other) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shifted_arrow_key_with_escape_sequence() {
        let entries = parse(r#"key Up + Shift : "\x1b[1;2A""#);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, KeyCode::Up);
        assert!(entries[0].modifier_mask.contains(Modifiers::SHIFT));
        assert_eq!(entries[0].result, KeyResult::Bytes(vec![0x1b, b'[', b'1', b';', b'2', b'A']));
    }

    #[test]
    fn parses_state_spec_and_command_token() {
        let entries = parse("key PageUp (+AppScreen,-Ansi) : ScrollPageUp\n");
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert!(e.state_mask.contains(StateFlags::APP_SCREEN) && e.state_match.contains(StateFlags::APP_SCREEN));
        assert!(e.state_mask.contains(StateFlags::ANSI) && !e.state_match.contains(StateFlags::ANSI));
        assert_eq!(e.result, KeyResult::Command(Command::ScrollPageUp));
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let entries = parse("# a comment\n\nkey Tab : \"\\t\"\n");
        assert_eq!(entries.len(), 1);
    }
}
