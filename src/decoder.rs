use crate::cell::Rendition;
use crate::charset::{Charset, GSlot};
use crate::color::{Color, DefaultSlot, Intensity};
use crate::error::DiagnosticRing;
use crate::history::History;
use crate::modes::TerminalModes;
use crate::screen::Screen;

/// Cursor style set by DECSCUSR (`CSI Ps SP q`). Not part of `Cell`/`Screen`
/// data (spec §3) — it is terminal-global display state, grounded the same
/// way as `TerminalModes` (spec §9 Open Question 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStyle {
    Block,
    Underline,
    Bar,
}

/// Session-attribute update driven by an OSC sequence (spec §4.3/§6). The
/// `Decoder` never touches title/palette/cwd state directly — it queues
/// these for the owning `Session` to apply, since composition (user-set vs.
/// program-set title, etc.) is a `Session` responsibility (spec §4.6).
#[derive(Debug, Clone)]
pub enum OscEvent {
    /// OSC 0 (icon+title) or OSC 2 (title only).
    Title(String),
    /// OSC 1 (icon only).
    Icon(String),
    /// OSC 7: working-directory URL.
    WorkingDirectory(String),
    /// OSC 10/11: text/background color (RGB query responses are written
    /// directly to `pending_responses`; this variant fires on a *set*).
    PaletteDefault { slot: DefaultSlot, rgb: (u8, u8, u8) },
    /// OSC 30 (non-standard): session name.
    SessionName(String),
    /// OSC 32 (non-standard): session icon.
    SessionIcon(String),
    /// OSC 50 (non-standard): `property=value[;property=value]...` profile change.
    ProfileChange(String),
}

/// Terminal-level events the decoder surfaces alongside OSC session
/// attributes: bell, alt-screen transitions (for notification bookkeeping),
/// and mode changes a display might care about.
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderEvent {
    Bell,
    AltScreenEntered,
    AltScreenExited,
    CursorStyleChanged(CursorStyle),
}

const MAX_CSI_PARAMS: usize = 16;
const MAX_PARAM_VALUE: u16 = 4096;
const MAX_ESCAPE_BUFFER: usize = 4096;

/// VT100/VT102/xterm byte-stream tokenizer + dispatcher (spec §4.3). Holds
/// both Screens, the terminal-global mode vector, and saved-cursor state.
/// Built on `vte::Parser` for tokenization — the same crate and `Perform`
/// pattern the original `TerminalState` used — generalized to dispatch the
/// full 5-variant SGR color grammar, a VT52 gate, and a bounded diagnostic
/// ring instead of silently dropping unhandled sequences.
pub struct Decoder {
    parser: vte::Parser,
    pub primary: Screen,
    pub alternate: Screen,
    pub using_alt: bool,
    pub modes: TerminalModes,
    pub cursor_style: CursorStyle,
    vt52_mode: bool,
    rows: u16,
    cols: u16,
    dcs_buffer: Vec<u8>,
    dcs_intermediates: Vec<u8>,
    dcs_action: Option<char>,
    pub diagnostics: DiagnosticRing,
    pending_responses: Vec<Vec<u8>>,
    pending_osc: Vec<OscEvent>,
    pending_events: Vec<DecoderEvent>,
    allow_132_columns: bool,
}

impl Decoder {
    pub fn new(rows: u16, cols: u16, history: Option<History>) -> Self {
        Self {
            parser: vte::Parser::new(),
            primary: Screen::new(rows, cols, history),
            alternate: Screen::new(rows, cols, None),
            using_alt: false,
            modes: TerminalModes::default(),
            cursor_style: CursorStyle::Block,
            vt52_mode: false,
            rows,
            cols,
            dcs_buffer: Vec::new(),
            dcs_intermediates: Vec::new(),
            dcs_action: None,
            diagnostics: DiagnosticRing::new(),
            pending_responses: Vec::new(),
            pending_osc: Vec::new(),
            pending_events: Vec::new(),
            allow_132_columns: true,
        }
    }

    pub fn active_screen(&self) -> &Screen {
        if self.using_alt {
            &self.alternate
        } else {
            &self.primary
        }
    }

    pub fn active_screen_mut(&mut self) -> &mut Screen {
        if self.using_alt {
            &mut self.alternate
        } else {
            &mut self.primary
        }
    }

    pub fn take_pending_responses(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending_responses)
    }

    pub fn take_pending_osc(&mut self) -> Vec<OscEvent> {
        std::mem::take(&mut self.pending_osc)
    }

    pub fn take_pending_events(&mut self) -> Vec<DecoderEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.rows = rows;
        self.cols = cols;
        self.primary.resize(rows, cols);
        self.alternate.resize(rows, cols);
        if let Some(history) = self.primary.history_mut() {
            history.reflow(cols as i32);
        }
    }

    /// Feed a chunk of PTY output through the tokenizer. Bytes are
    /// dispatched strictly in arrival order (spec §5); responses queued by
    /// a token (DSR, DA, CPR) are available afterward via
    /// `take_pending_responses`.
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.vt52_mode {
            self.feed_vt52(bytes);
            return;
        }
        let mut parser = std::mem::replace(&mut self.parser, vte::Parser::new());
        for &b in bytes {
            parser.advance(self, b);
        }
        self.parser = parser;
    }

    /// Minimal VT52 subset (spec §4.3): a handful of two-byte `ESC x`
    /// sequences, re-entering ANSI mode on `ESC <`.
    fn feed_vt52(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if b != 0x1b {
                if b >= 0x20 {
                    let wrap = self.modes.wrap.value;
                    self.active_screen_mut().display_character(b as char, false, wrap);
                } else {
                    self.execute_c0(b);
                }
                i += 1;
                continue;
            }
            let Some(&next) = bytes.get(i + 1) else {
                break;
            };
            match next {
                b'<' => {
                    self.vt52_mode = false;
                }
                b'A' => self.active_screen_mut().cursor_up(1, false),
                b'B' => self.active_screen_mut().cursor_down(1, false),
                b'C' => self.active_screen_mut().cursor_right(1),
                b'D' => self.active_screen_mut().cursor_left(1),
                b'H' => self.active_screen_mut().set_cursor(0, 0, false),
                b'I' => self.active_screen_mut().reverse_index(),
                b'J' => self.active_screen_mut().clear_to_end_of_screen(),
                b'K' => self.active_screen_mut().clear_to_end_of_line(),
                b'Y' => {
                    if let (Some(&row), Some(&col)) = (bytes.get(i + 2), bytes.get(i + 3)) {
                        let r = row.saturating_sub(0x20);
                        let c = col.saturating_sub(0x20);
                        self.active_screen_mut().set_cursor(r as u16, c as u16, false);
                        i += 2;
                    }
                }
                _ => {
                    self.diagnostics.push(format!("unhandled VT52 escape {next:#x}"));
                }
            }
            i += 2;
        }
    }

    fn execute_c0(&mut self, byte: u8) {
        match byte {
            0x07 => self.pending_events.push(DecoderEvent::Bell),
            0x08 => self.active_screen_mut().backspace(),
            0x09 => self.active_screen_mut().tabulate(1),
            0x0a | 0x0b | 0x0c => {
                self.active_screen_mut().new_line();
                if self.modes.newline_mode.value {
                    self.active_screen_mut().carriage_return();
                }
            }
            0x0d => self.active_screen_mut().carriage_return(),
            0x0e => self.active_screen_mut().charset.invoke(GSlot::G1),
            0x0f => self.active_screen_mut().charset.invoke(GSlot::G0),
            _ => {}
        }
    }

    fn enter_alt_screen(&mut self) {
        if !self.using_alt {
            self.primary.save_cursor();
            self.using_alt = true;
            self.modes.alt_screen.value = true;
            self.pending_events.push(DecoderEvent::AltScreenEntered);
        }
    }

    fn exit_alt_screen(&mut self) {
        if self.using_alt {
            self.using_alt = false;
            self.modes.alt_screen.value = false;
            self.primary.restore_cursor();
            self.pending_events.push(DecoderEvent::AltScreenExited);
        }
    }

    fn set_dec_mode(&mut self, params: &[u16], enable: bool) {
        for &p in params {
            match p {
                1 => self.modes.app_cursor_keys.value = enable,
                3 => {
                    if self.allow_132_columns {
                        self.modes.column_132.value = enable;
                    }
                }
                6 => {
                    self.modes.origin.value = enable;
                    let screen = self.active_screen_mut();
                    if enable {
                        let (top, _) = screen.margins();
                        screen.set_cursor(top, 0, true);
                    } else {
                        screen.set_cursor(0, 0, false);
                    }
                }
                7 => self.modes.wrap.value = enable,
                25 => self.modes.cursor_visible.value = enable,
                1000 => self.modes.mouse_button_press.value = enable,
                1001 => self.modes.mouse_highlight.value = enable,
                1002 => self.modes.mouse_button_event.value = enable,
                1003 => self.modes.mouse_any_event.value = enable,
                1004 => self.modes.focus_events.value = enable,
                1005 => self.modes.mouse_utf8.value = enable,
                1006 => self.modes.mouse_sgr.value = enable,
                1007 => self.modes.alternate_scroll.value = enable,
                1015 => self.modes.mouse_urxvt.value = enable,
                1047 => {
                    if enable {
                        self.enter_alt_screen();
                        self.alternate.clear_entire_screen();
                    } else {
                        self.exit_alt_screen();
                    }
                }
                1048 => {
                    if enable {
                        self.primary.save_cursor();
                    } else {
                        self.primary.restore_cursor();
                    }
                }
                1049 => {
                    if enable {
                        self.enter_alt_screen();
                        self.alternate.clear_entire_screen();
                    } else {
                        self.exit_alt_screen();
                    }
                }
                2004 => self.modes.bracketed_paste.value = enable,
                2026 => self.modes.synchronized_output.value = enable,
                _ => {
                    self.diagnostics.push(format!("unhandled DEC private mode {p}"));
                }
            }
        }
    }

    /// `CSI ? Pm s`: push the current value of each named DEC private
    /// mode onto its `SavedFlag` shadow slot (spec §3's "saved shadow
    /// slot used by save/restore escape sequences").
    fn save_dec_mode(&mut self, params: &[u16]) {
        for &p in params {
            match p {
                1 => self.modes.app_cursor_keys.save(),
                3 => self.modes.column_132.save(),
                6 => self.modes.origin.save(),
                7 => self.modes.wrap.save(),
                25 => self.modes.cursor_visible.save(),
                1000 => self.modes.mouse_button_press.save(),
                1001 => self.modes.mouse_highlight.save(),
                1002 => self.modes.mouse_button_event.save(),
                1003 => self.modes.mouse_any_event.save(),
                1004 => self.modes.focus_events.save(),
                1005 => self.modes.mouse_utf8.save(),
                1006 => self.modes.mouse_sgr.save(),
                1007 => self.modes.alternate_scroll.save(),
                1015 => self.modes.mouse_urxvt.save(),
                1047 | 1049 => self.modes.alt_screen.save(),
                2004 => self.modes.bracketed_paste.save(),
                2026 => self.modes.synchronized_output.save(),
                _ => {
                    self.diagnostics.push(format!("unhandled DEC private mode save {p}"));
                }
            }
        }
    }

    /// `CSI ? Pm r`: restore each named DEC private mode from its
    /// `SavedFlag` shadow slot (a no-op per mode if it was never saved).
    fn restore_dec_mode(&mut self, params: &[u16]) {
        for &p in params {
            match p {
                1 => self.modes.app_cursor_keys.restore(),
                3 => {
                    if self.allow_132_columns {
                        self.modes.column_132.restore();
                    }
                }
                6 => self.modes.origin.restore(),
                7 => self.modes.wrap.restore(),
                25 => self.modes.cursor_visible.restore(),
                1000 => self.modes.mouse_button_press.restore(),
                1001 => self.modes.mouse_highlight.restore(),
                1002 => self.modes.mouse_button_event.restore(),
                1003 => self.modes.mouse_any_event.restore(),
                1004 => self.modes.focus_events.restore(),
                1005 => self.modes.mouse_utf8.restore(),
                1006 => self.modes.mouse_sgr.restore(),
                1007 => self.modes.alternate_scroll.restore(),
                1015 => self.modes.mouse_urxvt.restore(),
                1047 | 1049 => self.modes.alt_screen.restore(),
                2004 => self.modes.bracketed_paste.restore(),
                2026 => self.modes.synchronized_output.restore(),
                _ => {
                    self.diagnostics.push(format!("unhandled DEC private mode restore {p}"));
                }
            }
        }
    }

    fn set_ansi_mode(&mut self, params: &[u16], enable: bool) {
        for &p in params {
            match p {
                4 => self.modes.insert.value = enable,
                20 => self.modes.newline_mode.value = enable,
                _ => {
                    self.diagnostics.push(format!("unhandled ANSI mode {p}"));
                }
            }
        }
    }

    fn handle_sgr(&mut self, raw: &[u16]) {
        let params = if raw.is_empty() { &[0u16][..] } else { raw };
        let screen = self.active_screen_mut();
        let mut i = 0;
        while i < params.len() {
            match params[i] {
                0 => screen.set_default_rendition(),
                1 => {
                    screen.set_rendition(Rendition::BOLD);
                    let fg = screen.current_fg().with_bold();
                    screen.set_fg_color(fg);
                }
                2 => screen.set_rendition(Rendition::FAINT),
                3 => screen.set_rendition(Rendition::ITALIC),
                4 => screen.set_rendition(Rendition::UNDERLINE),
                5 => screen.set_rendition(Rendition::BLINK),
                7 => screen.set_rendition(Rendition::REVERSE),
                8 => screen.set_rendition(Rendition::CONCEAL),
                9 => screen.set_rendition(Rendition::STRIKEOUT),
                22 => screen.reset_rendition(Rendition::BOLD | Rendition::FAINT),
                23 => screen.reset_rendition(Rendition::ITALIC),
                24 => screen.reset_rendition(Rendition::UNDERLINE),
                25 => screen.reset_rendition(Rendition::BLINK),
                27 => screen.reset_rendition(Rendition::REVERSE),
                28 => screen.reset_rendition(Rendition::CONCEAL),
                29 => screen.reset_rendition(Rendition::STRIKEOUT),
                53 => screen.set_rendition(Rendition::OVERLINE),
                55 => screen.reset_rendition(Rendition::OVERLINE),
                30..=37 => screen.set_fg_color(Color::system(params[i] as u8 - 30)),
                38 => {
                    if let Some(consumed) = parse_extended_color(&params[i + 1..]) {
                        screen.set_fg_color(consumed.0);
                        i += consumed.1;
                    }
                }
                39 => screen.set_fg_color(Color::default_fg()),
                40..=47 => screen.set_bg_color(Color::system(params[i] as u8 - 40)),
                48 => {
                    if let Some(consumed) = parse_extended_color(&params[i + 1..]) {
                        screen.set_bg_color(consumed.0);
                        i += consumed.1;
                    }
                }
                49 => screen.set_bg_color(Color::default_bg()),
                90..=97 => screen.set_fg_color(Color::system(params[i] as u8 - 90 + 8)),
                100..=107 => screen.set_bg_color(Color::system(params[i] as u8 - 100 + 8)),
                _ => {}
            }
            i += 1;
        }
    }

    fn report_cursor_position(&mut self) {
        let screen = self.active_screen();
        let response = format!("\x1b[{};{}R", screen.cursor_row() + 1, screen.cursor_col() + 1);
        self.pending_responses.push(response.into_bytes());
    }

    fn report_device_status(&mut self) {
        self.pending_responses.push(b"\x1b[0n".to_vec());
    }

    fn report_primary_device_attributes(&mut self) {
        self.pending_responses.push(b"\x1b[?62;22c".to_vec());
    }

    fn report_secondary_device_attributes(&mut self) {
        self.pending_responses.push(b"\x1b[>0;10;0c".to_vec());
    }

    /// Full reset (spec §4.3): clears both screens, resets charsets,
    /// margins and cursor style, and restores every mode to its power-on
    /// default. The scrollback backend itself is left alone — RIS clears
    /// visible content, not history a user may still want to scroll back
    /// through.
    pub fn reset(&mut self) {
        self.primary.reset();
        self.alternate.reset();
        self.using_alt = false;
        self.modes = TerminalModes::default();
        self.cursor_style = CursorStyle::Block;
        self.vt52_mode = false;
        self.dcs_buffer.clear();
        self.dcs_intermediates.clear();
        self.dcs_action = None;
        self.pending_responses.clear();
        self.pending_osc.clear();
        self.pending_events.clear();
    }
}

/// Parse `2;r;g;b` (direct RGB) or `5;n` (indexed-256) from the tail of an
/// SGR 38/48 parameter list. Returns the color and how many extra params
/// were consumed, so the caller can skip them in the outer loop — this is
/// what lets `38;2;r;g;b` be recognised inline within a longer SGR list
/// that has other params before and after it (spec §4.3).
fn parse_extended_color(rest: &[u16]) -> Option<(Color, usize)> {
    match rest.first()? {
        2 => {
            let r = *rest.get(1)? as u8;
            let g = *rest.get(2)? as u8;
            let b = *rest.get(3)? as u8;
            Some((Color::Rgb(r, g, b), 4))
        }
        5 => {
            let n = *rest.get(1)? as u8;
            Some((Color::Indexed(n), 2))
        }
        _ => None,
    }
}

fn extract_params(params: &vte::Params) -> Vec<u16> {
    params
        .iter()
        .flat_map(|sub| sub.iter().copied())
        .take(MAX_CSI_PARAMS)
        .map(|v| v.min(MAX_PARAM_VALUE))
        .collect()
}

fn param(params: &[u16], idx: usize, default: u16) -> u16 {
    params.get(idx).copied().filter(|&v| v != 0).unwrap_or(default)
}

impl vte::Perform for Decoder {
    fn print(&mut self, c: char) {
        let insert = self.modes.insert.value;
        let wrap = self.modes.wrap.value;
        let screen = self.active_screen_mut();
        let translated = screen.charset.translate(c);
        screen.display_character(translated, insert, wrap);
    }

    fn execute(&mut self, byte: u8) {
        self.execute_c0(byte);
    }

    fn csi_dispatch(&mut self, params: &vte::Params, intermediates: &[u8], _ignore: bool, action: char) {
        let raw = extract_params(params);
        let is_private = intermediates.contains(&b'?');
        let has_gt = intermediates.contains(&b'>');
        let has_dollar = intermediates.contains(&b'$');
        let has_space = intermediates.contains(&b' ');
        let origin = self.modes.origin.value;

        if action == 'c' && has_gt {
            if param(&raw, 0, 0) == 0 {
                self.report_secondary_device_attributes();
            }
            return;
        }

        if has_space && action == 'q' {
            self.cursor_style = match param(&raw, 0, 1) {
                0 | 1 | 2 => CursorStyle::Block,
                3 | 4 => CursorStyle::Underline,
                5 | 6 => CursorStyle::Bar,
                _ => self.cursor_style,
            };
            self.pending_events.push(DecoderEvent::CursorStyleChanged(self.cursor_style));
            return;
        }

        if has_dollar {
            // DECRQM / RQM mode reports: acknowledged but not modeled in depth.
            return;
        }

        match (action, is_private) {
            ('A', false) => self.active_screen_mut().cursor_up(param(&raw, 0, 1), origin),
            ('B', false) => self.active_screen_mut().cursor_down(param(&raw, 0, 1), origin),
            ('C', false) => self.active_screen_mut().cursor_right(param(&raw, 0, 1)),
            ('D', false) => self.active_screen_mut().cursor_left(param(&raw, 0, 1)),
            ('E', false) => {
                let n = param(&raw, 0, 1);
                let screen = self.active_screen_mut();
                screen.carriage_return();
                screen.cursor_down(n, origin);
            }
            ('F', false) => {
                let n = param(&raw, 0, 1);
                let screen = self.active_screen_mut();
                screen.carriage_return();
                screen.cursor_up(n, origin);
            }
            ('G' | '`', false) => {
                let col = param(&raw, 0, 1).saturating_sub(1);
                self.active_screen_mut().set_cursor_col(col);
            }
            ('H' | 'f', false) => {
                let row = param(&raw, 0, 1).saturating_sub(1);
                let col = param(&raw, 1, 1).saturating_sub(1);
                self.active_screen_mut().set_cursor(row, col, origin);
            }
            ('I', false) => self.active_screen_mut().tabulate(param(&raw, 0, 1)),
            ('J', false) => match param(&raw, 0, 0) {
                0 => self.active_screen_mut().clear_to_end_of_screen(),
                1 => self.active_screen_mut().clear_to_begin_of_screen(),
                2 | 3 => self.active_screen_mut().clear_entire_screen(),
                _ => {}
            },
            ('K', false) => match param(&raw, 0, 0) {
                0 => self.active_screen_mut().clear_to_end_of_line(),
                1 => self.active_screen_mut().clear_to_begin_of_line(),
                2 => self.active_screen_mut().clear_entire_line(),
                _ => {}
            },
            ('L', false) => self.active_screen_mut().insert_lines(param(&raw, 0, 1)),
            ('M', false) => self.active_screen_mut().delete_lines(param(&raw, 0, 1)),
            ('P', false) => self.active_screen_mut().delete_chars(param(&raw, 0, 1)),
            ('S', false) => self.active_screen_mut().scroll_up(param(&raw, 0, 1), false),
            ('T', false) => self.active_screen_mut().scroll_down(param(&raw, 0, 1)),
            ('X', false) => self.active_screen_mut().erase_chars(param(&raw, 0, 1)),
            ('Z', false) => self.active_screen_mut().back_tab(param(&raw, 0, 1)),
            ('@', false) => self.active_screen_mut().insert_chars(param(&raw, 0, 1)),
            ('d', false) => {
                let row = param(&raw, 0, 1).saturating_sub(1);
                self.active_screen_mut().set_cursor_row(row, origin);
            }
            ('g', false) => match param(&raw, 0, 0) {
                0 => self.active_screen_mut().change_tab_stop(false),
                3 => self.active_screen_mut().clear_tab_stops(),
                _ => {}
            },
            ('m', false) => self.handle_sgr(&raw),
            ('r', false) => {
                let rows = self.active_screen().rows();
                let top = param(&raw, 0, 1).saturating_sub(1);
                let bottom = param(&raw, 1, rows).saturating_sub(1);
                let screen = self.active_screen_mut();
                screen.set_margins(top, bottom);
                screen.set_cursor(0, 0, origin);
            }
            ('h', true) => self.set_dec_mode(&raw, true),
            ('l', true) => self.set_dec_mode(&raw, false),
            ('h', false) => self.set_ansi_mode(&raw, true),
            ('l', false) => self.set_ansi_mode(&raw, false),
            ('n', false) => match param(&raw, 0, 0) {
                5 => self.report_device_status(),
                6 => self.report_cursor_position(),
                _ => {}
            },
            ('c', false) => {
                if param(&raw, 0, 0) == 0 {
                    self.report_primary_device_attributes();
                }
            }
            ('s', false) => self.active_screen_mut().save_cursor(),
            ('u', false) => self.active_screen_mut().restore_cursor(),
            ('s', true) => self.save_dec_mode(&raw),
            ('r', true) => self.restore_dec_mode(&raw),
            _ => {
                self.diagnostics.push(format!(
                    "unhandled CSI {action} private={is_private} params={raw:?}"
                ));
            }
        }
    }

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        if params.is_empty() {
            return;
        }
        let first = std::str::from_utf8(params[0]).unwrap_or("");
        match first {
            "0" | "2" => {
                if let Some(text) = params.get(1) {
                    self.pending_osc.push(OscEvent::Title(String::from_utf8_lossy(text).to_string()));
                }
            }
            "1" => {
                if let Some(text) = params.get(1) {
                    self.pending_osc.push(OscEvent::Icon(String::from_utf8_lossy(text).to_string()));
                }
            }
            "7" => {
                if let Some(text) = params.get(1) {
                    self.pending_osc
                        .push(OscEvent::WorkingDirectory(String::from_utf8_lossy(text).to_string()));
                }
            }
            "10" | "11" => {
                let slot = if first == "10" { DefaultSlot::Foreground } else { DefaultSlot::Background };
                match params.get(1).map(|p| std::str::from_utf8(p).unwrap_or("")) {
                    Some("?") => {
                        let response = format!("\x1b]{first};rgb:0000/0000/0000\x1b\\");
                        self.pending_responses.push(response.into_bytes());
                    }
                    Some(spec) => {
                        if let Some(rgb) = parse_rgb_spec(spec) {
                            self.pending_osc.push(OscEvent::PaletteDefault { slot, rgb });
                        }
                    }
                    None => {}
                }
            }
            "30" => {
                if let Some(text) = params.get(1) {
                    self.pending_osc
                        .push(OscEvent::SessionName(String::from_utf8_lossy(text).to_string()));
                }
            }
            "32" => {
                if let Some(text) = params.get(1) {
                    self.pending_osc
                        .push(OscEvent::SessionIcon(String::from_utf8_lossy(text).to_string()));
                }
            }
            "50" => {
                if let Some(text) = params.get(1) {
                    self.pending_osc
                        .push(OscEvent::ProfileChange(String::from_utf8_lossy(text).to_string()));
                }
            }
            _ => {
                self.diagnostics.push(format!("unhandled OSC {first}"));
            }
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        match (byte, intermediates) {
            (b'D', []) => self.active_screen_mut().index(),
            (b'E', []) => self.active_screen_mut().next_line(),
            (b'H', []) => self.active_screen_mut().change_tab_stop(true),
            (b'M', []) => self.active_screen_mut().reverse_index(),
            (b'7', []) => self.active_screen_mut().save_cursor(),
            (b'8', []) => self.active_screen_mut().restore_cursor(),
            (b'c', []) => self.reset(),
            (b'=', []) => self.modes.app_keypad.value = true,
            (b'>', []) => self.modes.app_keypad.value = false,
            (b'<', []) => self.vt52_mode = false,
            (b'0', [b'(']) => self.active_screen_mut().charset.designate(GSlot::G0, Charset::DecSpecialGraphics),
            (b'B', [b'(']) => self.active_screen_mut().charset.designate(GSlot::G0, Charset::Ascii),
            (b'0', [b')']) => self.active_screen_mut().charset.designate(GSlot::G1, Charset::DecSpecialGraphics),
            (b'B', [b')']) => self.active_screen_mut().charset.designate(GSlot::G1, Charset::Ascii),
            _ => {
                self.diagnostics
                    .push(format!("unhandled ESC {byte:#x} intermediates={intermediates:?}"));
            }
        }
    }

    fn hook(&mut self, _params: &vte::Params, intermediates: &[u8], _ignore: bool, action: char) {
        self.dcs_buffer.clear();
        self.dcs_intermediates.clear();
        self.dcs_intermediates.extend_from_slice(intermediates);
        self.dcs_action = Some(action);
    }

    fn put(&mut self, byte: u8) {
        if self.dcs_buffer.len() < MAX_ESCAPE_BUFFER {
            self.dcs_buffer.push(byte);
        } else {
            self.diagnostics.push("DCS buffer overflow, discarding".to_string());
            self.dcs_buffer.clear();
        }
    }

    fn unhook(&mut self) {
        // DCS sequences are consumed and discarded (spec §4.3); we keep the
        // buffer only long enough to bound memory on malformed streams.
        self.dcs_buffer.clear();
        self.dcs_intermediates.clear();
        self.dcs_action.take();
    }
}

fn parse_rgb_spec(spec: &str) -> Option<(u8, u8, u8)> {
    let rest = spec.strip_prefix("rgb:")?;
    let mut parts = rest.split('/');
    let r = u16::from_str_radix(parts.next()?, 16).ok()?;
    let g = u16::from_str_radix(parts.next()?, 16).ok()?;
    let b = u16::from_str_radix(parts.next()?, 16).ok()?;
    Some(((r >> 8) as u8, (g >> 8) as u8, (b >> 8) as u8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::BackendKind;

    fn decoder(rows: u16, cols: u16) -> Decoder {
        Decoder::new(rows, cols, Some(History::new(BackendKind::Ring { capacity: 1000 })))
    }

    #[test]
    fn scenario_a_plain_echo() {
        let mut d = decoder(24, 80);
        d.feed(b"hello\r\n");
        let text: String = (0..5).map(|c| d.primary.cell(0, c).c).collect();
        assert_eq!(text, "hello");
        assert_eq!((d.primary.cursor_row(), d.primary.cursor_col()), (1, 0));
        assert_eq!(d.primary.history().unwrap().line_count(), 0);
        assert!(!d.primary.line_flags(0).contains(crate::cell::LineFlags::WRAPPED));
    }

    #[test]
    fn scenario_b_sgr_truecolor() {
        let mut d = decoder(24, 80);
        d.feed(b"\x1b[38;2;255;100;0;1mX");
        let cell = d.primary.cell(0, 0);
        assert_eq!(cell.fg, Color::Rgb(255, 100, 0));
        assert!(cell.rendition.contains(Rendition::BOLD));
        assert_eq!(cell.c, 'X');
    }

    #[test]
    fn scenario_c_alt_screen_save_restore() {
        let mut d = decoder(24, 80);
        d.primary.set_cursor(5, 10, false);
        d.feed(b"ABC");
        d.feed(b"\x1b[?1049h");
        assert!(d.using_alt);
        assert_eq!((d.active_screen().cursor_row(), d.active_screen().cursor_col()), (0, 0));
        d.feed(b"DEF");
        d.feed(b"\x1b[?1049l");
        assert!(!d.using_alt);
        assert_eq!((d.primary.cursor_row(), d.primary.cursor_col()), (5, 13));
        let text: String = (10..13).map(|c| d.primary.cell(5, c).c).collect();
        assert_eq!(text, "ABC");
        assert_eq!(d.primary.history().unwrap().line_count(), 0);
    }

    #[test]
    fn scenario_e_cursor_position_report() {
        let mut d = decoder(24, 80);
        d.primary.set_cursor(4, 2, false);
        d.feed(b"\x1b[6n");
        let responses = d.take_pending_responses();
        assert_eq!(responses, vec![b"\x1b[5;3R".to_vec()]);
    }

    #[test]
    fn scenario_f_osc_title_no_response() {
        let mut d = decoder(24, 80);
        d.feed(b"\x1b]2;My Title\x07");
        let events = d.take_pending_osc();
        assert!(matches!(&events[..], [OscEvent::Title(t)] if t == "My Title"));
        assert!(d.take_pending_responses().is_empty());
    }

    #[test]
    fn scenario_d_scrollback_reflow() {
        let mut d = Decoder::new(3, 10, Some(History::new(BackendKind::Ring { capacity: 10 })));
        for _ in 0..3 {
            d.feed(b"abcdefghij");
        }
        // at this point all three rows are full without a trailing newline;
        // line 3 below forces a scroll on the 3rd wrap.
        d.feed(b"\r\n");
        assert_eq!(d.primary.cursor_row(), 2);
        let dropped = d.primary.history_mut().unwrap().reflow(5);
        assert_eq!(dropped, 0);
        let total: i32 = (0..d.primary.history().unwrap().line_count())
            .map(|i| d.primary.history().unwrap().line_length(i))
            .sum();
        assert!(total > 0);
    }

    #[test]
    fn extended_color_recognised_inline_in_longer_sgr_list() {
        let mut d = decoder(24, 80);
        d.feed(b"\x1b[1;38;2;10;20;30;4mY");
        let cell = d.primary.cell(0, 0);
        assert_eq!(cell.fg, Color::Rgb(10, 20, 30));
        assert!(cell.rendition.contains(Rendition::BOLD));
        assert!(cell.rendition.contains(Rendition::UNDERLINE));
    }

    #[test]
    fn dec_private_mode_save_restore_round_trips() {
        let mut d = decoder(24, 80);
        d.feed(b"\x1b[?7h"); // wrap on (default)
        d.feed(b"\x1b[?7s"); // save wrap=true
        d.feed(b"\x1b[?7l"); // wrap off
        assert!(!d.modes.wrap.value);
        d.feed(b"\x1b[?7r"); // restore
        assert!(d.modes.wrap.value);
    }

    #[test]
    fn so_si_toggle_the_invoked_gset() {
        let mut d = decoder(24, 80);
        d.feed(b"\x1b)0"); // designate G1 as DEC special graphics
        d.feed(b"\x0e"); // SO: invoke G1
        d.feed(b"q");
        assert_eq!(d.primary.cell(0, 0).c, '─');
        d.feed(b"\x0f"); // SI: invoke G0 (ASCII)
        d.feed(b"q");
        assert_eq!(d.primary.cell(0, 1).c, 'q');
    }

    #[test]
    fn idempotent_reset() {
        let mut d = decoder(24, 80);
        d.feed(b"hello\x1b[1m\x1b[?1049h");
        d.reset();
        let mut fresh = decoder(24, 80);
        // both resets should leave an empty primary screen at origin.
        assert_eq!(d.primary.cursor_row(), fresh.primary.cursor_row());
        assert_eq!(d.primary.cell(0, 0).c, fresh.primary.cell(0, 0).c);
        d.reset();
        fresh.reset();
        assert_eq!(d.primary.cell(0, 0), fresh.primary.cell(0, 0));
    }
}
