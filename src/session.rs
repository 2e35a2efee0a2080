use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::decoder::{CursorStyle, Decoder, DecoderEvent, OscEvent};
use crate::display::{Display, DisplayEvent, MouseButton, MouseEventKind, ScreenSnapshot};
use crate::error::{Result, TermError};
use crate::history::BackendKind;
use crate::keymap::{Command, KeyResult, KeyTranslator};
use crate::pty::{ExitStatus, PortablePty, Pty, PtySpawnConfig, Signal};

/// Session lifecycle (spec §4.6): `New → Running → Finished`. `run()`
/// from any state other than `New` is a no-op; the finished transition
/// happens exactly once, on child exit or a forced close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    New,
    Running,
    Finished,
}

/// The kind of notification whose enabled/disabled edge
/// `SessionEvent::NotificationChanged` reports (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Activity,
    Silence,
    Bell,
}

/// Events a host drains from a `Session` via `take_pending_events`,
/// replacing the bidirectional signal/slot fan-out of the source with a
/// plain queue a single-threaded event loop polls (spec §9 Design
/// Notes).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    NotificationChanged { kind: NotificationKind, enabled: bool },
    TitleChanged(String),
    /// An abstract command the key translator resolved to (scroll,
    /// scroll-lock toggle, etc.) rather than a literal byte sequence;
    /// interpreting it is a Display/host concern, not the core's.
    Command(Command),
    Finished { exit_status: Option<ExitStatus> },
}

/// Parameters needed to spawn the child process a `Session` attaches to
/// (spec §4.6/§6). `cwd`/`env` augment, never replace, the fixed
/// environment variables spec §6 names (`TERM`, `COLORFGBG`,
/// `SHELL_SESSION_ID`).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub cwd: Option<String>,
    pub rows: u16,
    pub cols: u16,
    pub history: BackendKind,
    pub activity_monitoring: bool,
    pub silence_monitoring: bool,
    pub silence_threshold: Duration,
    pub tab_title_format: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            program: "/bin/sh".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            rows: 24,
            cols: 80,
            history: BackendKind::Ring { capacity: 10_000 },
            activity_monitoring: false,
            silence_monitoring: false,
            silence_threshold: Duration::from_secs(10),
            tab_title_format: "%n".to_string(),
        }
    }
}

/// Four-way title composition (spec §4.6): user-set name takes
/// precedence over the program-set title (OSC 0/2), which takes
/// precedence over a tab-format template expanded with the foreground
/// process name. The effective title is recomputed whenever any input
/// changes.
#[derive(Debug, Clone, Default)]
struct TitleComposer {
    user_name: Option<String>,
    program_title: Option<String>,
    tab_format: String,
    foreground_process: Option<String>,
    effective: String,
}

impl TitleComposer {
    fn new(tab_format: String) -> Self {
        Self {
            tab_format,
            ..Default::default()
        }
    }

    fn tab_title(&self) -> String {
        let mut out = self.tab_format.clone();
        if let Some(proc_name) = &self.foreground_process {
            out = out.replace("%n", proc_name);
        } else {
            out = out.replace("%n", "");
        }
        out
    }

    /// Recompute the effective title; returns `true` if it changed.
    fn recompute(&mut self) -> bool {
        let next = self
            .user_name
            .clone()
            .or_else(|| self.program_title.clone())
            .unwrap_or_else(|| self.tab_title());
        if next != self.effective {
            self.effective = next;
            true
        } else {
            false
        }
    }

    fn set_user_name(&mut self, name: Option<String>) -> bool {
        self.user_name = name;
        self.recompute()
    }

    fn set_program_title(&mut self, title: String) -> bool {
        self.program_title = Some(title);
        self.recompute()
    }

    fn set_foreground_process(&mut self, name: Option<String>) -> bool {
        self.foreground_process = name;
        self.recompute()
    }
}

/// Tracks the activity/silence/bell flag set and emits edge-transition
/// events only (spec §4.6). Driven by explicit `Instant`s from
/// `Session::pump` rather than real timers, for the same testability
/// reason as `refresh::RefreshScheduler`.
#[derive(Debug)]
struct Notifications {
    activity_enabled: bool,
    silence_enabled: bool,
    silence_threshold: Duration,

    activity_active: bool,
    silence_active: bool,
    bell_active: bool,

    last_output: Option<Instant>,
    activity_clear_deadline: Option<Instant>,
    bell_clear_deadline: Option<Instant>,
}

const ACTIVITY_DEBOUNCE: Duration = Duration::from_millis(500);
const BELL_FLASH: Duration = Duration::from_millis(250);

impl Notifications {
    fn new(activity_enabled: bool, silence_enabled: bool, silence_threshold: Duration) -> Self {
        Self {
            activity_enabled,
            silence_enabled,
            silence_threshold,
            activity_active: false,
            silence_active: false,
            bell_active: false,
            last_output: None,
            activity_clear_deadline: None,
            bell_clear_deadline: None,
        }
    }

    fn on_output(&mut self, now: Instant, events: &mut Vec<SessionEvent>) {
        self.last_output = Some(now);
        if self.silence_active {
            self.silence_active = false;
            events.push(SessionEvent::NotificationChanged {
                kind: NotificationKind::Silence,
                enabled: false,
            });
        }
        if self.activity_enabled {
            self.activity_clear_deadline = Some(now + ACTIVITY_DEBOUNCE);
            if !self.activity_active {
                self.activity_active = true;
                events.push(SessionEvent::NotificationChanged {
                    kind: NotificationKind::Activity,
                    enabled: true,
                });
            }
        }
    }

    fn on_bell(&mut self, now: Instant, events: &mut Vec<SessionEvent>) {
        self.bell_clear_deadline = Some(now + BELL_FLASH);
        if !self.bell_active {
            self.bell_active = true;
            events.push(SessionEvent::NotificationChanged {
                kind: NotificationKind::Bell,
                enabled: true,
            });
        }
    }

    fn tick(&mut self, now: Instant, events: &mut Vec<SessionEvent>) {
        if self.activity_active {
            if let Some(deadline) = self.activity_clear_deadline {
                if now >= deadline {
                    self.activity_active = false;
                    events.push(SessionEvent::NotificationChanged {
                        kind: NotificationKind::Activity,
                        enabled: false,
                    });
                }
            }
        }
        if self.bell_active {
            if let Some(deadline) = self.bell_clear_deadline {
                if now >= deadline {
                    self.bell_active = false;
                    events.push(SessionEvent::NotificationChanged {
                        kind: NotificationKind::Bell,
                        enabled: false,
                    });
                }
            }
        }
        if self.silence_enabled && !self.silence_active {
            let silent_for = self.last_output.map(|t| now.duration_since(t)).unwrap_or(Duration::MAX);
            if silent_for >= self.silence_threshold {
                self.silence_active = true;
                events.push(SessionEvent::NotificationChanged {
                    kind: NotificationKind::Silence,
                    enabled: true,
                });
            }
        }
    }
}

/// Owns a PTY, a `Decoder`, and a set of attached `Display`s (spec
/// §4.6): relays bytes both directions, tracks activity/silence/bell
/// notifications and title changes, and mediates shutdown. Grounded in
/// `pty::session::Session` (SIGHUP-then-SIGKILL shutdown,
/// `Arc<Mutex<...>>`-style shared state collapsed here to plain
/// ownership since this crate has no GUI thread to hand a clone to) and
/// `shell::mod::ShellIntegration` (title/activity tracking, generalized
/// to spec.md's four-way composition).
pub struct Session {
    state: SessionState,
    config: SessionConfig,
    pty: Option<Box<dyn Pty>>,
    pub decoder: Decoder,
    displays: Vec<Box<dyn Display>>,
    keymap: KeyTranslator,
    refresh: crate::refresh::RefreshScheduler,
    notifications: Notifications,
    title: TitleComposer,
    session_id: Uuid,
    finished: bool,
    exit_status: Option<ExitStatus>,
    storage_degraded: bool,
    write_error_retried: bool,
    pending_events: Vec<SessionEvent>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let decoder = Decoder::new(config.rows, config.cols, Some(crate::history::History::new(config.history.clone())));
        let notifications = Notifications::new(config.activity_monitoring, config.silence_monitoring, config.silence_threshold);
        let title = TitleComposer::new(config.tab_title_format.clone());
        Self {
            state: SessionState::New,
            config,
            pty: None,
            decoder,
            displays: Vec::new(),
            keymap: KeyTranslator::default(),
            refresh: crate::refresh::RefreshScheduler::new(),
            notifications,
            title,
            session_id: Uuid::new_v4(),
            finished: false,
            exit_status: None,
            storage_degraded: false,
            write_error_retried: false,
            pending_events: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Borrow the attached `Pty` trait object, mainly useful for tests
    /// that need to inspect what a test double received.
    pub fn pty_mut(&mut self) -> Option<&mut Box<dyn Pty>> {
        self.pty.as_mut()
    }

    /// Stable per-session identifier for `SHELL_SESSION_ID`: braces and
    /// dashes stripped, per spec §6.
    pub fn shell_session_id(&self) -> String {
        self.session_id.simple().to_string()
    }

    pub fn attach_display(&mut self, display: Box<dyn Display>) {
        self.displays.push(display);
    }

    /// Remove displays for which `predicate` returns `true` ("dead"),
    /// per spec §3's "the Session removes dead displays automatically."
    /// A `Display` trait object cannot detect liveness on its own in a
    /// library with no GUI; the host supplies the predicate (e.g. "this
    /// Weak handle no longer upgrades").
    pub fn retain_displays(&mut self, mut predicate: impl FnMut(&dyn Display) -> bool) {
        self.displays.retain(|d| predicate(d.as_ref()));
    }

    pub fn take_pending_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn environment(&self) -> HashMap<String, String> {
        let mut env = self.config.env.clone();
        env.entry("TERM".to_string()).or_insert_with(|| "xterm".to_string());
        // Conventional "light foreground on black background" indices,
        // matching the palette's default scheme (spec §6).
        env.entry("COLORFGBG".to_string()).or_insert_with(|| "15;0".to_string());
        env.insert("SHELL_SESSION_ID".to_string(), self.shell_session_id());
        env
    }

    /// `New → Running`. Allocates the PTY and spawns the child process.
    /// A no-op from any state other than `New` (spec §4.6).
    pub fn run(&mut self) -> Result<()> {
        if self.state != SessionState::New {
            return Ok(());
        }
        let env = self.environment();
        let spawn_result = PortablePty::start(PtySpawnConfig {
            program: &self.config.program,
            args: &self.config.args,
            env: &env,
            cwd: self.config.cwd.as_deref(),
            cols: self.config.cols,
            rows: self.config.rows,
        });
        match spawn_result {
            Ok(pty) => {
                self.pty = Some(Box::new(pty));
                self.state = SessionState::Running;
                Ok(())
            }
            Err(e) => {
                // ChildStartFailure: New -> Finished directly, no PTY
                // resources leak (none were ever allocated).
                self.state = SessionState::Finished;
                self.finished = true;
                self.pending_events.push(SessionEvent::Finished { exit_status: None });
                Err(e)
            }
        }
    }

    /// Inject an already-constructed `Pty` (a real one, or a test
    /// double) and transition New → Running. Used by tests and by
    /// hosts that want to manage PTY construction themselves.
    pub fn run_with_pty(&mut self, pty: Box<dyn Pty>) {
        if self.state != SessionState::New {
            return;
        }
        self.pty = Some(pty);
        self.state = SessionState::Running;
    }

    /// Drain available PTY output, feed it through the decoder, dispatch
    /// OSC/terminal events, update notifications, and — if the refresh
    /// scheduler fires — push a snapshot to every attached display.
    /// Intended to be called repeatedly from a host's single-threaded
    /// event loop (spec §5).
    pub fn pump(&mut self, now: Instant) {
        if self.state != SessionState::Running {
            return;
        }

        let mut any_output = false;
        let mut buf = [0u8; 4096];
        loop {
            let Some(pty) = self.pty.as_mut() else { break };
            match pty.read_nonblocking(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    any_output = true;
                    self.decoder.feed(&buf[..n]);
                    self.flush_responses();
                    self.drain_decoder_events(now);
                }
                Err(_) => {
                    self.finish(None);
                    return;
                }
            }
        }

        if let Some(pty) = self.pty.as_mut() {
            if let Some(status) = pty.try_wait() {
                self.finish(Some(status));
                return;
            }
        }

        if any_output {
            self.notifications.on_output(now, &mut self.pending_events);
            self.refresh.notify_activity(now);
        }
        self.notifications.tick(now, &mut self.pending_events);

        if self.refresh.poll(now) {
            self.broadcast_snapshot();
        }
    }

    fn flush_responses(&mut self) {
        let responses = self.decoder.take_pending_responses();
        if responses.is_empty() {
            return;
        }
        let Some(pty) = self.pty.as_mut() else { return };
        for resp in responses {
            if pty.write(&resp).is_err() && !self.write_error_retried {
                self.write_error_retried = true;
                let _ = pty.write(&resp);
            }
        }
    }

    fn drain_decoder_events(&mut self, now: Instant) {
        for event in self.decoder.take_pending_events() {
            if let DecoderEvent::Bell = event {
                self.notifications.on_bell(now, &mut self.pending_events);
            }
        }
        for osc in self.decoder.take_pending_osc() {
            let changed = match osc {
                OscEvent::Title(text) | OscEvent::Icon(text) => self.title.set_program_title(text),
                OscEvent::WorkingDirectory(_) => false,
                OscEvent::PaletteDefault { .. } => false,
                OscEvent::SessionName(name) => self.title.set_user_name(Some(name)),
                OscEvent::SessionIcon(_) => false,
                OscEvent::ProfileChange(_) => false,
            };
            if changed {
                self.pending_events.push(SessionEvent::TitleChanged(self.title.effective.clone()));
            }
        }
    }

    /// User-set session name (spec §4.6's "user-set name" input; takes
    /// precedence over everything else in the title composition).
    pub fn set_user_title(&mut self, name: Option<String>) {
        if self.title.set_user_name(name) {
            self.pending_events.push(SessionEvent::TitleChanged(self.title.effective.clone()));
        }
    }

    pub fn set_foreground_process_name(&mut self, name: Option<String>) {
        if self.title.set_foreground_process(name) {
            self.pending_events.push(SessionEvent::TitleChanged(self.title.effective.clone()));
        }
    }

    pub fn title(&self) -> &str {
        &self.title.effective
    }

    fn broadcast_snapshot(&mut self) {
        let screen = self.decoder.active_screen();
        let cursor_visible = self.decoder.modes.cursor_visible.value;
        let style = self.decoder.cursor_style;
        let selected_text = screen.selected_text(true);
        for display in &mut self.displays {
            let snapshot = ScreenSnapshot::from_screen(screen, cursor_visible, style);
            display.set_image(snapshot);
            if !selected_text.is_empty() {
                display.set_selection(&selected_text);
            }
        }
    }

    /// Resize the active terminal geometry and the underlying PTY.
    pub fn resize(&mut self, rows: u16, cols: u16) -> Result<()> {
        if rows == 0 || cols == 0 {
            return Err(TermError::InvalidParameter("resize to zero rows/cols".to_string()));
        }
        self.decoder.resize(rows, cols);
        if let Some(pty) = self.pty.as_mut() {
            pty.resize(cols, rows)?;
        }
        Ok(())
    }

    /// Route a display-originated event (key, mouse, resize, focus) to
    /// the decoder/PTY, per spec §6's Display→Session signal set.
    pub fn handle_display_event(&mut self, event: DisplayEvent) {
        match event {
            DisplayEvent::Key(key_event) => self.handle_key_event(key_event, None),
            DisplayEvent::Mouse { button, col, row, kind } => self.handle_mouse_event(button, col, row, kind),
            DisplayEvent::ResizeRequested { cols, rows } => {
                let _ = self.resize(rows, cols);
            }
            DisplayEvent::FocusChanged { gained } => self.handle_focus_change(gained),
        }
    }

    /// Translate and write a key event, optionally with resolved
    /// printable `text` (the printable-text fallback rule, spec §4.4).
    pub fn handle_key_event(&mut self, key_event: crate::keymap::KeyEvent, text: Option<&str>) {
        match self.keymap.translate(&key_event, text) {
            Some(KeyResult::Bytes(bytes)) => self.write_input(&bytes),
            Some(KeyResult::Command(cmd)) => self.pending_events.push(SessionEvent::Command(cmd)),
            None => {}
        }
    }

    fn handle_mouse_event(&mut self, button: MouseButton, col: u16, row: u16, kind: MouseEventKind) {
        if !self.decoder.modes.mouse_tracking_active() {
            return;
        }
        let bytes = encode_mouse_event(button, col, row, kind, self.decoder.modes.mouse_sgr.value);
        self.write_input(&bytes);
    }

    fn handle_focus_change(&mut self, gained: bool) {
        if !self.decoder.modes.focus_events.value {
            return;
        }
        let bytes: &[u8] = if gained { b"\x1b[I" } else { b"\x1b[O" };
        self.write_input(bytes);
    }

    fn write_input(&mut self, bytes: &[u8]) {
        if let Some(pty) = self.pty.as_mut() {
            if pty.write(bytes).is_err() && !self.write_error_retried {
                self.write_error_retried = true;
                let _ = pty.write(bytes);
            }
        }
    }

    fn finish(&mut self, exit_status: Option<ExitStatus>) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.state = SessionState::Finished;
        self.exit_status = exit_status;
        self.pty = None;
        self.displays.clear();
        self.pending_events.push(SessionEvent::Finished { exit_status });
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Graceful shutdown: SIGHUP, wait (left to the caller — the core
    /// exposes `close_normal`/`close_force` as primitives, per spec §5's
    /// "the core itself does not implement this timeout").
    pub fn close_normal(&mut self) {
        if let Some(pty) = self.pty.as_mut() {
            let _ = pty.kill(Signal::Hup);
        }
        self.finish(None);
    }

    pub fn close_force(&mut self) {
        if let Some(pty) = self.pty.as_mut() {
            let _ = pty.kill(Signal::Kill);
        }
        self.finish(None);
    }

    /// Degrade history writes to no-ops after a `StorageError`,
    /// surfacing a one-shot warning (spec §4.1 invariant 4 / §7).
    pub fn report_storage_error(&mut self, err: TermError) {
        if self.storage_degraded {
            return;
        }
        self.storage_degraded = true;
        tracing::warn!("history storage degraded: {}", err);
    }
}

/// Encode a mouse event per xterm's SGR (`CSI < Cb ; Cx ; Cy M/m`) or
/// legacy/UTF-8 (`CSI M Cb Cx Cy`, bytes offset by 32) mouse-reporting
/// protocols, selected by the currently active encoding mode.
fn encode_mouse_event(button: MouseButton, col: u16, row: u16, kind: MouseEventKind, sgr: bool) -> Vec<u8> {
    let cb = match button {
        MouseButton::Left => 0,
        MouseButton::Middle => 1,
        MouseButton::Right => 2,
        MouseButton::WheelUp => 64,
        MouseButton::WheelDown => 65,
    };
    let cb = match kind {
        MouseEventKind::Move => cb + 32,
        _ => cb,
    };
    let cx = col + 1;
    let cy = row + 1;
    if sgr {
        let final_byte = if matches!(kind, MouseEventKind::Release) { 'm' } else { 'M' };
        format!("\x1b[<{cb};{cx};{cy}{final_byte}").into_bytes()
    } else {
        let clamp = |v: u16| (v.min(223) + 32) as u8;
        vec![0x1b, b'[', b'M', cb as u8 + 32, clamp(cx), clamp(cy)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{KeyCode, KeyEvent, Modifiers, StateFlags};
    use crate::pty::fake::FakePty;
    use std::time::Duration;

    fn running_session() -> (Session, Instant) {
        let mut session = Session::new(SessionConfig::default());
        session.run_with_pty(Box::new(FakePty::new()));
        (session, Instant::now())
    }

    #[test]
    fn run_is_noop_unless_new() {
        let (mut session, _now) = running_session();
        assert_eq!(session.state(), SessionState::Running);
        // run_with_pty again should be a no-op: state stays Running, not overwritten.
        session.run_with_pty(Box::new(FakePty::new()));
        assert_eq!(session.state(), SessionState::Running);
    }

    #[test]
    fn pump_feeds_decoder_and_fires_refresh_after_short_timer() {
        let (mut session, t0) = running_session();
        // Stuff output into the fake pty before pumping.
        let fake = downcast_fake(&mut session);
        fake.push_output(b"hi");
        session.pump(t0);
        // no snapshot fired yet (short timer not elapsed)
        session.pump(t0 + Duration::from_millis(11));
        assert_eq!(session.decoder.primary.cell(0, 0).c, 'h');
    }

    #[test]
    fn osc_title_updates_effective_title_and_emits_event() {
        let (mut session, t0) = running_session();
        let fake = downcast_fake(&mut session);
        fake.push_output(b"\x1b]2;hello world\x07");
        session.pump(t0);
        assert_eq!(session.title(), "hello world");
        let events = session.take_pending_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::TitleChanged(t) if t == "hello world")));
    }

    #[test]
    fn bell_notification_fires_then_clears() {
        let (mut session, t0) = running_session();
        let fake = downcast_fake(&mut session);
        fake.push_output(b"\x07");
        session.pump(t0);
        let events = session.take_pending_events();
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::NotificationChanged { kind: NotificationKind::Bell, enabled: true }
        )));
        session.pump(t0 + Duration::from_millis(300));
        let events = session.take_pending_events();
        assert!(events.iter().any(|e| matches!(
            e,
            SessionEvent::NotificationChanged { kind: NotificationKind::Bell, enabled: false }
        )));
    }

    #[test]
    fn resize_to_zero_is_invalid_parameter_without_mutation() {
        let (mut session, _t0) = running_session();
        let before = (session.decoder.primary.rows(), session.decoder.primary.cols());
        let err = session.resize(0, 80).unwrap_err();
        assert!(matches!(err, TermError::InvalidParameter(_)));
        assert_eq!((session.decoder.primary.rows(), session.decoder.primary.cols()), before);
    }

    #[test]
    fn key_event_with_no_match_and_printable_text_writes_utf8() {
        let (mut session, _t0) = running_session();
        let event = KeyEvent {
            code: KeyCode::Char('z'),
            modifiers: Modifiers::empty(),
            state: StateFlags::empty(),
        };
        session.handle_key_event(event, Some("z"));
        let fake = downcast_fake(&mut session);
        assert_eq!(fake.written, b"z");
    }

    #[test]
    fn finish_fires_exactly_once() {
        let (mut session, _t0) = running_session();
        session.close_force();
        session.close_force();
        let events = session.take_pending_events();
        assert_eq!(
            events.iter().filter(|e| matches!(e, SessionEvent::Finished { .. })).count(),
            1
        );
    }

    // `Session` stores its `Pty` as `Box<dyn Pty>`; tests reach back into
    // the concrete `FakePty` via `Pty::as_any` rather than an unsafe
    // pointer cast.
    fn downcast_fake(session: &mut Session) -> &mut FakePty {
        session
            .pty
            .as_mut()
            .unwrap()
            .as_any()
            .downcast_mut::<FakePty>()
            .expect("session pty is a FakePty in this test module")
    }
}
