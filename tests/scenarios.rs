//! Integration suite for the lettered scenarios of the crate's testable
//! properties: a full wiring of `Session`/`Decoder`/`Screen`/`Display`
//! exercised through the crate's public API, as opposed to the
//! in-module unit tests covering the same letters at the `Decoder`/
//! `Screen` level in isolation.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use kterm_core::decoder::Decoder;
use kterm_core::display::{Display, DisplayEvent, RecordingDisplay, ScreenSnapshot};
use kterm_core::history::{BackendKind, History};
use kterm_core::pty::{ExitStatus, Pty, Signal};
use kterm_core::session::{NotificationKind, Session, SessionConfig, SessionEvent};
use kterm_core::TermError;

/// A `Pty` double built from only this crate's public surface (not the
/// internal `pty::fake::FakePty`, which integration tests can't reach),
/// so `Session` can be exercised end to end without a real child
/// process.
struct ScriptedPty {
    to_deliver: VecDeque<u8>,
    written: Vec<u8>,
    exit_status: Option<ExitStatus>,
}

impl ScriptedPty {
    fn new(script: &[u8]) -> Self {
        Self {
            to_deliver: script.iter().copied().collect(),
            written: Vec::new(),
            exit_status: None,
        }
    }
}

impl Pty for ScriptedPty {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.to_deliver.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.to_deliver.pop_front().unwrap();
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.written.extend_from_slice(data);
        Ok(data.len())
    }

    fn resize(&mut self, _cols: u16, _rows: u16) -> kterm_core::Result<()> {
        Ok(())
    }

    fn set_utf8_mode(&mut self, _enabled: bool) {}
    fn set_xon_xoff(&mut self, _enabled: bool) {}

    fn kill(&mut self, _signal: Signal) -> kterm_core::Result<()> {
        self.exit_status = Some(ExitStatus { code: Some(0) });
        Ok(())
    }

    fn try_wait(&mut self) -> Option<ExitStatus> {
        self.exit_status
    }

    fn as_any(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[test]
fn scenario_a_plain_echo_through_decoder_into_a_display() {
    let history = History::new(BackendKind::Ring { capacity: 100 });
    let mut decoder = Decoder::new(24, 80, Some(history));
    decoder.feed(b"hello\r\n");

    let mut display = RecordingDisplay::default();
    display.set_image(ScreenSnapshot::from_screen(decoder.active_screen(), true, decoder.cursor_style));

    let text = display.last_text.unwrap();
    let first_line = text.lines().next().unwrap();
    assert!(first_line.starts_with("hello"));
    assert_eq!(display.last_cursor.unwrap().row, 1);
    assert_eq!(display.last_cursor.unwrap().col, 0);
    assert_eq!(decoder.active_screen().history().map(|h| h.line_count()), Some(0));
}

#[test]
fn scenario_e_cursor_position_report_through_session() {
    let mut config = SessionConfig::default();
    config.rows = 24;
    config.cols = 80;
    let mut session = Session::new(config);
    // Move the cursor to row 4, column 2 (0-based) before asking for a
    // position report, both delivered as if the child process wrote them.
    session.run_with_pty(Box::new(ScriptedPty::new(b"\x1b[5;3H\x1b[6n")));

    session.pump(Instant::now());

    let fake: &mut ScriptedPty = downcast(&mut session);
    assert_eq!(fake.written, b"\x1b[5;3R");
}

#[test]
fn scenario_f_osc_title_propagates_as_session_event_with_no_pty_response() {
    let mut session = Session::new(SessionConfig::default());
    session.run_with_pty(Box::new(ScriptedPty::new(b"\x1b]2;My Title\x07")));

    session.pump(Instant::now());

    assert_eq!(session.title(), "My Title");
    let events = session.take_pending_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::TitleChanged(t) if t == "My Title")));

    let fake: &mut ScriptedPty = downcast(&mut session);
    assert!(fake.written.is_empty());
}

#[test]
fn activity_notification_is_edge_triggered_across_multiple_pumps() {
    let mut config = SessionConfig::default();
    config.activity_monitoring = true;
    let mut session = Session::new(config);
    session.run_with_pty(Box::new(ScriptedPty::new(b"one")));

    let t0 = Instant::now();
    session.pump(t0);
    let events = session.take_pending_events();
    let activity_on = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::NotificationChanged { kind: NotificationKind::Activity, enabled: true }))
        .count();
    assert_eq!(activity_on, 1, "activity notification should only fire on the rising edge");

    // A second pump with no new output and not enough elapsed time
    // keeps the flag set without emitting a duplicate event.
    session.pump(t0 + Duration::from_millis(50));
    let events = session.take_pending_events();
    assert!(events.iter().all(|e| !matches!(e, SessionEvent::NotificationChanged { kind: NotificationKind::Activity, .. })));
}

#[test]
fn display_event_key_press_is_translated_and_forwarded_to_the_pty() {
    let mut session = Session::new(SessionConfig::default());
    session.run_with_pty(Box::new(ScriptedPty::new(&[])));

    let event = DisplayEvent::Key(kterm_core::keymap::KeyEvent {
        code: kterm_core::keymap::KeyCode::Up,
        modifiers: kterm_core::keymap::Modifiers::empty(),
        state: kterm_core::keymap::StateFlags::empty(),
    });
    session.handle_display_event(event);

    let fake: &mut ScriptedPty = downcast(&mut session);
    assert_eq!(fake.written, b"\x1b[A");
}

#[test]
fn resize_rejects_zero_dimensions_without_mutating_geometry() {
    let mut session = Session::new(SessionConfig::default());
    session.run_with_pty(Box::new(ScriptedPty::new(&[])));
    let before = (session.decoder.primary.rows(), session.decoder.primary.cols());
    let err = session.resize(24, 0).unwrap_err();
    assert!(matches!(err, TermError::InvalidParameter(_)));
    assert_eq!((session.decoder.primary.rows(), session.decoder.primary.cols()), before);
}

fn downcast(session: &mut Session) -> &mut ScriptedPty {
    session
        .pty_mut()
        .expect("session has a pty")
        .as_any()
        .downcast_mut::<ScriptedPty>()
        .expect("this test binary always constructs a ScriptedPty")
}
