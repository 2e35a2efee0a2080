//! Terminal emulation core: a VT100/VT102/xterm byte-stream decoder,
//! dual screen buffers with pluggable scrollback history, a key
//! translator, a refresh scheduler, and a `Session` that wires a PTY to
//! the decoder and any attached displays.
//!
//! This crate has no GUI and no widget toolkit dependency. A host
//! binary attaches one or more `display::Display` implementations to a
//! `session::Session` and drives its event loop; everything this crate
//! needs from the outside world (drawing, input delivery, window
//! chrome) lives behind that trait.

pub mod cell;
pub mod charset;
pub mod color;
pub mod config;
pub mod core;
pub mod decoder;
pub mod display;
pub mod error;
pub mod history;
pub mod keymap;
pub mod modes;
pub mod palette;
pub mod pty;
pub mod refresh;
pub mod screen;
pub mod session;

pub use core::Core;
pub use decoder::Decoder;
pub use display::{Display, DisplayEvent, ScreenSnapshot};
pub use error::{Result, TermError};
pub use screen::Screen;
pub use session::{Session, SessionConfig};

/// Install a `tracing_subscriber` `fmt` layer with an `EnvFilter`,
/// mirroring the teacher's own startup sequence (`lib::run`'s
/// `tracing_subscriber::fmt().with_env_filter(...).init()`). A library
/// crate shouldn't install a global subscriber on a host's behalf
/// implicitly, so this is opt-in: a host binary calls it once at
/// startup if it wants the default format rather than supplying its own
/// subscriber.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "kterm_core=info".into()),
        )
        .init();
}
