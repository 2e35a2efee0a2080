use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use portable_pty::{native_pty_system, CommandBuilder, PtySize};

use crate::error::{Result, TermError};

/// Signal a `Pty::kill` can send, mirroring the escalation sequence
/// spec §4.6 describes (`close_normal` → SIGHUP, `close_force` →
/// SIGKILL), grounded in `pty::session::Session::kill`'s two-step
/// shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Hup,
    Kill,
}

/// Child process termination status (spec §6 `child_exited(status)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
}

/// Parameters for spawning a child process attached to a PTY (spec
/// §6's `start(program, args, env, cols, rows)`).
pub struct PtySpawnConfig<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    pub env: &'a HashMap<String, String>,
    pub cwd: Option<&'a str>,
    pub cols: u16,
    pub rows: u16,
}

/// The PTY interface consumed by `Session` (spec §6). A trait rather
/// than a concrete type so the core can be driven by a fake PTY in
/// tests without spawning real child processes.
pub trait Pty: Send {
    /// Non-blocking read of bytes produced by the child since the last
    /// call. Returns `0` when nothing is currently available (not EOF —
    /// callers distinguish EOF via `try_wait`).
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize>;
    fn resize(&mut self, cols: u16, rows: u16) -> Result<()>;
    fn set_utf8_mode(&mut self, enabled: bool);
    fn set_xon_xoff(&mut self, enabled: bool);
    fn kill(&mut self, signal: Signal) -> Result<()>;
    /// Non-blocking poll for child exit; `None` while still running.
    fn try_wait(&mut self) -> Option<ExitStatus>;

    /// Downcast support for tests that need to inspect a concrete `Pty`
    /// test double behind `Box<dyn Pty>` (e.g. asserting on bytes written
    /// by `Session`). Real implementations have no legitimate caller for
    /// this outside test code.
    fn as_any(&mut self) -> &mut dyn std::any::Any;
}

/// `Pty` implementation over `portable-pty`, grounded in
/// `pty::PtyManager::spawn_session`/`pty::session::Session`. A
/// dedicated reader thread performs the (necessarily blocking) OS read
/// and forwards chunks through a bounded channel; `read_nonblocking`
/// drains that channel without blocking, which is how the teacher's own
/// parser thread achieves the same effect (read on a worker thread,
/// non-blocking consumption on the caller's side).
pub struct PortablePty {
    master: Option<Box<dyn portable_pty::MasterPty + Send>>,
    child: Arc<Mutex<Box<dyn portable_pty::Child + Send + Sync>>>,
    writer: Box<dyn Write + Send>,
    rx: crossbeam_channel::Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    reader_thread: Option<std::thread::JoinHandle<()>>,
    utf8_mode: bool,
    xon_xoff: bool,
}

impl PortablePty {
    pub fn start(config: PtySpawnConfig<'_>) -> Result<Self> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: config.rows,
                cols: config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| TermError::ChildStartFailure(e.to_string()))?;

        let mut cmd = CommandBuilder::new(config.program);
        cmd.args(config.args);
        if let Some(cwd) = config.cwd {
            cmd.cwd(cwd);
        }
        for (k, v) in config.env {
            cmd.env(k, v);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| TermError::ChildStartFailure(e.to_string()))?;
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| TermError::ChildStartFailure(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| TermError::ChildStartFailure(e.to_string()))?;

        let (tx, rx) = crossbeam_channel::bounded::<Vec<u8>>(256);
        let reader_thread = match std::thread::Builder::new()
            .name("pty-reader".into())
            .spawn(move || {
                let mut buf = [0u8; 4096];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if tx.send(buf[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!("pty reader thread exiting: {}", e);
                            break;
                        }
                    }
                }
            }) {
            Ok(handle) => handle,
            Err(e) => {
                // No PTY resources may leak on a ChildStartFailure (spec
                // §7): the child was already spawned, so it must be
                // reaped before returning.
                let mut child = child;
                let _ = child.kill();
                let _ = child.wait();
                return Err(TermError::ChildStartFailure(format!(
                    "failed to spawn pty reader thread: {e}"
                )));
            }
        };

        Ok(Self {
            master: Some(pair.master),
            child: Arc::new(Mutex::new(child)),
            writer,
            rx,
            pending: VecDeque::new(),
            reader_thread: Some(reader_thread),
            utf8_mode: true,
            xon_xoff: false,
        })
    }
}

impl Pty for PortablePty {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.pending.len() < buf.len() {
            match self.rx.try_recv() {
                Ok(chunk) => self.pending.extend(chunk),
                Err(_) => break,
            }
        }
        let n = buf.len().min(self.pending.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.pending.pop_front().unwrap();
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(data.len())
    }

    fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        let master = self.master.as_ref().ok_or_else(|| {
            TermError::InvalidParameter("pty master already closed".to_string())
        })?;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| TermError::Pty(std::io::Error::other(e.to_string())))
    }

    fn set_utf8_mode(&mut self, enabled: bool) {
        self.utf8_mode = enabled;
    }

    fn set_xon_xoff(&mut self, enabled: bool) {
        self.xon_xoff = enabled;
    }

    /// SIGHUP first; caller (`Session::close_force`) re-invokes with
    /// `Signal::Kill` if the child hasn't exited after a bounded wait.
    fn kill(&mut self, signal: Signal) -> Result<()> {
        let mut child = self.child.lock();
        match signal {
            Signal::Hup => child.kill().map_err(|e| TermError::Pty(e))?,
            Signal::Kill => {
                #[cfg(unix)]
                {
                    if let Some(pid) = child.process_id() {
                        unsafe {
                            libc::kill(pid as i32, libc::SIGKILL);
                        }
                    }
                }
                #[cfg(not(unix))]
                {
                    child.kill().map_err(|e| TermError::Pty(e))?;
                }
            }
        }
        Ok(())
    }

    fn try_wait(&mut self) -> Option<ExitStatus> {
        match self.child.lock().try_wait() {
            Ok(Some(status)) => Some(ExitStatus {
                code: Some(status.exit_code() as i32),
            }),
            _ => None,
        }
    }

    fn as_any(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Drop for PortablePty {
    fn drop(&mut self) {
        self.master.take();
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }
}

/// An in-memory `Pty` double used by both this module's own tests and
/// `session`'s tests, so `Session` lifecycle/notification behavior can
/// be exercised without a real child process.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;

    pub struct FakePty {
        pub to_deliver: VecDeque<u8>,
        pub written: Vec<u8>,
        pub exit_status: Option<ExitStatus>,
        pub resized: Vec<(u16, u16)>,
        pub kills: Vec<Signal>,
    }

    impl FakePty {
        pub fn new() -> Self {
            Self {
                to_deliver: VecDeque::new(),
                written: Vec::new(),
                exit_status: None,
                resized: Vec::new(),
                kills: Vec::new(),
            }
        }

        pub fn push_output(&mut self, bytes: &[u8]) {
            self.to_deliver.extend(bytes);
        }
    }

    impl Pty for FakePty {
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

        fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
            self.resized.push((cols, rows));
            Ok(())
        }

        fn set_utf8_mode(&mut self, _enabled: bool) {}
        fn set_xon_xoff(&mut self, _enabled: bool) {}

        fn kill(&mut self, signal: Signal) -> Result<()> {
            self.kills.push(signal);
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
    fn fake_pty_round_trips_bytes() {
        let mut pty = FakePty::new();
        pty.push_output(b"hello");
        let mut buf = [0u8; 16];
        let n = pty.read_nonblocking(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        pty.write(b"input").unwrap();
        assert_eq!(pty.written, b"input");
    }
}
