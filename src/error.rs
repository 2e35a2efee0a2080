use thiserror::Error;

/// Error taxonomy the core distinguishes, per the propagation policy:
/// internal invariant violations are programmer errors (panics), never
/// a `TermError` variant. Everything here propagates to the `Session`
/// boundary and becomes either a `Display` signal or a one-shot
/// notification.
#[derive(Debug, Error)]
pub enum TermError {
    /// A history backend could not complete a write (disk full, file
    /// vanished). The session degrades to no-op history writes and
    /// surfaces a one-time warning.
    #[error("history storage error: {0}")]
    Storage(String),

    /// The PTY returned an error on read or write.
    #[error("pty error: {0}")]
    Pty(#[from] std::io::Error),

    /// `start()` failed before a child process ever existed.
    #[error("failed to start child process: {0}")]
    ChildStartFailure(String),

    /// A public API call received out-of-range arguments.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, TermError>;

/// A single entry in the decoder's diagnostic ring. `DecodingError` never
/// reaches the caller; it is recorded here for postmortem inspection.
#[derive(Debug, Clone)]
pub struct DecodingDiagnostic {
    pub description: String,
}

/// Fixed-capacity ring of the last `CAPACITY` decoding diagnostics.
#[derive(Debug)]
pub struct DiagnosticRing {
    entries: std::collections::VecDeque<DecodingDiagnostic>,
    capacity: usize,
}

impl DiagnosticRing {
    pub const CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self {
            entries: std::collections::VecDeque::with_capacity(Self::CAPACITY),
            capacity: Self::CAPACITY,
        }
    }

    pub fn push(&mut self, description: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(DecodingDiagnostic {
            description: description.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &DecodingDiagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DiagnosticRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_evicts_oldest_past_capacity() {
        let mut ring = DiagnosticRing::new();
        for i in 0..(DiagnosticRing::CAPACITY + 10) {
            ring.push(format!("event {i}"));
        }
        assert_eq!(ring.len(), DiagnosticRing::CAPACITY);
        let first = ring.iter().next().unwrap();
        assert_eq!(first.description, "event 10");
    }
}
