use std::time::{Duration, Instant};

/// Debounces bulk decoder output into display updates using two timers
/// feeding a single "show-bulk" slot (spec §4.5):
///
/// - a **short** timer, restarted on every arrival of input to the
///   decoder; firing it (no further arrivals before it elapses) triggers
///   a snapshot.
/// - a **long**, single-shot timer, started once when a burst begins and
///   never restarted, guaranteeing a snapshot rate floor during
///   sustained output.
///
/// Deliberately driven by an externally supplied `Instant` rather than
/// spawning its own thread/timer, so it is unit-testable without real
/// sleeps; the `Session`'s event loop (which already owns a thread per
/// the teacher's `pty::reader::spawn_pty_threads` pattern) calls
/// `notify_activity` on every PTY read and `poll`/`next_deadline` to
/// decide when to wake up and fire a frame.
pub struct RefreshScheduler {
    short_interval: Duration,
    long_interval: Duration,
    short_deadline: Option<Instant>,
    long_deadline: Option<Instant>,
}

impl RefreshScheduler {
    pub const DEFAULT_SHORT_MS: u64 = 10;
    pub const DEFAULT_LONG_MS: u64 = 40;

    pub fn new() -> Self {
        Self::with_intervals(
            Duration::from_millis(Self::DEFAULT_SHORT_MS),
            Duration::from_millis(Self::DEFAULT_LONG_MS),
        )
    }

    pub fn with_intervals(short_interval: Duration, long_interval: Duration) -> Self {
        Self {
            short_interval,
            long_interval,
            short_deadline: None,
            long_deadline: None,
        }
    }

    /// Called on every arrival of bytes/tokens into the decoder. Always
    /// restarts the short timer; starts the long timer only if it is
    /// not already running (it is never restarted once armed).
    pub fn notify_activity(&mut self, now: Instant) {
        self.short_deadline = Some(now + self.short_interval);
        if self.long_deadline.is_none() {
            self.long_deadline = Some(now + self.long_interval);
        }
    }

    /// Check whether a snapshot should fire at `now`. If either timer
    /// has elapsed, both are stopped (spec §4.5 "on fire: stop both
    /// timers") and this returns `true` — the caller should take a
    /// snapshot and push it to every attached display.
    pub fn poll(&mut self, now: Instant) -> bool {
        let short_due = self.short_deadline.is_some_and(|d| now >= d);
        let long_due = self.long_deadline.is_some_and(|d| now >= d);
        if short_due || long_due {
            self.short_deadline = None;
            self.long_deadline = None;
            true
        } else {
            false
        }
    }

    /// Earliest instant the caller needs to wake up and call `poll`
    /// again, or `None` if no burst is in progress.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.short_deadline, self.long_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    /// True while a burst is in progress (either timer armed).
    pub fn is_pending(&self) -> bool {
        self.short_deadline.is_some() || self.long_deadline.is_some()
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_after_short_timer_with_no_further_activity() {
        let mut sched = RefreshScheduler::with_intervals(Duration::from_millis(10), Duration::from_millis(40));
        let t0 = Instant::now();
        sched.notify_activity(t0);
        assert!(!sched.poll(t0 + Duration::from_millis(5)));
        assert!(sched.poll(t0 + Duration::from_millis(11)));
        assert!(!sched.is_pending());
    }

    #[test]
    fn short_timer_restarts_on_each_activity_but_long_timer_does_not() {
        let mut sched = RefreshScheduler::with_intervals(Duration::from_millis(10), Duration::from_millis(40));
        let t0 = Instant::now();
        sched.notify_activity(t0);
        // keep feeding activity just under the short interval, never letting it fire
        for i in 1..5 {
            let t = t0 + Duration::from_millis(i * 9);
            assert!(!sched.poll(t));
            sched.notify_activity(t);
        }
        // long timer started at t0 fires at t0+40ms even though short timer
        // keeps getting pushed back by continued activity.
        let t_long = t0 + Duration::from_millis(41);
        assert!(sched.poll(t_long));
    }

    #[test]
    fn idle_scheduler_has_no_deadline() {
        let sched = RefreshScheduler::new();
        assert!(sched.next_deadline().is_none());
        assert!(!sched.is_pending());
    }
}
