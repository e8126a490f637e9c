//! Leading-edge debounce window for bursty OS notifications.

use std::time::{Duration, Instant};

use super::ChangeKind;

/// Collapses a burst of notifications into one event.
///
/// The first notification opens a window of fixed length. Notifications
/// arriving while the window is open are dropped. Once the window has
/// elapsed, [`poll`](Self::poll) yields the kind of the notification that
/// opened it, exactly once.
///
/// ```rust,ignore
/// let mut debouncer = Debouncer::new(Duration::from_secs(1));
/// let start = Instant::now();
///
/// assert!(debouncer.offer(ChangeKind::Modified, start));
/// assert!(!debouncer.offer(ChangeKind::Modified, start + Duration::from_millis(50)));
/// assert_eq!(debouncer.poll(start + Duration::from_millis(500)), None);
/// assert_eq!(debouncer.poll(start + Duration::from_secs(1)), Some(ChangeKind::Modified));
/// ```
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    pending: Option<(ChangeKind, Instant)>,
}

impl Debouncer {
    /// Create a debouncer with the given window length.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Record a notification observed at `now`.
    ///
    /// Returns `true` if it opened a new window, `false` if it was absorbed
    /// by the open one.
    pub fn offer(&mut self, kind: ChangeKind, now: Instant) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some((kind, now));
        true
    }

    /// Close the window if it has elapsed at `now`, yielding its event.
    pub fn poll(&mut self, now: Instant) -> Option<ChangeKind> {
        let (kind, opened) = self.pending?;
        if now.saturating_duration_since(opened) < self.window {
            return None;
        }
        self.pending = None;
        Some(kind)
    }

    /// Time left until the open window closes, `None` if no window is open.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.pending
            .map(|(_, opened)| self.window.saturating_sub(now.saturating_duration_since(opened)))
    }

    /// Returns `true` while a window is open.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
