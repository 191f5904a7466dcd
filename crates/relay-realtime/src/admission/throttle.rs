//! Per-identity connection-attempt windows.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use relay_core::types::id::IdentityId;

/// Attempts recorded for one identity in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptWindow {
    /// Attempts in the current window, including the latest.
    pub count: u32,
    /// When the current window opened.
    pub window_start: DateTime<Utc>,
    /// Most recent attempt.
    pub last_attempt: DateTime<Utc>,
}

/// Fixed-window attempt counter keyed by identity.
///
/// Not synchronized; the admission controller owns it behind its lock.
#[derive(Debug)]
pub struct AttemptTracker {
    /// Identity → its window.
    windows: HashMap<IdentityId, AttemptWindow>,
    /// Window length.
    window: Duration,
    /// Attempts allowed per window.
    max_attempts: u32,
}

impl AttemptTracker {
    /// Creates a tracker allowing `max_attempts` per `window`.
    pub fn new(window: Duration, max_attempts: u32) -> Self {
        Self {
            windows: HashMap::new(),
            window,
            max_attempts,
        }
    }

    /// Records an attempt at `now`, opening a fresh window if the old one expired.
    pub fn record_at(&mut self, identity_id: &IdentityId, now: DateTime<Utc>) -> AttemptWindow {
        let window = self.window;
        let entry = self
            .windows
            .entry(identity_id.clone())
            .and_modify(|w| {
                if now - w.window_start >= window {
                    *w = AttemptWindow {
                        count: 0,
                        window_start: now,
                        last_attempt: now,
                    };
                }
                w.count = w.count.saturating_add(1);
                w.last_attempt = now;
            })
            .or_insert(AttemptWindow {
                count: 1,
                window_start: now,
                last_attempt: now,
            });
        *entry
    }

    /// Whether the window has gone past the attempt limit.
    pub fn is_exceeded(&self, window: &AttemptWindow) -> bool {
        window.count > self.max_attempts
    }

    /// When the window closes.
    pub fn retry_after(&self, window: &AttemptWindow) -> DateTime<Utc> {
        window.window_start + self.window
    }

    /// Current window for an identity.
    pub fn get(&self, identity_id: &IdentityId) -> Option<AttemptWindow> {
        self.windows.get(identity_id).copied()
    }

    /// Drops windows with no attempt for more than two window lengths.
    pub fn prune_idle(&mut self, now: DateTime<Utc>) -> usize {
        let idle = self.window * 2;
        let before = self.windows.len();
        self.windows.retain(|_, w| now - w.last_attempt <= idle);
        before - self.windows.len()
    }

    /// Number of tracked identities.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether no identity is tracked.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
