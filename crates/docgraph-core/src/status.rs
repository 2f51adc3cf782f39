//! Transient user-facing notifications.
//!
//! Messages are shown one at a time in arrival order. Each one stays visible
//! for its duration, fades out, and only then makes room for the next.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_STATUS_DURATION: Duration = Duration::from_millis(5000);

/// How long a message lingers in the fading phase before it is removed.
pub const FADE_OUT: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Info,
    Success,
    Warning,
    Error,
    Progress,
}

impl StatusKind {
    pub fn icon(&self) -> &'static str {
        match self {
            StatusKind::Info => "ℹ",
            StatusKind::Success => "✔",
            StatusKind::Warning => "⚠",
            StatusKind::Error => "✖",
            StatusKind::Progress => "⟳",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Info => "info",
            StatusKind::Success => "success",
            StatusKind::Warning => "warning",
            StatusKind::Error => "error",
            StatusKind::Progress => "progress",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: String,
    pub kind: StatusKind,
    pub duration: Duration,
    pub enqueued_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPhase {
    Visible,
    Fading,
}

#[derive(Debug)]
struct Displayed {
    status: StatusMessage,
    phase: StatusPhase,
    /// When the current phase started
    since: Instant,
}

pub struct StatusNotifier {
    queue: VecDeque<StatusMessage>,
    current: Option<Displayed>,
    default_duration: Duration,
}

impl StatusNotifier {
    pub fn new(default_duration: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            default_duration,
        }
    }

    pub fn notify(&mut self, message: impl Into<String>, kind: StatusKind) {
        self.notify_for(message, kind, self.default_duration);
    }

    pub fn notify_for(&mut self, message: impl Into<String>, kind: StatusKind, duration: Duration) {
        let now = Instant::now();
        let status = StatusMessage {
            message: message.into(),
            kind,
            duration,
            enqueued_at: now,
        };
        debug!(kind = kind.as_str(), message = %status.message, "status queued");
        self.queue.push_back(status);
        self.process_queue(now);
    }

    /// Advance the display lifecycle to `now`.
    pub fn tick(&mut self, now: Instant) {
        // A long gap between ticks can finish several messages at once.
        loop {
            let Some(displayed) = self.current.as_mut() else {
                self.process_queue(now);
                return;
            };
            let elapsed = now.saturating_duration_since(displayed.since);
            match displayed.phase {
                StatusPhase::Visible if elapsed >= displayed.status.duration => {
                    displayed.phase = StatusPhase::Fading;
                    displayed.since += displayed.status.duration;
                }
                StatusPhase::Fading if elapsed >= FADE_OUT => {
                    let finished_at = displayed.since + FADE_OUT;
                    self.current = None;
                    if !self.process_queue(finished_at) {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    /// The message currently on screen, if any.
    pub fn current(&self) -> Option<(&StatusMessage, StatusPhase)> {
        self.current.as_ref().map(|d| (&d.status, d.phase))
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// The displayed message followed by everything still waiting.
    pub fn messages(&self) -> impl Iterator<Item = &StatusMessage> {
        self.current
            .as_ref()
            .map(|d| &d.status)
            .into_iter()
            .chain(self.queue.iter())
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    fn process_queue(&mut self, now: Instant) -> bool {
        if self.current.is_some() {
            return false;
        }
        match self.queue.pop_front() {
            Some(status) => {
                self.current = Some(Displayed {
                    status,
                    phase: StatusPhase::Visible,
                    since: now,
                });
                true
            }
            None => false,
        }
    }
}

impl Default for StatusNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_DURATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shown(notifier: &StatusNotifier) -> Option<String> {
        notifier.current().map(|(s, _)| s.message.clone())
    }

    #[test]
    fn test_first_message_is_shown_immediately() {
        let mut notifier = StatusNotifier::default();
        notifier.notify("hello", StatusKind::Info);
        assert_eq!(shown(&notifier).as_deref(), Some("hello"));
        assert_eq!(notifier.pending(), 0);
    }

    #[test]
    fn test_messages_never_overlap_and_keep_order() {
        let mut notifier = StatusNotifier::new(Duration::from_millis(100));
        let start = Instant::now();
        for i in 0..5 {
            notifier.notify(format!("msg {}", i), StatusKind::Progress);
        }

        let mut seen: Vec<String> = Vec::new();
        let mut now = start;
        for _ in 0..300 {
            now += Duration::from_millis(10);
            notifier.tick(now);
            // `current` is a single slot, so visibility is exclusive by construction;
            // what matters is that the queue drains into it one by one.
            if let Some(message) = shown(&notifier) {
                if seen.last() != Some(&message) {
                    seen.push(message);
                }
            }
        }

        assert_eq!(seen, vec!["msg 0", "msg 1", "msg 2", "msg 3", "msg 4"]);
        assert!(notifier.is_idle());
    }

    #[test]
    fn test_message_fades_before_next_is_shown() {
        let mut notifier = StatusNotifier::new(Duration::from_millis(1000));
        notifier.notify("first", StatusKind::Success);
        notifier.notify("second", StatusKind::Error);
        let later = Instant::now() + Duration::from_millis(1100);

        notifier.tick(later);
        let (status, phase) = notifier.current().unwrap();
        assert_eq!(status.message, "first");
        assert_eq!(phase, StatusPhase::Fading);
        assert_eq!(notifier.pending(), 1);

        notifier.tick(later + FADE_OUT);
        let (status, phase) = notifier.current().unwrap();
        assert_eq!(status.message, "second");
        assert_eq!(phase, StatusPhase::Visible);
        assert_eq!(notifier.pending(), 0);
    }

    #[test]
    fn test_message_stays_visible_for_its_duration() {
        let start = Instant::now();
        let mut notifier = StatusNotifier::default();
        notifier.notify_for("short", StatusKind::Warning, Duration::from_secs(2));

        notifier.tick(start + Duration::from_millis(1500));
        assert_eq!(notifier.current().map(|(_, p)| p), Some(StatusPhase::Visible));
    }

    #[test]
    fn test_long_gap_drains_everything_due() {
        let mut notifier = StatusNotifier::new(Duration::from_millis(50));
        notifier.notify("a", StatusKind::Info);
        notifier.notify("b", StatusKind::Info);
        notifier.notify("c", StatusKind::Info);

        notifier.tick(Instant::now() + Duration::from_secs(60));
        assert!(notifier.is_idle());
    }

    #[test]
    fn test_notify_after_idle_shows_again() {
        let mut notifier = StatusNotifier::new(Duration::from_millis(10));
        notifier.notify("one", StatusKind::Info);
        notifier.tick(Instant::now() + Duration::from_secs(1));
        assert!(notifier.current().is_none());

        notifier.notify("two", StatusKind::Info);
        assert_eq!(shown(&notifier).as_deref(), Some("two"));
    }
}
