//! Single-slot, auto-dismissing user notices.
//!
//! Only the latest notice is kept: posting replaces whatever is pending.

use std::time::Duration;
use std::time::Instant;

pub const GENERIC_ERROR_TEXT: &str =
    "An unexpected error occurred. We recommend you completely refreshing your page.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: "Info".to_string(),
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: "An Error occurred".to_string(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NoticeBoard {
    slot: Option<(Notice, Instant)>,
    dismiss_after: Duration,
}

impl NoticeBoard {
    pub fn new(dismiss_after: Duration) -> Self {
        Self {
            slot: None,
            dismiss_after,
        }
    }

    pub fn post(&mut self, notice: Notice) {
        self.post_at(notice, Instant::now());
    }

    pub fn post_at(&mut self, notice: Notice, now: Instant) {
        match notice.level {
            NoticeLevel::Info => tracing::info!(text = %notice.text, "notice"),
            NoticeLevel::Error => tracing::warn!(text = %notice.text, "error notice"),
        }
        self.slot = Some((notice, now));
    }

    /// The pending notice, unless it has already been dismissed.
    pub fn current(&self) -> Option<&Notice> {
        self.current_at(Instant::now())
    }

    pub fn current_at(&self, now: Instant) -> Option<&Notice> {
        self.slot
            .as_ref()
            .filter(|(_, posted)| now.saturating_duration_since(*posted) < self.dismiss_after)
            .map(|(notice, _)| notice)
    }

    pub fn dismiss(&mut self) {
        self.slot = None;
    }
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000))
    }
}
