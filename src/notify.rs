// src/notify.rs
// Transient, non-blocking notices (toasts) for the viewer

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: String,
    pub level: NoticeLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

/// Sending half of the notice channel.
///
/// Pushing never blocks and never fails from the caller's point of view: if
/// nobody is listening the notice is dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Notice>>,
}

impl Notifier {
    pub fn channel() -> (Self, NoticeReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn push(&self, level: NoticeLevel, message: impl Into<String>) {
        let notice = Notice::new(level, message);
        match level {
            NoticeLevel::Error | NoticeLevel::Warning => {
                tracing::debug!("Notice ({:?}): {}", level, notice.message)
            }
            _ => tracing::trace!("Notice ({:?}): {}", level, notice.message),
        }

        if let Some(tx) = &self.tx {
            let _ = tx.send(notice);
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Error, message);
    }
}

/// Collect every notice currently queued without waiting.
pub fn drain(rx: &mut NoticeReceiver) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}
