//! Toast-style notices. The engine never renders; it hands messages to a
//! `Notifier` and keeps the returned ids so it can later dismiss exactly the
//! notices it raised, and no others.

use std::sync::Mutex;

use uuid::Uuid;

pub type ToastId = Uuid;

pub trait Notifier: Send + Sync {
    /// Raises one dismissible error notice and returns its id.
    fn error(&self, message: &str) -> ToastId;

    /// Dismisses a previously raised notice. Unknown ids are ignored.
    fn dismiss(&self, id: ToastId);
}

/// Default headless notifier: notices go to the log.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, message: &str) -> ToastId {
        let id = Uuid::new_v4();
        tracing::error!(notice_id = %id, "{message}");
        id
    }

    fn dismiss(&self, _id: ToastId) {}
}

#[derive(Debug)]
struct Notice {
    id: ToastId,
    message: String,
    dismissed: bool,
}

/// Captures notices for assertions in tests and integration harnesses.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message ever raised, in order.
    pub fn messages(&self) -> Vec<String> {
        self.notices
            .lock()
            .map(|notices| notices.iter().map(|n| n.message.clone()).collect())
            .unwrap_or_default()
    }

    /// Messages of notices that have not been dismissed.
    pub fn active(&self) -> Vec<String> {
        self.notices
            .lock()
            .map(|notices| {
                notices
                    .iter()
                    .filter(|n| !n.dismissed)
                    .map(|n| n.message.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) -> ToastId {
        let id = Uuid::new_v4();
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(Notice {
                id,
                message: message.to_string(),
                dismissed: false,
            });
        }
        id
    }

    fn dismiss(&self, id: ToastId) {
        if let Ok(mut notices) = self.notices.lock() {
            for notice in notices.iter_mut().filter(|n| n.id == id) {
                notice.dismissed = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_tracks_dismissal() {
        let notifier = RecordingNotifier::new();
        let first = notifier.error("one");
        let _second = notifier.error("two");
        notifier.dismiss(first);
        assert_eq!(notifier.messages(), vec!["one", "two"]);
        assert_eq!(notifier.active(), vec!["two"]);
    }
}
