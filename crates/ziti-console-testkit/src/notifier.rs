use parking_lot::Mutex;
use ziti_console_core::notify::{Level, Notification, Notifier};

/// Notifier that keeps every notification in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    /// Most recent notification.
    #[must_use]
    pub fn last(&self) -> Option<Notification> {
        self.notifications.lock().last().cloned()
    }

    /// Subtitles of notifications at `level`.
    #[must_use]
    pub fn subtitles(&self, level: Level) -> Vec<String> {
        self.notifications
            .lock()
            .iter()
            .filter(|n| n.level == level)
            .map(|n| n.subtitle.clone())
            .collect()
    }

    /// Number of notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notifications.lock().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifications.lock().is_empty()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}
