//! Prune notifications for the host.
//!
//! After a pass that applied prunes, the manager renders a notification at
//! the configured [`NotificationLevel`](crate::engine::config::NotificationLevel)
//! and delivers it through a [`NotificationSink`] at idle time. Delivery is
//! best effort.

use crate::engine::SinkFuture;
use std::sync::Mutex;
use tracing::info;

pub trait NotificationSink: Send + Sync {
    fn notify<'a>(&'a self, text: &'a str) -> SinkFuture<'a, ()>;
}

/// Writes notifications to the `tracing` log at `info`.
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify<'a>(&'a self, text: &'a str) -> SinkFuture<'a, ()> {
        Box::pin(async move {
            info!("{text}");
            Ok(())
        })
    }
}

/// Keeps every notification in memory, in delivery order.
#[derive(Default)]
pub struct CollectingNotifier {
    sent: Mutex<Vec<String>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl NotificationSink for CollectingNotifier {
    fn notify<'a>(&'a self, text: &'a str) -> SinkFuture<'a, ()> {
        Box::pin(async move {
            self.sent
                .lock()
                .map_err(|e| format!("Failed to record notification: {e}"))?
                .push(text.to_string());
            Ok(())
        })
    }
}
