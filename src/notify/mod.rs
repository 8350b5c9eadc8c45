//! Owner notifications.
//!
//! Deliveries enqueue a notification and return immediately. A fixed pool of
//! workers drains a bounded queue; when the queue is full the notification is
//! dropped with a warning. Failures are logged and never reach the requester.

use std::sync::Arc;

use axum::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Something an owner may want to hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A file was delivered.
    FileDownloaded {
        /// File ID.
        file_id: String,
        /// File display name.
        file_name: String,
        /// Owner to notify.
        owner_id: i64,
        /// Download account email, when the download was authenticated.
        account_email: Option<String>,
        /// Client IP.
        ip: String,
        /// Delivery time (unix seconds).
        downloaded_at: i64,
    },
}

/// Delivers notifications to their recipients.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    async fn notify(&self, notification: &Notification) -> Result<(), String>;
}

/// Writes notifications to the log. Used when no transport is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), String> {
        match notification {
            Notification::FileDownloaded {
                file_id,
                file_name,
                owner_id,
                account_email,
                ip,
                ..
            } => {
                info!(
                    %file_id,
                    %file_name,
                    owner_id,
                    account = account_email.as_deref().unwrap_or("anonymous"),
                    %ip,
                    "File downloaded"
                );
            }
        }
        Ok(())
    }
}

/// Bounded worker pool for notifications.
#[derive(Clone)]
pub struct NotificationPool {
    sender: Option<mpsc::Sender<Notification>>,
}

impl NotificationPool {
    /// Start `workers` workers sharing a queue of `capacity` entries.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(notifier: Arc<dyn Notifier>, workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        for worker_id in 0..workers.max(1) {
            let receiver = Arc::clone(&receiver);
            let notifier = Arc::clone(&notifier);
            tokio::spawn(async move {
                loop {
                    let next = receiver.lock().await.recv().await;
                    let Some(notification) = next else {
                        debug!(worker_id, "Notification queue closed, worker exiting");
                        break;
                    };
                    if let Err(e) = notifier.notify(&notification).await {
                        error!(worker_id, error = %e, "Failed to deliver notification");
                    }
                }
            });
        }

        Self {
            sender: Some(sender),
        }
    }

    /// A pool that discards everything.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Queue a notification without waiting.
    ///
    /// Returns `false` if it was dropped.
    pub fn dispatch(&self, notification: Notification) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender.try_send(notification) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Notification queue is full, dropping notification");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Notification queue is closed, dropping notification");
                false
            }
        }
    }
}

impl std::fmt::Debug for NotificationPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationPool")
            .field("enabled", &self.sender.is_some())
            .finish()
    }
}
