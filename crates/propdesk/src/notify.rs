//! Outbound notifications.
//!
//! Delivery is a collaborator behind the `Notifier` trait. Coordinators treat
//! every notification as best effort: a failure is logged, never raised.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Something a person should be told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    TechnicianAssigned {
        technician_email: String,
        work_order_id: String,
        address: String,
        issue: String,
    },
    TenantInvited {
        email: String,
        name: String,
        manager_name: String,
    },
    TechnicianInvited {
        email: String,
        name: String,
        manager_name: String,
    },
    ManagerInvited {
        email: String,
        name: String,
        organization: String,
    },
    WorkOrderCreated {
        manager_email: String,
        work_order_id: String,
        issue: String,
    },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Notification::TechnicianAssigned {
                technician_email, ..
            } => technician_email,
            Notification::TenantInvited { email, .. }
            | Notification::TechnicianInvited { email, .. }
            | Notification::ManagerInvited { email, .. } => email,
            Notification::WorkOrderCreated { manager_email, .. } => manager_email,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            recipient = %notification.recipient(),
            notification = ?notification,
            "Notification"
        );
        Ok(())
    }
}

#[cfg(test)]
pub use recording::RecordingNotifier;

#[cfg(test)]
mod recording {
    use tokio::sync::Mutex;

    use super::*;

    /// Keeps every notification; optionally fails every delivery.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
        failing: bool,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::default(),
                failing: true,
            }
        }

        pub async fn sent(&self) -> Vec<Notification> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.lock().await.push(notification.clone());
            if self.failing {
                return Err(NotifyError::Delivery {
                    recipient: notification.recipient().to_string(),
                    reason: "simulated outage".to_string(),
                });
            }
            Ok(())
        }
    }
}
