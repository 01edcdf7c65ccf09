//! Notifier trait for user-visible failure alerts

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::operation::OperationKey;

/// A one-shot alert shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub operation: OperationKey,
    pub message: String,
}

impl Notification {
    /// Alert for a failed live mutation
    pub fn mutation_failed(operation: &OperationKey, message: &str) -> Self {
        Self {
            title: "Action failed".to_string(),
            operation: operation.clone(),
            message: message.to_string(),
        }
    }
}

/// Trait for surfacing alerts to the user
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Get the notifier type name (e.g. "log")
    fn type_name(&self) -> &str;

    /// Deliver a notification
    async fn notify(&self, notification: &Notification) -> crate::Result<()>;
}

/// Notifier that writes alerts to the log; used when no UI sink is attached
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn type_name(&self) -> &str {
        "log"
    }

    async fn notify(&self, notification: &Notification) -> crate::Result<()> {
        tracing::error!(
            "{}: '{}' failed: {}",
            notification.title,
            notification.operation,
            notification.message
        );
        Ok(())
    }
}
