//! Core trait abstractions (ports between services and infrastructure)

use async_trait::async_trait;
use serde_json::Value;

use super::error::HmsResult;

/// Delivery port for freshly persisted notifications.
///
/// The in-process WebSocket hub and the Redis publisher both implement it;
/// the notification service fans every stored notification out to each sink.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    /// Deliver one serialized notification to a single recipient
    async fn deliver(&self, recipient_user_id: i32, payload: &Value) -> HmsResult<()>;
}
