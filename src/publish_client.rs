use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("publish sink unavailable: {0}")]
    SinkUnavailable(String),
}

/// Seam towards the message broker. Implementations are expected to deliver
/// with at-least-once semantics where the sink supports it and to retain the
/// last value for late-joining subscribers.
#[async_trait]
pub trait PublishClient: Send + Sync {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), PublishError>;
}
