/// Errors raised by broker channels and the publisher.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The broker could not be reached or refused the credentials.
    #[error("Broker connection error: {0}")]
    Connection(String),

    /// The channel was open but the publish call failed.
    #[error("Failed to publish message: {0}")]
    Publish(String),

    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Queue declaration, binding or consumption failed.
    #[error("Queue error: {0}")]
    Queue(String),
}

impl BrokerError {
    /// Whether retrying later might succeed (the broker side is at fault).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BrokerError::Connection(_) | BrokerError::Publish(_))
    }
}
