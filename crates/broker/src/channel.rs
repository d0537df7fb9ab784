use async_trait::async_trait;
use futures::stream::BoxStream;
use lapin::options::BasicAckOptions;
use serde::de::DeserializeOwned;

use crate::error::BrokerError;

/// Stream of deliveries from a consumed queue.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, BrokerError>>;

/// One logical broker channel with a single exchange.
///
/// The channel is opened on first use and reused afterwards. Callers never
/// hold the underlying connection; they go through these methods, which
/// reopen the channel when the previous one has been lost.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Name of the exchange messages are published to.
    fn exchange(&self) -> &str;

    /// Open the connection and channel and declare the exchange, unless a
    /// live channel already exists.
    async fn ensure_channel(&self) -> Result<(), BrokerError>;

    /// Publish `payload` under `routing_key`. Broker confirms are not
    /// awaited.
    async fn publish(&self, routing_key: &str, payload: Vec<u8>) -> Result<(), BrokerError>;

    /// Declare `queue` and bind it to the exchange for `routing_key`.
    async fn bind_queue(&self, queue: &str, routing_key: &str) -> Result<(), BrokerError>;

    /// Start consuming `queue`. Deliveries must be acked explicitly.
    async fn consume(&self, queue: &str) -> Result<DeliveryStream, BrokerError>;

    /// Close the channel and connection, if open.
    async fn close(&self);
}

/// A message received from a queue.
pub struct Delivery {
    pub routing_key: String,
    pub payload: Vec<u8>,
    acker: Acker,
}

enum Acker {
    Amqp(lapin::acker::Acker),
    /// In-process deliveries need no acknowledgement.
    Noop,
}

impl Delivery {
    pub(crate) fn amqp(delivery: lapin::message::Delivery) -> Self {
        Self {
            routing_key: delivery.routing_key.as_str().to_string(),
            payload: delivery.data,
            acker: Acker::Amqp(delivery.acker),
        }
    }

    pub(crate) fn in_process(routing_key: &str, payload: Vec<u8>) -> Self {
        Self {
            routing_key: routing_key.to_string(),
            payload,
            acker: Acker::Noop,
        }
    }

    /// Decode the payload as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, BrokerError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    pub async fn ack(&self) -> Result<(), BrokerError> {
        match &self.acker {
            Acker::Amqp(acker) => acker
                .ack(BasicAckOptions::default())
                .await
                .map_err(|e| BrokerError::Queue(format!("Failed to ack delivery: {e}"))),
            Acker::Noop => Ok(()),
        }
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("routing_key", &self.routing_key)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
