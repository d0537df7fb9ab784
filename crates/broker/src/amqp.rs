//! RabbitMQ channel client.
//!
//! [`AmqpChannel`] owns at most one connection and one channel per
//! process. Both are created on first use. A channel whose connection has
//! dropped, or whose last publish failed, is discarded so the next call
//! reconnects instead of reusing a dead handle. There is no background
//! reconnect loop.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::Mutex;

use crate::channel::{Delivery, DeliveryStream, MessageChannel};
use crate::config::BrokerConfig;
use crate::error::BrokerError;

/// AMQP reply code for a normal close.
const REPLY_SUCCESS: u16 = 200;

/// A live connection and the channel opened on it.
struct LiveChannel {
    connection: Connection,
    channel: Channel,
}

impl LiveChannel {
    fn is_usable(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }
}

/// Lazily connected AMQP [`MessageChannel`].
pub struct AmqpChannel {
    config: BrokerConfig,
    /// Held across the connect handshake so concurrent first calls open
    /// only one connection.
    live: Mutex<Option<LiveChannel>>,
}

impl AmqpChannel {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            live: Mutex::new(None),
        }
    }

    /// Return the cached channel, reconnecting if it is missing or dead.
    async fn channel(&self) -> Result<Channel, BrokerError> {
        let mut live = self.live.lock().await;

        if let Some(current) = live.as_ref() {
            if current.is_usable() {
                return Ok(current.channel.clone());
            }
            tracing::warn!(
                endpoint = %self.config.endpoint(),
                "Broker channel lost, reconnecting"
            );
            *live = None;
        }

        let fresh = self.connect().await?;
        let channel = fresh.channel.clone();
        *live = Some(fresh);
        Ok(channel)
    }

    /// Run the whole handshake (connect, open channel, declare exchange)
    /// under the configured connect timeout.
    async fn connect(&self) -> Result<LiveChannel, BrokerError> {
        tokio::time::timeout(self.config.connect_timeout, self.handshake())
            .await
            .map_err(|_| {
                BrokerError::Connection(format!(
                    "Timed out connecting to broker at {}",
                    self.config.endpoint()
                ))
            })?
    }

    async fn handshake(&self) -> Result<LiveChannel, BrokerError> {
        let endpoint = self.config.endpoint();
        let uri = self.config.amqp_url();

        // Drive lapin's I/O on the tokio runtime instead of its own threads.
        let properties = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);

        let connection = Connection::connect(&uri, properties).await.map_err(|e| {
            BrokerError::Connection(format!("Failed to connect to broker at {endpoint}: {e}"))
        })?;

        let channel = connection.create_channel().await.map_err(|e| {
            BrokerError::Connection(format!("Failed to open broker channel: {e}"))
        })?;

        channel
            .exchange_declare(
                &self.config.exchange,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                BrokerError::Connection(format!(
                    "Failed to declare exchange {}: {e}",
                    self.config.exchange
                ))
            })?;

        tracing::info!(
            endpoint = %endpoint,
            exchange = %self.config.exchange,
            "Connected to message broker"
        );

        Ok(LiveChannel {
            connection,
            channel,
        })
    }

    async fn invalidate(&self) {
        *self.live.lock().await = None;
    }
}

#[async_trait]
impl MessageChannel for AmqpChannel {
    fn exchange(&self) -> &str {
        &self.config.exchange
    }

    async fn ensure_channel(&self) -> Result<(), BrokerError> {
        self.channel().await.map(|_| ())
    }

    async fn publish(&self, routing_key: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let channel = self.channel().await?;

        let result = channel
            .basic_publish(
                &self.config.exchange,
                routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await;

        // The returned confirm is dropped on purpose: publishing is
        // at-most-once from this side.
        if let Err(e) = result {
            self.invalidate().await;
            return Err(BrokerError::Publish(e.to_string()));
        }
        Ok(())
    }

    async fn bind_queue(&self, queue: &str, routing_key: &str) -> Result<(), BrokerError> {
        let channel = self.channel().await?;

        channel
            .queue_declare(queue, QueueDeclareOptions::default(), FieldTable::default())
            .await
            .map_err(|e| BrokerError::Queue(format!("Failed to declare queue {queue}: {e}")))?;

        channel
            .queue_bind(
                queue,
                &self.config.exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Queue(format!("Failed to bind queue {queue}: {e}")))?;

        tracing::debug!(queue, routing_key, "Queue bound");
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, BrokerError> {
        let channel = self.channel().await?;

        let consumer = channel
            .basic_consume(
                queue,
                &format!("radiant-{queue}"),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Queue(format!("Failed to consume {queue}: {e}")))?;

        Ok(consumer
            .map(|delivery| {
                delivery
                    .map(Delivery::amqp)
                    .map_err(|e| BrokerError::Connection(e.to_string()))
            })
            .boxed())
    }

    async fn close(&self) {
        let Some(live) = self.live.lock().await.take() else {
            return;
        };

        if let Err(e) = live.connection.close(REPLY_SUCCESS, "shutdown").await {
            tracing::debug!(error = %e, "Broker connection already closed");
        }
        tracing::info!("Broker connection closed");
    }
}
