//! Message broker plumbing for handing studies to the enhancement worker.
//!
//! - [`MessageChannel`]: the seam over one lazily opened broker channel
//!   with a single direct exchange.
//! - [`AmqpChannel`]: RabbitMQ implementation on top of `lapin`.
//! - [`MemoryChannel`]: in-process exchange for local runs and tests.
//! - [`StudyPublisher`]: fire-and-forget study commands.

pub mod amqp;
pub mod channel;
pub mod config;
pub mod error;
pub mod memory;
pub mod publisher;

pub use amqp::AmqpChannel;
pub use channel::{Delivery, DeliveryStream, MessageChannel};
pub use config::{BrokerConfig, DEFAULT_EXCHANGE};
pub use error::BrokerError;
pub use memory::{MemoryChannel, PublishedMessage, DEFAULT_HISTORY_LIMIT};
pub use publisher::{StudyPublisher, ROUTING_KEY_NEW_STUDY};
