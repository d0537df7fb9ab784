//! In-process direct exchange.
//!
//! [`MemoryChannel`] routes published messages to bound queues by exact
//! routing key and keeps a bounded log of recent publishes. It can be
//! switched "offline" to exercise broker-outage paths.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::channel::{Delivery, DeliveryStream, MessageChannel};
use crate::config::DEFAULT_EXCHANGE;
use crate::error::BrokerError;

/// How many publishes [`MemoryChannel`] remembers by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// A message recorded by [`MemoryChannel::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, BrokerError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

struct Queue {
    sender: mpsc::UnboundedSender<Delivery>,
    /// Taken by the first consumer.
    receiver: Option<mpsc::UnboundedReceiver<Delivery>>,
}

impl Queue {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }
}

struct State {
    available: bool,
    open: bool,
    connects: usize,
    /// Most recent last; trimmed to `history_limit`.
    published: VecDeque<PublishedMessage>,
    history_limit: usize,
    /// routing key -> bound queue names
    bindings: HashMap<String, Vec<String>>,
    queues: HashMap<String, Queue>,
}

/// In-process [`MessageChannel`].
pub struct MemoryChannel {
    exchange: String,
    state: Mutex<State>,
}

impl MemoryChannel {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            state: Mutex::new(State {
                available: true,
                open: false,
                connects: 0,
                published: VecDeque::new(),
                history_limit: DEFAULT_HISTORY_LIMIT,
                bindings: HashMap::new(),
                queues: HashMap::new(),
            }),
        }
    }

    /// Keep at most `limit` publishes in the log.
    pub fn with_history_limit(self, limit: usize) -> Self {
        {
            let mut state = self.lock();
            state.history_limit = limit;
            let excess = state.published.len().saturating_sub(limit);
            state.published.drain(..excess);
        }
        self
    }

    /// Simulate the broker going away (`false`) or coming back (`true`).
    /// Going offline also drops the open channel.
    pub fn set_available(&self, available: bool) {
        let mut state = self.lock();
        state.available = available;
        if !available {
            state.open = false;
        }
    }

    /// Recent publishes, oldest first.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.iter().cloned().collect()
    }

    pub fn published_with_key(&self, routing_key: &str) -> Vec<PublishedMessage> {
        self.lock()
            .published
            .iter()
            .filter(|m| m.routing_key == routing_key)
            .cloned()
            .collect()
    }

    /// How many times a channel has been opened.
    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-call; the state
        // itself is still consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn open(state: &mut State) -> Result<(), BrokerError> {
        if !state.available {
            return Err(BrokerError::Connection("Broker is unavailable".into()));
        }
        if !state.open {
            state.open = true;
            state.connects += 1;
        }
        Ok(())
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new(DEFAULT_EXCHANGE)
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    fn exchange(&self) -> &str {
        &self.exchange
    }

    async fn ensure_channel(&self) -> Result<(), BrokerError> {
        Self::open(&mut self.lock())
    }

    async fn publish(&self, routing_key: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let mut state = self.lock();
        Self::open(&mut state)?;

        if let Some(queues) = state.bindings.get(routing_key) {
            for name in queues {
                if let Some(queue) = state.queues.get(name) {
                    let _ = queue
                        .sender
                        .send(Delivery::in_process(routing_key, payload.clone()));
                }
            }
        }

        if state.history_limit > 0 {
            if state.published.len() == state.history_limit {
                state.published.pop_front();
            }
            state.published.push_back(PublishedMessage {
                exchange: self.exchange.clone(),
                routing_key: routing_key.to_string(),
                payload,
            });
        }
        Ok(())
    }

    async fn bind_queue(&self, queue: &str, routing_key: &str) -> Result<(), BrokerError> {
        let mut state = self.lock();
        Self::open(&mut state)?;

        state.queues.entry(queue.to_string()).or_insert_with(Queue::new);
        let bound = state.bindings.entry(routing_key.to_string()).or_default();
        if !bound.iter().any(|q| q == queue) {
            bound.push(queue.to_string());
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, BrokerError> {
        let mut state = self.lock();
        Self::open(&mut state)?;

        let receiver = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::Queue(format!("Queue {queue} is not declared")))?
            .receiver
            .take()
            .ok_or_else(|| BrokerError::Queue(format!("Queue {queue} already has a consumer")))?;

        let stream = futures::stream::unfold(receiver, |mut rx| async move {
            rx.recv().await.map(|delivery| (Ok(delivery), rx))
        });
        Ok(stream.boxed())
    }

    async fn close(&self) {
        self.lock().open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn ensure_channel_opens_once() {
        let channel = MemoryChannel::default();

        channel.ensure_channel().await.unwrap();
        channel.ensure_channel().await.unwrap();
        channel.publish("new_study", b"{}".to_vec()).await.unwrap();

        assert_eq!(channel.connect_count(), 1);
    }

    #[tokio::test]
    async fn reopens_after_outage() {
        let channel = MemoryChannel::default();
        channel.ensure_channel().await.unwrap();

        channel.set_available(false);
        assert_matches!(
            channel.ensure_channel().await,
            Err(BrokerError::Connection(_))
        );

        channel.set_available(true);
        channel.ensure_channel().await.unwrap();
        assert_eq!(channel.connect_count(), 2);
    }

    #[tokio::test]
    async fn routes_only_to_queues_bound_for_the_key() {
        let channel = MemoryChannel::default();
        channel.bind_queue("enhance", "new_study").await.unwrap();
        channel.bind_queue("audit", "other").await.unwrap();

        let mut enhance = channel.consume("enhance").await.unwrap();
        let mut audit = channel.consume("audit").await.unwrap();

        channel.publish("new_study", br#"{"n":1}"#.to_vec()).await.unwrap();

        let delivery = enhance.next().await.unwrap().unwrap();
        assert_eq!(delivery.routing_key, "new_study");
        assert_eq!(delivery.json::<serde_json::Value>().unwrap()["n"], 1);
        delivery.ack().await.unwrap();

        channel.close().await;
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(50), audit.next())
                .await
                .is_err(),
            "audit queue must not receive new_study messages"
        );
    }

    #[tokio::test]
    async fn second_consumer_is_rejected() {
        let channel = MemoryChannel::default();
        channel.bind_queue("enhance", "new_study").await.unwrap();

        let _first = channel.consume("enhance").await.unwrap();
        assert_matches!(channel.consume("enhance").await.map(|_| ()), Err(BrokerError::Queue(_)));
        assert_matches!(channel.consume("missing").await.map(|_| ()), Err(BrokerError::Queue(_)));
    }

    #[tokio::test]
    async fn publish_while_offline_records_nothing() {
        let channel = MemoryChannel::default();
        channel.set_available(false);

        assert!(channel.publish("new_study", vec![]).await.is_err());
        assert!(channel.published().is_empty());
    }

    #[tokio::test]
    async fn publish_log_keeps_only_the_most_recent() {
        let channel = MemoryChannel::default().with_history_limit(2);

        for n in 1..=3 {
            channel
                .publish("new_study", format!(r#"{{"n":{n}}}"#).into_bytes())
                .await
                .unwrap();
        }

        let kept: Vec<i64> = channel
            .published()
            .iter()
            .map(|m| m.json::<serde_json::Value>().unwrap()["n"].as_i64().unwrap())
            .collect();
        assert_eq!(kept, vec![2, 3]);
    }

    #[tokio::test]
    async fn zero_history_limit_still_routes() {
        let channel = MemoryChannel::default().with_history_limit(0);
        channel.bind_queue("enhance", "new_study").await.unwrap();
        let mut enhance = channel.consume("enhance").await.unwrap();

        channel.publish("new_study", b"{}".to_vec()).await.unwrap();

        assert!(channel.published().is_empty());
        assert_eq!(enhance.next().await.unwrap().unwrap().routing_key, "new_study");
    }
}
