use std::sync::Arc;

use radiant_db::models::study::Study;
use serde::Serialize;

use crate::channel::MessageChannel;
use crate::error::BrokerError;

/// Routing key the enhancement worker listens on.
pub const ROUTING_KEY_NEW_STUDY: &str = "new_study";

/// Publishes study commands to the enhancement worker.
///
/// Delivery is at most once: a successful return means the message was
/// handed to the broker, not that the worker received it.
#[derive(Clone)]
pub struct StudyPublisher {
    channel: Arc<dyn MessageChannel>,
}

impl StudyPublisher {
    pub fn new(channel: Arc<dyn MessageChannel>) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &Arc<dyn MessageChannel> {
        &self.channel
    }

    /// Serialize `message` as JSON and publish it under `routing_key`.
    pub async fn publish<T>(&self, routing_key: &str, message: &T) -> Result<(), BrokerError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(message)?;
        let size = payload.len();

        self.channel.ensure_channel().await?;
        self.channel.publish(routing_key, payload).await?;

        tracing::debug!(
            exchange = %self.channel.exchange(),
            routing_key,
            bytes = size,
            "Message published"
        );
        Ok(())
    }

    /// Hand a `PENDING` study to the worker under `new_study`.
    pub async fn announce_study(&self, study: &Study) -> Result<(), BrokerError> {
        self.publish(ROUTING_KEY_NEW_STUDY, study).await?;
        tracing::info!(study_id = %study.id, files = study.files_ids.len(), "Study submitted for enhancement");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryChannel;
    use assert_matches::assert_matches;
    use radiant_db::models::study::NewStudy;

    fn pending_study() -> Study {
        Study::new_pending(NewStudy {
            user_id: uuid::Uuid::new_v4(),
            files_ids: vec!["f1".into(), "f2".into()],
            description: String::new(),
        })
    }

    #[tokio::test]
    async fn announce_publishes_full_study_under_new_study() {
        let channel = Arc::new(MemoryChannel::default());
        let publisher = StudyPublisher::new(channel.clone());
        let study = pending_study();

        publisher.announce_study(&study).await.unwrap();

        let sent = channel.published_with_key(ROUTING_KEY_NEW_STUDY);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].exchange, "studies_ex");

        let decoded: Study = sent[0].json().unwrap();
        assert_eq!(decoded, study);
    }

    #[tokio::test]
    async fn publish_reuses_the_open_channel() {
        let channel = Arc::new(MemoryChannel::default());
        let publisher = StudyPublisher::new(channel.clone());

        publisher.publish("a", &serde_json::json!({"n": 1})).await.unwrap();
        publisher.publish("b", &serde_json::json!({"n": 2})).await.unwrap();

        assert_eq!(channel.connect_count(), 1);
        assert_eq!(channel.published().len(), 2);
    }

    #[tokio::test]
    async fn unavailable_broker_is_reported() {
        let channel = Arc::new(MemoryChannel::default());
        channel.set_available(false);
        let publisher = StudyPublisher::new(channel.clone());

        let err = publisher.announce_study(&pending_study()).await.unwrap_err();
        assert_matches!(err, BrokerError::Connection(_));
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn timestamps_serialize_as_rfc3339() {
        let channel = Arc::new(MemoryChannel::default());
        let publisher = StudyPublisher::new(channel.clone());
        let study = pending_study();

        publisher.announce_study(&study).await.unwrap();

        let value: serde_json::Value = channel.published()[0].json().unwrap();
        let created = value["createdAt"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(created).is_ok());
        assert_eq!(value["status"], radiant_core::study_status::StudyStatus::Pending.as_str());
    }
}
