use async_trait::async_trait;
use tracing::info;
use tripmatch_core::events::EventSink;
use tripmatch_core::CoreResult;
use tripmatch_shared::DomainEvent;

/// Writes events to the log. Used when no broker is configured.
#[derive(Clone, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: &DomainEvent) -> CoreResult<()> {
        let payload = serde_json::to_string(event).unwrap_or_default();
        info!(
            event_type = event.event_type.as_str(),
            severity = ?event.severity,
            "event {}",
            payload
        );
        Ok(())
    }
}

#[cfg(feature = "kafka")]
pub use kafka::EventProducer;

#[cfg(feature = "kafka")]
mod kafka {
    use async_trait::async_trait;
    use rdkafka::config::ClientConfig;
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use rdkafka::util::Timeout;
    use std::time::Duration;
    use tracing::{error, info};
    use tripmatch_core::events::EventSink;
    use tripmatch_core::{CoreError, CoreResult};
    use tripmatch_shared::DomainEvent;

    /// Publishes analytics events and audit events to separate topics
    #[derive(Clone)]
    pub struct EventProducer {
        producer: FutureProducer,
        analytics_topic: String,
        audit_topic: String,
    }

    impl EventProducer {
        pub fn new(
            brokers: &str,
            analytics_topic: &str,
            audit_topic: &str,
        ) -> Result<Self, rdkafka::error::KafkaError> {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", brokers)
                .set("message.timeout.ms", "5000")
                .create()?;

            Ok(Self {
                producer,
                analytics_topic: analytics_topic.to_string(),
                audit_topic: audit_topic.to_string(),
            })
        }

        pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
            let record = FutureRecord::to(topic).key(key).payload(payload);

            match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
                Ok(delivery) => {
                    info!(
                        "Sent message to {}/{}: partition {} offset {}",
                        topic, key, delivery.partition, delivery.offset
                    );
                    Ok(())
                }
                Err((e, _msg)) => {
                    error!("Failed to send message to {}: {}", topic, e);
                    Err(e)
                }
            }
        }
    }

    #[async_trait]
    impl EventSink for EventProducer {
        async fn emit(&self, event: &DomainEvent) -> CoreResult<()> {
            let topic = if event.is_audit() {
                &self.audit_topic
            } else {
                &self.analytics_topic
            };
            let payload = serde_json::to_string(event).map_err(|e| CoreError::EventError(e.to_string()))?;

            self.publish(topic, &event.event_id.to_string(), &payload)
                .await
                .map_err(|e| CoreError::EventError(e.to_string()))
        }
    }
}
