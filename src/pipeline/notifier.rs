//! 엔티티 생성 이벤트 발행
//!
//! 커미터는 ack 된 생성 명령에 대해 이벤트를 발행합니다. 발행은 fire-and-forget 이며
//! 실패해도 이미 내려진 ack 결정에는 영향을 주지 않습니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use uuid::Uuid;

use crate::caching::redis::RedisClient;
use crate::domain::EntityKind;
use crate::errors::BrokerError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityEvent {
    pub event_id: Uuid,
    pub event_type: String,
    pub entity: EntityKind,
    pub record_id: String,
    pub occurred_at: DateTime<Utc>,
}

impl EntityEvent {
    pub fn new(event_type: impl Into<String>, entity: EntityKind, record_id: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            entity,
            record_id: record_id.into(),
            occurred_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: EntityEvent) -> Result<(), BrokerError>;
}

/// Redis pub/sub 채널로 JSON 이벤트를 발행합니다.
pub struct RedisEventPublisher {
    redis: RedisClient,
    channel: String,
}

impl RedisEventPublisher {
    pub fn new(redis: RedisClient, channel: impl Into<String>) -> Self {
        Self {
            redis,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, event: EntityEvent) -> Result<(), BrokerError> {
        let receivers = self.redis.publish_json(&self.channel, &event).await?;
        log::debug!(
            "이벤트 발행 - type: {}, record_id: {}, receivers: {}",
            event.event_type,
            event.record_id,
            receivers
        );
        Ok(())
    }
}

/// 로그만 남기는 발행기 (`BROKER_PUBLISH_EVENTS=false`)
#[derive(Debug, Default)]
pub struct LoggingEventPublisher;

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: EntityEvent) -> Result<(), BrokerError> {
        info!(
            "📣 이벤트 (발행 비활성) - type: {}, entity: {}, record_id: {}",
            event.event_type, event.entity, event.record_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_entity_name() {
        let event = EntityEvent::new("client.created", EntityKind::Client, "rc-1");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event_type"], "client.created");
        assert_eq!(json["entity"], "client");
        assert_eq!(json["record_id"], "rc-1");
        assert!(json["event_id"].is_string());
    }

    #[actix_web::test]
    async fn test_logging_publisher_never_fails() {
        let publisher = LoggingEventPublisher;
        let event = EntityEvent::new("client.created", EntityKind::Client, "rc-1");

        assert!(publisher.publish(event).await.is_ok());
    }
}
