//! 배치 파이프라인 및 스트림 브로커 설정
//!
//! 엔티티별 prefetch/영속화 타임아웃과 Redis Streams 소비자 그룹 설정을 관리합니다.
//!
//! ```bash
//! export PIPELINE_COMMIT_INTERVAL_MS="1000"
//! export PIPELINE_CLIENT_PREFETCH="250"
//! export PIPELINE_CLIENT_TIMEOUT_MS="5000"
//! export BROKER_CONSUMER_GROUP="auth-persistence"
//! export BROKER_DELIVERY_LIMIT="5"
//! ```

use std::env;
use std::time::Duration;

use super::env_parse;
use crate::domain::command::EntityKind;

/// 엔티티 하나에 대한 수집기/커미터 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityPipelineSettings {
    pub entity: EntityKind,
    /// 수집기가 보유할 수 있는 최대 미확인 메시지 수
    pub prefetch: usize,
    /// 영속화 호출 한 번에 허용되는 시간
    pub persist_timeout: Duration,
}

impl EntityPipelineSettings {
    pub fn defaults(entity: EntityKind) -> Self {
        let (prefetch, timeout_ms) = match entity {
            EntityKind::Client => (100, 5_000),
            EntityKind::Authorization => (500, 2_500),
            EntityKind::Consent => (250, 2_500),
            EntityKind::Audit => (1_000, 1_250),
        };

        Self {
            entity,
            prefetch,
            persist_timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// `PIPELINE_<ENTITY>_PREFETCH`, `PIPELINE_<ENTITY>_TIMEOUT_MS`
    pub fn from_env(entity: EntityKind) -> Self {
        let defaults = Self::defaults(entity);
        let prefix = format!("PIPELINE_{}", entity.as_str().to_uppercase());

        Self {
            entity,
            prefetch: env_parse(&format!("{}_PREFETCH", prefix), defaults.prefetch),
            persist_timeout: Duration::from_millis(env_parse(
                &format!("{}_TIMEOUT_MS", prefix),
                defaults.persist_timeout.as_millis() as u64,
            )),
        }
    }
}

/// 파이프라인 전체 설정
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub commit_interval: Duration,
    pub entities: Vec<EntityPipelineSettings>,
}

impl PipelineSettings {
    pub fn from_env() -> Self {
        Self {
            commit_interval: Duration::from_millis(env_parse("PIPELINE_COMMIT_INTERVAL_MS", 1_000)),
            entities: EntityKind::ALL
                .iter()
                .map(|entity| EntityPipelineSettings::from_env(*entity))
                .collect(),
        }
    }
}

/// Redis Streams 브로커 설정
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub stream_prefix: String,
    pub consumer_group: String,
    pub consumer_name: String,
    pub dead_letter_stream: String,
    /// 이 횟수만큼 전달된 메시지는 재큐잉 대신 데드레터로 이동합니다.
    pub delivery_limit: u32,
    pub max_length: usize,
    pub read_count: usize,
    pub block: Duration,
    pub events_channel: String,
    /// `false`이면 생성 이벤트를 로그로만 남깁니다.
    pub publish_events: bool,
}

impl BrokerSettings {
    pub fn from_env() -> Self {
        Self {
            stream_prefix: env::var("BROKER_STREAM_PREFIX").unwrap_or_else(|_| "auth".to_string()),
            consumer_group: env::var("BROKER_CONSUMER_GROUP")
                .unwrap_or_else(|_| "auth-persistence".to_string()),
            consumer_name: env::var("BROKER_CONSUMER_NAME")
                .unwrap_or_else(|_| format!("consumer-{}", std::process::id())),
            dead_letter_stream: env::var("BROKER_DEAD_LETTER_STREAM")
                .unwrap_or_else(|_| "auth:dead-letter".to_string()),
            delivery_limit: env_parse("BROKER_DELIVERY_LIMIT", 5),
            max_length: env_parse("BROKER_MAX_LENGTH", 100_000),
            read_count: env_parse("BROKER_READ_COUNT", 100),
            block: Duration::from_millis(env_parse("BROKER_BLOCK_MS", 1_000)),
            events_channel: env::var("BROKER_EVENTS_CHANNEL")
                .unwrap_or_else(|_| "auth:events".to_string()),
            publish_events: env_parse("BROKER_PUBLISH_EVENTS", true),
        }
    }

    /// 엔티티별 스트림 키 (`auth:client` 등)
    pub fn stream_key(&self, entity: EntityKind) -> String {
        format!("{}:{}", self.stream_prefix, entity.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_persist_timeouts() {
        let timeout = |entity| EntityPipelineSettings::defaults(entity).persist_timeout;

        assert_eq!(timeout(EntityKind::Client), Duration::from_secs(5));
        assert_eq!(timeout(EntityKind::Authorization), Duration::from_millis(2_500));
        assert_eq!(timeout(EntityKind::Consent), Duration::from_millis(2_500));
        assert_eq!(timeout(EntityKind::Audit), Duration::from_millis(1_250));
    }

    #[test]
    fn test_every_entity_has_pipeline_settings() {
        let settings = PipelineSettings::from_env();
        assert_eq!(settings.entities.len(), EntityKind::ALL.len());
    }

    #[test]
    fn test_stream_key_per_entity() {
        let mut settings = BrokerSettings::from_env();
        settings.stream_prefix = "auth".to_string();

        assert_eq!(settings.stream_key(EntityKind::Client), "auth:client");
        assert_eq!(settings.stream_key(EntityKind::Audit), "auth:audit");
    }
}
