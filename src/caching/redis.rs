//! # Redis 클라이언트 래퍼
//!
//! 레이트 리미터 버킷, 이벤트 발행, 스트림 브로커가 함께 사용하는 Redis 연결을 관리합니다.
//!
//! ## 연결 관리
//!
//! 일반 명령은 자동 재연결되는 [`ConnectionManager`] 하나를 복제해서 사용합니다.
//! `XREADGROUP BLOCK`처럼 연결을 붙잡는 명령은 다른 요청을 지연시키므로
//! [`RedisClient::dedicated_connection`]으로 별도 연결을 받아 사용합니다.

use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::{AsyncCommands, Client, RedisError};
use serde::Serialize;

use log::info;

use crate::config::RedisSettings;

/// Redis 클라이언트 래퍼
///
/// 복제 비용이 낮아 각 컴포넌트가 자신의 사본을 소유합니다.
///
/// ```rust,ignore
/// let redis = RedisClient::connect(&RedisSettings::from_env()).await?;
/// redis.publish_json("auth:events", &event).await?;
/// ```
#[derive(Clone)]
pub struct RedisClient {
    client: Client,
    manager: ConnectionManager,
}

impl RedisClient {
    /// 연결을 만들고 `PING`으로 서버 가용성을 확인합니다.
    ///
    /// ## 에러 케이스
    ///
    /// - Redis 서버에 연결할 수 없는 경우
    /// - 잘못된 URL 형식, 인증 실패
    pub async fn connect(settings: &RedisSettings) -> Result<Self, RedisError> {
        let client = Client::open(settings.connection_url())?;
        let mut manager = ConnectionManager::new(client.clone()).await?;

        // 연결 테스트 - PING 명령으로 서버 가용성 확인
        redis::cmd("PING").query_async::<()>(&mut manager).await?;

        info!(
            "✅ Redis 연결 성공 - {}:{} (tls: {})",
            settings.host, settings.port, settings.tls
        );

        Ok(Self { client, manager })
    }

    /// 공유 연결 (자동 재연결)
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// 블로킹 명령 전용 연결
    pub async fn dedicated_connection(&self) -> Result<MultiplexedConnection, RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    /// 값을 JSON으로 직렬화해 pub/sub 채널에 발행합니다. 구독자 수를 돌려줍니다.
    pub async fn publish_json<T: Serialize>(&self, channel: &str, value: &T) -> Result<i64, RedisError> {
        let json = serde_json::to_string(value).map_err(|e| {
            RedisError::from((redis::ErrorKind::TypeError, "Serialization failed", e.to_string()))
        })?;

        let mut conn = self.connection();
        conn.publish(channel, json).await
    }
}
