//! # 메시지 브로커 게이트웨이
//!
//! 파이프라인은 브로커를 [`BrokerChannel`] 하나로만 봅니다.
//! 채널은 전달 태그 단위로 ack/nack을 받으며, 전달 태그는 채널 안에서만 유일합니다.
//!
//! 구현체는 [`redis_stream`]의 Redis Streams 소비자 그룹입니다.

pub mod redis_stream;

pub use redis_stream::{RedisStreamChannel, StreamConsumer};

use async_trait::async_trait;

use crate::errors::BrokerError;

/// 전달된 메시지를 확인하는 채널
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    fn name(&self) -> &str;

    /// 처리 완료. 브로커는 메시지를 다시 전달하지 않습니다.
    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError>;

    /// 처리 실패. `requeue`가 `false`이면 데드레터로 보냅니다.
    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError>;
}
