//! # 분산 토큰 버킷 레이트 리미터
//!
//! 버킷 상태는 Redis 해시(`ratelimit:{name}`)에 저장되어 여러 인스턴스가 같은 한도를 공유합니다.
//!
//! ## 리필 방식
//!
//! `refill_period`가 지날 때마다 `refill_tokens`개를 채우며 `capacity`를 넘지 않습니다 (구간 리필).
//! 시간은 Redis `TIME`을 사용하므로 인스턴스 간 시계 차이의 영향을 받지 않습니다.
//!
//! ## 흐름
//!
//! 1. [`BucketStore::snapshot`]으로 남은 토큰과 다음 리필까지 남은 시간을 읽습니다.
//! 2. [`BucketStore::try_consume`]으로 토큰 하나를 기다리지 않고 소비합니다.
//!
//! 저장소에 접근할 수 없으면 요청을 통과시키지 않습니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use redis::Script;

use crate::caching::redis::RedisClient;
use crate::config::BucketSettings;
use crate::errors::RateLimitError;

/// 구간 리필 토큰 버킷
///
/// KEYS[1] 버킷 키, ARGV 용량 / 리필 토큰 수 / 리필 주기(ms) / 소비 여부(0|1)
/// 반환값 `{allowed, tokens, reset_ms}`
const TOKEN_BUCKET_SCRIPT: &str = r#"
local capacity = tonumber(ARGV[1])
local refill_tokens = tonumber(ARGV[2])
local period = tonumber(ARGV[3])
local consume = tonumber(ARGV[4])

local time = redis.call('TIME')
local now = tonumber(time[1]) * 1000 + math.floor(tonumber(time[2]) / 1000)

local state = redis.call('HMGET', KEYS[1], 'tokens', 'last_refill')
local tokens = tonumber(state[1])
local last_refill = tonumber(state[2])
if tokens == nil or last_refill == nil then
  tokens = capacity
  last_refill = now
end

local elapsed = now - last_refill
if elapsed >= period then
  local periods = math.floor(elapsed / period)
  tokens = math.min(capacity, tokens + periods * refill_tokens)
  last_refill = last_refill + periods * period
end

local allowed = 0
if consume == 1 then
  if tokens > 0 then
    tokens = tokens - 1
    allowed = 1
  end
  redis.call('HSET', KEYS[1], 'tokens', tokens, 'last_refill', last_refill)
  redis.call('PEXPIRE', KEYS[1], period * (math.ceil(capacity / refill_tokens) + 1))
end

return {allowed, tokens, period - (now - last_refill)}
"#;

/// 요청 하나에 대한 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// 다음 리필까지 남은 초 (올림)
    pub reset_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSnapshot {
    pub available: u64,
    pub reset_after: Duration,
}

/// 버킷 상태 저장소
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// 리필을 반영한 현재 상태. 상태를 바꾸지 않습니다.
    async fn snapshot(&self, bucket: &BucketSettings) -> Result<BucketSnapshot, RateLimitError>;

    /// 토큰 하나를 원자적으로 소비합니다. 남은 토큰이 없으면 `false`.
    async fn try_consume(&self, bucket: &BucketSettings) -> Result<bool, RateLimitError>;
}

pub struct RedisBucketStore {
    redis: RedisClient,
    script: Script,
}

impl RedisBucketStore {
    pub fn new(redis: RedisClient) -> Self {
        Self {
            redis,
            script: Script::new(TOKEN_BUCKET_SCRIPT),
        }
    }

    async fn run(&self, bucket: &BucketSettings, consume: bool) -> Result<(i64, i64, i64), RateLimitError> {
        let mut conn = self.redis.connection();
        let reply = self
            .script
            .key(bucket.storage_key())
            .arg(bucket.capacity)
            .arg(bucket.refill_tokens)
            .arg(bucket.refill_period.as_millis() as u64)
            .arg(u8::from(consume))
            .invoke_async::<(i64, i64, i64)>(&mut conn)
            .await?;
        Ok(reply)
    }
}

#[async_trait]
impl BucketStore for RedisBucketStore {
    async fn snapshot(&self, bucket: &BucketSettings) -> Result<BucketSnapshot, RateLimitError> {
        let (_, tokens, reset_ms) = self.run(bucket, false).await?;
        Ok(BucketSnapshot {
            available: tokens.max(0) as u64,
            reset_after: Duration::from_millis(reset_ms.max(0) as u64),
        })
    }

    async fn try_consume(&self, bucket: &BucketSettings) -> Result<bool, RateLimitError> {
        let (allowed, _, _) = self.run(bucket, true).await?;
        Ok(allowed == 1)
    }
}

/// 이름 붙은 버킷들에 대한 레이트 리미터
pub struct DistributedRateLimiter {
    store: Arc<dyn BucketStore>,
    buckets: HashMap<String, BucketSettings>,
}

impl DistributedRateLimiter {
    pub fn new(store: Arc<dyn BucketStore>, buckets: Vec<BucketSettings>) -> Self {
        Self {
            store,
            buckets: buckets
                .into_iter()
                .map(|bucket| (bucket.name.clone(), bucket))
                .collect(),
        }
    }

    /// 토큰 하나를 요청합니다.
    ///
    /// # Errors
    ///
    /// * `RateLimitError::UnknownBucket` - 등록되지 않은 버킷 이름
    /// * `RateLimitError::StoreUnavailable` - 저장소 오류
    pub async fn try_acquire(&self, name: &str) -> Result<RateLimitDecision, RateLimitError> {
        let bucket = self
            .buckets
            .get(name)
            .ok_or_else(|| RateLimitError::UnknownBucket(name.to_string()))?;

        let snapshot = self.store.snapshot(bucket).await.inspect_err(|e| {
            error!("레이트 리미터 상태 조회 실패 - bucket: {}, reason: {}", name, e);
        })?;
        let allowed = self.store.try_consume(bucket).await.inspect_err(|e| {
            error!("레이트 리미터 토큰 소비 실패 - bucket: {}, reason: {}", name, e);
        })?;

        let remaining = if allowed {
            snapshot.available.saturating_sub(1)
        } else {
            debug!("레이트 리밋 초과 - bucket: {}", name);
            0
        };

        Ok(RateLimitDecision {
            allowed,
            limit: bucket.capacity,
            remaining,
            reset_seconds: snapshot.reset_after.as_millis().div_ceil(1000) as u64,
        })
    }
}
