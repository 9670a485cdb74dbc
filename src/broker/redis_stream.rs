//! # Redis Streams 브로커
//!
//! 엔티티마다 스트림 하나(`auth:client` 등)와 소비자 그룹 하나를 사용합니다.
//!
//! ## 항목 형식
//!
//! | 필드 | 내용 |
//! |------|------|
//! | `command_code` | `client.save` 등 명령 코드 |
//! | `payload` | JSON 문자열 |
//! | `delivery_count` | 이전 전달 횟수 (없으면 0) |
//!
//! ## 확인 규칙
//!
//! - ack: `XACK` + `XDEL`
//! - nack(requeue): `delivery_count + 1`로 다시 `XADD` 후 `XACK` + `XDEL`.
//!   전달 횟수가 한도에 닿으면 데드레터 스트림으로 이동합니다.
//! - nack(no requeue): 데드레터 스트림으로 이동
//!
//! 세 경우 모두 `MULTI`/`EXEC` 파이프라인 하나로 처리됩니다.
//! 프로세스가 확인 전에 죽거나 확인 파이프라인이 실패하면 항목은 그룹의 pending 목록에 남습니다.
//! 소비 루프는 기동 시와 [`PENDING_REPLAY_INTERVAL`]마다 pending 목록을 다시 읽으며,
//! 아직 처리 중인 항목은 건너뜁니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::BrokerChannel;
use crate::caching::redis::RedisClient;
use crate::config::BrokerSettings;
use crate::domain::MessageEnvelope;
use crate::errors::BrokerError;
use crate::pipeline::collector::BatchCollector;

pub const FIELD_COMMAND_CODE: &str = "command_code";
pub const FIELD_PAYLOAD: &str = "payload";
pub const FIELD_DELIVERY_COUNT: &str = "delivery_count";
const FIELD_SOURCE_STREAM: &str = "source_stream";
const FIELD_SOURCE_ID: &str = "source_id";
const FIELD_REASON: &str = "reason";

/// 확인되지 않은 자기 pending 항목을 다시 읽는 주기
pub const PENDING_REPLAY_INTERVAL: Duration = Duration::from_secs(30);

/// 스트림에서 읽은 항목 하나
#[derive(Debug, Clone, PartialEq, Eq)]
struct StreamDelivery {
    entry_id: String,
    command_code: String,
    payload: String,
    delivery_count: u32,
}

impl StreamDelivery {
    fn from_stream_id(entry: &StreamId) -> Result<Self, BrokerError> {
        let malformed = |reason: &str| BrokerError::MalformedEntry {
            entry_id: entry.id.clone(),
            reason: reason.to_string(),
        };

        Ok(Self {
            entry_id: entry.id.clone(),
            command_code: entry
                .get::<String>(FIELD_COMMAND_CODE)
                .ok_or_else(|| malformed("missing command_code"))?,
            payload: entry
                .get::<String>(FIELD_PAYLOAD)
                .ok_or_else(|| malformed("missing payload"))?,
            delivery_count: entry.get::<u32>(FIELD_DELIVERY_COUNT).unwrap_or(0),
        })
    }

    fn requeue_fields(&self, delivery_count: u32) -> Vec<(&'static str, String)> {
        vec![
            (FIELD_COMMAND_CODE, self.command_code.clone()),
            (FIELD_PAYLOAD, self.payload.clone()),
            (FIELD_DELIVERY_COUNT, delivery_count.to_string()),
        ]
    }

    fn dead_letter_fields(&self, source_stream: &str, reason: &str) -> Vec<(&'static str, String)> {
        let mut fields = self.requeue_fields(self.delivery_count + 1);
        fields.push((FIELD_SOURCE_STREAM, source_stream.to_string()));
        fields.push((FIELD_SOURCE_ID, self.entry_id.clone()));
        fields.push((FIELD_REASON, reason.to_string()));
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NackRoute {
    Requeue { delivery_count: u32 },
    DeadLetter { reason: &'static str },
}

/// `delivery_count`는 이번 전달 이전의 전달 횟수입니다.
fn nack_route(delivery_count: u32, delivery_limit: u32, requeue: bool) -> NackRoute {
    if !requeue {
        return NackRoute::DeadLetter { reason: "rejected" };
    }

    let next = delivery_count.saturating_add(1);
    if next >= delivery_limit {
        NackRoute::DeadLetter {
            reason: "delivery-limit-exceeded",
        }
    } else {
        NackRoute::Requeue {
            delivery_count: next,
        }
    }
}

/// 전달 태그 → 스트림 항목 매핑
#[derive(Default)]
struct InFlightLedger {
    next_tag: AtomicU64,
    entries: Mutex<HashMap<u64, StreamDelivery>>,
}

impl InFlightLedger {
    fn track(&self, delivery: StreamDelivery) -> u64 {
        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag, delivery);
        tag
    }

    /// 태그는 한 번만 확인될 수 있습니다.
    fn take(&self, tag: u64) -> Result<StreamDelivery, BrokerError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&tag)
            .ok_or(BrokerError::UnknownDeliveryTag(tag))
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// 아직 확인되지 않은 전달 중에 같은 스트림 항목이 있는지
    fn contains_entry(&self, entry_id: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .any(|delivery| delivery.entry_id == entry_id)
    }
}

/// 스트림 하나에 대한 브로커 채널
pub struct RedisStreamChannel {
    stream: String,
    group: String,
    dead_letter_stream: String,
    delivery_limit: u32,
    max_length: usize,
    redis: RedisClient,
    ledger: InFlightLedger,
}

impl RedisStreamChannel {
    pub fn new(stream: impl Into<String>, settings: &BrokerSettings, redis: RedisClient) -> Self {
        Self {
            stream: stream.into(),
            group: settings.consumer_group.clone(),
            dead_letter_stream: settings.dead_letter_stream.clone(),
            delivery_limit: settings.delivery_limit.max(1),
            max_length: settings.max_length,
            redis,
            ledger: InFlightLedger::default(),
        }
    }

    /// 소비자 그룹을 만듭니다. 이미 있으면 그대로 사용합니다.
    pub async fn ensure_group(&self) -> Result<(), BrokerError> {
        let mut conn = self.redis.connection();
        let created: redis::RedisResult<()> = conn
            .xgroup_create_mkstream(&self.stream, &self.group, "0")
            .await;

        match created {
            Ok(()) => {
                info!("✅ 소비자 그룹 생성 - stream: {}, group: {}", self.stream, self.group);
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// 확인 대기 중인 전달 수
    pub fn in_flight(&self) -> usize {
        self.ledger.len()
    }

    async fn read(
        &self,
        conn: &mut MultiplexedConnection,
        consumer: &str,
        start_id: &str,
        count: usize,
        block: Option<Duration>,
    ) -> Result<Vec<StreamId>, BrokerError> {
        let mut options = StreamReadOptions::default()
            .group(&self.group, consumer)
            .count(count);
        if let Some(block) = block {
            options = options.block(block.as_millis() as usize);
        }

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.stream], &[start_id], &options)
            .await?;

        Ok(reply
            .map(|reply| reply.keys.into_iter().flat_map(|key| key.ids).collect())
            .unwrap_or_default())
    }

    /// 해석할 수 없는 항목을 그대로 데드레터로 옮깁니다.
    async fn dead_letter_raw(&self, entry_id: &str, reason: &str) -> Result<(), BrokerError> {
        let fields = [
            (FIELD_SOURCE_STREAM, self.stream.clone()),
            (FIELD_SOURCE_ID, entry_id.to_string()),
            (FIELD_REASON, reason.to_string()),
        ];

        let mut conn = self.redis.connection();
        redis::pipe()
            .atomic()
            .xadd_maxlen(
                &self.dead_letter_stream,
                StreamMaxlen::Approx(self.max_length),
                "*",
                &fields,
            )
            .ignore()
            .xack(&self.stream, &self.group, &[entry_id])
            .ignore()
            .xdel(&self.stream, &[entry_id])
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl BrokerChannel for RedisStreamChannel {
    fn name(&self) -> &str {
        &self.stream
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        let delivery = self.ledger.take(delivery_tag)?;

        let mut conn = self.redis.connection();
        redis::pipe()
            .atomic()
            .xack(&self.stream, &self.group, &[&delivery.entry_id])
            .ignore()
            .xdel(&self.stream, &[&delivery.entry_id])
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        debug!("ack - stream: {}, entry: {}", self.stream, delivery.entry_id);
        Ok(())
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError> {
        let delivery = self.ledger.take(delivery_tag)?;
        let route = nack_route(delivery.delivery_count, self.delivery_limit, requeue);
        let maxlen = StreamMaxlen::Approx(self.max_length);

        let mut pipe = redis::pipe();
        pipe.atomic();
        match route {
            NackRoute::Requeue { delivery_count } => {
                pipe.xadd_maxlen(&self.stream, maxlen, "*", &delivery.requeue_fields(delivery_count))
                    .ignore();
            }
            NackRoute::DeadLetter { reason } => {
                pipe.xadd_maxlen(
                    &self.dead_letter_stream,
                    maxlen,
                    "*",
                    &delivery.dead_letter_fields(&self.stream, reason),
                )
                .ignore();
            }
        }
        pipe.xack(&self.stream, &self.group, &[&delivery.entry_id])
            .ignore()
            .xdel(&self.stream, &[&delivery.entry_id])
            .ignore();

        let mut conn = self.redis.connection();
        pipe.query_async::<()>(&mut conn).await?;

        match route {
            NackRoute::Requeue { delivery_count } => debug!(
                "nack(requeue) - stream: {}, entry: {}, delivery_count: {}",
                self.stream, delivery.entry_id, delivery_count
            ),
            NackRoute::DeadLetter { reason } => warn!(
                "데드레터 이동 - stream: {}, entry: {}, command: {}, reason: {}",
                self.stream, delivery.entry_id, delivery.command_code, reason
            ),
        }
        Ok(())
    }
}

/// 스트림 하나를 읽어 수집기에 넘기는 소비 루프
///
/// 수집기의 남은 용량만큼만 읽으므로 prefetch 한도를 넘는 항목은 스트림에 남아 있습니다.
pub struct StreamConsumer {
    channel: Arc<RedisStreamChannel>,
    collector: Arc<BatchCollector>,
    consumer_name: String,
    read_count: usize,
    block: Duration,
}

impl StreamConsumer {
    pub fn new(
        channel: Arc<RedisStreamChannel>,
        collector: Arc<BatchCollector>,
        settings: &BrokerSettings,
    ) -> Self {
        Self {
            channel,
            collector,
            consumer_name: settings.consumer_name.clone(),
            read_count: settings.read_count.max(1),
            block: settings.block,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) -> Result<(), BrokerError> {
        self.channel.ensure_group().await?;
        let mut conn = self.channel.redis.dedicated_connection().await?;

        info!(
            "📥 스트림 소비 시작 - stream: {}, consumer: {}",
            self.channel.stream, self.consumer_name
        );

        // 이전 실행에서 확인하지 못한 항목부터 다시 읽는다
        let mut replay_cursor = Some("0".to_string());
        let mut last_replay = Instant::now();

        loop {
            if replay_cursor.is_none() && last_replay.elapsed() >= PENDING_REPLAY_INTERVAL {
                replay_cursor = Some("0".to_string());
                last_replay = Instant::now();
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(
                        "스트림 소비 중지 - stream: {}, in_flight: {}",
                        self.channel.stream,
                        self.channel.in_flight()
                    );
                    break;
                }
                result = self.poll(&mut conn, &mut replay_cursor) => {
                    if let Err(e) = result {
                        error!("스트림 읽기 실패 - stream: {}, reason: {}", self.channel.stream, e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn poll(
        &self,
        conn: &mut MultiplexedConnection,
        replay_cursor: &mut Option<String>,
    ) -> Result<usize, BrokerError> {
        let capacity = self.collector.remaining_capacity().min(self.read_count);
        if capacity == 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            return Ok(0);
        }

        let entries = match replay_cursor.as_deref() {
            Some(cursor) => {
                let entries = self
                    .channel
                    .read(conn, &self.consumer_name, cursor, capacity, None)
                    .await?;
                *replay_cursor = entries.last().map(|entry| entry.id.clone());
                if replay_cursor.is_none() {
                    debug!("pending 항목 재처리 완료 - stream: {}", self.channel.stream);
                }
                entries
            }
            None => {
                self.channel
                    .read(conn, &self.consumer_name, ">", capacity, Some(self.block))
                    .await?
            }
        };

        let received = entries.len();
        for entry in entries {
            self.deliver(&entry).await;
        }
        Ok(received)
    }

    async fn deliver(&self, entry: &StreamId) {
        if self.channel.ledger.contains_entry(&entry.id) {
            debug!("처리 중인 pending 항목 건너뜀 - stream: {}, entry: {}", self.channel.stream, entry.id);
            return;
        }

        let envelope = StreamDelivery::from_stream_id(entry).and_then(|delivery| {
            let payload = serde_json::from_str(&delivery.payload).map_err(|e| {
                BrokerError::MalformedEntry {
                    entry_id: delivery.entry_id.clone(),
                    reason: format!("payload is not JSON: {}", e),
                }
            })?;
            let command_code = delivery.command_code.clone();
            let tag = self.channel.ledger.track(delivery);
            let channel: Arc<dyn BrokerChannel> = self.channel.clone();
            Ok(MessageEnvelope::new(command_code, payload, tag, channel))
        });

        match envelope {
            Ok(envelope) => {
                self.collector.offer(envelope).await;
            }
            Err(e) => {
                warn!("해석할 수 없는 스트림 항목 - stream: {}, reason: {}", self.channel.stream, e);
                if let Err(e) = self.channel.dead_letter_raw(&entry.id, &e.to_string()).await {
                    error!(
                        "데드레터 이동 실패 - stream: {}, entry: {}, reason: {}",
                        self.channel.stream, entry.id, e
                    );
                }
            }
        }
    }
}
