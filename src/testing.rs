//! 테스트 전용 대역
//!
//! 브로커 채널, 저장소, 버킷 저장소, 이벤트 발행기를 메모리에서 흉내 냅니다.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::broker::BrokerChannel;
use crate::config::BucketSettings;
use crate::domain::entities::{
    AuditEventRecord, AuthorizationRecord, BatchRecord, ClientRecord, ConsentRecord,
};
use crate::domain::{Decision, MessageEnvelope};
use crate::errors::{BrokerError, CryptoError, PersistenceError, RateLimitError};
use crate::pipeline::notifier::{EntityEvent, EventPublisher};
use crate::pipeline::registry::PersistencePorts;
use crate::repositories::{CredentialStore, PersistencePort};
use crate::security::cipher::SecretCipher;
use crate::security::rate_limit::{BucketSnapshot, BucketStore};

/// ack/nack 호출을 기록하는 채널
pub struct RecordingChannel {
    name: String,
    settled: Mutex<Vec<(u64, Decision)>>,
}

impl RecordingChannel {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            settled: Mutex::new(Vec::new()),
        })
    }

    pub fn decisions_for(&self, delivery_tag: u64) -> Vec<Decision> {
        self.settled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(tag, _)| *tag == delivery_tag)
            .map(|(_, decision)| *decision)
            .collect()
    }

    pub fn settled_count(&self) -> usize {
        self.settled.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn record(&self, delivery_tag: u64, decision: Decision) {
        self.settled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((delivery_tag, decision));
    }
}

#[async_trait]
impl BrokerChannel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        self.record(delivery_tag, Decision::Ack);
        Ok(())
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError> {
        self.record(delivery_tag, Decision::Nack { requeue });
        Ok(())
    }
}

pub fn envelope(
    channel: &Arc<RecordingChannel>,
    delivery_tag: u64,
    command_code: &str,
    payload: serde_json::Value,
) -> MessageEnvelope {
    MessageEnvelope::new(command_code, payload, delivery_tag, channel.clone())
}

/// 메모리 레코드 저장소
pub struct InMemoryRecordStore<R> {
    records: Mutex<HashMap<String, R>>,
    failing_ids: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
    delay: Mutex<Option<Duration>>,
    save_calls: AtomicUsize,
    remove_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
}

impl<R: BatchRecord + Clone> InMemoryRecordStore<R> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            failing_ids: Mutex::new(HashSet::new()),
            unavailable: AtomicBool::new(false),
            delay: Mutex::new(None),
            save_calls: AtomicUsize::new(0),
            remove_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
        }
    }

    /// 해당 id들은 저장/삭제 시 실패 집합에 들어갑니다.
    pub fn fail_ids<'a>(&self, ids: impl IntoIterator<Item = &'a str>) {
        let mut failing = self.failing_ids.lock().unwrap_or_else(PoisonError::into_inner);
        failing.extend(ids.into_iter().map(str::to_string));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    pub fn insert(&self, record: R) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.record_id(), record);
    }

    pub fn get(&self, id: &str) -> Option<R> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    async fn simulate_io(&self) -> Result<(), PersistenceError> {
        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PersistenceError::Database("store unavailable".to_string()));
        }
        Ok(())
    }

    fn is_failing(&self, id: &str) -> bool {
        self.failing_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }
}

#[async_trait]
impl<R: BatchRecord + Clone> PersistencePort<R> for InMemoryRecordStore<R> {
    async fn save_batch(&self, records: Vec<R>) -> Result<HashSet<String>, PersistenceError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_io().await?;

        let mut failed = HashSet::new();
        for record in records {
            let id = record.record_id();
            if self.is_failing(&id) {
                failed.insert(id);
            } else {
                self.insert(record);
            }
        }
        Ok(failed)
    }

    async fn remove_batch(&self, ids: Vec<String>) -> Result<HashSet<String>, PersistenceError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_io().await?;

        let mut failed = HashSet::new();
        for id in ids {
            if self.is_failing(&id) {
                failed.insert(id);
            } else {
                self.records.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
            }
        }
        Ok(failed)
    }
}

#[async_trait]
impl CredentialStore for InMemoryRecordStore<ClientRecord> {
    async fn find_by_id(&self, id: &str) -> Result<Option<ClientRecord>, PersistenceError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_io().await?;
        Ok(self.get(id))
    }

    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<ClientRecord>, PersistenceError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_io().await?;
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|record| record.client_id == client_id)
            .cloned())
    }
}

/// 엔티티별 메모리 저장소 묶음
pub struct TestStores {
    pub clients: Arc<InMemoryRecordStore<ClientRecord>>,
    pub authorizations: Arc<InMemoryRecordStore<AuthorizationRecord>>,
    pub consents: Arc<InMemoryRecordStore<ConsentRecord>>,
    pub audits: Arc<InMemoryRecordStore<AuditEventRecord>>,
}

impl TestStores {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(InMemoryRecordStore::new()),
            authorizations: Arc::new(InMemoryRecordStore::new()),
            consents: Arc::new(InMemoryRecordStore::new()),
            audits: Arc::new(InMemoryRecordStore::new()),
        }
    }

    pub fn ports(&self) -> PersistencePorts {
        PersistencePorts {
            clients: self.clients.clone(),
            authorizations: self.authorizations.clone(),
            consents: self.consents.clone(),
            audit_events: self.audits.clone(),
        }
    }
}

/// 복호화 횟수를 세는 암호기
pub struct CountingCipher {
    inner: Box<dyn SecretCipher>,
    decrypt_calls: AtomicUsize,
}

impl CountingCipher {
    pub fn new(inner: impl SecretCipher + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            decrypt_calls: AtomicUsize::new(0),
        }
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }
}

impl SecretCipher for CountingCipher {
    fn label(&self) -> &'static str {
        self.inner.label()
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        self.inner.encrypt(plaintext)
    }

    fn decrypt(&self, envelope: &str) -> Result<String, CryptoError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt(envelope)
    }
}

/// 로컬 시계를 쓰는 구간 리필 버킷 저장소
pub struct InMemoryBucketStore {
    buckets: Mutex<HashMap<String, (u64, Instant)>>,
    unavailable: AtomicBool,
}

impl InMemoryBucketStore {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 리필을 반영한 (토큰, 마지막 리필 시각)
    fn refilled(&self, bucket: &BucketSettings) -> Result<(u64, Instant), RateLimitError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RateLimitError::StoreUnavailable("bucket store unavailable".to_string()));
        }
        let now = Instant::now();
        let (tokens, last_refill) = self
            .buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&bucket.name)
            .copied()
            .unwrap_or((bucket.capacity, now));

        let periods = (now.duration_since(last_refill).as_nanos() / bucket.refill_period.as_nanos()) as u32;
        if periods == 0 {
            return Ok((tokens, last_refill));
        }
        let tokens = (tokens + u64::from(periods) * bucket.refill_tokens).min(bucket.capacity);
        Ok((tokens, last_refill + bucket.refill_period * periods))
    }
}

#[async_trait]
impl BucketStore for InMemoryBucketStore {
    async fn snapshot(&self, bucket: &BucketSettings) -> Result<BucketSnapshot, RateLimitError> {
        let (tokens, last_refill) = self.refilled(bucket)?;
        Ok(BucketSnapshot {
            available: tokens,
            reset_after: bucket.refill_period.saturating_sub(last_refill.elapsed()),
        })
    }

    async fn try_consume(&self, bucket: &BucketSettings) -> Result<bool, RateLimitError> {
        let (tokens, last_refill) = self.refilled(bucket)?;
        let allowed = tokens > 0;
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bucket.name.clone(), (tokens.saturating_sub(1), last_refill));
        Ok(allowed)
    }
}

/// 발행된 이벤트를 기록하는 발행기
pub struct RecordingPublisher {
    events: Mutex<Vec<EntityEvent>>,
    failing: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<EntityEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: EntityEvent) -> Result<(), BrokerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BrokerError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "publish failed",
            ))));
        }
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
        Ok(())
    }
}
