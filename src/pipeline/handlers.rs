//! 명령 핸들러
//!
//! 핸들러는 같은 명령 코드의 봉투 묶음 하나를 받아 영속화하고, 봉투마다 정산 결정을 돌려줍니다.
//!
//! ## 결정 규칙
//!
//! | 상황 | 결정 |
//! |------|------|
//! | payload 역직렬화 실패 | `nack(requeue=false)` (데드레터) |
//! | 준비 단계 실패 (예: 암호화) | `nack(requeue=true)` |
//! | 포트가 돌려준 실패 id에 포함 | `nack(requeue=true)` |
//! | 실패 id에 없음 | `ack` |
//! | 포트 에러 또는 타임아웃 | 묶음 전체 `nack(requeue=true)` |

use std::collections::HashSet;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use serde::de::DeserializeOwned;

use crate::domain::entities::{BatchRecord, ClientRecord, RemovePayload};
use crate::domain::{CommandKind, MessageEnvelope, Settlement};
use crate::errors::PersistenceError;
use crate::repositories::PersistencePort;
use crate::security::cipher::SecretCipher;

/// 명령 종류 하나를 담당하는 핸들러
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn kind(&self) -> CommandKind;

    /// 봉투마다 정확히 하나의 [`Settlement`]를 돌려줘야 합니다.
    async fn commit(&self, batch: Vec<MessageEnvelope>, timeout: Duration) -> Vec<Settlement>;
}

/// 저장 전 레코드 변환 단계
pub type Prepare<R> =
    Arc<dyn Fn(R) -> Result<R, Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

/// 클라이언트 비밀값을 봉인하는 준비 단계
pub fn seal_client_secret(cipher: Arc<dyn SecretCipher>) -> Prepare<ClientRecord> {
    Arc::new(move |record: ClientRecord| {
        record
            .seal_secret(cipher.as_ref())
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    })
}

/// 레코드를 upsert 하는 범용 핸들러
pub struct SaveRecordsHandler<R: BatchRecord> {
    kind: CommandKind,
    port: Arc<dyn PersistencePort<R>>,
    prepare: Option<Prepare<R>>,
}

impl<R: BatchRecord> SaveRecordsHandler<R> {
    pub fn new(kind: CommandKind, port: Arc<dyn PersistencePort<R>>) -> Self {
        Self {
            kind,
            port,
            prepare: None,
        }
    }

    pub fn with_prepare(mut self, prepare: Prepare<R>) -> Self {
        self.prepare = Some(prepare);
        self
    }
}

#[async_trait]
impl<R: BatchRecord> CommandHandler for SaveRecordsHandler<R> {
    fn kind(&self) -> CommandKind {
        self.kind
    }

    async fn commit(&self, batch: Vec<MessageEnvelope>, timeout: Duration) -> Vec<Settlement> {
        let kind = self.kind;
        let mut settlements = Vec::with_capacity(batch.len());
        let mut admitted = Vec::with_capacity(batch.len());
        let mut records = Vec::with_capacity(batch.len());

        for envelope in batch {
            let record = match decode::<R>(kind, &envelope) {
                Some(record) => record,
                None => {
                    settlements.push(Settlement::reject(envelope, Some(kind)));
                    continue;
                }
            };
            let record_id = record.record_id();

            let prepared = match &self.prepare {
                Some(prepare) => prepare(record),
                None => Ok(record),
            };
            match prepared {
                Ok(record) => {
                    records.push(record);
                    admitted.push((envelope, record_id));
                }
                Err(e) => {
                    error!("레코드 준비 실패 - command: {}, record_id: {}, reason: {}", kind, record_id, e);
                    settlements.push(Settlement::retry(envelope, kind, Some(record_id)));
                }
            }
        }

        if !records.is_empty() {
            let outcome = persist_within(timeout, self.port.save_batch(records)).await;
            settlements.extend(settle(kind, admitted, outcome));
        }
        settlements
    }
}

/// `{ "id": ... }` payload로 레코드를 삭제하는 범용 핸들러
pub struct RemoveRecordsHandler<R: BatchRecord> {
    kind: CommandKind,
    port: Arc<dyn PersistencePort<R>>,
    _record: PhantomData<fn() -> R>,
}

impl<R: BatchRecord> RemoveRecordsHandler<R> {
    pub fn new(kind: CommandKind, port: Arc<dyn PersistencePort<R>>) -> Self {
        Self {
            kind,
            port,
            _record: PhantomData,
        }
    }
}

#[async_trait]
impl<R: BatchRecord> CommandHandler for RemoveRecordsHandler<R> {
    fn kind(&self) -> CommandKind {
        self.kind
    }

    async fn commit(&self, batch: Vec<MessageEnvelope>, timeout: Duration) -> Vec<Settlement> {
        let kind = self.kind;
        let mut settlements = Vec::new();
        let mut admitted = Vec::with_capacity(batch.len());

        for envelope in batch {
            match decode::<RemovePayload>(kind, &envelope) {
                Some(RemovePayload { id }) => admitted.push((envelope, id)),
                None => settlements.push(Settlement::reject(envelope, Some(kind))),
            }
        }

        if !admitted.is_empty() {
            let ids = admitted.iter().map(|(_, id)| id.clone()).collect();
            let outcome = persist_within(timeout, self.port.remove_batch(ids)).await;
            settlements.extend(settle(kind, admitted, outcome));
        }
        settlements
    }
}

fn decode<T: DeserializeOwned>(kind: CommandKind, envelope: &MessageEnvelope) -> Option<T> {
    match serde_json::from_value::<T>(envelope.payload.clone()) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                "payload 역직렬화 실패 (poison) - command: {}, delivery_tag: {}, reason: {}",
                kind, envelope.delivery_tag, e
            );
            None
        }
    }
}

/// 영속화 호출을 타임아웃으로 감쌉니다.
pub async fn persist_within<F>(timeout: Duration, call: F) -> Result<HashSet<String>, PersistenceError>
where
    F: Future<Output = Result<HashSet<String>, PersistenceError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(PersistenceError::Timeout(timeout)),
    }
}

/// 포트 결과를 봉투별 결정으로 바꿉니다.
///
/// 실패 id 집합에 있으면 재큐잉, 없으면 ack 입니다. 포트 자체가 실패하면 전부 재큐잉합니다.
pub fn settle(
    kind: CommandKind,
    admitted: Vec<(MessageEnvelope, String)>,
    outcome: Result<HashSet<String>, PersistenceError>,
) -> Vec<Settlement> {
    match outcome {
        Ok(failed) => {
            if !failed.is_empty() {
                warn!(
                    "일부 레코드 영속화 실패 - command: {}, failed: {}, batch: {}",
                    kind,
                    failed.len(),
                    admitted.len()
                );
            } else {
                debug!("배치 영속화 성공 - command: {}, batch: {}", kind, admitted.len());
            }

            admitted
                .into_iter()
                .map(|(envelope, record_id)| {
                    if failed.contains(&record_id) {
                        Settlement::retry(envelope, kind, Some(record_id))
                    } else {
                        Settlement::ack(envelope, kind, record_id)
                    }
                })
                .collect()
        }
        Err(e) => {
            error!(
                "배치 영속화 실패, 전체 재큐잉 - command: {}, batch: {}, reason: {}",
                kind,
                admitted.len(),
                e
            );
            admitted
                .into_iter()
                .map(|(envelope, record_id)| Settlement::retry(envelope, kind, Some(record_id)))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::domain::entities::{AuditEventRecord, AuthorizationRecord, ConsentRecord};
    use crate::domain::Decision;
    use crate::security::cipher::AesGcmCipher;
    use crate::testing::{InMemoryRecordStore, RecordingChannel, envelope};

    fn audit_payload(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "principal": "alice",
            "event_type": "AUTHENTICATION_SUCCESS",
            "occurred_at": "2024-05-01T12:00:00Z"
        })
    }

    fn decisions(settlements: &[Settlement]) -> Vec<(u64, Decision)> {
        let mut decisions: Vec<_> = settlements
            .iter()
            .map(|s| (s.envelope.delivery_tag, s.decision))
            .collect();
        decisions.sort_by_key(|(tag, _)| *tag);
        decisions
    }

    #[actix_web::test]
    async fn test_failed_ids_are_requeued_others_acked() {
        let channel = RecordingChannel::new("auth:audit");
        let store = Arc::new(InMemoryRecordStore::<AuditEventRecord>::new());
        store.fail_ids(["ev-2"]);
        let handler = SaveRecordsHandler::new(CommandKind::RecordAuditEvent, store.clone());

        let batch = (1..=3)
            .map(|i| envelope(&channel, i, "audit.record", audit_payload(&format!("ev-{}", i))))
            .collect();
        let settlements = handler.commit(batch, Duration::from_secs(1)).await;

        assert_eq!(
            decisions(&settlements),
            vec![
                (1, Decision::Ack),
                (2, Decision::Nack { requeue: true }),
                (3, Decision::Ack),
            ]
        );
        assert!(store.contains("ev-1"));
        assert!(!store.contains("ev-2"));
    }

    #[actix_web::test]
    async fn test_port_error_requeues_whole_batch() {
        let channel = RecordingChannel::new("auth:audit");
        let store = Arc::new(InMemoryRecordStore::<AuditEventRecord>::new());
        store.set_unavailable(true);
        let handler = SaveRecordsHandler::new(CommandKind::RecordAuditEvent, store);

        let batch = vec![
            envelope(&channel, 1, "audit.record", audit_payload("ev-1")),
            envelope(&channel, 2, "audit.record", audit_payload("ev-2")),
        ];
        let settlements = handler.commit(batch, Duration::from_secs(1)).await;

        assert!(settlements
            .iter()
            .all(|s| s.decision == Decision::Nack { requeue: true }));
        assert_eq!(settlements.len(), 2);
    }

    #[actix_web::test]
    async fn test_timeout_requeues_whole_batch() {
        let channel = RecordingChannel::new("auth:audit");
        let store = Arc::new(InMemoryRecordStore::<AuditEventRecord>::new());
        store.set_delay(Duration::from_millis(200));
        let handler = SaveRecordsHandler::new(CommandKind::RecordAuditEvent, store);

        let batch = vec![envelope(&channel, 1, "audit.record", audit_payload("ev-1"))];
        let settlements = handler.commit(batch, Duration::from_millis(20)).await;

        assert_eq!(decisions(&settlements), vec![(1, Decision::Nack { requeue: true })]);
    }

    #[actix_web::test]
    async fn test_poison_payload_is_rejected_without_requeue() {
        let channel = RecordingChannel::new("auth:authorization");
        let store = Arc::new(InMemoryRecordStore::<AuthorizationRecord>::new());
        let handler = SaveRecordsHandler::new(CommandKind::SaveAuthorization, store.clone());

        let batch = vec![envelope(&channel, 7, "authorization.save", json!({ "unexpected": true }))];
        let settlements = handler.commit(batch, Duration::from_secs(1)).await;

        assert_eq!(decisions(&settlements), vec![(7, Decision::Nack { requeue: false })]);
        assert_eq!(store.save_calls(), 0);
    }

    #[actix_web::test]
    async fn test_client_save_seals_secret_before_persisting() {
        let channel = RecordingChannel::new("auth:client");
        let store = Arc::new(InMemoryRecordStore::<ClientRecord>::new());
        let cipher: Arc<dyn SecretCipher> = Arc::new(AesGcmCipher::new("passphrase"));
        let handler = SaveRecordsHandler::new(CommandKind::SaveClient, store.clone())
            .with_prepare(seal_client_secret(cipher.clone()));

        let payload = json!({
            "id": "rc-1",
            "client_id": "web-portal",
            "client_secret": "plain-secret",
            "client_name": "Web Portal"
        });
        let settlements = handler
            .commit(vec![envelope(&channel, 1, "client.save", payload)], Duration::from_secs(1))
            .await;

        assert_eq!(decisions(&settlements), vec![(1, Decision::Ack)]);
        let stored = store.get("rc-1").unwrap();
        let at_rest = stored.client_secret.unwrap();
        assert_ne!(at_rest, "plain-secret");
        assert_eq!(cipher.decrypt(&at_rest).unwrap(), "plain-secret");
    }

    #[actix_web::test]
    async fn test_remove_handler_uses_id_payload() {
        let channel = RecordingChannel::new("auth:consent");
        let store = Arc::new(InMemoryRecordStore::<ConsentRecord>::new());
        store.insert(ConsentRecord {
            registered_client_id: "rc-1".to_string(),
            principal_name: "alice".to_string(),
            authorities: vec![],
        });
        let handler = RemoveRecordsHandler::new(CommandKind::RemoveConsent, store.clone());

        let batch = vec![
            envelope(&channel, 1, "consent.remove", json!({ "id": "rc-1:alice" })),
            envelope(&channel, 2, "consent.remove", json!({ "id": "rc-9:nobody" })),
            envelope(&channel, 3, "consent.remove", json!({ "identifier": 1 })),
        ];
        let settlements = handler.commit(batch, Duration::from_secs(1)).await;

        assert_eq!(
            decisions(&settlements),
            vec![
                (1, Decision::Ack),
                (2, Decision::Ack),
                (3, Decision::Nack { requeue: false }),
            ]
        );
        assert!(!store.contains("rc-1:alice"));
    }

    #[actix_web::test]
    async fn test_redelivered_save_is_idempotent() {
        let channel = RecordingChannel::new("auth:audit");
        let store = Arc::new(InMemoryRecordStore::<AuditEventRecord>::new());
        let handler = SaveRecordsHandler::new(CommandKind::RecordAuditEvent, store.clone());

        for tag in [1, 2] {
            let batch = vec![envelope(&channel, tag, "audit.record", audit_payload("ev-1"))];
            let settlements = handler.commit(batch, Duration::from_secs(1)).await;
            assert_eq!(settlements[0].decision, Decision::Ack);
        }

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("ev-1").unwrap().principal, "alice");
    }
}
