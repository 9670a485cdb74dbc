//! # 읽기 전용 자격증명 리포지토리
//!
//! 등록 클라이언트를 캐시 우선으로 조회합니다.
//!
//! ## 조회 순서
//!
//! 1. 해당 키의 TTL 캐시 확인. 적중하면 복호화 없이 반환
//! 2. 저장소 조회. 없으면 `None`
//! 3. 비밀값 복호화 후 [`RegisteredClient`] 구성
//! 4. id 캐시와 client_id 캐시에 모두 저장
//!
//! 복호화에 실패한 레코드는 에러 로그를 남기고 없는 것으로 취급합니다.
//! 쓰기는 브로커 파이프라인만 담당하므로 이 리포지토리의 쓰기 연산은 항상 실패합니다.

use std::sync::Arc;

use log::{debug, error};

use super::CredentialStore;
use crate::caching::TtlCache;
use crate::domain::RegisteredClient;
use crate::domain::entities::ClientRecord;
use crate::errors::{AppError, AppResult, ReadOnlyOperationError};
use crate::security::cipher::SecretCipher;

type ClientCache = TtlCache<String, Arc<RegisteredClient>>;

pub struct CredentialRepository {
    store: Arc<dyn CredentialStore>,
    cipher: Arc<dyn SecretCipher>,
    by_id: Arc<ClientCache>,
    by_client_id: Arc<ClientCache>,
}

impl CredentialRepository {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cipher: Arc<dyn SecretCipher>,
        by_id: Arc<ClientCache>,
        by_client_id: Arc<ClientCache>,
    ) -> Self {
        Self {
            store,
            cipher,
            by_id,
            by_client_id,
        }
    }

    /// # 반환값
    ///
    /// * `Ok(Some(client))` - 조회 성공 (캐시 또는 저장소)
    /// * `Ok(None)` - 없음, 또는 비밀값 복호화 실패
    /// * `Err(AppError::DatabaseError)` - 저장소 오류
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Arc<RegisteredClient>>> {
        if let Some(cached) = self.by_id.get(id) {
            debug!("자격증명 캐시 적중 - cache: {}", self.by_id.name());
            return Ok(Some(cached));
        }

        let record = self
            .store
            .find_by_id(id)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(record.and_then(|record| self.materialize(record)))
    }

    pub async fn find_by_client_id(&self, client_id: &str) -> AppResult<Option<Arc<RegisteredClient>>> {
        if let Some(cached) = self.by_client_id.get(client_id) {
            debug!("자격증명 캐시 적중 - cache: {}", self.by_client_id.name());
            return Ok(Some(cached));
        }

        let record = self
            .store
            .find_by_client_id(client_id)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(record.and_then(|record| self.materialize(record)))
    }

    /// 쓰기는 지원하지 않습니다.
    pub fn save(&self, _client: &RegisteredClient) -> Result<(), ReadOnlyOperationError> {
        Err(ReadOnlyOperationError { operation: "save" })
    }

    pub fn remove(&self, _id: &str) -> Result<(), ReadOnlyOperationError> {
        Err(ReadOnlyOperationError { operation: "remove" })
    }

    fn materialize(&self, record: ClientRecord) -> Option<Arc<RegisteredClient>> {
        let secret = match record.client_secret.as_deref() {
            Some(envelope) => match self.cipher.decrypt(envelope) {
                Ok(secret) => Some(secret),
                Err(e) => {
                    // 비밀값 자체는 로그에 남기지 않는다
                    error!(
                        "클라이언트 비밀값 복호화 실패 - id: {}, client_id: {}, cipher: {}, reason: {}",
                        record.id,
                        record.client_id,
                        self.cipher.label(),
                        e
                    );
                    return None;
                }
            },
            None => None,
        };

        let client = Arc::new(RegisteredClient::from_record(record, secret));
        self.by_id.put(client.id.clone(), client.clone());
        self.by_client_id.put(client.client_id.clone(), client.clone());
        Some(client)
    }
}
