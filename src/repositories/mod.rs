//! 데이터 액세스 계층
//!
//! 파이프라인은 [`PersistencePort`]로만 쓰고, HTTP 계층은 [`CredentialRepository`]로만 읽습니다.
//! MongoDB 구현은 [`mongo_store::MongoRecordStore`] 하나이며 레코드 타입마다 컬렉션이 다릅니다.
//!
//! # Examples
//!
//! ```rust,ignore
//! let clients = Arc::new(MongoRecordStore::<ClientRecord>::new(&database));
//! let failed = clients.save_batch(records).await?;
//! ```

pub mod credential_repository;
pub mod mongo_store;

pub use credential_repository::CredentialRepository;
pub use mongo_store::MongoRecordStore;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::entities::{BatchRecord, ClientRecord};
use crate::errors::PersistenceError;

/// 배치 쓰기 포트
///
/// 성공하면 영속화에 실패한 레코드 id 집합을 돌려줍니다. 빈 집합이면 전부 성공입니다.
/// 같은 레코드를 다시 적용해도 결과가 같아야 합니다.
#[async_trait]
pub trait PersistencePort<R: BatchRecord>: Send + Sync {
    async fn save_batch(&self, records: Vec<R>) -> Result<HashSet<String>, PersistenceError>;

    /// 존재하지 않는 id 삭제는 성공으로 취급합니다.
    async fn remove_batch(&self, ids: Vec<String>) -> Result<HashSet<String>, PersistenceError>;
}

/// 등록 클라이언트 조회 포트
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<ClientRecord>, PersistenceError>;

    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<ClientRecord>, PersistenceError>;
}
