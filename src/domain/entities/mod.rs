//! 영속화 대상 레코드
//!
//! 각 레코드는 브로커 payload(JSON)에서 역직렬화되어 MongoDB 문서로 저장됩니다.

pub mod audit_event;
pub mod authorization;
pub mod client;
pub mod consent;

pub use audit_event::AuditEventRecord;
pub use authorization::{AuthorizationRecord, TokenRecord};
pub use client::ClientRecord;
pub use consent::ConsentRecord;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// 배치로 저장되는 레코드의 공통 계약
///
/// `record_id`는 같은 레코드에 대해 항상 같은 값이어야 하며, 저장소의 `_id`로 사용됩니다.
/// 재전달된 메시지는 같은 `_id`에 덮어써지므로 결과가 달라지지 않습니다.
pub trait BatchRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// 저장 컬렉션 이름
    const COLLECTION: &'static str;

    fn record_id(&self) -> String;
}

/// 삭제 명령 payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemovePayload {
    pub id: String,
}
