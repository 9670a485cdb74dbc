use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::BatchRecord;

/// 감사 이벤트 (로그인 성공/실패, 토큰 발급 등)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEventRecord {
    pub id: String,
    pub principal: String,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl BatchRecord for AuditEventRecord {
    const COLLECTION: &'static str = "audit_event";

    fn record_id(&self) -> String {
        self.id.clone()
    }
}
