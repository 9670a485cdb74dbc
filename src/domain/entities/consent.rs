use serde::{Deserialize, Serialize};

use super::BatchRecord;

/// 사용자가 클라이언트에 부여한 동의
///
/// 별도의 id 없이 (클라이언트, 사용자) 쌍으로 식별됩니다.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsentRecord {
    pub registered_client_id: String,
    pub principal_name: String,
    #[serde(default)]
    pub authorities: Vec<String>,
}

impl ConsentRecord {
    pub fn compose_id(registered_client_id: &str, principal_name: &str) -> String {
        format!("{}:{}", registered_client_id, principal_name)
    }
}

impl BatchRecord for ConsentRecord {
    const COLLECTION: &'static str = "oauth2_authorization_consent";

    fn record_id(&self) -> String {
        Self::compose_id(&self.registered_client_id, &self.principal_name)
    }
}
