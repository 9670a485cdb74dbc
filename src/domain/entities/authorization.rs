use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::BatchRecord;

/// 발급된 토큰 하나 (인가 코드, 액세스/리프레시 토큰, ID 토큰)
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenRecord {
    pub value: String,
    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("value", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// 인가 레코드
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorizationRecord {
    pub id: String,
    pub registered_client_id: String,
    pub principal_name: String,
    pub authorization_grant_type: String,
    #[serde(default)]
    pub authorized_scopes: Vec<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub authorization_code: Option<TokenRecord>,
    #[serde(default)]
    pub access_token: Option<TokenRecord>,
    #[serde(default)]
    pub refresh_token: Option<TokenRecord>,
    #[serde(default)]
    pub oidc_id_token: Option<TokenRecord>,
}

impl BatchRecord for AuthorizationRecord {
    const COLLECTION: &'static str = "oauth2_authorization";

    fn record_id(&self) -> String {
        self.id.clone()
    }
}
