//! 등록 클라이언트 레코드

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::BatchRecord;
use crate::errors::CryptoError;
use crate::security::cipher::SecretCipher;

/// OAuth2 등록 클라이언트
///
/// 저장소에 있는 `client_secret`은 항상 암호화 봉투입니다.
/// 브로커로 들어오는 `client.save` payload만 평문을 실어 오며,
/// 저장 전에 [`ClientRecord::seal_secret`]으로 봉인됩니다.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientRecord {
    pub id: String,
    pub client_id: String,
    #[serde(default)]
    pub client_id_issued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub client_secret_expires_at: Option<DateTime<Utc>>,
    pub client_name: String,
    #[serde(default)]
    pub client_authentication_methods: Vec<String>,
    #[serde(default)]
    pub authorization_grant_types: Vec<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub post_logout_redirect_uris: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub client_settings: Map<String, Value>,
    #[serde(default)]
    pub token_settings: Map<String, Value>,
}

impl ClientRecord {
    /// 평문 비밀값을 암호화 봉투로 교체합니다.
    pub fn seal_secret(mut self, cipher: &dyn SecretCipher) -> Result<Self, CryptoError> {
        if let Some(secret) = self.client_secret.take() {
            self.client_secret = Some(cipher.encrypt(&secret)?);
        }
        Ok(self)
    }
}

impl BatchRecord for ClientRecord {
    const COLLECTION: &'static str = "oauth2_registered_client";

    fn record_id(&self) -> String {
        self.id.clone()
    }
}

impl fmt::Debug for ClientRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRecord")
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .field("client_name", &self.client_name)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("authorization_grant_types", &self.authorization_grant_types)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}
