//! 복호화된 등록 클라이언트
//!
//! [`RegisteredClient`]는 비밀값 평문을 가지므로 자격증명 캐시 안에서만 보관되고,
//! HTTP 응답에는 [`ClientSummary`]만 나갑니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::entities::ClientRecord;

#[derive(Clone)]
pub struct RegisteredClient {
    pub id: String,
    pub client_id: String,
    pub client_id_issued_at: Option<DateTime<Utc>>,
    pub client_secret: Option<String>,
    pub client_secret_expires_at: Option<DateTime<Utc>>,
    pub client_name: String,
    pub client_authentication_methods: Vec<String>,
    pub authorization_grant_types: Vec<String>,
    pub redirect_uris: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    pub scopes: Vec<String>,
    pub client_settings: Map<String, Value>,
    pub token_settings: Map<String, Value>,
}

impl RegisteredClient {
    /// 저장 레코드와 복호화된 비밀값으로 생성합니다.
    pub fn from_record(record: ClientRecord, client_secret: Option<String>) -> Self {
        Self {
            id: record.id,
            client_id: record.client_id,
            client_id_issued_at: record.client_id_issued_at,
            client_secret,
            client_secret_expires_at: record.client_secret_expires_at,
            client_name: record.client_name,
            client_authentication_methods: record.client_authentication_methods,
            authorization_grant_types: record.authorization_grant_types,
            redirect_uris: record.redirect_uris,
            post_logout_redirect_uris: record.post_logout_redirect_uris,
            scopes: record.scopes,
            client_settings: record.client_settings,
            token_settings: record.token_settings,
        }
    }

    pub fn is_secret_expired(&self, now: DateTime<Utc>) -> bool {
        self.client_secret_expires_at
            .map(|expires_at| expires_at <= now)
            .unwrap_or(false)
    }

    pub fn summary(&self) -> ClientSummary {
        ClientSummary {
            id: self.id.clone(),
            client_id: self.client_id.clone(),
            client_name: self.client_name.clone(),
            client_id_issued_at: self.client_id_issued_at,
            has_secret: self.client_secret.is_some(),
            secret_expired: self.is_secret_expired(Utc::now()),
            client_authentication_methods: self.client_authentication_methods.clone(),
            authorization_grant_types: self.authorization_grant_types.clone(),
            redirect_uris: self.redirect_uris.clone(),
            scopes: self.scopes.clone(),
        }
    }
}

impl fmt::Debug for RegisteredClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredClient")
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .field("client_name", &self.client_name)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

/// 비밀값을 제외한 클라이언트 메타데이터
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClientSummary {
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    pub client_id_issued_at: Option<DateTime<Utc>>,
    pub has_secret: bool,
    pub secret_expired: bool,
    pub client_authentication_methods: Vec<String>,
    pub authorization_grant_types: Vec<String>,
    pub redirect_uris: Vec<String>,
    pub scopes: Vec<String>,
}
