//! 애플리케이션 전역에서 사용하는 에러 시스템
//!
//! HTTP 경계에서는 [`AppError`]가 `actix_web::ResponseError`로 변환되고,
//! 파이프라인 내부의 각 관심사(암호화, 영속화, 브로커, 레이트 리미터, 설정)는
//! 자신만의 `thiserror` 열거형을 가집니다.
//!
//! ## 사용 예제
//!
//! ```rust,ignore
//! use crate::errors::AppError;
//!
//! async fn lookup(repo: &CredentialRepository, client_id: &str) -> Result<ClientSummary, AppError> {
//!     let client = repo.find_by_client_id(client_id).await?
//!         .ok_or_else(|| AppError::NotFound(format!("client {}", client_id)))?;
//!     Ok(client.summary())
//! }
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::domain::command::CommandKind;

/// 애플리케이션 전역 에러 타입
///
/// HTTP 응답으로 변환될 때 5xx 계열은 내부 상세 정보를 노출하지 않습니다.
#[derive(Error, Debug)]
pub enum AppError {
    /// 데이터베이스 관련 에러 (500 Internal Server Error)
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// 리소스 찾을 수 없음 에러 (404 Not Found)
    #[error("Not found: {0}")]
    NotFound(String),

    /// 읽기 전용 저장소에 대한 쓰기 시도 (500 Internal Server Error)
    #[error(transparent)]
    ReadOnly(#[from] ReadOnlyOperationError),

    /// 토큰 버킷 소진 (429 Too Many Requests)
    #[error("Rate limit exceeded, retry after {reset_seconds}s")]
    RateLimitExceeded { reset_seconds: u64 },

    /// 레이트 리미터 저장소 장애. 요청은 거부됩니다 (500 Internal Server Error)
    #[error("Rate limiter unavailable: {0}")]
    RateLimiterUnavailable(String),
}

impl AppError {
    /// 클라이언트에게 노출되는 에러 코드
    fn public_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            AppError::RateLimiterUnavailable(_) => "rate_limiter_unavailable",
            _ => "internal_error",
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;

        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// HTTP 에러 응답을 생성합니다.
    ///
    /// 4xx 에러는 메시지를 그대로 전달하고, 5xx 에러는 코드만 전달합니다.
    fn error_response(&self) -> actix_web::HttpResponse {
        let status = self.status_code();
        let body = if status.is_server_error() {
            serde_json::json!({ "error": self.public_code() })
        } else {
            serde_json::json!({
                "error": self.public_code(),
                "message": self.to_string()
            })
        };

        actix_web::HttpResponse::build(status).json(body)
    }
}

/// 편의성을 위한 Result 타입 별칭
pub type AppResult<T> = Result<T, AppError>;

/// 비밀값 봉투 암복호화 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("envelope is not valid base64")]
    InvalidEncoding,

    #[error("envelope is too short ({0} bytes)")]
    Truncated(usize),

    /// 태그 불일치. 변조되었거나 패스프레이즈가 다릅니다.
    #[error("envelope failed authentication")]
    AuthenticationFailed,

    #[error("decrypted secret is not valid UTF-8")]
    InvalidUtf8,

    #[error("secret encryption failed")]
    EncryptionFailed,
}

/// 영속화 포트 에러. 배치 전체가 실패한 경우에만 사용됩니다.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("persistence call timed out after {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(String),

    #[error("record serialization failed: {0}")]
    Serialization(String),
}

impl From<mongodb::error::Error> for PersistenceError {
    fn from(e: mongodb::error::Error) -> Self {
        PersistenceError::Database(e.to_string())
    }
}

/// 메시지 브로커 에러
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("delivery tag {0} is not in flight")]
    UnknownDeliveryTag(u64),

    #[error("malformed stream entry {entry_id}: {reason}")]
    MalformedEntry { entry_id: String, reason: String },

    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 분산 레이트 리미터 에러. 어떤 경우든 요청은 거부됩니다.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("no bucket configured under name `{0}`")]
    UnknownBucket(String),

    #[error("bucket store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<redis::RedisError> for RateLimitError {
    fn from(e: redis::RedisError) -> Self {
        RateLimitError::StoreUnavailable(e.to_string())
    }
}

impl From<RateLimitError> for AppError {
    fn from(e: RateLimitError) -> Self {
        AppError::RateLimiterUnavailable(e.to_string())
    }
}

/// 읽기 전용 자격증명 저장소에 쓰기를 시도했을 때 반환됩니다.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("credential repository is read-only: `{operation}` is not supported")]
pub struct ReadOnlyOperationError {
    pub operation: &'static str,
}

/// 명령 레지스트리 구성 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no handler registered for command `{0}`")]
    MissingHandler(CommandKind),

    #[error("handler for `{reported}` was registered under `{registered}`")]
    MismatchedHandler {
        registered: CommandKind,
        reported: CommandKind,
    },
}

/// 설정 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required setting `{0}` is missing")]
    Missing(&'static str),

    #[error("setting `{key}` is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("the noop credential cipher cannot be used in production")]
    NoopCipherInProduction,
}
