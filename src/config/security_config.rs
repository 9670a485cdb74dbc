//! # Security & Redis Configuration
//!
//! 자격증명 암호화, Redis 연결, 분산 레이트 리미터 버킷, 로컬 TTL 캐시 설정을 관리합니다.
//!
//! ## 환경 변수
//!
//! ```bash
//! # 자격증명 비밀값 암호화
//! export CREDENTIAL_CIPHER="aes-gcm"            # aes-gcm | noop
//! export CREDENTIAL_CIPHER_PASSPHRASE="change-me"
//!
//! # Redis
//! export REDIS_HOST="localhost"
//! export REDIS_PORT="6379"
//! export REDIS_PASSWORD=""
//! export REDIS_TLS="false"
//!
//! # 레이트 리미터 버킷
//! export RATE_LIMIT_BUCKET_NAME="client-lookup"
//! export RATE_LIMIT_CAPACITY="100"
//! export RATE_LIMIT_REFILL_TOKENS="100"
//! export RATE_LIMIT_REFILL_PERIOD_SECONDS="60"
//!
//! # 캐시 (이름은 대문자 + '_' 로 변환됨)
//! export CACHE_CREDENTIALS_BY_ID_TTL_SECONDS="300"
//! export CACHE_CREDENTIALS_BY_ID_MAX_ENTRIES="1000"
//! ```

use std::env;
use std::fmt;
use std::time::Duration;

use super::env_parse;
use crate::errors::ConfigError;

/// 자격증명 비밀값 암호화 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    /// AES-GCM 봉투 암호화
    AesGcm,
    /// 평문 그대로 통과. 로컬 개발 전용입니다.
    Noop,
}

impl CipherMode {
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_lowercase().as_str() {
            "aes-gcm" | "aesgcm" | "aes" => Ok(CipherMode::AesGcm),
            "noop" | "none" | "plaintext" => Ok(CipherMode::Noop),
            other => Err(ConfigError::Invalid {
                key: "CREDENTIAL_CIPHER",
                reason: format!("unknown cipher `{}`", other),
            }),
        }
    }
}

/// 자격증명 암호화 설정
#[derive(Clone)]
pub struct CipherSettings {
    pub mode: CipherMode,
    pub passphrase: Option<String>,
}

impl CipherSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = CipherMode::from_name(
            &env::var("CREDENTIAL_CIPHER").unwrap_or_else(|_| "aes-gcm".to_string()),
        )?;
        let passphrase = env::var("CREDENTIAL_CIPHER_PASSPHRASE").ok();

        Ok(Self { mode, passphrase })
    }
}

impl fmt::Debug for CipherSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherSettings")
            .field("mode", &self.mode)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Redis 연결 설정
#[derive(Clone)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u8,
    pub tls: bool,
}

impl RedisSettings {
    pub fn from_env() -> Self {
        Self {
            host: env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env_parse("REDIS_PORT", 6379),
            username: env::var("REDIS_USERNAME").ok().filter(|v| !v.is_empty()),
            password: env::var("REDIS_PASSWORD").ok().filter(|v| !v.is_empty()),
            database: env_parse("REDIS_DATABASE", 0),
            tls: env_parse("REDIS_TLS", false),
        }
    }

    /// `redis://` 또는 `rediss://` 연결 URL을 생성합니다.
    pub fn connection_url(&self) -> String {
        let scheme = if self.tls { "rediss" } else { "redis" };
        let auth = match (&self.username, &self.password) {
            (Some(user), Some(password)) => format!("{}:{}@", user, password),
            (None, Some(password)) => format!(":{}@", password),
            (Some(user), None) => format!("{}@", user),
            (None, None) => String::new(),
        };

        format!("{}://{}{}:{}/{}", scheme, auth, self.host, self.port, self.database)
    }
}

impl fmt::Debug for RedisSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("tls", &self.tls)
            .finish()
    }
}

/// 분산 토큰 버킷 하나의 설정
///
/// `refill_period`마다 `refill_tokens`개가 채워지며 `capacity`를 넘지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSettings {
    pub name: String,
    pub capacity: u64,
    pub refill_tokens: u64,
    pub refill_period: Duration,
}

impl BucketSettings {
    pub fn new(name: impl Into<String>, capacity: u64, refill_tokens: u64, refill_period: Duration) -> Self {
        Self {
            name: name.into(),
            capacity,
            refill_tokens,
            refill_period,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Self::new(
            env::var("RATE_LIMIT_BUCKET_NAME").unwrap_or_else(|_| "client-lookup".to_string()),
            env_parse("RATE_LIMIT_CAPACITY", 100),
            env_parse("RATE_LIMIT_REFILL_TOKENS", 100),
            Duration::from_secs(env_parse("RATE_LIMIT_REFILL_PERIOD_SECONDS", 60)),
        );
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_CAPACITY",
                reason: "capacity must be positive".to_string(),
            });
        }
        if self.refill_tokens == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_REFILL_TOKENS",
                reason: "refill tokens must be positive".to_string(),
            });
        }
        if self.refill_period.as_millis() == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_REFILL_PERIOD_SECONDS",
                reason: "refill period must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Redis 해시 키
    pub fn storage_key(&self) -> String {
        format!("ratelimit:{}", self.name)
    }
}

/// 이름 붙은 로컬 TTL 캐시 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub name: String,
    pub ttl: Duration,
    pub max_entries: usize,
}

impl CacheSettings {
    pub fn new(name: impl Into<String>, ttl: Duration, max_entries: usize) -> Self {
        Self {
            name: name.into(),
            ttl,
            max_entries,
        }
    }

    /// `CACHE_<NAME>_TTL_SECONDS`, `CACHE_<NAME>_MAX_ENTRIES` 로 기본값을 덮어씁니다.
    pub fn for_name(name: &str, default_ttl: Duration, default_max_entries: usize) -> Self {
        let prefix = format!("CACHE_{}", name.to_uppercase().replace(['-', '.'], "_"));
        let ttl_seconds = env_parse(&format!("{}_TTL_SECONDS", prefix), default_ttl.as_secs());
        let max_entries = env_parse(&format!("{}_MAX_ENTRIES", prefix), default_max_entries);

        Self::new(name, Duration::from_secs(ttl_seconds), max_entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis(username: Option<&str>, password: Option<&str>, tls: bool) -> RedisSettings {
        RedisSettings {
            host: "cache.internal".to_string(),
            port: 6380,
            username: username.map(str::to_string),
            password: password.map(str::to_string),
            database: 2,
            tls,
        }
    }

    #[test]
    fn test_cipher_mode_from_name() {
        assert_eq!(CipherMode::from_name("AES-GCM"), Ok(CipherMode::AesGcm));
        assert_eq!(CipherMode::from_name("noop"), Ok(CipherMode::Noop));
        assert!(CipherMode::from_name("rot13").is_err());
    }

    #[test]
    fn test_redis_connection_url() {
        assert_eq!(redis(None, None, false).connection_url(), "redis://cache.internal:6380/2");
        assert_eq!(
            redis(None, Some("pw"), true).connection_url(),
            "rediss://:pw@cache.internal:6380/2"
        );
        assert_eq!(
            redis(Some("svc"), Some("pw"), false).connection_url(),
            "redis://svc:pw@cache.internal:6380/2"
        );
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let output = format!("{:?}", redis(None, Some("hunter2"), false));
        assert!(!output.contains("hunter2"));

        let cipher = CipherSettings {
            mode: CipherMode::AesGcm,
            passphrase: Some("hunter2".to_string()),
        };
        assert!(!format!("{:?}", cipher).contains("hunter2"));
    }

    #[test]
    fn test_bucket_validation() {
        let bucket = BucketSettings::new("api", 10, 10, Duration::from_secs(1));
        assert!(bucket.validate().is_ok());
        assert_eq!(bucket.storage_key(), "ratelimit:api");

        let empty = BucketSettings::new("api", 0, 10, Duration::from_secs(1));
        assert!(empty.validate().is_err());

        let frozen = BucketSettings::new("api", 10, 10, Duration::ZERO);
        assert!(frozen.validate().is_err());
    }

    #[test]
    fn test_cache_settings_defaults() {
        let settings = CacheSettings::for_name("test-only-cache", Duration::from_secs(30), 50);

        assert_eq!(settings.name, "test-only-cache");
        assert_eq!(settings.ttl, Duration::from_secs(30));
        assert_eq!(settings.max_entries, 50);
    }
}
