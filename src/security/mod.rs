//! 보안 관련 모듈
//!
//! - [`cipher`]: 자격증명 비밀값 봉투 암호화
//! - [`rate_limit`]: Redis 기반 분산 레이트 리미터

pub mod cipher;
pub mod rate_limit;

pub use cipher::{AesGcmCipher, NoopCipher, SecretCipher, build_cipher};
pub use rate_limit::{
    BucketSnapshot, BucketStore, DistributedRateLimiter, RateLimitDecision, RedisBucketStore,
};
