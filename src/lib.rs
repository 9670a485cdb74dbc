//! 인증 서버 자격증명 · 이벤트 영속화 서비스
//!
//! OAuth2 인가 서버의 쓰기 작업(클라이언트, 인가, 동의, 감사 이벤트)을 브로커로 받아
//! 배치로 MongoDB에 기록하고, 등록 클라이언트를 캐시 우선으로 읽어 제공합니다.
//!
//! # Features
//!
//! - **배치 영속화**: 엔티티별 수집기 + 주기 커미터, 메시지마다 정확히 한 번 ack/nack
//! - **봉투 암호화**: 클라이언트 비밀값은 AES-GCM 봉투로 저장
//! - **읽기 전용 자격증명 캐시**: TTL 캐시 두 개 (id, client_id)
//! - **분산 레이트 리밋**: Redis 토큰 버킷
//! - **Redis Streams**: 소비자 그룹, 전달 한도, 데드레터 스트림
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐        ┌─────────────────┐
//! │  Redis Streams  │        │   HTTP Routes   │ ← /health, /api/v1/clients
//! └─────────────────┘        └─────────────────┘
//!          │                          │
//!          ▼                          ▼
//! ┌─────────────────┐        ┌─────────────────┐
//! │    Pipeline     │        │   RateLimit MW  │ ← Redis 토큰 버킷
//! └─────────────────┘        └─────────────────┘
//!          │                          │
//!          ▼                          ▼
//! ┌─────────────────┐        ┌─────────────────┐
//! │ PersistencePort │        │ CredentialRepo  │ ← TTL 캐시 + 복호화
//! └─────────────────┘        └─────────────────┘
//!          │                          │
//!          └────────────┬─────────────┘
//!                       ▼
//!              ┌─────────────────┐
//!              │     MongoDB     │
//!              └─────────────────┘
//! ```

pub mod broker;
pub mod caching;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod middlewares;
pub mod pipeline;
pub mod repositories;
pub mod routes;
pub mod security;

#[cfg(test)]
pub(crate) mod testing;
