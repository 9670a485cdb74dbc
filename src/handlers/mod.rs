//! # HTTP 요청 핸들러
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//!   Handlers (이 모듈) - HTTP 엔드포인트 처리
//! ├─────────────────────────────────────────────┤
//!   CredentialRepository - 캐시 우선 읽기 전용 조회
//! ├─────────────────────────────────────────────┤
//!   CredentialStore - MongoDB
//! └─────────────────────────────────────────────┘
//! ```
//!
//! 핸들러는 `web::Data`로 주입된 리포지토리만 사용하며, 에러는 [`AppError`](crate::errors::AppError)로
//! 반환해 `ResponseError` 구현이 JSON 응답으로 바꾸게 합니다.

pub mod clients;
