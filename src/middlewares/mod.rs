//! 미들웨어 모듈
//!
//! # 제공 미들웨어
//!
//! ### 레이트 리밋 미들웨어 (RateLimitMiddleware)
//! - Redis 토큰 버킷에서 요청마다 토큰 하나 소비
//! - 모든 응답에 `X-Ratelimit-Limit`, `X-Ratelimit-Remaining`, `X-Ratelimit-Reset` 헤더 추가
//! - 토큰이 없으면 429, 리미터를 사용할 수 없으면 500
//!
//! # 사용 방법
//!
//! ```rust,ignore
//! use actix_web::{web, App};
//! use crate::middlewares::RateLimitMiddleware;
//!
//! App::new()
//!     .service(
//!         web::scope("/api/v1/clients")
//!             .wrap(RateLimitMiddleware::new(limiter, "client-lookup"))
//!             .service(get_client)
//!     )
//!     .service(health_check)
//! ```

pub mod rate_limit_middleware;
mod rate_limit_inner;

pub use rate_limit_middleware::RateLimitMiddleware;
