//! API 라우트 설정 모듈
//!
//! # 라우트
//!
//! - `GET /health` - 헬스체크 (레이트 리밋 없음)
//! - `GET /api/v1/clients/{client_id}` - 등록 클라이언트 조회 (레이트 리밋 적용)
//!
//! # Examples
//!
//! ```rust,ignore
//! let gate = RateLimitMiddleware::new(limiter.clone(), "client-lookup");
//! App::new()
//!     .app_data(repository.clone())
//!     .configure(|cfg| configure_all_routes(cfg, gate.clone()))
//! ```

use actix_web::web;
use serde_json::json;

use crate::handlers;
use crate::middlewares::RateLimitMiddleware;

/// 모든 라우트를 설정합니다
///
/// 클라이언트 조회 스코프는 `gate`가 지정한 버킷으로 제한됩니다.
pub fn configure_all_routes(cfg: &mut web::ServiceConfig, gate: RateLimitMiddleware) {
    cfg.service(health_check);

    configure_client_routes(cfg, gate);
}

/// 등록 클라이언트 조회 라우트
///
/// ```bash
/// curl -i http://localhost:8080/api/v1/clients/web-portal
/// # X-Ratelimit-Limit: 100
/// # X-Ratelimit-Remaining: 99
/// # X-Ratelimit-Reset: 60
/// ```
fn configure_client_routes(cfg: &mut web::ServiceConfig, gate: RateLimitMiddleware) {
    cfg.service(
        web::scope("/api/v1/clients")
            .wrap(gate)
            .service(handlers::clients::get_client),
    );
}

/// 헬스체크 엔드포인트
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "service": "auth_persistence_service",
///   "version": "0.1.0",
///   "timestamp": "2024-01-01T00:00:00Z"
/// }
/// ```
#[actix_web::get("/health")]
async fn health_check() -> actix_web::HttpResponse {
    actix_web::HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
