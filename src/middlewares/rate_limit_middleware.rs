//! 분산 레이트 리밋 미들웨어
//!
//! 스코프에 씌우면 요청마다 지정한 버킷에서 토큰 하나를 소비합니다.

use std::future::{Ready, ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    Error, Result,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
};

use crate::middlewares::rate_limit_inner::RateLimitMiddlewareService;
use crate::security::rate_limit::DistributedRateLimiter;

/// 레이트 리밋 미들웨어
///
/// ```rust,ignore
/// web::scope("/api/v1/clients")
///     .wrap(RateLimitMiddleware::new(limiter.clone(), "client-lookup"))
///     .service(get_client)
/// ```
#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Arc<DistributedRateLimiter>,
    bucket: String,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<DistributedRateLimiter>, bucket: impl Into<String>) -> Self {
        Self {
            limiter,
            bucket: bucket.into(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            bucket: Rc::from(self.bucket.as_str()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use actix_web::{App, HttpResponse, http::StatusCode, test, web};

    use crate::config::BucketSettings;
    use crate::testing::InMemoryBucketStore;

    fn gate(capacity: u64, store: Arc<InMemoryBucketStore>) -> RateLimitMiddleware {
        let limiter = DistributedRateLimiter::new(
            store,
            vec![BucketSettings::new("client-lookup", capacity, capacity, Duration::from_secs(60))],
        );
        RateLimitMiddleware::new(Arc::new(limiter), "client-lookup")
    }

    fn header<B>(res: &ServiceResponse<B>, name: &str) -> Option<String> {
        res.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    #[actix_web::test]
    async fn test_allows_until_exhausted_then_429() {
        let app = test::init_service(
            App::new().service(
                web::scope("/limited")
                    .wrap(gate(2, Arc::new(InMemoryBucketStore::new())))
                    .route("", web::get().to(HttpResponse::Ok)),
            ),
        )
        .await;

        let first = test::call_service(&app, test::TestRequest::get().uri("/limited").to_request()).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(header(&first, "x-ratelimit-limit").as_deref(), Some("2"));
        assert_eq!(header(&first, "x-ratelimit-remaining").as_deref(), Some("1"));
        assert_eq!(header(&first, "x-ratelimit-reset").as_deref(), Some("60"));

        let second = test::call_service(&app, test::TestRequest::get().uri("/limited").to_request()).await;
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(header(&second, "x-ratelimit-remaining").as_deref(), Some("0"));

        let third = test::call_service(&app, test::TestRequest::get().uri("/limited").to_request()).await;
        assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&third, "x-ratelimit-remaining").as_deref(), Some("0"));
        assert!(header(&third, "x-ratelimit-reset").is_some());
    }

    #[actix_web::test]
    async fn test_store_failure_fails_closed() {
        let store = Arc::new(InMemoryBucketStore::new());
        store.set_unavailable(true);
        let app = test::init_service(
            App::new().service(
                web::scope("/limited")
                    .wrap(gate(10, store))
                    .route("", web::get().to(HttpResponse::Ok)),
            ),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/limited").to_request()).await;

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(header(&res, "x-ratelimit-limit").is_none());
    }

    #[actix_web::test]
    async fn test_unwrapped_routes_are_not_limited() {
        let app = test::init_service(
            App::new()
                .service(
                    web::scope("/limited")
                        .wrap(gate(1, Arc::new(InMemoryBucketStore::new())))
                        .route("", web::get().to(HttpResponse::Ok)),
                )
                .route("/open", web::get().to(HttpResponse::Ok)),
        )
        .await;

        for _ in 0..3 {
            let res = test::call_service(&app, test::TestRequest::get().uri("/open").to_request()).await;
            assert_eq!(res.status(), StatusCode::OK);
        }
    }
}
