//! RateLimitMiddleware 판정 로직
use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, forward_ready};
use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};
use actix_web::{Error, ResponseError};
use futures_util::future::LocalBoxFuture;

use crate::errors::AppError;
use crate::security::rate_limit::{DistributedRateLimiter, RateLimitDecision};

const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// 버킷에서 토큰을 소비하고 통과 여부를 결정하는 서비스
pub struct RateLimitMiddlewareService<S> {
    pub service: Rc<S>,
    pub limiter: Arc<DistributedRateLimiter>,
    pub bucket: Rc<str>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, actix_web::Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let limiter = self.limiter.clone();
        let bucket = self.bucket.clone();

        Box::pin(async move {
            let decision = match limiter.try_acquire(&bucket).await {
                Ok(decision) => decision,
                Err(e) => {
                    // 판정할 수 없으면 통과시키지 않는다
                    log::error!("레이트 리미터 사용 불가, 요청 거부 - bucket: {}, path: {}", bucket, req.path());
                    let response = AppError::from(e).error_response();
                    let (req, _) = req.into_parts();
                    return Ok(ServiceResponse::new(req, response).map_into_right_body());
                }
            };

            if !decision.allowed {
                log::warn!(
                    "레이트 리밋 초과 - bucket: {}, path: {}, reset: {}s",
                    bucket,
                    req.path(),
                    decision.reset_seconds
                );
                let mut response = AppError::RateLimitExceeded {
                    reset_seconds: decision.reset_seconds,
                }
                .error_response();
                insert_headers(response.headers_mut(), &decision);
                let (req, _) = req.into_parts();
                return Ok(ServiceResponse::new(req, response).map_into_right_body());
            }

            let mut res = service.call(req).await?;
            insert_headers(res.headers_mut(), &decision);
            Ok(res.map_into_left_body())
        })
    }
}

fn insert_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));
    headers.insert(RESET_HEADER, HeaderValue::from(decision.reset_seconds));
}
