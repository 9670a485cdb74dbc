//! # 등록 클라이언트 조회 핸들러
//!
//! | 메서드 | 경로 | 설명 | 상태 코드 |
//! |--------|------|------|-----------|
//! | `GET` | `/api/v1/clients/{client_id}` | 클라이언트 메타데이터 조회 | 200 OK / 404 Not Found |
//!
//! 응답에는 비밀값이 포함되지 않습니다. 비밀값 존재 여부와 만료 여부만 내려갑니다.

use actix_web::{HttpResponse, get, web};
use log::debug;

use crate::errors::AppError;
use crate::repositories::CredentialRepository;

/// `client_id`로 등록 클라이언트 요약을 조회합니다.
///
/// ```bash
/// curl http://localhost:8080/api/v1/clients/web-portal
/// ```
#[get("/{client_id}")]
pub async fn get_client(
    client_id: web::Path<String>,
    repository: web::Data<CredentialRepository>,
) -> Result<HttpResponse, AppError> {
    let client_id = client_id.into_inner();
    debug!("클라이언트 조회 - client_id: {}", client_id);

    let client = repository
        .find_by_client_id(&client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("등록되지 않은 클라이언트입니다: {}", client_id)))?;

    Ok(HttpResponse::Ok().json(client.summary()))
}
