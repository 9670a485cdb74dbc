//! # Configuration Module
//!
//! 서비스 설정을 환경 변수 기반으로 중앙집중식 관리합니다.
//! `.env.dev` / `.env.prod` 파일은 `main`에서 `PROFILE`에 따라 로드됩니다.
//!
//! ## 모듈 구성
//!
//! - [`data_config`] - 실행 환경, HTTP 서버, MongoDB 설정
//! - [`security_config`] - 암호화, Redis, 레이트 리미터 버킷, 로컬 캐시 설정
//! - [`pipeline_config`] - 배치 파이프라인, 스트림 브로커 설정
//!
//! ## 원칙
//!
//! - 민감한 정보는 환경 변수로만 제공되며 `Debug` 출력에서 가려집니다.
//! - 일반 값의 파싱 실패는 경고 로그와 함께 기본값으로 대체됩니다.
//! - 보안에 영향을 주는 설정(암호화 방식, 패스프레이즈, 버킷)은 잘못되면 기동을 중단합니다.

pub mod data_config;
pub mod pipeline_config;
pub mod security_config;

pub use data_config::*;
pub use pipeline_config::*;
pub use security_config::*;

use std::env;
use std::str::FromStr;

use log::warn;

/// 환경 변수를 읽어 파싱하고, 없거나 잘못된 경우 기본값을 사용합니다.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("{} 파싱 실패: {}. 기본값 {} 사용", key, e, default);
            default
        }),
        Err(_) => default,
    }
}
