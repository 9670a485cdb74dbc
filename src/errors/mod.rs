//! 에러 타입 모음

pub mod errors;

pub use errors::*;
