//! 세션 공통 에러 타입.
//!
//! 크레이트 경계를 넘나드는 설정/입력/직렬화 에러를 정의합니다.
//! 전송 계층 에러는 `neo-exchange`의 `ExchangeError`가 담당합니다.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum NeoError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력 (스크립 키, 세그먼트 등)
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 인증 에러
    #[error("인증 에러: {0}")]
    Auth(String),

    /// 전략 에러
    #[error("전략 에러: {0}")]
    Strategy(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type NeoResult<T> = Result<T, NeoError>;

impl NeoError {
    /// 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NeoError::Network(_))
    }

    /// 치명적인 에러인지 확인합니다.
    pub fn is_critical(&self) -> bool {
        matches!(self, NeoError::Auth(_) | NeoError::Config(_))
    }
}

impl From<serde_json::Error> for NeoError {
    fn from(err: serde_json::Error) -> Self {
        NeoError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for NeoError {
    fn from(err: config::ConfigError) -> Self {
        NeoError::Config(err.to_string())
    }
}
