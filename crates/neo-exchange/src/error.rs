//! 세션 및 백엔드 에러 타입.

use thiserror::Error;

/// 세션/백엔드 관련 에러.
///
/// 소켓 경계 밖으로는 이벤트로만 전달되므로 `Clone`이 가능해야 합니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 소켓 연결 끊김
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// 인증 거부 또는 인증 중 연결 종료
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 재연결 시도 소진
    #[error("Retry exhausted after {attempts} attempts, cooling down for {cooldown_secs}s")]
    RetryExhausted { attempts: u32, cooldown_secs: u64 },

    /// 현재 상태에서 허용되지 않는 호출
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 백엔드 API 에러
    #[error("API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// WebSocket 에러
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// 타임아웃
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 세션 태스크 종료
    #[error("Session closed")]
    SessionClosed,
}

impl ExchangeError {
    /// 재연결 정책을 적용할 전송 계층 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::NetworkError(_)
                | ExchangeError::Disconnected(_)
                | ExchangeError::WebSocket(_)
                | ExchangeError::Timeout(_)
        )
    }

    /// 권장 재시도 대기 시간(밀리초) 반환.
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            ExchangeError::NetworkError(_) => Some(1000),
            ExchangeError::Disconnected(_) => Some(5000),
            ExchangeError::WebSocket(_) => Some(2000),
            ExchangeError::Timeout(_) => Some(500),
            ExchangeError::RetryExhausted { cooldown_secs, .. } => Some(cooldown_secs * 1000),
            _ => None,
        }
    }

    /// 인증 에러인지 확인.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ExchangeError::Unauthorized(_))
    }

    /// 호출 계약 위반 등 복구하면 안 되는 에러인지 확인.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExchangeError::InvalidState(_) | ExchangeError::SessionClosed
        )
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() {
            ExchangeError::NetworkError(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ExchangeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ExchangeError::WebSocket(err.to_string())
    }
}
