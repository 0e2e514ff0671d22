//! # Neo Core
//!
//! 실시간 시세 세션의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 세션 전반에서 사용되는 기본 타입을 제공합니다:
//! - 정규화된 시세 틱과 캔들
//! - 매매 신호와 지표 스냅샷
//! - 거래소 세그먼트와 스크립 키
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
