//! 시세 세션과 신호 엔진의 도메인 모델.

mod candle;
mod quote;
mod signal;
mod tick;

pub use candle::*;
pub use quote::*;
pub use signal::*;
pub use tick::*;
