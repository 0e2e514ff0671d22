//! 백엔드 REST 협력 서비스.
//!
//! 자금 조회, 주문 제출, 관심종목, 매매 기록 전송을 담당합니다. 로그인/OTP 흐름은
//! 이 크레이트가 다루지 않습니다.

mod client;
mod traits;
mod types;

pub use client::BackendClient;
pub use traits::{FundsService, OrderService, TradeLogSink, WatchlistService};
pub use types::*;
