//! # Neo Strategy
//!
//! 지표 스냅샷과 마감 캔들로 매매 신호를 만드는 상태 머신과 심볼별 신호 엔진입니다.
//!
//! - [`trend`]: SMA/ATR/RSI 돌파 진입, 목표가 및 트레일링 스탑 청산
//! - [`quote`]: 변동성/호가 불균형 기반 호가 제시
//! - [`engine`]: 세션 시세 이벤트 → 심볼별 상태 → 신호/호가 이벤트
//! - [`trade_log`]: 신호별 매매 기록 비동기 전송

pub mod engine;
pub mod policy;
pub mod position;
pub mod quote;
pub mod trade_log;
pub mod trend;

pub use engine::{EngineError, EngineEvent, EngineStats, SignalEngine};
pub use policy::{candle_policy, TradeWindow, TrendPolicy};
pub use position::PositionState;
pub use quote::{imbalance, QuoteBook, VolatilityQuoter};
pub use trade_log::{format_trade_message, local_stamp, TradeLogError, TradeLogger};
pub use trend::{Decision, TrendEvaluator};
