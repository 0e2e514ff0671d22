//! # Neo Analytics
//!
//! 심볼별 캔들 집계와 기술적 지표 계산을 제공합니다.
//!
//! - [`candles`]: 틱 버퍼 → 캔들 히스토리 (틱 수 또는 시간 구간 마감)
//! - [`indicators`]: SMA, ATR, RSI, 상대 변동성
//!
//! 지표는 캔들 슬라이스에 대한 순수 함수이며, 히스토리가 부족하면 `None`을 반환합니다.

pub mod candles;
pub mod indicators;

pub use candles::{CandleAggregator, CandlePolicy, SymbolSeries};
pub use indicators::{
    atr, ewma_volatility, relative_volatility, rsi, sma, sma_volume, IndicatorError,
    IndicatorParams, IndicatorPipeline, IndicatorResult,
};
