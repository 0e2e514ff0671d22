//! 기술적 지표 모듈.
//!
//! 모든 지표는 캔들 히스토리(과거 → 최신 순) 슬라이스에 대한 순수 함수입니다.
//! 히스토리가 부족하거나 계산 중 오버플로가 나면 에러가 아니라 `Ok(None)`("아직 계산 불가")을
//! 반환합니다.
//!
//! # 지원 지표
//!
//! ## 추세 지표
//! - **SMA**: 단순 이동평균 (종가, 거래량)
//!
//! ## 모멘텀 지표
//! - **RSI**: 상대강도지수 (손실 합이 0이면 1로 둠)
//!
//! ## 변동성 지표
//! - **ATR**: 평균 실제 범위
//! - **상대 변동성**: 표준편차 / 평균, 단순 또는 지수 가중

pub mod momentum;
pub mod trend;
pub mod volatility;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use neo_core::{Candle, IndicatorSnapshot};

pub use momentum::rsi;
pub use trend::{sma, sma_volume};
pub use volatility::{atr, ewma_volatility, relative_volatility};

/// 지표 계산 오류.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    /// 잘못된 파라미터
    #[error("잘못된 파라미터: {0}")]
    InvalidParameter(String),
}

/// 지표 계산 결과 타입.
pub type IndicatorResult<T> = Result<T, IndicatorError>;

pub(crate) fn validate_period(name: &str, period: usize) -> IndicatorResult<()> {
    if period == 0 {
        return Err(IndicatorError::InvalidParameter(format!(
            "{} period must be greater than 0",
            name
        )));
    }
    Ok(())
}

/// 오버플로 시 `None`을 반환하는 합계.
pub(crate) fn checked_sum<I>(values: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

/// 지표 기간 설정.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorParams {
    /// 단기 SMA 기간
    pub sma_short: usize,
    /// 장기 SMA 기간
    pub sma_long: usize,
    /// ATR 기간
    pub atr_period: usize,
    /// RSI 기간
    pub rsi_period: usize,
    /// 거래량 평균 기간
    pub volume_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            sma_short: 20,
            sma_long: 50,
            atr_period: 14,
            rsi_period: 14,
            volume_period: 20,
        }
    }
}

impl IndicatorParams {
    /// 모든 지표가 정의되기 위해 필요한 최소 캔들 수.
    pub fn warmup(&self) -> usize {
        self.sma_short
            .max(self.sma_long)
            .max(self.atr_period + 1)
            .max(self.rsi_period + 1)
            .max(self.volume_period)
    }

    /// 기간 값 검증.
    pub fn validate(&self) -> IndicatorResult<()> {
        validate_period("sma_short", self.sma_short)?;
        validate_period("sma_long", self.sma_long)?;
        validate_period("atr", self.atr_period)?;
        validate_period("rsi", self.rsi_period)?;
        validate_period("volume", self.volume_period)
    }
}

/// 캔들 히스토리 → 지표 스냅샷.
#[derive(Debug, Clone, Default)]
pub struct IndicatorPipeline {
    params: IndicatorParams,
}

impl IndicatorPipeline {
    /// 새 파이프라인 생성. 기간이 0이면 에러.
    pub fn new(params: IndicatorParams) -> IndicatorResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// 기간 설정.
    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// 현재 히스토리에 대한 지표 스냅샷.
    ///
    /// 각 지표는 독립적으로 계산되므로 일부만 채워진 스냅샷이 나올 수 있습니다.
    pub fn snapshot(&self, candles: &[Candle]) -> IndicatorSnapshot {
        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        let p = &self.params;

        // 기간은 생성 시 검증되었으므로 에러는 발생하지 않음
        IndicatorSnapshot {
            sma_short: sma(&closes, p.sma_short).ok().flatten(),
            sma_long: sma(&closes, p.sma_long).ok().flatten(),
            atr: atr(candles, p.atr_period).ok().flatten(),
            rsi: rsi(&closes, p.rsi_period).ok().flatten(),
            volume_average: sma_volume(candles, p.volume_period).ok().flatten(),
        }
    }
}
