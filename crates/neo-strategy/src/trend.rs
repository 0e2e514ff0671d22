//! 추세 돌파 신호 상태 머신.
//!
//! 마감된 캔들마다 다음 순서로 평가합니다:
//!
//! 1. 진입: BUY 조건, 그다음 SELL 조건 (정책이 허용할 때)
//! 2. 목표가 청산
//! 3. 트레일링 스탑 갱신 및 청산
//!
//! 지표가 하나라도 계산되지 않았거나 거래 시간대 밖이면 신호를 내지 않습니다.

use rust_decimal::Decimal;
use tracing::{debug, info};

use neo_analytics::{IndicatorPipeline, IndicatorResult};
use neo_core::{Candle, ExitKind, IndicatorSnapshot, PositionSide, Signal, SignalAction};

use crate::policy::TrendPolicy;
use crate::position::PositionState;

/// BUY 진입 사유.
pub const BUY_REASON: &str = "SMA20>SMA50 + ATR breakout + RSI + Volume confirm";
/// SELL 진입 사유.
pub const SELL_REASON: &str = "SMA20<SMA50 + ATR breakdown + RSI + Volume confirm";
/// 목표가 청산 사유.
pub const TARGET_REASON: &str = "target hit";
/// 트레일링 스탑 청산 사유.
pub const TRAILING_REASON: &str = "trailing stop hit";

/// 한 캔들에 대한 평가 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// 최종 액션
    pub action: SignalAction,
    /// 사유
    pub reason: &'static str,
    /// 청산 정보 (사유, 실현 손익)
    pub exit: Option<(ExitKind, Decimal)>,
}

impl Decision {
    fn hold() -> Self {
        Self {
            action: SignalAction::Hold,
            reason: "",
            exit: None,
        }
    }
}

/// 추세 신호 평가기.
///
/// 상태를 갖지 않으며, 심볼별 [`PositionState`]를 인자로 받아 변경합니다.
#[derive(Debug, Clone)]
pub struct TrendEvaluator {
    policy: TrendPolicy,
    pipeline: IndicatorPipeline,
}

impl TrendEvaluator {
    /// 새 평가기 생성. 지표 기간이 0이면 에러.
    pub fn new(policy: TrendPolicy) -> IndicatorResult<Self> {
        let pipeline = IndicatorPipeline::new(policy.indicators)?;
        Ok(Self { policy, pipeline })
    }

    /// 정책.
    pub fn policy(&self) -> &TrendPolicy {
        &self.policy
    }

    /// 캔들 히스토리의 마지막 캔들을 평가해 신호를 만듭니다.
    ///
    /// 지표가 준비되지 않았거나 거래 시간대 밖이면 `None`입니다.
    pub fn evaluate(
        &self,
        symbol: &str,
        name: &str,
        candles: &[Candle],
        state: &mut PositionState,
    ) -> Option<Signal> {
        let candle = candles.last()?;
        let snapshot = self.pipeline.snapshot(candles);
        if !snapshot.is_complete() {
            debug!(symbol, candles = candles.len(), "지표 준비 중");
            return None;
        }

        if let Some(window) = &self.policy.trade_window {
            if !window.contains(candle.timestamp) {
                debug!(symbol, "거래 시간대 밖");
                return None;
            }
        }

        let decision = self.step(state, candle, &snapshot);

        let mut signal = Signal::new(symbol, decision.action, candle.close, candle.timestamp)
            .with_name(name)
            .with_reason(decision.reason)
            .with_indicators(snapshot)
            .with_position(state.side, state.trailing_stop, state.target);
        if let Some((kind, pnl)) = decision.exit {
            signal = signal.with_exit(kind, pnl);
        }

        if signal.is_actionable() {
            info!(
                symbol,
                action = %signal.action,
                price = %signal.price,
                reason = %signal.reason,
                "신호 발생"
            );
        }
        Some(signal)
    }

    /// 지표 스냅샷과 마감 캔들로 상태를 한 단계 전이합니다.
    pub fn step(
        &self,
        state: &mut PositionState,
        candle: &Candle,
        snapshot: &IndicatorSnapshot,
    ) -> Decision {
        let p = &self.policy;
        let close = candle.close;
        let mut decision = Decision::hold();

        // ATR이 0이면 진입/트레일링 모두 건너뜀
        let atr = snapshot.atr.filter(|a| *a > Decimal::ZERO);

        if let (Some(sma_s), Some(sma_l), Some(atr), Some(rsi), Some(avg_volume)) = (
            snapshot.sma_short,
            snapshot.sma_long,
            atr,
            snapshot.rsi,
            snapshot.volume_average,
        ) {
            let threshold = p.entry_atr_multiplier * atr;
            let volume_ok = candle.volume > avg_volume;

            if sma_s > sma_l
                && close > sma_s + threshold
                && rsi > p.rsi_upper
                && volume_ok
                && state.side != PositionSide::Long
                && state.buy_entries < p.reentry_cap
            {
                let stop = close - p.stop_atr_multiplier * atr;
                let target = p.target_atr_multiplier.map(|n| close + n * atr);
                state.open_long(close, stop, target);
                decision.action = SignalAction::Buy;
                decision.reason = BUY_REASON;
            } else if p.allow_short
                && sma_s < sma_l
                && close < sma_s - threshold
                && rsi < p.rsi_lower
                && volume_ok
                && state.side != PositionSide::Short
                && state.sell_entries < p.reentry_cap
            {
                let stop = close + p.stop_atr_multiplier * atr;
                let target = p.target_atr_multiplier.map(|n| close - n * atr);
                state.open_short(close, stop, target);
                decision.action = SignalAction::Sell;
                decision.reason = SELL_REASON;
            }
        }

        if state.target_hit(close) {
            let pnl = state.close(close, p.contract_size);
            decision = Decision {
                action: SignalAction::Exit,
                reason: TARGET_REASON,
                exit: Some((ExitKind::Target, pnl)),
            };
        }

        if let Some(atr) = atr {
            let candidate = match state.side {
                PositionSide::Long => Some(close - p.stop_atr_multiplier * atr),
                PositionSide::Short => Some(close + p.stop_atr_multiplier * atr),
                PositionSide::Flat => None,
            };
            if let Some(candidate) = candidate {
                state.ratchet_stop(candidate);
                if state.stop_hit(close) {
                    let pnl = state.close(close, p.contract_size);
                    decision = Decision {
                        action: SignalAction::Exit,
                        reason: TRAILING_REASON,
                        exit: Some((ExitKind::TrailingStop, pnl)),
                    };
                }
            }
        }

        decision
    }
}
