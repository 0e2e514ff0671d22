//! 추세 엔진 정책.
//!
//! 엔진 종류별 프리셋([`TrendPolicy::trend_target`], [`TrendPolicy::trend_window`])에
//! 설정 파일의 재정의 값을 덮어써서 최종 정책을 만듭니다.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use neo_analytics::{CandlePolicy, IndicatorParams};
use neo_core::{CandleConfig, CandleClose, EngineKind, TrendOverrides, VolumeSource};

/// 거래 허용 시간대 (거래소 현지 시각, 분 단위 포함 범위).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeWindow {
    /// 시작 (시, 분)
    pub start: (u32, u32),
    /// 종료 (시, 분), 해당 분 전체 포함
    pub end: (u32, u32),
    /// 거래소 시간대
    pub tz: Tz,
}

impl TradeWindow {
    /// 인도 정규장 09:30 ~ 15:10 (Asia/Kolkata).
    pub fn nse_regular() -> Self {
        Self {
            start: (9, 30),
            end: (15, 10),
            tz: chrono_tz::Asia::Kolkata,
        }
    }

    /// 주어진 시각이 시간대 안에 있는지 확인합니다.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.tz);
        let minute_of_day = local.hour() * 60 + local.minute();
        let start = self.start.0 * 60 + self.start.1;
        let end = self.end.0 * 60 + self.end.1;
        minute_of_day >= start && minute_of_day <= end
    }
}

/// 추세 엔진 정책.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPolicy {
    /// 지표 기간
    pub indicators: IndicatorParams,
    /// 진입 임계값 ATR 배수 (k)
    pub entry_atr_multiplier: Decimal,
    /// 트레일링 스탑 ATR 배수 (m)
    pub stop_atr_multiplier: Decimal,
    /// 목표가 ATR 배수 (n), `None`이면 목표가 청산 없음
    pub target_atr_multiplier: Option<Decimal>,
    /// BUY 진입 RSI 하한
    pub rsi_upper: Decimal,
    /// SELL 진입 RSI 상한
    pub rsi_lower: Decimal,
    /// 방향별 재진입 한도
    pub reentry_cap: u32,
    /// 계약 단위 (손익 계산)
    pub contract_size: Decimal,
    /// SELL 진입 허용
    pub allow_short: bool,
    /// 거래 허용 시간대
    pub trade_window: Option<TradeWindow>,
}

impl TrendPolicy {
    /// 목표가 청산 프리셋 (SELL 비활성, 시간대 제한 없음).
    pub fn trend_target() -> Self {
        Self {
            indicators: IndicatorParams::default(),
            entry_atr_multiplier: dec!(1.2),
            stop_atr_multiplier: dec!(1.5),
            target_atr_multiplier: Some(dec!(4)),
            rsi_upper: dec!(55),
            rsi_lower: dec!(45),
            reentry_cap: 2,
            contract_size: dec!(50),
            allow_short: false,
            trade_window: None,
        }
    }

    /// 시간대 제한 프리셋 (SELL 활성, 목표가 없음).
    pub fn trend_window() -> Self {
        Self {
            target_atr_multiplier: None,
            allow_short: true,
            trade_window: Some(TradeWindow::nse_regular()),
            ..Self::trend_target()
        }
    }

    /// 엔진 종류에 맞는 프리셋. 호가 엔진은 추세 정책이 없습니다.
    pub fn preset(kind: EngineKind) -> Option<Self> {
        match kind {
            EngineKind::TrendTarget => Some(Self::trend_target()),
            EngineKind::TrendWindow => Some(Self::trend_window()),
            EngineKind::VolatilityQuote => None,
        }
    }

    /// 설정 값으로 프리셋을 덮어씁니다.
    pub fn with_overrides(mut self, o: &TrendOverrides) -> Self {
        let p = &mut self.indicators;
        if let Some(v) = o.sma_short {
            p.sma_short = v;
        }
        if let Some(v) = o.sma_long {
            p.sma_long = v;
        }
        if let Some(v) = o.atr_period {
            p.atr_period = v;
        }
        if let Some(v) = o.rsi_period {
            p.rsi_period = v;
        }
        if let Some(v) = o.volume_period {
            p.volume_period = v;
        }

        if let Some(v) = o.entry_atr_multiplier {
            self.entry_atr_multiplier = v;
        }
        if let Some(v) = o.stop_atr_multiplier {
            self.stop_atr_multiplier = v;
        }
        if let Some(v) = o.target_atr_multiplier {
            self.target_atr_multiplier = Some(v);
        }
        if o.disable_target == Some(true) {
            self.target_atr_multiplier = None;
        }
        if let Some(v) = o.rsi_upper {
            self.rsi_upper = v;
        }
        if let Some(v) = o.rsi_lower {
            self.rsi_lower = v;
        }
        if let Some(v) = o.reentry_cap {
            self.reentry_cap = v;
        }
        if let Some(v) = o.contract_size {
            self.contract_size = v;
        }
        if let Some(v) = o.allow_short {
            self.allow_short = v;
        }
        if o.disable_trade_window == Some(true) {
            self.trade_window = None;
        }
        self
    }
}

/// 엔진 종류별 캔들 프리셋에 설정 값을 덮어씁니다.
///
/// - `trend_target`, `volatility_quote`: 틱 1개 캔들, 마지막 틱 거래량
/// - `trend_window`: 틱 60개 캔들, 거래량 = 틱 수 × 10
pub fn candle_policy(kind: EngineKind, config: &CandleConfig) -> CandlePolicy {
    let (close, volume) = match kind {
        EngineKind::TrendWindow => (
            CandleClose::Ticks { count: 60 },
            VolumeSource::TickCount { multiplier: 10 },
        ),
        EngineKind::TrendTarget | EngineKind::VolatilityQuote => {
            (CandleClose::Ticks { count: 1 }, VolumeSource::LastTick)
        }
    };

    CandlePolicy {
        close: config.close.unwrap_or(close),
        volume: config.volume.unwrap_or(volume),
        history_cap: config.history_cap.max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_presets() {
        let target = TrendPolicy::trend_target();
        assert_eq!(target.target_atr_multiplier, Some(dec!(4)));
        assert!(!target.allow_short);
        assert!(target.trade_window.is_none());
        assert_eq!(target.contract_size, dec!(50));

        let window = TrendPolicy::trend_window();
        assert_eq!(window.target_atr_multiplier, None);
        assert!(window.allow_short);
        assert_eq!(window.entry_atr_multiplier, dec!(1.2));
        assert!(TrendPolicy::preset(EngineKind::VolatilityQuote).is_none());
    }

    #[test]
    fn test_overrides() {
        let overrides = TrendOverrides {
            sma_short: Some(5),
            sma_long: Some(20),
            entry_atr_multiplier: Some(dec!(2)),
            disable_target: Some(true),
            allow_short: Some(true),
            ..TrendOverrides::default()
        };
        let policy = TrendPolicy::trend_target().with_overrides(&overrides);

        assert_eq!(policy.indicators.sma_short, 5);
        assert_eq!(policy.indicators.sma_long, 20);
        assert_eq!(policy.indicators.atr_period, 14);
        assert_eq!(policy.entry_atr_multiplier, dec!(2));
        assert_eq!(policy.target_atr_multiplier, None);
        assert!(policy.allow_short);
    }

    #[test]
    fn test_trade_window_in_kolkata_time() {
        let window = TradeWindow::nse_regular();
        // IST = UTC + 5:30
        let at = |h, m| Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap();

        assert!(!window.contains(at(3, 59))); // 09:29 IST
        assert!(window.contains(at(4, 0))); // 09:30 IST
        assert!(window.contains(at(9, 40))); // 15:10 IST
        assert!(!window.contains(at(9, 41))); // 15:11 IST
    }

    #[test]
    fn test_candle_policy_presets() {
        let config = CandleConfig::default();
        let target = candle_policy(EngineKind::TrendTarget, &config);
        assert_eq!(target.close, CandleClose::Ticks { count: 1 });
        assert_eq!(target.volume, VolumeSource::LastTick);

        let window = candle_policy(EngineKind::TrendWindow, &config);
        assert_eq!(window.close, CandleClose::Ticks { count: 60 });
        assert_eq!(window.volume, VolumeSource::TickCount { multiplier: 10 });
        assert_eq!(window.history_cap, 200);

        let custom = CandleConfig {
            close: Some(CandleClose::Interval { secs: 60 }),
            ..CandleConfig::default()
        };
        let policy = candle_policy(EngineKind::TrendWindow, &custom);
        assert_eq!(policy.close, CandleClose::Interval { secs: 60 });
        assert_eq!(policy.volume, VolumeSource::TickCount { multiplier: 10 });
    }
}
