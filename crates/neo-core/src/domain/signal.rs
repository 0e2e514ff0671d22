//! 신호 엔진이 생성하는 매매 신호.
//!
//! 이 모듈은 신호 관련 타입을 정의합니다:
//! - `SignalAction` - BUY/SELL/EXIT/HOLD
//! - `PositionSide` - 심볼별 포지션 상태
//! - `IndicatorSnapshot` - 신호 시점의 지표 값
//! - `Signal` - 발행 후 변경되지 않는 신호 이벤트

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 신호 액션.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalAction {
    /// 롱 진입
    Buy,
    /// 숏 진입
    Sell,
    /// 포지션 청산
    Exit,
    /// 유지
    Hold,
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "BUY"),
            SignalAction::Sell => write!(f, "SELL"),
            SignalAction::Exit => write!(f, "EXIT"),
            SignalAction::Hold => write!(f, "HOLD"),
        }
    }
}

/// 심볼별 포지션 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    /// 포지션 없음
    #[default]
    Flat,
    /// 매수 포지션
    Long,
    /// 매도 포지션
    Short,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Flat => write!(f, "flat"),
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

/// 청산 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitKind {
    /// 목표가 도달
    Target,
    /// 트레일링 스탑 도달
    TrailingStop,
}

/// 신호 시점의 지표 값.
///
/// `None`은 히스토리가 부족해 아직 계산할 수 없는 값입니다.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    /// 단기 SMA
    pub sma_short: Option<Decimal>,
    /// 장기 SMA
    pub sma_long: Option<Decimal>,
    /// ATR
    pub atr: Option<Decimal>,
    /// RSI
    pub rsi: Option<Decimal>,
    /// 거래량 이동평균
    pub volume_average: Option<Decimal>,
}

impl IndicatorSnapshot {
    /// 진입 판단에 필요한 값이 모두 계산되었는지 확인합니다.
    pub fn is_complete(&self) -> bool {
        self.sma_short.is_some()
            && self.sma_long.is_some()
            && self.atr.is_some()
            && self.rsi.is_some()
            && self.volume_average.is_some()
    }
}

/// 신호 엔진이 생성한 매매 신호.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// 고유 신호 ID
    pub id: Uuid,
    /// 심볼 키 (`세그먼트|토큰` 또는 토큰)
    pub symbol: String,
    /// 표시용 종목명
    pub name: String,
    /// 신호 액션
    pub action: SignalAction,
    /// 판단 근거
    pub reason: String,
    /// 신호 시점 종가
    pub price: Decimal,
    /// 신호 처리 후 포지션
    pub position: PositionSide,
    /// 신호 처리 후 트레일링 스탑
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing_stop: Option<Decimal>,
    /// 신호 처리 후 목표가
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Decimal>,
    /// 청산 사유 (EXIT일 때)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_kind: Option<ExitKind>,
    /// 실현 손익 (EXIT일 때)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<Decimal>,
    /// 지표 스냅샷
    pub indicators: IndicatorSnapshot,
    /// 신호 생성 시각
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// 새 신호를 생성합니다.
    pub fn new(
        symbol: impl Into<String>,
        action: SignalAction,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            name: String::new(),
            action,
            reason: String::new(),
            price,
            position: PositionSide::Flat,
            trailing_stop: None,
            target: None,
            exit_kind: None,
            realized_pnl: None,
            indicators: IndicatorSnapshot::default(),
            timestamp,
        }
    }

    /// 종목명을 설정합니다.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 판단 근거를 설정합니다.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// 지표 스냅샷을 설정합니다.
    pub fn with_indicators(mut self, indicators: IndicatorSnapshot) -> Self {
        self.indicators = indicators;
        self
    }

    /// 신호 처리 후 포지션 상태를 설정합니다.
    pub fn with_position(
        mut self,
        position: PositionSide,
        trailing_stop: Option<Decimal>,
        target: Option<Decimal>,
    ) -> Self {
        self.position = position;
        self.trailing_stop = trailing_stop;
        self.target = target;
        self
    }

    /// 청산 정보를 설정합니다.
    pub fn with_exit(mut self, kind: ExitKind, realized_pnl: Decimal) -> Self {
        self.exit_kind = Some(kind);
        self.realized_pnl = Some(realized_pnl);
        self
    }

    /// HOLD가 아닌 신호인지 확인합니다.
    pub fn is_actionable(&self) -> bool {
        self.action != SignalAction::Hold
    }

    /// 표시용 이름. 종목명이 없으면 심볼 키를 사용합니다.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.symbol
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signal_builder() {
        let signal = Signal::new("nse_cm|11536", SignalAction::Exit, dec!(108), Utc::now())
            .with_name("TCS-EQ")
            .with_reason("target hit")
            .with_exit(ExitKind::Target, dec!(400));

        assert!(signal.is_actionable());
        assert_eq!(signal.display_name(), "TCS-EQ");
        assert_eq!(signal.exit_kind, Some(ExitKind::Target));
        assert_eq!(signal.realized_pnl, Some(dec!(400)));
        assert_eq!(signal.position, PositionSide::Flat);
    }

    #[test]
    fn test_hold_is_not_actionable() {
        let signal = Signal::new("11536", SignalAction::Hold, dec!(10), Utc::now());
        assert!(!signal.is_actionable());
        assert_eq!(signal.display_name(), "11536");
    }

    #[test]
    fn test_action_display_and_serde() {
        assert_eq!(SignalAction::Buy.to_string(), "BUY");
        assert_eq!(
            serde_json::to_string(&SignalAction::Exit).unwrap(),
            "\"EXIT\""
        );
    }

    #[test]
    fn test_snapshot_completeness() {
        let mut snapshot = IndicatorSnapshot {
            sma_short: Some(dec!(10)),
            sma_long: Some(dec!(9)),
            atr: Some(dec!(1)),
            rsi: None,
            volume_average: Some(dec!(100)),
        };
        assert!(!snapshot.is_complete());
        snapshot.rsi = Some(dec!(60));
        assert!(snapshot.is_complete());
    }
}
