//! 변동성 기반 호가 제시 결정.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 호가 제시 액션.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum QuoteAction {
    /// 양방향 호가 제시
    Quote { bid: Decimal, ask: Decimal },
    /// 기존 호가 취소
    Cancel,
}

/// 틱마다 계산되는 호가 제시 결정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteDecision {
    /// 심볼 키
    pub symbol: String,
    /// 표시용 종목명
    pub name: String,
    /// 상대 변동성 (표준편차 / 평균)
    pub volatility: Decimal,
    /// 호가 잔량 불균형 (-1 ~ 1)
    pub imbalance: Decimal,
    /// 중간가
    pub mid: Decimal,
    /// 스프레드
    pub spread: Decimal,
    /// 결정
    pub action: QuoteAction,
    /// 결정 시각
    pub timestamp: DateTime<Utc>,
}

impl QuoteDecision {
    /// 호가를 제시하는 결정인지 확인합니다.
    pub fn is_quoting(&self) -> bool {
        matches!(self.action, QuoteAction::Quote { .. })
    }
}
