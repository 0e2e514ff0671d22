//! 정규화된 시세 틱.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{ExchangeSegment, ScripKey};

/// 유효한 체결가의 상한.
pub const MAX_TICK_PRICE: Decimal = dec!(1000000000000);

/// 한 프레임에서 만들어지는 정규화된 시세 레코드.
///
/// 생성 이후에는 변경되지 않는 값 객체입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTick {
    /// 종목 토큰
    pub token: String,
    /// 거래 심볼 이름 (알 수 없으면 "Unknown")
    pub name: String,
    /// 거래소 세그먼트
    pub segment: Option<ExchangeSegment>,
    /// 표시용 거래소 이름
    pub exchange: String,
    /// 최종 체결가
    pub ltp: Decimal,
    /// 전일 대비
    pub change: Decimal,
    /// 전일 대비 등락률
    pub change_percent: Decimal,
    /// 거래량
    pub volume: Decimal,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 전일 종가
    pub close: Decimal,
    /// 최우선 매수호가
    pub bid_price: Option<Decimal>,
    /// 최우선 매수호가 잔량
    pub bid_quantity: Option<Decimal>,
    /// 최우선 매도호가
    pub ask_price: Option<Decimal>,
    /// 최우선 매도호가 잔량
    pub ask_quantity: Option<Decimal>,
    /// 거래소 타임스탬프
    pub exchange_time: Option<DateTime<Utc>>,
    /// 수신 시각
    pub received_at: DateTime<Utc>,
}

impl MarketTick {
    /// 최소 필드로 틱을 생성합니다. 나머지 가격 필드는 0입니다.
    pub fn new(token: impl Into<String>, ltp: Decimal, received_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            name: "Unknown".to_string(),
            segment: None,
            exchange: "BSE".to_string(),
            ltp,
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            volume: Decimal::ZERO,
            open: Decimal::ZERO,
            high: Decimal::ZERO,
            low: Decimal::ZERO,
            close: Decimal::ZERO,
            bid_price: None,
            bid_quantity: None,
            ask_price: None,
            ask_quantity: None,
            exchange_time: None,
            received_at,
        }
    }

    /// 세그먼트를 설정합니다.
    pub fn with_segment(mut self, segment: ExchangeSegment) -> Self {
        self.exchange = segment.exchange_name().to_string();
        self.segment = Some(segment);
        self
    }

    /// 거래량을 설정합니다.
    pub fn with_volume(mut self, volume: Decimal) -> Self {
        self.volume = volume;
        self
    }

    /// 최우선 호가를 설정합니다.
    pub fn with_quote(
        mut self,
        bid_price: Decimal,
        bid_quantity: Decimal,
        ask_price: Decimal,
        ask_quantity: Decimal,
    ) -> Self {
        self.bid_price = Some(bid_price);
        self.bid_quantity = Some(bid_quantity);
        self.ask_price = Some(ask_price);
        self.ask_quantity = Some(ask_quantity);
        self
    }

    /// 심볼별 상태를 구분하는 키.
    ///
    /// 세그먼트를 알면 `세그먼트|토큰`, 모르면 토큰만 사용합니다.
    pub fn symbol_key(&self) -> String {
        match &self.segment {
            Some(segment) => format!("{}|{}", segment, self.token),
            None => self.token.clone(),
        }
    }

    /// 스크립 키 (세그먼트를 알 때만).
    pub fn scrip_key(&self) -> Option<ScripKey> {
        self.segment
            .as_ref()
            .map(|segment| ScripKey::new(segment.clone(), self.token.clone()))
    }

    /// 체결가가 (0, [`MAX_TICK_PRICE`]] 범위인지 확인합니다.
    pub fn has_valid_price(&self) -> bool {
        self.ltp > Decimal::ZERO && self.ltp <= MAX_TICK_PRICE
    }

    /// 양쪽 호가가 모두 있을 때의 중간가.
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.bid_price, self.ask_price) {
            (Some(bid), Some(ask)) if bid > Decimal::ZERO && ask > Decimal::ZERO => {
                Some((bid + ask) / Decimal::TWO)
            }
            _ => None,
        }
    }
}
