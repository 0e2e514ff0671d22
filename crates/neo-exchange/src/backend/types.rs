//! 백엔드 REST 요청/응답 타입.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use neo_core::ExchangeSegment;

/// 매수/매도 구분.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// 주문 페이로드의 `tt` 코드.
    pub fn code(&self) -> &'static str {
        match self {
            OrderSide::Buy => "B",
            OrderSide::Sell => "S",
        }
    }
}

/// 가격 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    /// 지정가
    #[default]
    Limit,
    /// 시장가
    Market,
    /// 스탑 지정가
    StopLoss,
    /// 스탑 시장가
    StopLossMarket,
}

impl PriceType {
    /// 주문 페이로드의 `pt` 코드.
    pub fn code(&self) -> &'static str {
        match self {
            PriceType::Limit => "L",
            PriceType::Market => "MKT",
            PriceType::StopLoss => "SL",
            PriceType::StopLossMarket => "SL-M",
        }
    }
}

/// 상품 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    /// 현물 인도
    #[default]
    Cash,
    /// 당일 청산
    Intraday,
    /// 파생 익일 이월
    Normal,
}

impl ProductType {
    /// 주문 페이로드의 `pc` 코드.
    pub fn code(&self) -> &'static str {
        match self {
            ProductType::Cash => "CNC",
            ProductType::Intraday => "MIS",
            ProductType::Normal => "NRML",
        }
    }
}

/// 주문 유지 조건.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    #[default]
    Day,
    Ioc,
}

impl Retention {
    pub fn code(&self) -> &'static str {
        match self {
            Retention::Day => "DAY",
            Retention::Ioc => "IOC",
        }
    }
}

/// 주문 요청.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// 거래 심볼 (예: TCS-EQ)
    pub symbol: String,
    /// 거래소 세그먼트
    pub segment: ExchangeSegment,
    pub side: OrderSide,
    pub quantity: u32,
    /// 가격 (시장가는 0)
    pub price: Decimal,
    #[serde(default)]
    pub price_type: PriceType,
    #[serde(default)]
    pub product: ProductType,
    #[serde(default)]
    pub retention: Retention,
    /// 트리거 가격
    #[serde(default)]
    pub trigger_price: Option<Decimal>,
    /// 공개 수량
    #[serde(default)]
    pub disclosed_quantity: u32,
    /// 장후 주문 여부
    #[serde(default)]
    pub after_market: bool,
}

impl OrderRequest {
    /// 지정가 주문 생성.
    pub fn limit(
        symbol: impl Into<String>,
        segment: impl Into<ExchangeSegment>,
        side: OrderSide,
        quantity: u32,
        price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            segment: segment.into(),
            side,
            quantity,
            price,
            price_type: PriceType::Limit,
            product: ProductType::default(),
            retention: Retention::default(),
            trigger_price: None,
            disclosed_quantity: 0,
            after_market: false,
        }
    }

    /// 시장가 주문 생성.
    pub fn market(
        symbol: impl Into<String>,
        segment: impl Into<ExchangeSegment>,
        side: OrderSide,
        quantity: u32,
    ) -> Self {
        Self {
            price_type: PriceType::Market,
            ..Self::limit(symbol, segment, side, quantity, Decimal::ZERO)
        }
    }

    pub fn with_product(mut self, product: ProductType) -> Self {
        self.product = product;
        self
    }

    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    /// 와이어 페이로드로 변환합니다.
    pub fn to_payload(&self) -> OrderPayload {
        OrderPayload {
            am: if self.after_market { "YES" } else { "NO" }.to_string(),
            dq: self.disclosed_quantity.to_string(),
            es: self.segment.code().to_string(),
            mp: "0".to_string(),
            pc: self.product.code().to_string(),
            pf: "N".to_string(),
            pr: self.price.to_string(),
            pt: self.price_type.code().to_string(),
            qt: self.quantity.to_string(),
            rt: self.retention.code().to_string(),
            tp: self
                .trigger_price
                .map(|p| p.to_string())
                .unwrap_or_else(|| "0".to_string()),
            ts: self.symbol.clone(),
            tt: self.side.code().to_string(),
        }
    }
}

/// `/orders/normal` 요청 본문. 모든 값은 문자열입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    /// 장후 주문 (YES/NO)
    pub am: String,
    /// 공개 수량
    pub dq: String,
    /// 거래소 세그먼트
    pub es: String,
    /// 시장가 보호
    pub mp: String,
    /// 상품 코드
    pub pc: String,
    /// 가격 동결
    pub pf: String,
    /// 가격
    pub pr: String,
    /// 가격 유형
    pub pt: String,
    /// 수량
    pub qt: String,
    /// 유지 조건
    pub rt: String,
    /// 트리거 가격
    pub tp: String,
    /// 거래 심볼
    pub ts: String,
    /// 매수/매도
    pub tt: String,
}

/// 한도 조회 조건.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsQuery {
    pub seg: String,
    pub exch: String,
    pub prod: String,
}

impl Default for LimitsQuery {
    fn default() -> Self {
        Self {
            seg: "ALL".to_string(),
            exch: "ALL".to_string(),
            prod: "ALL".to_string(),
        }
    }
}

/// 관심종목에 추가할 종목.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistStock {
    pub symbol: String,
    pub name: String,
    /// 종목 토큰
    pub tok: String,
    /// 거래소 세그먼트 코드
    #[serde(rename = "exSeg")]
    pub ex_seg: String,
}

/// `/watchlists/add-stocks` 요청 본문.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddStocksRequest {
    pub user_id: String,
    pub watchlist_id: String,
    pub stocks: Vec<WatchlistStock>,
}

/// `/logTrade` 요청 본문.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTradeRequest {
    pub message: String,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}
