//! 외부 협력 서비스 인터페이스.
//!
//! 세션 코어는 자금/주문/관심종목/매매 기록을 이 trait을 통해서만 사용합니다.

use async_trait::async_trait;
use serde_json::Value;

use super::types::{AddStocksRequest, LimitsQuery, OrderRequest};
use crate::ExchangeError;

/// 자금/한도 조회 서비스.
#[async_trait]
pub trait FundsService: Send + Sync {
    /// 가용 자금 조회.
    async fn funds(&self) -> Result<Value, ExchangeError>;

    /// 세그먼트/거래소/상품별 한도 조회.
    async fn limits(&self, query: &LimitsQuery) -> Result<Value, ExchangeError>;
}

/// 주문 서비스.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// 일반 주문 제출.
    async fn place_order(&self, order: &OrderRequest) -> Result<Value, ExchangeError>;
}

/// 관심종목 저장소.
#[async_trait]
pub trait WatchlistService: Send + Sync {
    /// 관심종목 조회.
    async fn watchlist(&self, user_id: &str, watchlist_id: &str) -> Result<Value, ExchangeError>;

    /// 관심종목에 종목 추가.
    async fn add_stocks(&self, request: &AddStocksRequest) -> Result<Value, ExchangeError>;

    /// 종목 검색.
    async fn search_stocks(&self, term: &str) -> Result<Value, ExchangeError>;
}

/// 매매 기록 전송처.
#[async_trait]
pub trait TradeLogSink: Send + Sync {
    /// 매매 기록 한 줄을 전송합니다.
    async fn log_trade(&self, message: &str) -> Result<(), ExchangeError>;

    /// 전송처 이름.
    fn name(&self) -> &str;
}
