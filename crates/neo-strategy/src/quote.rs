//! 변동성 기반 호가 제시 엔진.
//!
//! 틱마다 최근 가격의 상대 변동성과 호가 잔량 불균형을 계산해,
//! 둘 다 임계값보다 작으면 양방향 호가를 제시하고 아니면 기존 호가를 취소합니다.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use neo_analytics::{ewma_volatility, relative_volatility, IndicatorResult};
use neo_core::{MarketTick, QuoteAction, MAX_TICK_PRICE, QuoteConfig, QuoteDecision, VolatilityWeighting};

/// 한 심볼의 최근 가격 창.
#[derive(Debug, Clone, Default)]
pub struct QuoteBook {
    prices: VecDeque<Decimal>,
}

impl QuoteBook {
    /// 가격 추가. 창 크기를 넘으면 가장 오래된 값을 제거합니다.
    fn push(&mut self, price: Decimal, window: usize) {
        self.prices.push_back(price);
        while self.prices.len() > window.max(1) {
            self.prices.pop_front();
        }
    }

    /// 보관 중인 가격 수.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// 비었는지 확인.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// 변동성 호가 엔진.
#[derive(Debug, Clone)]
pub struct VolatilityQuoter {
    config: QuoteConfig,
}

impl VolatilityQuoter {
    /// 새 엔진 생성. 창 크기 0 또는 범위 밖의 감쇠 계수는 에러.
    pub fn new(config: QuoteConfig) -> IndicatorResult<Self> {
        // 파라미터 검증만 수행
        match config.weighting {
            VolatilityWeighting::Simple => relative_volatility(&[], config.window).map(|_| ())?,
            VolatilityWeighting::Ewma { decay } => {
                ewma_volatility(&[], config.window, decay).map(|_| ())?
            }
        }
        Ok(Self { config })
    }

    /// 설정.
    pub fn config(&self) -> &QuoteConfig {
        &self.config
    }

    /// 틱 하나를 반영해 호가 결정을 만듭니다.
    pub fn decide(&self, book: &mut QuoteBook, tick: &MarketTick) -> QuoteDecision {
        book.push(tick.ltp, self.config.window);
        let volatility = self.volatility(book);
        let imbalance = imbalance(tick);

        let (bid, ask) = match (tick.bid_price, tick.ask_price) {
            (Some(bid), Some(ask))
                if bid > Decimal::ZERO && ask >= bid && ask <= MAX_TICK_PRICE =>
            {
                (bid, ask)
            }
            _ => (
                tick.ltp - self.config.fallback_half_spread,
                tick.ltp + self.config.fallback_half_spread,
            ),
        };
        let mid = (bid + ask) / Decimal::TWO;
        let spread = ask - bid;

        let action = if imbalance.abs() < self.config.imbalance_threshold
            && volatility < self.config.volatility_threshold
        {
            QuoteAction::Quote {
                bid: mid - spread / Decimal::TWO,
                ask: mid + spread / Decimal::TWO,
            }
        } else {
            QuoteAction::Cancel
        };

        debug!(
            symbol = %tick.symbol_key(),
            volatility = %volatility,
            imbalance = %imbalance,
            quoting = matches!(action, QuoteAction::Quote { .. }),
            "호가 결정"
        );

        QuoteDecision {
            symbol: tick.symbol_key(),
            name: tick.name.clone(),
            volatility,
            imbalance,
            mid,
            spread,
            action,
            timestamp: decision_time(tick),
        }
    }

    fn volatility(&self, book: &QuoteBook) -> Decimal {
        let prices: Vec<Decimal> = book.prices.iter().copied().collect();
        let value = match self.config.weighting {
            VolatilityWeighting::Simple => relative_volatility(&prices, self.config.window),
            VolatilityWeighting::Ewma { decay } => {
                ewma_volatility(&prices, self.config.window, decay)
            }
        };
        // 값이 2개 미만이면 변동성 0으로 취급
        value.ok().flatten().unwrap_or(Decimal::ZERO)
    }
}

/// 최우선 호가 잔량 불균형 `(bid_qty - ask_qty) / (bid_qty + ask_qty)`.
///
/// 잔량이 없거나 음수면 0입니다.
pub fn imbalance(tick: &MarketTick) -> Decimal {
    match (tick.bid_quantity, tick.ask_quantity) {
        (Some(bid), Some(ask)) if bid >= Decimal::ZERO && ask >= Decimal::ZERO => {
            // 합이 넘치면 큰 쪽으로 나눠 비율만 유지
            let (bid, ask) = match bid.checked_add(ask) {
                Some(_) => (bid, ask),
                None => {
                    let scale = bid.max(ask);
                    (bid / scale, ask / scale)
                }
            };
            let total = bid + ask;
            if total.is_zero() {
                Decimal::ZERO
            } else {
                (bid - ask) / total
            }
        }
        _ => Decimal::ZERO,
    }
}

fn decision_time(tick: &MarketTick) -> DateTime<Utc> {
    tick.exchange_time.unwrap_or(tick.received_at)
}
