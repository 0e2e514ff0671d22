//! 심볼별 신호 엔진.
//!
//! 세션의 시세 이벤트를 받아 심볼별 캔들/포지션 상태를 갱신하고, 신호와 호가 결정을
//! `broadcast` 채널로 내보냅니다. 심볼마다 독립된 잠금을 사용하므로 서로 다른 심볼은
//! 동시에 처리될 수 있고, 같은 심볼의 틱은 항상 순서대로 처리됩니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use neo_analytics::{CandlePolicy, IndicatorError, SymbolSeries};
use neo_core::{
    Candle, CandleConfig, EngineKind, MarketTick, QuoteConfig, QuoteDecision, Signal,
    StrategyConfig,
};
use neo_exchange::{SessionEvent, TradeLogSink};

use crate::policy::{candle_policy, TrendPolicy};
use crate::position::PositionState;
use crate::quote::{QuoteBook, VolatilityQuoter};
use crate::trade_log::TradeLogger;
use crate::trend::TrendEvaluator;

/// 엔진 이벤트 버퍼 크기.
const EVENT_BUFFER: usize = 1024;

/// 신호 엔진 에러.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("잘못된 지표 설정: {0}")]
    Indicator(#[from] IndicatorError),

    #[error("잘못된 엔진 설정: {0}")]
    Config(String),
}

/// 엔진이 내보내는 이벤트.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// 추세 엔진 신호 (HOLD 포함)
    Signal(Signal),
    /// 호가 엔진 결정
    Quote(QuoteDecision),
}

/// 엔진 통계.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// 처리한 틱 수
    pub ticks_processed: u64,
    /// 마감된 캔들 수
    pub candles_closed: u64,
    /// BUY/SELL/EXIT 신호 수
    pub signals_emitted: u64,
    /// 호가 결정 수
    pub quotes_emitted: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    candles: AtomicU64,
    signals: AtomicU64,
    quotes: AtomicU64,
}

enum Mode {
    Trend(TrendEvaluator),
    Quote(VolatilityQuoter),
}

/// 한 심볼의 엔진 상태.
#[derive(Debug)]
struct SymbolBook {
    name: String,
    series: SymbolSeries,
    position: PositionState,
    quotes: QuoteBook,
}

/// 심볼별 신호 엔진.
pub struct SignalEngine {
    kind: EngineKind,
    mode: Mode,
    candles: CandlePolicy,
    books: RwLock<HashMap<String, Arc<Mutex<SymbolBook>>>>,
    events: broadcast::Sender<EngineEvent>,
    trade_log: Option<TradeLogger>,
    counters: Counters,
}

impl SignalEngine {
    /// 추세 엔진 생성.
    pub fn trend(
        kind: EngineKind,
        policy: TrendPolicy,
        candles: CandlePolicy,
    ) -> Result<Self, EngineError> {
        if policy.stop_atr_multiplier <= Decimal::ZERO {
            return Err(EngineError::Config(format!(
                "stop_atr_multiplier must be positive, got {}",
                policy.stop_atr_multiplier
            )));
        }
        if policy.contract_size <= Decimal::ZERO {
            return Err(EngineError::Config(format!(
                "contract_size must be positive, got {}",
                policy.contract_size
            )));
        }
        let evaluator = TrendEvaluator::new(policy)?;
        Ok(Self::with_mode(kind, Mode::Trend(evaluator), candles))
    }

    /// 변동성 호가 엔진 생성.
    pub fn quote(config: QuoteConfig) -> Result<Self, EngineError> {
        let quoter = VolatilityQuoter::new(config)?;
        Ok(Self::with_mode(
            EngineKind::VolatilityQuote,
            Mode::Quote(quoter),
            CandlePolicy::default(),
        ))
    }

    /// 설정에서 엔진 생성.
    pub fn from_config(
        strategy: &StrategyConfig,
        candles: &CandleConfig,
    ) -> Result<Self, EngineError> {
        match TrendPolicy::preset(strategy.engine) {
            Some(preset) => Self::trend(
                strategy.engine,
                preset.with_overrides(&strategy.trend),
                candle_policy(strategy.engine, candles),
            ),
            None => Self::quote(strategy.quote.clone()),
        }
    }

    fn with_mode(kind: EngineKind, mode: Mode, candles: CandlePolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            kind,
            mode,
            candles,
            books: RwLock::new(HashMap::new()),
            events,
            trade_log: None,
            counters: Counters::default(),
        }
    }

    /// 매매 기록 전송처 설정.
    pub fn with_trade_log(mut self, sink: Arc<dyn TradeLogSink>) -> Self {
        self.trade_log = Some(TradeLogger::new(sink));
        self
    }

    /// 엔진 종류.
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// 엔진 이벤트 구독.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    async fn book(&self, symbol: &str) -> Arc<Mutex<SymbolBook>> {
        if let Some(book) = self.books.read().await.get(symbol) {
            return book.clone();
        }

        let mut books = self.books.write().await;
        books
            .entry(symbol.to_string())
            .or_insert_with(|| {
                debug!(symbol, "심볼 상태 생성");
                Arc::new(Mutex::new(SymbolBook {
                    name: String::new(),
                    series: SymbolSeries::new(self.candles),
                    position: PositionState::default(),
                    quotes: QuoteBook::default(),
                }))
            })
            .clone()
    }

    /// 틱 하나를 처리합니다.
    ///
    /// 추세 엔진은 캔들이 마감되고 지표가 준비되었을 때만 신호를 만들며,
    /// 호가 엔진은 틱마다 결정을 만듭니다. 체결가가 없거나 범위를 벗어난 틱은 상태에
    /// 반영하지 않고 버립니다.
    pub async fn process_tick(&self, tick: &MarketTick) -> Option<EngineEvent> {
        let symbol = tick.symbol_key();
        if !tick.has_valid_price() {
            warn!(symbol = %symbol, ltp = %tick.ltp, "가격이 유효하지 않은 틱 무시");
            return None;
        }
        self.counters.ticks.fetch_add(1, Ordering::Relaxed);
        let book = self.book(&symbol).await;
        let mut book = book.lock().await;

        if tick.name != "Unknown" || book.name.is_empty() {
            book.name = tick.name.clone();
        }

        let event = match &self.mode {
            Mode::Trend(evaluator) => {
                book.series.push(tick)?;
                self.counters.candles.fetch_add(1, Ordering::Relaxed);

                let SymbolBook {
                    name,
                    series,
                    position,
                    ..
                } = &mut *book;
                let signal =
                    evaluator.evaluate(&symbol, name.as_str(), series.candles(), position)?;

                if signal.is_actionable() {
                    self.counters.signals.fetch_add(1, Ordering::Relaxed);
                    if let Some(logger) = &self.trade_log {
                        logger.dispatch(&signal);
                    }
                }
                EngineEvent::Signal(signal)
            }
            Mode::Quote(quoter) => {
                let decision = quoter.decide(&mut book.quotes, tick);
                self.counters.quotes.fetch_add(1, Ordering::Relaxed);
                EngineEvent::Quote(decision)
            }
        };

        // 구독자가 없어도 처리는 계속
        let _ = self.events.send(event.clone());
        Some(event)
    }

    /// 세션 이벤트 스트림을 소비합니다. 채널이 닫히면 반환합니다.
    pub async fn run(&self, mut events: broadcast::Receiver<SessionEvent>) {
        info!(engine = ?self.kind, "신호 엔진 시작");
        loop {
            match events.recv().await {
                Ok(SessionEvent::MarketData(tick)) => {
                    self.process_tick(&tick).await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "시세 이벤트 누락 (처리 지연)");
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!(stats = ?self.stats(), "신호 엔진 종료");
    }

    /// 심볼 포지션 상태 조회.
    pub async fn position(&self, symbol: &str) -> Option<PositionState> {
        let book = self.books.read().await.get(symbol)?.clone();
        let position = book.lock().await.position.clone();
        Some(position)
    }

    /// 심볼 캔들 히스토리 조회.
    pub async fn candles(&self, symbol: &str) -> Vec<Candle> {
        let Some(book) = self.books.read().await.get(symbol).cloned() else {
            return Vec::new();
        };
        let candles = book.lock().await.series.candles().to_vec();
        candles
    }

    /// 추적 중인 심볼 목록.
    pub async fn symbols(&self) -> Vec<String> {
        self.books.read().await.keys().cloned().collect()
    }

    /// 엔진 통계.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            ticks_processed: self.counters.ticks.load(Ordering::Relaxed),
            candles_closed: self.counters.candles.load(Ordering::Relaxed),
            signals_emitted: self.counters.signals.load(Ordering::Relaxed),
            quotes_emitted: self.counters.quotes.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for SignalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalEngine")
            .field("kind", &self.kind)
            .field("candles", &self.candles)
            .field("trade_log", &self.trade_log)
            .finish()
    }
}
