//! 틱 → 캔들 집계.
//!
//! 심볼마다 열린 틱 버퍼와 캔들 히스토리를 [`SymbolSeries`]가 소유합니다.
//! 지표는 마감된 캔들 히스토리만 입력으로 받으므로 틱 도착 속도와 무관하게 같은 값을 냅니다.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::trace;

use neo_core::{Candle, CandleClose, MarketTick, VolumeSource};

/// 캔들 마감/거래량/히스토리 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandlePolicy {
    /// 마감 조건
    pub close: CandleClose,
    /// 거래량 산출 방식
    pub volume: VolumeSource,
    /// 심볼별 최대 캔들 수 (초과 시 가장 오래된 캔들부터 제거)
    pub history_cap: usize,
}

impl Default for CandlePolicy {
    fn default() -> Self {
        Self {
            close: CandleClose::default(),
            volume: VolumeSource::default(),
            history_cap: 200,
        }
    }
}

impl CandlePolicy {
    /// 틱 수 기준 정책.
    pub fn ticks(count: usize) -> Self {
        Self {
            close: CandleClose::Ticks {
                count: count.max(1),
            },
            ..Self::default()
        }
    }

    /// 시간 구간 기준 정책.
    pub fn interval(secs: u64) -> Self {
        Self {
            close: CandleClose::Interval { secs: secs.max(1) },
            ..Self::default()
        }
    }

    /// 거래량 산출 방식 설정.
    pub fn with_volume(mut self, volume: VolumeSource) -> Self {
        self.volume = volume;
        self
    }

    /// 히스토리 상한 설정.
    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap.max(1);
        self
    }
}

/// 열린 틱 버퍼.
#[derive(Debug, Clone)]
struct OpenBuffer {
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    last_volume: Decimal,
    ticks: usize,
    bucket: Option<i64>,
    last_at: DateTime<Utc>,
}

impl OpenBuffer {
    fn start(tick: &MarketTick, bucket: Option<i64>) -> Self {
        Self {
            open: tick.ltp,
            high: tick.ltp,
            low: tick.ltp,
            close: tick.ltp,
            last_volume: tick.volume,
            ticks: 1,
            bucket,
            last_at: tick.received_at,
        }
    }

    fn add(&mut self, tick: &MarketTick) {
        self.high = self.high.max(tick.ltp);
        self.low = self.low.min(tick.ltp);
        self.close = tick.ltp;
        self.last_volume = tick.volume;
        self.ticks += 1;
        self.last_at = tick.received_at;
    }

    fn into_candle(self, policy: &CandlePolicy) -> Candle {
        let volume = match policy.volume {
            VolumeSource::LastTick => self.last_volume,
            VolumeSource::TickCount { multiplier } => {
                Decimal::from(self.ticks) * Decimal::from(multiplier)
            }
        };

        // 시간 구간 캔들은 구간 시작 시각, 틱 수 캔들은 마지막 틱 시각
        let timestamp = match (policy.close, self.bucket) {
            (CandleClose::Interval { secs }, Some(bucket)) => Utc
                .timestamp_opt(bucket * secs as i64, 0)
                .single()
                .unwrap_or(self.last_at),
            _ => self.last_at,
        };

        Candle {
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume,
            timestamp,
            tick_count: self.ticks,
        }
    }
}

/// 한 심볼의 캔들 히스토리와 열린 버퍼.
#[derive(Debug, Clone)]
pub struct SymbolSeries {
    policy: CandlePolicy,
    buffer: Option<OpenBuffer>,
    history: Vec<Candle>,
}

impl SymbolSeries {
    /// 새 시리즈 생성.
    pub fn new(policy: CandlePolicy) -> Self {
        Self {
            policy,
            buffer: None,
            history: Vec::with_capacity(policy.history_cap.min(512)),
        }
    }

    /// 집계 정책.
    pub fn policy(&self) -> &CandlePolicy {
        &self.policy
    }

    /// 틱을 버퍼에 넣고, 마감된 캔들이 있으면 반환합니다.
    ///
    /// 시간 구간 정책에서는 새 구간의 틱이 이전 구간 버퍼를 마감시키고,
    /// 그 틱은 새 버퍼의 첫 틱이 됩니다.
    pub fn push(&mut self, tick: &MarketTick) -> Option<Candle> {
        match self.policy.close {
            CandleClose::Ticks { count } => {
                match self.buffer.as_mut() {
                    Some(buffer) => buffer.add(tick),
                    None => self.buffer = Some(OpenBuffer::start(tick, None)),
                }

                let full = self
                    .buffer
                    .as_ref()
                    .is_some_and(|b| b.ticks >= count.max(1));
                if full {
                    self.flush()
                } else {
                    None
                }
            }
            CandleClose::Interval { secs } => {
                let bucket = tick.received_at.timestamp().div_euclid(secs.max(1) as i64);

                let closed = match self.buffer.as_ref().and_then(|b| b.bucket) {
                    Some(open_bucket) if bucket > open_bucket => self.flush(),
                    _ => None,
                };

                match self.buffer.as_mut() {
                    Some(buffer) => buffer.add(tick),
                    None => self.buffer = Some(OpenBuffer::start(tick, Some(bucket))),
                }

                closed
            }
        }
    }

    /// 열린 버퍼를 즉시 마감합니다. 버퍼가 비어 있으면 `None`.
    pub fn flush(&mut self) -> Option<Candle> {
        let candle = self.buffer.take()?.into_candle(&self.policy);
        self.append(candle.clone());
        Some(candle)
    }

    fn append(&mut self, candle: Candle) {
        self.history.push(candle);
        if self.history.len() > self.policy.history_cap {
            let excess = self.history.len() - self.policy.history_cap;
            self.history.drain(..excess);
        }
        trace!(candles = self.history.len(), "캔들 추가");
    }

    /// 캔들 히스토리 (과거 → 최신).
    pub fn candles(&self) -> &[Candle] {
        &self.history
    }

    /// 종가 목록.
    pub fn closes(&self) -> Vec<Decimal> {
        self.history.iter().map(|c| c.close).collect()
    }

    /// 마지막 캔들.
    pub fn last(&self) -> Option<&Candle> {
        self.history.last()
    }

    /// 열린 버퍼의 틱 수.
    pub fn pending_ticks(&self) -> usize {
        self.buffer.as_ref().map_or(0, |b| b.ticks)
    }

    /// 히스토리 길이.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// 히스토리가 비었는지 확인.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// 심볼별 캔들 집계기.
///
/// 심볼마다 독립된 [`SymbolSeries`]를 가지며 심볼 간 히스토리를 공유하지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct CandleAggregator {
    policy: CandlePolicy,
    series: HashMap<String, SymbolSeries>,
}

impl CandleAggregator {
    /// 새 집계기 생성.
    pub fn new(policy: CandlePolicy) -> Self {
        Self {
            policy,
            series: HashMap::new(),
        }
    }

    /// 틱의 심볼 키로 시리즈를 찾아 틱을 넣습니다.
    pub fn push(&mut self, tick: &MarketTick) -> Option<Candle> {
        let policy = self.policy;
        self.series
            .entry(tick.symbol_key())
            .or_insert_with(|| SymbolSeries::new(policy))
            .push(tick)
    }

    /// 심볼 시리즈 조회.
    pub fn series(&self, symbol: &str) -> Option<&SymbolSeries> {
        self.series.get(symbol)
    }

    /// 추적 중인 심볼 목록.
    pub fn symbols(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }

    /// 심볼 상태 제거.
    pub fn remove(&mut self, symbol: &str) -> Option<SymbolSeries> {
        self.series.remove(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn tick_at(token: &str, ltp: Decimal, volume: Decimal, secs: i64) -> MarketTick {
        let at = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        MarketTick::new(token, ltp, at).with_volume(volume)
    }

    #[test]
    fn test_single_tick_candles() {
        let mut series = SymbolSeries::new(CandlePolicy::ticks(1));
        let candle = series.push(&tick_at("1", dec!(10), dec!(100), 0)).unwrap();

        assert_eq!(candle.open, dec!(10));
        assert_eq!(candle.close, dec!(10));
        assert_eq!(candle.volume, dec!(100));
        assert_eq!(candle.tick_count, 1);
        assert_eq!(series.len(), 1);
        assert_eq!(series.pending_ticks(), 0);
    }

    #[test]
    fn test_tick_count_candle_ohlc() {
        let mut series = SymbolSeries::new(
            CandlePolicy::ticks(4).with_volume(VolumeSource::TickCount { multiplier: 10 }),
        );
        let prices = [dec!(10), dec!(12), dec!(9), dec!(11)];

        let mut closed = None;
        for (i, price) in prices.iter().enumerate() {
            closed = series.push(&tick_at("1", *price, dec!(5), i as i64));
            if i < 3 {
                assert!(closed.is_none());
                assert_eq!(series.pending_ticks(), i + 1);
            }
        }

        let candle = closed.unwrap();
        assert_eq!(candle.open, dec!(10));
        assert_eq!(candle.high, dec!(12));
        assert_eq!(candle.low, dec!(9));
        assert_eq!(candle.close, dec!(11));
        assert_eq!(candle.volume, dec!(40));
        assert_eq!(candle.tick_count, 4);
    }

    #[test]
    fn test_last_tick_volume() {
        let mut series = SymbolSeries::new(CandlePolicy::ticks(2));
        series.push(&tick_at("1", dec!(10), dec!(100), 0));
        let candle = series.push(&tick_at("1", dec!(11), dec!(250), 1)).unwrap();
        assert_eq!(candle.volume, dec!(250));
    }

    #[test]
    fn test_interval_closes_on_next_bucket() {
        let mut series = SymbolSeries::new(CandlePolicy::interval(60));
        // 1_700_000_000은 60의 배수가 아니므로 구간 경계를 직접 계산
        let base = 1_700_000_000i64;
        let bucket_start = base.div_euclid(60) * 60;
        let offset = bucket_start - base;

        assert!(series.push(&tick_at("1", dec!(10), dec!(1), offset)).is_none());
        assert!(series.push(&tick_at("1", dec!(12), dec!(1), offset + 30)).is_none());
        assert!(series.push(&tick_at("1", dec!(11), dec!(1), offset + 59)).is_none());

        // 다음 구간의 첫 틱이 이전 버퍼를 마감
        let candle = series
            .push(&tick_at("1", dec!(20), dec!(1), offset + 60))
            .unwrap();
        assert_eq!(candle.open, dec!(10));
        assert_eq!(candle.high, dec!(12));
        assert_eq!(candle.close, dec!(11));
        assert_eq!(candle.tick_count, 3);
        assert_eq!(candle.timestamp.timestamp(), bucket_start);

        // 새 틱은 열린 버퍼에 남음
        assert_eq!(series.pending_ticks(), 1);
        let flushed = series.flush().unwrap();
        assert_eq!(flushed.open, dec!(20));
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_history_cap_drops_oldest() {
        let mut series = SymbolSeries::new(CandlePolicy::ticks(1).with_history_cap(3));
        for i in 0..5 {
            series.push(&tick_at("1", Decimal::from(i), dec!(1), i));
        }

        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![dec!(2), dec!(3), dec!(4)]);
        assert_eq!(series.last().unwrap().close, dec!(4));
    }

    #[test]
    fn test_aggregator_keeps_symbols_separate() {
        let mut aggregator = CandleAggregator::new(CandlePolicy::ticks(1));
        aggregator.push(&tick_at("1", dec!(10), dec!(1), 0));
        aggregator.push(&tick_at("2", dec!(500), dec!(1), 0));
        aggregator.push(&tick_at("1", dec!(11), dec!(1), 1));

        assert_eq!(aggregator.series("1").unwrap().closes(), vec![dec!(10), dec!(11)]);
        assert_eq!(aggregator.series("2").unwrap().closes(), vec![dec!(500)]);

        let mut symbols = aggregator.symbols();
        symbols.sort();
        assert_eq!(symbols, vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn test_flush_empty_buffer() {
        let mut series = SymbolSeries::new(CandlePolicy::default());
        assert!(series.flush().is_none());
        assert!(series.is_empty());

        let tick = tick_at("1", dec!(10), dec!(1), 0);
        let later = MarketTick {
            received_at: tick.received_at + Duration::seconds(1),
            ..tick.clone()
        };
        series.push(&tick);
        series.push(&later);
        assert_eq!(series.len(), 2);
    }
}
