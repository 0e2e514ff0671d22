//! 틱 버퍼에서 만들어지는 캔들과 캔들 마감 정책.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV 캔들.
///
/// 히스토리에 추가된 이후에는 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 시가 (버퍼의 첫 틱)
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가 (버퍼의 마지막 틱)
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
    /// 마감 시각
    pub timestamp: DateTime<Utc>,
    /// 캔들을 구성한 틱 수
    pub tick_count: usize,
}

impl Candle {
    /// 이전 종가를 기준으로 한 True Range.
    ///
    /// `max(high - low, |high - prev_close|, |low - prev_close|)`. 뺄셈이 오버플로하면 `None`.
    pub fn true_range(&self, prev_close: Decimal) -> Option<Decimal> {
        let hl = self.high.checked_sub(self.low)?;
        let hc = self.high.checked_sub(prev_close)?.abs();
        let lc = self.low.checked_sub(prev_close)?.abs();
        Some(hl.max(hc).max(lc))
    }
}

/// 캔들 마감 조건.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CandleClose {
    /// 버퍼 틱 수가 `count`에 도달하면 마감
    Ticks { count: usize },
    /// 새 틱이 다음 `secs`초 구간에 속하면 열린 버퍼를 먼저 마감
    Interval { secs: u64 },
}

impl Default for CandleClose {
    fn default() -> Self {
        CandleClose::Ticks { count: 1 }
    }
}

/// 캔들 거래량 산출 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VolumeSource {
    /// 버퍼에서 마지막으로 관측된 틱 거래량
    #[default]
    LastTick,
    /// 버퍼 틱 수 × `multiplier`
    TickCount { multiplier: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            open,
            high,
            low,
            close,
            volume: dec!(0),
            timestamp: Utc::now(),
            tick_count: 1,
        }
    }

    #[test]
    fn test_true_range_uses_gap() {
        let c = candle(dec!(105), dec!(106), dec!(104), dec!(105));
        // 이전 종가 100 대비 갭 상승
        assert_eq!(c.true_range(dec!(100)), Some(dec!(6)));
        assert_eq!(c.true_range(dec!(105)), Some(dec!(2)));

        let extreme = candle(Decimal::MAX, Decimal::MAX, Decimal::MAX, Decimal::MAX);
        assert_eq!(extreme.true_range(-Decimal::MAX), None);
    }

    #[test]
    fn test_close_policy_serde() {
        let json = serde_json::to_string(&CandleClose::Ticks { count: 60 }).unwrap();
        assert_eq!(json, r#"{"mode":"ticks","count":60}"#);

        let parsed: VolumeSource =
            serde_json::from_str(r#"{"mode":"tick_count","multiplier":10}"#).unwrap();
        assert_eq!(parsed, VolumeSource::TickCount { multiplier: 10 });
    }
}
