//! 변동성 지표.
//!
//! - ATR (Average True Range)
//! - 상대 변동성 (표준편차 / 평균), 단순 또는 지수 가중

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use neo_core::Candle;

use super::{checked_sum, validate_period, IndicatorError, IndicatorResult};

/// 평균 실제 범위.
///
/// 캔들이 `period + 1`개 미만이면 `None`입니다. 마지막 `period`개 캔들 각각의 True Range
/// (직전 캔들 종가 기준) 평균입니다. 계산 중 오버플로가 나면 `None`입니다.
pub fn atr(candles: &[Candle], period: usize) -> IndicatorResult<Option<Decimal>> {
    validate_period("atr", period)?;

    if candles.len() < period + 1 {
        return Ok(None);
    }

    let ranges: Option<Vec<Decimal>> = candles[candles.len() - period - 1..]
        .windows(2)
        .map(|pair| pair[1].true_range(pair[0].close))
        .collect();
    let sum = ranges.and_then(checked_sum);
    Ok(sum.map(|sum| sum / Decimal::from(period)))
}

/// 마지막 `window`개 값의 모집단 표준편차 / 평균.
///
/// 값이 2개 미만이거나 평균이 0이면 `None`입니다. 값이 `window`개보다 적으면 있는 값만 사용합니다.
pub fn relative_volatility(values: &[Decimal], window: usize) -> IndicatorResult<Option<Decimal>> {
    validate_period("volatility", window)?;

    let tail = &values[values.len().saturating_sub(window)..];
    if tail.len() < 2 {
        return Ok(None);
    }

    let weights = vec![Decimal::ONE; tail.len()];
    Ok(weighted_relative_volatility(tail, &weights))
}

/// 지수 가중 상대 변동성.
///
/// 가장 최근 값의 가중치가 1이고 한 단계 과거로 갈수록 `decay`배가 됩니다.
/// `decay`는 (0, 1] 범위여야 하며 1이면 [`relative_volatility`]와 같습니다.
pub fn ewma_volatility(
    values: &[Decimal],
    window: usize,
    decay: Decimal,
) -> IndicatorResult<Option<Decimal>> {
    validate_period("volatility", window)?;
    if decay <= Decimal::ZERO || decay > Decimal::ONE {
        return Err(IndicatorError::InvalidParameter(format!(
            "decay must be in (0, 1], got {}",
            decay
        )));
    }

    let tail = &values[values.len().saturating_sub(window)..];
    if tail.len() < 2 {
        return Ok(None);
    }

    // 최신 값부터 가중치 1, decay, decay², ...
    let mut weights = Vec::with_capacity(tail.len());
    let mut weight = Decimal::ONE;
    for _ in 0..tail.len() {
        weights.push(weight);
        weight *= decay;
    }
    weights.reverse();

    Ok(weighted_relative_volatility(tail, &weights))
}

/// 가중 표준편차 / 가중 평균. 평균이 0이거나 오버플로가 나면 `None`.
fn weighted_relative_volatility(values: &[Decimal], weights: &[Decimal]) -> Option<Decimal> {
    let total = checked_sum(weights.iter().copied())?;
    let weighted: Option<Vec<Decimal>> = values
        .iter()
        .zip(weights)
        .map(|(v, w)| v.checked_mul(*w))
        .collect();
    let mean = checked_sum(weighted?)?.checked_div(total)?;
    if mean.is_zero() {
        return None;
    }

    let deviations: Option<Vec<Decimal>> = values
        .iter()
        .zip(weights)
        .map(|(v, w)| {
            let d = v.checked_sub(mean)?;
            d.checked_mul(d)?.checked_mul(*w)
        })
        .collect();
    let variance = checked_sum(deviations?)?.checked_div(total)?;

    sqrt(variance)?.checked_div(mean)
}

/// rust_decimal에는 sqrt가 없으므로 f64로 변환하여 계산
fn sqrt(value: Decimal) -> Option<Decimal> {
    value
        .to_f64()
        .and_then(|v: f64| Decimal::try_from(v.sqrt()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn flat_candle(price: Decimal) -> Candle {
        Candle {
            open: price,
            high: price,
            low: price,
            close: price,
            volume: Decimal::ZERO,
            timestamp: Utc::now(),
            tick_count: 1,
        }
    }

    fn approx(a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < dec!(0.000001)
    }

    #[test]
    fn test_atr_needs_period_plus_one() {
        let candles: Vec<_> = (0..14).map(|_| flat_candle(dec!(10))).collect();
        assert_eq!(atr(&candles, 14).unwrap(), None);
    }

    #[test]
    fn test_atr_single_gap() {
        let mut candles: Vec<_> = (0..20).map(|_| flat_candle(dec!(10))).collect();
        candles.push(flat_candle(dec!(15)));
        assert_eq!(atr(&candles, 14).unwrap(), Some(dec!(5) / dec!(14)));
    }

    #[test]
    fn test_atr_uses_high_low_range() {
        let mut candles = vec![flat_candle(dec!(100))];
        candles.push(Candle {
            high: dec!(104),
            low: dec!(98),
            close: dec!(102),
            ..flat_candle(dec!(100))
        });
        assert_eq!(atr(&candles, 1).unwrap(), Some(dec!(6)));
    }

    #[test]
    fn test_relative_volatility() {
        // 평균 10, 모집단 표준편차 1
        let values = vec![dec!(9), dec!(11), dec!(9), dec!(11)];
        let vol = relative_volatility(&values, 20).unwrap().unwrap();
        assert!(approx(vol, dec!(0.1)));

        assert_eq!(relative_volatility(&[dec!(10)], 20).unwrap(), None);
        assert_eq!(
            relative_volatility(&[dec!(5), dec!(5), dec!(5)], 20).unwrap(),
            Some(Decimal::ZERO)
        );
    }

    #[test]
    fn test_relative_volatility_window_limits_history() {
        // 창 밖의 급등은 무시
        let mut values = vec![dec!(1000)];
        values.extend((0..20).map(|_| dec!(10)));
        assert_eq!(relative_volatility(&values, 20).unwrap(), Some(Decimal::ZERO));
    }

    #[test]
    fn test_ewma_with_unit_decay_matches_simple() {
        let values = vec![dec!(9), dec!(11), dec!(9), dec!(11), dec!(10)];
        let simple = relative_volatility(&values, 20).unwrap().unwrap();
        let weighted = ewma_volatility(&values, 20, Decimal::ONE).unwrap().unwrap();
        assert!(approx(simple, weighted));
    }

    #[test]
    fn test_ewma_weights_recent_moves_higher() {
        // 최근 구간에 변동이 몰린 경우 가중 변동성이 더 큼
        let mut values: Vec<_> = (0..15).map(|_| dec!(10)).collect();
        values.extend([dec!(12), dec!(8), dec!(12), dec!(8), dec!(12)]);
        let simple = relative_volatility(&values, 20).unwrap().unwrap();
        let weighted = ewma_volatility(&values, 20, dec!(0.8)).unwrap().unwrap();
        assert!(weighted > simple);
    }

    #[test]
    fn test_near_max_prices_are_gaps() {
        let huge = Decimal::MAX / dec!(2);
        let candles: Vec<_> = (0..20).map(|_| flat_candle(huge)).collect();
        assert_eq!(atr(&candles, 14).unwrap(), Some(Decimal::ZERO));

        let mut swinging = vec![flat_candle(-huge)];
        swinging.extend((0..14).map(|i| flat_candle(if i % 2 == 0 { huge } else { -huge })));
        assert_eq!(atr(&swinging, 14).unwrap(), None);

        let values = vec![huge; 20];
        assert_eq!(relative_volatility(&values, 20).unwrap(), None);
        assert_eq!(ewma_volatility(&values, 20, dec!(0.9)).unwrap(), None);
    }

    #[test]
    fn test_ewma_rejects_bad_decay() {
        assert!(ewma_volatility(&[dec!(1), dec!(2)], 20, dec!(1.5)).is_err());
        assert!(ewma_volatility(&[dec!(1), dec!(2)], 20, Decimal::ZERO).is_err());
    }
}
