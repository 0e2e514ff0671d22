//! 추세 지표.

use rust_decimal::Decimal;

use neo_core::Candle;

use super::{checked_sum, validate_period, IndicatorResult};

/// 단순 이동평균.
///
/// 값이 `period`개 미만이거나 합계가 오버플로하면 `None`, 아니면 마지막 `period`개 값의
/// 산술 평균입니다.
pub fn sma(values: &[Decimal], period: usize) -> IndicatorResult<Option<Decimal>> {
    validate_period("sma", period)?;

    if values.len() < period {
        return Ok(None);
    }

    let sum = checked_sum(values[values.len() - period..].iter().copied());
    Ok(sum.map(|sum| sum / Decimal::from(period)))
}

/// 캔들 거래량의 단순 이동평균.
pub fn sma_volume(candles: &[Candle], period: usize) -> IndicatorResult<Option<Decimal>> {
    validate_period("volume sma", period)?;

    if candles.len() < period {
        return Ok(None);
    }

    let sum = checked_sum(candles[candles.len() - period..].iter().map(|c| c.volume));
    Ok(sum.map(|sum| sum / Decimal::from(period)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn ramp(n: i64) -> Vec<Decimal> {
        (1..=n).map(Decimal::from).collect()
    }

    #[test]
    fn test_sma_undefined_until_period() {
        let values = ramp(19);
        assert_eq!(sma(&values, 20).unwrap(), None);
    }

    #[test]
    fn test_sma_ramp_uses_last_period_values() {
        // 1..60 중 마지막 20개 (41..60)의 평균
        let values = ramp(60);
        assert_eq!(sma(&values, 20).unwrap(), Some(dec!(50.5)));
    }

    #[test]
    fn test_sma_overflow_is_gap() {
        let values = vec![Decimal::MAX; 5];
        assert_eq!(sma(&values, 5).unwrap(), None);
        assert_eq!(sma(&values, 1).unwrap(), Some(Decimal::MAX));
    }

    #[test]
    fn test_sma_zero_period_rejected() {
        assert!(sma(&ramp(5), 0).is_err());
    }

    proptest! {
        #[test]
        fn prop_sma_matches_mean_of_tail(
            values in prop::collection::vec(0i64..10_000, 1..80),
            period in 1usize..40,
        ) {
            let values: Vec<Decimal> = values.into_iter().map(Decimal::from).collect();
            let result = sma(&values, period).unwrap();
            if values.len() < period {
                prop_assert!(result.is_none());
            } else {
                let tail = &values[values.len() - period..];
                let expected = tail.iter().sum::<Decimal>() / Decimal::from(period);
                prop_assert_eq!(result, Some(expected));
            }
        }
    }
}
