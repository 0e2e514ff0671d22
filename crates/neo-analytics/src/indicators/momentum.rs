//! 모멘텀 지표.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{validate_period, IndicatorResult};

/// 상대강도지수.
///
/// 종가가 `period + 1`개 미만이면 `None`입니다. 마지막 `period`개 변화량의 이익/손실 합으로
/// `100 - 100 / (1 + gains / losses)`를 계산하며, 손실 합이 0이면 1로 둡니다.
/// 계산 중 오버플로가 나면 `None`입니다.
pub fn rsi(closes: &[Decimal], period: usize) -> IndicatorResult<Option<Decimal>> {
    validate_period("rsi", period)?;

    if closes.len() < period + 1 {
        return Ok(None);
    }

    Ok(rsi_from_window(&closes[closes.len() - period - 1..]))
}

fn rsi_from_window(window: &[Decimal]) -> Option<Decimal> {
    let mut gains = Decimal::ZERO;
    let mut losses = Decimal::ZERO;
    for pair in window.windows(2) {
        let diff = pair[1].checked_sub(pair[0])?;
        if diff >= Decimal::ZERO {
            gains = gains.checked_add(diff)?;
        } else {
            losses = losses.checked_add(diff.abs())?;
        }
    }

    if losses.is_zero() {
        losses = Decimal::ONE;
    }

    let rs = gains.checked_div(losses)?;
    let denominator = Decimal::ONE.checked_add(rs)?;
    Some(dec!(100) - dec!(100) / denominator)
}
