//! 심볼별 포지션 상태.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use neo_core::PositionSide;

/// 한 심볼의 포지션 상태.
///
/// 신호 상태 머신만 변경합니다. Flat으로의 전이는 [`PositionState::close`]로만 일어나며,
/// 방향별 진입 카운터는 세션 동안 감소하지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    /// 포지션 방향
    pub side: PositionSide,
    /// 진입가
    pub entry_price: Option<Decimal>,
    /// 트레일링 스탑
    pub trailing_stop: Option<Decimal>,
    /// 목표가
    pub target: Option<Decimal>,
    /// BUY 진입 횟수
    pub buy_entries: u32,
    /// SELL 진입 횟수
    pub sell_entries: u32,
}

impl PositionState {
    /// 포지션이 없는지 확인.
    pub fn is_flat(&self) -> bool {
        self.side == PositionSide::Flat
    }

    /// 롱 진입. 숏 포지션이었다면 그대로 뒤집습니다.
    pub fn open_long(&mut self, entry: Decimal, stop: Decimal, target: Option<Decimal>) {
        self.side = PositionSide::Long;
        self.entry_price = Some(entry);
        self.trailing_stop = Some(stop);
        self.target = target;
        self.buy_entries += 1;
    }

    /// 숏 진입. 롱 포지션이었다면 그대로 뒤집습니다.
    pub fn open_short(&mut self, entry: Decimal, stop: Decimal, target: Option<Decimal>) {
        self.side = PositionSide::Short;
        self.entry_price = Some(entry);
        self.trailing_stop = Some(stop);
        self.target = target;
        self.sell_entries += 1;
    }

    /// 청산 시 실현 손익. 진입가가 없으면 0.
    pub fn pnl_at(&self, close: Decimal, contract_size: Decimal) -> Decimal {
        let Some(entry) = self.entry_price else {
            return Decimal::ZERO;
        };
        match self.side {
            PositionSide::Long => (close - entry) * contract_size,
            PositionSide::Short => (entry - close) * contract_size,
            PositionSide::Flat => Decimal::ZERO,
        }
    }

    /// 포지션 청산 후 실현 손익 반환. 카운터는 유지됩니다.
    pub fn close(&mut self, close: Decimal, contract_size: Decimal) -> Decimal {
        let pnl = self.pnl_at(close, contract_size);
        self.side = PositionSide::Flat;
        self.entry_price = None;
        self.trailing_stop = None;
        self.target = None;
        pnl
    }

    /// 트레일링 스탑을 유리한 방향으로만 갱신합니다.
    ///
    /// 롱은 `candidate`가 더 높을 때, 숏은 더 낮을 때만 반영합니다. 갱신 여부를 반환합니다.
    pub fn ratchet_stop(&mut self, candidate: Decimal) -> bool {
        let tighter = match (self.side, self.trailing_stop) {
            (PositionSide::Long, Some(stop)) => candidate > stop,
            (PositionSide::Short, Some(stop)) => candidate < stop,
            (PositionSide::Long | PositionSide::Short, None) => true,
            (PositionSide::Flat, _) => false,
        };
        if tighter {
            self.trailing_stop = Some(candidate);
        }
        tighter
    }

    /// 종가가 트레일링 스탑에 닿았는지 확인.
    pub fn stop_hit(&self, close: Decimal) -> bool {
        match (self.side, self.trailing_stop) {
            (PositionSide::Long, Some(stop)) => close <= stop,
            (PositionSide::Short, Some(stop)) => close >= stop,
            _ => false,
        }
    }

    /// 종가가 목표가에 닿았는지 확인.
    pub fn target_hit(&self, close: Decimal) -> bool {
        match (self.side, self.target) {
            (PositionSide::Long, Some(target)) => close >= target,
            (PositionSide::Short, Some(target)) => close <= target,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_long_lifecycle() {
        let mut state = PositionState::default();
        assert!(state.is_flat());

        state.open_long(dec!(100), dec!(97), Some(dec!(108)));
        assert_eq!(state.side, PositionSide::Long);
        assert_eq!(state.buy_entries, 1);
        assert!(!state.target_hit(dec!(107.99)));
        assert!(state.target_hit(dec!(108)));

        let pnl = state.close(dec!(108), dec!(50));
        assert_eq!(pnl, dec!(400));
        assert!(state.is_flat());
        assert_eq!(state.trailing_stop, None);
        assert_eq!(state.buy_entries, 1);
    }

    #[test]
    fn test_ratchet_never_loosens() {
        let mut state = PositionState::default();
        state.open_long(dec!(100), dec!(97), None);

        assert!(state.ratchet_stop(dec!(99)));
        assert!(!state.ratchet_stop(dec!(98)));
        assert_eq!(state.trailing_stop, Some(dec!(99)));

        let mut short = PositionState::default();
        short.open_short(dec!(100), dec!(103), None);
        assert!(short.ratchet_stop(dec!(101)));
        assert!(!short.ratchet_stop(dec!(102)));
        assert_eq!(short.trailing_stop, Some(dec!(101)));
        assert!(short.stop_hit(dec!(101)));
        assert_eq!(short.pnl_at(dec!(101), dec!(50)), dec!(-50));
    }

    #[test]
    fn test_flip_keeps_counters() {
        let mut state = PositionState::default();
        state.open_short(dec!(100), dec!(103), None);
        state.open_long(dec!(95), dec!(92), None);

        assert_eq!(state.side, PositionSide::Long);
        assert_eq!(state.sell_entries, 1);
        assert_eq!(state.buy_entries, 1);
        assert!(!state.ratchet_stop(dec!(91)));
    }
}
