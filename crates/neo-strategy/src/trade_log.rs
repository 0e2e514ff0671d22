//! 매매 기록 전송.
//!
//! BUY/SELL/EXIT 신호마다 한 줄짜리 기록을 만들어 [`TradeLogSink`]로 비동기 전송합니다.
//! 전송 실패는 로그로만 남기며 이미 일어난 상태 전이에 영향을 주지 않습니다.

use std::fmt::Display;
use std::sync::Arc;

use chrono::Local;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use neo_core::{ExitKind, Signal, SignalAction};
use neo_exchange::{ExchangeError, TradeLogSink};

/// 매매 기록 에러.
#[derive(Debug, Error)]
pub enum TradeLogError {
    /// 기록할 대상이 아닌 신호 (HOLD)
    #[error("기록 대상이 아닌 신호: {0}")]
    NotLoggable(SignalAction),

    /// 전송처 에러
    #[error("매매 기록 전송 실패 ({sink}): {source}")]
    Sink {
        sink: String,
        #[source]
        source: ExchangeError,
    },
}

/// 신호에 대한 기록 메시지. HOLD는 `None`.
///
/// ```text
/// {시각} | BUY | {종목} | Entry: 15.00
/// {시각} | EXIT TARGET | {종목} | Exit: 108.00 | P&L: 400.00
/// {시각} | EXIT | {종목} | Exit: 101.00 | P&L: 50.00
/// ```
pub fn format_trade_message(signal: &Signal, stamp: impl Display) -> Option<String> {
    let symbol = signal.display_name();
    match signal.action {
        SignalAction::Buy | SignalAction::Sell => Some(format!(
            "{} | {} | {} | Entry: {:.2}",
            stamp, signal.action, symbol, signal.price
        )),
        SignalAction::Exit => {
            let label = match signal.exit_kind {
                Some(ExitKind::Target) => "EXIT TARGET",
                _ => "EXIT",
            };
            let pnl = signal.realized_pnl.unwrap_or_default();
            Some(format!(
                "{} | {} | {} | Exit: {:.2} | P&L: {:.2}",
                stamp, label, symbol, signal.price, pnl
            ))
        }
        SignalAction::Hold => None,
    }
}

/// 현지 시각 표기 (예: `10/17/2026, 9:45:12 AM`).
pub fn local_stamp() -> String {
    Local::now().format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

/// 매매 기록 전송기.
#[derive(Clone)]
pub struct TradeLogger {
    sink: Arc<dyn TradeLogSink>,
}

impl TradeLogger {
    /// 새 전송기 생성.
    pub fn new(sink: Arc<dyn TradeLogSink>) -> Self {
        Self { sink }
    }

    /// 신호 기록을 즉시 전송하고 결과를 기다립니다.
    pub async fn send(&self, signal: &Signal) -> Result<(), TradeLogError> {
        let message = format_trade_message(signal, local_stamp())
            .ok_or(TradeLogError::NotLoggable(signal.action))?;

        self.sink
            .log_trade(&message)
            .await
            .map_err(|source| TradeLogError::Sink {
                sink: self.sink.name().to_string(),
                source,
            })
    }

    /// 신호 기록을 런타임 태스크로 전송합니다. HOLD는 전송하지 않습니다.
    pub fn dispatch(&self, signal: &Signal) -> Option<JoinHandle<()>> {
        if !signal.is_actionable() {
            return None;
        }

        let logger = self.clone();
        let signal = signal.clone();
        Some(tokio::spawn(async move {
            match logger.send(&signal).await {
                Ok(()) => debug!(symbol = %signal.symbol, action = %signal.action, "매매 기록 전송 완료"),
                Err(e) => error!(symbol = %signal.symbol, error = %e, "Failed to log trade"),
            }
        }))
    }
}

impl std::fmt::Debug for TradeLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeLogger")
            .field("sink", &self.sink.name())
            .finish()
    }
}
