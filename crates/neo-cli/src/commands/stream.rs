//! 시세 스트림과 업데이트 소켓 명령.

use std::sync::Arc;

use anyhow::{bail, Context};
use neo_core::{AppConfig, EngineKind, MarketTick, QuoteAction, QuoteDecision, ScripKey, Signal};
use neo_exchange::{BackendClient, NeoSession, SessionConfig, SessionEvent};
use neo_strategy::{EngineEvent, SignalEngine};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// `neo stream` 인자.
pub struct StreamArgs {
    /// 쉼표 또는 `&`로 구분된 스크립 키
    pub symbols: String,
    pub channel: u32,
    /// 설정 파일의 엔진 종류 재정의
    pub engine: Option<EngineKind>,
}

/// HSM 소켓에 연결해 구독하고, 신호 엔진을 실행하며 결과를 출력합니다.
pub async fn run_stream(config: &AppConfig, args: StreamArgs) -> anyhow::Result<()> {
    let keys = ScripKey::split(&args.symbols.replace(',', "&"))?;
    if keys.is_empty() {
        bail!("구독할 종목이 없습니다");
    }

    let mut strategy = config.strategy.clone();
    if let Some(kind) = args.engine {
        strategy.engine = kind;
    }

    let mut engine = SignalEngine::from_config(&strategy, &config.candles)?;
    if config.backend.trade_log && strategy.engine != EngineKind::VolatilityQuote {
        let client = BackendClient::new(&config.backend)?;
        engine = engine.with_trade_log(Arc::new(client));
    }
    let engine = Arc::new(engine);

    let session = NeoSession::spawn_websocket(SessionConfig::hsm(&config.session, &config.backoff));
    let mut session_events = session.subscribe_events();
    let mut engine_events = engine.subscribe();

    let runner = {
        let engine = engine.clone();
        let events = session.subscribe_events();
        tokio::spawn(async move { engine.run(events).await })
    };

    session.connect().await.context("HSM 연결 실패")?;
    session.subscribe(keys.clone(), args.channel).await?;
    info!(
        symbols = %ScripKey::join(&keys),
        channel = args.channel,
        engine = ?strategy.engine,
        "스트림 시작"
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("종료 요청");
                break;
            }
            event = session_events.recv() => match event {
                Ok(SessionEvent::MarketData(tick)) => print_tick(&tick),
                Ok(SessionEvent::Error(e)) => warn!(error = %e, "세션 에러"),
                Ok(SessionEvent::AuthFailure(reason)) => {
                    error!(reason = %reason, "인증 실패");
                    break;
                }
                Ok(SessionEvent::Connected) => info!("연결됨"),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "출력 지연으로 이벤트 누락"),
                Err(RecvError::Closed) => break,
            },
            event = engine_events.recv() => match event {
                Ok(EngineEvent::Signal(signal)) if signal.is_actionable() => print_signal(&signal),
                Ok(EngineEvent::Quote(decision)) => print_quote(&decision),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "신호 출력 지연"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.disconnect().await?;
    runner.abort();

    let stats = engine.stats();
    println!(
        "\n처리한 틱: {} | 캔들: {} | 신호: {} | 호가 결정: {}",
        stats.ticks_processed, stats.candles_closed, stats.signals_emitted, stats.quotes_emitted
    );
    Ok(())
}

/// HSI 소켓에 연결해 주문/포지션 업데이트를 출력합니다.
pub async fn run_updates(config: &AppConfig) -> anyhow::Result<()> {
    let session = NeoSession::spawn_websocket(SessionConfig::hsi(&config.session, &config.backoff));
    let mut events = session.subscribe_events();

    session.connect().await.context("HSI 연결 실패")?;
    info!(datacenter = %config.session.datacenter, "업데이트 수신 시작");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.recv() => match event {
                Ok(SessionEvent::Update(value)) => println!("{}", serde_json::to_string_pretty(&value)?),
                Ok(SessionEvent::Error(e)) => warn!(error = %e, "세션 에러"),
                Ok(SessionEvent::AuthFailure(reason)) => {
                    error!(reason = %reason, "인증 실패");
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "출력 지연으로 이벤트 누락"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.disconnect().await?;
    Ok(())
}

fn print_tick(tick: &MarketTick) {
    println!(
        "{:<16} {:>4} LTP {:>10} ({:+}, {:+}%) Vol {}",
        tick.name, tick.exchange, tick.ltp, tick.change, tick.change_percent, tick.volume
    );
}

fn print_signal(signal: &Signal) {
    let mut line = format!(
        ">> {} {} @ {:.2} | {}",
        signal.action,
        signal.display_name(),
        signal.price,
        signal.reason
    );
    if let Some(pnl) = signal.realized_pnl {
        line.push_str(&format!(" | P&L {:.2}", pnl));
    }
    if let Some(stop) = signal.trailing_stop {
        line.push_str(&format!(" | SL {:.2}", stop));
    }
    println!("{}", line);
}

fn print_quote(decision: &QuoteDecision) {
    match decision.action {
        QuoteAction::Quote { bid, ask } => println!(
            "++ {} 호가 제시 | Buy {:.2} | Sell {:.2}",
            decision.name, bid, ask
        ),
        QuoteAction::Cancel => println!(
            "-- {} 호가 취소 | Volatility={:.4} Imbalance={:.3}",
            decision.name, decision.volatility, decision.imbalance
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_list_accepts_commas() {
        let keys = ScripKey::split(&"nse_cm|11536,bse_cm|500325".replace(',', "&")).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1].token, "500325");
    }
}
