//! 메모리 연결자를 사용한 세션 수명 주기 테스트.
//!
//! 모든 테스트는 tokio 가상 시간(`start_paused`)에서 실행되므로 재연결/쿨다운 대기가
//! 즉시 진행됩니다.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use neo_core::ScripKey;
use neo_exchange::{
    Connector, ExchangeError, FrameSink, FrameStream, NeoSession, SessionConfig, SessionEvent,
    SocketProfile, SocketState,
};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};

// ==================== 테스트 연결자 ====================

/// 서버 쪽 링크 절반.
struct ServerLink {
    sent: fmpsc::UnboundedReceiver<String>,
    push: fmpsc::UnboundedSender<Result<String, ExchangeError>>,
}

impl ServerLink {
    async fn next_json(&mut self) -> Value {
        let text = tokio::time::timeout(Duration::from_secs(120), self.sent.next())
            .await
            .expect("frame timeout")
            .expect("link closed");
        serde_json::from_str(&text).unwrap()
    }

    fn push(&self, frame: Value) {
        self.push.unbounded_send(Ok(frame.to_string())).unwrap();
    }

    async fn accept_auth(&mut self) {
        let auth = self.next_json().await;
        assert_eq!(auth["type"], "cn");
        self.push(json!({"type": "cn", "stat": "Ok"}));
    }
}

struct MockConnector {
    allowed_opens: usize,
    opens: AtomicUsize,
    links: mpsc::UnboundedSender<ServerLink>,
}

impl MockConnector {
    fn new(allowed_opens: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerLink>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            allowed_opens,
            opens: AtomicUsize::new(0),
            links: tx,
        });
        (connector, rx)
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, _url: &str) -> Result<(FrameSink, FrameStream), ExchangeError> {
        let n = self.opens.fetch_add(1, Ordering::SeqCst);
        if n >= self.allowed_opens {
            return Err(ExchangeError::NetworkError("connection refused".to_string()));
        }

        let (client_tx, server_rx) = fmpsc::unbounded::<String>();
        let (server_tx, client_rx) = fmpsc::unbounded::<Result<String, ExchangeError>>();
        let _ = self.links.send(ServerLink {
            sent: server_rx,
            push: server_tx,
        });

        let sink = client_tx.sink_map_err(|e| ExchangeError::WebSocket(e.to_string()));
        Ok((Box::pin(sink), Box::pin(client_rx)))
    }
}

// ==================== 헬퍼 ====================

fn config() -> SessionConfig {
    SessionConfig::new("token-1", "sid-1", SocketProfile::hsm(Some("ws://mock")))
}

fn key(token: &str) -> ScripKey {
    ScripKey::new("nse_cm", token)
}

async fn next_event(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(600), events.recv())
        .await
        .expect("event timeout")
        .expect("event channel closed")
}

async fn connect(session: &NeoSession, links: &mut mpsc::UnboundedReceiver<ServerLink>) -> ServerLink {
    let handle = {
        let session = session.clone();
        tokio::spawn(async move { session.connect().await })
    };
    let mut link = links.recv().await.unwrap();
    link.accept_auth().await;
    handle.await.unwrap().unwrap();
    link
}

// ==================== 인증 ====================

#[tokio::test(start_paused = true)]
async fn test_connect_sends_auth_and_reaches_connected() {
    let (connector, mut links) = MockConnector::new(usize::MAX);
    let session = NeoSession::spawn(config(), connector);
    let mut events = session.subscribe_events();
    assert_eq!(session.state(), SocketState::Disconnected);

    let handle = {
        let session = session.clone();
        tokio::spawn(async move { session.connect().await })
    };
    let mut link = links.recv().await.unwrap();

    let auth = link.next_json().await;
    assert_eq!(auth, json!({"type": "cn", "Authorization": "token-1", "Sid": "sid-1"}));
    assert_eq!(session.state(), SocketState::Authenticating);

    link.push(json!([{"type": "cn", "stat": "Ok"}]));
    handle.await.unwrap().unwrap();

    assert!(session.is_connected());
    assert!(matches!(next_event(&mut events).await, SessionEvent::AuthSuccess));
    assert!(matches!(next_event(&mut events).await, SessionEvent::Connected));
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_is_terminal() {
    let (connector, mut links) = MockConnector::new(usize::MAX);
    let session = NeoSession::spawn(config(), connector.clone());
    let mut events = session.subscribe_events();

    let handle = {
        let session = session.clone();
        tokio::spawn(async move { session.connect().await })
    };
    let mut link = links.recv().await.unwrap();
    link.next_json().await;
    link.push(json!({"type": "cn", "stat": "NotOk", "message": "Invalid session"}));

    let err = handle.await.unwrap().unwrap_err();
    assert_eq!(err, ExchangeError::Unauthorized("Invalid session".to_string()));
    assert_eq!(session.state(), SocketState::Error);
    assert_eq!(session.last_error(), Some(err));

    match next_event(&mut events).await {
        SessionEvent::AuthFailure(reason) => assert_eq!(reason, "Invalid session"),
        other => panic!("unexpected event: {:?}", other),
    }

    // 재시도 없음
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.opens(), 1);
    assert!(links.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_connect_never_hangs_past_auth_timeout() {
    let (connector, mut links) = MockConnector::new(usize::MAX);
    let session = NeoSession::spawn(config(), connector);

    let handle = {
        let session = session.clone();
        tokio::spawn(async move { session.connect().await })
    };
    let _link = links.recv().await.unwrap();

    let err = handle.await.unwrap().unwrap_err();
    assert!(err.is_auth_error());
    assert_eq!(session.state(), SocketState::Error);
}

#[tokio::test(start_paused = true)]
async fn test_connect_while_connected_is_invalid() {
    let (connector, mut links) = MockConnector::new(usize::MAX);
    let session = NeoSession::spawn(config(), connector);
    let _link = connect(&session, &mut links).await;

    let err = session.connect().await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, ExchangeError::InvalidState(_)));
    assert!(session.is_connected());
}

// ==================== 구독 ====================

#[tokio::test(start_paused = true)]
async fn test_subscriptions_replayed_once_after_reconnect() {
    let (connector, mut links) = MockConnector::new(usize::MAX);
    let session = NeoSession::spawn(config(), connector.clone());

    session
        .subscribe(vec![key("11536"), key("11536"), key("1594")], 1)
        .await
        .unwrap();
    session.subscribe(vec![key("11536")], 1).await.unwrap();
    assert_eq!(session.subscriptions().await.unwrap().len(), 2);

    let mut link = connect(&session, &mut links).await;
    let expected = json!({"type": "mws", "scrips": "nse_cm|11536&nse_cm|1594", "channelnum": 1});
    assert_eq!(link.next_json().await, expected);

    // 서버가 연결을 끊음
    drop(link);

    let mut link = links.recv().await.unwrap();
    link.accept_auth().await;
    assert_eq!(link.next_json().await, expected);

    let extra = tokio::time::timeout(Duration::from_secs(1), link.sent.next()).await;
    assert!(extra.is_err(), "replay must not duplicate subscriptions");
    assert_eq!(connector.opens(), 2);
    assert!(session.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_live_subscribe_and_pause_are_sent_and_replayed() {
    let (connector, mut links) = MockConnector::new(usize::MAX);
    let session = NeoSession::spawn(config(), connector);
    let mut link = connect(&session, &mut links).await;

    session.subscribe(vec![key("1")], 2).await.unwrap();
    assert_eq!(
        link.next_json().await,
        json!({"type": "mws", "scrips": "nse_cm|1", "channelnum": 2})
    );

    session.pause_channels(vec![2]).await.unwrap();
    assert_eq!(link.next_json().await, json!({"type": "cp", "channelnums": [2]}));

    drop(link);
    let mut link = links.recv().await.unwrap();
    link.accept_auth().await;
    assert_eq!(link.next_json().await["type"], "mws");
    assert_eq!(link.next_json().await, json!({"type": "cp", "channelnums": [2]}));

    session.resume_channels(vec![2]).await.unwrap();
    assert_eq!(link.next_json().await, json!({"type": "cr", "channelnums": [2]}));

    session.unsubscribe(vec![key("1")], 2).await.unwrap();
    assert_eq!(
        link.next_json().await,
        json!({"type": "mwu", "scrips": "nse_cm|1", "channelnum": 2})
    );
    assert!(session.subscriptions().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_uses_each_keys_channel() {
    let (connector, mut links) = MockConnector::new(usize::MAX);
    let session = NeoSession::spawn(config(), connector);
    let mut link = connect(&session, &mut links).await;

    session.subscribe(vec![key("1")], 1).await.unwrap();
    link.next_json().await;
    session.subscribe(vec![key("2")], 3).await.unwrap();
    link.next_json().await;

    // 호출자가 넘긴 채널과 무관하게 구독된 채널별로 해제
    session
        .unsubscribe(vec![key("1"), key("2"), key("9")], 5)
        .await
        .unwrap();
    assert_eq!(
        link.next_json().await,
        json!({"type": "mwu", "scrips": "nse_cm|1", "channelnum": 1})
    );
    assert_eq!(
        link.next_json().await,
        json!({"type": "mwu", "scrips": "nse_cm|2", "channelnum": 3})
    );

    let extra = tokio::time::timeout(Duration::from_secs(1), link.sent.next()).await;
    assert!(extra.is_err(), "unknown keys must not produce frames");
    assert!(session.subscriptions().await.unwrap().is_empty());
}

// ==================== 재연결 ====================

#[tokio::test(start_paused = true)]
async fn test_sixth_failure_enters_cooldown() {
    // 최초 연결만 성공하고 이후 모든 재연결은 거부
    let (connector, mut links) = MockConnector::new(1);
    let session = NeoSession::spawn(config(), connector.clone());
    let mut events = session.subscribe_events();
    let link = connect(&session, &mut links).await;

    drop(link);

    loop {
        match next_event(&mut events).await {
            SessionEvent::Error(ExchangeError::RetryExhausted {
                attempts,
                cooldown_secs,
            }) => {
                assert_eq!(attempts, 5);
                assert_eq!(cooldown_secs, 300);
                break;
            }
            SessionEvent::Error(_) | SessionEvent::AuthSuccess | SessionEvent::Connected => {}
            other => panic!("unexpected event: {:?}", other),
        }
    }

    // 최초 1회 + 재연결 5회, 6번째 실패는 소켓을 열지 않음
    assert_eq!(connector.opens(), 6);
    assert_eq!(session.state(), SocketState::Error);
    assert!(matches!(
        session.last_error(),
        Some(ExchangeError::RetryExhausted { .. })
    ));

    // 쿨다운 후 새 사이클 시작
    tokio::time::sleep(Duration::from_secs(301)).await;
    assert_eq!(connector.opens(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let (connector, mut links) = MockConnector::new(usize::MAX);
    let session = NeoSession::spawn(config(), connector.clone());
    let mut events = session.subscribe_events();
    let link = connect(&session, &mut links).await;

    drop(link);
    loop {
        if let SessionEvent::Error(_) = next_event(&mut events).await {
            break;
        }
    }
    assert_eq!(session.state(), SocketState::Connecting);

    session.disconnect().await.unwrap();
    assert_eq!(session.state(), SocketState::Disconnected);
    assert!(matches!(next_event(&mut events).await, SessionEvent::Disconnected));

    // 두 번째 호출은 무시
    session.disconnect().await.unwrap();

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.opens(), 1);
    assert!(links.try_recv().is_err());
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_liveness_deadline_forces_reconnect() {
    let (connector, mut links) = MockConnector::new(usize::MAX);
    let config = config().with_liveness_timeout(Some(Duration::from_secs(45)));
    let session = NeoSession::spawn(config, connector.clone());
    let _link = connect(&session, &mut links).await;

    let second = tokio::time::timeout(Duration::from_secs(120), links.recv()).await;
    assert!(second.unwrap().is_some());
    assert_eq!(connector.opens(), 2);
}

// ==================== 하트비트 및 데이터 ====================

#[tokio::test(start_paused = true)]
async fn test_heartbeat_every_period() {
    let (connector, mut links) = MockConnector::new(usize::MAX);
    let session = NeoSession::spawn(config(), connector);
    let mut link = connect(&session, &mut links).await;

    let started = tokio::time::Instant::now();
    assert_eq!(link.next_json().await, json!({"type": "ti", "scrips": ""}));
    assert!(started.elapsed() >= Duration::from_secs(29));
    assert_eq!(link.next_json().await, json!({"type": "ti", "scrips": ""}));
    assert!(started.elapsed() >= Duration::from_secs(59));
}

#[tokio::test(start_paused = true)]
async fn test_market_data_in_arrival_order() {
    let (connector, mut links) = MockConnector::new(usize::MAX);
    let session = NeoSession::spawn(config(), connector);
    let mut events = session.subscribe_events();
    let link = connect(&session, &mut links).await;

    link.push(json!([
        {"tk": "11536", "e": "nse_cm", "ltp": "100.5"},
        {"garbage": true},
        {"tk": "11536", "e": "nse_cm", "ltp": "101"}
    ]));
    link.push(json!({"tk": "1594", "e": "nse_cm", "ltp": 55}));

    let mut prices = Vec::new();
    while prices.len() < 3 {
        if let SessionEvent::MarketData(tick) = next_event(&mut events).await {
            prices.push(tick.ltp.to_string());
        }
    }
    assert_eq!(prices, vec!["100.5", "101", "55"]);
}
