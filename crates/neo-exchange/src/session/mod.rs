//! 브로커 소켓 세션.
//!
//! [`NeoSession`]은 호출자가 소유하는 명시적 세션 핸들입니다. 실제 상태는 별도 태스크에서
//! 실행되는 드라이버가 소유하며, 모든 상태 전이는 명령 채널을 통해 직렬화됩니다.
//! 여러 세션(HSM, HSI)이 타이머나 카운터를 공유하지 않고 공존할 수 있습니다.
//!
//! # 상태 전이
//!
//! ```text
//! Disconnected ──connect()──> Connecting ──socket open──> Authenticating
//!                                 ▲                          │       │
//!                                 │                   ack ok │       │ ack 실패 / 종료 / 타임아웃
//!                          Retry  │                          ▼       ▼
//!                                 └──unexpected close── Connected   Error
//!                                                            │
//!                                       Exhausted ───────────┴──> Error (쿨다운 후 재시도 가능)
//!
//! 모든 상태 ──disconnect()──> Disconnected
//! ```
//!
//! # 이벤트
//!
//! 연결/인증/에러/시세 이벤트는 `broadcast` 채널로 전달됩니다. 느린 구독자는 이벤트를
//! 잃을 수 있지만 수신 루프를 막지는 않습니다.

mod driver;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use neo_core::{BackoffConfig, FeedConfig, MarketTick, ScripKey, SocketKind};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::Instrument;

use crate::backoff::BackoffPolicy;
use crate::protocol::SocketProfile;
use crate::registry::Subscription;
use crate::transport::{Connector, TungsteniteConnector};
use crate::ExchangeError;

use driver::SessionDriver;

/// 명령 채널 버퍼 크기.
const COMMAND_BUFFER: usize = 64;

/// 세션 설정. 연결 시도가 시작된 후에는 변경되지 않습니다.
#[derive(Debug)]
pub struct SessionConfig {
    /// 세션 토큰
    pub token: SecretString,
    /// 세션 ID
    pub sid: SecretString,
    /// 소켓 프로파일
    pub profile: SocketProfile,
    /// 하트비트 간격
    pub heartbeat_interval: Duration,
    /// 인증 응답 대기 시간
    pub auth_timeout: Duration,
    /// 소켓 연결 대기 시간
    pub connect_timeout: Duration,
    /// 수신 프레임이 없을 때 재연결을 강제하는 시간
    pub liveness_timeout: Option<Duration>,
    /// 재연결 정책
    pub backoff: BackoffPolicy,
    /// 쿨다운 후 자동 재시도 여부
    pub retry_after_cooldown: bool,
    /// 채널 일시정지 시 자동 재시도 중단 여부
    pub pause_suspends_retry: bool,
    /// 이벤트 버퍼 크기
    pub event_buffer: usize,
}

impl SessionConfig {
    /// 기본값으로 세션 설정 생성.
    pub fn new(token: impl Into<String>, sid: impl Into<String>, profile: SocketProfile) -> Self {
        Self {
            token: SecretString::from(token.into()),
            sid: SecretString::from(sid.into()),
            profile,
            heartbeat_interval: Duration::from_secs(30),
            auth_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            liveness_timeout: None,
            backoff: BackoffPolicy::default(),
            retry_after_cooldown: true,
            pause_suspends_retry: false,
            event_buffer: 1024,
        }
    }

    /// 시세(HSM) 세션 설정.
    pub fn hsm(feed: &FeedConfig, backoff: &BackoffConfig) -> Self {
        let profile = SocketProfile::hsm(feed.hsm_url.as_deref());
        Self::from_feed(feed, backoff, profile)
    }

    /// 주문 업데이트(HSI) 세션 설정.
    pub fn hsi(feed: &FeedConfig, backoff: &BackoffConfig) -> Self {
        let profile = SocketProfile::hsi(feed.datacenter, &feed.source, feed.hsi_url.as_deref());
        Self::from_feed(feed, backoff, profile)
    }

    fn from_feed(feed: &FeedConfig, backoff: &BackoffConfig, profile: SocketProfile) -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(feed.heartbeat_secs.max(1)),
            auth_timeout: Duration::from_secs(feed.auth_timeout_secs),
            connect_timeout: Duration::from_secs(feed.connect_timeout_secs),
            liveness_timeout: feed.liveness_timeout_secs.map(Duration::from_secs),
            backoff: BackoffPolicy::from(backoff),
            retry_after_cooldown: feed.retry_after_cooldown,
            pause_suspends_retry: feed.pause_suspends_retry,
            event_buffer: feed.event_buffer.max(1),
            ..Self::new(feed.token.clone(), feed.sid.clone(), profile)
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    pub fn with_liveness_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.liveness_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = policy;
        self
    }

    pub fn with_retry_after_cooldown(mut self, enabled: bool) -> Self {
        self.retry_after_cooldown = enabled;
        self
    }

    pub fn with_pause_suspends_retry(mut self, enabled: bool) -> Self {
        self.pause_suspends_retry = enabled;
        self
    }
}

/// 소켓 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketState {
    #[default]
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
    Error,
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocketState::Disconnected => "disconnected",
            SocketState::Connecting => "connecting",
            SocketState::Authenticating => "authenticating",
            SocketState::Connected => "connected",
            SocketState::Error => "error",
        };
        f.write_str(name)
    }
}

/// 세션 이벤트.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// 인증 완료 후 연결됨
    Connected,
    /// 호출자 요청으로 연결 해제됨
    Disconnected,
    /// 전송/재시도 에러
    Error(ExchangeError),
    /// 인증 성공
    AuthSuccess,
    /// 인증 실패 (사유)
    AuthFailure(String),
    /// 정규화된 시세 틱
    MarketData(MarketTick),
    /// 주문/포지션 업데이트
    Update(Value),
}

/// 조회 가능한 세션 상태.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStatus {
    /// 현재 상태
    pub state: SocketState,
    /// 마지막 에러
    pub last_error: Option<ExchangeError>,
}

type Reply = oneshot::Sender<Result<(), ExchangeError>>;

/// 드라이버로 보내는 명령.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Connect { reply: Reply },
    Disconnect { reply: Reply },
    Subscribe { keys: Vec<ScripKey>, channel: u32, reply: Reply },
    Unsubscribe { keys: Vec<ScripKey>, channel: u32, reply: Reply },
    Pause { channels: Vec<u32>, reply: Reply },
    Resume { channels: Vec<u32>, reply: Reply },
    Snapshot { reply: oneshot::Sender<Vec<Subscription>> },
}

/// 세션 핸들.
///
/// 복제해도 같은 세션을 가리킵니다. 모든 핸들이 drop되면 드라이버는 연결을 해제하고
/// 종료합니다.
#[derive(Debug, Clone)]
pub struct NeoSession {
    kind: SocketKind,
    commands: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
    status: watch::Receiver<SessionStatus>,
}

impl NeoSession {
    /// 주어진 연결자로 세션 드라이버를 시작합니다. tokio 런타임 안에서 호출해야 합니다.
    pub fn spawn(config: SessionConfig, connector: Arc<dyn Connector>) -> Self {
        let kind = config.profile.kind;
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, _) = broadcast::channel(config.event_buffer.max(1));
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());

        let driver = SessionDriver::new(config, connector, event_tx.clone(), status_tx);
        let span = neo_core::session_span!(kind);
        tokio::spawn(driver.run(command_rx).instrument(span));

        Self {
            kind,
            commands: command_tx,
            events: event_tx,
            status: status_rx,
        }
    }

    /// WebSocket 연결자로 세션을 시작합니다.
    pub fn spawn_websocket(config: SessionConfig) -> Self {
        Self::spawn(config, Arc::new(TungsteniteConnector))
    }

    /// 소켓 종류.
    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    /// 연결하고 인증 완료(또는 실패)까지 기다립니다.
    ///
    /// 이미 연결 중이거나 연결된 세션에서 호출하면 `InvalidState`를 반환합니다.
    pub async fn connect(&self) -> Result<(), ExchangeError> {
        self.request(|reply| SessionCommand::Connect { reply }).await
    }

    /// 연결을 해제합니다. 어떤 상태에서도 안전하며, 반환 이후에는 재시도가 실행되지 않습니다.
    pub async fn disconnect(&self) -> Result<(), ExchangeError> {
        self.request(|reply| SessionCommand::Disconnect { reply }).await
    }

    /// 스크립을 구독합니다. 연결 전이면 연결 시 전송됩니다.
    pub async fn subscribe(&self, keys: Vec<ScripKey>, channel: u32) -> Result<(), ExchangeError> {
        self.request(|reply| SessionCommand::Subscribe {
            keys,
            channel,
            reply,
        })
        .await
    }

    /// 구독을 해제합니다.
    pub async fn unsubscribe(&self, keys: Vec<ScripKey>, channel: u32) -> Result<(), ExchangeError> {
        self.request(|reply| SessionCommand::Unsubscribe {
            keys,
            channel,
            reply,
        })
        .await
    }

    /// 채널을 일시정지합니다.
    pub async fn pause_channels(&self, channels: Vec<u32>) -> Result<(), ExchangeError> {
        self.request(|reply| SessionCommand::Pause { channels, reply })
            .await
    }

    /// 채널을 재개합니다.
    pub async fn resume_channels(&self, channels: Vec<u32>) -> Result<(), ExchangeError> {
        self.request(|reply| SessionCommand::Resume { channels, reply })
            .await
    }

    /// 현재 원하는 구독 목록.
    pub async fn subscriptions(&self) -> Result<Vec<Subscription>, ExchangeError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Snapshot { reply })
            .await
            .map_err(|_| ExchangeError::SessionClosed)?;
        rx.await.map_err(|_| ExchangeError::SessionClosed)
    }

    /// 현재 소켓 상태.
    pub fn state(&self) -> SocketState {
        self.status.borrow().state
    }

    /// 인증까지 완료되었는지 확인.
    pub fn is_connected(&self) -> bool {
        self.state() == SocketState::Connected
    }

    /// 마지막 에러.
    pub fn last_error(&self) -> Option<ExchangeError> {
        self.status.borrow().last_error.clone()
    }

    /// 이벤트 수신자 생성.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// 상태 변경 감시자.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    async fn request<F>(&self, build: F) -> Result<(), ExchangeError>
    where
        F: FnOnce(Reply) -> SessionCommand,
    {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| ExchangeError::SessionClosed)?;
        rx.await.map_err(|_| ExchangeError::SessionClosed)?
    }
}
