//! 세션 드라이버 태스크.
//!
//! 소켓, 타이머, 레지스트리, 백오프 카운터를 단독으로 소유합니다. 한 번에 하나의 명령 또는
//! 하나의 프레임(배치)만 처리하므로 상태 전이가 겹치지 않습니다.
//!
//! 타이머는 하트비트, 인증 기한, 재연결, 생존 기한 네 가지이며 각각 최대 하나만 존재합니다.
//! 새 상태로 들어갈 때 이전 상태의 타이머를 먼저 해제합니다.

use std::collections::BTreeMap;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{interval_at, sleep, timeout, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, error, info, trace, warn};

use neo_core::ScripKey;

use super::{SessionCommand, SessionConfig, SessionEvent, SessionStatus, SocketState};
use crate::backoff::{BackoffController, BackoffDecision};
use crate::normalizer::{AuthAck, Inbound, SubscriptionAck, TickNormalizer};
use crate::protocol::ClientFrame;
use crate::registry::SubscriptionRegistry;
use crate::transport::{Connector, FrameSink, FrameStream};
use crate::ExchangeError;

type Timer = Option<Pin<Box<Sleep>>>;

/// select 결과.
enum Step {
    Command(SessionCommand),
    Shutdown,
    Frame(Option<Result<String, ExchangeError>>),
    Heartbeat,
    AuthTimeout,
    Reconnect,
    LivenessTimeout,
}

pub(crate) struct SessionDriver {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    registry: SubscriptionRegistry,
    backoff: BackoffController,
    normalizer: TickNormalizer,
    events: broadcast::Sender<SessionEvent>,
    status: watch::Sender<SessionStatus>,
    state: SocketState,

    sink: Option<FrameSink>,
    stream: Option<FrameStream>,

    heartbeat: Option<Interval>,
    auth_deadline: Timer,
    reconnect: Timer,
    liveness: Timer,

    pending_connects: Vec<oneshot::Sender<Result<(), ExchangeError>>>,
    /// 현재 소켓이 재연결 사이클에서 열렸는지 여부
    reconnecting: bool,
    /// 예약된 재연결이 쿨다운 종료 시점인지 여부
    cooldown_pending: bool,
    /// 채널 일시정지로 자동 재시도가 중단되었는지 여부
    retry_suspended: bool,
}

impl SessionDriver {
    pub(crate) fn new(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        events: broadcast::Sender<SessionEvent>,
        status: watch::Sender<SessionStatus>,
    ) -> Self {
        let kind = config.profile.kind;
        let backoff = BackoffController::new(config.backoff.clone());
        Self {
            config,
            connector,
            registry: SubscriptionRegistry::new(),
            backoff,
            normalizer: TickNormalizer::new(kind),
            events,
            status,
            state: SocketState::Disconnected,
            sink: None,
            stream: None,
            heartbeat: None,
            auth_deadline: None,
            reconnect: None,
            liveness: None,
            pending_connects: Vec::new(),
            reconnecting: false,
            cooldown_pending: false,
            retry_suspended: false,
        }
    }

    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        debug!(connector = self.connector.name(), url = %self.config.profile.url, "세션 드라이버 시작");

        loop {
            let step = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => Step::Shutdown,
                },
                frame = next_frame(&mut self.stream) => Step::Frame(frame),
                _ = next_tick(&mut self.heartbeat) => Step::Heartbeat,
                _ = expire(&mut self.auth_deadline) => Step::AuthTimeout,
                _ = expire(&mut self.reconnect) => Step::Reconnect,
                _ = expire(&mut self.liveness) => Step::LivenessTimeout,
            };

            match step {
                Step::Command(command) => self.handle_command(command).await,
                Step::Shutdown => {
                    info!("모든 세션 핸들이 해제됨, 드라이버 종료");
                    self.disconnect().await;
                    break;
                }
                Step::Frame(Some(Ok(text))) => self.handle_frame(&text).await,
                Step::Frame(Some(Err(e))) => self.on_link_lost(e).await,
                Step::Frame(None) => {
                    self.on_link_lost(ExchangeError::Disconnected("stream ended".to_string()))
                        .await
                }
                Step::Heartbeat => self.send_heartbeat().await,
                Step::AuthTimeout => {
                    self.auth_deadline = None;
                    let secs = self.config.auth_timeout.as_secs();
                    warn!(timeout_secs = secs, "인증 응답 시간 초과");
                    self.on_handshake_failed(
                        format!("authentication timed out after {}s", secs),
                        true,
                    )
                    .await;
                }
                Step::Reconnect => {
                    self.reconnect = None;
                    if self.cooldown_pending {
                        info!("쿨다운 종료, 재연결 카운터 초기화");
                        self.cooldown_pending = false;
                        self.backoff.reset();
                    }
                    self.open_socket(true).await;
                }
                Step::LivenessTimeout => {
                    self.liveness = None;
                    warn!("생존 기한 내 수신 프레임 없음, 재연결 강제");
                    self.on_link_lost(ExchangeError::Timeout("no frame within liveness window".to_string()))
                        .await;
                }
            }
        }
    }

    // ==================== 명령 처리 ====================

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect { reply } => {
                match self.state {
                    SocketState::Connecting
                    | SocketState::Authenticating
                    | SocketState::Connected => {
                        let _ = reply.send(Err(ExchangeError::InvalidState(format!(
                            "session is already {}",
                            self.state
                        ))));
                    }
                    SocketState::Disconnected | SocketState::Error => {
                        self.pending_connects.push(reply);
                        self.reconnect = None;
                        self.cooldown_pending = false;
                        self.backoff.reset();
                        self.open_socket(false).await;
                    }
                }
            }
            SessionCommand::Disconnect { reply } => {
                self.disconnect().await;
                let _ = reply.send(Ok(()));
            }
            SessionCommand::Subscribe {
                keys,
                channel,
                reply,
            } => {
                let added: Vec<_> = keys
                    .into_iter()
                    .filter(|key| self.registry.want(key.clone(), channel))
                    .collect();
                debug!(channel, added = added.len(), "구독 요청");

                if !added.is_empty() && self.state == SocketState::Connected {
                    self.send_or_fail(ClientFrame::subscribe(&added, channel)).await;
                }
                let _ = reply.send(Ok(()));
            }
            SessionCommand::Unsubscribe {
                keys,
                channel,
                reply,
            } => {
                // 해제 프레임은 각 키가 실제로 구독된 채널로 보냄
                let mut removed: BTreeMap<u32, Vec<ScripKey>> = BTreeMap::new();
                for subscription in keys.iter().filter_map(|key| self.registry.unwant(key)) {
                    removed
                        .entry(subscription.channel)
                        .or_default()
                        .push(subscription.key);
                }
                debug!(
                    channel,
                    removed = removed.values().map(Vec::len).sum::<usize>(),
                    "구독 해제 요청"
                );

                if self.state == SocketState::Connected {
                    for (subscribed_channel, keys) in removed {
                        let frame = ClientFrame::unsubscribe(&keys, subscribed_channel);
                        if !self.send_or_fail(frame).await {
                            break;
                        }
                    }
                }
                let _ = reply.send(Ok(()));
            }
            SessionCommand::Pause { channels, reply } => {
                for channel in &channels {
                    self.registry.pause(*channel);
                }
                if self.config.pause_suspends_retry {
                    self.retry_suspended = true;
                    if self.reconnect.take().is_some() {
                        info!("채널 일시정지로 예약된 재연결 취소");
                    }
                }
                if self.state == SocketState::Connected {
                    self.send_or_fail(ClientFrame::PauseChannels {
                        channelnums: channels,
                    })
                    .await;
                }
                let _ = reply.send(Ok(()));
            }
            SessionCommand::Resume { channels, reply } => {
                for channel in &channels {
                    self.registry.resume(*channel);
                }
                self.retry_suspended = false;
                if self.state == SocketState::Connected {
                    self.send_or_fail(ClientFrame::ResumeChannels {
                        channelnums: channels,
                    })
                    .await;
                }
                let _ = reply.send(Ok(()));
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.registry.snapshot());
            }
        }
    }

    /// 연결 해제. 몇 번을 호출해도 안전합니다.
    async fn disconnect(&mut self) {
        self.reconnect = None;
        self.cooldown_pending = false;
        self.reconnecting = false;
        self.close_link().await;
        self.registry.clear_acknowledgements();
        self.backoff.reset();
        self.resolve_pending(Err(ExchangeError::Disconnected(
            "disconnected by caller".to_string(),
        )));

        if self.state != SocketState::Disconnected {
            info!("세션 연결 해제");
            self.set_state(SocketState::Disconnected);
            self.emit(SessionEvent::Disconnected);
        }
    }

    // ==================== 연결 수명 주기 ====================

    async fn open_socket(&mut self, reconnecting: bool) {
        self.close_link().await;
        self.reconnecting = reconnecting;
        self.set_state(SocketState::Connecting);

        let url = self.config.profile.url.clone();
        let opened = match timeout(self.config.connect_timeout, self.connector.open(&url)).await {
            Ok(result) => result,
            Err(_) => Err(ExchangeError::Timeout(format!(
                "socket open timed out after {}s",
                self.config.connect_timeout.as_secs()
            ))),
        };

        match opened {
            Ok((sink, stream)) => {
                self.sink = Some(sink);
                self.stream = Some(stream);
                self.on_socket_open().await;
            }
            Err(e) if reconnecting => {
                warn!(error = %e, "재연결 소켓 열기 실패");
                self.schedule_reconnect(e);
            }
            Err(e) => {
                error!(error = %e, "소켓 열기 실패");
                self.fail(e.clone());
                self.emit(SessionEvent::Error(e.clone()));
                self.resolve_pending(Err(e));
            }
        }
    }

    async fn on_socket_open(&mut self) {
        info!(url = %self.config.profile.url, "소켓 열림, 인증 요청");
        self.set_state(SocketState::Authenticating);

        let auth = self.config.profile.auth_frame(
            self.config.token.expose_secret(),
            self.config.sid.expose_secret(),
        );
        if !self.send_or_fail(auth).await {
            return;
        }

        let period = self.config.heartbeat_interval;
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.heartbeat = Some(heartbeat);
        self.auth_deadline = Some(Box::pin(sleep(self.config.auth_timeout)));
        self.arm_liveness();
    }

    async fn on_auth_ack(&mut self, ack: AuthAck) {
        if self.state != SocketState::Authenticating {
            debug!(success = ack.success, "인증 단계가 아닌 상태에서 인증 응답 수신, 무시");
            return;
        }

        if !ack.success {
            let reason = ack
                .reason
                .unwrap_or_else(|| "Authentication failed".to_string());
            warn!(reason = %reason, "인증 실패");
            self.on_handshake_failed(reason, false).await;
            return;
        }

        self.auth_deadline = None;
        self.reconnecting = false;
        self.backoff.reset();
        self.set_state(SocketState::Connected);
        info!(subscriptions = self.registry.len(), "인증 성공");

        self.emit(SessionEvent::AuthSuccess);
        self.emit(SessionEvent::Connected);
        self.resolve_pending(Ok(()));

        self.replay_subscriptions().await;
    }

    /// 레지스트리의 구독과 일시정지 채널을 다시 전송합니다.
    async fn replay_subscriptions(&mut self) {
        for (channel, keys) in self.registry.replay_batches() {
            debug!(channel, count = keys.len(), "구독 재전송");
            if !self.send_or_fail(ClientFrame::subscribe(&keys, channel)).await {
                return;
            }
        }

        let paused = self.registry.paused_channels();
        if !paused.is_empty() {
            debug!(channels = ?paused, "일시정지 채널 재전송");
            self.send_or_fail(ClientFrame::PauseChannels { channelnums: paused })
                .await;
        }
    }

    /// 인증 단계 실패.
    ///
    /// 명시적인 인증 거부는 재시도하지 않습니다. 재연결 사이클 중 응답 없이 끊기거나 시간이
    /// 초과된 경우에만 전송 실패로 간주하고 사이클을 이어갑니다.
    async fn on_handshake_failed(&mut self, reason: String, transport: bool) {
        self.close_link().await;

        if transport && self.reconnecting {
            self.schedule_reconnect(ExchangeError::Disconnected(reason));
            return;
        }

        let err = ExchangeError::Unauthorized(reason.clone());
        self.reconnecting = false;
        self.fail(err.clone());
        self.emit(SessionEvent::AuthFailure(reason));
        self.resolve_pending(Err(err));
    }

    /// 예기치 않은 소켓 종료나 송신 실패.
    async fn on_link_lost(&mut self, cause: ExchangeError) {
        match self.state {
            SocketState::Authenticating => {
                warn!(error = %cause, "인증 중 소켓 종료");
                self.on_handshake_failed("WebSocket closed during authentication".to_string(), true)
                    .await;
            }
            SocketState::Connected => {
                warn!(error = %cause, "연결 끊김");
                self.close_link().await;
                self.emit(SessionEvent::Error(cause.clone()));
                self.schedule_reconnect(cause);
            }
            _ => {
                debug!(state = %self.state, error = %cause, "비활성 링크 종료 무시");
                self.close_link().await;
            }
        }
    }

    /// 백오프 정책에 따라 재연결을 예약합니다.
    fn schedule_reconnect(&mut self, cause: ExchangeError) {
        self.registry.clear_acknowledgements();

        if self.retry_suspended {
            info!("채널 일시정지 상태, 자동 재연결 생략");
            self.reconnecting = false;
            self.fail(cause);
            return;
        }

        match self.backoff.on_failure() {
            BackoffDecision::Retry { attempt, after } => {
                info!(
                    attempt,
                    max_attempts = self.backoff.policy().max_attempts,
                    delay_ms = after.as_millis() as u64,
                    "재연결 예약"
                );
                self.record_error(cause);
                self.set_state(SocketState::Connecting);
                self.reconnect = Some(Box::pin(sleep(after)));
            }
            BackoffDecision::Exhausted { after } => {
                let err = ExchangeError::RetryExhausted {
                    attempts: self.backoff.attempts(),
                    cooldown_secs: after.as_secs(),
                };
                error!(error = %err, "최대 재연결 시도 횟수 초과");
                self.reconnecting = false;
                self.fail(err.clone());
                self.emit(SessionEvent::Error(err));

                if self.config.retry_after_cooldown {
                    self.cooldown_pending = true;
                    self.reconnect = Some(Box::pin(sleep(after)));
                }
            }
        }
    }

    // ==================== 수신 처리 ====================

    async fn handle_frame(&mut self, text: &str) {
        trace!(frame = text, "프레임 수신");
        self.arm_liveness();

        let items = match self.normalizer.normalize_frame(text, Utc::now()) {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "프레임 파싱 실패, 건너뜀");
                return;
            }
        };

        for item in items {
            if !matches!(
                self.state,
                SocketState::Authenticating | SocketState::Connected
            ) {
                break;
            }

            match item {
                Inbound::AuthAck(ack) => self.on_auth_ack(ack).await,
                Inbound::SubscriptionAck(ack) => self.on_subscription_ack(ack),
                Inbound::Heartbeat => trace!("하트비트 응답"),
                Inbound::Tick(tick) => self.emit(SessionEvent::MarketData(tick)),
                Inbound::Update(update) => self.emit(SessionEvent::Update(update)),
            }
        }
    }

    fn on_subscription_ack(&mut self, ack: SubscriptionAck) {
        if ack.kind != "mws" && ack.kind != "sub" {
            debug!(kind = %ack.kind, "구독 응답");
            return;
        }

        if ack.keys.is_empty() {
            if let Some(channel) = ack.channel {
                let count = self.registry.acknowledge_channel(channel);
                debug!(channel, count, "채널 구독 확인");
            }
        } else {
            for key in &ack.keys {
                self.registry.acknowledge(key);
            }
            debug!(count = ack.keys.len(), "구독 확인");
        }
    }

    async fn send_heartbeat(&mut self) {
        let frame = self.config.profile.heartbeat_frame();
        trace!(kind = frame.kind(), "하트비트 전송");
        self.send_or_fail(frame).await;
    }

    // ==================== 보조 ====================

    /// 프레임을 전송합니다. 실패하면 링크 종료로 처리하고 `false`를 반환합니다.
    async fn send_or_fail(&mut self, frame: ClientFrame) -> bool {
        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, kind = frame.kind(), "프레임 인코딩 실패");
                return true;
            }
        };

        let result = match self.sink.as_mut() {
            Some(sink) => sink.send(text).await,
            None => Err(ExchangeError::Disconnected("no open socket".to_string())),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, kind = frame.kind(), "프레임 전송 실패");
                self.on_link_lost(e).await;
                false
            }
        }
    }

    /// 소켓과 링크에 속한 타이머를 해제합니다. 재연결 타이머는 건드리지 않습니다.
    async fn close_link(&mut self) {
        self.heartbeat = None;
        self.auth_deadline = None;
        self.liveness = None;
        self.stream = None;
        if let Some(mut sink) = self.sink.take() {
            if let Ok(Err(e)) = timeout(self.config.connect_timeout, sink.close()).await {
                debug!(error = %e, "소켓 닫기 실패");
            }
        }
    }

    fn arm_liveness(&mut self) {
        if let Some(window) = self.config.liveness_timeout {
            self.liveness = Some(Box::pin(sleep(window)));
        }
    }

    fn set_state(&mut self, state: SocketState) {
        if self.state == state {
            return;
        }
        debug!(from = %self.state, to = %state, "상태 전이");
        self.state = state;
        self.status.send_modify(|status| status.state = state);
    }

    fn record_error(&mut self, err: ExchangeError) {
        self.status
            .send_modify(|status| status.last_error = Some(err));
    }

    /// 에러 상태로 전이하고 마지막 에러를 기록합니다.
    fn fail(&mut self, err: ExchangeError) {
        self.record_error(err);
        self.set_state(SocketState::Error);
    }

    fn emit(&self, event: SessionEvent) {
        // 구독자가 없으면 버려집니다.
        let _ = self.events.send(event);
    }

    fn resolve_pending(&mut self, result: Result<(), ExchangeError>) {
        for reply in self.pending_connects.drain(..) {
            let _ = reply.send(result.clone());
        }
    }
}

async fn next_frame(stream: &mut Option<FrameStream>) -> Option<Result<String, ExchangeError>> {
    match stream {
        Some(stream) => stream.next().await,
        None => pending().await,
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(heartbeat) => {
            heartbeat.tick().await;
        }
        None => pending().await,
    }
}

async fn expire(timer: &mut Timer) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}
