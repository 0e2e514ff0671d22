//! # Neo Exchange
//!
//! 브로커 스트리밍 소켓 세션과 REST 협력 서비스를 제공합니다.
//!
//! - [`session`]: 인증, 하트비트, 재연결, 구독 재전송을 담당하는 세션 핸들
//! - [`backoff`]: I/O 없는 재시도/쿨다운 정책
//! - [`registry`]: 원하는 구독과 일시정지 채널의 단일 진실 공급원
//! - [`normalizer`]: 수신 프레임 → 정규화된 틱
//! - [`backend`]: 자금/주문/관심종목/매매 기록 REST 클라이언트

pub mod backend;
pub mod backoff;
pub mod error;
pub mod normalizer;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

pub use backend::{BackendClient, FundsService, OrderService, TradeLogSink, WatchlistService};
pub use backoff::{BackoffController, BackoffDecision, BackoffPolicy};
pub use error::ExchangeError;
pub use normalizer::{Inbound, TickNormalizer};
pub use protocol::{ClientFrame, SocketProfile};
pub use registry::{Subscription, SubscriptionRegistry};
pub use session::{NeoSession, SessionConfig, SessionEvent, SessionStatus, SocketState};
pub use transport::{Connector, FrameSink, FrameStream, TungsteniteConnector};
