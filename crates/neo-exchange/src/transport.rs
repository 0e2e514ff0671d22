//! 소켓 전송 계층.
//!
//! 세션은 텍스트 프레임 싱크/스트림 쌍만 다루며, 실제 WebSocket 연결은 [`Connector`]가
//! 담당합니다. 테스트에서는 메모리 채널 기반 커넥터로 교체합니다.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info};

use crate::ExchangeError;

/// 송신 프레임 싱크.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = ExchangeError> + Send>>;

/// 수신 프레임 스트림. `None`은 연결 종료를 의미합니다.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, ExchangeError>> + Send>>;

/// 소켓을 여는 연결자.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// `url`로 소켓을 열고 송수신 절반을 반환합니다.
    async fn open(&self, url: &str) -> Result<(FrameSink, FrameStream), ExchangeError>;

    /// 연결자 이름 (로그용).
    fn name(&self) -> &str {
        "connector"
    }
}

/// tokio-tungstenite 기반 WebSocket 연결자.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn open(&self, url: &str) -> Result<(FrameSink, FrameStream), ExchangeError> {
        info!(url, "WebSocket 연결 중");

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| ExchangeError::NetworkError(format!("WebSocket 연결 실패: {}", e)))?;

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(ExchangeError::from)
            .with(|text: String| future::ready(Ok::<_, ExchangeError>(Message::Text(text))));

        let stream = read.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => Some(Ok(String::from_utf8_lossy(&bytes).into_owned())),
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "closed by server".to_string());
                    Some(Err(ExchangeError::Disconnected(reason)))
                }
                Ok(_) => {
                    debug!("제어 프레임 무시");
                    None
                }
                Err(e) => Some(Err(ExchangeError::from(e))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }

    fn name(&self) -> &str {
        "tungstenite"
    }
}
