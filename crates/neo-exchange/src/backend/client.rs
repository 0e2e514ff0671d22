//! 백엔드 REST 클라이언트.
//!
//! 모든 응답은 JSON입니다. 실패 응답은 본문의 `detail` 필드를, 없으면 `HTTP {status}`를
//! 에러 메시지로 사용합니다.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, error};

use neo_core::BackendConfig;

use super::traits::{FundsService, OrderService, TradeLogSink, WatchlistService};
use super::types::{AddStocksRequest, LimitsQuery, LogTradeRequest, OrderRequest};
use crate::ExchangeError;

/// 백엔드 REST 클라이언트.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    client: Client,
}

impl BackendClient {
    /// 설정으로 클라이언트 생성.
    pub fn new(config: &BackendConfig) -> Result<Self, ExchangeError> {
        Self::with_base_url(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    /// 기본 URL과 타임아웃으로 클라이언트 생성.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// 기본 URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 헬스 체크.
    pub async fn health(&self) -> Result<Value, ExchangeError> {
        self.request(Method::GET, "/health", &[], None).await
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Value, ExchangeError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "백엔드 요청");

        let mut request = self.client.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;
        let parsed: Option<Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let message = parsed
                .as_ref()
                .and_then(|v| v.get("detail"))
                .map(|detail| match detail {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| format!("HTTP {}", status));
            error!(path, status = status.as_u16(), message = %message, "백엔드 요청 실패");
            return Err(ExchangeError::ApiError {
                code: status.as_u16() as i32,
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        parsed.ok_or_else(|| {
            ExchangeError::ParseError(format!("Failed to parse response from {}", path))
        })
    }
}

#[async_trait]
impl FundsService for BackendClient {
    async fn funds(&self) -> Result<Value, ExchangeError> {
        self.request(Method::POST, "/check-funds", &[], None).await
    }

    async fn limits(&self, query: &LimitsQuery) -> Result<Value, ExchangeError> {
        let params = [
            ("seg", query.seg.as_str()),
            ("exch", query.exch.as_str()),
            ("prod", query.prod.as_str()),
        ];
        self.request(Method::GET, "/user/limits", &params, None).await
    }
}

#[async_trait]
impl OrderService for BackendClient {
    async fn place_order(&self, order: &OrderRequest) -> Result<Value, ExchangeError> {
        let payload = serde_json::to_value(order.to_payload())?;
        self.request(Method::POST, "/orders/normal", &[], Some(payload))
            .await
    }
}

#[async_trait]
impl WatchlistService for BackendClient {
    async fn watchlist(&self, user_id: &str, watchlist_id: &str) -> Result<Value, ExchangeError> {
        let path = format!("/watchlists/{}/{}", user_id, watchlist_id);
        self.request(Method::GET, &path, &[], None).await
    }

    async fn add_stocks(&self, request: &AddStocksRequest) -> Result<Value, ExchangeError> {
        let body = serde_json::to_value(request)?;
        self.request(Method::POST, "/watchlists/add-stocks", &[], Some(body))
            .await
    }

    async fn search_stocks(&self, term: &str) -> Result<Value, ExchangeError> {
        self.request(Method::GET, "/get_stock_data", &[("search", term)], None)
            .await
    }
}

#[async_trait]
impl TradeLogSink for BackendClient {
    async fn log_trade(&self, message: &str) -> Result<(), ExchangeError> {
        let body = serde_json::to_value(LogTradeRequest {
            message: message.to_string(),
        })?;
        self.request(Method::POST, "/logTrade", &[], Some(body))
            .await
            .map(|_| ())
    }

    fn name(&self) -> &str {
        "backend"
    }
}
