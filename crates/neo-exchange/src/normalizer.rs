//! 수신 프레임 정규화.
//!
//! 한 프레임은 단일 객체이거나 객체 배열입니다. 두 경우 모두 같은 방식으로 순회하며,
//! 항목 하나의 파싱 실패가 같은 배치의 나머지 항목 처리를 막지 않습니다.
//!
//! `type` 태그로 구분합니다:
//! - `cn`: 인증 응답 → 세션으로 전달
//! - `mws`, `mwu`, `sub`, `cp`, `cr`: 구독 응답 → 레지스트리로 전달
//! - `ti`, `hb`: 하트비트 응답
//! - 그 외: 시세 데이터 (`tk` 필드 필수)

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use neo_core::{ExchangeSegment, MarketTick, ScripKey, SocketKind};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, warn};

use crate::ExchangeError;

/// 거래소 시각 문자열의 시간대 (IST, UTC+05:30).
const EXCHANGE_UTC_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// 인증 응답.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAck {
    /// 성공 여부
    pub success: bool,
    /// 실패 사유
    pub reason: Option<String>,
}

/// 구독 관련 응답.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionAck {
    /// 응답 타입 태그
    pub kind: String,
    /// 채널 번호
    pub channel: Option<u32>,
    /// 응답에 포함된 스크립 키
    pub keys: Vec<ScripKey>,
}

/// 정규화된 수신 항목.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// 인증 응답
    AuthAck(AuthAck),
    /// 구독 응답
    SubscriptionAck(SubscriptionAck),
    /// 하트비트 응답
    Heartbeat,
    /// 시세 틱
    Tick(MarketTick),
    /// 주문/포지션 업데이트 (HSI 소켓)
    Update(Value),
}

/// 프레임 정규화기.
///
/// 토큰 → 종목명 캐시를 가지므로 소켓마다 하나씩 둡니다.
#[derive(Debug)]
pub struct TickNormalizer {
    kind: SocketKind,
    names: HashMap<String, String>,
}

impl TickNormalizer {
    /// 새 정규화기 생성.
    pub fn new(kind: SocketKind) -> Self {
        Self {
            kind,
            names: HashMap::new(),
        }
    }

    /// 텍스트 프레임을 정규화합니다.
    ///
    /// JSON이 아닌 프레임만 에러로 반환하고, 배치 내 개별 항목의 실패는 로그 후 건너뜁니다.
    pub fn normalize_frame(
        &mut self,
        text: &str,
        received_at: DateTime<Utc>,
    ) -> Result<Vec<Inbound>, ExchangeError> {
        let value: Value = serde_json::from_str(text)?;

        let items = match value {
            Value::Array(items) => items,
            other => vec![other],
        };

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match self.normalize_item(item, received_at) {
                Ok(inbound) => out.push(inbound),
                Err(e) => warn!(socket = %self.kind, error = %e, "프레임 항목 건너뜀"),
            }
        }
        Ok(out)
    }

    /// 단일 JSON 객체를 정규화합니다.
    pub fn normalize_item(
        &mut self,
        item: Value,
        received_at: DateTime<Utc>,
    ) -> Result<Inbound, ExchangeError> {
        if !item.is_object() {
            return Err(ExchangeError::ParseError(format!(
                "expected object, got {}",
                item
            )));
        }

        match item.get("type").and_then(Value::as_str) {
            Some("cn") => Ok(Inbound::AuthAck(parse_auth_ack(&item))),
            Some(kind @ ("mws" | "mwu" | "sub" | "cp" | "cr")) => {
                debug!(socket = %self.kind, kind, "구독 응답 수신");
                Ok(Inbound::SubscriptionAck(parse_subscription_ack(kind, &item)))
            }
            Some("ti" | "hb") => Ok(Inbound::Heartbeat),
            _ => self.parse_market_data(item, received_at),
        }
    }

    /// 캐시된 종목명 조회.
    pub fn cached_name(&self, token: &str) -> Option<&str> {
        self.names.get(token).map(String::as_str)
    }

    fn parse_market_data(
        &mut self,
        item: Value,
        received_at: DateTime<Utc>,
    ) -> Result<Inbound, ExchangeError> {
        let token = match item.get("tk").and_then(text_field) {
            Some(token) if !token.is_empty() => token,
            _ => {
                if self.kind == SocketKind::Hsi {
                    return Ok(Inbound::Update(item));
                }
                return Err(ExchangeError::ParseError(
                    "market data without token".to_string(),
                ));
            }
        };

        let ltp = match optional_decimal(&item, "ltp") {
            Some(ltp) => ltp,
            None if self.kind == SocketKind::Hsi => return Ok(Inbound::Update(item)),
            None => {
                return Err(ExchangeError::ParseError(format!(
                    "market data without price: token={}",
                    token
                )))
            }
        };

        if let Some(name) = item.get("ts").and_then(text_field).filter(|s| !s.is_empty()) {
            self.names.insert(token.clone(), name);
        }

        let mut tick = MarketTick::new(token.clone(), ltp, received_at);
        if !tick.has_valid_price() {
            return Err(ExchangeError::ParseError(format!(
                "price out of range: token={}, ltp={}",
                token, ltp
            )));
        }
        tick.name = self
            .names
            .get(&token)
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string());

        if let Some(segment) = item.get("e").and_then(text_field).filter(|s| !s.is_empty()) {
            tick = tick.with_segment(ExchangeSegment::from(segment));
        }

        tick.change = decimal_field(&item, "cng");
        tick.change_percent = decimal_field(&item, "nc");
        tick.volume = decimal_field(&item, "v").trunc();
        tick.high = decimal_field(&item, "h");
        tick.low = decimal_field(&item, "lo");
        tick.open = decimal_field(&item, "op");
        tick.close = decimal_field(&item, "c");
        tick.bid_price = optional_decimal(&item, "bp");
        tick.ask_price = optional_decimal(&item, "sp");
        tick.bid_quantity = optional_decimal(&item, "bq");
        tick.ask_quantity = optional_decimal(&item, "bs");
        tick.exchange_time = ["ltt", "fdtm"]
            .iter()
            .find_map(|field| item.get(*field).and_then(parse_exchange_time));

        Ok(Inbound::Tick(tick))
    }
}

fn parse_auth_ack(item: &Value) -> AuthAck {
    let is_ok = |field: &str| item.get(field).and_then(Value::as_str) == Some("Ok");
    let success =
        is_ok("stat") || is_ok("status") || item.get("success").and_then(Value::as_bool) == Some(true);

    let reason = if success {
        None
    } else {
        Some(
            ["message", "error", "reason"]
                .iter()
                .find_map(|field| item.get(*field).and_then(text_field))
                .unwrap_or_else(|| "Authentication failed".to_string()),
        )
    };

    AuthAck { success, reason }
}

fn parse_subscription_ack(kind: &str, item: &Value) -> SubscriptionAck {
    let channel = item
        .get("channelnum")
        .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .map(|c| c as u32);

    let keys = item
        .get("scrips")
        .and_then(Value::as_str)
        .and_then(|scrips| ScripKey::split(scrips).ok())
        .unwrap_or_default();

    SubscriptionAck {
        kind: kind.to_string(),
        channel,
        keys,
    }
}

/// 문자열 또는 숫자 필드를 문자열로 읽습니다.
fn text_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn optional_decimal(item: &Value, field: &str) -> Option<Decimal> {
    let text = item.get(field).and_then(text_field)?;
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// 숫자 필드. 없거나 잘못된 값은 0입니다.
fn decimal_field(item: &Value, field: &str) -> Decimal {
    optional_decimal(item, field).unwrap_or(Decimal::ZERO)
}

/// `dd/mm/YYYY HH:MM:SS` (IST) 또는 epoch 초를 UTC로 변환합니다.
fn parse_exchange_time(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(secs) = value.as_i64() {
        return DateTime::from_timestamp(secs, 0);
    }

    let text = value.as_str()?.trim();
    if let Ok(secs) = text.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }

    let naive = NaiveDateTime::parse_from_str(text, "%d/%m/%Y %H:%M:%S").ok()?;
    let offset = FixedOffset::east_opt(EXCHANGE_UTC_OFFSET_SECS)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
