//! 설정 관리.
//!
//! 기본값 → TOML 파일 → `NEO__` 접두사 환경 변수 순서로 설정을 겹쳐 로드합니다.
//! 예: `NEO__SESSION__SID=...`, `NEO__STRATEGY__ENGINE=trend_window`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::{CandleClose, VolumeSource};
use crate::types::Datacenter;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 소켓 세션 설정
    #[serde(default)]
    pub session: FeedConfig,
    /// 재연결 정책
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// 캔들 집계 설정 (엔진 프리셋을 덮어씀)
    #[serde(default)]
    pub candles: CandleConfig,
    /// 신호 엔진 설정
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// 백엔드 REST 설정
    #[serde(default)]
    pub backend: BackendConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 소켓 세션 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    /// 세션 토큰
    #[serde(default)]
    pub token: String,
    /// 세션 ID
    #[serde(default)]
    pub sid: String,
    /// HSI 데이터센터
    #[serde(default)]
    pub datacenter: Datacenter,
    /// HSI 인증 프레임의 source 태그
    #[serde(default = "default_source")]
    pub source: String,
    /// HSM URL 재정의 (UAT 등)
    #[serde(default)]
    pub hsm_url: Option<String>,
    /// HSI URL 재정의
    #[serde(default)]
    pub hsi_url: Option<String>,
    /// 하트비트 간격 (초)
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// 인증 응답 대기 시간 (초)
    #[serde(default = "default_timeout_secs")]
    pub auth_timeout_secs: u64,
    /// 소켓 연결 대기 시간 (초)
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// 수신 프레임이 없을 때 재연결을 강제하는 시간 (초, 미설정 시 비활성)
    #[serde(default)]
    pub liveness_timeout_secs: Option<u64>,
    /// 재시도 소진 후 쿨다운이 끝나면 다시 시도할지 여부
    #[serde(default = "default_true")]
    pub retry_after_cooldown: bool,
    /// 채널 일시정지(cp) 시 자동 재시도를 멈출지 여부
    #[serde(default)]
    pub pause_suspends_retry: bool,
    /// 이벤트 브로드캐스트 버퍼 크기
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_source() -> String {
    "WEB".to_string()
}
fn default_heartbeat_secs() -> u64 {
    30
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_event_buffer() -> usize {
    1024
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            sid: String::new(),
            datacenter: Datacenter::default(),
            source: default_source(),
            hsm_url: None,
            hsi_url: None,
            heartbeat_secs: default_heartbeat_secs(),
            auth_timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_timeout_secs(),
            liveness_timeout_secs: None,
            retry_after_cooldown: true,
            pause_suspends_retry: false,
            event_buffer: default_event_buffer(),
        }
    }
}

/// 재연결 정책 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackoffConfig {
    /// 사이클당 최대 재시도 횟수
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 재시도 간격 (초)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// 소진 후 쿨다운 (초)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_retry_delay_secs() -> u64 {
    5
}
fn default_cooldown_secs() -> u64 {
    300
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

/// 캔들 집계 설정.
///
/// `close`/`volume`을 지정하지 않으면 선택된 엔진의 프리셋을 따릅니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CandleConfig {
    /// 마감 조건
    #[serde(default)]
    pub close: Option<CandleClose>,
    /// 거래량 산출 방식
    #[serde(default)]
    pub volume: Option<VolumeSource>,
    /// 심볼별 최대 캔들 수
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

fn default_history_cap() -> usize {
    200
}

impl Default for CandleConfig {
    fn default() -> Self {
        Self {
            close: None,
            volume: None,
            history_cap: default_history_cap(),
        }
    }
}

/// 신호 엔진 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// 추세 돌파 + 목표가 청산 (SELL 비활성)
    #[default]
    TrendTarget,
    /// 추세 돌파 + 거래 시간대 제한 (SELL 활성, 목표가 없음)
    TrendWindow,
    /// 변동성 기반 호가 제시
    VolatilityQuote,
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "trend_target" => Ok(EngineKind::TrendTarget),
            "trend_window" => Ok(EngineKind::TrendWindow),
            "volatility_quote" => Ok(EngineKind::VolatilityQuote),
            _ => Err(format!("Unknown engine: {}", s)),
        }
    }
}

/// 변동성 가중 방식.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VolatilityWeighting {
    /// 모집단 표준편차 / 평균
    #[default]
    Simple,
    /// 지수 가중 분산 (최근 값일수록 큰 가중치)
    Ewma { decay: Decimal },
}

/// 신호 엔진 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// 엔진 종류
    #[serde(default)]
    pub engine: EngineKind,
    /// 추세 엔진 파라미터 재정의
    #[serde(default)]
    pub trend: TrendOverrides,
    /// 호가 엔진 파라미터
    #[serde(default)]
    pub quote: QuoteConfig,
}

/// 추세 엔진 파라미터 재정의.
///
/// 지정된 값만 엔진 프리셋을 덮어씁니다.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrendOverrides {
    pub sma_short: Option<usize>,
    pub sma_long: Option<usize>,
    pub atr_period: Option<usize>,
    pub rsi_period: Option<usize>,
    pub volume_period: Option<usize>,
    /// 진입 임계값 ATR 배수 (k)
    pub entry_atr_multiplier: Option<Decimal>,
    /// 트레일링 스탑 ATR 배수 (m)
    pub stop_atr_multiplier: Option<Decimal>,
    /// 목표가 ATR 배수 (n)
    pub target_atr_multiplier: Option<Decimal>,
    pub rsi_upper: Option<Decimal>,
    pub rsi_lower: Option<Decimal>,
    /// 방향별 재진입 한도
    pub reentry_cap: Option<u32>,
    /// 계약 단위
    pub contract_size: Option<Decimal>,
    pub allow_short: Option<bool>,
    /// 목표가 청산 비활성화
    pub disable_target: Option<bool>,
    /// 거래 시간대 제한 비활성화
    pub disable_trade_window: Option<bool>,
}

/// 호가 엔진 파라미터.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuoteConfig {
    /// 변동성 계산 틱 수
    #[serde(default = "default_vol_window")]
    pub window: usize,
    /// 변동성 임계값
    #[serde(default = "default_vol_threshold")]
    pub volatility_threshold: Decimal,
    /// 불균형 임계값
    #[serde(default = "default_imbalance_threshold")]
    pub imbalance_threshold: Decimal,
    /// 호가가 없는 틱에 쓰는 기본 반 스프레드
    #[serde(default = "default_half_spread")]
    pub fallback_half_spread: Decimal,
    /// 변동성 가중 방식
    #[serde(default)]
    pub weighting: VolatilityWeighting,
}

fn default_vol_window() -> usize {
    20
}
fn default_vol_threshold() -> Decimal {
    dec!(0.02)
}
fn default_imbalance_threshold() -> Decimal {
    dec!(0.2)
}
fn default_half_spread() -> Decimal {
    dec!(0.1)
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            window: default_vol_window(),
            volatility_threshold: default_vol_threshold(),
            imbalance_threshold: default_imbalance_threshold(),
            fallback_half_spread: default_half_spread(),
            weighting: VolatilityWeighting::default(),
        }
    }
}

/// 백엔드 REST 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// 기본 URL
    #[serde(default = "default_backend_url")]
    pub base_url: String,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 매매 기록 전송 여부
    #[serde(default = "default_true")]
    pub trade_log: bool,
}

fn default_backend_url() -> String {
    "http://localhost:8001".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            timeout_secs: default_timeout_secs(),
            trade_log: true,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("NEO")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }

    /// TOML 문자열에서 설정을 로드합니다 (환경 변수 미적용).
    pub fn from_toml_str(toml: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.session.heartbeat_secs, 30);
        assert_eq!(config.session.source, "WEB");
        assert!(config.session.retry_after_cooldown);
        assert_eq!(config.backoff.max_attempts, 5);
        assert_eq!(config.backoff.retry_delay_secs, 5);
        assert_eq!(config.backoff.cooldown_secs, 300);
        assert_eq!(config.candles.history_cap, 200);
        assert_eq!(config.strategy.engine, EngineKind::TrendTarget);
        assert_eq!(config.backend.base_url, "http://localhost:8001");
    }

    #[test]
    fn test_from_toml_str() {
        let toml = r#"
            [session]
            token = "tkn"
            sid = "sid-1"
            datacenter = "adc"
            liveness_timeout_secs = 90

            [backoff]
            max_attempts = 3

            [candles]
            close = { mode = "interval", secs = 60 }

            [strategy]
            engine = "trend_window"

            [strategy.trend]
            sma_short = 5
            entry_atr_multiplier = "1.5"

            [strategy.quote]
            weighting = { mode = "ewma", decay = "0.94" }
        "#;

        let config = AppConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.session.sid, "sid-1");
        assert_eq!(config.session.datacenter, Datacenter::Adc);
        assert_eq!(config.session.liveness_timeout_secs, Some(90));
        assert_eq!(config.session.heartbeat_secs, 30);
        assert_eq!(config.backoff.max_attempts, 3);
        assert_eq!(config.backoff.cooldown_secs, 300);
        assert_eq!(config.candles.close, Some(CandleClose::Interval { secs: 60 }));
        assert_eq!(config.strategy.engine, EngineKind::TrendWindow);
        assert_eq!(config.strategy.trend.sma_short, Some(5));
        assert_eq!(config.strategy.trend.entry_atr_multiplier, Some(dec!(1.5)));
        assert_eq!(
            config.strategy.quote.weighting,
            VolatilityWeighting::Ewma { decay: dec!(0.94) }
        );
    }

    #[test]
    fn test_engine_kind_from_str() {
        assert_eq!("trend-target".parse::<EngineKind>().unwrap(), EngineKind::TrendTarget);
        assert_eq!(
            "VOLATILITY_QUOTE".parse::<EngineKind>().unwrap(),
            EngineKind::VolatilityQuote
        );
        assert!("scalper".parse::<EngineKind>().is_err());
    }
}
