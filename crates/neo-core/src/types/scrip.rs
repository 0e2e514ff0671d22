//! 거래소 세그먼트와 스크립 키.
//!
//! 구독 프레임은 `세그먼트|토큰` 쌍을 `&`로 이어 붙인 문자열을 사용합니다.
//! 예: `nse_cm|11536&bse_cm|532540`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NeoError;

/// 거래소 세그먼트.
///
/// 알려지지 않은 세그먼트 문자열은 `Other`로 그대로 보존됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExchangeSegment {
    /// NSE 현물
    NseCm,
    /// BSE 현물
    BseCm,
    /// NSE 선물옵션
    NseFo,
    /// BSE 선물옵션
    BseFo,
    /// NSE 통화 파생
    CdeFo,
    /// MCX 상품 파생
    McxFo,
    /// 그 외 세그먼트
    Other(String),
}

impl ExchangeSegment {
    /// 와이어 프레임에서 쓰이는 세그먼트 코드.
    pub fn code(&self) -> &str {
        match self {
            ExchangeSegment::NseCm => "nse_cm",
            ExchangeSegment::BseCm => "bse_cm",
            ExchangeSegment::NseFo => "nse_fo",
            ExchangeSegment::BseFo => "bse_fo",
            ExchangeSegment::CdeFo => "cde_fo",
            ExchangeSegment::McxFo => "mcx_fo",
            ExchangeSegment::Other(code) => code,
        }
    }

    /// 화면 표시용 거래소 이름.
    pub fn exchange_name(&self) -> &str {
        match self {
            ExchangeSegment::NseCm => "NSE",
            ExchangeSegment::BseCm => "BSE",
            ExchangeSegment::NseFo => "NFO",
            ExchangeSegment::BseFo => "BFO",
            ExchangeSegment::CdeFo => "CDS",
            ExchangeSegment::McxFo => "MCX",
            ExchangeSegment::Other(code) => code,
        }
    }
}

impl From<String> for ExchangeSegment {
    fn from(code: String) -> Self {
        match code.trim().to_lowercase().as_str() {
            "nse_cm" => ExchangeSegment::NseCm,
            "bse_cm" => ExchangeSegment::BseCm,
            "nse_fo" => ExchangeSegment::NseFo,
            "bse_fo" => ExchangeSegment::BseFo,
            "cde_fo" => ExchangeSegment::CdeFo,
            "mcx_fo" => ExchangeSegment::McxFo,
            _ => ExchangeSegment::Other(code),
        }
    }
}

impl From<&str> for ExchangeSegment {
    fn from(code: &str) -> Self {
        ExchangeSegment::from(code.to_string())
    }
}

impl From<ExchangeSegment> for String {
    fn from(segment: ExchangeSegment) -> Self {
        segment.code().to_string()
    }
}

impl fmt::Display for ExchangeSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// 구독 단위가 되는 스크립 키 (`세그먼트|토큰`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScripKey {
    /// 거래소 세그먼트
    pub segment: ExchangeSegment,
    /// 종목 토큰
    pub token: String,
}

impl ScripKey {
    /// 새 스크립 키를 생성합니다.
    pub fn new(segment: impl Into<ExchangeSegment>, token: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            token: token.into(),
        }
    }

    /// 여러 키를 구독 프레임의 `scrips` 문자열로 합칩니다.
    pub fn join(keys: &[ScripKey]) -> String {
        keys.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("&")
    }

    /// `scrips` 문자열을 키 목록으로 분해합니다. 빈 항목은 무시합니다.
    pub fn split(scrips: &str) -> Result<Vec<ScripKey>, NeoError> {
        scrips
            .split('&')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for ScripKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.segment, self.token)
    }
}

impl FromStr for ScripKey {
    type Err = NeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (segment, token) = s
            .trim()
            .split_once('|')
            .ok_or_else(|| NeoError::InvalidInput(format!("스크립 키 형식 오류: {}", s)))?;

        if segment.is_empty() || token.is_empty() {
            return Err(NeoError::InvalidInput(format!("스크립 키 형식 오류: {}", s)));
        }

        Ok(ScripKey::new(segment, token))
    }
}
