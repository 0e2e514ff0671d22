//! 브로커 소켓 종류와 데이터센터별 엔드포인트.
//!
//! - HSM: 시세 소켓. 데이터센터와 무관하게 단일 URL을 사용합니다.
//! - HSI: 주문/포지션 업데이트 소켓. 계정이 배정된 데이터센터에 따라 URL이 달라집니다.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 운영 HSM 엔드포인트.
pub const HSM_URL: &str = "wss://mlhsm.kotaksecurities.com";

/// 소켓 종류.
///
/// 두 소켓은 서로 독립된 재시도 도메인을 가집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketKind {
    /// 시세 소켓
    Hsm,
    /// 주문/포지션 업데이트 소켓
    Hsi,
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketKind::Hsm => write!(f, "hsm"),
            SocketKind::Hsi => write!(f, "hsi"),
        }
    }
}

/// 데이터센터 선택자.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datacenter {
    /// 기본 데이터센터
    #[default]
    Gdc,
    Adc,
    E21,
    E22,
    E41,
    E43,
}

impl Datacenter {
    /// 이 데이터센터의 HSI URL 반환.
    pub fn hsi_url(&self) -> &'static str {
        match self {
            Datacenter::Gdc => "wss://mis.kotaksecurities.com/realtime",
            Datacenter::Adc => "wss://cis.kotaksecurities.com/realtime",
            Datacenter::E21 => "wss://e21.kotaksecurities.com/realtime",
            Datacenter::E22 => "wss://e22.kotaksecurities.com/realtime",
            Datacenter::E41 => "wss://e41.kotaksecurities.com/realtime",
            Datacenter::E43 => "wss://e43.kotaksecurities.com/realtime",
        }
    }

    /// 문자열에서 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gdc" => Some(Datacenter::Gdc),
            "adc" => Some(Datacenter::Adc),
            "e21" => Some(Datacenter::E21),
            "e22" => Some(Datacenter::E22),
            "e41" => Some(Datacenter::E41),
            "e43" => Some(Datacenter::E43),
            _ => None,
        }
    }
}

impl fmt::Display for Datacenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Datacenter::Gdc => "gdc",
            Datacenter::Adc => "adc",
            Datacenter::E21 => "e21",
            Datacenter::E22 => "e22",
            Datacenter::E41 => "e41",
            Datacenter::E43 => "e43",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsi_urls() {
        assert_eq!(
            Datacenter::default().hsi_url(),
            "wss://mis.kotaksecurities.com/realtime"
        );
        assert_eq!(
            Datacenter::Adc.hsi_url(),
            "wss://cis.kotaksecurities.com/realtime"
        );
        assert_eq!(
            Datacenter::E43.hsi_url(),
            "wss://e43.kotaksecurities.com/realtime"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        for dc in [Datacenter::Gdc, Datacenter::E22, Datacenter::E41] {
            assert_eq!(Datacenter::parse(&dc.to_string()), Some(dc));
        }
        assert_eq!(Datacenter::parse("mumbai"), None);
    }

    #[test]
    fn test_unknown_datacenter_rejected_by_serde() {
        let err = serde_json::from_str::<Datacenter>("\"xyz\"");
        assert!(err.is_err());
    }
}
