//! 브로커 소켓 송신 프레임과 소켓별 프로파일.
//!
//! 모든 프레임은 `type` 태그를 가진 JSON 객체입니다.
//!
//! | type | 용도 |
//! |------|------|
//! | `cn` | 인증 (`Authorization`, `Sid`, HSI는 `source` 추가) |
//! | `ti` | HSM 하트비트 (`scrips: ""`) |
//! | `hb` | HSI 하트비트 |
//! | `mws` / `mwu` | 구독 / 구독 해제 (`scrips`, `channelnum`) |
//! | `cp` / `cr` | 채널 일시정지 / 재개 (`channelnums`) |

use neo_core::{Datacenter, ScripKey, SocketKind, HSM_URL};
use serde::Serialize;

use crate::ExchangeError;

/// 클라이언트가 보내는 프레임.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// 인증
    #[serde(rename = "cn")]
    Auth {
        #[serde(rename = "Authorization")]
        authorization: String,
        #[serde(rename = "Sid")]
        sid: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    /// HSM 하트비트
    #[serde(rename = "ti")]
    Heartbeat { scrips: String },
    /// HSI 하트비트
    #[serde(rename = "hb")]
    UpdatesHeartbeat,
    /// 구독
    #[serde(rename = "mws")]
    Subscribe { scrips: String, channelnum: u32 },
    /// 구독 해제
    #[serde(rename = "mwu")]
    Unsubscribe { scrips: String, channelnum: u32 },
    /// 채널 일시정지
    #[serde(rename = "cp")]
    PauseChannels { channelnums: Vec<u32> },
    /// 채널 재개
    #[serde(rename = "cr")]
    ResumeChannels { channelnums: Vec<u32> },
}

impl ClientFrame {
    /// 구독 프레임 생성.
    pub fn subscribe(keys: &[ScripKey], channel: u32) -> Self {
        ClientFrame::Subscribe {
            scrips: ScripKey::join(keys),
            channelnum: channel,
        }
    }

    /// 구독 해제 프레임 생성.
    pub fn unsubscribe(keys: &[ScripKey], channel: u32) -> Self {
        ClientFrame::Unsubscribe {
            scrips: ScripKey::join(keys),
            channelnum: channel,
        }
    }

    /// 프레임 타입 태그.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientFrame::Auth { .. } => "cn",
            ClientFrame::Heartbeat { .. } => "ti",
            ClientFrame::UpdatesHeartbeat => "hb",
            ClientFrame::Subscribe { .. } => "mws",
            ClientFrame::Unsubscribe { .. } => "mwu",
            ClientFrame::PauseChannels { .. } => "cp",
            ClientFrame::ResumeChannels { .. } => "cr",
        }
    }

    /// JSON 텍스트로 인코딩.
    pub fn encode(&self) -> Result<String, ExchangeError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 소켓 종류별 접속 정보.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketProfile {
    /// 소켓 종류
    pub kind: SocketKind,
    /// 접속 URL
    pub url: String,
    /// 인증 프레임의 source 태그
    pub source: Option<String>,
}

impl SocketProfile {
    /// 시세(HSM) 소켓 프로파일.
    pub fn hsm(url_override: Option<&str>) -> Self {
        Self {
            kind: SocketKind::Hsm,
            url: url_override.unwrap_or(HSM_URL).to_string(),
            source: None,
        }
    }

    /// 주문 업데이트(HSI) 소켓 프로파일.
    pub fn hsi(datacenter: Datacenter, source: &str, url_override: Option<&str>) -> Self {
        Self {
            kind: SocketKind::Hsi,
            url: url_override.unwrap_or(datacenter.hsi_url()).to_string(),
            source: Some(source.to_string()),
        }
    }

    /// 인증 프레임.
    pub fn auth_frame(&self, token: &str, sid: &str) -> ClientFrame {
        ClientFrame::Auth {
            authorization: token.to_string(),
            sid: sid.to_string(),
            source: self.source.clone(),
        }
    }

    /// 하트비트 프레임.
    pub fn heartbeat_frame(&self) -> ClientFrame {
        match self.kind {
            SocketKind::Hsm => ClientFrame::Heartbeat {
                scrips: String::new(),
            },
            SocketKind::Hsi => ClientFrame::UpdatesHeartbeat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_value(frame: &ClientFrame) -> Value {
        serde_json::from_str(&frame.encode().unwrap()).unwrap()
    }

    #[test]
    fn test_hsm_auth_and_heartbeat() {
        let profile = SocketProfile::hsm(None);
        assert_eq!(profile.url, HSM_URL);

        let auth = to_value(&profile.auth_frame("tkn", "sid-1"));
        assert_eq!(auth, json!({"type": "cn", "Authorization": "tkn", "Sid": "sid-1"}));

        let heartbeat = to_value(&profile.heartbeat_frame());
        assert_eq!(heartbeat, json!({"type": "ti", "scrips": ""}));
    }

    #[test]
    fn test_hsi_auth_carries_source() {
        let profile = SocketProfile::hsi(Datacenter::E21, "WEB", None);
        assert_eq!(profile.url, "wss://e21.kotaksecurities.com/realtime");

        let auth = to_value(&profile.auth_frame("tkn", "sid-1"));
        assert_eq!(auth["source"], "WEB");
        assert_eq!(to_value(&profile.heartbeat_frame()), json!({"type": "hb"}));
    }

    #[test]
    fn test_subscription_frames() {
        let keys = vec![ScripKey::new("nse_cm", "11536"), ScripKey::new("bse_cm", "500325")];
        let frame = to_value(&ClientFrame::subscribe(&keys, 1));
        assert_eq!(
            frame,
            json!({"type": "mws", "scrips": "nse_cm|11536&bse_cm|500325", "channelnum": 1})
        );

        let pause = to_value(&ClientFrame::PauseChannels {
            channelnums: vec![1, 2],
        });
        assert_eq!(pause, json!({"type": "cp", "channelnums": [1, 2]}));
        assert_eq!(ClientFrame::unsubscribe(&keys, 1).kind(), "mwu");
    }
}
