//! 구독 레지스트리.
//!
//! "무엇을 구독해야 하는가"에 대한 단일 진실 공급원입니다. 세션은 이 상태를 소켓에
//! 반영만 하며, 재연결 시 `replay_batches()`와 `paused_channels()`를 그대로 다시 보냅니다.

use std::collections::BTreeSet;

use neo_core::ScripKey;
use serde::{Deserialize, Serialize};

/// 구독 항목.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// 스크립 키
    pub key: ScripKey,
    /// 채널 번호
    pub channel: u32,
    /// 서버 확인 여부
    pub acknowledged: bool,
}

/// 구독 레지스트리.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionRegistry {
    entries: Vec<Subscription>,
    paused: BTreeSet<u32>,
}

impl SubscriptionRegistry {
    /// 빈 레지스트리 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 구독을 원함으로 표시합니다.
    ///
    /// 이미 원하는 키면 아무것도 하지 않고 `false`를 반환합니다.
    pub fn want(&mut self, key: ScripKey, channel: u32) -> bool {
        if self.is_wanted(&key) {
            return false;
        }
        self.entries.push(Subscription {
            key,
            channel,
            acknowledged: false,
        });
        true
    }

    /// 구독을 제거하고 제거된 항목을 반환합니다.
    pub fn unwant(&mut self, key: &ScripKey) -> Option<Subscription> {
        let index = self.entries.iter().position(|s| &s.key == key)?;
        Some(self.entries.remove(index))
    }

    /// 서버 확인을 기록합니다.
    pub fn acknowledge(&mut self, key: &ScripKey) -> bool {
        match self.entries.iter_mut().find(|s| &s.key == key) {
            Some(entry) => {
                entry.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// 채널의 미확인 구독을 모두 확인 처리하고 처리한 개수를 반환합니다.
    pub fn acknowledge_channel(&mut self, channel: u32) -> usize {
        let mut count = 0;
        for entry in self
            .entries
            .iter_mut()
            .filter(|s| s.channel == channel && !s.acknowledged)
        {
            entry.acknowledged = true;
            count += 1;
        }
        count
    }

    /// 모든 확인 표시를 지웁니다 (연결이 끊겼을 때).
    pub fn clear_acknowledgements(&mut self) {
        for entry in &mut self.entries {
            entry.acknowledged = false;
        }
    }

    /// 원하는 구독 전체.
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.entries.clone()
    }

    /// 재전송용으로 채널별로 묶은 키 목록 (채널 번호 오름차순).
    pub fn replay_batches(&self) -> Vec<(u32, Vec<ScripKey>)> {
        let channels: BTreeSet<u32> = self.entries.iter().map(|s| s.channel).collect();
        channels
            .into_iter()
            .map(|channel| {
                let keys = self
                    .entries
                    .iter()
                    .filter(|s| s.channel == channel)
                    .map(|s| s.key.clone())
                    .collect();
                (channel, keys)
            })
            .collect()
    }

    /// 채널을 일시정지 상태로 표시합니다.
    pub fn pause(&mut self, channel: u32) -> bool {
        self.paused.insert(channel)
    }

    /// 채널 일시정지를 해제합니다.
    pub fn resume(&mut self, channel: u32) -> bool {
        self.paused.remove(&channel)
    }

    /// 일시정지된 채널 목록.
    pub fn paused_channels(&self) -> Vec<u32> {
        self.paused.iter().copied().collect()
    }

    /// 원하는 키인지 확인.
    pub fn is_wanted(&self, key: &ScripKey) -> bool {
        self.entries.iter().any(|s| &s.key == key)
    }

    /// 미확인 구독 수.
    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|s| !s.acknowledged).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
