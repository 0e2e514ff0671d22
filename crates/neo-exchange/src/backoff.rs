//! 재연결 백오프 정책.
//!
//! 소켓이 예기치 않게 닫힐 때마다 시도 횟수를 하나씩 올리고, 정책이 다음 행동을 결정합니다.
//! 타이머는 호출자가 소유하며 이 모듈은 I/O를 하지 않습니다.
//!
//! # 상태 전이
//!
//! ```text
//! attempt 1..=max ──> Retry(retry_delay)
//!                          │
//! attempt > max ────> Exhausted(cooldown) ──[쿨다운 경과]──> reset() ──> attempt 1
//! ```
//!
//! HSM과 HSI 소켓은 각자 컨트롤러 인스턴스를 가지므로 서로의 카운터에 영향을 주지 않습니다.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use neo_core::BackoffConfig;

/// 백오프 정책.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// 사이클당 최대 재시도 횟수
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 재시도 간격 (밀리초)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// 소진 후 쿨다운 (밀리초)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_retry_delay_ms() -> u64 {
    5_000
}
fn default_cooldown_ms() -> u64 {
    300_000
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl BackoffPolicy {
    /// 새 정책 생성.
    pub fn new(max_attempts: u32, retry_delay: Duration, cooldown: Duration) -> Self {
        Self {
            max_attempts,
            retry_delay_ms: retry_delay.as_millis() as u64,
            cooldown_ms: cooldown.as_millis() as u64,
        }
    }

    /// 재시도 간격.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// 쿨다운 시간.
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// 사이클 내 `attempt`번째(1부터) 실패에 대한 결정.
    pub fn decide(&self, attempt: u32) -> BackoffDecision {
        if attempt <= self.max_attempts {
            BackoffDecision::Retry {
                attempt,
                after: self.retry_delay(),
            }
        } else {
            BackoffDecision::Exhausted {
                after: self.cooldown(),
            }
        }
    }
}

impl From<&BackoffConfig> for BackoffPolicy {
    fn from(config: &BackoffConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_secs(config.retry_delay_secs),
            Duration::from_secs(config.cooldown_secs),
        )
    }
}

/// 백오프 결정.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    /// `after` 이후 다시 연결
    Retry { attempt: u32, after: Duration },
    /// 사이클 소진. `after` 쿨다운 후 카운터를 초기화하고 새 사이클 시작 가능
    Exhausted { after: Duration },
}

impl BackoffDecision {
    /// 대기 시간.
    pub fn delay(&self) -> Duration {
        match self {
            BackoffDecision::Retry { after, .. } | BackoffDecision::Exhausted { after } => *after,
        }
    }
}

impl fmt::Display for BackoffDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffDecision::Retry { attempt, after } => {
                write!(f, "retry #{} in {}ms", attempt, after.as_millis())
            }
            BackoffDecision::Exhausted { after } => {
                write!(f, "exhausted, cooldown {}ms", after.as_millis())
            }
        }
    }
}

/// 하나의 재시도 도메인에 대한 카운터.
#[derive(Debug, Clone)]
pub struct BackoffController {
    policy: BackoffPolicy,
    attempts: u32,
}

impl BackoffController {
    /// 새 컨트롤러 생성.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// 연결 실패를 기록하고 다음 행동을 반환합니다.
    ///
    /// 소진 상태에서는 카운터를 더 올리지 않습니다.
    pub fn on_failure(&mut self) -> BackoffDecision {
        let decision = self.policy.decide(self.attempts + 1);
        if let BackoffDecision::Retry { attempt, .. } = decision {
            self.attempts = attempt;
        }
        decision
    }

    /// 인증 성공 또는 쿨다운 경과 후 카운터 초기화.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// 현재 사이클의 시도 횟수.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// 정책 참조.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.retry_delay(), Duration::from_secs(5));
        assert_eq!(policy.cooldown(), Duration::from_secs(300));
    }

    #[test]
    fn test_sixth_failure_enters_cooldown() {
        let mut controller = BackoffController::new(BackoffPolicy::default());

        for expected in 1..=5 {
            assert_eq!(
                controller.on_failure(),
                BackoffDecision::Retry {
                    attempt: expected,
                    after: Duration::from_secs(5)
                }
            );
        }

        assert_eq!(
            controller.on_failure(),
            BackoffDecision::Exhausted {
                after: Duration::from_secs(300)
            }
        );
        assert_eq!(controller.attempts(), 5);
    }

    #[test]
    fn test_reset_starts_fresh_cycle() {
        let mut controller = BackoffController::new(BackoffPolicy::new(
            2,
            Duration::from_millis(10),
            Duration::from_millis(100),
        ));
        controller.on_failure();
        controller.on_failure();
        assert!(matches!(controller.on_failure(), BackoffDecision::Exhausted { .. }));

        controller.reset();
        assert!(matches!(
            controller.on_failure(),
            BackoffDecision::Retry { attempt: 1, .. }
        ));
    }

    #[test]
    fn test_independent_domains() {
        let mut hsm = BackoffController::new(BackoffPolicy::default());
        let hsi = BackoffController::new(BackoffPolicy::default());
        hsm.on_failure();
        hsm.on_failure();
        assert_eq!(hsm.attempts(), 2);
        assert_eq!(hsi.attempts(), 0);
    }

    #[test]
    fn test_from_config() {
        let config = BackoffConfig {
            max_attempts: 3,
            retry_delay_secs: 2,
            cooldown_secs: 60,
        };
        let policy = BackoffPolicy::from(&config);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.retry_delay_ms, 2_000);
        assert_eq!(policy.cooldown_ms, 60_000);
    }

    proptest! {
        #[test]
        fn prop_decision_depends_only_on_attempt(max in 1u32..20, attempt in 1u32..60) {
            let policy = BackoffPolicy::new(max, Duration::from_secs(5), Duration::from_secs(300));
            let decision = policy.decide(attempt);
            if attempt <= max {
                prop_assert_eq!(decision.delay(), Duration::from_secs(5));
            } else {
                prop_assert_eq!(decision, BackoffDecision::Exhausted { after: Duration::from_secs(300) });
            }
        }
    }
}
