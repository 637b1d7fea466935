//! 错误恢复引擎
//!
//! 根据失败类型返回 RecoveryAction，供调度器决定是短延迟重试、强制走法还是退避。

use std::time::Duration;

use crate::config::PacingPolicy;
use crate::core::{ArenaError, RecoveryAction};

/// 把一次失败映射为调度动作，并给出各类节奏延迟
#[derive(Debug, Clone, Default)]
pub struct RecoveryEngine {
    pacing: PacingPolicy,
}

impl RecoveryEngine {
    pub fn new(pacing: PacingPolicy) -> Self {
        Self { pacing }
    }

    pub fn pacing(&self) -> &PacingPolicy {
        &self.pacing
    }

    /// 根据错误类型与该智能体的连续无效次数返回恢复动作
    pub fn handle(&self, err: &ArenaError, consecutive_invalid: u32) -> RecoveryAction {
        if err.is_invalid_action() {
            self.on_invalid(consecutive_invalid)
        } else {
            RecoveryAction::Backoff(self.pacing.error_backoff())
        }
    }

    pub fn on_invalid(&self, consecutive_invalid: u32) -> RecoveryAction {
        if consecutive_invalid >= self.pacing.max_invalid_before_forced {
            RecoveryAction::ForceLegal
        } else {
            RecoveryAction::RetryAfter(self.pacing.invalid_retry_delay())
        }
    }

    /// 成功落子后的间隔
    pub fn move_delay(&self) -> Duration {
        self.pacing.move_delay()
    }

    pub fn resume_delay(&self) -> Duration {
        self.pacing.resume_delay()
    }
}
