//! 智能体档案：身份、执子方、模型与累计统计
//!
//! 只归属于所在会话，且只由调度器在每次决策尝试后修改。

use std::time::Duration;

use serde::Serialize;

use crate::engine::Side;
use crate::llm::ProviderKind;

#[derive(Debug, Clone)]
pub struct AgentPlayer {
    pub id: String,
    pub side: Side,
    pub model_id: String,
    pub provider: ProviderKind,
    pub name: String,
    /// 已完成的决策次数（含缓存命中，不含强制走法）
    pub decision_count: u64,
    pub total_thinking_time: Duration,
    /// 累计无效走法次数
    pub invalid_move_count: u64,
    /// 连续无效次数，智能体自己给出合法走法后清零
    pub consecutive_invalid: u32,
    pub forced_count: u64,
    pub cached_count: u64,
    /// 上一次被拒绝的走法，写进下一轮提示词
    pub last_invalid_action: Option<String>,
}

/// 快照中的智能体信息（不含任何密钥）
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgentInfo {
    pub id: String,
    pub side: Side,
    pub color: &'static str,
    pub model_id: String,
    pub provider: ProviderKind,
    pub name: String,
    pub decision_count: u64,
    pub total_thinking_ms: u64,
    pub invalid_move_count: u64,
    pub consecutive_invalid: u32,
    pub forced_count: u64,
    pub cached_count: u64,
    pub last_invalid_action: Option<String>,
}

impl AgentPlayer {
    pub fn new(side: Side, model_id: &str, provider: ProviderKind, name: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            side,
            model_id: model_id.to_string(),
            provider,
            name: name.unwrap_or_else(|| format!("{} ({})", model_id, side.color())),
            decision_count: 0,
            total_thinking_time: Duration::ZERO,
            invalid_move_count: 0,
            consecutive_invalid: 0,
            forced_count: 0,
            cached_count: 0,
            last_invalid_action: None,
        }
    }

    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            id: self.id.clone(),
            side: self.side,
            color: self.side.color(),
            model_id: self.model_id.clone(),
            provider: self.provider,
            name: self.name.clone(),
            decision_count: self.decision_count,
            total_thinking_ms: self.total_thinking_time.as_millis() as u64,
            invalid_move_count: self.invalid_move_count,
            consecutive_invalid: self.consecutive_invalid,
            forced_count: self.forced_count,
            cached_count: self.cached_count,
            last_invalid_action: self.last_invalid_action.clone(),
        }
    }

    /// 记录一次决策耗时
    pub fn record_attempt(&mut self, elapsed: Duration) {
        self.total_thinking_time += elapsed;
    }

    /// 智能体给出的走法被引擎接受
    pub fn record_success(&mut self, cached: bool) {
        self.decision_count += 1;
        if cached {
            self.cached_count += 1;
        }
        self.consecutive_invalid = 0;
        self.last_invalid_action = None;
    }

    /// 无效走法（解析失败、不在合法集合、或被引擎拒绝）
    pub fn record_invalid(&mut self, action: Option<&str>) {
        self.invalid_move_count += 1;
        self.consecutive_invalid += 1;
        if let Some(action) = action {
            self.last_invalid_action = Some(action.to_string());
        }
    }

    /// 强制走法落子；不清零连续无效计数
    pub fn record_forced(&mut self) {
        self.forced_count += 1;
        self.last_invalid_action = None;
    }

    pub fn reset_stats(&mut self) {
        self.decision_count = 0;
        self.total_thinking_time = Duration::ZERO;
        self.invalid_move_count = 0;
        self.consecutive_invalid = 0;
        self.forced_count = 0;
        self.cached_count = 0;
        self.last_invalid_action = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_then_success_resets_streak() {
        let mut p = AgentPlayer::new(Side::A, "gpt-4", ProviderKind::OpenAi, None);
        assert_eq!(p.name, "gpt-4 (white)");

        p.record_invalid(Some("Ke9"));
        p.record_invalid(None);
        assert_eq!(p.consecutive_invalid, 2);
        assert_eq!(p.last_invalid_action.as_deref(), Some("Ke9"));

        p.record_forced();
        assert_eq!(p.consecutive_invalid, 2);
        assert!(p.last_invalid_action.is_none());

        p.record_success(true);
        assert_eq!(p.consecutive_invalid, 0);
        assert_eq!(p.invalid_move_count, 2);
        assert_eq!(p.info().cached_count, 1);
    }
}
