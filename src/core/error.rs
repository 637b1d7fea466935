//! 编排层错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：解析 / 非法走法在本地恢复（模糊匹配 → 短延迟重试 → 强制走法），
//! 后端错误退避重试；配置与会话状态错误直接返回给调用方，不重试。

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::llm::LlmError;

/// 会话状态错误的机器可读原因
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStateReason {
    AlreadyPaused,
    AlreadyStopped,
    NotPaused,
    GameOver,
}

impl SessionStateReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStateReason::AlreadyPaused => "already_paused",
            SessionStateReason::AlreadyStopped => "already_stopped",
            SessionStateReason::NotPaused => "not_paused",
            SessionStateReason::GameOver => "game_over",
        }
    }
}

impl std::fmt::Display for SessionStateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone)]
pub enum ArenaError {
    /// 回复中提取不出任何候选走法
    #[error("Could not parse valid move from agent response: \"{excerpt}...\"")]
    Parse { excerpt: String },

    /// 候选走法不在合法集合内（Validator 或规则引擎判定）
    #[error("Illegal action \"{action}\": {reason}")]
    IllegalAction { action: String, reason: String },

    #[error("Provider error: {0}")]
    Provider(#[from] LlmError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Cannot {op} session: {reason}")]
    SessionState {
        op: &'static str,
        reason: SessionStateReason,
    },

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

impl ArenaError {
    pub fn session_state(op: &'static str, reason: SessionStateReason) -> Self {
        ArenaError::SessionState { op, reason }
    }

    /// 机器可读的错误码（供控制层返回）
    pub fn code(&self) -> &'static str {
        match self {
            ArenaError::Parse { .. } => "parse_error",
            ArenaError::IllegalAction { .. } => "illegal_action",
            ArenaError::Provider(_) => "provider_error",
            ArenaError::Config(_) => "config_error",
            ArenaError::SessionState { reason, .. } => reason.as_str(),
            ArenaError::SessionNotFound(_) => "session_not_found",
        }
    }

    /// 解析 / 非法走法走“无效走法”路径，其余走“后端错误”路径
    pub fn is_invalid_action(&self) -> bool {
        matches!(self, ArenaError::Parse { .. } | ArenaError::IllegalAction { .. })
    }
}

/// 恢复引擎根据一次失败给出的调度动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 无效走法：短延迟后让同一智能体重试
    RetryAfter(Duration),
    /// 连续无效达到阈值：绕过智能体，从合法集合中强制选择
    ForceLegal,
    /// 后端错误：较长退避后重试
    Backoff(Duration),
}
