//! 会话事件与广播
//!
//! 调度器在持有会话锁时发布事件，因此同一会话的事件顺序与状态转换顺序一致。
//! 广播失败只记录日志，不影响对局推进。

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::engine::{GameOutcome, Side};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventBody {
    DecisionRequested {
        side: Side,
        agent_id: String,
        ply: usize,
    },
    DecisionApplied {
        side: Side,
        agent_id: String,
        action: String,
        fingerprint: String,
        cached: bool,
        thinking_ms: u64,
    },
    DecisionInvalid {
        side: Side,
        agent_id: String,
        action: Option<String>,
        error: String,
        consecutive_invalid: u32,
    },
    /// 连续无效达到阈值后的强制走法
    DecisionForced {
        side: Side,
        agent_id: String,
        action: String,
        fingerprint: String,
    },
    DecisionError {
        side: Side,
        agent_id: String,
        error: String,
        retry_in_ms: u64,
    },
    SessionPaused {
        moves_played: usize,
    },
    SessionResumed {
        total_paused_ms: u64,
    },
    SessionStopped {
        final_duration_ms: u64,
        total_moves: usize,
        final_fingerprint: String,
    },
    SessionFinished {
        outcome: GameOutcome,
        total_moves: usize,
    },
    SessionReset,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArenaEvent {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: EventBody,
}

impl ArenaEvent {
    pub fn new(session_id: &str, body: EventBody) -> Self {
        Self {
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            body,
        }
    }

    /// 事件类型名，与序列化后的 `type` 字段一致
    pub fn kind(&self) -> &'static str {
        match self.body {
            EventBody::DecisionRequested { .. } => "decision_requested",
            EventBody::DecisionApplied { .. } => "decision_applied",
            EventBody::DecisionInvalid { .. } => "decision_invalid",
            EventBody::DecisionForced { .. } => "decision_forced",
            EventBody::DecisionError { .. } => "decision_error",
            EventBody::SessionPaused { .. } => "session_paused",
            EventBody::SessionResumed { .. } => "session_resumed",
            EventBody::SessionStopped { .. } => "session_stopped",
            EventBody::SessionFinished { .. } => "session_finished",
            EventBody::SessionReset => "session_reset",
        }
    }
}

#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("No active subscribers")]
    NoSubscribers,
    #[error("Broadcast failed: {0}")]
    Other(String),
}

/// 事件扇出：发后即忘，至多一次投递
pub trait Broadcaster: Send + Sync {
    fn publish(&self, event: ArenaEvent) -> Result<(), BroadcastError>;
}

/// 发布并吞掉失败（只记 warn）
pub fn emit(broadcaster: &dyn Broadcaster, session_id: &str, body: EventBody) {
    let event = ArenaEvent::new(session_id, body);
    let kind = event.kind();
    if let Err(e) = broadcaster.publish(event) {
        tracing::warn!(session_id, kind, error = %e, "Failed to broadcast event");
    }
}

/// 基于 tokio broadcast 的进程内广播
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<ArenaEvent>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ArenaEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish(&self, event: ArenaEvent) -> Result<(), BroadcastError> {
        self.tx
            .send(event)
            .map(|_| ())
            .map_err(|_| BroadcastError::NoSubscribers)
    }
}

/// 丢弃所有事件
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn publish(&self, _event: ArenaEvent) -> Result<(), BroadcastError> {
        Ok(())
    }
}
