//! 核心编排层：错误与恢复、会话状态机、事件广播、回合调度、竞技场控制面

pub mod arena;
pub mod error;
pub mod events;
pub mod recovery;
pub mod scheduler;
pub mod session;
pub mod session_supervisor;

pub use arena::{AgentSeat, AgentSpec, Arena};
pub use error::{ArenaError, RecoveryAction, SessionStateReason};
pub use events::{ArenaEvent, BroadcastError, Broadcaster, ChannelBroadcaster, EventBody, NullBroadcaster};
pub use recovery::RecoveryEngine;
pub use scheduler::{SchedulerContext, SessionHandle, StepOutcome};
pub use session::{
    HistoryEntry, PauseClock, PauseReceipt, ResumeReceipt, Session, SessionSnapshot, SessionStatus,
    StopReceipt, TurnPhase,
};
pub use session_supervisor::SessionSupervisor;
