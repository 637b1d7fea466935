//! 会话状态机：Active / Paused / Stopped / Finished，以及暂停时长核算
//!
//! - pause：已暂停、已停止或对局已结束时失败；
//! - resume：仅在 Paused 时成功，把本次暂停时长累加进总暂停时长；
//! - stop：已停止时失败；若正在暂停，先把进行中的暂停区间累加进去；
//! - Finished 为终态，之后不再有任何修改。
//!
//! 实际对局时长 = 自开始的墙钟时间 - 累计暂停时长（暂停中再减去当前区间），不为负。

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::agent::{AgentInfo, AgentPlayer, SessionView};
use crate::core::session_supervisor::SessionSupervisor;
use crate::core::{ArenaError, SessionStateReason};
use crate::engine::{Applied, EngineFactory, GameOutcome, RuleEngine, Side};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    Stopped,
    Finished { outcome: GameOutcome },
}

/// 调度器所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    RequestingDecision,
    Applying,
    Retrying,
    Paused,
    Stopped,
    Finished,
}

/// 已落子的一步
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub ply: usize,
    pub side: Side,
    pub action: String,
    /// 落子后的局面指纹
    pub fingerprint: String,
    pub agent_id: String,
    pub forced: bool,
    pub at: DateTime<Utc>,
}

/// 暂停计时
#[derive(Debug, Clone)]
pub struct PauseClock {
    started: Instant,
    started_at: DateTime<Utc>,
    paused_since: Option<(Instant, DateTime<Utc>)>,
    paused_total: Duration,
}

impl PauseClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            paused_since: None,
            paused_total: Duration::ZERO,
        }
    }

    fn pause(&mut self) -> DateTime<Utc> {
        let at = Utc::now();
        self.paused_since = Some((Instant::now(), at));
        at
    }

    /// 结束进行中的暂停区间，返回累计暂停时长
    fn fold_open_interval(&mut self) -> Duration {
        if let Some((since, _)) = self.paused_since.take() {
            self.paused_total += since.elapsed();
        }
        self.paused_total
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn paused_at(&self) -> Option<DateTime<Utc>> {
        self.paused_since.map(|(_, at)| at)
    }

    /// 累计暂停时长（不含进行中的区间）
    pub fn paused_total(&self) -> Duration {
        self.paused_total
    }

    pub fn actual_duration(&self) -> Duration {
        let open = self
            .paused_since
            .map(|(since, _)| since.elapsed())
            .unwrap_or_default();
        self.started
            .elapsed()
            .saturating_sub(self.paused_total + open)
    }
}

/// pause 成功后的回执
#[derive(Debug, Clone, Serialize)]
pub struct PauseReceipt {
    pub paused_at: DateTime<Utc>,
    pub moves_played: usize,
}

/// resume 成功后的回执
#[derive(Debug, Clone, Serialize)]
pub struct ResumeReceipt {
    pub total_paused_ms: u64,
}

/// stop 成功后的回执
#[derive(Debug, Clone, Serialize)]
pub struct StopReceipt {
    pub final_duration_ms: u64,
    pub total_moves: usize,
    pub final_fingerprint: String,
}

/// 完整会话视图（供控制层查询）
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub fingerprint: String,
    pub side_to_move: Side,
    pub status: SessionStatus,
    pub phase: TurnPhase,
    pub history: Vec<HistoryEntry>,
    pub white: AgentInfo,
    pub black: AgentInfo,
    pub legal_actions: Vec<String>,
    pub in_check: bool,
    pub is_game_over: bool,
    pub started_at: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub total_paused_ms: u64,
    pub actual_duration_ms: u64,
}

pub struct Session {
    pub id: String,
    engine: Box<dyn RuleEngine>,
    engine_factory: EngineFactory,
    players: [AgentPlayer; 2],
    pub status: SessionStatus,
    pub phase: TurnPhase,
    pub history: Vec<HistoryEntry>,
    pub clock: PauseClock,
    pub current_turn: Side,
    pub supervisor: SessionSupervisor,
}

fn seat(side: Side) -> usize {
    match side {
        Side::A => 0,
        Side::B => 1,
    }
}

impl Session {
    pub fn new(id: impl Into<String>, engine_factory: EngineFactory, white: AgentPlayer, black: AgentPlayer) -> Self {
        let engine = engine_factory();
        let current_turn = engine.turn_owner();
        Self {
            id: id.into(),
            engine,
            engine_factory,
            players: [white, black],
            status: SessionStatus::Active,
            phase: TurnPhase::Idle,
            history: Vec::new(),
            clock: PauseClock::start(),
            current_turn,
            supervisor: SessionSupervisor::new(),
        }
    }

    pub fn player(&self, side: Side) -> &AgentPlayer {
        &self.players[seat(side)]
    }

    pub fn player_mut(&mut self, side: Side) -> &mut AgentPlayer {
        &mut self.players[seat(side)]
    }

    pub fn engine(&self) -> &dyn RuleEngine {
        self.engine.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, SessionStatus::Finished { .. })
    }

    /// 调度资格：Active 且引擎未判终局
    pub fn is_eligible(&self) -> bool {
        self.status == SessionStatus::Active && !self.engine.is_terminal()
    }

    /// Active 会话遇到引擎已终局时转入 Finished，返回终局原因
    pub fn finish_if_terminal(&mut self) -> Option<GameOutcome> {
        if self.status != SessionStatus::Active {
            return None;
        }
        let outcome = self.engine.outcome()?;
        self.status = SessionStatus::Finished {
            outcome: outcome.clone(),
        };
        self.phase = TurnPhase::Finished;
        Some(outcome)
    }

    pub fn pause(&mut self) -> Result<PauseReceipt, ArenaError> {
        match self.status {
            SessionStatus::Paused => {
                return Err(ArenaError::session_state("pause", SessionStateReason::AlreadyPaused))
            }
            SessionStatus::Stopped => {
                return Err(ArenaError::session_state("pause", SessionStateReason::AlreadyStopped))
            }
            SessionStatus::Finished { .. } => {
                return Err(ArenaError::session_state("pause", SessionStateReason::GameOver))
            }
            SessionStatus::Active => {}
        }
        if self.engine.is_terminal() {
            return Err(ArenaError::session_state("pause", SessionStateReason::GameOver));
        }

        let paused_at = self.clock.pause();
        self.status = SessionStatus::Paused;
        self.phase = TurnPhase::Paused;
        self.supervisor.cancel();
        Ok(PauseReceipt {
            paused_at,
            moves_played: self.history.len(),
        })
    }

    pub fn resume(&mut self) -> Result<ResumeReceipt, ArenaError> {
        match self.status {
            SessionStatus::Paused => {}
            SessionStatus::Stopped => {
                return Err(ArenaError::session_state("resume", SessionStateReason::AlreadyStopped))
            }
            _ => return Err(ArenaError::session_state("resume", SessionStateReason::NotPaused)),
        }

        let total = self.clock.fold_open_interval();
        self.status = SessionStatus::Active;
        self.phase = TurnPhase::Idle;
        Ok(ResumeReceipt {
            total_paused_ms: total.as_millis() as u64,
        })
    }

    /// 已结束的对局同样拒绝 stop，Finished 为终态
    pub fn stop(&mut self) -> Result<StopReceipt, ArenaError> {
        match self.status {
            SessionStatus::Stopped => {
                return Err(ArenaError::session_state("stop", SessionStateReason::AlreadyStopped))
            }
            SessionStatus::Finished { .. } => {
                return Err(ArenaError::session_state("stop", SessionStateReason::GameOver))
            }
            _ => {}
        }

        self.clock.fold_open_interval();
        self.status = SessionStatus::Stopped;
        self.phase = TurnPhase::Stopped;
        self.supervisor.cancel();
        Ok(StopReceipt {
            final_duration_ms: self.clock.actual_duration().as_millis() as u64,
            total_moves: self.history.len(),
            final_fingerprint: self.engine.current_fingerprint(),
        })
    }

    /// 回到刚创建时的状态：新引擎、清空历史与统计、重新计时
    pub fn reset(&mut self) {
        self.supervisor.cancel();
        self.engine = (self.engine_factory)();
        self.current_turn = self.engine.turn_owner();
        self.history.clear();
        for p in self.players.iter_mut() {
            p.reset_stats();
        }
        self.status = SessionStatus::Active;
        self.phase = TurnPhase::Idle;
        self.clock = PauseClock::start();
    }

    /// 为当前行棋方构建只读投影
    pub fn view(&self, history_window: usize) -> SessionView {
        let start = self.history.len().saturating_sub(history_window);
        SessionView {
            fingerprint: self.engine.current_fingerprint(),
            side_to_move: self.current_turn,
            in_check: self.engine.in_check(),
            legal_actions: self.engine.legal_actions(),
            recent_actions: self.history[start..].iter().map(|h| h.action.clone()).collect(),
            ply_count: self.history.len(),
            rejected_action: self.player(self.current_turn).last_invalid_action.clone(),
        }
    }

    /// 交给引擎落子；接受后记历史、换边，终局则转入 Finished
    pub fn apply_action(&mut self, action: &str, forced: bool) -> Result<Applied, String> {
        if self.is_finished() {
            return Err("Game is already finished".to_string());
        }
        let side = self.current_turn;
        let applied = self.engine.apply(action)?;
        self.history.push(HistoryEntry {
            ply: self.history.len() + 1,
            side,
            action: applied.action.clone(),
            fingerprint: applied.fingerprint.clone(),
            agent_id: self.player(side).id.clone(),
            forced,
            at: Utc::now(),
        });
        self.current_turn = side.opponent();
        if self.finish_if_terminal().is_none() {
            self.phase = TurnPhase::Idle;
        }
        Ok(applied)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let open = self
            .clock
            .paused_at()
            .map(|_| self.clock_open_ms())
            .unwrap_or(0);
        SessionSnapshot {
            id: self.id.clone(),
            fingerprint: self.engine.current_fingerprint(),
            side_to_move: self.current_turn,
            status: self.status.clone(),
            phase: self.phase,
            history: self.history.clone(),
            white: self.player(Side::A).info(),
            black: self.player(Side::B).info(),
            legal_actions: self.engine.legal_actions(),
            in_check: self.engine.in_check(),
            is_game_over: self.engine.is_terminal(),
            started_at: self.clock.started_at(),
            paused_at: self.clock.paused_at(),
            total_paused_ms: self.clock.paused_total().as_millis() as u64 + open,
            actual_duration_ms: self.clock.actual_duration().as_millis() as u64,
        }
    }

    fn clock_open_ms(&self) -> u64 {
        self.clock
            .paused_since
            .map(|(since, _)| since.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{engine_factory, ScriptedEngine};
    use crate::llm::ProviderKind;

    fn session(plies: usize) -> Session {
        let factory =
            engine_factory(move || ScriptedEngine::uniform(&["e4", "d4", "Nf3"], plies, GameOutcome::Draw));
        Session::new(
            "s1",
            factory,
            AgentPlayer::new(Side::A, "gpt-4", ProviderKind::OpenAi, None),
            AgentPlayer::new(Side::B, "claude-3-haiku-20240307", ProviderKind::Anthropic, None),
        )
    }

    #[tokio::test]
    async fn test_pause_resume_accounts_gap() {
        let mut s = session(10);
        s.pause().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let receipt = s.resume().unwrap();
        assert!(receipt.total_paused_ms >= 30);
        assert!(receipt.total_paused_ms < 1000);
        assert_eq!(s.status, SessionStatus::Active);
        assert!(s.clock.paused_at().is_none());
    }

    #[test]
    fn test_pause_twice_fails_without_side_effects() {
        let mut s = session(10);
        let first = s.pause().unwrap();
        let err = s.pause().unwrap_err();
        assert_eq!(err.code(), "already_paused");
        assert_eq!(s.clock.paused_at(), Some(first.paused_at));
        assert_eq!(s.status, SessionStatus::Paused);
    }

    #[test]
    fn test_resume_requires_paused() {
        let mut s = session(10);
        assert_eq!(s.resume().unwrap_err().code(), "not_paused");
        s.stop().unwrap();
        assert_eq!(s.resume().unwrap_err().code(), "already_stopped");
    }

    #[tokio::test]
    async fn test_stop_folds_open_pause() {
        let mut s = session(10);
        s.pause().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let receipt = s.stop().unwrap();
        assert!(s.clock.paused_total() >= Duration::from_millis(20));
        assert!(s.clock.paused_at().is_none());
        assert_eq!(receipt.total_moves, 0);
        assert_eq!(s.stop().unwrap_err().code(), "already_stopped");
        assert_eq!(s.pause().unwrap_err().code(), "already_stopped");
    }

    #[test]
    fn test_apply_flips_turn_and_finishes() {
        let mut s = session(2);
        assert_eq!(s.current_turn, Side::A);
        s.apply_action("e4", false).unwrap();
        assert_eq!(s.current_turn, Side::B);
        assert!(s.apply_action("Qh5", false).is_err());
        assert_eq!(s.current_turn, Side::B);

        s.apply_action("Nf3", true).unwrap();
        assert_eq!(
            s.status,
            SessionStatus::Finished {
                outcome: GameOutcome::Draw
            }
        );
        assert!(s.history[1].forced);
        assert_eq!(s.pause().unwrap_err().code(), "game_over");
        assert_eq!(s.stop().unwrap_err().code(), "game_over");
        assert!(s.apply_action("e4", false).is_err());
    }

    #[test]
    fn test_view_carries_feedback_and_window() {
        let mut s = session(10);
        for mv in ["e4", "d4", "Nf3", "e4"] {
            s.apply_action(mv, false).unwrap();
        }
        s.player_mut(Side::A).record_invalid(Some("Ke9"));
        let view = s.view(3);
        assert_eq!(view.side_to_move, Side::A);
        assert_eq!(view.recent_actions, vec!["d4", "Nf3", "e4"]);
        assert_eq!(view.ply_count, 4);
        assert_eq!(view.rejected_action.as_deref(), Some("Ke9"));
        assert_eq!(view.fingerprint, "pos-4");
    }

    #[test]
    fn test_reset_restores_fresh_state() {
        let mut s = session(3);
        s.apply_action("e4", false).unwrap();
        s.pause().unwrap();
        s.reset();
        assert_eq!(s.status, SessionStatus::Active);
        assert!(s.history.is_empty());
        assert_eq!(s.current_turn, Side::A);
        assert_eq!(s.engine().current_fingerprint(), "pos-0");
        assert_eq!(s.snapshot().total_paused_ms, 0);
    }

    #[test]
    fn test_actual_duration_never_negative() {
        let s = session(1);
        let snap = s.snapshot();
        assert!(snap.actual_duration_ms < 1000);
        assert!(!snap.is_game_over);
    }
}
