//! 回合调度器
//!
//! 每个会话一个驱动任务：等待节奏延迟 → step → 根据结果决定下一次延迟。
//! step 在请求后端前后各取一次会话锁；后端调用期间不持锁，回来后重新检查资格，
//! 暂停 / 停止 / 重置取消令牌后，进行中的调用和等待立即放弃。
//!
//! 事件都在持锁时发布，同一会话的事件顺序与状态转换一致。

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::agent::DecisionAgent;
use crate::core::events::{emit, Broadcaster, EventBody};
use crate::core::recovery::RecoveryEngine;
use crate::core::session::{Session, SessionStatus, TurnPhase};
use crate::core::{ArenaError, RecoveryAction};
use crate::engine::{GameOutcome, Side};

/// 所有会话共享的调度参数
pub struct SchedulerContext {
    pub recovery: RecoveryEngine,
    pub broadcaster: Arc<dyn Broadcaster>,
    /// 会话视图中最近走法的窗口（半回合）
    pub history_window: usize,
}

/// 一个会话及其双方的决策能力
pub struct SessionHandle {
    pub id: String,
    pub state: Mutex<Session>,
    agents: [Arc<DecisionAgent>; 2],
}

impl SessionHandle {
    pub fn new(session: Session, white: Arc<DecisionAgent>, black: Arc<DecisionAgent>) -> Self {
        Self {
            id: session.id.clone(),
            state: Mutex::new(session),
            agents: [white, black],
        }
    }

    pub fn agent(&self, side: Side) -> &Arc<DecisionAgent> {
        match side {
            Side::A => &self.agents[0],
            Side::B => &self.agents[1],
        }
    }
}

/// step 的结果：继续（附带下一次延迟）或停止驱动
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue(Duration),
    Halt,
}

/// 为会话换一枚新令牌并挂载驱动任务；调用方持有会话锁
pub fn spawn_driver(
    handle: &Arc<SessionHandle>,
    ctx: &Arc<SchedulerContext>,
    session: &mut Session,
    initial_delay: Duration,
) {
    let token = session.supervisor.rearm();
    let driver = tokio::spawn(drive(handle.clone(), ctx.clone(), token, initial_delay));
    session.supervisor.attach(driver);
}

/// 驱动循环：直到令牌取消或会话失去资格
pub async fn drive(
    handle: Arc<SessionHandle>,
    ctx: Arc<SchedulerContext>,
    token: CancellationToken,
    initial_delay: Duration,
) {
    tracing::debug!(session_id = %handle.id, "Driver started");
    let mut delay = initial_delay;
    loop {
        if !delay.is_zero() {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        match step(&handle, &ctx, &token).await {
            StepOutcome::Continue(next) => delay = next,
            StepOutcome::Halt => break,
        }
    }
    tracing::debug!(session_id = %handle.id, "Driver exited");
}

/// 推进一个回合（或一次重试）
pub async fn step(
    handle: &SessionHandle,
    ctx: &SchedulerContext,
    token: &CancellationToken,
) -> StepOutcome {
    let (side, agent_id, view) = {
        let mut session = handle.state.lock().await;
        if token.is_cancelled() || session.status != SessionStatus::Active {
            return StepOutcome::Halt;
        }
        if let Some(outcome) = session.finish_if_terminal() {
            publish_finished(&session, ctx, outcome);
            return StepOutcome::Halt;
        }

        session.phase = TurnPhase::RequestingDecision;
        let side = session.current_turn;
        let agent_id = session.player(side).id.clone();
        let view = session.view(ctx.history_window);
        emit(
            ctx.broadcaster.as_ref(),
            &handle.id,
            EventBody::DecisionRequested {
                side,
                agent_id: agent_id.clone(),
                ply: session.history.len() + 1,
            },
        );
        (side, agent_id, view)
    };

    let decision = handle
        .agent(side)
        .request_decision(&agent_id, &view, token)
        .await;

    let mut session = handle.state.lock().await;
    if token.is_cancelled() || session.status != SessionStatus::Active {
        tracing::debug!(session_id = %handle.id, "Session no longer eligible, dropping decision");
        return StepOutcome::Halt;
    }
    session.player_mut(side).record_attempt(decision.elapsed);

    let action = match (decision.error.clone(), decision.action.clone()) {
        (None, Some(action)) => action,
        (Some(err), candidate) if err.is_invalid_action() => {
            return handle_invalid(&mut session, ctx, side, candidate.as_deref(), &err);
        }
        (Some(err), _) => return handle_provider_error(&mut session, ctx, side, &err),
        (None, None) => {
            let err = ArenaError::Parse {
                excerpt: String::new(),
            };
            return handle_invalid(&mut session, ctx, side, None, &err);
        }
    };

    session.phase = TurnPhase::Applying;
    match session.apply_action(&action, false) {
        Ok(applied) => {
            handle.agent(side).remember(&view, &decision).await;
            let cached = decision.is_cached();
            session.player_mut(side).record_success(cached);
            tracing::info!(
                session_id = %handle.id,
                %side,
                action = %applied.action,
                cached,
                "Move applied"
            );
            emit(
                ctx.broadcaster.as_ref(),
                &handle.id,
                EventBody::DecisionApplied {
                    side,
                    agent_id,
                    action: applied.action,
                    fingerprint: applied.fingerprint,
                    cached,
                    thinking_ms: decision.elapsed.as_millis() as u64,
                },
            );
            after_move(&session, ctx)
        }
        Err(reason) => {
            let err = ArenaError::IllegalAction {
                action: action.clone(),
                reason,
            };
            handle_invalid(&mut session, ctx, side, Some(&action), &err)
        }
    }
}

/// 无效走法：计数、反馈给下一轮提示，达到阈值时强制走法
fn handle_invalid(
    session: &mut Session,
    ctx: &SchedulerContext,
    side: Side,
    action: Option<&str>,
    err: &ArenaError,
) -> StepOutcome {
    let player = session.player_mut(side);
    player.record_invalid(action);
    let consecutive_invalid = player.consecutive_invalid;
    let agent_id = player.id.clone();
    tracing::warn!(
        session_id = %session.id,
        %side,
        consecutive_invalid,
        error = %err,
        "Invalid action"
    );
    emit(
        ctx.broadcaster.as_ref(),
        &session.id,
        EventBody::DecisionInvalid {
            side,
            agent_id: agent_id.clone(),
            action: action.map(String::from),
            error: err.to_string(),
            consecutive_invalid,
        },
    );

    match ctx.recovery.handle(err, consecutive_invalid) {
        RecoveryAction::ForceLegal => force_legal(session, ctx, side, agent_id),
        RecoveryAction::RetryAfter(delay) | RecoveryAction::Backoff(delay) => {
            session.phase = TurnPhase::Retrying;
            StepOutcome::Continue(delay)
        }
    }
}

fn handle_provider_error(
    session: &mut Session,
    ctx: &SchedulerContext,
    side: Side,
    err: &ArenaError,
) -> StepOutcome {
    let delay = match ctx.recovery.handle(err, 0) {
        RecoveryAction::Backoff(delay) | RecoveryAction::RetryAfter(delay) => delay,
        RecoveryAction::ForceLegal => ctx.recovery.pacing().error_backoff(),
    };
    tracing::warn!(
        session_id = %session.id,
        %side,
        error = %err,
        retry_in_ms = delay.as_millis() as u64,
        "Provider error, backing off"
    );
    session.phase = TurnPhase::Idle;
    emit(
        ctx.broadcaster.as_ref(),
        &session.id,
        EventBody::DecisionError {
            side,
            agent_id: session.player(side).id.clone(),
            error: err.to_string(),
            retry_in_ms: delay.as_millis() as u64,
        },
    );
    StepOutcome::Continue(delay)
}

/// 绕过智能体，从合法集合中均匀随机选一步；刚被拒绝的走法不参与抽取
fn force_legal(session: &mut Session, ctx: &SchedulerContext, side: Side, agent_id: String) -> StepOutcome {
    let legal = session.engine().legal_actions();
    let rejected = session.player(side).last_invalid_action.clone();
    let Some(action) = pick_forced(&legal, rejected.as_deref()) else {
        tracing::warn!(session_id = %session.id, "No legal actions to force");
        session.phase = TurnPhase::Retrying;
        return StepOutcome::Continue(ctx.recovery.pacing().invalid_retry_delay());
    };

    match session.apply_action(&action, true) {
        Ok(applied) => {
            session.player_mut(side).record_forced();
            tracing::warn!(
                session_id = %session.id,
                %side,
                action = %applied.action,
                "Forced random legal move"
            );
            emit(
                ctx.broadcaster.as_ref(),
                &session.id,
                EventBody::DecisionForced {
                    side,
                    agent_id,
                    action: applied.action,
                    fingerprint: applied.fingerprint,
                },
            );
            after_move(session, ctx)
        }
        Err(reason) => {
            tracing::warn!(session_id = %session.id, %action, %reason, "Engine rejected forced move");
            session.phase = TurnPhase::Retrying;
            StepOutcome::Continue(ctx.recovery.pacing().invalid_retry_delay())
        }
    }
}

/// 排除 rejected 后均匀抽取；只剩被拒绝的走法时退回整个合法集合
fn pick_forced(legal: &[String], rejected: Option<&str>) -> Option<String> {
    let pool: Vec<&String> = legal
        .iter()
        .filter(|a| Some(a.as_str()) != rejected)
        .collect();
    let mut rng = rand::thread_rng();
    match pool.choose(&mut rng) {
        Some(action) => Some((*action).clone()),
        None => legal.choose(&mut rng).cloned(),
    }
}

/// 落子之后：终局则发布 session_finished 并停止，否则按节奏进入下一回合
fn after_move(session: &Session, ctx: &SchedulerContext) -> StepOutcome {
    match &session.status {
        SessionStatus::Finished { outcome } => {
            publish_finished(session, ctx, outcome.clone());
            StepOutcome::Halt
        }
        _ => StepOutcome::Continue(ctx.recovery.move_delay()),
    }
}

fn publish_finished(session: &Session, ctx: &SchedulerContext, outcome: GameOutcome) {
    tracing::info!(
        session_id = %session.id,
        %outcome,
        total_moves = session.history.len(),
        "Game finished"
    );
    emit(
        ctx.broadcaster.as_ref(),
        &session.id,
        EventBody::SessionFinished {
            outcome,
            total_moves: session.history.len(),
        },
    );
}
