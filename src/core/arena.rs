//! 竞技场：会话注册表与对外控制面
//!
//! 持有共享决策缓存与调度参数；create / advance / pause / resume / stop / reset / snapshot
//! 都按会话 ID 路由，失败时返回带机器可读原因的 ArenaError。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::agent::{AgentPlayer, CacheStats, DecisionAgent, DecisionCache};
use crate::config::ArenaConfig;
use crate::core::events::{emit, Broadcaster, EventBody};
use crate::core::recovery::RecoveryEngine;
use crate::core::scheduler::{spawn_driver, SchedulerContext, SessionHandle};
use crate::core::session::{PauseReceipt, ResumeReceipt, Session, SessionSnapshot, SessionStatus, StopReceipt};
use crate::core::{ArenaError, SessionStateReason};
use crate::engine::{EngineFactory, Side};
use crate::llm::{create_client, lookup, LlmClient, ProviderKind};

/// 按模型 ID 描述一个智能体；api_key 为空时读取对应后端的环境变量
#[derive(Debug, Clone, Default)]
pub struct AgentSpec {
    pub model_id: String,
    pub api_key: Option<String>,
    pub name: Option<String>,
}

impl AgentSpec {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// 已解析好客户端的席位（也可由调用方直接注入客户端）
#[derive(Clone)]
pub struct AgentSeat {
    pub model_id: String,
    pub provider: ProviderKind,
    pub name: Option<String>,
    pub client: Arc<dyn LlmClient>,
}

pub struct Arena {
    config: ArenaConfig,
    engine_factory: EngineFactory,
    cache: Arc<DecisionCache>,
    ctx: Arc<SchedulerContext>,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl Arena {
    pub fn new(config: ArenaConfig, engine_factory: EngineFactory, broadcaster: Arc<dyn Broadcaster>) -> Self {
        let cache = Arc::new(DecisionCache::new(config.cache.capacity));
        let ctx = Arc::new(SchedulerContext {
            recovery: RecoveryEngine::new(config.pacing.clone()),
            broadcaster,
            history_window: config.agents.history_window,
        });
        Self {
            config,
            engine_factory,
            cache,
            ctx,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<DecisionCache> {
        &self.cache
    }

    /// 按模型目录解析双方并创建会话（不开始推进）
    pub async fn create_session(&self, white: AgentSpec, black: AgentSpec) -> Result<String, ArenaError> {
        let white = self.resolve_seat(white)?;
        let black = self.resolve_seat(black)?;
        Ok(self.create_session_with_seats(white, black).await)
    }

    pub async fn create_session_with_seats(&self, white: AgentSeat, black: AgentSeat) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Session::new(
            id.clone(),
            self.engine_factory.clone(),
            AgentPlayer::new(Side::A, &white.model_id, white.provider, white.name.clone()),
            AgentPlayer::new(Side::B, &black.model_id, black.provider, black.name.clone()),
        );
        let handle = Arc::new(SessionHandle::new(
            session,
            self.build_agent(white),
            self.build_agent(black),
        ));
        self.sessions.write().await.insert(id.clone(), handle);
        tracing::info!(session_id = %id, "Session created");
        id
    }

    /// 确保调度器正在推进该会话；重复调用无副作用，暂停中的会话先恢复
    pub async fn advance(&self, id: &str) -> Result<(), ArenaError> {
        let handle = self.handle(id).await?;
        let mut session = handle.state.lock().await;
        match session.status.clone() {
            SessionStatus::Stopped => {
                Err(ArenaError::session_state("advance", SessionStateReason::AlreadyStopped))
            }
            SessionStatus::Finished { .. } => {
                Err(ArenaError::session_state("advance", SessionStateReason::GameOver))
            }
            SessionStatus::Paused => {
                let receipt = session.resume()?;
                self.publish_resumed(id, &receipt);
                spawn_driver(&handle, &self.ctx, &mut session, self.ctx.recovery.resume_delay());
                Ok(())
            }
            SessionStatus::Active => {
                if !session.supervisor.is_driving() {
                    tracing::info!(session_id = %id, "Starting driver");
                    spawn_driver(&handle, &self.ctx, &mut session, Duration::ZERO);
                }
                Ok(())
            }
        }
    }

    pub async fn pause(&self, id: &str) -> Result<PauseReceipt, ArenaError> {
        let handle = self.handle(id).await?;
        let mut session = handle.state.lock().await;
        let receipt = session.pause()?;
        tracing::info!(session_id = %id, moves = receipt.moves_played, "Session paused");
        emit(
            self.ctx.broadcaster.as_ref(),
            id,
            EventBody::SessionPaused {
                moves_played: receipt.moves_played,
            },
        );
        Ok(receipt)
    }

    /// 恢复后等待 resume_delay 再重新推进
    pub async fn resume(&self, id: &str) -> Result<ResumeReceipt, ArenaError> {
        let handle = self.handle(id).await?;
        let mut session = handle.state.lock().await;
        let receipt = session.resume()?;
        self.publish_resumed(id, &receipt);
        spawn_driver(&handle, &self.ctx, &mut session, self.ctx.recovery.resume_delay());
        Ok(receipt)
    }

    pub async fn stop(&self, id: &str) -> Result<StopReceipt, ArenaError> {
        let handle = self.handle(id).await?;
        let mut session = handle.state.lock().await;
        let receipt = session.stop()?;
        tracing::info!(
            session_id = %id,
            total_moves = receipt.total_moves,
            duration_ms = receipt.final_duration_ms,
            "Session stopped"
        );
        emit(
            self.ctx.broadcaster.as_ref(),
            id,
            EventBody::SessionStopped {
                final_duration_ms: receipt.final_duration_ms,
                total_moves: receipt.total_moves,
                final_fingerprint: receipt.final_fingerprint.clone(),
            },
        );
        Ok(receipt)
    }

    /// 回到初始局面；不会自动开始推进
    pub async fn reset(&self, id: &str) -> Result<(), ArenaError> {
        let handle = self.handle(id).await?;
        let mut session = handle.state.lock().await;
        session.reset();
        tracing::info!(session_id = %id, "Session reset");
        emit(self.ctx.broadcaster.as_ref(), id, EventBody::SessionReset);
        Ok(())
    }

    pub async fn snapshot(&self, id: &str) -> Result<SessionSnapshot, ArenaError> {
        let handle = self.handle(id).await?;
        let session = handle.state.lock().await;
        Ok(session.snapshot())
    }

    /// 取消驱动并从注册表移除
    pub async fn remove_session(&self, id: &str) -> Result<(), ArenaError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| ArenaError::SessionNotFound(id.to_string()))?;
        handle.state.lock().await.supervisor.cancel();
        tracing::info!(session_id = %id, "Session removed");
        Ok(())
    }

    pub async fn session_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    async fn handle(&self, id: &str) -> Result<Arc<SessionHandle>, ArenaError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ArenaError::SessionNotFound(id.to_string()))
    }

    fn publish_resumed(&self, id: &str, receipt: &ResumeReceipt) {
        tracing::info!(session_id = %id, total_paused_ms = receipt.total_paused_ms, "Session resumed");
        emit(
            self.ctx.broadcaster.as_ref(),
            id,
            EventBody::SessionResumed {
                total_paused_ms: receipt.total_paused_ms,
            },
        );
    }

    fn resolve_seat(&self, spec: AgentSpec) -> Result<AgentSeat, ArenaError> {
        let entry = lookup(&spec.model_id)
            .ok_or_else(|| ArenaError::Config(format!("Unknown model: {}", spec.model_id)))?;

        let api_key = match entry.provider.api_key_env() {
            None => String::new(),
            Some(var) => spec
                .api_key
                .filter(|k| !k.trim().is_empty())
                .or_else(|| std::env::var(var).ok().filter(|k| !k.trim().is_empty()))
                .ok_or_else(|| {
                    ArenaError::Config(format!("Missing API key for {} (set {var})", entry.name))
                })?,
        };

        let client = create_client(entry.provider, entry.id, &api_key, self.base_url(entry.provider));
        Ok(AgentSeat {
            model_id: entry.id.to_string(),
            provider: entry.provider,
            name: spec.name,
            client,
        })
    }

    fn base_url(&self, provider: ProviderKind) -> Option<&str> {
        let providers = &self.config.providers;
        match provider {
            ProviderKind::OpenAi => providers.openai_base_url.as_deref(),
            ProviderKind::Anthropic => providers.anthropic_base_url.as_deref(),
            ProviderKind::OpenRouter => providers.openrouter_base_url.as_deref(),
            ProviderKind::Mock => None,
        }
    }

    fn build_agent(&self, seat: AgentSeat) -> Arc<DecisionAgent> {
        let agents = &self.config.agents;
        let agent = DecisionAgent::new(seat.client, seat.provider, seat.model_id, agents.prompt_options())
            .with_request_timeout(agents.request_timeout());
        if agents.use_cache {
            Arc::new(agent.with_cache(self.cache.clone()))
        } else {
            Arc::new(agent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::NullBroadcaster;
    use crate::engine::{engine_factory, GameOutcome, ScriptedEngine};

    fn arena() -> Arena {
        let factory = engine_factory(|| ScriptedEngine::uniform(&["e4", "d4"], 4, GameOutcome::Draw));
        Arena::new(ArenaConfig::default(), factory, Arc::new(NullBroadcaster))
    }

    #[tokio::test]
    async fn test_unknown_model_is_config_error() {
        let err = arena()
            .create_session(AgentSpec::new("gpt-99"), AgentSpec::new("mock-first-legal"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "config_error");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        std::env::remove_var("OPENROUTER_API_KEY");
        let err = arena()
            .create_session(
                AgentSpec::new("openai/gpt-4"),
                AgentSpec::new("mock-first-legal"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ArenaError::Config(ref msg) if msg.contains("OPENROUTER_API_KEY")));
    }

    #[tokio::test]
    async fn test_explicit_api_key_skips_env() {
        let arena = arena();
        let id = arena
            .create_session(
                AgentSpec::new("openai/gpt-4").with_api_key("sk-test"),
                AgentSpec::new("mock-first-legal"),
            )
            .await
            .unwrap();
        let snap = arena.snapshot(&id).await.unwrap();
        assert_eq!(snap.white.model_id, "openai/gpt-4");
    }

    #[tokio::test]
    async fn test_mock_session_snapshot() {
        let arena = arena();
        let id = arena
            .create_session(
                AgentSpec::new("mock-first-legal").with_name("Alpha"),
                AgentSpec::new("mock-first-legal"),
            )
            .await
            .unwrap();
        let snap = arena.snapshot(&id).await.unwrap();
        assert_eq!(snap.white.name, "Alpha");
        assert_eq!(snap.black.name, "mock-first-legal (black)");
        assert_eq!(snap.status, SessionStatus::Active);
        assert_eq!(snap.legal_actions, vec!["e4", "d4"]);
        assert!(snap.history.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let arena = arena();
        assert_eq!(arena.pause("nope").await.unwrap_err().code(), "session_not_found");
        assert!(arena.remove_session("nope").await.is_err());
    }
}
