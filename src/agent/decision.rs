//! 决策能力：缓存查询 →（未命中）构建提示词 → 调用后端 → 解析 → 校验 / 恢复
//!
//! 无论结果来自缓存、新鲜回复还是就近恢复，都返回统一的 Decision。
//! 写回缓存由调度器在引擎接受走法后调用 `remember` 完成；带着被拒绝走法的
//! 重试不查缓存，必须重新询问后端。取消令牌触发时立即放弃进行中的调用。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::ArenaError;
use crate::engine::Side;
use crate::llm::{LlmClient, LlmError, ProviderKind};
use crate::moves::{parse_action, recover, validate};

use super::prompt::{build_prompt, PromptOptions};
use super::DecisionCache;

/// 提供给智能体的只读会话投影
#[derive(Debug, Clone)]
pub struct SessionView {
    pub fingerprint: String,
    pub side_to_move: Side,
    pub in_check: bool,
    pub legal_actions: Vec<String>,
    /// 最近走法（已按窗口截断）
    pub recent_actions: Vec<String>,
    /// 整局已走步数
    pub ply_count: usize,
    /// 该智能体上一次被拒绝的走法
    pub rejected_action: Option<String>,
}

/// 决策结果来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Cache,
    Fresh,
    /// 解析或校验失败后由就近恢复得到
    Recovered,
}

/// 一次决策尝试的结果（每回合产生，由调度器消费）
#[derive(Debug, Clone)]
pub struct Decision {
    pub agent_id: String,
    /// 成功时为最终走法；非法走法失败时为被拒绝的候选
    pub action: Option<String>,
    pub response: Option<String>,
    pub prompt: String,
    pub elapsed: Duration,
    pub source: Option<DecisionSource>,
    pub error: Option<ArenaError>,
}

impl Decision {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.action.is_some()
    }

    pub fn is_cached(&self) -> bool {
        self.source == Some(DecisionSource::Cache)
    }
}

/// 单个智能体的决策能力：持有后端客户端与共享缓存句柄
pub struct DecisionAgent {
    client: Arc<dyn LlmClient>,
    cache: Option<Arc<DecisionCache>>,
    provider: ProviderKind,
    model_id: String,
    options: PromptOptions,
    request_timeout: Duration,
}

impl DecisionAgent {
    pub fn new(
        client: Arc<dyn LlmClient>,
        provider: ProviderKind,
        model_id: impl Into<String>,
        options: PromptOptions,
    ) -> Self {
        Self {
            client,
            cache: None,
            provider,
            model_id: model_id.into(),
            options,
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_cache(mut self, cache: Arc<DecisionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.client.token_usage()
    }

    pub async fn request_decision(
        &self,
        agent_id: &str,
        view: &SessionView,
        cancel: &CancellationToken,
    ) -> Decision {
        let start = Instant::now();

        if let Some(cache) = self.cache.as_ref().filter(|_| view.rejected_action.is_none()) {
            if let Some(entry) = cache
                .get(&view.fingerprint, &self.model_id, &view.legal_actions)
                .await
            {
                tracing::debug!(model = %self.model_id, action = %entry.value.action, "Cache hit");
                return Decision {
                    agent_id: agent_id.to_string(),
                    action: Some(entry.value.action.clone()),
                    response: Some(entry.value.response.clone()),
                    prompt: "[Cached response]".to_string(),
                    elapsed: start.elapsed(),
                    source: Some(DecisionSource::Cache),
                    error: None,
                };
            }
        }

        let prompt = build_prompt(self.provider, view, &self.options);
        tracing::debug!(model = %self.model_id, prompt = %prompt.user, "Requesting decision");

        let timeout_secs = self.request_timeout.as_secs();
        let raw = tokio::select! {
            _ = cancel.cancelled() => Err(LlmError::Cancelled),
            result = tokio::time::timeout(self.request_timeout, self.client.complete(&prompt)) => {
                result.unwrap_or(Err(LlmError::Timeout(timeout_secs)))
            }
        };

        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                return Decision {
                    agent_id: agent_id.to_string(),
                    action: None,
                    response: None,
                    prompt: prompt.user,
                    elapsed: start.elapsed(),
                    source: None,
                    error: Some(ArenaError::Provider(e)),
                };
            }
        };

        match resolve_action(&raw, &view.legal_actions) {
            Ok((action, source)) => Decision {
                agent_id: agent_id.to_string(),
                action: Some(action),
                response: Some(raw),
                prompt: prompt.user,
                elapsed: start.elapsed(),
                source: Some(source),
                error: None,
            },
            Err(e) => {
                let candidate = match &e {
                    ArenaError::IllegalAction { action, .. } => Some(action.clone()),
                    _ => None,
                };
                Decision {
                    agent_id: agent_id.to_string(),
                    action: candidate,
                    response: Some(raw),
                    prompt: prompt.user,
                    elapsed: start.elapsed(),
                    source: None,
                    error: Some(e),
                }
            }
        }
    }

    /// 引擎接受走法后写回缓存；缓存命中或失败的决策不写
    pub async fn remember(&self, view: &SessionView, decision: &Decision) {
        let Some(cache) = &self.cache else {
            return;
        };
        if decision.is_cached() || !decision.is_success() {
            return;
        }
        if let (Some(action), Some(response)) = (&decision.action, &decision.response) {
            cache
                .set(&view.fingerprint, &self.model_id, &view.legal_actions, response, action)
                .await;
        }
    }
}

/// 解析 → 校验；任一步失败都先尝试就近恢复
pub fn resolve_action(raw: &str, legal: &[String]) -> Result<(String, DecisionSource), ArenaError> {
    match parse_action(raw) {
        Ok(candidate) => match validate(&candidate, legal) {
            Ok(()) => Ok((candidate, DecisionSource::Fresh)),
            Err(e) => match recover(raw, legal) {
                Some(action) => {
                    tracing::info!(%candidate, %action, "Move validation failed, using closest valid move");
                    Ok((action, DecisionSource::Recovered))
                }
                None => Err(e),
            },
        },
        Err(e) => match recover(raw, legal) {
            Some(action) => {
                tracing::info!(%action, "Move parsing failed, using closest valid move");
                Ok((action, DecisionSource::Recovered))
            }
            None => Err(e),
        },
    }
}
