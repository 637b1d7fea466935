//! LLM 层：客户端抽象与各后端实现（OpenAI / Anthropic / OpenRouter / Mock）
//!
//! 后端差异只在 ProviderKind 里体现（端点、系统提示措辞、鉴权方式），编排逻辑不关心具体后端。

pub mod anthropic;
pub mod catalog;
pub mod mock;
pub mod openai;
pub mod openrouter;
pub mod traits;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use anthropic::AnthropicClient;
pub use catalog::{all_models, lookup, ModelEntry};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use openrouter::create_openrouter_client;
pub use traits::{LlmClient, LlmError, Prompt};

/// 后端类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    OpenRouter,
    /// 本地 Mock，无需 API Key
    Mock,
}

impl ProviderKind {
    /// 未显式传入 API Key 时读取的环境变量
    pub fn api_key_env(self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::OpenRouter => Some("OPENROUTER_API_KEY"),
            ProviderKind::Mock => None,
        }
    }

    /// 各后端的系统提示措辞
    pub fn system_prompt(self, fast_mode: bool) -> &'static str {
        match self {
            ProviderKind::OpenRouter => {
                "You are a chess grandmaster. Analyze positions deeply and make the best possible moves. \
                 Always respond with your analysis followed by \"MOVE: [your move]\"."
            }
            _ if fast_mode => {
                "Chess expert. Reply with move in format \"MOVE: [move]\". Be concise."
            }
            _ => {
                "You are a chess expert. Analyze positions and make strong moves. \
                 Format: \"MOVE: [your move]\"."
            }
        }
    }
}

/// 按后端类型构造客户端；base_url 为 None 时使用各自官方端点
pub fn create_client(
    provider: ProviderKind,
    model: &str,
    api_key: &str,
    base_url: Option<&str>,
) -> Arc<dyn LlmClient> {
    match provider {
        ProviderKind::OpenAi => Arc::new(OpenAiClient::new(base_url, model, api_key)),
        ProviderKind::Anthropic => Arc::new(AnthropicClient::new(base_url, model, api_key)),
        ProviderKind::OpenRouter => Arc::new(create_openrouter_client(base_url, model, api_key)),
        ProviderKind::Mock => Arc::new(MockLlmClient::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_variants() {
        assert!(ProviderKind::OpenAi.system_prompt(true).contains("Be concise"));
        assert!(ProviderKind::Anthropic.system_prompt(false).contains("strong moves"));
        assert!(ProviderKind::OpenRouter.system_prompt(true).contains("grandmaster"));
    }

    #[test]
    fn test_api_key_env() {
        assert_eq!(ProviderKind::Anthropic.api_key_env(), Some("ANTHROPIC_API_KEY"));
        assert_eq!(ProviderKind::Mock.api_key_env(), None);
    }
}
