//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Anthropic / OpenRouter / Mock）实现 LlmClient：
//! 给定一次提示词，返回原始文本或 LlmError。请求细节（鉴权、报文形状）留在各实现内部。

use async_trait::async_trait;
use thiserror::Error;

/// 调用后端时的错误（网络、HTTP 状态、空回复等）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("No response from {0} API")]
    EmptyResponse(&'static str),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Request cancelled")]
    Cancelled,

    #[error("LLM error: {0}")]
    Other(String),
}

/// 一次决策请求的提示词载荷
#[derive(Clone, Debug)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
