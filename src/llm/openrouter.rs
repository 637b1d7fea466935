//! OpenRouter 客户端（OpenAI 兼容格式）
//!
//! - Base URL: https://openrouter.ai/api/v1
//! - 模型名带厂商前缀，如 `anthropic/claude-3-opus`

use crate::llm::OpenAiClient;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// 创建 OpenRouter 客户端；base_url 为 None 时使用官方端点
pub fn create_openrouter_client(base_url: Option<&str>, model: &str, api_key: &str) -> OpenAiClient {
    OpenAiClient::new(Some(base_url.unwrap_or(OPENROUTER_BASE_URL)), model, api_key)
        .with_label("OpenRouter")
}
