//! 支持的模型目录：模型 ID -> 展示名 / 后端 / 是否快速模型

use serde::Serialize;

use super::ProviderKind;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: ProviderKind,
    pub fast: bool,
}

const fn entry(id: &'static str, name: &'static str, provider: ProviderKind, fast: bool) -> ModelEntry {
    ModelEntry {
        id,
        name,
        provider,
        fast,
    }
}

static MODELS: &[ModelEntry] = &[
    entry("gpt-4", "GPT-4", ProviderKind::OpenAi, false),
    entry("gpt-4-turbo", "GPT-4 Turbo", ProviderKind::OpenAi, false),
    entry("gpt-3.5-turbo", "GPT-3.5 Turbo", ProviderKind::OpenAi, false),
    entry("claude-sonnet-4-20250514", "Claude Sonnet 4 (Latest)", ProviderKind::Anthropic, true),
    entry("claude-3-opus-20240229", "Claude 3 Opus", ProviderKind::Anthropic, false),
    entry("claude-3-sonnet-20240229", "Claude 3 Sonnet", ProviderKind::Anthropic, true),
    entry("claude-3-haiku-20240307", "Claude 3 Haiku", ProviderKind::Anthropic, true),
    entry("meta-llama/llama-2-70b-chat", "Llama 2 70B", ProviderKind::OpenRouter, false),
    entry("anthropic/claude-3-opus", "Claude 3 Opus (OpenRouter)", ProviderKind::OpenRouter, false),
    entry("openai/gpt-4", "GPT-4 (OpenRouter)", ProviderKind::OpenRouter, false),
    entry("mock-first-legal", "Mock (first legal move)", ProviderKind::Mock, true),
];

pub fn all_models() -> &'static [ModelEntry] {
    MODELS
}

pub fn lookup(model_id: &str) -> Option<&'static ModelEntry> {
    MODELS.iter().find(|m| m.id == model_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let m = lookup("claude-3-haiku-20240307").unwrap();
        assert_eq!(m.provider, ProviderKind::Anthropic);
        assert!(m.fast);
        assert!(lookup("gpt-5-ultra").is_none());
    }

    #[test]
    fn test_ids_unique() {
        let mut ids: Vec<_> = all_models().iter().map(|m| m.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), all_models().len());
    }
}
