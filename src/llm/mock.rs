//! Mock LLM 客户端（用于测试与演示，无需 API）
//!
//! 默认从提示词的 `Legal moves:` 行取第一个走法，回复 `MOVE: <走法>`；
//! 也可预置一串脚本化回复（含错误），耗尽后回到默认行为。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Prompt};

#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按顺序返回给定回复
    pub fn scripted<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, LlmError>>,
    {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// 每次调用前等待一段时间（模拟网络耗时）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 收到过的 user 提示词
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn first_legal(user: &str) -> Option<String> {
        user.lines()
            .find_map(|l| l.trim().strip_prefix("Legal moves:"))
            .and_then(|rest| rest.split(',').map(str::trim).find(|m| !m.is_empty()))
            .map(String::from)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.user.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        if let Some(reply) = scripted {
            return reply;
        }

        Self::first_legal(&prompt.user)
            .map(|mv| format!("MOVE: {mv}"))
            .ok_or(LlmError::EmptyResponse("Mock"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(user: &str) -> Prompt {
        Prompt {
            system: String::new(),
            user: user.to_string(),
            max_tokens: 150,
            temperature: 0.1,
        }
    }

    #[tokio::test]
    async fn test_mock_first_legal() {
        let client = MockLlmClient::new();
        let reply = client
            .complete(&prompt("Chess white.\nLegal moves: Nf3, e4\n\nMOVE:"))
            .await
            .unwrap();
        assert_eq!(reply, "MOVE: Nf3");
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_script_then_fallback() {
        let client = MockLlmClient::scripted(vec![
            Err(LlmError::Network("boom".into())),
            Ok("MOVE: e4".into()),
        ]);
        let p = prompt("Legal moves: d4");
        assert!(client.complete(&p).await.is_err());
        assert_eq!(client.complete(&p).await.unwrap(), "MOVE: e4");
        assert_eq!(client.complete(&p).await.unwrap(), "MOVE: d4");
        assert_eq!(client.prompts().len(), 3);
    }
}
