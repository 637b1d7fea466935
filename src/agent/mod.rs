//! 智能体层：档案与统计、提示词、决策缓存、决策能力

pub mod cache;
pub mod decision;
pub mod player;
pub mod prompt;

pub use cache::{CacheEntry, CacheStats, CachedDecision, DecisionCache, DEFAULT_CACHE_CAPACITY};
pub use decision::{resolve_action, Decision, DecisionAgent, DecisionSource, SessionView};
pub use player::{AgentInfo, AgentPlayer};
pub use prompt::{build_prompt, PromptOptions};
