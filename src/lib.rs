//! Arena - 双智能体对弈编排引擎
//!
//! 模块划分：
//! - **agent**: 智能体档案与统计、提示词、决策缓存、决策能力
//! - **config**: 配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、会话状态机、事件广播、回合调度、竞技场控制面
//! - **engine**: 规则引擎接口与脚本化实现
//! - **llm**: LLM 客户端抽象与实现（OpenAI / Anthropic / OpenRouter / Mock）与模型目录
//! - **moves**: 走法解析、校验与就近恢复
//! - **observability**: 日志初始化

pub mod agent;
pub mod config;
pub mod core;
pub mod engine;
pub mod llm;
pub mod moves;
pub mod observability;

pub use crate::config::{load_config, ArenaConfig};
pub use crate::core::{Arena, ArenaError, ArenaEvent};
