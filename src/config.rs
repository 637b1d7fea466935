//! 竞技场配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ARENA__*` 覆盖（双下划线表示嵌套，如 `ARENA__PACING__MOVE_DELAY_MS=500`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::agent::{PromptOptions, DEFAULT_CACHE_CAPACITY};

/// 配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub pacing: PacingPolicy,
    pub agents: AgentsSection,
    pub cache: CacheSection,
    pub providers: ProvidersSection,
}

/// [pacing] 段：回合节奏与恢复阈值（毫秒）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingPolicy {
    /// 成功落子后到下一回合的间隔
    pub move_delay_ms: u64,
    /// 无效走法后的短延迟重试
    pub invalid_retry_delay_ms: u64,
    /// 后端错误后的退避
    pub error_backoff_ms: u64,
    /// resume 之后重新开始推进前的等待
    pub resume_delay_ms: u64,
    /// 连续无效达到该次数后强制走法
    pub max_invalid_before_forced: u32,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            move_delay_ms: 2000,
            invalid_retry_delay_ms: 500,
            error_backoff_ms: 5000,
            resume_delay_ms: 1000,
            max_invalid_before_forced: 3,
        }
    }
}

impl PacingPolicy {
    pub fn move_delay(&self) -> Duration {
        Duration::from_millis(self.move_delay_ms)
    }

    pub fn invalid_retry_delay(&self) -> Duration {
        Duration::from_millis(self.invalid_retry_delay_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }
}

/// [agents] 段：提示词与后端调用
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentsSection {
    pub fast_mode: bool,
    pub include_analysis: bool,
    pub use_cache: bool,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub history_window: usize,
    pub request_timeout_secs: u64,
}

impl Default for AgentsSection {
    fn default() -> Self {
        Self {
            fast_mode: true,
            include_analysis: false,
            use_cache: true,
            max_tokens: None,
            temperature: None,
            history_window: 6,
            request_timeout_secs: 60,
        }
    }
}

impl AgentsSection {
    pub fn prompt_options(&self) -> PromptOptions {
        PromptOptions {
            fast_mode: self.fast_mode,
            include_analysis: self.include_analysis,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            history_window: self.history_window,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// [cache] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub capacity: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// [providers] 段：自定义端点（代理、兼容网关）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersSection {
    pub openai_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub openrouter_base_url: Option<String>,
}

/// 从 config 目录加载配置，环境变量 ARENA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 ARENA__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<ArenaConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ARENA")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
