//! 规则引擎接口（外部协作方）
//!
//! 编排层把规则引擎视为权威的黑盒：局面指纹、合法走法、终局判定与落子都由它给出。
//! 走法合法性以引擎为准，覆盖 Validator 自己的判断。

pub mod scripted;

use serde::{Deserialize, Serialize};

pub use scripted::{ScriptedEngine, ScriptedPly};

/// 对弈双方
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// 先手（白方）
    A,
    /// 后手（黑方）
    B,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// 提示词里使用的颜色名
    pub fn color(self) -> &'static str {
        match self {
            Side::A => "white",
            Side::B => "black",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.color())
    }
}

/// 终局原因
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameOutcome {
    Checkmate { winner: Side },
    Stalemate,
    Draw,
    Other { reason: String },
}

impl std::fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameOutcome::Checkmate { winner } => write!(f, "checkmate_{}_wins", winner.color()),
            GameOutcome::Stalemate => f.write_str("stalemate"),
            GameOutcome::Draw => f.write_str("draw"),
            GameOutcome::Other { reason } => f.write_str(reason),
        }
    }
}

/// 引擎接受走法后的结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Applied {
    /// 引擎规范化后的走法记号
    pub action: String,
    pub fingerprint: String,
}

/// 规则引擎：编排层唯一的局面真相来源
///
/// 方法均为同步调用；实现方自行保证计算足够快，调度器会在持有会话锁时调用。
pub trait RuleEngine: Send {
    /// 当前局面指纹（如 FEN）
    fn current_fingerprint(&self) -> String;

    /// 当前行棋方的全部合法走法
    fn legal_actions(&self) -> Vec<String>;

    /// 终局原因；未结束时为 None
    fn outcome(&self) -> Option<GameOutcome>;

    fn is_terminal(&self) -> bool {
        self.outcome().is_some()
    }

    /// 当前行棋方
    fn turn_owner(&self) -> Side;

    /// 行棋方是否被将军（提示词约束标记）
    fn in_check(&self) -> bool {
        false
    }

    /// 尝试落子；被拒绝时返回原因
    fn apply(&mut self, action: &str) -> Result<Applied, String>;
}

/// 为会话创建（及 reset 重建）规则引擎
pub type EngineFactory = std::sync::Arc<dyn Fn() -> Box<dyn RuleEngine> + Send + Sync>;

/// 把返回具体引擎类型的构造函数包装成 EngineFactory
pub fn engine_factory<E, F>(make: F) -> EngineFactory
where
    E: RuleEngine + 'static,
    F: Fn() -> E + Send + Sync + 'static,
{
    std::sync::Arc::new(move || Box::new(make()) as Box<dyn RuleEngine>)
}
