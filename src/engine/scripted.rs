//! 脚本化规则引擎
//!
//! 按预先给定的局面序列推进：每一步给出指纹、合法走法与可选的“引擎拒绝”列表，
//! 任意合法走法都会推进到下一步，序列耗尽即终局。用于演示与测试，不实现任何棋规。

use super::{Applied, GameOutcome, RuleEngine, Side};

/// 脚本中的一步局面
#[derive(Clone, Debug)]
pub struct ScriptedPly {
    pub fingerprint: String,
    pub legal: Vec<String>,
    pub in_check: bool,
    /// 出现在 legal 中、但引擎仍会拒绝的走法（模拟更严格的消歧规则）
    pub rejects: Vec<String>,
}

impl ScriptedPly {
    pub fn new(fingerprint: impl Into<String>, legal: &[&str]) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            legal: legal.iter().map(|s| s.to_string()).collect(),
            in_check: false,
            rejects: Vec::new(),
        }
    }

    pub fn with_check(mut self) -> Self {
        self.in_check = true;
        self
    }

    pub fn rejecting(mut self, actions: &[&str]) -> Self {
        self.rejects = actions.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[derive(Clone, Debug)]
pub struct ScriptedEngine {
    plies: Vec<ScriptedPly>,
    index: usize,
    first: Side,
    final_fingerprint: String,
    outcome: GameOutcome,
}

impl ScriptedEngine {
    pub fn new(plies: Vec<ScriptedPly>, outcome: GameOutcome) -> Self {
        Self {
            plies,
            index: 0,
            first: Side::A,
            final_fingerprint: "final".to_string(),
            outcome,
        }
    }

    /// 每一步都使用同一组合法走法，共 `plies` 步
    pub fn uniform(legal: &[&str], plies: usize, outcome: GameOutcome) -> Self {
        let plies = (0..plies)
            .map(|i| ScriptedPly::new(format!("pos-{i}"), legal))
            .collect();
        Self::new(plies, outcome)
    }

    pub fn with_final_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.final_fingerprint = fingerprint.into();
        self
    }

    /// 已经推进的步数
    pub fn applied_count(&self) -> usize {
        self.index
    }

    fn current(&self) -> Option<&ScriptedPly> {
        self.plies.get(self.index)
    }
}

impl RuleEngine for ScriptedEngine {
    fn current_fingerprint(&self) -> String {
        self.current()
            .map(|p| p.fingerprint.clone())
            .unwrap_or_else(|| self.final_fingerprint.clone())
    }

    fn legal_actions(&self) -> Vec<String> {
        self.current().map(|p| p.legal.clone()).unwrap_or_default()
    }

    fn outcome(&self) -> Option<GameOutcome> {
        if self.index >= self.plies.len() {
            Some(self.outcome.clone())
        } else {
            None
        }
    }

    fn turn_owner(&self) -> Side {
        if self.index % 2 == 0 {
            self.first
        } else {
            self.first.opponent()
        }
    }

    fn in_check(&self) -> bool {
        self.current().map(|p| p.in_check).unwrap_or(false)
    }

    fn apply(&mut self, action: &str) -> Result<Applied, String> {
        let ply = self.current().ok_or_else(|| "Game is over".to_string())?;
        if ply.rejects.iter().any(|r| r == action) {
            return Err(format!("Ambiguous move: {action}"));
        }
        if !ply.legal.iter().any(|l| l == action) {
            return Err(format!("Invalid move: {action}"));
        }
        self.index += 1;
        Ok(Applied {
            action: action.to_string(),
            fingerprint: self.current_fingerprint(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_engine_advances_and_finishes() {
        let mut engine = ScriptedEngine::uniform(&["e4", "d4"], 2, GameOutcome::Draw);
        assert_eq!(engine.turn_owner(), Side::A);
        assert_eq!(engine.current_fingerprint(), "pos-0");

        let applied = engine.apply("e4").unwrap();
        assert_eq!(applied.fingerprint, "pos-1");
        assert_eq!(engine.turn_owner(), Side::B);
        assert!(!engine.is_terminal());

        engine.apply("d4").unwrap();
        assert_eq!(engine.outcome(), Some(GameOutcome::Draw));
        assert!(engine.legal_actions().is_empty());
        assert!(engine.apply("e4").is_err());
    }

    #[test]
    fn test_scripted_engine_rejects() {
        let mut engine = ScriptedEngine::new(
            vec![ScriptedPly::new("p0", &["Nbd2", "e4"]).rejecting(&["Nbd2"])],
            GameOutcome::Draw,
        );
        assert!(engine.apply("Nbd2").unwrap_err().contains("Ambiguous"));
        assert!(engine.apply("Qh5").unwrap_err().contains("Invalid"));
        assert_eq!(engine.applied_count(), 0);
    }
}
