//! 走法校验与就近恢复
//!
//! validate：候选走法必须在合法集合内（精确匹配）。
//! recover：解析或校验失败后，在原始回复里找合法走法：先找原文出现的完整走法（不区分大小写），
//! 再找目的格或“首字符 + 目的格”出现在原文中的走法。尽力而为，可能找不到。

use crate::core::ArenaError;

pub fn validate(candidate: &str, legal: &[String]) -> Result<(), ArenaError> {
    if legal.is_empty() {
        return Err(ArenaError::IllegalAction {
            action: candidate.to_string(),
            reason: "no legal actions available".to_string(),
        });
    }
    if legal.iter().any(|l| l == candidate) {
        Ok(())
    } else {
        Err(ArenaError::IllegalAction {
            action: candidate.to_string(),
            reason: format!("not in legal actions: {}", legal.join(", ")),
        })
    }
}

pub fn recover(raw: &str, legal: &[String]) -> Option<String> {
    let text = raw.to_lowercase();

    if let Some(exact) = legal.iter().find(|m| text.contains(&m.to_lowercase())) {
        return Some(exact.clone());
    }

    legal
        .iter()
        .find(|m| {
            let lower = m.to_lowercase();
            let core = lower.trim_end_matches(['+', '#']);
            let chars: Vec<char> = core.chars().collect();
            if chars.len() < 2 {
                return false;
            }
            let destination: String = chars[chars.len() - 2..].iter().collect();
            let piece_destination = format!("{}{}", chars[0], destination);
            text.contains(&destination) || text.contains(&piece_destination)
        })
        .cloned()
}
