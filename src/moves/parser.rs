//! 走法解析：从智能体的自由文本回复中提取候选走法
//!
//! 优先级（顺序即行为，修改会改变歧义输出上的结果）：
//! 1. `MOVE: <走法>` 指令行，值通过格式校验即返回；
//! 2. 语法模式级联（棋子走法 → 兵走法 → 易位 → 坐标记法），去重保序，
//!    优先取最后一个非坐标记法的匹配，只有坐标记法时取最后一个；
//! 3. 宽松兜底扫描，取最后一个且需通过格式校验；
//! 4. 都失败则返回 Parse 错误，附带回复摘录。
//!
//! 这里只检查语法形状，合法性由 validator 与规则引擎负责。

use std::sync::OnceLock;

use regex::Regex;

use crate::core::ArenaError;

/// 指令行标签
pub const DIRECTIVE_LABEL: &str = "MOVE";

/// 解析失败时附带的回复摘录长度（字符）
const EXCERPT_CHARS: usize = 200;

static DIRECTIVE_RE: OnceLock<Regex> = OnceLock::new();
static CASCADE_RES: OnceLock<[Regex; 4]> = OnceLock::new();
static COORDINATE_RE: OnceLock<Regex> = OnceLock::new();
static LOOSE_RE: OnceLock<Regex> = OnceLock::new();
static FORMAT_RES: OnceLock<Vec<Regex>> = OnceLock::new();

fn directive_re() -> &'static Regex {
    DIRECTIVE_RE.get_or_init(|| Regex::new(&format!(r"(?i)^{DIRECTIVE_LABEL}\s*:")).unwrap())
}

fn cascade_res() -> &'static [Regex; 4] {
    CASCADE_RES.get_or_init(|| {
        [
            // 棋子走法：Nf3, Bb5, Qxd4+
            Regex::new(r"\b([NBRQK][a-h]?[1-8]?x?[a-h][1-8](?:=[NBRQ])?[+#]?)\b").unwrap(),
            // 兵走法：e4, exd5, e8=Q+
            Regex::new(r"\b([a-h](?:[a-h]?x)?[a-h]?[1-8](?:=[NBRQ])?[+#]?)\b").unwrap(),
            // 易位：O-O, O-O-O
            Regex::new(r"\b(O-O(?:-O)?[+#]?)\b").unwrap(),
            // 坐标记法兜底：e2e4, g1f3, e7e8q
            Regex::new(r"\b([a-h][1-8][a-h][1-8][nbrq]?)\b").unwrap(),
        ]
    })
}

fn coordinate_re() -> &'static Regex {
    COORDINATE_RE.get_or_init(|| Regex::new(r"^[a-h][1-8][a-h][1-8]").unwrap())
}

fn loose_re() -> &'static Regex {
    LOOSE_RE.get_or_init(|| Regex::new(r"(?i)\b[a-h][1-8]|[NBRQK][a-h][1-8]|O-O").unwrap())
}

fn format_res() -> &'static [Regex] {
    FORMAT_RES.get_or_init(|| {
        [
            r"^[a-h][1-8]$",
            r"^[a-h]x[a-h][1-8]$",
            r"^[a-h][1-8]=[NBRQ][+#]?$",
            r"^[a-h]x[a-h][1-8]=[NBRQ][+#]?$",
            r"^[NBRQK][a-h][1-8][+#]?$",
            r"^[NBRQK][a-h]?[1-8]?x[a-h][1-8][+#]?$",
            r"^[NBRQK][a-h][a-h][1-8][+#]?$",
            r"^[NBRQK][1-8][a-h][1-8][+#]?$",
            r"^O-O[+#]?$",
            r"^O-O-O[+#]?$",
            r"^[a-h][1-8][a-h][1-8][nbrq]?$",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

/// 语法形状校验（SAN 或坐标记法），不涉及局面
pub fn is_valid_format(action: &str) -> bool {
    let action = action.trim();
    !action.is_empty() && format_res().iter().any(|re| re.is_match(action))
}

/// 是否为坐标记法（e2e4）
pub fn is_coordinate_notation(action: &str) -> bool {
    coordinate_re().is_match(action)
}

/// 从回复中提取候选走法
pub fn parse_action(response: &str) -> Result<String, ArenaError> {
    let clean = response.replace(['\'', '"'], "");
    let clean = clean.trim();

    if let Some(action) = parse_directive(clean) {
        return Ok(action);
    }

    let mut found: Vec<String> = Vec::new();
    for re in cascade_res() {
        for caps in re.captures_iter(clean) {
            let candidate = &caps[1];
            if is_valid_format(candidate) && !found.iter().any(|f| f == candidate) {
                found.push(candidate.to_string());
            }
        }
    }

    let preferred = found
        .iter()
        .rev()
        .find(|m| !is_coordinate_notation(m))
        .or_else(|| found.last());
    if let Some(action) = preferred {
        return Ok(action.clone());
    }

    if let Some(last) = loose_re().find_iter(clean).last() {
        if is_valid_format(last.as_str()) {
            return Ok(last.as_str().to_string());
        }
    }

    Err(ArenaError::Parse {
        excerpt: response.chars().take(EXCERPT_CHARS).collect(),
    })
}

/// 扫描 `MOVE:` 指令行；值整体通过格式校验才采用，否则交给级联
fn parse_directive(clean: &str) -> Option<String> {
    clean.lines().find_map(|line| {
        let line = line.trim_start();
        let m = directive_re().find(line)?;
        let value = line[m.end()..].trim();
        is_valid_format(value).then(|| value.to_string())
    })
}
