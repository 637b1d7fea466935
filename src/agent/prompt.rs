//! 提示词构建
//!
//! 快速模式：紧凑的一屏提示；详细模式：附带最近走法与分析要求。
//! 上一次被拒绝的走法会写进提示，要求智能体换一个。

use crate::llm::{Prompt, ProviderKind};
use crate::moves::DIRECTIVE_LABEL;

use super::SessionView;

/// 提示词相关选项（来自 [agents] 配置段）
#[derive(Debug, Clone)]
pub struct PromptOptions {
    pub fast_mode: bool,
    pub include_analysis: bool,
    /// None 时快速模式 150、详细模式 800
    pub max_tokens: Option<u32>,
    /// None 时快速模式 0.1、详细模式 0.3
    pub temperature: Option<f32>,
    /// 详细模式展示的最近走法数（半回合）
    pub history_window: usize,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            fast_mode: true,
            include_analysis: false,
            max_tokens: None,
            temperature: None,
            history_window: 6,
        }
    }
}

impl PromptOptions {
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
            .unwrap_or(if self.fast_mode { 150 } else { 800 })
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
            .unwrap_or(if self.fast_mode { 0.1 } else { 0.3 })
    }
}

pub fn build_prompt(provider: ProviderKind, view: &SessionView, options: &PromptOptions) -> Prompt {
    let user = if options.fast_mode {
        fast_prompt(view, options)
    } else {
        detailed_prompt(view, options)
    };
    Prompt {
        system: provider.system_prompt(options.fast_mode).to_string(),
        user,
        max_tokens: options.max_tokens(),
        temperature: options.temperature(),
    }
}

fn fast_prompt(view: &SessionView, options: &PromptOptions) -> String {
    let color = view.side_to_move.color();
    let mut prompt = format!("Chess {color}. Turn: {color}. FEN: {}\n", view.fingerprint);
    if view.in_check {
        prompt.push_str("⚠️ CHECK! Must escape.\n");
    }
    if let Some(rejected) = &view.rejected_action {
        prompt.push_str(&format!("❌ Last \"{rejected}\" invalid. Pick different.\n"));
    }
    prompt.push_str(&format!("Legal moves: {}\n\n", view.legal_actions.join(", ")));
    if options.include_analysis {
        prompt.push_str("Brief analysis then move:\nANALYSIS: [Quick tactical check]\n");
    }
    prompt.push_str(&format!("{DIRECTIVE_LABEL}: [Pick ONE from legal moves]"));
    prompt
}

fn detailed_prompt(view: &SessionView, options: &PromptOptions) -> String {
    let color = view.side_to_move.color();
    let mut prompt = format!("You are playing chess as {color}. Turn: {color}\n");
    prompt.push_str(&format!("Position: {}\n", view.fingerprint));
    if view.in_check {
        prompt.push_str("⚠️ King in CHECK! Must escape check.\n");
    }
    prompt.push_str(&format!("Legal moves: {}\n\n", view.legal_actions.join(", ")));
    if let Some(rejected) = &view.rejected_action {
        prompt.push_str(&format!(
            "Previous move \"{rejected}\" was invalid. Choose different move.\n\n"
        ));
    }

    let recent = recent_window(&view.recent_actions, options.history_window);
    if !recent.is_empty() {
        prompt.push_str(&format!(
            "Recent: {}\n\n",
            render_move_pairs(recent, view.ply_count)
        ));
    }

    if options.include_analysis {
        prompt.push_str("Consider: threats, tactics, king safety, material.\n");
        prompt.push_str("ANALYSIS: [Your analysis]\n");
    }
    prompt.push_str(&format!("{DIRECTIVE_LABEL}: [ONE move from legal list in SAN]"));
    prompt
}

fn recent_window(actions: &[String], window: usize) -> &[String] {
    let start = actions.len().saturating_sub(window);
    &actions[start..]
}

/// 渲染为 `1.e4 e5 2.Nf3 ` 形式；ply_count 为整局已走步数，用于编号
fn render_move_pairs(recent: &[String], ply_count: usize) -> String {
    let offset = ply_count.saturating_sub(recent.len());
    let mut out = String::new();
    for (i, pair) in recent.chunks(2).enumerate() {
        let number = (offset + i * 2) / 2 + 1;
        out.push_str(&format!("{number}.{}", pair[0]));
        if let Some(reply) = pair.get(1) {
            out.push_str(&format!(" {reply}"));
        }
        out.push(' ');
    }
    out
}
