//! Arena - 双智能体对弈编排引擎
//!
//! 入口：初始化日志、加载配置，用脚本化开局让两个智能体对弈，逐行输出事件（JSON）。
//! 模型由 `ARENA_WHITE_MODEL` / `ARENA_BLACK_MODEL` 指定，默认均为 `mock-first-legal`；
//! 第一个命令行参数可指定额外的配置文件。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use arena::core::{AgentSpec, Arena, ChannelBroadcaster};
use arena::engine::{engine_factory, GameOutcome, ScriptedEngine, ScriptedPly};
use arena::{load_config, observability};
use tokio::sync::broadcast::error::RecvError;

/// 意大利开局的前几步
fn opening() -> ScriptedEngine {
    ScriptedEngine::new(
        vec![
            ScriptedPly::new(
                "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
                &["e4", "d4", "Nf3", "c4", "g3", "Nc3"],
            ),
            ScriptedPly::new(
                "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
                &["e5", "c5", "e6", "c6", "d5", "Nf6"],
            ),
            ScriptedPly::new(
                "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2",
                &["Nf3", "Nc3", "Bc4", "f4", "d4"],
            ),
            ScriptedPly::new(
                "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2",
                &["Nc6", "Nf6", "d6", "f5"],
            ),
            ScriptedPly::new(
                "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3",
                &["Bc4", "Bb5", "d4", "Nc3"],
            ),
            ScriptedPly::new(
                "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3",
                &["Bc5", "Nf6", "Be7", "d6"],
            ),
        ],
        GameOutcome::Other {
            reason: "opening_complete".to_string(),
        },
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;

    let bus = ChannelBroadcaster::default();
    let mut events = bus.subscribe();
    let factory = engine_factory(opening);
    let arena = Arena::new(config, factory, Arc::new(bus));

    let white = std::env::var("ARENA_WHITE_MODEL").unwrap_or_else(|_| "mock-first-legal".to_string());
    let black = std::env::var("ARENA_BLACK_MODEL").unwrap_or_else(|_| "mock-first-legal".to_string());
    let id = arena
        .create_session(AgentSpec::new(white), AgentSpec::new(black))
        .await
        .context("Failed to create session")?;
    arena.advance(&id).await.context("Failed to start session")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, stopping session");
                arena.stop(&id).await.context("Failed to stop session")?;
            }
            received = events.recv() => match received {
                Ok(event) => {
                    println!("{}", serde_json::to_string(&event)?);
                    if matches!(event.kind(), "session_finished" | "session_stopped") {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    }

    let snapshot = arena.snapshot(&id).await.context("Failed to read snapshot")?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    let stats = arena.cache_stats().await;
    tracing::info!(hits = stats.hits, misses = stats.misses, size = stats.size, "Cache stats");
    Ok(())
}
