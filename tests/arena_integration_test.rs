//! 竞技场集成测试：通过 Arena 控制面驱动完整对局

use std::sync::Arc;
use std::time::Duration;

use arena::config::{ArenaConfig, PacingPolicy};
use arena::core::{AgentSeat, Arena, ArenaEvent, ChannelBroadcaster, SessionStatus};
use arena::engine::{engine_factory, EngineFactory, GameOutcome, ScriptedEngine, Side};
use arena::llm::{MockLlmClient, ProviderKind};
use tokio::sync::broadcast::{self, error::RecvError};

fn quick_config() -> ArenaConfig {
    ArenaConfig {
        pacing: PacingPolicy {
            move_delay_ms: 5,
            invalid_retry_delay_ms: 1,
            error_backoff_ms: 10,
            resume_delay_ms: 5,
            max_invalid_before_forced: 3,
        },
        ..ArenaConfig::default()
    }
}

fn uniform(legal: &'static [&'static str], plies: usize) -> EngineFactory {
    engine_factory(move || ScriptedEngine::uniform(legal, plies, GameOutcome::Draw))
}

fn seat(client: Arc<MockLlmClient>) -> AgentSeat {
    AgentSeat {
        model_id: "mock-first-legal".to_string(),
        provider: ProviderKind::Mock,
        name: None,
        client,
    }
}

fn setup(factory: EngineFactory, config: ArenaConfig) -> (Arena, broadcast::Receiver<ArenaEvent>) {
    let bus = ChannelBroadcaster::new(1024);
    let rx = bus.subscribe();
    (Arena::new(config, factory, Arc::new(bus)), rx)
}

/// 收集事件直到 pred 为真（含该事件）
async fn collect_until(
    rx: &mut broadcast::Receiver<ArenaEvent>,
    pred: impl Fn(&ArenaEvent) -> bool,
) -> Vec<ArenaEvent> {
    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let done = pred(&event);
                    out.push(event);
                    if done {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
    .await
    .expect("timed out waiting for events");
    out
}

fn drain(rx: &mut broadcast::Receiver<ArenaEvent>) -> Vec<ArenaEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

fn count(events: &[ArenaEvent], kind: &str) -> usize {
    events.iter().filter(|e| e.kind() == kind).count()
}

#[tokio::test]
async fn test_directive_in_prose_is_played() {
    let white = Arc::new(MockLlmClient::scripted(vec![Ok(
        "I'll play MOVE: Nf3 for a solid setup".to_string(),
    )]));
    let (arena, mut rx) = setup(uniform(&["e4", "Nf3", "d4"], 2), quick_config());
    let id = arena
        .create_session_with_seats(seat(white), seat(Arc::new(MockLlmClient::new())))
        .await;
    arena.advance(&id).await.unwrap();

    let events = collect_until(&mut rx, |e| e.kind() == "session_finished").await;
    assert_eq!(count(&events, "decision_invalid"), 0);

    let snap = arena.snapshot(&id).await.unwrap();
    assert_eq!(snap.history[0].action, "Nf3");
    assert_eq!(snap.history[0].side, Side::A);
    assert_eq!(snap.history[1].action, "e4");
    assert_eq!(
        snap.status,
        SessionStatus::Finished {
            outcome: GameOutcome::Draw
        }
    );
}

#[tokio::test]
async fn test_illegal_directive_forces_after_three_attempts() {
    let reply = || Ok("I'll play MOVE: Nf3 for a solid setup".to_string());
    let white = Arc::new(MockLlmClient::scripted(vec![reply(), reply(), reply()]));
    let legal: &'static [&'static str] = &["e4", "d4", "c4"];
    let (arena, mut rx) = setup(uniform(legal, 3), quick_config());
    let id = arena
        .create_session_with_seats(seat(white.clone()), seat(Arc::new(MockLlmClient::new())))
        .await;
    arena.advance(&id).await.unwrap();

    let events = collect_until(&mut rx, |e| e.kind() == "session_finished").await;
    assert_eq!(count(&events, "decision_invalid"), 3);
    assert_eq!(count(&events, "decision_forced"), 1);

    // 强制走法之前不再请求白方
    let forced_at = events
        .iter()
        .position(|e| e.kind() == "decision_forced")
        .unwrap();
    assert_eq!(count(&events[..forced_at], "decision_requested"), 3);

    let snap = arena.snapshot(&id).await.unwrap();
    assert!(snap.history[0].forced);
    assert!(legal.contains(&snap.history[0].action.as_str()));
    assert_eq!(snap.white.invalid_move_count, 3);
    assert_eq!(snap.white.forced_count, 1);
    // 第三步由白方自己走出，连续计数清零
    assert_eq!(snap.white.consecutive_invalid, 0);
    assert_eq!(white.calls(), 4);
}

#[tokio::test]
async fn test_stop_freezes_scheduling() {
    let slow = || Arc::new(MockLlmClient::new().with_delay(Duration::from_millis(10)));
    let (arena, mut rx) = setup(uniform(&["e4", "d4"], 200), quick_config());
    let id = arena.create_session_with_seats(seat(slow()), seat(slow())).await;
    arena.advance(&id).await.unwrap();

    collect_until(&mut rx, |e| e.kind() == "decision_applied").await;
    let receipt = arena.stop(&id).await.unwrap();
    assert_eq!(arena.stop(&id).await.unwrap_err().code(), "already_stopped");
    assert_eq!(arena.advance(&id).await.unwrap_err().code(), "already_stopped");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let events = drain(&mut rx);
    let stopped_at = events
        .iter()
        .position(|e| e.kind() == "session_stopped")
        .unwrap();
    assert_eq!(count(&events[stopped_at..], "decision_requested"), 0);
    assert_eq!(count(&events[stopped_at..], "decision_applied"), 0);

    let snap = arena.snapshot(&id).await.unwrap();
    assert_eq!(snap.status, SessionStatus::Stopped);
    assert_eq!(snap.history.len(), receipt.total_moves);
}

#[tokio::test]
async fn test_pause_then_resume_continues_play() {
    let slow = || Arc::new(MockLlmClient::new().with_delay(Duration::from_millis(5)));
    let (arena, mut rx) = setup(uniform(&["e4", "d4"], 200), quick_config());
    let id = arena.create_session_with_seats(seat(slow()), seat(slow())).await;
    arena.advance(&id).await.unwrap();

    collect_until(&mut rx, |e| e.kind() == "decision_applied").await;
    arena.pause(&id).await.unwrap();
    assert_eq!(arena.pause(&id).await.unwrap_err().code(), "already_paused");
    let moves_at_pause = arena.snapshot(&id).await.unwrap().history.len();

    tokio::time::sleep(Duration::from_millis(60)).await;
    let snap = arena.snapshot(&id).await.unwrap();
    assert_eq!(snap.status, SessionStatus::Paused);
    assert_eq!(snap.history.len(), moves_at_pause);
    assert!(snap.paused_at.is_some());

    let receipt = arena.resume(&id).await.unwrap();
    assert!(receipt.total_paused_ms >= 60);

    let events = collect_until(&mut rx, |e| e.kind() == "session_resumed").await;
    let paused_at = events
        .iter()
        .position(|e| e.kind() == "session_paused")
        .unwrap();
    assert_eq!(count(&events[paused_at..], "decision_requested"), 0);

    collect_until(&mut rx, |e| e.kind() == "decision_applied").await;
    assert!(arena.snapshot(&id).await.unwrap().history.len() > moves_at_pause);
    arena.stop(&id).await.unwrap();
}

#[tokio::test]
async fn test_advance_is_idempotent() {
    let white = Arc::new(MockLlmClient::new().with_delay(Duration::from_millis(5)));
    let black = Arc::new(MockLlmClient::new().with_delay(Duration::from_millis(5)));
    let (arena, mut rx) = setup(uniform(&["e4", "d4"], 6), quick_config());
    let id = arena
        .create_session_with_seats(seat(white.clone()), seat(black.clone()))
        .await;
    for _ in 0..3 {
        arena.advance(&id).await.unwrap();
    }

    let events = collect_until(&mut rx, |e| e.kind() == "session_finished").await;
    assert_eq!(count(&events, "decision_requested"), 6);
    assert_eq!(white.calls() + black.calls(), 6);
    assert_eq!(arena.advance(&id).await.unwrap_err().code(), "game_over");
}

#[tokio::test]
async fn test_reset_replays_from_cache() {
    let (arena, mut rx) = setup(uniform(&["e4", "d4"], 4), quick_config());
    let white = Arc::new(MockLlmClient::new());
    let black = Arc::new(MockLlmClient::new());
    let id = arena
        .create_session_with_seats(seat(white.clone()), seat(black.clone()))
        .await;
    arena.advance(&id).await.unwrap();
    collect_until(&mut rx, |e| e.kind() == "session_finished").await;

    arena.reset(&id).await.unwrap();
    collect_until(&mut rx, |e| e.kind() == "session_reset").await;
    let snap = arena.snapshot(&id).await.unwrap();
    assert_eq!(snap.status, SessionStatus::Active);
    assert!(snap.history.is_empty());
    assert_eq!(snap.white.decision_count, 0);

    // 同一局面、同一模型、同一合法集合：全部命中缓存
    arena.advance(&id).await.unwrap();
    collect_until(&mut rx, |e| e.kind() == "session_finished").await;
    assert_eq!(white.calls() + black.calls(), 4);

    let snap = arena.snapshot(&id).await.unwrap();
    assert_eq!(snap.white.cached_count + snap.black.cached_count, 4);
    let stats = arena.cache_stats().await;
    assert_eq!(stats.hits, 4);
    assert_eq!(stats.size, 4);
}
