//! Performance benchmarks for the game engine

use server::directory::{InMemoryRoomDirectory, RoomSettings};
use server::engine::GameEngine;
use server::store::InMemorySessionStore;
use server::words::InMemoryWordSource;
use shared::masked_word;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn engine() -> (Arc<GameEngine>, Arc<InMemoryRoomDirectory>) {
    let rooms = Arc::new(InMemoryRoomDirectory::new());
    let engine = Arc::new(GameEngine::new(
        Arc::new(InMemorySessionStore::new()),
        rooms.clone(),
        Arc::new(InMemoryWordSource::with_defaults()),
    ));
    (engine, rooms)
}

/// Benchmarks word masking
#[test]
fn benchmark_word_masking() {
    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = masked_word("hot air balloon");
    }

    let duration = start.elapsed();
    println!(
        "Word masking: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration < Duration::from_secs(1));
}

/// Plays many full games in parallel rooms
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn benchmark_parallel_rooms() {
    let (engine, rooms) = engine();
    let room_count = 200;
    let players_per_room = 4u32;
    let total_rounds = 2;

    let mut codes = Vec::new();
    for room in 0..room_count {
        let base = room * players_per_room + 1;
        let settings = RoomSettings {
            total_rounds,
            category_id: "animals".to_string(),
            drawing_time: Duration::from_secs(60),
        };
        let code = rooms.create_room(base, "host", settings);
        for player in base + 1..base + players_per_room {
            rooms.join_room(&code, player, "guest").unwrap();
        }
        rooms.begin_start(&code, base).unwrap();
        codes.push(code);
    }

    let start = Instant::now();
    let mut handles = Vec::new();
    for code in codes {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.start_game(&code).await.unwrap();
            let mut advances = 0;
            loop {
                let outcome = engine.handle_timer_end(&code).await.unwrap();
                advances += 1;
                if outcome.game_ended {
                    break;
                }
            }
            engine.delete_game(&code).await.unwrap();
            advances
        }));
    }

    for handle in handles {
        let advances = handle.await.unwrap();
        assert_eq!(advances, total_rounds * players_per_room);
    }

    let duration = start.elapsed();
    println!(
        "{} games of {} turns in {:?}",
        room_count,
        total_rounds * players_per_room,
        duration
    );
    assert!(engine.active_games().await.unwrap().is_empty());
    assert!(duration < Duration::from_secs(10));
}

/// Hammers one room with guesses to measure lock throughput
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn benchmark_single_room_guesses() {
    let (engine, rooms) = engine();
    let code = rooms.create_room(1, "host", RoomSettings::default());
    for player in 2..=12 {
        rooms.join_room(&code, player, "guest").unwrap();
    }
    rooms.begin_start(&code, 1).unwrap();
    engine.start_game(&code).await.unwrap();

    let iterations = 2_000;
    let start = Instant::now();
    let mut handles = Vec::new();
    for i in 0..iterations {
        let engine = Arc::clone(&engine);
        let code = code.clone();
        let player = 2 + (i % 11) as u32;
        handles.push(tokio::spawn(async move {
            engine
                .add_guessed_player(&code, player, "definitely not a word")
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        assert!(!handle.await.unwrap().is_correct);
    }

    let duration = start.elapsed();
    println!(
        "Guess grading: {} guesses in {:?} ({:.2} us/guess)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );
    assert!(duration < Duration::from_secs(5));
}
