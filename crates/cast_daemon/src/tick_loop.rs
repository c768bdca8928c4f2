use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cast_core::EventLevel;
use tokio::time::Instant;

use crate::state::{EventTx, SharedSim};

pub async fn run_tick_loop(
    sim: SharedSim,
    event_tx: EventTx,
    ticks_per_sec: f64,
    max_ticks: Option<u64>,
    paused: Arc<AtomicBool>,
) {
    let mut next_tick_at: Option<Instant> = None;

    loop {
        while paused.load(Ordering::Relaxed) {
            tokio::time::sleep(Duration::from_millis(50)).await;
            next_tick_at = None;
        }

        // --- Pacing ---
        if ticks_per_sec > 0.0 {
            let now = Instant::now();
            let target = next_tick_at.unwrap_or(now);
            if now < target {
                tokio::time::sleep(target - now).await;
            }
            next_tick_at = Some(
                next_tick_at
                    .unwrap_or(now)
                    .checked_add(Duration::from_secs_f64(1.0 / ticks_per_sec))
                    .unwrap_or(now),
            );
        } else {
            // Unlimited: still yield so HTTP handlers are serviced.
            tokio::task::yield_now().await;
        }

        // --- Execute one tick ---
        let (events, done) = {
            let mut guard = sim.lock();
            let crate::state::SimState {
                ref mut cast_state,
                ref content,
                ref mut rng,
                ref mut publisher,
            } = *guard;
            let events = cast_core::tick(cast_state, content, rng, EventLevel::Normal);
            publisher.publish_tick(cast_state);

            let finished = cast_state.casting_finished;
            let capped = max_ticks.is_some_and(|max| cast_state.meta.tick >= max);
            (events, finished || capped)
        };

        if !events.is_empty() {
            let _ = event_tx.send(events);
        }

        if done {
            tracing::info!("tick loop finished");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SimState;
    use crate::telemetry::Publisher;
    use cast_core::test_fixtures::{base_content, base_state};
    use cast_core::EventEnvelope;
    use parking_lot::Mutex;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use tokio::sync::broadcast;

    fn make_test_sim() -> (SharedSim, EventTx, Arc<AtomicBool>) {
        let content = base_content();
        let cast_state = base_state(&content);
        let (event_tx, _) = broadcast::channel::<Vec<EventEnvelope>>(256);
        let sim = Arc::new(Mutex::new(SimState {
            cast_state,
            content,
            rng: ChaCha8Rng::seed_from_u64(0),
            publisher: Publisher::new(),
        }));
        let paused = Arc::new(AtomicBool::new(false));
        (sim, event_tx, paused)
    }

    #[tokio::test]
    async fn tick_loop_advances_to_the_cap() {
        let (sim, event_tx, paused) = make_test_sim();
        run_tick_loop(sim.clone(), event_tx, 0.0, Some(5), paused).await;
        assert_eq!(sim.lock().cast_state.meta.tick, 5);
    }

    #[tokio::test]
    async fn tick_loop_broadcasts_events() {
        let (sim, event_tx, paused) = make_test_sim();
        let mut rx = event_tx.subscribe();
        // The first tick loads a ladle and requests the rotation, so at
        // least one batch carries events.
        run_tick_loop(sim, event_tx, 0.0, Some(3), paused).await;

        let mut received = 0;
        while let Ok(batch) = rx.try_recv() {
            received += batch.len();
        }
        assert!(received > 0, "expected at least one event");
    }

    #[tokio::test]
    async fn tick_loop_respects_pause() {
        let (sim, event_tx, paused) = make_test_sim();
        paused.store(true, Ordering::Relaxed);

        let sim_clone = sim.clone();
        let paused_clone = paused.clone();
        let handle = tokio::spawn(async move {
            run_tick_loop(sim_clone, event_tx, 0.0, Some(5), paused_clone).await;
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            sim.lock().cast_state.meta.tick,
            0,
            "tick must not advance while paused"
        );

        paused.store(false, Ordering::Relaxed);
        handle.await.unwrap();
        assert_eq!(sim.lock().cast_state.meta.tick, 5);
    }

    #[tokio::test]
    async fn tick_loop_stops_when_casting_finishes() {
        let (sim, event_tx, paused) = make_test_sim();
        run_tick_loop(sim.clone(), event_tx, 0.0, Some(50_000), paused).await;
        let guard = sim.lock();
        assert!(guard.cast_state.casting_finished);
        assert!(guard.cast_state.meta.tick < 50_000);
    }
}
