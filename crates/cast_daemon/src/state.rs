use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use cast_core::{CastContent, CastState, EventEnvelope};
use parking_lot::Mutex;
use rand_chacha::ChaCha8Rng;
use tokio::sync::broadcast;

use crate::telemetry::{Publisher, TelemetryFrame};

/// Maximum number of telemetry frames kept in memory.
pub(crate) const MAX_TELEMETRY_HISTORY: usize = 10_000;

pub struct SimState {
    pub cast_state: CastState,
    pub content: CastContent,
    pub rng: ChaCha8Rng,
    pub publisher: Publisher,
}

pub type SharedSim = Arc<Mutex<SimState>>;
pub type EventTx = broadcast::Sender<Vec<EventEnvelope>>;
pub type TelemetryHistory = Arc<Mutex<VecDeque<TelemetryFrame>>>;

#[derive(Clone)]
pub struct AppState {
    pub sim: SharedSim,
    pub event_tx: EventTx,
    pub telemetry_history: TelemetryHistory,
    pub ticks_per_sec: f64,
    pub paused: Arc<AtomicBool>,
}
