//! `cast_core` — deterministic continuous-casting simulation tick.
//!
//! No IO, no wall clock. All randomness via the passed-in Rng.

mod caster;
mod cooling;
mod cut_plan;
mod error;
mod flow;
mod ladle;
pub mod metrics;
mod mold;
mod strand;
mod torch;
mod tracking;
mod tundish;
mod turret;
mod types;
mod vessel;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use caster::tick;
pub use cooling::{CoolingController, CoolingSection};
pub use cut_plan::{optimize_cut_queue, MIN_CUT_LENGTH_M};
pub use error::CastError;
pub use flow::compute_flow_rate;
pub use ladle::{Ladle, LadleState, MIN_LADLE_FLOW_KG_S, MIN_LADLE_WEIGHT_KG};
pub use metrics::{compute_overview, OverviewSnapshot};
pub use mold::{mold_vessel, MOLD_THRESHOLD_MM};
pub use strand::{SpeedRamp, Strand, StrandMode};
pub use torch::Torch;
pub use tundish::Tundish;
pub use turret::Turret;
pub use types::*;
pub use vessel::{AddOutcome, PourOutcome, SteelVessel, VesselSpec};

pub(crate) fn emit(counters: &mut Counters, tick: u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, tick, event }
}
