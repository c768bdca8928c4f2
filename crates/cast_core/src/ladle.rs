//! Transport ladle: one heat per ladle, mounted on a turret arm.
//!
//! The commanded flow is perturbed by turbulence, occasional
//! overcorrection spikes and nozzle clogs before it reaches the vessel.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::vessel::{SteelVessel, VesselSpec, DEFAULT_STEEL_DENSITY_KG_M3};
use crate::{CastError, HeatFragment, HeatId, VesselId};

/// Perturbed flow never drops below this.
pub const MIN_LADLE_FLOW_KG_S: f64 = 10.0;

/// A ladle lighter than this cannot be mounted on the turret.
pub const MIN_LADLE_WEIGHT_KG: f64 = 20_000.0;

const CLOG_PROBABILITY: f64 = 0.02;
const SPIKE_PROBABILITY: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LadleState {
    /// Filled and waiting; the slide gate is shut.
    New,
    /// Slide gate open, pouring into the tundish.
    Open,
    /// Drained.
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ladle {
    pub heat_id: HeatId,
    pub state: LadleState,
    pub vessel: SteelVessel,
    /// Remaining perturbed calls of an active nozzle clog.
    clog_calls_left: u8,
}

fn ladle_spec() -> VesselSpec {
    VesselSpec {
        width_m: 2.8,
        depth_m: 2.8,
        height_m: 3.6,
        max_level_m: 3.2,
        // Never reached; ladles do not participate in level control.
        threshold_mm: 3_000.0,
        initial_flow_kg_s: 30.0,
        max_flow_kg_s: 150.0,
        density_kg_m3: DEFAULT_STEEL_DENSITY_KG_M3,
    }
}

impl Ladle {
    /// Build a ladle holding a single heat fragment.
    pub fn new(heat_id: HeatId, fragment: HeatFragment) -> Result<Self, CastError> {
        let mut vessel = SteelVessel::new(VesselId::Ladle, ladle_spec());
        vessel.add_steel(&fragment)?;
        Ok(Ladle {
            heat_id,
            state: LadleState::New,
            vessel,
            clog_calls_left: 0,
        })
    }

    /// Apply the stochastic pour perturbations to the commanded flow and
    /// store the result on the vessel.
    pub fn set_flow_rate(&mut self, commanded_kg_s: f64, rng: &mut impl Rng) {
        // Turbulence on every call.
        let mut flow = commanded_kg_s * (1.0 + rng.gen_range(-0.05..0.05));

        // Occasional operator overcorrection spike.
        if rng.gen_bool(SPIKE_PROBABILITY) {
            flow *= 1.0 + rng.gen_range(-0.15..0.15);
        }

        // Nozzle clogs persist over several calls.
        if self.clog_calls_left == 0 && rng.gen_bool(CLOG_PROBABILITY) {
            self.clog_calls_left = rng.gen_range(3..=6);
        }
        if self.clog_calls_left > 0 {
            flow *= rng.gen_range(0.3..0.8);
            self.clog_calls_left -= 1;
        }

        self.vessel.set_flow_rate(flow.max(MIN_LADLE_FLOW_KG_S));
    }

    pub fn is_clogged(&self) -> bool {
        self.clog_calls_left > 0
    }
}
