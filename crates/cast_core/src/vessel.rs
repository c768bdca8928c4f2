//! Base material vessel shared by ladle, tundish and mold.
//!
//! A vessel holds an ordered FIFO of heat fragments. Steel leaves strictly
//! in arrival order; fragments of the same heat are coalesced on entry.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{CastError, HeatFragment, HeatId, VesselId};

pub const DEFAULT_STEEL_DENSITY_KG_M3: f64 = 7850.0;

/// Vessel geometry and flow limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VesselSpec {
    pub width_m: f64,
    pub depth_m: f64,
    pub height_m: f64,
    pub max_level_m: f64,
    pub threshold_mm: f64,
    pub initial_flow_kg_s: f64,
    pub max_flow_kg_s: f64,
    pub density_kg_m3: f64,
}

/// What `add_steel` did, for the orchestrator to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    /// The fragment merged into an existing fragment of the same heat.
    pub coalesced: bool,
    /// The one-shot weight threshold latched on this insert.
    pub threshold_crossed: bool,
}

/// Material movement produced by one `pour` call.
#[derive(Debug, Clone, Default)]
pub struct PourOutcome {
    /// Heat at the head of the queue when the pour began.
    pub heat_out: Option<HeatId>,
    /// Fragment slices that left the vessel, in FIFO order.
    pub poured: Vec<HeatFragment>,
    /// Set when the pour drained the vessel; carries the last heat out.
    pub emptied: Option<HeatId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteelVessel {
    pub id: VesselId,
    pub spec: VesselSpec,
    fragments: SmallVec<[HeatFragment; 2]>,
    pub flow_rate_kg_s: f64,
    pub mixed_steel_kg: f64,
    threshold_latched: bool,
}

impl SteelVessel {
    pub fn new(id: VesselId, spec: VesselSpec) -> Self {
        SteelVessel {
            id,
            spec,
            fragments: SmallVec::new(),
            flow_rate_kg_s: 0.0,
            mixed_steel_kg: 0.0,
            threshold_latched: false,
        }
    }

    pub fn net_weight_kg(&self) -> f64 {
        self.fragments.iter().map(|f| f.weight_kg).sum()
    }

    /// Bath level in millimeters for the vessel's footprint.
    pub fn level_mm(&self) -> f64 {
        let volume_m3 = self.net_weight_kg() / self.spec.density_kg_m3;
        volume_m3 / (self.spec.width_m * self.spec.depth_m) * 1000.0
    }

    pub fn mixed_steel_percent(&self) -> f64 {
        let net = self.net_weight_kg();
        if net > 0.0 {
            self.mixed_steel_kg / net * 100.0
        } else {
            0.0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragments(&self) -> &[HeatFragment] {
        &self.fragments
    }

    pub fn threshold_latched(&self) -> bool {
        self.threshold_latched
    }

    /// Add steel to the vessel.
    ///
    /// A fragment of a heat already present merges into it in place;
    /// otherwise a copy is enqueued. When a new heat enters a non-empty
    /// vessel, half of the current content is declared mixed before the
    /// enqueue. The weight threshold latches at most once per vessel
    /// lifetime.
    pub fn add_steel(&mut self, fragment: &HeatFragment) -> Result<AddOutcome, CastError> {
        if !fragment.weight_kg.is_finite() || fragment.weight_kg <= 0.0 {
            return Err(CastError::InvalidInput(format!(
                "fragment of heat {} has non-positive weight {}",
                fragment.heat_id, fragment.weight_kg
            )));
        }

        let coalesced = if let Some(existing) = self
            .fragments
            .iter_mut()
            .find(|f| f.heat_id == fragment.heat_id)
        {
            existing.weight_kg += fragment.weight_kg;
            true
        } else {
            if !self.fragments.is_empty() {
                self.mixed_steel_kg = self.net_weight_kg() * 0.5;
            }
            self.fragments.push(fragment.clone());
            false
        };

        let threshold_crossed =
            !self.threshold_latched && self.level_mm() >= self.spec.threshold_mm;
        if threshold_crossed {
            self.threshold_latched = true;
        }

        Ok(AddOutcome {
            coalesced,
            threshold_crossed,
        })
    }

    /// Store a new flow rate. No-op while the vessel is empty.
    pub fn set_flow_rate(&mut self, rate_kg_s: f64) {
        if self.fragments.is_empty() {
            return;
        }
        self.flow_rate_kg_s = rate_kg_s;
    }

    /// Remove up to `weight_kg` of steel from the head of the queue.
    ///
    /// The requested weight becomes the vessel's flow rate. Mixed steel is
    /// reduced by the removed weight, clamped at zero. Draining the vessel
    /// zeroes the flow.
    pub fn pour(&mut self, weight_kg: f64) -> PourOutcome {
        if self.fragments.is_empty() {
            self.flow_rate_kg_s = 0.0;
            return PourOutcome::default();
        }
        self.flow_rate_kg_s = weight_kg;

        let initial_net = self.net_weight_kg();
        let mut remaining = weight_kg;
        let mut outcome = PourOutcome::default();

        while remaining > 0.0 && !self.fragments.is_empty() {
            if outcome.heat_out.is_none() {
                outcome.heat_out = Some(self.fragments[0].heat_id);
            }
            if self.fragments[0].weight_kg <= remaining {
                let fragment = self.fragments.remove(0);
                remaining -= fragment.weight_kg;
                outcome.poured.push(fragment);
            } else {
                let head = &mut self.fragments[0];
                head.weight_kg -= remaining;
                let mut slice = head.clone();
                slice.weight_kg = remaining;
                outcome.poured.push(slice);
                remaining = 0.0;
            }
        }

        let removed = initial_net - self.net_weight_kg();
        self.mixed_steel_kg = (self.mixed_steel_kg - removed).max(0.0);

        if self.fragments.is_empty() {
            self.flow_rate_kg_s = 0.0;
            outcome.emptied = outcome.poured.last().map(|f| f.heat_id);
        }
        outcome
    }
}
