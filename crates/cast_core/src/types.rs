//! Type definitions for `cast_core`.
//!
//! All public state, content and event types used by the simulation.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::cooling::CoolingController;
use crate::strand::Strand;
use crate::torch::Torch;
use crate::tundish::Tundish;
use crate::turret::Turret;
use crate::vessel::SteelVessel;
use crate::CastError;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(SequenceId);
string_id!(ProductId);
string_id!(GradeId);
string_id!(EventId);

/// Heat ids are integers, monotonically increasing within a sequence
/// (derived from minutes since 2025-01-01 at sequence build time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HeatId(pub u64);

impl std::fmt::Display for HeatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

/// Which material vessel an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VesselId {
    Ladle,
    Tundish,
    Mold,
}

impl std::fmt::Display for VesselId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VesselId::Ladle => "ladle",
            VesselId::Tundish => "tundish",
            VesselId::Mold => "mold",
        };
        f.write_str(name)
    }
}

/// Heat lifecycle. The variant order is the legal transition order; the
/// tracking driver asserts strict forward movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HeatStatus {
    New,
    Next,
    Pouring,
    Closed,
    Casting,
    Cutting,
    Cast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Normal,
    /// Also emits per-fragment pour events.
    Debug,
}

// ---------------------------------------------------------------------------
// Material types
// ---------------------------------------------------------------------------

/// The unit of steel circulating through vessels. Fragments of the same
/// heat inside one vessel are coalesced by summing weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatFragment {
    pub heat_id: HeatId,
    pub weight_kg: f64,
    pub grade_id: GradeId,
    pub liquidus_c: f64,
    pub target_superheat_c: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heat {
    pub id: HeatId,
    pub name: String,
    pub net_weight_kg: f64,
    pub grade_id: GradeId,
    pub status: HeatStatus,
    /// Tick at which the ladle started pouring this heat.
    pub open_tick: Option<u64>,
    /// Tick at which the ladle ran empty.
    pub close_tick: Option<u64>,
    /// Tick at which the heat entered the strand (left the tundish).
    pub cast_start_tick: Option<u64>,
    /// Meters already cast when this heat entered the strand. Set exactly
    /// once, on the `Casting` transition.
    pub cast_length_at_start_m: Option<f64>,
    /// Cumulative meters credited to this heat while casting.
    pub heat_boundary_m: f64,
}

impl Heat {
    pub fn new(id: HeatId, name: String, net_weight_kg: f64, grade_id: GradeId) -> Self {
        Heat {
            id,
            name,
            net_weight_kg,
            grade_id,
            status: HeatStatus::New,
            open_tick: None,
            close_tick: None,
            cast_start_tick: None,
            cast_length_at_start_m: None,
            heat_boundary_m: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductKind {
    #[default]
    Slab,
}

/// A scheduled (or finished) cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub sequence_id: SequenceId,
    pub cut_number: u32,
    pub product_id: ProductId,
    #[serde(default)]
    pub kind: ProductKind,
    /// False for synthetic products invented by the cut optimizer.
    pub planned: bool,
    pub length_aim_m: f64,
    pub length_min_m: f64,
    pub length_max_m: f64,
    /// Measured length once the torch has cut it; 0 until then.
    pub cut_length_m: f64,
    pub width_m: f64,
    pub thickness_m: f64,
    pub weight_kg: f64,
    /// Meters of strand already cast when this product was armed.
    pub cast_length_start_m: f64,
}

impl Product {
    /// Length targets must satisfy `0 < min <= aim <= max`.
    pub fn validate(&self) -> Result<(), CastError> {
        let (min, aim, max) = (self.length_min_m, self.length_aim_m, self.length_max_m);
        if min <= 0.0 || min > aim || aim > max {
            return Err(CastError::InvalidConfig(format!(
                "product {} length targets out of order: min={min} aim={aim} max={max}",
                self.product_id
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Observable product queue
// ---------------------------------------------------------------------------

/// FIFO of scheduled products with a version counter bumped once per
/// mutation. Observers poll the version instead of registering callbacks,
/// so teardown cannot leak subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductQueue {
    items: VecDeque<Product>,
    version: u64,
}

impl ProductQueue {
    pub fn new(items: Vec<Product>) -> Self {
        ProductQueue {
            items: items.into(),
            version: 0,
        }
    }

    pub fn pop_front(&mut self) -> Option<Product> {
        let popped = self.items.pop_front();
        if popped.is_some() {
            self.version += 1;
        }
        popped
    }

    /// Atomically replace the queue contents (one version bump).
    pub fn replace(&mut self, items: Vec<Product>) {
        self.items = items.into();
        self.version += 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.items.iter()
    }

    pub fn snapshot(&self) -> Vec<Product> {
        self.items.iter().cloned().collect()
    }

    pub fn front(&self) -> Option<&Product> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

/// One casting campaign: the heats to melt through and the cut schedule.
/// Created once at start-up; heats are append-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    pub id: SequenceId,
    pub width_m: f64,
    pub thickness_m: f64,
    pub density_kg_m3: f64,
    pub heats: BTreeMap<HeatId, Heat>,
    pub schedule: ProductQueue,
}

impl Sequence {
    /// Strand cross section in m².
    pub fn cross_section_m2(&self) -> f64 {
        self.width_m * self.thickness_m
    }

    /// Lowest-id heat still in `New` status, if any.
    pub fn next_new_heat(&self) -> Option<HeatId> {
        self.heats
            .values()
            .find(|h| h.status == HeatStatus::New)
            .map(|h| h.id)
    }
}

// ---------------------------------------------------------------------------
// Content: grade catalog and configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChemistryElement {
    pub element: String,
    pub percentage: f64,
}

/// Read-only catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteelGrade {
    pub id: GradeId,
    pub group: String,
    pub liquidus_c: f64,
    pub target_superheat_c: f64,
    pub description: String,
    pub chemistry: Vec<ChemistryElement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GradeCatalog {
    pub grades: Vec<SteelGrade>,
    #[serde(skip)]
    index: ahash::AHashMap<GradeId, usize>,
}

impl GradeCatalog {
    pub fn new(grades: Vec<SteelGrade>) -> Self {
        let mut catalog = GradeCatalog {
            grades,
            index: ahash::AHashMap::new(),
        };
        catalog.init_caches();
        catalog
    }

    /// Rebuild the lookup index. Call after deserialization.
    pub fn init_caches(&mut self) {
        self.index = self
            .grades
            .iter()
            .enumerate()
            .map(|(i, g)| (g.id.clone(), i))
            .collect();
    }

    pub fn get(&self, id: &GradeId) -> Option<&SteelGrade> {
        self.index.get(id).map(|&i| &self.grades[i])
    }

    pub fn pick_random(&self, rng: &mut impl rand::Rng) -> Option<&SteelGrade> {
        if self.grades.is_empty() {
            return None;
        }
        Some(&self.grades[rng.gen_range(0..self.grades.len())])
    }

    pub fn is_empty(&self) -> bool {
        self.grades.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NozzleDef {
    pub kind: String,
    pub position_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoolingSectionDef {
    pub id: u32,
    pub position_factor: f64,
    pub start_position_m: f64,
    pub end_position_m: f64,
    #[serde(default)]
    pub nozzles: Vec<NozzleDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoolingConfig {
    pub base_flow_lps: f64,
    pub flow_per_speed_lps: f64,
    pub sections: Vec<CoolingSectionDef>,
}

impl Default for CoolingConfig {
    fn default() -> Self {
        CoolingConfig {
            base_flow_lps: 2.0,
            flow_per_speed_lps: 1.5,
            sections: Vec::new(),
        }
    }
}

/// Engine configuration, threaded explicitly through constructors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reserved for future use.
    pub tundish_weight_fluctuation_tolerance: f64,
    /// Reserved for future use.
    pub tundish_weight_correction_factor: f64,
    /// The ladle holds its pour while the tundish is at or above this.
    pub max_tundish_weight_kg: f64,
    /// The strand does not start until the tundish holds at least this.
    pub ramp_up_threshold_kg: f64,
    /// Legacy pour-phase rate; recognized but not referenced by the
    /// current flow-control path.
    pub low_pouring_rate_kg_s: f64,
    /// Legacy pour-phase rate; recognized but not referenced.
    pub high_pouring_rate_kg_s: f64,
    /// Legacy pour-phase rate; recognized but not referenced.
    pub steady_state_rate_kg_s: f64,
    pub torch_location_m: f64,
    pub steel_density_kg_m3: f64,
    pub target_cast_speed_m_min: f64,
    pub speed_ramp_duration_s: u32,
    pub turret_rotation_duration_s: u32,
    pub tundish_level_target_mm: f64,
    pub tundish_level_tolerance_pct: f64,
    pub mold_level_target_mm: f64,
    pub mold_level_tolerance_pct: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tundish_weight_fluctuation_tolerance: 0.05,
            tundish_weight_correction_factor: 1.0,
            max_tundish_weight_kg: 30_000.0,
            ramp_up_threshold_kg: 5_000.0,
            low_pouring_rate_kg_s: 30.0,
            high_pouring_rate_kg_s: 150.0,
            steady_state_rate_kg_s: 75.0,
            torch_location_m: 12.0,
            steel_density_kg_m3: 7850.0,
            target_cast_speed_m_min: 3.0,
            speed_ramp_duration_s: 60,
            turret_rotation_duration_s: 45,
            tundish_level_target_mm: 453.0,
            tundish_level_tolerance_pct: 10.0,
            mold_level_target_mm: 825.0,
            mold_level_tolerance_pct: 5.0,
        }
    }
}

/// Immutable shared content: configuration plus the grade catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastContent {
    pub config: EngineConfig,
    pub cooling: CoolingConfig,
    pub catalog: GradeCatalog,
}

impl CastContent {
    /// Rebuild derived lookup caches. Call after deserialization.
    pub fn init_caches(&mut self) {
        self.catalog.init_caches();
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    pub tick: u64,
    pub seed: u64,
    pub schema_version: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
}

/// Latches for the stepper loops the orchestrator drives each tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoopState {
    /// Tundish-level loop adjusting the ladle flow. Latched on the
    /// tundish weight threshold.
    pub ladle_loop: bool,
    /// Mold-level loop adjusting the tundish flow. Latched on the mold
    /// weight threshold.
    pub mold_loop: bool,
    /// The tundish pours continuously once its threshold has latched.
    pub tundish_pouring: bool,
    /// Mold threshold seen; the strand starts once the ramp-up gate also
    /// holds.
    pub mold_ready: bool,
    /// The remaining schedule has been reshaped against the residual
    /// strand; one-shot per sequence.
    pub schedule_optimized: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastState {
    pub meta: MetaState,
    pub sequence: Sequence,
    pub turret: Turret,
    pub tundish: Tundish,
    pub mold: SteelVessel,
    pub strand: Strand,
    pub torch: Torch,
    pub cooling: CoolingController,
    pub loops: LoopState,
    /// Finished cuts, in cut order.
    pub cut_products: Vec<Product>,
    pub casting_finished: bool,
    pub counters: Counters,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub tick: u64,
    pub event: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    LadleLoaded {
        arm: u8,
        heat_id: HeatId,
    },
    TurretRotated {
        cast_arm: u8,
        heat_id: Option<HeatId>,
    },
    SteelAdded {
        vessel: VesselId,
        heat_id: HeatId,
    },
    WeightThresholdReached {
        vessel: VesselId,
        level_mm: f64,
    },
    /// First fragment of a new heat is leaving the vessel.
    HeatOut {
        vessel: VesselId,
        heat_id: HeatId,
    },
    /// Only emitted at `EventLevel::Debug`.
    SteelPoured {
        vessel: VesselId,
        fragment: HeatFragment,
    },
    VesselEmptied {
        vessel: VesselId,
        heat_id: HeatId,
    },
    HeatStatusChanged {
        heat_id: HeatId,
        status: HeatStatus,
    },
    StrandAdvanced {
        increment_m: f64,
        head_m: f64,
        tail_m: f64,
        cast_speed_m_min: f64,
    },
    CutDone {
        product: Box<Product>,
    },
    ScheduleOptimized {
        residual_m: f64,
        queued: usize,
    },
    CastingFinished {
        total_cast_length_m: f64,
    },
}
