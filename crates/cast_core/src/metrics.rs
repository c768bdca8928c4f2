//! Overview metrics sampled from `CastState`.
//!
//! A single `compute_overview(&CastState) -> OverviewSnapshot` samples the
//! machine for telemetry and dashboards. No state mutation, no IO.

use serde::Serialize;

use crate::{CastState, GradeId, HeatId};

/// Current schema version — bump when fields are added/removed/reordered.
const OVERVIEW_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct OverviewSnapshot {
    pub tick: u64,
    pub overview_version: u32,

    // Ladle in cast position
    pub ladle_weight_kg: f64,
    pub ladle_flow_kg_s: f64,

    // Tundish
    pub tundish_weight_kg: f64,
    pub tundish_level_mm: f64,
    pub tundish_temperature_c: Option<f64>,
    pub tundish_superheat_c: Option<f64>,
    pub tundish_superheat_target_c: Option<f64>,
    pub tundish_flow_kg_s: f64,
    pub tundish_mixed_steel_pct: f64,
    pub tundish_mixed_steel: bool,
    pub stopper_rod_pct: f64,

    // Mold
    pub mold_level_mm: f64,
    pub mold_flow_kg_s: f64,

    // Strand & torch
    pub total_cast_length_m: f64,
    pub cast_speed_m_min: f64,
    pub head_position_m: f64,
    pub tail_position_m: f64,
    pub measured_cut_length_m: f64,
    pub next_cut_id: Option<String>,
    pub next_cut_length_aim_m: Option<f64>,

    // Heat in the mold (falling back upstream when the mold is empty)
    pub current_heat_id: Option<u64>,
    pub steel_grade: Option<String>,

    /// First two tundish fragments as (heat id, weight kg).
    pub tundish_heats: Vec<(u64, f64)>,
    /// Per configured cooling section: (section id, flow l/s).
    pub cooling_section_flows: Vec<(u32, f64)>,
}

pub fn compute_overview(state: &CastState) -> OverviewSnapshot {
    let ladle = state.turret.cast_ladle();
    let tundish = &state.tundish;
    let mold = &state.mold;

    let (current_heat_id, steel_grade) = current_heat(state);

    OverviewSnapshot {
        tick: state.meta.tick,
        overview_version: OVERVIEW_VERSION,

        ladle_weight_kg: ladle.map_or(0.0, |l| l.vessel.net_weight_kg()),
        ladle_flow_kg_s: ladle.map_or(0.0, |l| l.vessel.flow_rate_kg_s),

        tundish_weight_kg: tundish.vessel.net_weight_kg(),
        tundish_level_mm: tundish.vessel.level_mm(),
        tundish_temperature_c: tundish.temperature_c,
        tundish_superheat_c: tundish.superheat_c(),
        tundish_superheat_target_c: tundish.superheat_target_c(),
        tundish_flow_kg_s: tundish.vessel.flow_rate_kg_s,
        tundish_mixed_steel_pct: tundish.vessel.mixed_steel_percent(),
        tundish_mixed_steel: tundish.vessel.mixed_steel_kg > 0.0,
        stopper_rod_pct: tundish.stopper_rod_percent(),

        mold_level_mm: mold.level_mm(),
        mold_flow_kg_s: mold.flow_rate_kg_s,

        total_cast_length_m: state.strand.total_cast_length_m,
        cast_speed_m_min: state.strand.cast_speed_m_min,
        head_position_m: state.strand.head_from_mold_m,
        tail_position_m: state.strand.tail_from_mold_m,
        measured_cut_length_m: state.torch.measured_cut_length_m(),
        next_cut_id: state.torch.next_product().map(|p| p.product_id.0.clone()),
        next_cut_length_aim_m: state.torch.next_product().map(|p| p.length_aim_m),

        current_heat_id: current_heat_id.map(|h| h.0),
        steel_grade: steel_grade.map(|g| g.0),

        tundish_heats: tundish
            .vessel
            .fragments()
            .iter()
            .take(2)
            .map(|f| (f.heat_id.0, f.weight_kg))
            .collect(),
        cooling_section_flows: state
            .cooling
            .sections
            .iter()
            .map(|s| (s.id, s.current_flow_lps))
            .collect(),
    }
}

/// The heat currently feeding the strand: head fragment of the mold,
/// falling back to the tundish and then the cast ladle.
fn current_heat(state: &CastState) -> (Option<HeatId>, Option<GradeId>) {
    let fragment = state
        .mold
        .fragments()
        .first()
        .or_else(|| state.tundish.vessel.fragments().first())
        .or_else(|| {
            state
                .turret
                .cast_ladle()
                .and_then(|l| l.vessel.fragments().first())
        });
    match fragment {
        Some(f) => (Some(f.heat_id), Some(f.grade_id.clone())),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, base_state};

    #[test]
    fn fresh_machine_samples_zeros_and_absences() {
        let content = base_content();
        let state = base_state(&content);
        let snapshot = compute_overview(&state);
        assert_eq!(snapshot.tick, 0);
        assert!(snapshot.tundish_weight_kg.abs() < 1e-9);
        assert!(snapshot.tundish_temperature_c.is_none());
        assert!(snapshot.tundish_superheat_c.is_none());
        assert!(snapshot.current_heat_id.is_none());
        assert!(snapshot.next_cut_id.is_none());
        assert!(!snapshot.tundish_mixed_steel);
        assert_eq!(snapshot.cooling_section_flows.len(), 3);
        assert!(snapshot.tundish_heats.is_empty());
    }

    #[test]
    fn snapshot_reports_every_configured_cooling_section() {
        let content = base_content();
        let state = base_state(&content);
        let snapshot = compute_overview(&state);
        let ids: Vec<u32> = snapshot.cooling_section_flows.iter().map(|s| s.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
