//! Content and state builders shared by tests across the workspace.
//!
//! Compiled for this crate's own unit tests and, behind the
//! `test-support` feature, for downstream crates' dev-dependencies.

use std::collections::BTreeMap;

use crate::{
    CastContent, CastState, ChemistryElement, CoolingConfig, CoolingSectionDef, EngineConfig,
    GradeCatalog, GradeId, Heat, HeatId, Product, ProductId, ProductKind, ProductQueue, Sequence,
    SequenceId, SteelGrade,
};

pub const TEST_WIDTH_M: f64 = 1.56;
pub const TEST_THICKNESS_M: f64 = 0.103;
pub const TEST_DENSITY_KG_M3: f64 = 7850.0;

pub fn base_content() -> CastContent {
    CastContent {
        config: EngineConfig {
            torch_location_m: 10.0,
            target_cast_speed_m_min: 3.0,
            speed_ramp_duration_s: 30,
            turret_rotation_duration_s: 15,
            ramp_up_threshold_kg: 3_000.0,
            ..EngineConfig::default()
        },
        cooling: CoolingConfig {
            base_flow_lps: 2.0,
            flow_per_speed_lps: 1.5,
            sections: vec![
                CoolingSectionDef {
                    id: 1,
                    position_factor: 1.0,
                    start_position_m: 0.0,
                    end_position_m: 2.0,
                    nozzles: vec![],
                },
                CoolingSectionDef {
                    id: 2,
                    position_factor: 0.9,
                    start_position_m: 2.0,
                    end_position_m: 5.0,
                    nozzles: vec![],
                },
                CoolingSectionDef {
                    id: 3,
                    position_factor: 0.8,
                    start_position_m: 5.0,
                    end_position_m: 9.0,
                    nozzles: vec![],
                },
            ],
        },
        catalog: GradeCatalog::new(vec![
            SteelGrade {
                id: GradeId("304".to_string()),
                group: "stainless".to_string(),
                liquidus_c: 1450.0,
                target_superheat_c: 25.0,
                description: "18/8 austenitic stainless".to_string(),
                chemistry: vec![
                    ChemistryElement {
                        element: "Cr".to_string(),
                        percentage: 18.0,
                    },
                    ChemistryElement {
                        element: "Ni".to_string(),
                        percentage: 8.0,
                    },
                ],
            },
            SteelGrade {
                id: GradeId("S235JR".to_string()),
                group: "structural".to_string(),
                liquidus_c: 1520.0,
                target_superheat_c: 30.0,
                description: "mild structural steel".to_string(),
                chemistry: vec![
                    ChemistryElement {
                        element: "C".to_string(),
                        percentage: 0.17,
                    },
                    ChemistryElement {
                        element: "Mn".to_string(),
                        percentage: 1.4,
                    },
                ],
            },
        ]),
    }
}

pub fn planned_product(sequence_id: &SequenceId, cut_number: u32, aim_m: f64) -> Product {
    Product {
        sequence_id: sequence_id.clone(),
        cut_number,
        product_id: ProductId(format!("{sequence_id}-{cut_number:02}")),
        kind: ProductKind::Slab,
        planned: true,
        length_aim_m: aim_m,
        length_min_m: aim_m * 0.9,
        length_max_m: aim_m * 1.1,
        cut_length_m: 0.0,
        width_m: TEST_WIDTH_M,
        thickness_m: TEST_THICKNESS_M,
        weight_kg: 0.0,
        cast_length_start_m: 0.0,
    }
}

/// Build a sequence from `(heat id, weight kg, grade)` triples and a list
/// of product aim lengths.
pub fn make_sequence(heats: &[(u64, f64, &str)], aims: &[f64]) -> Sequence {
    let id = SequenceId("2501010000".to_string());
    let heats: BTreeMap<HeatId, Heat> = heats
        .iter()
        .map(|&(heat_id, weight, grade)| {
            (
                HeatId(heat_id),
                Heat::new(
                    HeatId(heat_id),
                    format!("HEAT-{heat_id}"),
                    weight,
                    GradeId(grade.to_string()),
                ),
            )
        })
        .collect();
    let products: Vec<Product> = aims
        .iter()
        .enumerate()
        .map(|(i, &aim)| planned_product(&id, i as u32 + 1, aim))
        .collect();
    Sequence {
        id,
        width_m: TEST_WIDTH_M,
        thickness_m: TEST_THICKNESS_M,
        density_kg_m3: TEST_DENSITY_KG_M3,
        heats,
        schedule: ProductQueue::new(products),
    }
}

/// One 20 t heat of grade 304 with a single planned 5 m product.
pub fn base_state(content: &CastContent) -> CastState {
    let sequence = make_sequence(&[(1001, 20_000.0, "304")], &[5.0]);
    CastState::new(sequence, content, 0).expect("fixture state is valid")
}
