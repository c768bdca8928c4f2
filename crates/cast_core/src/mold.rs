//! Water-cooled mold. Participates purely through the base vessel
//! mechanics; its footprint is the strand cross section.

use crate::vessel::{SteelVessel, VesselSpec};
use crate::VesselId;

pub const MOLD_THRESHOLD_MM: f64 = 800.0;

pub fn mold_vessel(width_m: f64, thickness_m: f64, density_kg_m3: f64) -> SteelVessel {
    SteelVessel::new(
        VesselId::Mold,
        VesselSpec {
            width_m,
            depth_m: thickness_m,
            height_m: 1.2,
            max_level_m: 1.1,
            threshold_mm: MOLD_THRESHOLD_MM,
            initial_flow_kg_s: 0.0,
            max_flow_kg_s: 150.0,
            density_kg_m3,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GradeId, HeatFragment, HeatId};

    #[test]
    fn threshold_crosses_at_800_mm() {
        let mut mold = mold_vessel(1.56, 0.103, 7850.0);
        // 800 mm over 1.56 × 0.103 m² at 7850 kg/m³ ≈ 1009 kg.
        let just_under = HeatFragment {
            heat_id: HeatId(1),
            weight_kg: 1000.0,
            grade_id: GradeId("304".to_string()),
            liquidus_c: 1450.0,
            target_superheat_c: 25.0,
        };
        let outcome = mold.add_steel(&just_under).unwrap();
        assert!(!outcome.threshold_crossed);
        let top_up = HeatFragment {
            weight_kg: 20.0,
            ..just_under
        };
        let outcome = mold.add_steel(&top_up).unwrap();
        assert!(outcome.threshold_crossed);
        assert!(mold.level_mm() >= MOLD_THRESHOLD_MM);
    }
}
