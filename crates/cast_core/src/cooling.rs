//! Secondary cooling sections along the strand.
//!
//! Per-section water flow follows head/tail position and cast speed.
//! Recomputation is skipped while the inputs are unchanged, which under
//! the 1 Hz clock also satisfies the 500 ms update throttle.

use serde::{Deserialize, Serialize};

use crate::CoolingConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoolingSection {
    pub id: u32,
    pub start_position_m: f64,
    pub end_position_m: f64,
    pub position_factor: f64,
    pub current_flow_lps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoolingController {
    pub base_flow_lps: f64,
    pub flow_per_speed_lps: f64,
    pub sections: Vec<CoolingSection>,
    last_inputs: Option<(f64, f64, f64)>,
}

impl CoolingController {
    pub fn new(config: &CoolingConfig) -> Self {
        CoolingController {
            base_flow_lps: config.base_flow_lps,
            flow_per_speed_lps: config.flow_per_speed_lps,
            sections: config
                .sections
                .iter()
                .map(|s| CoolingSection {
                    id: s.id,
                    start_position_m: s.start_position_m,
                    end_position_m: s.end_position_m,
                    position_factor: s.position_factor,
                    current_flow_lps: 0.0,
                })
                .collect(),
            last_inputs: None,
        }
    }

    /// Recompute section flows for the given strand geometry and speed.
    /// Returns false when the inputs were unchanged and nothing ran.
    pub fn activate(&mut self, head_m: f64, tail_m: f64, cast_speed_m_min: f64) -> bool {
        let inputs = (head_m, tail_m, cast_speed_m_min);
        if self.last_inputs == Some(inputs) {
            return false;
        }
        self.last_inputs = Some(inputs);

        let active_flow = self.base_flow_lps + self.flow_per_speed_lps * cast_speed_m_min;
        for section in &mut self.sections {
            let head_in_section = head_m >= section.start_position_m;
            let tail_still_in_section = tail_m > 0.0 && tail_m < section.end_position_m;
            section.current_flow_lps = if head_in_section || tail_still_in_section {
                active_flow * section.position_factor
            } else {
                0.0
            };
        }
        true
    }
}
