//! Buffering tundish between ladle and mold.
//!
//! Carries a scalar bath temperature with arrival bumps and per-second
//! cooling; superheat is the temperature over the weight-averaged liquidus
//! of the current content.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::vessel::{SteelVessel, VesselSpec, DEFAULT_STEEL_DENSITY_KG_M3};
use crate::VesselId;

pub const TUNDISH_THRESHOLD_MM: f64 = 127.0;

fn tundish_spec() -> VesselSpec {
    VesselSpec {
        width_m: 3.876,
        depth_m: 1.550,
        height_m: 1.3,
        max_level_m: 1.181,
        threshold_mm: TUNDISH_THRESHOLD_MM,
        initial_flow_kg_s: 30.0,
        max_flow_kg_s: 150.0,
        density_kg_m3: DEFAULT_STEEL_DENSITY_KG_M3,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tundish {
    pub vessel: SteelVessel,
    /// Bath temperature; None until the first heat arrives.
    pub temperature_c: Option<f64>,
}

impl Default for Tundish {
    fn default() -> Self {
        Tundish::new()
    }
}

impl Tundish {
    pub fn new() -> Self {
        Tundish {
            vessel: SteelVessel::new(VesselId::Tundish, tundish_spec()),
            temperature_c: None,
        }
    }

    /// Temperature response to a heat entering the tundish: the first heat
    /// sets the bath temperature, later heats arrive hotter and bump it.
    pub fn on_new_heat(&mut self, rng: &mut impl Rng) {
        self.temperature_c = Some(match self.temperature_c {
            None => 1550.0 + f64::from(rng.gen_range(0..10_u32)),
            Some(t) => t + rng.gen::<f64>() * 5.0 + 3.0,
        });
    }

    /// One second of heat loss. Flowing steel loses less to the walls.
    pub fn tick_temperature(&mut self, rng: &mut impl Rng) {
        if let Some(t) = self.temperature_c.as_mut() {
            let cooling = if self.vessel.flow_rate_kg_s > 0.0 {
                rng.gen::<f64>() * 0.05 + 0.02
            } else {
                rng.gen::<f64>() * 0.1 + 0.05
            };
            *t -= cooling;
        }
    }

    /// Temperature over the weight-averaged liquidus of the content.
    pub fn superheat_c(&self) -> Option<f64> {
        let temperature = self.temperature_c?;
        Some(temperature - self.weighted(|f| f.liquidus_c)?)
    }

    /// Weight-averaged target superheat of the content.
    pub fn superheat_target_c(&self) -> Option<f64> {
        self.weighted(|f| f.target_superheat_c)
    }

    fn weighted(&self, value: impl Fn(&crate::HeatFragment) -> f64) -> Option<f64> {
        let net = self.vessel.net_weight_kg();
        if net <= 0.0 {
            return None;
        }
        let sum: f64 = self
            .vessel
            .fragments()
            .iter()
            .map(|f| value(f) * f.weight_kg)
            .sum();
        Some(sum / net)
    }

    /// Stopper rod opening, proportional to flow over max flow.
    pub fn stopper_rod_percent(&self) -> f64 {
        (self.vessel.flow_rate_kg_s / self.vessel.spec.max_flow_kg_s * 100.0).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GradeId, HeatFragment, HeatId};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn fragment(heat: u64, kg: f64, liquidus: f64, target: f64) -> HeatFragment {
        HeatFragment {
            heat_id: HeatId(heat),
            weight_kg: kg,
            grade_id: GradeId("g".to_string()),
            liquidus_c: liquidus,
            target_superheat_c: target,
        }
    }

    #[test]
    fn first_heat_initializes_temperature_in_band() {
        for seed in 0..20 {
            let mut tundish = Tundish::new();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            tundish.on_new_heat(&mut rng);
            let t = tundish.temperature_c.unwrap();
            assert!((1550.0..1560.0).contains(&t), "init temp {t} out of band");
        }
    }

    #[test]
    fn later_heats_bump_temperature() {
        let mut tundish = Tundish::new();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        tundish.on_new_heat(&mut rng);
        let before = tundish.temperature_c.unwrap();
        tundish.on_new_heat(&mut rng);
        let after = tundish.temperature_c.unwrap();
        assert!(after - before >= 3.0 && after - before <= 8.0);
    }

    #[test]
    fn cooling_is_slower_while_flowing() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut idle = Tundish::new();
        idle.vessel.add_steel(&fragment(1, 1000.0, 1450.0, 25.0)).unwrap();
        idle.temperature_c = Some(1550.0);
        let mut flowing = idle.clone();
        flowing.vessel.set_flow_rate(50.0);

        let mut idle_loss = 0.0;
        let mut flowing_loss = 0.0;
        for _ in 0..200 {
            let before = idle.temperature_c.unwrap();
            idle.tick_temperature(&mut rng);
            idle_loss += before - idle.temperature_c.unwrap();

            let before = flowing.temperature_c.unwrap();
            flowing.tick_temperature(&mut rng);
            flowing_loss += before - flowing.temperature_c.unwrap();
        }
        assert!(
            flowing_loss < idle_loss,
            "flowing loss {flowing_loss} should undercut idle loss {idle_loss}"
        );
        // Per-tick bounds: flowing [0.02, 0.07], idle [0.05, 0.15].
        assert!(flowing_loss >= 200.0 * 0.02 && flowing_loss <= 200.0 * 0.07);
        assert!(idle_loss >= 200.0 * 0.05 && idle_loss <= 200.0 * 0.15);
    }

    #[test]
    fn superheat_uses_weighted_liquidus() {
        let mut tundish = Tundish::new();
        tundish.vessel.add_steel(&fragment(1, 1000.0, 1400.0, 20.0)).unwrap();
        tundish.vessel.add_steel(&fragment(2, 3000.0, 1500.0, 30.0)).unwrap();
        tundish.temperature_c = Some(1550.0);
        // Weighted liquidus = (1400*1000 + 1500*3000) / 4000 = 1475.
        let superheat = tundish.superheat_c().unwrap();
        assert!((superheat - 75.0).abs() < 1e-9);
        let target = tundish.superheat_target_c().unwrap();
        assert!((target - 27.5).abs() < 1e-9);
    }

    #[test]
    fn superheat_absent_without_temperature_or_steel() {
        let mut tundish = Tundish::new();
        assert!(tundish.superheat_c().is_none());
        tundish.temperature_c = Some(1550.0);
        assert!(tundish.superheat_c().is_none(), "no steel, no superheat");
    }

    #[test]
    fn stopper_rod_tracks_flow_and_clamps() {
        let mut tundish = Tundish::new();
        tundish.vessel.add_steel(&fragment(1, 1000.0, 1450.0, 25.0)).unwrap();
        tundish.vessel.set_flow_rate(75.0);
        assert!((tundish.stopper_rod_percent() - 50.0).abs() < 1e-9);
        tundish.vessel.set_flow_rate(400.0);
        assert!((tundish.stopper_rod_percent() - 100.0).abs() < 1e-9);
    }
}
