//! Two-armed ladle turret.
//!
//! One arm is always in cast position over the tundish, the other in load
//! position. Rotation is a countdown stepper advanced once per tick.

use serde::{Deserialize, Serialize};

use crate::ladle::{Ladle, LadleState, MIN_LADLE_WEIGHT_KG};
use crate::CastError;

pub const MIN_ROTATION_DURATION_S: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turret {
    arms: [Option<Ladle>; 2],
    /// Index of the arm currently in cast position.
    cast_arm: usize,
    /// Seconds left of an in-flight rotation.
    rotation_remaining_s: Option<u32>,
    pub rotation_duration_s: u32,
}

impl Turret {
    pub fn new(rotation_duration_s: u32) -> Result<Self, CastError> {
        if rotation_duration_s < MIN_ROTATION_DURATION_S {
            return Err(CastError::InvalidConfig(format!(
                "turret rotation duration {rotation_duration_s}s is below the \
                 {MIN_ROTATION_DURATION_S}s minimum"
            )));
        }
        Ok(Turret {
            arms: [None, None],
            cast_arm: 0,
            rotation_remaining_s: None,
            rotation_duration_s,
        })
    }

    pub fn is_rotating(&self) -> bool {
        self.rotation_remaining_s.is_some()
    }

    /// 1-based arm numbers, for display and events.
    pub fn cast_arm_number(&self) -> u8 {
        self.cast_arm as u8 + 1
    }

    pub fn load_arm_number(&self) -> u8 {
        (1 - self.cast_arm) as u8 + 1
    }

    pub fn cast_ladle(&self) -> Option<&Ladle> {
        self.arms[self.cast_arm].as_ref()
    }

    pub fn cast_ladle_mut(&mut self) -> Option<&mut Ladle> {
        self.arms[self.cast_arm].as_mut()
    }

    pub fn load_ladle(&self) -> Option<&Ladle> {
        self.arms[1 - self.cast_arm].as_ref()
    }

    /// Install a ladle into the load arm.
    pub fn add_ladle(&mut self, ladle: Ladle) -> Result<u8, CastError> {
        if self.is_rotating() {
            return Err(CastError::InvalidStateTransition(
                "cannot add a ladle while the turret is rotating".to_string(),
            ));
        }
        if ladle.vessel.net_weight_kg() < MIN_LADLE_WEIGHT_KG {
            return Err(CastError::InvalidInput(format!(
                "ladle for heat {} weighs {:.0} kg, below the {MIN_LADLE_WEIGHT_KG} kg minimum",
                ladle.heat_id,
                ladle.vessel.net_weight_kg()
            )));
        }
        let load_arm = 1 - self.cast_arm;
        if self.arms[load_arm].is_some() {
            return Err(CastError::InvalidInput(format!(
                "load arm {} already holds a ladle",
                self.load_arm_number()
            )));
        }
        self.arms[load_arm] = Some(ladle);
        Ok(self.load_arm_number())
    }

    /// Take a ladle off an arm, transferring ownership out.
    pub fn remove_ladle(&mut self, arm_number: u8) -> Result<Ladle, CastError> {
        if !(1..=2).contains(&arm_number) {
            return Err(CastError::InvalidInput(format!(
                "arm {arm_number} does not exist"
            )));
        }
        let index = usize::from(arm_number) - 1;
        if index == self.cast_arm {
            return Err(CastError::InvalidStateTransition(format!(
                "arm {arm_number} is in cast position"
            )));
        }
        self.arms[index].take().ok_or_else(|| {
            CastError::InvalidInput(format!("arm {arm_number} holds no ladle"))
        })
    }

    /// Begin a rotation. No-op (returns false) while already rotating or
    /// while the ladle in cast position is pouring.
    pub fn request_rotation(&mut self) -> bool {
        if self.is_rotating() {
            return false;
        }
        if self
            .cast_ladle()
            .is_some_and(|l| l.state == LadleState::Open)
        {
            return false;
        }
        self.rotation_remaining_s = Some(self.rotation_duration_s);
        true
    }

    /// Advance one second. Returns true on the tick the rotation completes
    /// and the arms swap.
    pub fn step(&mut self) -> bool {
        let Some(remaining) = self.rotation_remaining_s else {
            return false;
        };
        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            self.rotation_remaining_s = None;
            self.cast_arm = 1 - self.cast_arm;
            true
        } else {
            self.rotation_remaining_s = Some(remaining);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GradeId, HeatFragment, HeatId};

    fn ladle(heat: u64, kg: f64) -> Ladle {
        Ladle::new(
            HeatId(heat),
            HeatFragment {
                heat_id: HeatId(heat),
                weight_kg: kg,
                grade_id: GradeId("304".to_string()),
                liquidus_c: 1450.0,
                target_superheat_c: 25.0,
            },
        )
        .unwrap()
    }

    #[test]
    fn rotation_duration_below_minimum_is_rejected() {
        assert!(matches!(
            Turret::new(9),
            Err(CastError::InvalidConfig(_))
        ));
        assert!(Turret::new(10).is_ok());
    }

    #[test]
    fn light_ladle_is_rejected() {
        let mut turret = Turret::new(10).unwrap();
        let err = turret.add_ladle(ladle(1, 19_999.0)).unwrap_err();
        assert!(matches!(err, CastError::InvalidInput(_)));
        assert!(turret.load_ladle().is_none());
    }

    #[test]
    fn add_while_rotating_is_rejected() {
        let mut turret = Turret::new(10).unwrap();
        assert!(turret.request_rotation());
        let err = turret.add_ladle(ladle(1, 20_000.0)).unwrap_err();
        assert!(matches!(err, CastError::InvalidStateTransition(_)));
    }

    #[test]
    fn rotation_swaps_arms_after_duration() {
        let mut turret = Turret::new(10).unwrap();
        turret.add_ladle(ladle(1, 20_000.0)).unwrap();
        assert_eq!(turret.cast_arm_number(), 1);
        assert!(turret.request_rotation());
        for _ in 0..9 {
            assert!(!turret.step());
            assert!(turret.is_rotating());
        }
        assert!(turret.step());
        assert!(!turret.is_rotating());
        assert_eq!(turret.cast_arm_number(), 2);
        assert_eq!(turret.cast_ladle().unwrap().heat_id, HeatId(1));
    }

    #[test]
    fn rotation_with_open_cast_ladle_is_noop() {
        let mut turret = Turret::new(10).unwrap();
        turret.add_ladle(ladle(1, 20_000.0)).unwrap();
        turret.request_rotation();
        while !turret.step() {}
        turret.cast_ladle_mut().unwrap().state = LadleState::Open;
        assert!(!turret.request_rotation());
        assert!(!turret.is_rotating());
    }

    #[test]
    fn remove_from_cast_arm_fails() {
        let mut turret = Turret::new(10).unwrap();
        turret.add_ladle(ladle(1, 20_000.0)).unwrap();
        turret.request_rotation();
        while !turret.step() {}
        // Heat 1 is now in cast position (arm 2).
        let err = turret.remove_ladle(turret.cast_arm_number()).unwrap_err();
        assert!(matches!(err, CastError::InvalidStateTransition(_)));
        let err = turret.remove_ladle(turret.load_arm_number()).unwrap_err();
        assert!(matches!(err, CastError::InvalidInput(_)), "empty arm");
    }

    #[test]
    fn remove_from_load_arm_transfers_ownership() {
        let mut turret = Turret::new(10).unwrap();
        turret.add_ladle(ladle(1, 20_000.0)).unwrap();
        let removed = turret.remove_ladle(turret.load_arm_number()).unwrap();
        assert_eq!(removed.heat_id, HeatId(1));
        assert!(turret.load_ladle().is_none());
    }

    #[test]
    fn second_ladle_on_occupied_load_arm_is_rejected() {
        let mut turret = Turret::new(10).unwrap();
        turret.add_ladle(ladle(1, 20_000.0)).unwrap();
        let err = turret.add_ladle(ladle(2, 20_000.0)).unwrap_err();
        assert!(matches!(err, CastError::InvalidInput(_)));
    }
}
