//! The moving strand and its speed ramp.

use serde::{Deserialize, Serialize};

use crate::CastError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrandMode {
    Idle,
    DummyBarInsert,
    ReadyToCast,
    Casting,
    /// The mold has emptied; the strand tail is moving toward the torch.
    Tailout,
}

/// Linear speed ramp evaluated once per second.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedRamp {
    start_m_min: f64,
    target_m_min: f64,
    duration_s: u32,
    elapsed_s: u32,
}

impl SpeedRamp {
    pub fn new(start_m_min: f64, target_m_min: f64, duration_s: u32) -> Result<Self, CastError> {
        if start_m_min < 0.0 {
            return Err(CastError::InvalidConfig(format!(
                "ramp start speed {start_m_min} m/min is negative"
            )));
        }
        if !(1.0..=10.0).contains(&target_m_min) {
            return Err(CastError::InvalidConfig(format!(
                "ramp target speed {target_m_min} m/min is outside [1, 10]"
            )));
        }
        if duration_s > 90 {
            return Err(CastError::InvalidConfig(format!(
                "ramp duration {duration_s}s is outside [0, 90]"
            )));
        }
        Ok(SpeedRamp {
            start_m_min,
            target_m_min,
            duration_s,
            elapsed_s: 0,
        })
    }

    /// Current speed; advances the ramp by one second. Holds the target
    /// once the duration has elapsed.
    pub fn next(&mut self) -> f64 {
        let speed = if self.duration_s == 0 {
            self.target_m_min
        } else {
            let fraction =
                (f64::from(self.elapsed_s) / f64::from(self.duration_s)).min(1.0);
            self.start_m_min + fraction * (self.target_m_min - self.start_m_min)
        };
        self.elapsed_s = self.elapsed_s.saturating_add(1);
        speed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strand {
    pub mode: StrandMode,
    pub running: bool,
    /// Head position measured from the mold; advances in every mode and is
    /// reset to the torch location after each cut.
    pub head_from_mold_m: f64,
    /// Tail position; only advances during tailout.
    pub tail_from_mold_m: f64,
    /// Meters cast; only advances in `Casting` mode.
    pub total_cast_length_m: f64,
    pub cast_speed_m_min: f64,
    pub last_increment_m: f64,
    /// Portion of the last advance credited to `total_cast_length_m`.
    last_cast_increment_m: f64,
    ramp: SpeedRamp,
}

impl Strand {
    pub fn new(ramp: SpeedRamp) -> Self {
        Strand {
            mode: StrandMode::Idle,
            running: false,
            head_from_mold_m: 0.0,
            tail_from_mold_m: 0.0,
            total_cast_length_m: 0.0,
            cast_speed_m_min: 0.0,
            last_increment_m: 0.0,
            last_cast_increment_m: 0.0,
            ramp,
        }
    }

    pub fn start(&mut self) {
        self.mode = StrandMode::Casting;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.mode = StrandMode::Idle;
        self.cast_speed_m_min = 0.0;
    }

    pub fn set_mode(&mut self, mode: StrandMode) {
        self.mode = mode;
    }

    /// Increment credited to `total_cast_length_m` by the last advance.
    /// Frozen at advance time: a mode change after the advance does not
    /// rewrite it.
    pub fn cast_length_increment_m(&self) -> f64 {
        self.last_cast_increment_m
    }

    /// One-second advance. Returns the head increment, or None while
    /// stopped.
    pub fn advance(&mut self) -> Option<f64> {
        if !self.running {
            return None;
        }
        self.cast_speed_m_min = self.ramp.next();
        let increment = self.cast_speed_m_min / 60.0;
        self.head_from_mold_m += increment;
        self.last_cast_increment_m = 0.0;
        match self.mode {
            StrandMode::Casting => {
                self.total_cast_length_m += increment;
                self.last_cast_increment_m = increment;
            }
            StrandMode::Tailout => self.tail_from_mold_m += increment,
            StrandMode::Idle | StrandMode::DummyBarInsert | StrandMode::ReadyToCast => {}
        }
        self.last_increment_m = increment;
        Some(increment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_rejects_out_of_range_parameters() {
        assert!(matches!(
            SpeedRamp::new(-0.1, 3.0, 60),
            Err(CastError::InvalidConfig(_))
        ));
        assert!(matches!(
            SpeedRamp::new(0.0, 0.5, 60),
            Err(CastError::InvalidConfig(_))
        ));
        assert!(matches!(
            SpeedRamp::new(0.0, 11.0, 60),
            Err(CastError::InvalidConfig(_))
        ));
        assert!(matches!(
            SpeedRamp::new(0.0, 3.0, 91),
            Err(CastError::InvalidConfig(_))
        ));
    }

    #[test]
    fn ramp_is_linear_and_holds_target() {
        let mut ramp = SpeedRamp::new(1.0, 3.0, 10).unwrap();
        assert!((ramp.next() - 1.0).abs() < 1e-9);
        assert!((ramp.next() - 1.2).abs() < 1e-9);
        for _ in 2..10 {
            ramp.next();
        }
        // Elapsed >= duration: target forever.
        assert!((ramp.next() - 3.0).abs() < 1e-9);
        assert!((ramp.next() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn zero_duration_ramp_returns_target_immediately() {
        let mut ramp = SpeedRamp::new(0.0, 4.0, 0).unwrap();
        assert!((ramp.next() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn casting_mode_accumulates_total_but_not_tail() {
        let mut strand = Strand::new(SpeedRamp::new(3.0, 3.0, 0).unwrap());
        strand.start();
        let increment = strand.advance().unwrap();
        assert!((increment - 0.05).abs() < 1e-9);
        assert!((strand.head_from_mold_m - 0.05).abs() < 1e-9);
        assert!((strand.total_cast_length_m - 0.05).abs() < 1e-9);
        assert!(strand.tail_from_mold_m.abs() < 1e-9);
        assert!((strand.cast_length_increment_m() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn tailout_mode_accumulates_tail_but_not_total() {
        let mut strand = Strand::new(SpeedRamp::new(3.0, 3.0, 0).unwrap());
        strand.start();
        strand.advance();
        strand.set_mode(StrandMode::Tailout);
        let total_before = strand.total_cast_length_m;
        strand.advance();
        assert!((strand.total_cast_length_m - total_before).abs() < 1e-9);
        assert!((strand.tail_from_mold_m - 0.05).abs() < 1e-9);
        assert!((strand.head_from_mold_m - 0.10).abs() < 1e-9, "head always advances");
        assert!(strand.cast_length_increment_m().abs() < 1e-9);
    }

    #[test]
    fn mode_flip_after_advance_keeps_the_credited_increment() {
        // The mold can empty (and flip the mode to tailout) after the
        // advance of the same tick; that tick's credit must survive.
        let mut strand = Strand::new(SpeedRamp::new(3.0, 3.0, 0).unwrap());
        strand.start();
        strand.advance();
        strand.set_mode(StrandMode::Tailout);
        assert!((strand.cast_length_increment_m() - 0.05).abs() < 1e-9);
        strand.advance();
        assert!(strand.cast_length_increment_m().abs() < 1e-9);
    }

    #[test]
    fn stop_zeroes_speed_and_halts_advances() {
        let mut strand = Strand::new(SpeedRamp::new(3.0, 3.0, 0).unwrap());
        strand.start();
        strand.advance();
        strand.stop();
        assert_eq!(strand.mode, StrandMode::Idle);
        assert!(strand.cast_speed_m_min.abs() < 1e-9);
        assert!(strand.advance().is_none());
    }
}
