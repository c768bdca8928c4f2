//! Content loading and initial-state construction shared between
//! `cast_cli` and `cast_daemon`.
//!
//! The wall clock enters the system here (sequence ids, heat ids) and
//! nowhere else; `cast_core` stays deterministic.

mod content;
mod schedule;

pub use content::{load_content, validate_content};
pub use schedule::{build_sequence, HEAT_WEIGHT_KG, SEQUENCE_HEAT_COUNT};

use anyhow::{Context, Result};
use cast_core::{CastContent, CastState};
use chrono::{DateTime, Utc};
use rand::Rng;

/// Build a fresh machine state with a generated sequence.
pub fn build_initial_state(
    content: &CastContent,
    seed: u64,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Result<CastState> {
    let sequence = build_sequence(
        content,
        schedule::DEFAULT_WIDTH_M,
        schedule::DEFAULT_THICKNESS_M,
        content.config.steel_density_kg_m3,
        now,
        rng,
    )?;
    let state = CastState::new(sequence, content, seed).context("assembling machine state")?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cast_core::test_fixtures::base_content;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn initial_state_starts_idle_with_a_full_schedule() {
        let content = base_content();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let state = build_initial_state(&content, 1, now, &mut rng).unwrap();

        assert_eq!(state.meta.tick, 0);
        assert!(!state.casting_finished);
        assert_eq!(state.sequence.heats.len(), SEQUENCE_HEAT_COUNT);
        assert!(!state.sequence.schedule.is_empty());
        assert!(state.tundish.vessel.is_empty());
        assert!(state.cut_products.is_empty());
    }
}
