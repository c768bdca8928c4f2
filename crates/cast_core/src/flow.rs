//! Proportional level controller with a gain floor and per-step slew
//! limiting. Pure function of its inputs.

/// Compute the next flow rate for a level-control loop.
///
/// The correction is proportional to the level error with the gain scaled
/// by how far outside the tolerance band the level sits (floored at 0.5);
/// the per-step change is limited and the result clamped to
/// `[0, max_flow]`.
pub fn compute_flow_rate(
    monitored_level_mm: f64,
    current_flow_kg_s: f64,
    max_flow_kg_s: f64,
    target_level_mm: f64,
    tolerance_percent: f64,
) -> f64 {
    let tolerance_mm = target_level_mm * tolerance_percent / 100.0;
    let error = monitored_level_mm - target_level_mm;
    let correction_factor = (error.abs() / tolerance_mm).max(0.5);
    let correction = -correction_factor * error;
    let change_limit = (max_flow_kg_s * tolerance_percent / 100.0).max(10.0);
    let target_flow = current_flow_kg_s + correction;
    let adjusted = target_flow.clamp(
        current_flow_kg_s - change_limit,
        current_flow_kg_s + change_limit,
    );
    adjusted.clamp(0.0, max_flow_kg_s)
}
