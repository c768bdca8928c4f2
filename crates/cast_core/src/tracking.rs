//! Heat tracking: drives heats through the machine in ascending id order
//! and attributes cast length to them.

use crate::ladle::{Ladle, LadleState};
use crate::strand::Strand;
use crate::{
    emit, CastContent, CastState, Counters, Event, EventEnvelope, HeatFragment, HeatId,
    HeatStatus, Sequence,
};

/// Promote a heat, recording the tick of the transition. Repeat requests
/// are ignored, so observers see each status at most once.
pub(crate) fn promote(
    sequence: &mut Sequence,
    heat_id: HeatId,
    status: HeatStatus,
    tick: u64,
    counters: &mut Counters,
    events: &mut Vec<EventEnvelope>,
) -> bool {
    let heat = sequence
        .heats
        .get_mut(&heat_id)
        .expect("status change for a heat the sequence owns");
    if heat.status >= status {
        return false;
    }
    heat.status = status;
    match status {
        HeatStatus::Pouring => heat.open_tick = Some(tick),
        HeatStatus::Closed => heat.close_tick = Some(tick),
        HeatStatus::Casting => heat.cast_start_tick = Some(tick),
        HeatStatus::New | HeatStatus::Next | HeatStatus::Cutting | HeatStatus::Cast => {}
    }
    events.push(emit(
        counters,
        tick,
        Event::HeatStatusChanged { heat_id, status },
    ));
    true
}

/// Ladle-drained transition. A fast tundish can move a heat to `Casting`
/// while its ladle is still pouring; in that case the status stays where
/// it is but the close tick is still recorded.
pub(crate) fn mark_closed(
    sequence: &mut Sequence,
    heat_id: HeatId,
    tick: u64,
    counters: &mut Counters,
    events: &mut Vec<EventEnvelope>,
) {
    promote(sequence, heat_id, HeatStatus::Closed, tick, counters, events);
    let heat = sequence
        .heats
        .get_mut(&heat_id)
        .expect("status change for a heat the sequence owns");
    if heat.close_tick.is_none() {
        heat.close_tick = Some(tick);
    }
}

/// `Casting` transition: also records where on the strand the heat began.
/// The cast-length mark is set exactly once.
pub(crate) fn mark_casting(
    sequence: &mut Sequence,
    heat_id: HeatId,
    tick: u64,
    total_cast_length_m: f64,
    counters: &mut Counters,
    events: &mut Vec<EventEnvelope>,
) -> bool {
    if !promote(sequence, heat_id, HeatStatus::Casting, tick, counters, events) {
        return false;
    }
    let heat = sequence
        .heats
        .get_mut(&heat_id)
        .expect("heat was just promoted");
    debug_assert!(heat.cast_length_at_start_m.is_none());
    heat.cast_length_at_start_m = Some(total_cast_length_m);
    true
}

/// Take a drained ladle off the load arm so the next heat can mount.
pub(crate) fn release_closed_ladle(state: &mut CastState) {
    let turret = &mut state.turret;
    if turret.is_rotating() {
        return;
    }
    if turret
        .load_ladle()
        .is_some_and(|l| l.state == LadleState::Closed)
    {
        let arm = turret.load_arm_number();
        turret
            .remove_ladle(arm)
            .expect("load arm holds a closed ladle");
    }
}

/// Mount the next `New` heat (lowest id) onto the free load arm. The
/// turret step picks up the rotation as soon as the cast position allows.
pub(crate) fn load_next_heat(
    state: &mut CastState,
    content: &CastContent,
    events: &mut Vec<EventEnvelope>,
) {
    if state.turret.is_rotating() || state.turret.load_ladle().is_some() {
        return;
    }
    let Some(heat_id) = state.sequence.next_new_heat() else {
        return;
    };
    let CastState {
        turret,
        sequence,
        meta,
        counters,
        ..
    } = state;

    let heat = &sequence.heats[&heat_id];
    // A heat with an unknown grade or unusable weight never mounts; the
    // sequence waits for the schedule to be corrected.
    let Some(grade) = content.catalog.get(&heat.grade_id) else {
        return;
    };
    let fragment = HeatFragment {
        heat_id,
        weight_kg: heat.net_weight_kg,
        grade_id: heat.grade_id.clone(),
        liquidus_c: grade.liquidus_c,
        target_superheat_c: grade.target_superheat_c,
    };
    let Ok(ladle) = Ladle::new(heat_id, fragment) else {
        return;
    };
    if let Ok(arm) = turret.add_ladle(ladle) {
        promote(sequence, heat_id, HeatStatus::Next, meta.tick, counters, events);
        events.push(emit(counters, meta.tick, Event::LadleLoaded { arm, heat_id }));
    }
}

/// Per-advance attribution: credit cast length to in-flight heats and walk
/// them through `Casting` → `Cutting` → `Cast`. The `Cutting` → `Cast`
/// promotion runs first, so a heat spends exactly one tick in `Cutting`.
pub(crate) fn on_strand_advanced(
    sequence: &mut Sequence,
    strand: &Strand,
    torch_location_m: f64,
    tick: u64,
    counters: &mut Counters,
    events: &mut Vec<EventEnvelope>,
) {
    let finished: Vec<HeatId> = sequence
        .heats
        .values()
        .filter(|h| h.status == HeatStatus::Cutting)
        .map(|h| h.id)
        .collect();
    for heat_id in finished {
        promote(sequence, heat_id, HeatStatus::Cast, tick, counters, events);
    }

    let cast_increment = strand.cast_length_increment_m();
    for heat in sequence.heats.values_mut() {
        if heat.cast_start_tick.is_some() {
            heat.heat_boundary_m += cast_increment;
        }
    }

    let total = strand.total_cast_length_m;
    let now_cutting: Vec<HeatId> = sequence
        .heats
        .values()
        .filter(|h| {
            h.status == HeatStatus::Casting
                && h.cast_length_at_start_m
                    .is_some_and(|start| total - start > torch_location_m)
        })
        .map(|h| h.id)
        .collect();
    for heat_id in now_cutting {
        promote(sequence, heat_id, HeatStatus::Cutting, tick, counters, events);
    }
}
