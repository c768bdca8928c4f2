//! The tick orchestrator: advances every component one simulated second
//! and routes material between them.

use rand::Rng;

use crate::cut_plan::optimize_cut_queue;
use crate::flow::compute_flow_rate;
use crate::ladle::LadleState;
use crate::mold::mold_vessel;
use crate::strand::{SpeedRamp, Strand, StrandMode};
use crate::torch::Torch;
use crate::tracking;
use crate::tundish::Tundish;
use crate::turret::Turret;
use crate::{
    emit, CastContent, CastError, CastState, CoolingController, Counters, Event, EventEnvelope,
    EventLevel, HeatStatus, LoopState, MetaState, Product, Sequence, VesselId,
};

impl CastState {
    /// Assemble the machine for a sequence.
    pub fn new(sequence: Sequence, content: &CastContent, seed: u64) -> Result<Self, CastError> {
        if sequence.heats.is_empty() {
            return Err(CastError::InvalidConfig(
                "sequence has no heats".to_string(),
            ));
        }
        for heat in sequence.heats.values() {
            if content.catalog.get(&heat.grade_id).is_none() {
                return Err(CastError::InvalidConfig(format!(
                    "heat {} references unknown grade {}",
                    heat.id, heat.grade_id
                )));
            }
        }
        for product in sequence.schedule.iter() {
            product.validate()?;
        }
        let ramp = SpeedRamp::new(
            0.0,
            content.config.target_cast_speed_m_min,
            content.config.speed_ramp_duration_s,
        )?;
        Ok(CastState {
            meta: MetaState {
                tick: 0,
                seed,
                schema_version: 1,
            },
            turret: Turret::new(content.config.turret_rotation_duration_s)?,
            tundish: Tundish::new(),
            mold: mold_vessel(
                sequence.width_m,
                sequence.thickness_m,
                sequence.density_kg_m3,
            ),
            strand: Strand::new(ramp),
            torch: Torch::new(content.config.torch_location_m),
            cooling: CoolingController::new(&content.cooling),
            loops: LoopState::default(),
            cut_products: Vec::new(),
            casting_finished: false,
            counters: Counters::default(),
            sequence,
        })
    }
}

/// Advance the simulation by one second.
///
/// Order of operations:
/// 1. Release the drained ladle and mount the next heat on the turret.
/// 2. Step the turret rotation; a freshly rotated-in ladle opens.
/// 3. Ladle pours into the tundish (tundish level loop sets the commanded
///    ladle flow, the ladle perturbs it).
/// 4. Tundish temperature loss.
/// 5. Tundish pours into the mold (mold level loop sets the tundish flow).
/// 6. Strand advance: mold consumption, torch measurement, cut handling,
///    cooling recomputation, heat attribution.
///
/// Returns all events produced this tick.
pub fn tick(
    state: &mut CastState,
    content: &CastContent,
    rng: &mut impl Rng,
    event_level: EventLevel,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    if state.casting_finished {
        state.meta.tick += 1;
        return events;
    }

    tracking::release_closed_ladle(state);
    tracking::load_next_heat(state, content, &mut events);
    step_turret(state, &mut events);
    step_ladle_pour(state, content, rng, event_level, &mut events);
    state.tundish.tick_temperature(rng);
    step_tundish_pour(state, content, event_level, &mut events);
    step_strand(state, event_level, &mut events);

    state.meta.tick += 1;
    events
}

fn step_turret(state: &mut CastState, events: &mut Vec<EventEnvelope>) {
    // A waiting ladle rotates in as soon as the cast position allows it.
    if state
        .turret
        .load_ladle()
        .is_some_and(|l| l.state == LadleState::New)
    {
        state.turret.request_rotation();
    }
    if state.turret.step() {
        let tick = state.meta.tick;
        let heat_id = state.turret.cast_ladle().map(|l| l.heat_id);
        let cast_arm = state.turret.cast_arm_number();
        events.push(emit(
            &mut state.counters,
            tick,
            Event::TurretRotated { cast_arm, heat_id },
        ));
        // The rotated-in ladle opens its slide gate and starts pouring.
        if let Some(ladle) = state.turret.cast_ladle_mut() {
            if ladle.state == LadleState::New {
                ladle.state = LadleState::Open;
                let initial = ladle.vessel.spec.initial_flow_kg_s;
                ladle.vessel.set_flow_rate(initial);
            }
        }
    }
}

fn step_ladle_pour(
    state: &mut CastState,
    content: &CastContent,
    rng: &mut impl Rng,
    event_level: EventLevel,
    events: &mut Vec<EventEnvelope>,
) {
    let tick = state.meta.tick;
    let CastState {
        turret,
        tundish,
        sequence,
        loops,
        torch,
        strand,
        counters,
        ..
    } = state;

    // The ladle holds its steel while the tundish is at capacity.
    if tundish.vessel.net_weight_kg() >= content.config.max_tundish_weight_kg {
        return;
    }

    let (outcome, ladle_heat) = {
        let Some(ladle) = turret.cast_ladle_mut() else {
            return;
        };
        if ladle.state != LadleState::Open || ladle.vessel.is_empty() {
            return;
        }
        let commanded = if loops.ladle_loop {
            compute_flow_rate(
                tundish.vessel.level_mm(),
                ladle.vessel.flow_rate_kg_s,
                ladle.vessel.spec.max_flow_kg_s,
                content.config.tundish_level_target_mm,
                content.config.tundish_level_tolerance_pct,
            )
        } else {
            ladle.vessel.flow_rate_kg_s
        };
        ladle.set_flow_rate(commanded, rng);
        let rate = ladle.vessel.flow_rate_kg_s;
        let outcome = ladle.vessel.pour(rate);
        if outcome.emptied.is_some() {
            ladle.state = LadleState::Closed;
        }
        (outcome, ladle.heat_id)
    };

    if let Some(head) = outcome.heat_out {
        let newly_pouring = sequence
            .heats
            .get(&head)
            .is_some_and(|h| h.status < HeatStatus::Pouring);
        if newly_pouring {
            events.push(emit(
                counters,
                tick,
                Event::HeatOut {
                    vessel: VesselId::Ladle,
                    heat_id: head,
                },
            ));
            tracking::promote(sequence, head, HeatStatus::Pouring, tick, counters, events);
        }
    }

    for fragment in &outcome.poured {
        if event_level == EventLevel::Debug {
            events.push(emit(
                counters,
                tick,
                Event::SteelPoured {
                    vessel: VesselId::Ladle,
                    fragment: fragment.clone(),
                },
            ));
        }
        let added = tundish
            .vessel
            .add_steel(fragment)
            .expect("poured fragments carry positive weight");
        if !added.coalesced {
            tundish.on_new_heat(rng);
        }
        events.push(emit(
            counters,
            tick,
            Event::SteelAdded {
                vessel: VesselId::Tundish,
                heat_id: fragment.heat_id,
            },
        ));
        if added.threshold_crossed {
            events.push(emit(
                counters,
                tick,
                Event::WeightThresholdReached {
                    vessel: VesselId::Tundish,
                    level_mm: tundish.vessel.level_mm(),
                },
            ));
            loops.ladle_loop = true;
            loops.tundish_pouring = true;
            let initial = tundish.vessel.spec.initial_flow_kg_s;
            tundish.vessel.set_flow_rate(initial);
            arm_next_cut(sequence, torch, strand, loops);
        }
    }

    if let Some(last) = outcome.emptied {
        events.push(emit(
            counters,
            tick,
            Event::VesselEmptied {
                vessel: VesselId::Ladle,
                heat_id: last,
            },
        ));
        tracking::mark_closed(sequence, ladle_heat, tick, counters, events);
    }
}

fn step_tundish_pour(
    state: &mut CastState,
    content: &CastContent,
    event_level: EventLevel,
    events: &mut Vec<EventEnvelope>,
) {
    let tick = state.meta.tick;
    let CastState {
        tundish,
        mold,
        strand,
        sequence,
        loops,
        counters,
        ..
    } = state;

    if loops.tundish_pouring && !tundish.vessel.is_empty() {
        if loops.mold_loop {
            let new_flow = compute_flow_rate(
                mold.level_mm(),
                tundish.vessel.flow_rate_kg_s,
                tundish.vessel.spec.max_flow_kg_s,
                content.config.mold_level_target_mm,
                content.config.mold_level_tolerance_pct,
            );
            tundish.vessel.set_flow_rate(new_flow);
        }
        let rate = tundish.vessel.flow_rate_kg_s;
        let outcome = tundish.vessel.pour(rate);

        if let Some(head) = outcome.heat_out {
            let newly_casting = sequence
                .heats
                .get(&head)
                .is_some_and(|h| h.status < HeatStatus::Casting);
            if newly_casting {
                events.push(emit(
                    counters,
                    tick,
                    Event::HeatOut {
                        vessel: VesselId::Tundish,
                        heat_id: head,
                    },
                ));
                tracking::mark_casting(
                    sequence,
                    head,
                    tick,
                    strand.total_cast_length_m,
                    counters,
                    events,
                );
            }
        }

        for fragment in &outcome.poured {
            if event_level == EventLevel::Debug {
                events.push(emit(
                    counters,
                    tick,
                    Event::SteelPoured {
                        vessel: VesselId::Tundish,
                        fragment: fragment.clone(),
                    },
                ));
            }
            let added = mold
                .add_steel(fragment)
                .expect("poured fragments carry positive weight");
            events.push(emit(
                counters,
                tick,
                Event::SteelAdded {
                    vessel: VesselId::Mold,
                    heat_id: fragment.heat_id,
                },
            ));
            if added.threshold_crossed {
                events.push(emit(
                    counters,
                    tick,
                    Event::WeightThresholdReached {
                        vessel: VesselId::Mold,
                        level_mm: mold.level_mm(),
                    },
                ));
                loops.mold_ready = true;
                loops.mold_loop = true;
            }
        }

        if let Some(last) = outcome.emptied {
            events.push(emit(
                counters,
                tick,
                Event::VesselEmptied {
                    vessel: VesselId::Tundish,
                    heat_id: last,
                },
            ));
        }
    }

    // Ramp-up gate: the mold threshold has latched and the tundish holds
    // enough inventory to sustain the ramp.
    if loops.mold_ready
        && !strand.running
        && tundish.vessel.net_weight_kg() >= content.config.ramp_up_threshold_kg
    {
        strand.start();
    }
}

fn step_strand(state: &mut CastState, event_level: EventLevel, events: &mut Vec<EventEnvelope>) {
    let tick = state.meta.tick;
    let CastState {
        strand,
        mold,
        torch,
        cooling,
        sequence,
        loops,
        cut_products,
        counters,
        casting_finished,
        ..
    } = state;

    let Some(increment) = strand.advance() else {
        return;
    };
    events.push(emit(
        counters,
        tick,
        Event::StrandAdvanced {
            increment_m: increment,
            head_m: strand.head_from_mold_m,
            tail_m: strand.tail_from_mold_m,
            cast_speed_m_min: strand.cast_speed_m_min,
        },
    ));

    // The mold feeds the strand everywhere but tailout.
    if strand.mode != StrandMode::Tailout {
        let mass = sequence.cross_section_m2() * increment * sequence.density_kg_m3;
        let outcome = mold.pour(mass);
        if event_level == EventLevel::Debug {
            for fragment in outcome.poured {
                events.push(emit(
                    counters,
                    tick,
                    Event::SteelPoured {
                        vessel: VesselId::Mold,
                        fragment,
                    },
                ));
            }
        }
        if let Some(last) = outcome.emptied {
            events.push(emit(
                counters,
                tick,
                Event::VesselEmptied {
                    vessel: VesselId::Mold,
                    heat_id: last,
                },
            ));
            strand.set_mode(StrandMode::Tailout);
        }
    }

    if let Some(done) = torch.measure(increment, strand.tail_from_mold_m) {
        finish_cut(done, strand, torch, sequence, loops, cut_products, counters, tick, events);
    }

    if strand.tail_from_mold_m > torch.location_m {
        strand.stop();
        *casting_finished = true;
        events.push(emit(
            counters,
            tick,
            Event::CastingFinished {
                total_cast_length_m: strand.total_cast_length_m,
            },
        ));
    }

    cooling.activate(
        strand.head_from_mold_m,
        strand.tail_from_mold_m,
        strand.cast_speed_m_min,
    );

    tracking::on_strand_advanced(sequence, strand, torch.location_m, tick, counters, events);
}

/// Hand the next scheduled product to the torch, recording where on the
/// strand it starts. Only the final cut of the reshaped tailout schedule
/// is flagged last; earlier queue exhaustion just disarms the torch.
fn arm_next_cut(sequence: &mut Sequence, torch: &mut Torch, strand: &Strand, loops: &LoopState) {
    match sequence.schedule.pop_front() {
        Some(mut next) => {
            next.cast_length_start_m = strand.total_cast_length_m;
            let is_last = sequence.schedule.is_empty() && loops.schedule_optimized;
            torch.set_next_product(next, is_last);
        }
        None => torch.reset_next_product(),
    }
}

#[allow(clippy::too_many_arguments)]
fn finish_cut(
    mut product: Product,
    strand: &mut Strand,
    torch: &mut Torch,
    sequence: &mut Sequence,
    loops: &mut LoopState,
    cut_products: &mut Vec<Product>,
    counters: &mut Counters,
    tick: u64,
    events: &mut Vec<EventEnvelope>,
) {
    product.weight_kg =
        product.cut_length_m * sequence.width_m * sequence.thickness_m * sequence.density_kg_m3;
    cut_products.push(product.clone());
    events.push(emit(
        counters,
        tick,
        Event::CutDone {
            product: Box::new(product),
        },
    ));

    // The strand is running out: reshape the remaining schedule against
    // the steel still in the machine, once.
    if strand.mode == StrandMode::Tailout && !loops.schedule_optimized {
        torch.set_optimization_in_progress(true);
        let residual = strand.head_from_mold_m - strand.tail_from_mold_m;
        let optimized = optimize_cut_queue(residual, &sequence.schedule.snapshot(), &sequence.id);
        let queued = optimized.len();
        sequence.schedule.replace(optimized);
        loops.schedule_optimized = true;
        torch.set_optimization_in_progress(false);
        events.push(emit(
            counters,
            tick,
            Event::ScheduleOptimized {
                residual_m: residual,
                queued,
            },
        ));
    }

    arm_next_cut(sequence, torch, strand, loops);

    strand.head_from_mold_m = torch.location_m;
}
