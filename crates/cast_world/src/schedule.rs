//! Sequence generation: heats and the planned cut schedule.

use std::collections::BTreeMap;

use anyhow::{ensure, Context, Result};
use cast_core::{
    CastContent, Heat, HeatId, Product, ProductId, ProductKind, ProductQueue, Sequence, SequenceId,
};
use chrono::{DateTime, TimeZone, Utc};
use rand::Rng;

pub const SEQUENCE_HEAT_COUNT: usize = 3;
pub const HEAT_WEIGHT_KG: f64 = 20_000.0;

pub(crate) const DEFAULT_WIDTH_M: f64 = 1.56;
pub(crate) const DEFAULT_THICKNESS_M: f64 = 0.103;

/// Planned aim lengths the generator draws from.
const AIM_CHOICES_M: [f64; 5] = [4.0, 4.5, 5.0, 5.5, 6.0];

/// Margin the torch needs beyond the longest cut so another cut always
/// fits behind it.
const TORCH_CLEARANCE_M: f64 = 4.0;

fn heat_id_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().expect("fixed epoch is valid")
}

/// Build a sequence: 3 heats with clock-derived ids and enough planned
/// products per heat to consume its weight.
pub fn build_sequence(
    content: &CastContent,
    width_m: f64,
    thickness_m: f64,
    density_kg_m3: f64,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Result<Sequence> {
    ensure!(width_m > 0.0 && thickness_m > 0.0, "strand cross section must be positive");

    let sequence_id = SequenceId(now.format("%y%m%d%H%M").to_string());
    let minutes = (now - heat_id_epoch()).num_minutes();
    ensure!(minutes > 0, "sequence start predates the heat id epoch");
    let base_heat_id = minutes as u64;

    // A product at its max length must leave clearance behind the torch.
    let allowed_aims: Vec<f64> = AIM_CHOICES_M
        .iter()
        .copied()
        .filter(|aim| aim * 1.1 < content.config.torch_location_m - TORCH_CLEARANCE_M)
        .collect();
    ensure!(
        !allowed_aims.is_empty(),
        "no product aim length clears the torch at {} m",
        content.config.torch_location_m
    );

    let mut heats: BTreeMap<HeatId, Heat> = BTreeMap::new();
    let mut products: Vec<Product> = Vec::new();
    let mut cut_number = 0_u32;

    for index in 0..SEQUENCE_HEAT_COUNT {
        let heat_id = HeatId(base_heat_id + index as u64);
        let grade = content
            .catalog
            .pick_random(rng)
            .context("grade catalog is empty")?;
        heats.insert(
            heat_id,
            Heat::new(
                heat_id,
                format!("HEAT-{heat_id}"),
                HEAT_WEIGHT_KG,
                grade.id.clone(),
            ),
        );

        let aim_m = allowed_aims[rng.gen_range(0..allowed_aims.len())];
        let product_mass_kg = width_m * thickness_m * aim_m * density_kg_m3;
        let count = (HEAT_WEIGHT_KG / product_mass_kg).ceil() as u32;
        for _ in 0..count {
            cut_number += 1;
            products.push(planned_product(
                &sequence_id,
                cut_number,
                aim_m,
                width_m,
                thickness_m,
            ));
        }
    }

    for product in &products {
        product
            .validate()
            .with_context(|| format!("generated product {}", product.product_id))?;
    }

    Ok(Sequence {
        id: sequence_id,
        width_m,
        thickness_m,
        density_kg_m3,
        heats,
        schedule: ProductQueue::new(products),
    })
}

fn planned_product(
    sequence_id: &SequenceId,
    cut_number: u32,
    aim_m: f64,
    width_m: f64,
    thickness_m: f64,
) -> Product {
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
        width_m,
        thickness_m,
        weight_kg: 0.0,
        cast_length_start_m: 0.0,
    }
}
