//! Degeneration (§4.4 "Degeneration"): periodic entropy-driven trait decay
//! plus environment-driven use-it-or-lose-it organ deactivation.

use primordium_data::events::{AdaptationEvent, AdaptationEventKind};
use primordium_data::species::{HabitatType, OrganCategory, Species, TraitName};
use rand::Rng;
use std::collections::HashMap;

const MAINTENANCE_THRESHOLD: f32 = 40.0;
const DEGENERATION_INTERVAL_TURNS: u64 = 5;

/// Whether this turn is due for a periodic degeneration pass, independent of
/// the trait-sum overflow check.
#[must_use]
pub fn is_due(turn: u64) -> bool {
    turn > 0 && turn % DEGENERATION_INTERVAL_TURNS == 0
}

/// Entropy-driven reduction: removes `0.1..0.4` from a randomly chosen
/// trait among those with the highest values, run on the periodic interval
/// or whenever the trait sum exceeds the maintenance threshold.
pub fn apply<R: Rng + ?Sized>(species: &mut Species, turn: u64, rng: &mut R) -> Option<AdaptationEvent> {
    let trait_sum: f32 = species.traits.values().sum();
    if !is_due(turn) && trait_sum <= MAINTENANCE_THRESHOLD {
        return None;
    }
    if species.traits.is_empty() {
        return None;
    }

    let mut ranked: Vec<(TraitName, f32)> = species.traits.iter().map(|(&k, &v)| (k, v)).collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let top_n = ranked.len().min(3);
    let choice = rng.gen_range(0..top_n);
    let (trait_name, current) = ranked[choice];

    let reduction = rng.gen_range(0.1..0.4_f32).min(current.max(0.0));
    if reduction <= 0.0 {
        return None;
    }
    *species.traits.get_mut(&trait_name).unwrap() -= reduction;

    let mut deltas = HashMap::new();
    deltas.insert(trait_name, -reduction);
    deactivate_mismatched_organs(species, &mut deltas);

    Some(AdaptationEvent { lineage_code: species.lineage_code.clone(), turn, kind: AdaptationEventKind::Degeneration, trait_deltas: deltas })
}

/// Use-it-or-lose-it: a non-terrestrial habitat deactivates locomotion
/// organs adapted for walking, and a deep-sea habitat (persistent darkness)
/// deactivates sensory organs tuned for vision.
fn deactivate_mismatched_organs(species: &mut Species, deltas: &mut HashMap<TraitName, f32>) {
    match species.habitat_type {
        HabitatType::DeepSea | HabitatType::Aerial => {
            if let Some(organ) = species.organs.get_mut(&OrganCategory::Sensory) {
                if organ.active {
                    organ.active = false;
                }
            }
        }
        _ => {}
    }
    if matches!(species.habitat_type, HabitatType::Marine | HabitatType::DeepSea) {
        if let Some(organ) = species.organs.get_mut(&OrganCategory::Locomotion) {
            if organ.active && species.traits.get(&TraitName::Locomotion).copied().unwrap_or(0.0) < 1.0 {
                organ.active = false;
                deltas.entry(TraitName::Locomotion).or_insert(0.0);
            }
        }
    }
}
