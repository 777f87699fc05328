//! Gradual adaptation (§4.4 "Gradual adaptation"): each turn, a species'
//! trait vector moves slowly along the gradient implied by active
//! pressures, scaled by generation count, a fixed time-scale, and a
//! plasticity-buffer urgency factor, then renormalized to the era cap.

use primordium_data::events::{AdaptationEvent, AdaptationEventKind};
use primordium_data::pressure::{PressureDescriptor, PressureKind};
use primordium_data::species::{Era, Species, TraitName};
use std::collections::HashMap;

const TIME_SCALE: f32 = 0.01;
/// Weight folding niche overlap (§4.2) into adaptation urgency: a species
/// crowded by competitors adapts faster, pushing its traits away from the
/// shared niche.
const NICHE_OVERLAP_URGENCY_WEIGHT: f32 = 0.5;

/// The trait direction(s) a pressure kind nudges, and the per-unit-intensity
/// magnitude of the nudge. Grounded on the examples in §4.4 ("drought ->
/// +cold/heat resistance reads as the analogous direction for each kind").
fn pressure_directions(kind: PressureKind) -> &'static [(TraitName, f32)] {
    match kind {
        PressureKind::Drought => &[(TraitName::ColdResistance, 0.0), (TraitName::HeatResistance, 0.02)],
        PressureKind::Temperature => &[(TraitName::HeatResistance, 0.015), (TraitName::ColdResistance, -0.005)],
        PressureKind::Humidity => &[(TraitName::PhysicalDefense, 0.005)],
        PressureKind::Radiation => &[(TraitName::PhysicalDefense, 0.02)],
        PressureKind::Predation => &[(TraitName::Locomotion, 0.015), (TraitName::Perception, 0.01)],
        PressureKind::VolcanicEruption => &[(TraitName::ColdResistance, 0.01)],
        PressureKind::Orogeny | PressureKind::EarthquakePeriod => &[],
    }
}

/// Applies one turn of gradual adaptation to `species` in place, returning
/// the event describing the applied deltas (omitted if nothing changed).
/// `niche_overlap` is this species' mean overlap against every other living
/// species (§4.2 `niche::niche_metrics`), raising urgency when the niche is
/// crowded.
pub fn apply(species: &mut Species, pressures: &[PressureDescriptor], generation_count: u32, turn: u64, niche_overlap: f32) -> Option<AdaptationEvent> {
    let urgency = 1.0 + species.plasticity_buffer.unwrap_or(0.0) + niche_overlap.clamp(0.0, 1.0) * NICHE_OVERLAP_URGENCY_WEIGHT;
    let generation_factor = (generation_count as f32).max(1.0).ln_1p();

    let mut deltas: HashMap<TraitName, f32> = HashMap::new();
    for pressure in pressures {
        for &(trait_name, magnitude) in pressure_directions(pressure.kind) {
            let delta = magnitude * f32::from(pressure.intensity) * TIME_SCALE * generation_factor * urgency;
            *deltas.entry(trait_name).or_insert(0.0) += delta;
        }
    }
    deltas.retain(|_, v| v.abs() > 1e-6);
    if deltas.is_empty() {
        return None;
    }

    for (&trait_name, &delta) in &deltas {
        *species.traits.entry(trait_name).or_insert(0.0) += delta;
    }
    let cap = era_for_turn(turn).trait_norm_cap();
    species.clamp_trait_norm(cap);

    Some(AdaptationEvent { lineage_code: species.lineage_code.clone(), turn, kind: AdaptationEventKind::GradualAdaptation, trait_deltas: deltas })
}

/// Geological era boundaries are owned by the caller in a full simulation;
/// this default progression is used only where no explicit era is tracked.
fn era_for_turn(turn: u64) -> Era {
    match turn {
        t if t < 1_000 => Era::Hadean,
        t if t < 5_000 => Era::Archean,
        t if t < 15_000 => Era::Proterozoic,
        t if t < 30_000 => Era::Paleozoic,
        t if t < 60_000 => Era::Mesozoic,
        _ => Era::Cenozoic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primordium_data::species::{DietType, HabitatType, SpeciesStatus};
    use std::collections::HashMap as Map;

    fn species() -> Species {
        Species {
            lineage_code: "Rex".into(),
            parent_code: None,
            genus_code: "Rex".into(),
            common_name: "Test".into(),
            latin_name: "Testus".into(),
            description: String::new(),
            traits: Map::new(),
            hidden_traits: Map::new(),
            morphology: Map::new(),
            organs: Map::new(),
            plasticity_buffer: Some(0.2),
            habitat_type: HabitatType::Terrestrial,
            diet_type: DietType::Herbivore,
            trophic_level: 1.0,
            prey_species: vec![],
            prey_preferences: Map::new(),
            status: SpeciesStatus::Alive,
            created_turn: 0,
            is_background: false,
            hybrid_parent_codes: None,
            hybrid_fertility: None,
            dormant_genes: Map::new(),
        }
    }

    #[test]
    fn drought_pressure_raises_heat_resistance() {
        let mut s = species();
        let pressures =
            vec![PressureDescriptor { kind: PressureKind::Drought, intensity: 8, extent: None, narrative_note: None }];
        let event = apply(&mut s, &pressures, 5, 100, 0.0);
        assert!(event.is_some());
        assert!(s.traits.get(&TraitName::HeatResistance).copied().unwrap_or(0.0) > 0.0);
    }

    #[test]
    fn no_pressures_produces_no_event() {
        let mut s = species();
        let event = apply(&mut s, &[], 5, 100, 0.0);
        assert!(event.is_none());
    }

    #[test]
    fn niche_overlap_raises_adaptation_magnitude() {
        let pressures = vec![PressureDescriptor { kind: PressureKind::Drought, intensity: 8, extent: None, narrative_note: None }];
        let mut crowded = species();
        apply(&mut crowded, &pressures, 5, 100, 1.0);
        let mut uncrowded = species();
        apply(&mut uncrowded, &pressures, 5, 100, 0.0);
        let crowded_delta = crowded.traits.get(&TraitName::HeatResistance).copied().unwrap_or(0.0);
        let uncrowded_delta = uncrowded.traits.get(&TraitName::HeatResistance).copied().unwrap_or(0.0);
        assert!(crowded_delta > uncrowded_delta);
    }

    #[test]
    fn trait_norm_never_exceeds_era_cap() {
        let mut s = species();
        s.traits.insert(TraitName::HeatResistance, 19.9);
        let pressures =
            vec![PressureDescriptor { kind: PressureKind::Drought, intensity: 10, extent: None, narrative_note: None }];
        for _ in 0..50 {
            apply(&mut s, &pressures, 20, 10, 0.0);
        }
        assert!(s.trait_norm() <= Era::Hadean.trait_norm_cap() + 1e-3);
    }
}
