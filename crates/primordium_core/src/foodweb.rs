//! Food-web maintenance (§4.5): prey assignment, replacement of extinct
//! prey, minimum-diversity top-ups, and producer integration, plus the
//! trophic feedback signals folded into next turn's mortality step.

use crate::config::FoodWebConfig;
use primordium_data::species::Species;
use std::collections::{HashMap, HashSet};

/// Trophic feedback handed to next turn's mortality kernel (§4.5).
#[derive(Debug, Clone, Default)]
pub struct TrophicFeedback {
    /// lineage_code -> extra mortality from insufficient prey biomass.
    pub starving_mortality_boost: HashMap<String, f32>,
    /// lineage_code -> extra mortality for consumers with zero living prey.
    pub orphan_mortality_boost: HashMap<String, f32>,
    /// trophic level (rounded) -> scarcity in `[0, 1]`.
    pub scarcity_by_trophic_level: HashMap<u32, f32>,
}

fn habitat_compatible(a: &Species, b: &Species) -> bool {
    a.habitat_type == b.habitat_type
        || matches!(
            (a.habitat_type, b.habitat_type),
            (primordium_data::species::HabitatType::Coastal, primordium_data::species::HabitatType::Marine)
                | (primordium_data::species::HabitatType::Marine, primordium_data::species::HabitatType::Coastal)
                | (primordium_data::species::HabitatType::Coastal, primordium_data::species::HabitatType::Terrestrial)
                | (primordium_data::species::HabitatType::Terrestrial, primordium_data::species::HabitatType::Coastal)
        )
}

fn tiles_overlap(a: &HashSet<(u32, u32)>, b: &HashSet<(u32, u32)>) -> bool {
    !a.is_empty() && !b.is_empty() && a.intersection(b).next().is_some()
}

fn prey_weight(consumer: &Species, candidate: &Species) -> f32 {
    let level_diff = consumer.trophic_level - candidate.trophic_level;
    let level_factor = 1.0 / ((level_diff - 1.0).abs() + 0.5);
    let population_factor = (0.5 + candidate.population() as f32 / 10_000.0).min(1.5);
    level_factor * population_factor
}

fn is_candidate_prey(consumer: &Species, candidate: &Species, occupied: &HashMap<String, HashSet<(u32, u32)>>) -> bool {
    if candidate.lineage_code == consumer.lineage_code || !candidate.is_alive() {
        return false;
    }
    let level_diff = consumer.trophic_level - candidate.trophic_level;
    if !(0.5..=1.5).contains(&level_diff) {
        return false;
    }
    if !habitat_compatible(consumer, candidate) {
        return false;
    }
    let empty = HashSet::new();
    let a = occupied.get(&consumer.lineage_code).unwrap_or(&empty);
    let b = occupied.get(&candidate.lineage_code).unwrap_or(&empty);
    tiles_overlap(a, b)
}

fn biomass_ok(candidate: &Species, min_prey_count: usize, config: &FoodWebConfig, level_diff: f32) -> bool {
    let prey_biomass = candidate.population() as f32 * config.biomass_multiplier;
    let required = min_prey_count as f32 * config.target_band_low.powf(level_diff.max(0.0));
    prey_biomass >= required
}

/// Sorts replacement candidates by niche overlap ascending (§4.2: prefer
/// prey that isn't already saturating another consumer's niche), tie-broken
/// by most-recently-emerged first.
fn sort_candidates(candidates: &mut [&Species], niche_overlap: &HashMap<String, f32>) {
    candidates.sort_by(|a, b| {
        let oa = niche_overlap.get(&a.lineage_code).copied().unwrap_or(0.0);
        let ob = niche_overlap.get(&b.lineage_code).copied().unwrap_or(0.0);
        oa.partial_cmp(&ob).unwrap_or(std::cmp::Ordering::Equal).then_with(|| b.created_turn.cmp(&a.created_turn))
    });
}

/// Assigns or repairs `consumer.prey_species`/`prey_preferences` in place.
/// `all_species` excludes `consumer` itself conceptually but may include it
/// (filtered internally); `occupied` maps lineage code to the tile set it
/// currently occupies; `niche_overlap` is each species' mean niche overlap
/// (§4.2 `niche::niche_metrics`), used to break ties among replacement
/// candidates.
pub fn assign_prey(
    consumer: &mut Species,
    all_species: &[Species],
    occupied: &HashMap<String, HashSet<(u32, u32)>>,
    config: &FoodWebConfig,
    niche_overlap: &HashMap<String, f32>,
) {
    if consumer.trophic_level < 2.0 {
        return;
    }

    let living_prey: Vec<&Species> =
        consumer.prey_species.iter().filter_map(|code| all_species.iter().find(|s| &s.lineage_code == code && s.is_alive())).collect();
    let living_codes: HashSet<String> = living_prey.iter().map(|s| s.lineage_code.clone()).collect();

    if consumer.prey_species.is_empty() || living_codes.is_empty() {
        let candidates: Vec<&Species> = all_species.iter().filter(|c| is_candidate_prey(consumer, c, occupied)).collect();
        apply_candidates(consumer, &candidates);
        return;
    }

    let original_len = consumer.prey_species.len();
    let min_required = FoodWebConfig::min_prey_count(consumer.trophic_level);

    if living_codes.len() < original_len {
        // Some, but not all, prey went extinct: always seek one replacement
        // per lost prey, independent of whether the survivors already meet
        // the per-trophic-level minimum.
        consumer.prey_species.retain(|code| living_codes.contains(code));
        let lost = original_len - consumer.prey_species.len();
        let already: HashSet<String> = consumer.prey_species.iter().cloned().collect();
        let mut candidates: Vec<&Species> =
            all_species.iter().filter(|c| !already.contains(&c.lineage_code) && is_candidate_prey(consumer, c, occupied)).collect();
        sort_candidates(&mut candidates, niche_overlap);
        for c in candidates.into_iter().take(lost) {
            consumer.prey_species.push(c.lineage_code.clone());
        }
        recompute_preferences(consumer, all_species);
        return;
    }

    if consumer.prey_species.len() < min_required {
        let already: HashSet<String> = consumer.prey_species.iter().cloned().collect();
        let mut candidates: Vec<&Species> = all_species
            .iter()
            .filter(|c| !already.contains(&c.lineage_code) && is_candidate_prey(consumer, c, occupied))
            .filter(|c| biomass_ok(c, min_required, config, consumer.trophic_level - c.trophic_level))
            .collect();
        sort_candidates(&mut candidates, niche_overlap);
        for c in candidates {
            if consumer.prey_species.len() >= min_required {
                break;
            }
            consumer.prey_species.push(c.lineage_code.clone());
        }
        recompute_preferences(consumer, all_species);
    }
}

fn apply_candidates(consumer: &mut Species, candidates: &[&Species]) {
    consumer.prey_species = candidates.iter().map(|c| c.lineage_code.clone()).collect();
    let mut preferences = HashMap::new();
    let total: f32 = candidates.iter().map(|c| prey_weight(consumer, c)).sum();
    if total > 1e-9 {
        for c in candidates {
            preferences.insert(c.lineage_code.clone(), prey_weight(consumer, c) / total);
        }
    }
    consumer.prey_preferences = preferences;
}

fn recompute_preferences(consumer: &mut Species, all_species: &[Species]) {
    let prey: Vec<&Species> = consumer.prey_species.iter().filter_map(|c| all_species.iter().find(|s| &s.lineage_code == c)).collect();
    apply_candidates(consumer, &prey);
}

/// Whether a newly emerged producer should be integrated as prey for an
/// existing consumer this turn (§4.5 "newly emerged producers").
#[must_use]
pub fn should_integrate_producer(
    consumer: &Species,
    producer: &Species,
    occupied: &HashMap<String, HashSet<(u32, u32)>>,
    config: &FoodWebConfig,
) -> bool {
    let level_diff = consumer.trophic_level - producer.trophic_level;
    if !(0.5..=1.5).contains(&level_diff) {
        return false;
    }
    if !habitat_compatible(consumer, producer) {
        return false;
    }
    let empty = HashSet::new();
    let a = occupied.get(&consumer.lineage_code).unwrap_or(&empty);
    let b = occupied.get(&producer.lineage_code).unwrap_or(&empty);
    if !tiles_overlap(a, b) {
        return false;
    }
    biomass_ok(producer, FoodWebConfig::min_prey_count(consumer.trophic_level), config, level_diff)
}

/// Computes the trophic feedback signals for next turn's mortality step.
#[must_use]
pub fn trophic_feedback(species: &[Species], config: &FoodWebConfig) -> TrophicFeedback {
    let mut feedback = TrophicFeedback::default();
    let mut scarcity_totals: HashMap<u32, (f32, u32)> = HashMap::new();

    for consumer in species.iter().filter(|s| s.is_alive() && s.trophic_level >= 2.0) {
        let living_prey: Vec<&Species> =
            consumer.prey_species.iter().filter_map(|code| species.iter().find(|s| &s.lineage_code == code && s.is_alive())).collect();

        if living_prey.is_empty() {
            feedback.orphan_mortality_boost.insert(consumer.lineage_code.clone(), 0.25);
        } else {
            let total_prey_biomass: f32 = living_prey.iter().map(|p| p.population() as f32 * config.biomass_multiplier).sum();
            let required = FoodWebConfig::min_prey_count(consumer.trophic_level) as f32 * config.target_band_low;
            if total_prey_biomass < required {
                let deficit = ((required - total_prey_biomass) / required.max(1.0)).clamp(0.0, 1.0);
                feedback.starving_mortality_boost.insert(consumer.lineage_code.clone(), deficit * 0.2);
            }
        }

        let level_bucket = consumer.trophic_level.round() as u32;
        let min_required = FoodWebConfig::min_prey_count(consumer.trophic_level);
        let present = living_prey.len();
        let scarcity = if min_required == 0 { 0.0 } else { 1.0 - (present as f32 / min_required as f32).min(1.0) };
        let entry = scarcity_totals.entry(level_bucket).or_insert((0.0, 0));
        entry.0 += scarcity;
        entry.1 += 1;
    }

    for (level, (sum, count)) in scarcity_totals {
        feedback.scarcity_by_trophic_level.insert(level, sum / count.max(1) as f32);
    }

    feedback
}

#[cfg(test)]
mod tests {
    use super::*;
    use primordium_data::species::{DietType, HabitatType, SpeciesStatus};
    use std::collections::HashMap as Map;

    fn species(code: &str, trophic: f32, population: f64, habitat: HabitatType) -> Species {
        let mut morphology = Map::new();
        morphology.insert(primordium_data::species::MorphologyStat::PopulationCount, population);
        Species {
            lineage_code: code.into(),
            parent_code: None,
            genus_code: code.into(),
            common_name: code.into(),
            latin_name: format!("{code} latinus"),
            description: String::new(),
            traits: Map::new(),
            hidden_traits: Map::new(),
            morphology,
            organs: Map::new(),
            plasticity_buffer: None,
            habitat_type: habitat,
            diet_type: if trophic < 2.0 { DietType::Autotroph } else { DietType::Carnivore },
            trophic_level: trophic,
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

    fn occ(codes: &[&str], tiles: &[(u32, u32)]) -> HashMap<String, HashSet<(u32, u32)>> {
        codes.iter().map(|c| (c.to_string(), tiles.iter().copied().collect())).collect()
    }

    #[test]
    fn assigns_prey_for_empty_predator() {
        let mut consumer = species("Wolf", 2.5, 500.0, HabitatType::Terrestrial);
        let prey = species("Rabbit", 1.0, 5_000.0, HabitatType::Terrestrial);
        let all = vec![consumer.clone(), prey];
        let occupied = occ(&["Wolf", "Rabbit"], &[(0, 0)]);
        assign_prey(&mut consumer, &all, &occupied, &FoodWebConfig::default(), &HashMap::new());
        assert_eq!(consumer.prey_species, vec!["Rabbit".to_string()]);
        assert!((consumer.prey_preferences["Rabbit"] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn extinct_prey_is_dropped() {
        let mut consumer = species("Wolf", 2.5, 500.0, HabitatType::Terrestrial);
        consumer.prey_species = vec!["Ghost".to_string()];
        let mut ghost = species("Ghost", 1.0, 0.0, HabitatType::Terrestrial);
        ghost.status = SpeciesStatus::Extinct;
        let all = vec![consumer.clone(), ghost];
        let occupied = occ(&["Wolf", "Ghost"], &[(0, 0)]);
        assign_prey(&mut consumer, &all, &occupied, &FoodWebConfig::default(), &HashMap::new());
        assert!(!consumer.prey_species.contains(&"Ghost".to_string()));
    }

    #[test]
    fn partial_extinction_replaces_even_above_minimum() {
        // Trophic 3.0 needs only 2 prey at minimum, but the consumer starts
        // with 3 and loses 1 to extinction — a replacement should still be
        // sought for the lost prey even though the 2 survivors already
        // satisfy the minimum.
        let mut consumer = species("Bear", 3.0, 500.0, HabitatType::Terrestrial);
        consumer.prey_species = vec!["Deer".to_string(), "Hare".to_string(), "Ghost".to_string()];
        let deer = species("Deer", 2.0, 1_000.0, HabitatType::Terrestrial);
        let hare = species("Hare", 2.0, 1_000.0, HabitatType::Terrestrial);
        let mut ghost = species("Ghost", 2.0, 0.0, HabitatType::Terrestrial);
        ghost.status = SpeciesStatus::Extinct;
        let mut replacement = species("Fox", 2.0, 1_000.0, HabitatType::Terrestrial);
        replacement.created_turn = 5;
        let all = vec![consumer.clone(), deer, hare, ghost, replacement];
        let occupied = occ(&["Bear", "Deer", "Hare", "Ghost", "Fox"], &[(0, 0)]);
        assign_prey(&mut consumer, &all, &occupied, &FoodWebConfig::default(), &HashMap::new());
        assert!(!consumer.prey_species.contains(&"Ghost".to_string()));
        assert_eq!(consumer.prey_species.len(), 3);
        assert!(consumer.prey_species.contains(&"Fox".to_string()));
    }

    #[test]
    fn replacement_prefers_the_less_niche_saturated_candidate() {
        let mut consumer = species("Owl", 3.0, 500.0, HabitatType::Terrestrial);
        consumer.prey_species = vec!["Deer".to_string(), "Ghost".to_string()];
        let deer = species("Deer", 2.0, 1_000.0, HabitatType::Terrestrial);
        let mut ghost = species("Ghost", 2.0, 0.0, HabitatType::Terrestrial);
        ghost.status = SpeciesStatus::Extinct;
        let crowded = species("Vole", 2.0, 1_000.0, HabitatType::Terrestrial);
        let uncrowded = species("Mouse", 2.0, 1_000.0, HabitatType::Terrestrial);
        let all = vec![consumer.clone(), deer, ghost, crowded, uncrowded];
        let occupied = occ(&["Owl", "Deer", "Ghost", "Vole", "Mouse"], &[(0, 0)]);
        let mut niche_overlap = HashMap::new();
        niche_overlap.insert("Vole".to_string(), 0.9);
        niche_overlap.insert("Mouse".to_string(), 0.1);

        assign_prey(&mut consumer, &all, &occupied, &FoodWebConfig::default(), &niche_overlap);

        assert!(consumer.prey_species.contains(&"Mouse".to_string()));
        assert!(!consumer.prey_species.contains(&"Vole".to_string()));
        assert_eq!(consumer.prey_species.len(), 2);
    }

    #[test]
    fn orphan_consumer_gets_mortality_boost() {
        let consumer = species("Wolf", 2.5, 500.0, HabitatType::Terrestrial);
        let feedback = trophic_feedback(&[consumer], &FoodWebConfig::default());
        assert!(feedback.orphan_mortality_boost.contains_key("Wolf"));
    }
}
