//! Hybridization (§4.4 "Hybridization"): genetic-distance gated crossing of
//! two living species into a new hybrid lineage, plus forced "chimera"
//! crossing that ignores the distance gate.

use crate::lineage_registry::LineageRegistry;
use crate::niche::{cosine_similarity, fallback_embedding};
use primordium_data::species::{DietType, HabitatType, Organ, OrganCategory, Species, SpeciesStatus, TraitName};
use rand::Rng;
use std::collections::HashMap;

const WITHIN_GENUS_THRESHOLD: f32 = 0.5;
const CROSS_GENUS_THRESHOLD: f32 = WITHIN_GENUS_THRESHOLD * 0.6;
const CROSS_GENUS_FERTILITY_CAP: f32 = 0.3;
const CHIMERA_FERTILITY_CAP: f32 = 0.15;

/// Genetic distance in `[0, 1]`, derived from the same fallback embedding
/// used by the niche-overlap helper (`1 - cosine_similarity`, halved so an
/// opposite-facing pair maps to the maximum distance of 1).
#[must_use]
pub fn genetic_distance(a: &Species, b: &Species) -> f32 {
    let sim = cosine_similarity(&fallback_embedding(a), &fallback_embedding(b));
    ((1.0 - sim) / 2.0).clamp(0.0, 1.0)
}

fn threshold_for(a: &Species, b: &Species) -> f32 {
    if a.genus_code == b.genus_code {
        WITHIN_GENUS_THRESHOLD
    } else {
        CROSS_GENUS_THRESHOLD
    }
}

/// Whether `a` and `b` may hybridize unforced: distinct, both alive, and
/// within the genus-appropriate distance threshold.
#[must_use]
pub fn is_hybridizable(a: &Species, b: &Species) -> bool {
    if a.lineage_code == b.lineage_code || !a.is_alive() || !b.is_alive() {
        return false;
    }
    genetic_distance(a, b) < threshold_for(a, b)
}

/// Fertility from genetic distance, capped for cross-genus pairs (§4.4).
#[must_use]
pub fn fertility(a: &Species, b: &Species) -> f32 {
    let threshold = threshold_for(a, b);
    let d = genetic_distance(a, b);
    let base = (1.0 - (d / threshold).powf(0.7)).max(0.0);
    if a.genus_code == b.genus_code {
        base
    } else {
        base.min(CROSS_GENUS_FERTILITY_CAP)
    }
}

/// Chooses which parent's code becomes the hybrid's `parent_code`: lower
/// trophic level, ties broken by earlier creation turn, then lineage-code
/// order (§4.4).
fn primary_parent<'a>(a: &'a Species, b: &'a Species) -> &'a Species {
    if (a.trophic_level - b.trophic_level).abs() > 1e-6 {
        if a.trophic_level < b.trophic_level { a } else { b }
    } else if a.created_turn != b.created_turn {
        if a.created_turn < b.created_turn { a } else { b }
    } else if a.lineage_code <= b.lineage_code {
        a
    } else {
        b
    }
}

fn blend_trait<R: Rng + ?Sized>(a: f32, b: f32, rng: &mut R) -> f32 {
    let roll: f32 = rng.gen();
    let base = if roll < 0.2 {
        a.max(b) * rng.gen_range(1.1..1.2)
    } else if roll < 0.6 {
        a.max(b)
    } else if roll < 0.9 {
        (a + b) / 2.0
    } else {
        a.min(b)
    };
    let spread = (a - b).abs();
    let noise = rng.gen_range(-0.1..0.1) * spread;
    (base + noise).max(0.0)
}

/// Crosses two species into a new hybrid species with a fresh lineage code,
/// returning `None` if `force` is false and the pair is not hybridizable.
/// With `force` set, distance is ignored and fertility is capped at
/// [`CHIMERA_FERTILITY_CAP`] (the "chimera" path).
pub fn cross<R: Rng + ?Sized>(a: &Species, b: &Species, force: bool, registry: &mut LineageRegistry, turn: u64, rng: &mut R) -> Option<Species> {
    if !force && !is_hybridizable(a, b) {
        return None;
    }

    let primary = primary_parent(a, b);
    let secondary = if std::ptr::eq(primary, a) { b } else { a };
    let child_code = registry.next_hybrid_code(&primary.lineage_code);

    let mut traits = HashMap::new();
    for &t in &TraitName::ALL {
        let av = a.traits.get(&t).copied().unwrap_or(0.0);
        let bv = b.traits.get(&t).copied().unwrap_or(0.0);
        if av == 0.0 && bv == 0.0 {
            continue;
        }
        traits.insert(t, blend_trait(av, bv, rng));
    }

    let mut morphology = HashMap::new();
    for (&stat, &av) in &a.morphology {
        let bv = b.morphology.get(&stat).copied().unwrap_or(av);
        morphology.insert(stat, (av + bv) / 2.0);
    }

    let mut organs = HashMap::new();
    for (&category, organ) in &primary.organs {
        organs.insert(category, Organ::new(organ.organ_type.clone()));
    }
    for (&category, organ) in &secondary.organs {
        organs.entry(category).or_insert_with(|| Organ::new(organ.organ_type.clone()));
    }

    let raw_fertility = if force { fertility(a, b).min(CHIMERA_FERTILITY_CAP) } else { fertility(a, b) };

    Some(Species {
        lineage_code: child_code,
        parent_code: Some(primary.lineage_code.clone()),
        genus_code: primary.genus_code.clone(),
        common_name: format!("{} x {} hybrid", primary.common_name, secondary.common_name),
        latin_name: format!("{} x {}", primary.latin_name, secondary.latin_name),
        description: if force { "forced chimera cross".to_string() } else { "natural hybrid".to_string() },
        traits,
        hidden_traits: HashMap::new(),
        morphology,
        organs,
        plasticity_buffer: a.plasticity_buffer.or(b.plasticity_buffer),
        habitat_type: compatible_habitat(a.habitat_type, b.habitat_type),
        diet_type: compatible_diet(a.diet_type, b.diet_type),
        trophic_level: (a.trophic_level + b.trophic_level) / 2.0,
        prey_species: Vec::new(),
        prey_preferences: HashMap::new(),
        status: SpeciesStatus::Alive,
        created_turn: turn,
        is_background: a.is_background && b.is_background,
        hybrid_parent_codes: Some([a.lineage_code.clone(), b.lineage_code.clone()]),
        hybrid_fertility: Some(raw_fertility),
        dormant_genes: HashMap::new(),
    })
}

fn compatible_habitat(a: HabitatType, b: HabitatType) -> HabitatType {
    if a == b {
        a
    } else {
        HabitatType::Amphibious
    }
}

fn compatible_diet(a: DietType, b: DietType) -> DietType {
    if a == b { a } else { DietType::Omnivore }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn species(code: &str, genus: &str, trophic: f32, created_turn: u64) -> Species {
        let mut traits = Map::new();
        traits.insert(TraitName::Locomotion, 5.0);
        Species {
            lineage_code: code.into(),
            parent_code: None,
            genus_code: genus.into(),
            common_name: code.into(),
            latin_name: format!("{code} latinus"),
            description: String::new(),
            traits,
            hidden_traits: Map::new(),
            morphology: Map::new(),
            organs: Map::new(),
            plasticity_buffer: None,
            habitat_type: HabitatType::Terrestrial,
            diet_type: DietType::Herbivore,
            trophic_level: trophic,
            prey_species: vec![],
            prey_preferences: Map::new(),
            status: SpeciesStatus::Alive,
            created_turn,
            is_background: false,
            hybrid_parent_codes: None,
            hybrid_fertility: None,
            dormant_genes: Map::new(),
        }
    }

    #[test]
    fn identical_species_are_hybridizable_within_genus() {
        let a = species("Rex", "Rex", 1.0, 0);
        let b = species("Rexa", "Rex", 1.0, 1);
        assert!(is_hybridizable(&a, &b));
    }

    #[test]
    fn self_pair_is_never_hybridizable() {
        let a = species("Rex", "Rex", 1.0, 0);
        assert!(!is_hybridizable(&a, &a));
    }

    #[test]
    fn primary_parent_prefers_lower_trophic_level() {
        let a = species("A", "A", 3.0, 0);
        let b = species("B", "B", 1.0, 0);
        assert_eq!(primary_parent(&a, &b).lineage_code, "B");
    }

    #[test]
    fn cross_produces_a_new_unique_lineage_code() {
        let mut registry = LineageRegistry::new();
        registry.register_founder("Rex").unwrap();
        registry.register_founder("Foxa").unwrap();
        let a = species("Rex", "Rex", 1.0, 0);
        let b = species("Foxa", "Rex", 1.0, 1);
        let mut rng = rand::thread_rng();
        let child = cross(&a, &b, false, &mut registry, 10, &mut rng);
        assert!(child.is_some());
        assert_eq!(child.unwrap().lineage_code, "Rexh1");
    }

    #[test]
    fn chimera_cross_forces_low_fertility_cap() {
        let mut registry = LineageRegistry::new();
        registry.register_founder("Rex").unwrap();
        registry.register_founder("Owla").unwrap();
        let a = species("Rex", "Rex", 1.0, 0);
        let b = species("Owla", "Owl", 5.0, 0);
        let mut rng = rand::thread_rng();
        let child = cross(&a, &b, true, &mut registry, 10, &mut rng).unwrap();
        assert!(child.hybrid_fertility.unwrap() <= CHIMERA_FERTILITY_CAP + 1e-6);
    }
}
