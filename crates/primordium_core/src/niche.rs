//! Niche overlap and competition helper (§4.2): for `N` species produces a
//! symmetric `N x N` overlap matrix blending embedding similarity,
//! ecological rule bonuses and tile-occupancy overlap, then reduces it to
//! per-species `niche_overlap` / `resource_saturation` metrics.
//!
//! Grounded on the Python original's `NicheAnalyzer`
//! (`examples/original_source/backend/app/services/species/niche.py`):
//! cosine similarity over a feature vector, rule-based bonuses keyed off
//! structured attributes (never keyword matching), then a tile-overlap
//! factor that suppresses competition between species that never share
//! ground.

use primordium_data::species::{HiddenTraitName, MorphologyStat, Species};
use std::collections::HashSet;

pub const EMBEDDING_DIM: usize = 64;

const SAME_TROPHIC_BUCKET_BONUS: f32 = 0.12;
const SAME_HABITAT_BONUS: f32 = 0.10;
const SHARED_LINEAGE_PREFIX_BONUS: f32 = 0.15;
const SIMILAR_SIZE_BONUS: f32 = 0.06;
const TILE_OVERLAP_FLOOR: f32 = 0.1;
const MAX_RULE_BONUS: f32 = 0.30;

const HIDDEN_TRAITS: [HiddenTraitName; 6] = [
    HiddenTraitName::Plasticity,
    HiddenTraitName::Dormancy,
    HiddenTraitName::Symbiosis,
    HiddenTraitName::Bioluminescence,
    HiddenTraitName::Venom,
    HiddenTraitName::Camouflage,
];

fn morph(species: &Species, stat: MorphologyStat, default: f64) -> f64 {
    species.morphology.get(&stat).copied().unwrap_or(default)
}

/// Builds a deterministic 64-dim feature vector from a species' structured
/// attributes when a real text embedder is unavailable. Unlike the
/// production embedder this never changes between runs for the same
/// species, which is what makes niche overlap reproducible in tests.
#[must_use]
pub fn fallback_embedding(species: &Species) -> [f32; EMBEDDING_DIM] {
    let mut v = [0.0f32; EMBEDDING_DIM];

    v[0] = (morph(species, MorphologyStat::BodyLengthCm, 1.0) + 1.0).log10() as f32;
    v[1] = (morph(species, MorphologyStat::BodyWeightKg, 1.0) + 1.0).log10() as f32;
    v[2] = morph(species, MorphologyStat::MetabolicRate, 3.0) as f32 / 10.0;
    v[3] = morph(species, MorphologyStat::LifespanDays, 365.0) as f32 / 36_500.0;
    v[4] = morph(species, MorphologyStat::GenerationTimeDays, 365.0) as f32 / 3650.0;

    for (i, trait_name) in HIDDEN_TRAITS.iter().enumerate() {
        v[10 + i] = species.hidden_traits.get(trait_name).copied().unwrap_or(5.0) / 10.0;
    }

    v[20] = species.trophic_level / 5.0;
    v[21] = f32::from(species.habitat_type == primordium_data::species::HabitatType::Marine);
    v[22] = f32::from(species.habitat_type == primordium_data::species::HabitatType::Terrestrial);
    v[23] = f32::from(species.habitat_type == primordium_data::species::HabitatType::Freshwater);
    v[24] = f32::from(species.habitat_type == primordium_data::species::HabitatType::Aerial);
    v[25] = species.active_organ_count() as f32 / 10.0;

    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na <= 0.0 || nb <= 0.0 {
        return 0.0;
    }
    (dot / (na * nb)).clamp(-1.0, 1.0)
}

/// Same functional group if trophic levels are within half a level of
/// each other (§4.2 "same trophic-level bucket").
fn same_trophic_bucket(a: f32, b: f32) -> bool {
    (a - b).abs() < 0.5
}

fn body_size_cm(species: &Species) -> f32 {
    (morph(species, MorphologyStat::BodyLengthCm, 0.01)).max(0.001) as f32
}

/// +0.12/+0.10/+0.15/+0.06 rule bonuses, capped at +0.30 total (§4.2).
fn ecological_rule_bonus(a: &Species, b: &Species) -> f32 {
    let mut bonus = 0.0;
    if same_trophic_bucket(a.trophic_level, b.trophic_level) {
        bonus += SAME_TROPHIC_BUCKET_BONUS;
    }
    if a.habitat_type == b.habitat_type {
        bonus += SAME_HABITAT_BONUS;
    }
    let shared_genus = a.genus_code == b.genus_code
        || Species::is_strict_prefix(&a.genus_code, &b.genus_code)
        || Species::is_strict_prefix(&b.genus_code, &a.genus_code);
    if shared_genus {
        bonus += SHARED_LINEAGE_PREFIX_BONUS;
    }
    let (small, large) = {
        let sa = body_size_cm(a);
        let sb = body_size_cm(b);
        if sa < sb { (sa, sb) } else { (sb, sa) }
    };
    if large / small <= 2.0 {
        bonus += SIMILAR_SIZE_BONUS;
    }
    bonus.min(MAX_RULE_BONUS)
}

/// `|intersection| / |union|` of occupied-tile sets, floored at 0.1 when
/// there is no overlap at all so unrelated species still compete a little
/// for background resources (§4.2).
fn tile_overlap_factor(a: &HashSet<(u32, u32)>, b: &HashSet<(u32, u32)>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return TILE_OVERLAP_FLOOR;
    }
    let union = a.union(b).count();
    if union == 0 {
        return TILE_OVERLAP_FLOOR;
    }
    let intersection = a.intersection(b).count();
    if intersection == 0 {
        return TILE_OVERLAP_FLOOR;
    }
    intersection as f32 / union as f32
}

/// Per-species niche metrics derived from the overlap matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NicheMetrics {
    pub niche_overlap: f32,
    pub resource_saturation: f32,
}

/// Computes the full `N x N` overlap matrix for a species set, each cell
/// combining embedding similarity, rule bonuses, and tile-overlap scaling.
#[must_use]
pub fn overlap_matrix(species: &[Species], occupied_tiles: &[HashSet<(u32, u32)>]) -> Vec<Vec<f32>> {
    let n = species.len();
    let embeddings: Vec<[f32; EMBEDDING_DIM]> = species.iter().map(fallback_embedding).collect();
    let mut matrix = vec![vec![0.0f32; n]; n];

    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let base = cosine_similarity(&embeddings[i], &embeddings[j]);
            let with_bonus = (base + ecological_rule_bonus(&species[i], &species[j])).min(1.0);
            let factor = tile_overlap_factor(&occupied_tiles[i], &occupied_tiles[j]);
            let value = with_bonus * factor;
            matrix[i][j] = value;
            matrix[j][i] = value;
        }
    }
    matrix
}

/// Reduces the overlap matrix to per-species metrics: `niche_overlap` is
/// the mean overlap against every other species, `resource_saturation` is
/// population relative to an even split of `carrying_capacity` across all
/// species, capped at 2.0 (§4.2).
#[must_use]
pub fn niche_metrics(species: &[Species], matrix: &[Vec<f32>], carrying_capacity: f64) -> Vec<NicheMetrics> {
    let n = species.len();
    if n == 0 {
        return Vec::new();
    }
    let per_species_capacity = carrying_capacity.max(1.0) / n as f64;

    (0..n)
        .map(|i| {
            let niche_overlap = if n > 1 {
                let sum: f32 = matrix[i].iter().sum::<f32>() - 1.0;
                sum / (n - 1) as f32
            } else {
                0.0
            };
            let saturation = (species[i].population() / per_species_capacity.max(1.0)).min(2.0) as f32;
            NicheMetrics { niche_overlap, resource_saturation: saturation }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use primordium_data::species::{DietType, HabitatType, SpeciesStatus};
    use std::collections::HashMap;

    fn species_with(lineage_code: &str, genus_code: &str, trophic_level: f32, habitat: HabitatType) -> Species {
        Species {
            lineage_code: lineage_code.into(),
            parent_code: None,
            genus_code: genus_code.into(),
            common_name: "Test".into(),
            latin_name: "Testus".into(),
            description: String::new(),
            traits: HashMap::new(),
            hidden_traits: HashMap::new(),
            morphology: HashMap::new(),
            organs: HashMap::new(),
            plasticity_buffer: None,
            habitat_type: habitat,
            diet_type: DietType::Omnivore,
            trophic_level,
            prey_species: vec![],
            prey_preferences: HashMap::new(),
            status: SpeciesStatus::Alive,
            created_turn: 0,
            is_background: false,
            hybrid_parent_codes: None,
            hybrid_fertility: None,
            dormant_genes: HashMap::new(),
        }
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = [1.0f32, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn tile_overlap_floors_at_one_tenth_for_disjoint_ranges() {
        let a: HashSet<(u32, u32)> = [(0, 0), (1, 0)].into_iter().collect();
        let b: HashSet<(u32, u32)> = [(5, 5), (6, 5)].into_iter().collect();
        assert!((tile_overlap_factor(&a, &b) - TILE_OVERLAP_FLOOR).abs() < 1e-6);
    }

    #[test]
    fn ecological_rule_bonus_is_capped() {
        let a = species_with("A", "A", 2.0, HabitatType::Terrestrial);
        let b = species_with("A1", "A", 2.0, HabitatType::Terrestrial);
        assert!(ecological_rule_bonus(&a, &b) <= MAX_RULE_BONUS + 1e-6);
    }

    #[test]
    fn niche_overlap_excludes_self_similarity() {
        let species = vec![
            species_with("A", "A", 1.0, HabitatType::Terrestrial),
            species_with("B", "B", 4.0, HabitatType::Marine),
        ];
        let tiles = vec![HashSet::new(), HashSet::new()];
        let matrix = overlap_matrix(&species, &tiles);
        let metrics = niche_metrics(&species, &matrix, 1000.0);
        assert_eq!(metrics.len(), 2);
        assert!(metrics[0].niche_overlap <= 1.0);
    }
}
