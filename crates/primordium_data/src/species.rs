//! Species records: identity, traits, organs, morphology and diet/habitat.
//!
//! Trait and organ axes are closed enums rather than free-form strings,
//! per the re-architecture note in the design doc: a dynamic attribute
//! mapping keyed by an arbitrary string invites typos and unbounded growth,
//! while a closed enum plus a fixed-arity value vector keeps the trait
//! space auditable and lets the tensor layer index it by position.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The nine abstract trait axes every species carries a scalar for.
///
/// Named after the energy-cost weights of the auto-tradeoff calculator
/// (`primordium_core::speciation::tradeoff`), which is where their relative
/// costs matter most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraitName {
    Locomotion,
    Intelligence,
    ReproductiveRate,
    ColdResistance,
    HeatResistance,
    PhysicalDefense,
    Perception,
    Sociality,
    BodySize,
}

impl TraitName {
    pub const ALL: [TraitName; 9] = [
        TraitName::Locomotion,
        TraitName::Intelligence,
        TraitName::ReproductiveRate,
        TraitName::ColdResistance,
        TraitName::HeatResistance,
        TraitName::PhysicalDefense,
        TraitName::Perception,
        TraitName::Sociality,
        TraitName::BodySize,
    ];
}

/// Hidden traits are not directly selected on but gate dormant-gene activation
/// and plasticity-driven adaptation urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HiddenTraitName {
    Plasticity,
    Dormancy,
    Symbiosis,
    Bioluminescence,
    Venom,
    Camouflage,
}

/// Morphological statistics. Population count is the only integer-valued
/// member; it is still stored as `f64` in the map for uniformity and
/// rounded/clamped at the edges where it is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MorphologyStat {
    PopulationCount,
    BodyLengthCm,
    BodyWeightKg,
    LifespanDays,
    MetabolicRate,
    GenerationTimeDays,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrganCategory {
    Sensory,
    Locomotion,
    Digestive,
    Defense,
    Reproductive,
    Metabolic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrganEvolutionStage {
    Vestigial = 1,
    Developing = 2,
    Functional = 3,
    Specialized = 4,
}

/// A single organ record within one [`OrganCategory`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organ {
    pub organ_type: String,
    pub parameters: HashMap<String, f32>,
    pub evolution_stage: OrganEvolutionStage,
    pub evolution_progress: f32,
    pub active: bool,
}

impl Organ {
    pub fn new(organ_type: impl Into<String>) -> Self {
        Self {
            organ_type: organ_type.into(),
            parameters: HashMap::new(),
            evolution_stage: OrganEvolutionStage::Vestigial,
            evolution_progress: 0.0,
            active: true,
        }
    }
}

/// Maximum number of active organ entries a species may carry (§3 invariant).
pub const MAX_ACTIVE_ORGANS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HabitatType {
    Marine,
    DeepSea,
    Coastal,
    Freshwater,
    Amphibious,
    Terrestrial,
    Aerial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DietType {
    Autotroph,
    Herbivore,
    Carnivore,
    Omnivore,
    Detritivore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeciesStatus {
    Alive,
    Extinct,
}

/// Geological era, used only to look up the trait-vector L2 cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Era {
    Hadean,
    Archean,
    Proterozoic,
    Paleozoic,
    Mesozoic,
    Cenozoic,
}

impl Era {
    /// Bound on the L2 norm of a species' trait vector for this era (§3).
    #[must_use]
    pub fn trait_norm_cap(self) -> f32 {
        match self {
            Era::Hadean => 20.0,
            Era::Archean => 30.0,
            Era::Proterozoic => 45.0,
            Era::Paleozoic => 60.0,
            Era::Mesozoic => 80.0,
            Era::Cenozoic => 100.0,
        }
    }

    /// Mortality scaling factor: later eras are more ecologically stable,
    /// so the same raw mortality signal produces less death.
    #[must_use]
    pub fn mortality_scale(self) -> f32 {
        match self {
            Era::Hadean => 1.3,
            Era::Archean => 1.2,
            Era::Proterozoic => 1.1,
            Era::Paleozoic => 1.0,
            Era::Mesozoic => 0.92,
            Era::Cenozoic => 0.85,
        }
    }
}

/// An append-only record of a trait or organ potential that has not yet
/// crossed its activation threshold. Never participates in per-turn
/// tensors — consulted only by the speciation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DormantGene {
    pub potential_value: f32,
    pub activation_threshold: f32,
    pub pressure_types: Vec<crate::pressure::PressureKind>,
    pub exposure_count: u32,
    pub activated: bool,
}

/// A single evolving lineage in the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Species {
    pub lineage_code: String,
    pub parent_code: Option<String>,
    pub genus_code: String,

    pub common_name: String,
    pub latin_name: String,
    pub description: String,

    pub traits: HashMap<TraitName, f32>,
    pub hidden_traits: HashMap<HiddenTraitName, f32>,
    pub morphology: HashMap<MorphologyStat, f64>,
    pub organs: HashMap<OrganCategory, Organ>,

    pub plasticity_buffer: Option<f32>,
    pub habitat_type: HabitatType,
    pub diet_type: DietType,
    pub trophic_level: f32,
    pub prey_species: Vec<String>,
    pub prey_preferences: HashMap<String, f32>,

    pub status: SpeciesStatus,
    pub created_turn: u64,
    pub is_background: bool,

    pub hybrid_parent_codes: Option<[String; 2]>,
    pub hybrid_fertility: Option<f32>,
    pub dormant_genes: HashMap<String, DormantGene>,
}

/// Background species (low population) are updated with simpler rules and
/// are not eligible for expensive AI-assisted steps.
pub const BACKGROUND_POPULATION_THRESHOLD: f64 = 25.0;

impl Species {
    /// A lineage code is valid iff it matches `[A-Z][a-z0-9]*`.
    #[must_use]
    pub fn is_valid_lineage_code(code: &str) -> bool {
        let mut chars = code.chars();
        match chars.next() {
            Some(c) if c.is_ascii_uppercase() => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    }

    /// `parent` is a strict prefix of `child` and not equal to it.
    #[must_use]
    pub fn is_strict_prefix(parent: &str, child: &str) -> bool {
        parent != child && child.starts_with(parent)
    }

    /// The genus code of a founder lineage is its first alphabetic run,
    /// e.g. `"Rex"` -> `"Rex"`; for a derived lineage the genus is inherited
    /// unchanged by convention (callers copy `parent.genus_code`).
    #[must_use]
    pub fn founder_genus_code(lineage_code: &str) -> String {
        lineage_code
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect()
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        matches!(self.status, SpeciesStatus::Alive)
    }

    #[must_use]
    pub fn population(&self) -> f64 {
        self.morphology
            .get(&MorphologyStat::PopulationCount)
            .copied()
            .unwrap_or(0.0)
    }

    #[must_use]
    pub fn is_consumer(&self) -> bool {
        self.trophic_level >= 2.0
    }

    #[must_use]
    pub fn is_background_eligible(&self) -> bool {
        self.is_background || self.population() < BACKGROUND_POPULATION_THRESHOLD
    }

    /// L2 norm of the trait vector, used against [`Era::trait_norm_cap`].
    #[must_use]
    pub fn trait_norm(&self) -> f32 {
        self.traits.values().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Rescales the trait vector in place so its L2 norm does not exceed `cap`.
    pub fn clamp_trait_norm(&mut self, cap: f32) {
        let norm = self.trait_norm();
        if norm > cap && norm > 0.0 {
            let scale = cap / norm;
            for value in self.traits.values_mut() {
                *value *= scale;
            }
        }
    }

    pub fn active_organ_count(&self) -> usize {
        self.organs.values().filter(|o| o.active).count()
    }

    /// Runs the invariants from spec §3 that depend only on this record
    /// (not on its relationship to other species or the world).
    pub fn validate_self(&self) -> Result<(), String> {
        if !Self::is_valid_lineage_code(&self.lineage_code) {
            return Err(format!("invalid lineage code {:?}", self.lineage_code));
        }
        if let Some(parent) = &self.parent_code {
            if !Self::is_strict_prefix(parent, &self.lineage_code) {
                return Err(format!(
                    "parent_code {:?} is not a strict prefix of {:?}",
                    parent, self.lineage_code
                ));
            }
        }
        if self.active_organ_count() > MAX_ACTIVE_ORGANS {
            return Err("too many active organs".into());
        }
        if !(1.0..=6.0).contains(&self.trophic_level) {
            return Err(format!("trophic_level {} out of range", self.trophic_level));
        }
        let pref_sum: f32 = self.prey_preferences.values().sum();
        if pref_sum > 1.0 + 1e-4 {
            return Err(format!("prey_preferences sum to {pref_sum} > 1"));
        }
        if let Some(buf) = self.plasticity_buffer {
            if !(0.0..=1.0).contains(&buf) {
                return Err("plasticity_buffer out of range".into());
            }
        }
        if self.is_consumer() && self.is_alive() && self.prey_species.is_empty() {
            // Enforced by food-web maintenance each turn, not a hard invariant
            // at arbitrary points in time; flagged here only as a soft check.
        }
        if let Some(fertility) = self.hybrid_fertility {
            if !(0.0..=1.0).contains(&fertility) {
                return Err("hybrid_fertility out of range".into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lineage_code_validation() {
        assert!(Species::is_valid_lineage_code("Rex"));
        assert!(Species::is_valid_lineage_code("A1a2"));
        assert!(!Species::is_valid_lineage_code("rex"));
        assert!(!Species::is_valid_lineage_code("Rex!"));
        assert!(!Species::is_valid_lineage_code(""));
    }

    #[test]
    fn strict_prefix() {
        assert!(Species::is_strict_prefix("A", "A1"));
        assert!(!Species::is_strict_prefix("A1", "A1"));
        assert!(!Species::is_strict_prefix("A1", "A"));
    }

    #[test]
    fn era_caps_increase_monotonically() {
        let eras = [
            Era::Hadean,
            Era::Archean,
            Era::Proterozoic,
            Era::Paleozoic,
            Era::Mesozoic,
            Era::Cenozoic,
        ];
        for pair in eras.windows(2) {
            assert!(pair[0].trait_norm_cap() < pair[1].trait_norm_cap());
        }
    }

    fn sample_species() -> Species {
        Species {
            lineage_code: "Rex".into(),
            parent_code: None,
            genus_code: "Rex".into(),
            common_name: "Founder".into(),
            latin_name: "Rex foundus".into(),
            description: String::new(),
            traits: HashMap::new(),
            hidden_traits: HashMap::new(),
            morphology: HashMap::new(),
            organs: HashMap::new(),
            plasticity_buffer: Some(0.5),
            habitat_type: HabitatType::Terrestrial,
            diet_type: DietType::Herbivore,
            trophic_level: 2.0,
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
    fn clamp_trait_norm_rescales() {
        let mut s = sample_species();
        s.traits.insert(TraitName::Locomotion, 100.0);
        s.traits.insert(TraitName::Intelligence, 100.0);
        s.clamp_trait_norm(20.0);
        assert!((s.trait_norm() - 20.0).abs() < 1e-3);
    }

    #[test]
    fn validate_self_rejects_bad_parent() {
        let mut s = sample_species();
        s.parent_code = Some("Rex".into());
        assert!(s.validate_self().is_err());
    }
}
