//! Layered simulation configuration.
//!
//! Mirrors the structure of a Python original's `EcologyConfig` /
//! `TradeoffConfig` dataclasses (`examples/original_source/backend/app/tensor/config.py`,
//! `ecology.py`): every numeric balance constant has a hardcoded default here,
//! optionally overridden by a `config.toml` file, and validated before the
//! engine is allowed to run (§7: configuration errors are fatal at startup).
//!
//! ## Example `config.toml`
//!
//! ```toml
//! [world]
//! width = 64
//! height = 64
//! seed = 42
//!
//! [balance]
//! base_mortality = 0.05
//! tradeoff_ratio = 0.7
//! ```

use crate::error::{EngineError, EngineResult};
use primordium_data::species::TraitName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorldConfig {
    pub width: u32,
    pub height: u32,
    pub seed: Option<u64>,
    pub min_hotspot_spacing: u32,
    pub min_plate_seed_distance: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            seed: None,
            min_hotspot_spacing: 4,
            min_plate_seed_distance: 6,
        }
    }
}

/// Numeric balance constants for the tensor ecology engine (§4.1, §4.4).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BalanceConfig {
    // Mortality (§4.1 step 1)
    pub base_mortality: f32,
    pub temp_mortality_weight: f32,
    pub competition_weight: f32,
    pub resource_weight: f32,
    pub trophic_weight: f32,

    // Dispersal (§4.1 step 2)
    pub base_diffusion_rate: f32,
    pub max_diffusion_rate: f32,

    // Migration (§4.1 step 3)
    pub pressure_threshold: f32,
    pub saturation_threshold: f32,
    pub max_migration_distance: f32,
    pub base_migration_rate: f32,
    pub score_threshold: f32,

    // Reproduction (§4.1 step 4)
    pub base_birth_rate: f32,
    pub capacity_multiplier: f32,

    pub era_scaling_enabled: bool,

    // Speciation divergence trigger (§4.4)
    pub divergence_threshold: f32,
    pub divergence_normalizer: f32,

    pub fitness_min: f32,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            base_mortality: 0.05,
            temp_mortality_weight: 0.3,
            competition_weight: 0.2,
            resource_weight: 0.2,
            trophic_weight: 0.3,
            base_diffusion_rate: 0.15,
            max_diffusion_rate: 0.8,
            pressure_threshold: 0.12,
            saturation_threshold: 0.60,
            max_migration_distance: 15.0,
            base_migration_rate: 0.15,
            score_threshold: 0.08,
            base_birth_rate: 0.1,
            capacity_multiplier: 100.0,
            era_scaling_enabled: true,
            divergence_threshold: 0.5,
            divergence_normalizer: 10.0,
            fitness_min: 0.1,
        }
    }
}

/// Auto-tradeoff calculator configuration (§4.4).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TradeoffConfig {
    pub tradeoff_ratio: f32,
    pub max_single_penalty: f32,
    pub penalty_parent_ratio: f32,
    pub min_penalty_threshold: f32,
    pub energy_costs: HashMap<TraitName, f32>,
    pub competition_map: HashMap<TraitName, Vec<TraitName>>,
    pub default_penalty_pool: Vec<TraitName>,
}

impl Default for TradeoffConfig {
    fn default() -> Self {
        let mut energy_costs = HashMap::new();
        energy_costs.insert(TraitName::Locomotion, 1.5);
        energy_costs.insert(TraitName::Intelligence, 2.0);
        energy_costs.insert(TraitName::ReproductiveRate, 1.0);
        energy_costs.insert(TraitName::ColdResistance, 0.6);
        energy_costs.insert(TraitName::HeatResistance, 0.6);
        energy_costs.insert(TraitName::PhysicalDefense, 0.7);
        energy_costs.insert(TraitName::Perception, 1.2);
        energy_costs.insert(TraitName::Sociality, 0.8);
        energy_costs.insert(TraitName::BodySize, 1.0);

        let mut competition_map = HashMap::new();
        competition_map.insert(
            TraitName::Locomotion,
            vec![TraitName::PhysicalDefense, TraitName::BodySize, TraitName::ReproductiveRate],
        );
        competition_map.insert(
            TraitName::PhysicalDefense,
            vec![TraitName::Locomotion, TraitName::ReproductiveRate],
        );
        competition_map.insert(TraitName::ColdResistance, vec![TraitName::HeatResistance, TraitName::ReproductiveRate]);
        competition_map.insert(TraitName::HeatResistance, vec![TraitName::ColdResistance, TraitName::ReproductiveRate]);
        competition_map.insert(TraitName::Intelligence, vec![TraitName::ReproductiveRate, TraitName::BodySize]);
        competition_map.insert(TraitName::Perception, vec![TraitName::ReproductiveRate]);
        competition_map.insert(TraitName::BodySize, vec![TraitName::Locomotion, TraitName::ReproductiveRate]);

        Self {
            tradeoff_ratio: 0.7,
            max_single_penalty: 2.0,
            penalty_parent_ratio: 0.3,
            min_penalty_threshold: 0.1,
            energy_costs,
            competition_map,
            default_penalty_pool: vec![TraitName::ReproductiveRate, TraitName::Locomotion, TraitName::Sociality],
        }
    }
}

/// Tectonic motion-engine configuration (§4.3).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TectonicConfig {
    pub min_velocity: f32,
    pub max_velocity: f32,
    pub max_elevation_delta_per_turn: f32,
    pub erosion_rate: f32,
    pub earthquake_base_probability: f32,
    pub volcanic_base_probability: f32,
    pub min_eruption_interval_turns: u64,
    pub latitude_damping: f32,
}

impl Default for TectonicConfig {
    fn default() -> Self {
        Self {
            min_velocity: 0.0,
            max_velocity: 2.0,
            max_elevation_delta_per_turn: 50.0,
            erosion_rate: 0.02,
            earthquake_base_probability: 0.05,
            volcanic_base_probability: 0.03,
            min_eruption_interval_turns: 20,
            latitude_damping: 0.05,
        }
    }
}

/// Food-web maintenance configuration (§4.5).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FoodWebConfig {
    pub biomass_multiplier: f32,
    pub target_band_low: f32,
    pub target_band_high: f32,
}

impl Default for FoodWebConfig {
    fn default() -> Self {
        Self { biomass_multiplier: 1.2, target_band_low: 1.5, target_band_high: 0.5 }
    }
}

impl FoodWebConfig {
    /// Minimum number of living prey species required for a given trophic
    /// level (§4.5: T2:1, T3:2, T4:3, T5:4).
    #[must_use]
    pub fn min_prey_count(trophic_level: f32) -> usize {
        match trophic_level {
            t if t >= 5.0 => 4,
            t if t >= 4.0 => 3,
            t if t >= 3.0 => 2,
            t if t >= 2.0 => 1,
            _ => 0,
        }
    }
}

/// Model-router concurrency and retry configuration (§4.7, §5).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RouterConfig {
    pub max_concurrent_requests: usize,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub rate_limit_backoff_ms: u64,
    pub request_timeout_secs: u64,
    pub stream_line_timeout_secs: u64,
    pub stream_outer_timeout_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 4,
            max_retries: 3,
            base_backoff_ms: 500,
            rate_limit_backoff_ms: 5_000,
            request_timeout_secs: 30,
            stream_line_timeout_secs: 30,
            stream_outer_timeout_secs: 120,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub balance: BalanceConfig,
    #[serde(default)]
    pub tradeoff: TradeoffConfig,
    #[serde(default)]
    pub tectonic: TectonicConfig,
    #[serde(default)]
    pub foodweb: FoodWebConfig,
    #[serde(default)]
    pub router: RouterConfig,
}

impl AppConfig {
    /// Checks every numeric constant against the range the design notes
    /// commit to. Called once at startup; a failure here refuses to run
    /// the engine (§7).
    pub fn validate(&self) -> EngineResult<()> {
        macro_rules! ensure {
            ($cond:expr, $msg:expr) => {
                if !$cond {
                    return Err(EngineError::Configuration($msg.to_string()));
                }
            };
        }

        ensure!(self.world.width > 0, "world width must be positive");
        ensure!(self.world.height > 0, "world height must be positive");

        ensure!(
            (0.01..=0.95).contains(&self.balance.base_mortality),
            "base_mortality must be in [0.01, 0.95]"
        );
        ensure!(
            self.balance.temp_mortality_weight >= 0.0
                && self.balance.competition_weight >= 0.0
                && self.balance.resource_weight >= 0.0
                && self.balance.trophic_weight >= 0.0,
            "mortality weights must be non-negative"
        );
        ensure!(
            (0.0..=1.0).contains(&self.balance.base_diffusion_rate),
            "base_diffusion_rate must be in [0.0, 1.0]"
        );
        ensure!(
            self.balance.base_diffusion_rate <= self.balance.max_diffusion_rate,
            "base_diffusion_rate must not exceed max_diffusion_rate"
        );
        ensure!(self.balance.capacity_multiplier > 0.0, "capacity_multiplier must be positive");
        ensure!(
            (0.0..=1.0).contains(&self.balance.divergence_threshold),
            "divergence_threshold must be in [0.0, 1.0]"
        );

        ensure!(
            (0.5..=1.0).contains(&self.tradeoff.tradeoff_ratio),
            "tradeoff_ratio must be in [0.5, 1.0]"
        );
        ensure!(self.tradeoff.max_single_penalty >= 0.0, "max_single_penalty must be non-negative");
        ensure!(
            (0.0..=1.0).contains(&self.tradeoff.penalty_parent_ratio),
            "penalty_parent_ratio must be in [0.0, 1.0]"
        );

        ensure!(
            self.tectonic.min_velocity <= self.tectonic.max_velocity,
            "tectonic min_velocity must not exceed max_velocity"
        );
        ensure!(
            self.tectonic.max_elevation_delta_per_turn > 0.0,
            "max_elevation_delta_per_turn must be positive"
        );

        ensure!(self.router.max_concurrent_requests > 0, "max_concurrent_requests must be positive");

        Ok(())
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    /// A content hash of the balance-affecting sub-tables, used to tag
    /// save files so a loader can detect when balance changed underneath
    /// a save (§6: saves are versioned).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.balance).as_bytes());
        hasher.update(format!("{:?}", self.tradeoff).as_bytes());
        hasher.update(format!("{:?}", self.tectonic).as_bytes());
        hasher.update(format!("{:?}", self.foodweb).as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_width() {
        let mut config = AppConfig::default();
        config.world.width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_tradeoff_ratio_out_of_range() {
        let mut config = AppConfig::default();
        config.tradeoff.tradeoff_ratio = 0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn min_prey_count_matches_table() {
        assert_eq!(FoodWebConfig::min_prey_count(2.0), 1);
        assert_eq!(FoodWebConfig::min_prey_count(3.0), 2);
        assert_eq!(FoodWebConfig::min_prey_count(4.0), 3);
        assert_eq!(FoodWebConfig::min_prey_count(5.0), 4);
        assert_eq!(FoodWebConfig::min_prey_count(1.0), 0);
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = AppConfig::default();
        let b = AppConfig::default();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
