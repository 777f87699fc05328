//! The tensor ecology engine (§4.1): batched mortality, dispersal,
//! migration, reproduction and competition over `(env, pop, species_params)`.
//!
//! Three backends implement the same [`EcologyBackend`] trait — [`scalar`]
//! (sequential, correctness-test oracle), [`dense`] (rayon data-parallel,
//! the default), and [`gpu`] (feature-gated, accelerates mortality only and
//! delegates everything else to [`dense`]) — per the §9 design note that
//! backend selection is trait-style polymorphism with no process-global
//! state.

pub mod dense;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod kernels;
pub mod scalar;

use crate::config::BalanceConfig;
use primordium_data::species::{Era, HabitatType};
use primordium_data::tensor::{EnvChannel, SpeciesParamsTensor, Tensor3};

/// Maps a species' habitat type to the `env` channel its suitability should
/// be weighted against (§3 tensor invariant: three habitat masks).
#[must_use]
pub fn habitat_channel_for(habitat: HabitatType) -> EnvChannel {
    match habitat {
        HabitatType::Terrestrial | HabitatType::Aerial => EnvChannel::HabitatTerrestrial,
        HabitatType::Marine | HabitatType::DeepSea | HabitatType::Freshwater => EnvChannel::HabitatAquatic,
        HabitatType::Coastal | HabitatType::Amphibious => EnvChannel::HabitatAmphibious,
    }
}

/// Everything a backend needs besides the `pop` tensor itself, which is
/// threaded explicitly through [`EcologyBackend::run_turn`] so each stage's
/// output is visibly a pure function of the previous stage's (§4.1).
pub struct StageContext<'a> {
    /// Base environment plus the per-turn [`EnvChannel::ExternalPressure`]
    /// channel the pressure bridge writes before the turn starts.
    pub env: &'a Tensor3,
    pub species_params: &'a SpeciesParamsTensor,
    pub habitat_channels: &'a [EnvChannel],
    pub trophic_levels: &'a [f32],
    pub is_consumer: &'a [bool],
    pub cooldown: &'a [bool],
    pub prey_density: Option<&'a Tensor3>,
    pub death_rate_by_species: &'a [f32],
    pub era: Era,
    pub balance: &'a BalanceConfig,
}

impl<'a> StageContext<'a> {
    #[must_use]
    pub fn species_count(&self) -> usize {
        self.species_params.table.rows
    }

    #[must_use]
    pub fn era_mortality_scale(&self) -> f32 {
        if self.balance.era_scaling_enabled { self.era.mortality_scale() } else { 1.0 }
    }
}

/// Output of a full turn of the tensor ecology engine.
pub struct TurnOutputs {
    pub pop: Tensor3,
    pub mortality_rates: Tensor3,
    pub death_counts: Vec<f64>,
    pub survivor_counts: Vec<f64>,
    pub migrated_species: Vec<usize>,
}

/// Computes a species' population-weighted centroid, `x` treated as
/// circular (world wraps on `x`, not `y`). Cheap approximation: cells near
/// the wrap seam pull the centroid toward whichever side has more mass,
/// rather than doing full circular-mean trigonometry.
#[must_use]
pub fn centroid_of(pop_row: &[f32], height: usize, width: usize) -> (f32, f32) {
    let mut mass = 0.0f64;
    let mut sx = 0.0f64;
    let mut sy = 0.0f64;
    for y in 0..height {
        for x in 0..width {
            let p = pop_row[y * width + x] as f64;
            if p <= 0.0 {
                continue;
            }
            mass += p;
            sx += p * x as f64;
            sy += p * y as f64;
        }
    }
    if mass <= 0.0 {
        return (width as f32 / 2.0, height as f32 / 2.0);
    }
    ((sx / mass) as f32, (sy / mass) as f32)
}

/// The total population of all species other than `s` in every cell.
#[must_use]
pub fn other_species_total(pop: &Tensor3, s: usize) -> Vec<f32> {
    let plane = pop.height * pop.width;
    let mut total = vec![0.0f32; plane];
    for c in 0..pop.channels {
        if c == s {
            continue;
        }
        for (t, &v) in total.iter_mut().zip(pop.channel(c)) {
            *t += v;
        }
    }
    total
}

#[must_use]
pub fn total_population(pop: &Tensor3) -> Vec<f32> {
    let plane = pop.height * pop.width;
    let mut total = vec![0.0f32; plane];
    for c in 0..pop.channels {
        for (t, &v) in total.iter_mut().zip(pop.channel(c)) {
            *t += v;
        }
    }
    total
}

/// Trait implemented identically (within `1e-4` relative tolerance) by
/// every backend.
pub trait EcologyBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn run_turn(&self, pop: Tensor3, ctx: &StageContext<'_>) -> TurnOutputs;
}

/// Picks the first available backend: GPU (if the `gpu` feature is
/// compiled in and initialization succeeds), else dense, else scalar
/// (§4.1 "Backend selection"). `force_scalar` models the configuration
/// flag that forces the fallback for correctness tests.
#[must_use]
pub fn select_backend(force_scalar: bool) -> Box<dyn EcologyBackend> {
    if force_scalar {
        return Box::new(scalar::ScalarBackend);
    }

    #[cfg(feature = "gpu")]
    {
        if let Ok(backend) = gpu::GpuBackend::try_new() {
            return Box::new(backend);
        }
    }

    #[cfg(feature = "std")]
    {
        return Box::new(dense::DenseBackend);
    }

    #[allow(unreachable_code)]
    Box::new(scalar::ScalarBackend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_of_empty_species_is_map_center() {
        let pop = vec![0.0f32; 16];
        let (cx, cy) = centroid_of(&pop, 4, 4);
        assert!((cx - 2.0).abs() < 1e-6);
        assert!((cy - 2.0).abs() < 1e-6);
    }

    #[test]
    fn centroid_of_single_cell_is_that_cell() {
        let mut pop = vec![0.0f32; 16];
        pop[5] = 10.0;
        let (cx, cy) = centroid_of(&pop, 4, 4);
        assert!((cx - 1.0).abs() < 1e-6);
        assert!((cy - 1.0).abs() < 1e-6);
    }

    #[test]
    fn other_species_total_excludes_self() {
        let mut pop = Tensor3::zeros(2, 2, 2);
        for v in pop.channel_mut(0) {
            *v = 1.0;
        }
        for v in pop.channel_mut(1) {
            *v = 5.0;
        }
        let other = other_species_total(&pop, 0);
        assert!(other.iter().all(|&v| (v - 5.0).abs() < 1e-6));
    }
}
