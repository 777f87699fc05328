//! Data-parallel backend: every species' mortality, dispersal, migration,
//! reproduction and competition is computed independently (each reads only
//! this turn's pre-step snapshot), so they can run across a rayon thread
//! pool. This is the default backend when the `gpu` feature is unavailable
//! (§4.1 "Backend selection").

use super::{centroid_of, other_species_total, total_population, EcologyBackend, StageContext, TurnOutputs};
use crate::tensors::kernels::{self, MortalityArgs};
use primordium_data::tensor::{EnvChannel, SpeciesParamFeature, Tensor3};
use rayon::prelude::*;

pub struct DenseBackend;

impl EcologyBackend for DenseBackend {
    fn name(&self) -> &'static str {
        "dense"
    }

    fn run_turn(&self, mut pop: Tensor3, ctx: &StageContext<'_>) -> TurnOutputs {
        let plane = pop.height * pop.width;
        let species_count = ctx.species_count();

        let env_temp = ctx.env.channel(EnvChannel::Temperature.index()).to_vec();
        let env_humidity = ctx.env.channel(EnvChannel::Humidity.index()).to_vec();
        let resources = ctx.env.channel(EnvChannel::Resources.index()).to_vec();
        let external_pressure = ctx.env.channel(EnvChannel::ExternalPressure.index()).to_vec();
        let era_scale = ctx.era_mortality_scale();
        let total_before = total_population(&pop);

        // Mortality is embarrassingly parallel: each species only reads the
        // shared pre-turn totals, never another species' live slice.
        let mortality_results: Vec<(Vec<f32>, f64)> = (0..species_count)
            .into_par_iter()
            .map(|s| {
                let other = other_species_total(&pop, s);
                let before: f64 = pop.channel(s).iter().map(|&v| v as f64).sum();
                let own = pop.channel(s);
                let args = MortalityArgs {
                    own_pop: own,
                    other_pop_total: &other,
                    total_pop: &total_before,
                    resources: &resources,
                    env_temp: &env_temp,
                    env_humidity: &env_humidity,
                    overlay_external_pressure: &external_pressure,
                    temp_pref: ctx.species_params.get(s, SpeciesParamFeature::TemperaturePref),
                    tolerance: ctx.species_params.get(s, SpeciesParamFeature::ToleranceWidth).max(1e-3),
                    humidity_pref: ctx.species_params.get(s, SpeciesParamFeature::HumidityPref),
                    trophic_level: ctx.trophic_levels[s],
                    prey_density: ctx.prey_density.map(|t| t.channel(s)),
                    era_scale,
                    balance: ctx.balance,
                };
                let rates: Vec<f32> = (0..plane).map(|cell| kernels::mortality_rate(&args, cell)).collect();
                let mut updated = own.to_vec();
                kernels::apply_mortality(&mut updated, &rates);
                let after: f64 = updated.iter().map(|&v| v as f64).sum();
                (rates, (before - after).max(0.0))
            })
            .collect();

        let mut mortality_rates = Tensor3::zeros(species_count, pop.height, pop.width);
        let mut death_counts = vec![0.0f64; species_count];
        for (s, (rates, deaths)) in mortality_results.into_iter().enumerate() {
            kernels::apply_mortality(pop.channel_mut(s), &rates);
            mortality_rates.channel_mut(s).copy_from_slice(&rates);
            death_counts[s] = deaths;
        }

        run_post_mortality(pop, ctx, mortality_rates, death_counts)
    }
}

/// Dispersal through competition, shared by [`DenseBackend`] and
/// [`super::gpu::GpuBackend`] (which computes mortality itself on the GPU
/// and hands the already-reduced population in here).
pub(super) fn run_post_mortality(
    mut pop: Tensor3,
    ctx: &StageContext<'_>,
    mortality_rates: Tensor3,
    death_counts: Vec<f64>,
) -> TurnOutputs {
    let species_count = ctx.species_count();
    let env_temp = ctx.env.channel(EnvChannel::Temperature.index()).to_vec();
    let env_humidity = ctx.env.channel(EnvChannel::Humidity.index()).to_vec();
    let resources = ctx.env.channel(EnvChannel::Resources.index()).to_vec();
    let era_scale = ctx.era_mortality_scale();

    // Dispersal and migration both only touch the acting species' own
    // slice, so they can be computed in parallel then written back
    // sequentially. Reproduction and competition need each other
    // species' just-dispersed total, so they stay on the main thread.
    let suitabilities: Vec<Vec<f32>> = (0..species_count)
        .into_par_iter()
        .map(|s| {
            kernels::suitability(
                &env_temp,
                &env_humidity,
                &resources,
                kernels::habitat_mask_for(ctx.env, ctx.habitat_channels[s]),
                ctx.species_params,
                s,
            )
        })
        .collect();

    let dispersed: Vec<Vec<f32>> = (0..species_count)
        .into_par_iter()
        .map(|s| kernels::disperse(pop.channel(s), &suitabilities[s], pop.height, pop.width, ctx.balance.base_diffusion_rate))
        .collect();
    for (s, d) in dispersed.iter().enumerate() {
        pop.channel_mut(s).copy_from_slice(d);
    }

    let mut migrated_species = Vec::new();
    let migration_results: Vec<(Vec<f32>, bool)> = (0..species_count)
        .into_par_iter()
        .map(|s| {
            let centroid = centroid_of(pop.channel(s), pop.height, pop.width);
            kernels::migrate(
                pop.channel(s),
                &suitabilities[s],
                ctx.prey_density.map(|t| t.channel(s)),
                ctx.death_rate_by_species[s],
                centroid,
                pop.height,
                pop.width,
                ctx.is_consumer[s],
                ctx.cooldown[s],
                era_scale,
                ctx.balance,
            )
        })
        .collect();
    for (s, (migrated, did_migrate)) in migration_results.into_iter().enumerate() {
        pop.channel_mut(s).copy_from_slice(&migrated);
        if did_migrate {
            migrated_species.push(s);
        }
    }

    let mut survivor_counts = vec![0.0f64; species_count];
    for s in 0..species_count {
        let total_now = total_population(&pop);
        let births = kernels::reproduce(pop.channel(s), &total_now, &suitabilities[s], &resources, ctx.balance);
        for (p, b) in pop.channel_mut(s).iter_mut().zip(&births) {
            *p += b;
        }

        let other = other_species_total(&pop, s);
        let fitness: Vec<f32> = suitabilities[s].iter().map(|&v| v.max(ctx.balance.fitness_min)).collect();
        kernels::compete(pop.channel_mut(s), &other, ctx.balance.competition_weight, &fitness);

        survivor_counts[s] = pop.channel(s).iter().map(|&v| v as f64).sum();
    }

    TurnOutputs { pop, mortality_rates, death_counts, survivor_counts, migrated_species }
}
