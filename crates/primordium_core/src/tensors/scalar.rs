//! Sequential backend: one species at a time, no parallelism. Serves as the
//! correctness oracle the other backends are checked against (§4.1 "Backend
//! selection"), and as the forced fallback for reproducible test runs.

use super::{centroid_of, other_species_total, total_population, EcologyBackend, StageContext, TurnOutputs};
use crate::tensors::kernels::{self, MortalityArgs};
use primordium_data::tensor::{EnvChannel, Tensor3};

pub struct ScalarBackend;

impl EcologyBackend for ScalarBackend {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn run_turn(&self, mut pop: Tensor3, ctx: &StageContext<'_>) -> TurnOutputs {
        let plane = pop.height * pop.width;
        let species_count = ctx.species_count();

        let env_temp = ctx.env.channel(EnvChannel::Temperature.index()).to_vec();
        let env_humidity = ctx.env.channel(EnvChannel::Humidity.index()).to_vec();
        let resources = ctx.env.channel(EnvChannel::Resources.index()).to_vec();
        let external_pressure = ctx.env.channel(EnvChannel::ExternalPressure.index()).to_vec();
        let era_scale = ctx.era_mortality_scale();

        let mut mortality_rates = Tensor3::zeros(species_count, pop.height, pop.width);
        let mut death_counts = vec![0.0f64; species_count];
        let mut survivor_counts = vec![0.0f64; species_count];
        let mut migrated_species = Vec::new();

        let total_before = total_population(&pop);

        // Step 1: mortality, independently per species against the shared
        // pre-turn totals (§4.1: mortality reads last turn's population
        // mix, not partially-updated totals from earlier species).
        for s in 0..species_count {
            let other = other_species_total(&pop, s);
            let before: f64 = pop.channel(s).iter().map(|&v| v as f64).sum();

            let args = MortalityArgs {
                own_pop: pop.channel(s),
                other_pop_total: &other,
                total_pop: &total_before,
                resources: &resources,
                env_temp: &env_temp,
                env_humidity: &env_humidity,
                overlay_external_pressure: &external_pressure,
                temp_pref: ctx.species_params.get(s, primordium_data::tensor::SpeciesParamFeature::TemperaturePref),
                tolerance: ctx
                    .species_params
                    .get(s, primordium_data::tensor::SpeciesParamFeature::ToleranceWidth)
                    .max(1e-3),
                humidity_pref: ctx.species_params.get(s, primordium_data::tensor::SpeciesParamFeature::HumidityPref),
                trophic_level: ctx.trophic_levels[s],
                prey_density: ctx.prey_density.map(|t| t.channel(s)),
                era_scale,
                balance: ctx.balance,
            };
            let rates: Vec<f32> = (0..plane).map(|cell| kernels::mortality_rate(&args, cell)).collect();
            mortality_rates.channel_mut(s).copy_from_slice(&rates);
            kernels::apply_mortality(pop.channel_mut(s), &rates);

            let after: f64 = pop.channel(s).iter().map(|&v| v as f64).sum();
            death_counts[s] = (before - after).max(0.0);
        }

        // Steps 2-5: dispersal, migration, reproduction and competition
        // each read/write their own species slice; species order doesn't
        // affect the result since every read is against this turn's
        // pre-step snapshot of totals.
        for s in 0..species_count {
            let habitat_channel = ctx.habitat_channels[s];
            let suitability = kernels::suitability(
                &env_temp,
                &env_humidity,
                &resources,
                kernels::habitat_mask_for(ctx.env, habitat_channel),
                ctx.species_params,
                s,
            );

            let dispersed = kernels::disperse(pop.channel(s), &suitability, pop.height, pop.width, ctx.balance.base_diffusion_rate);
            pop.channel_mut(s).copy_from_slice(&dispersed);

            let centroid = centroid_of(pop.channel(s), pop.height, pop.width);
            let (migrated, did_migrate) = kernels::migrate(
                pop.channel(s),
                &suitability,
                ctx.prey_density.map(|t| t.channel(s)),
                ctx.death_rate_by_species[s],
                centroid,
                pop.height,
                pop.width,
                ctx.is_consumer[s],
                ctx.cooldown[s],
                era_scale,
                ctx.balance,
            );
            pop.channel_mut(s).copy_from_slice(&migrated);
            if did_migrate {
                migrated_species.push(s);
            }

            let total_now = total_population(&pop);
            let births = kernels::reproduce(pop.channel(s), &total_now, &suitability, &resources, ctx.balance);
            for (p, b) in pop.channel_mut(s).iter_mut().zip(&births) {
                *p += b;
            }

            let other = other_species_total(&pop, s);
            let fitness: Vec<f32> = suitability.iter().map(|&v| v.max(ctx.balance.fitness_min)).collect();
            kernels::compete(pop.channel_mut(s), &other, ctx.balance.competition_weight, &fitness);

            survivor_counts[s] = pop.channel(s).iter().map(|&v| v as f64).sum();
        }

        TurnOutputs { pop, mortality_rates, death_counts, survivor_counts, migrated_species }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BalanceConfig;
    use primordium_data::species::Era;
    use primordium_data::tensor::{SpeciesParamFeature, SpeciesParamsTensor};

    #[test]
    fn run_turn_never_produces_negative_population() {
        let env = Tensor3::zeros(EnvChannel::COUNT, 4, 4);
        let mut pop = Tensor3::zeros(1, 4, 4);
        pop.channel_mut(0)[0] = 50.0;
        let mut params = SpeciesParamsTensor::zeros(1);
        params.set(0, SpeciesParamFeature::ToleranceWidth, 0.5);
        let balance = BalanceConfig::default();
        let habitat_channels = [EnvChannel::HabitatTerrestrial];
        let trophic_levels = [1.0f32];
        let is_consumer = [false];
        let cooldown = [false];
        let death_rates = [0.0f32];

        let ctx = StageContext {
            env: &env,
            species_params: &params,
            habitat_channels: &habitat_channels,
            trophic_levels: &trophic_levels,
            is_consumer: &is_consumer,
            cooldown: &cooldown,
            prey_density: None,
            death_rate_by_species: &death_rates,
            era: Era::Cenozoic,
            balance: &balance,
        };

        let out = ScalarBackend.run_turn(pop, &ctx);
        assert!(out.pop.channel(0).iter().all(|&v| v >= 0.0));
    }
}
