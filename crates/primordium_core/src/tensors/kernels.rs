//! Pure, single-species numeric kernels shared by every backend (§9: "each
//! backend implements the same kernel set"). Backends differ only in how
//! they schedule these calls across species — sequentially (scalar),
//! data-parallel over species (dense), or offloaded to the GPU (gpu) — never
//! in the formulas themselves, which is what keeps backends within the
//! `1e-4` cross-backend tolerance (§4.1).

use crate::config::BalanceConfig;
use primordium_data::tensor::{EnvChannel, SpeciesParamFeature, SpeciesParamsTensor};
use primordium_data::tensor::Tensor3;

/// Per-cell, per-species inputs needed by the mortality kernel.
pub struct MortalityArgs<'a> {
    pub own_pop: &'a [f32],
    pub other_pop_total: &'a [f32],
    pub total_pop: &'a [f32],
    pub resources: &'a [f32],
    pub env_temp: &'a [f32],
    pub env_humidity: &'a [f32],
    pub overlay_external_pressure: &'a [f32],
    pub temp_pref: f32,
    pub tolerance: f32,
    pub humidity_pref: f32,
    pub trophic_level: f32,
    pub prey_density: Option<&'a [f32]>,
    pub era_scale: f32,
    pub balance: &'a BalanceConfig,
}

/// Mortality rate per cell for one species (§4.1 step 1), clamped to
/// `[0.01, 0.95]`.
pub fn mortality_rate(args: &MortalityArgs, cell: usize) -> f32 {
    let b = args.balance;

    let temp_dev = ((args.env_temp[cell] - args.temp_pref * 50.0).abs() / args.tolerance.max(1e-3)).tanh();
    let humidity_dev = ((args.env_humidity[cell] - args.humidity_pref).abs() * 0.5).clamp(0.0, 0.4);

    let own = args.own_pop[cell].max(0.0);
    let competition = ((args.other_pop_total[cell] / (own + 100.0)) * 0.1).clamp(0.0, 0.3);

    let resource_capacity = (args.resources[cell] * b.capacity_multiplier).max(1e-3);
    let resource = ((args.total_pop[cell] / resource_capacity - 0.5) * 0.4).clamp(0.0, 0.4);

    let trophic_scarcity = if args.trophic_level >= 2.0 {
        let density = args.prey_density.map(|d| d[cell]).unwrap_or(1.0).clamp(0.0, 1.0);
        1.0 - density
    } else {
        0.0
    };

    let external_pressure = args.overlay_external_pressure[cell].clamp(0.0, 0.5);

    let weighted = temp_dev * b.temp_mortality_weight
        + competition * b.competition_weight
        + resource * b.resource_weight
        + trophic_scarcity * b.trophic_weight
        + humidity_dev
        + external_pressure;

    let m = (b.base_mortality + weighted) * args.era_scale;
    m.clamp(0.01, 0.95)
}

/// `pop <- pop * (1 - m)`, clamped at zero (§4.1: negative populations are
/// never produced).
pub fn apply_mortality(own_pop: &mut [f32], mortality: &[f32]) {
    for (p, m) in own_pop.iter_mut().zip(mortality) {
        *p = (*p * (1.0 - m)).max(0.0);
    }
}

/// Suitability in `[0, 1]` from temperature/humidity/resource/habitat match
/// (§4.1 step 2, used again by migration and reproduction).
pub fn suitability(
    env_temp: &[f32],
    env_humidity: &[f32],
    resources: &[f32],
    habitat_mask: &[f32],
    params: &SpeciesParamsTensor,
    species_idx: usize,
) -> Vec<f32> {
    let temp_pref = params.get(species_idx, SpeciesParamFeature::TemperaturePref);
    let tolerance = params.get(species_idx, SpeciesParamFeature::ToleranceWidth).max(1e-3);
    let humidity_pref = params.get(species_idx, SpeciesParamFeature::HumidityPref);

    env_temp
        .iter()
        .zip(env_humidity)
        .zip(resources)
        .zip(habitat_mask)
        .map(|(((&t, &h), &r), &habitat)| {
            let temp_match = 1.0 - ((t - temp_pref * 50.0).abs() / (tolerance * 50.0)).clamp(0.0, 1.0);
            let humidity_match = 1.0 - (h - humidity_pref).abs().clamp(0.0, 1.0);
            let resource_match = r.clamp(0.0, 1.0);
            (temp_match * 0.4 + humidity_match * 0.3 + resource_match * 0.2 + habitat * 0.1).clamp(0.0, 1.0)
        })
        .collect()
}

/// 4-neighbor diffusion with wraparound on `x` only, followed by a
/// suitability-weighted renormalization that preserves the pre-dispersal
/// total exactly (§4.1 step 2).
pub fn disperse(own_pop: &[f32], suitability: &[f32], height: usize, width: usize, rate: f32) -> Vec<f32> {
    let center_weight = 1.0 - rate;
    let neighbor_weight = rate / 4.0;
    let mut diffused = vec![0.0f32; own_pop.len()];

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let up = if y == 0 { idx } else { idx - width };
            let down = if y + 1 == height { idx } else { idx + width };
            let left = y * width + (x + width - 1) % width;
            let right = y * width + (x + 1) % width;
            diffused[idx] = own_pop[idx] * center_weight
                + (own_pop[up] + own_pop[down] + own_pop[left] + own_pop[right]) * neighbor_weight;
        }
    }

    let pre_total: f64 = own_pop.iter().map(|&v| v as f64).sum();
    let weighted: Vec<f32> = diffused.iter().zip(suitability).map(|(&d, &s)| d * (s + 0.1)).collect();
    let weighted_total: f64 = weighted.iter().map(|&v| v as f64).sum();

    if weighted_total > 1e-9 {
        let scale = (pre_total / weighted_total) as f32;
        weighted.into_iter().map(|v| v * scale).collect()
    } else {
        diffused
    }
}

/// Births per cell (§4.1 step 4). Cells with zero population produce zero
/// births regardless of suitability.
pub fn reproduce(
    own_pop: &[f32],
    total_pop: &[f32],
    suitability: &[f32],
    resources: &[f32],
    balance: &BalanceConfig,
) -> Vec<f32> {
    own_pop
        .iter()
        .zip(total_pop)
        .zip(suitability)
        .zip(resources)
        .map(|(((&p, &total), &suit), &res)| {
            if p <= 0.0 {
                return 0.0;
            }
            let capacity = (res * balance.capacity_multiplier).max(1e-3);
            let crowding = (total / capacity).min(1.0);
            p * balance.base_birth_rate * suit * (1.0 - crowding)
        })
        .collect()
}

/// Competition loss against all other species' combined mass in the same
/// cell (§4.1 step 5).
pub fn compete(own_pop: &mut [f32], other_pop_total: &[f32], strength: f32, fitness: &[f32]) {
    for ((p, &other), &fit) in own_pop.iter_mut().zip(other_pop_total).zip(fitness) {
        if *p <= 0.0 {
            continue;
        }
        let loss_fraction = (0.5_f32).min(other * strength / fit.max(0.1));
        *p = (*p * (1.0 - loss_fraction)).max(0.0);
    }
}

/// The four fixed habitat-mask channels folded into one per-cell scalar for
/// a species' habitat type, used by [`suitability`].
pub fn habitat_mask_for(env: &Tensor3, habitat_channel: EnvChannel) -> &[f32] {
    env.channel(habitat_channel.index())
}

/// Withdraw-and-redistribute migration for one species (§4.1 step 3).
/// Destinations already occupied by the species score zero — migration
/// only claims new territory. Returns the redistributed population and
/// whether the shift exceeded the 5% reporting threshold.
#[allow(clippy::too_many_arguments)]
pub fn migrate(
    own_pop: &[f32],
    suitability: &[f32],
    prey_density: Option<&[f32]>,
    death_rate_avg: f32,
    centroid: (f32, f32),
    height: usize,
    width: usize,
    is_consumer: bool,
    cooldown: bool,
    era_scale: f32,
    balance: &BalanceConfig,
) -> (Vec<f32>, bool) {
    let total: f32 = own_pop.iter().sum();
    if cooldown || total <= 0.0 {
        return (own_pop.to_vec(), false);
    }

    let base_rate =
        if death_rate_avg < balance.pressure_threshold { balance.base_migration_rate } else { balance.base_migration_rate * 2.0 };
    let rate = (base_rate * era_scale).clamp(0.0, 1.0);

    let max_dist = balance.max_migration_distance.max(1.0);
    let mut scores = vec![0.0f32; own_pop.len()];
    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            if own_pop[idx] > 0.0 {
                continue;
            }
            let dx_raw = (x as f32 - centroid.0).abs();
            let dx = dx_raw.min(width as f32 - dx_raw);
            let dy = y as f32 - centroid.1;
            let dist = (dx * dx + dy * dy).sqrt();
            let distance_weight = (1.0 - dist / max_dist).max(0.0);
            let base_score = suitability[idx] * 0.5 + distance_weight * 0.5;
            scores[idx] = if is_consumer {
                let prey = prey_density.map(|d| d[idx]).unwrap_or(0.0);
                base_score * 0.7 + (prey * suitability[idx]) * 0.3
            } else {
                base_score
            };
        }
    }

    let withdraw_total = total * rate;
    let eligible_total: f32 = scores.iter().filter(|&&s| s > balance.score_threshold).sum();
    if eligible_total <= 1e-9 {
        return (own_pop.to_vec(), false);
    }

    let mut result = own_pop.to_vec();
    for (v, &p) in result.iter_mut().zip(own_pop) {
        if p > 0.0 {
            *v = (p - (p / total) * withdraw_total).max(0.0);
        }
    }
    for (v, &s) in result.iter_mut().zip(&scores) {
        if s > balance.score_threshold {
            *v += withdraw_total * (s / eligible_total);
        }
    }

    let fraction_moved = withdraw_total / total;
    (result, fraction_moved > 0.05)
}

#[cfg(test)]
mod migration_tests {
    use super::*;

    #[test]
    fn migrate_conserves_population() {
        let balance = BalanceConfig::default();
        let mut pop = vec![0.0f32; 16];
        pop[0] = 100.0;
        let suitability = vec![0.8f32; 16];
        let (out, migrated) =
            migrate(&pop, &suitability, None, 0.2, (0.0, 0.0), 4, 4, false, false, 1.0, &balance);
        let before: f32 = pop.iter().sum();
        let after: f32 = out.iter().sum();
        assert!((before - after).abs() < 1e-2);
        assert!(migrated);
    }

    #[test]
    fn migrate_skips_on_cooldown() {
        let balance = BalanceConfig::default();
        let mut pop = vec![0.0f32; 16];
        pop[0] = 100.0;
        let suitability = vec![0.8f32; 16];
        let (out, migrated) =
            migrate(&pop, &suitability, None, 0.2, (0.0, 0.0), 4, 4, false, true, 1.0, &balance);
        assert_eq!(out, pop);
        assert!(!migrated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance() -> BalanceConfig {
        BalanceConfig::default()
    }

    #[test]
    fn mortality_rate_is_clamped() {
        let own = vec![100.0];
        let other = vec![0.0];
        let total = vec![100.0];
        let resources = vec![1.0];
        let temp = vec![20.0];
        let humidity = vec![0.5];
        let pressure = vec![0.0];
        let b = balance();
        let args = MortalityArgs {
            own_pop: &own,
            other_pop_total: &other,
            total_pop: &total,
            resources: &resources,
            env_temp: &temp,
            env_humidity: &humidity,
            overlay_external_pressure: &pressure,
            temp_pref: 0.4,
            tolerance: 10.0,
            humidity_pref: 0.5,
            trophic_level: 1.0,
            prey_density: None,
            era_scale: 1.0,
            balance: &b,
        };
        let m = mortality_rate(&args, 0);
        assert!((0.01..=0.95).contains(&m));
    }

    #[test]
    fn apply_mortality_never_negative() {
        let mut pop = vec![10.0, 5.0];
        let mortality = vec![0.9, 1.5];
        apply_mortality(&mut pop, &mortality);
        assert!(pop.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn disperse_conserves_total_population() {
        let pop = vec![10.0, 0.0, 0.0, 0.0];
        let suit = vec![0.5, 0.5, 0.5, 0.5];
        let out = disperse(&pop, &suit, 2, 2, 0.2);
        let before: f32 = pop.iter().sum();
        let after: f32 = out.iter().sum();
        assert!((before - after).abs() < 1e-3);
    }

    #[test]
    fn reproduce_produces_nothing_from_empty_cells() {
        let pop = vec![0.0, 10.0];
        let total = vec![0.0, 10.0];
        let suit = vec![1.0, 1.0];
        let res = vec![1.0, 1.0];
        let births = reproduce(&pop, &total, &suit, &res, &balance());
        assert_eq!(births[0], 0.0);
        assert!(births[1] > 0.0);
    }
}
