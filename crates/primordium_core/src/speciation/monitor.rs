//! Tensor speciation monitor (§4.4 "Tensor speciation monitor"): inspects
//! the updated `pop` tensor each turn for geographic isolation and
//! ecological divergence triggers.

use primordium_data::events::SpeciationTrigger;
use primordium_data::tensor::{SpeciesMap, Tensor3};
use std::collections::HashSet;

/// 4-connected flood fill over a species' occupied cells, returning the
/// `(x, y)` masks of each connected component.
fn connected_components(channel: &[f32], width: usize, height: usize) -> Vec<Vec<(u32, u32)>> {
    let mut visited = vec![false; channel.len()];
    let mut components = Vec::new();

    for start in 0..channel.len() {
        if visited[start] || channel[start] <= 0.0 {
            continue;
        }
        let mut stack = vec![start];
        visited[start] = true;
        let mut component = Vec::new();
        while let Some(idx) = stack.pop() {
            let x = idx % width;
            let y = idx / width;
            component.push((x as u32, y as u32));

            let mut candidates: Vec<(usize, usize)> = Vec::with_capacity(4);
            if x > 0 {
                candidates.push((x - 1, y));
            }
            if x + 1 < width {
                candidates.push((x + 1, y));
            }
            if y > 0 {
                candidates.push((x, y - 1));
            }
            if y + 1 < height {
                candidates.push((x, y + 1));
            }
            for (nx, ny) in candidates {
                let nidx = ny * width + nx;
                if !visited[nidx] && channel[nidx] > 0.0 {
                    visited[nidx] = true;
                    stack.push(nidx);
                }
            }
        }
        components.push(component);
    }
    components
}

/// Mean per-channel variance of `env` restricted to the cells a species
/// occupies, normalized by `divisor` and clipped to `[0, 1]`.
fn occupied_env_divergence(env: &Tensor3, occupied: &HashSet<(u32, u32)>, divisor: f32) -> f32 {
    if occupied.is_empty() {
        return 0.0;
    }
    let mut total_variance = 0.0f32;
    for c in 0..env.channels {
        let plane = env.channel(c);
        let values: Vec<f32> = occupied.iter().map(|&(x, y)| plane[y as usize * env.width + x as usize]).collect();
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32;
        total_variance += variance;
    }
    let mean_variance = total_variance / env.channels.max(1) as f32;
    (mean_variance / divisor.max(1e-6)).clamp(0.0, 1.0)
}

/// Scans every species with positive population for isolation/divergence
/// triggers, returned keyed by lineage code.
#[must_use]
pub fn scan(
    pop: &Tensor3,
    env: &Tensor3,
    species_map: &SpeciesMap,
    divergence_normalizer: f32,
    divergence_threshold: f32,
) -> Vec<(String, SpeciationTrigger)> {
    let mut triggers = Vec::new();

    for idx in 0..pop.channels {
        let Some(code) = species_map.code_of(idx) else { continue };
        let channel = pop.channel(idx);
        if channel.iter().all(|&p| p <= 0.0) {
            continue;
        }

        let components = connected_components(channel, pop.width, pop.height);
        if components.len() >= 2 {
            triggers.push((code.to_string(), SpeciationTrigger::GeographicIsolation { component_masks: components }));
        }

        let occupied: HashSet<(u32, u32)> = channel
            .iter()
            .enumerate()
            .filter(|&(_, &p)| p > 0.0)
            .map(|(i, _)| ((i % pop.width) as u32, (i / pop.width) as u32))
            .collect();
        let divergence = occupied_env_divergence(env, &occupied, divergence_normalizer);
        if divergence > divergence_threshold {
            triggers.push((code.to_string(), SpeciationTrigger::EcologicalDivergence { divergence }));
        }
    }

    triggers
}
