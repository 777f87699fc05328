//! Auto-tradeoff calculator (§4.4 "Auto-tradeoff calculator"): compensates
//! proposed trait gains with penalties drawn first from a competition map,
//! then from a default pool, enforcing energy conservation.

use crate::config::TradeoffConfig;
use primordium_data::species::TraitName;
use std::collections::HashMap;

/// Computes a compensating penalty set for a set of proposed gains so that
/// the weighted total penalty equals `tradeoff_ratio * total_gain_cost`.
#[must_use]
pub fn compute_penalties(
    gains: &HashMap<TraitName, f32>,
    parent_traits: &HashMap<TraitName, f32>,
    config: &TradeoffConfig,
) -> HashMap<TraitName, f32> {
    if gains.is_empty() {
        return HashMap::new();
    }

    let total_gain_cost: f32 =
        gains.iter().map(|(trait_name, delta)| delta * config.energy_costs.get(trait_name).copied().unwrap_or(1.0)).sum();
    let mut remaining_cost = total_gain_cost * config.tradeoff_ratio;
    if remaining_cost <= 0.0 {
        return HashMap::new();
    }

    let mut candidates: Vec<TraitName> = Vec::new();
    for gain_trait in gains.keys() {
        if let Some(competitors) = config.competition_map.get(gain_trait) {
            for &c in competitors {
                if !gains.contains_key(&c) && !candidates.contains(&c) {
                    candidates.push(c);
                }
            }
        }
    }
    for &c in &config.default_penalty_pool {
        if !gains.contains_key(&c) && !candidates.contains(&c) {
            candidates.push(c);
        }
    }

    let mut penalties = HashMap::new();
    for trait_name in candidates {
        if remaining_cost <= 0.0 {
            break;
        }
        let cost_per_unit = config.energy_costs.get(&trait_name).copied().unwrap_or(1.0).max(1e-3);
        let parent_value = parent_traits.get(&trait_name).copied().unwrap_or(0.0);
        let max_penalty = (parent_value * 0.3).min(config.max_single_penalty).max(0.0);
        if max_penalty <= 0.0 {
            continue;
        }
        let cost_affordable = remaining_cost / cost_per_unit;
        let penalty = cost_affordable.min(max_penalty);
        if penalty < config.min_penalty_threshold {
            continue;
        }
        penalties.insert(trait_name, penalty);
        remaining_cost -= penalty * cost_per_unit;
    }

    penalties
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn penalties_are_drawn_from_competition_map_first() {
        let config = TradeoffConfig::default();
        let mut gains = HashMap::new();
        gains.insert(TraitName::Locomotion, 2.0);
        let mut parent = HashMap::new();
        parent.insert(TraitName::PhysicalDefense, 10.0);
        parent.insert(TraitName::BodySize, 10.0);

        let penalties = compute_penalties(&gains, &parent, &config);
        assert!(!penalties.is_empty());
        assert!(penalties.contains_key(&TraitName::PhysicalDefense) || penalties.contains_key(&TraitName::BodySize));
    }

    #[test]
    fn no_gain_produces_no_penalty() {
        let config = TradeoffConfig::default();
        let penalties = compute_penalties(&HashMap::new(), &HashMap::new(), &config);
        assert!(penalties.is_empty());
    }

    #[test]
    fn single_penalty_never_exceeds_cap() {
        let config = TradeoffConfig::default();
        let mut gains = HashMap::new();
        gains.insert(TraitName::Intelligence, 50.0);
        let mut parent = HashMap::new();
        parent.insert(TraitName::ReproductiveRate, 1000.0);
        parent.insert(TraitName::BodySize, 1000.0);

        let penalties = compute_penalties(&gains, &parent, &config);
        for &value in penalties.values() {
            assert!(value <= config.max_single_penalty + 1e-3);
        }
    }
}
