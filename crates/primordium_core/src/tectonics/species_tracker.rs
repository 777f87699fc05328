//! Per-plate species presence and inter-plate connectivity tracking (§4.3
//! "Species tracker"): emits [`IsolationEvent`]/[`ContactEvent`] when the
//! connectivity between two plates a species occupies changes.

use primordium_data::events::{ContactEvent, InteractionType, IsolationEvent};
use primordium_data::plate::BoundaryType;
use primordium_data::species::Species;
use primordium_data::tensor::{SpeciesMap, Tensor3};
use std::collections::{HashMap, HashSet};

/// `(min(a, b), max(a, b))` so the pair key is order-independent.
fn pair_key(a: u32, b: u32) -> (u32, u32) {
    if a <= b { (a, b) } else { (b, a) }
}

#[derive(Debug, Clone, Default)]
pub struct SpeciesTracker {
    /// lineage_code -> set of plate ids with positive population.
    species_on_plate: HashMap<String, HashSet<u32>>,
    /// Whether a land/sea path currently connects a plate pair.
    connected: HashMap<(u32, u32), bool>,
}

impl SpeciesTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Land/sea connectivity between adjacent plates: connected unless the
    /// boundary between them is a subduction zone, which severs dispersal.
    fn plates_connected(boundary: Option<BoundaryType>) -> bool {
        !matches!(boundary, Some(BoundaryType::Subduction))
    }

    /// Recomputes species-per-plate presence from `pop`/`plate_of_tile`, then
    /// diffs this turn's plate-pair connectivity against last turn's to emit
    /// isolation/contact events for species present on both sides of a pair.
    pub fn update(
        &mut self,
        pop: &Tensor3,
        species: &[Species],
        species_map: &SpeciesMap,
        plate_of_tile: &[u32],
        boundaries: &HashMap<(u32, u32), BoundaryType>,
        turn: u64,
    ) -> (Vec<IsolationEvent>, Vec<ContactEvent>) {
        let mut new_presence: HashMap<String, HashSet<u32>> = HashMap::new();
        for (code, idx) in species.iter().filter_map(|s| species_map.index_of(&s.lineage_code).map(|i| (s.lineage_code.clone(), i))) {
            let channel = pop.channel(idx);
            let mut plates = HashSet::new();
            for (cell, &p) in channel.iter().enumerate() {
                if p > 0.0 {
                    plates.insert(plate_of_tile[cell]);
                }
            }
            if !plates.is_empty() {
                new_presence.insert(code, plates);
            }
        }

        let mut new_connected: HashMap<(u32, u32), bool> = HashMap::new();
        for (&pair, &boundary) in boundaries {
            new_connected.insert(pair, Self::plates_connected(Some(boundary)));
        }

        let mut isolation_events = Vec::new();
        let mut contact_events = Vec::new();

        for (&pair, &now_connected) in &new_connected {
            let was_connected = self.connected.get(&pair).copied().unwrap_or(true);
            if was_connected == now_connected {
                continue;
            }
            let (plate_a, plate_b) = pair;
            for (code, plates) in &new_presence {
                if !plates.contains(&plate_a) || !plates.contains(&plate_b) {
                    continue;
                }
                if !now_connected {
                    isolation_events.push(IsolationEvent { lineage_code: code.clone(), plate_a, plate_b, turn });
                } else {
                    let interaction = species
                        .iter()
                        .find(|s| &s.lineage_code == code)
                        .map(Self::interaction_for)
                        .unwrap_or(InteractionType::Neutral);
                    contact_events.push(ContactEvent { lineage_code: code.clone(), plate_a, plate_b, turn, interaction });
                }
            }
        }

        self.species_on_plate = new_presence;
        for (pair, connected) in new_connected {
            self.connected.insert(pair, connected);
        }

        (isolation_events, contact_events)
    }

    fn interaction_for(species: &Species) -> InteractionType {
        if species.is_consumer() {
            InteractionType::Predation
        } else if species.trophic_level < 2.0 {
            InteractionType::Competition
        } else {
            InteractionType::Neutral
        }
    }

    #[must_use]
    pub fn plates_for(&self, lineage_code: &str) -> Option<&HashSet<u32>> {
        self.species_on_plate.get(lineage_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primordium_data::species::{DietType, HabitatType, SpeciesStatus};
    use std::collections::HashMap as Map;

    fn species(code: &str, trophic: f32) -> Species {
        Species {
            lineage_code: code.into(),
            parent_code: None,
            genus_code: code.into(),
            common_name: "Test".into(),
            latin_name: "Testus".into(),
            description: String::new(),
            traits: Map::new(),
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
            created_turn: 0,
            is_background: false,
            hybrid_parent_codes: None,
            hybrid_fertility: None,
            dormant_genes: Map::new(),
        }
    }

    #[test]
    fn newly_severed_connection_emits_isolation_for_shared_species() {
        let mut tracker = SpeciesTracker::new();
        tracker.connected.insert((0, 1), true);

        let mut pop = Tensor3::zeros(1, 1, 2);
        pop.set(0, 0, 0, 10.0);
        pop.set(0, 0, 1, 10.0);
        let mut map = SpeciesMap::new();
        map.insert("Rex");
        let species = vec![species("Rex", 1.0)];
        let plate_of_tile = vec![0u32, 1];
        let mut boundaries = HashMap::new();
        boundaries.insert(pair_key(0, 1), BoundaryType::Subduction);

        let (isolation, contact) = tracker.update(&pop, &species, &map, &plate_of_tile, &boundaries, 5);
        assert_eq!(isolation.len(), 1);
        assert!(contact.is_empty());
        assert_eq!(isolation[0].lineage_code, "Rex");
    }

    #[test]
    fn regained_connection_emits_contact_event() {
        let mut tracker = SpeciesTracker::new();
        tracker.connected.insert((0, 1), false);

        let mut pop = Tensor3::zeros(1, 1, 2);
        pop.set(0, 0, 0, 10.0);
        pop.set(0, 0, 1, 10.0);
        let mut map = SpeciesMap::new();
        map.insert("Rex");
        let species = vec![species("Rex", 1.0)];
        let plate_of_tile = vec![0u32, 1];
        let mut boundaries = HashMap::new();
        boundaries.insert(pair_key(0, 1), BoundaryType::Divergent);

        let (isolation, contact) = tracker.update(&pop, &species, &map, &plate_of_tile, &boundaries, 6);
        assert!(isolation.is_empty());
        assert_eq!(contact.len(), 1);
    }
}
