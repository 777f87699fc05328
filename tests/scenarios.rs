//! End-to-end scenarios and cross-cutting invariants (spec §8) exercised
//! against the public `Engine` facade.

use primordium_core::config::{AppConfig, WorldConfig};
use primordium_data::pressure::{PressureDescriptor, PressureKind};
use primordium_data::species::{DietType, HabitatType, MorphologyStat, Species, SpeciesStatus};
use primordium_lib::engine::{Engine, TurnRunRequest};
use std::collections::HashMap;

fn founder(lineage_code: &str, population: f64, trophic_level: f32, diet: DietType, prey_species: Vec<String>) -> Species {
    let mut morphology = HashMap::new();
    morphology.insert(MorphologyStat::PopulationCount, population);
    Species {
        lineage_code: lineage_code.to_string(),
        parent_code: None,
        genus_code: lineage_code.to_string(),
        common_name: lineage_code.to_string(),
        latin_name: format!("{lineage_code} foundus"),
        description: String::new(),
        traits: HashMap::new(),
        hidden_traits: HashMap::new(),
        morphology,
        organs: HashMap::new(),
        plasticity_buffer: Some(0.2),
        habitat_type: HabitatType::Terrestrial,
        diet_type: diet,
        trophic_level,
        prey_species,
        prey_preferences: HashMap::new(),
        status: SpeciesStatus::Alive,
        created_turn: 0,
        is_background: false,
        hybrid_parent_codes: None,
        hybrid_fertility: None,
        dormant_genes: HashMap::new(),
    }
}

fn config(width: u32, height: u32, seed: u64) -> AppConfig {
    AppConfig { world: WorldConfig { width, height, seed: Some(seed), ..WorldConfig::default() }, ..AppConfig::default() }
}

/// §8: "For every turn and species: 0 <= pop[s, y, x] for all (y, x)."
#[test]
fn population_never_goes_negative_across_many_turns() {
    let species = vec![founder("Rex", 10_000.0, 1.0, DietType::Autotroph, vec![])];
    let mut engine = Engine::genesis(config(16, 16, 1), species).unwrap();
    let reports = engine.run_request(&TurnRunRequest { rounds: 20, pressures: vec![] }).unwrap();

    assert_eq!(reports.len(), 20);
    for report in &reports {
        for snapshot in &report.species_snapshots {
            assert!(snapshot.population >= 0.0, "population went negative: {snapshot:?}");
        }
    }
}

/// §8 scenario 2 (temperature kill), loosened to a directional claim: a
/// sustained, far-out-of-tolerance temperature pressure drives population
/// down rather than up over time.
#[test]
fn sustained_extreme_heat_drives_population_down() {
    let species = vec![founder("Rex", 10_000.0, 1.0, DietType::Autotroph, vec![])];
    let mut engine = Engine::genesis(config(16, 16, 2), species).unwrap();
    let heat = vec![PressureDescriptor { kind: PressureKind::Temperature, intensity: 10, extent: None, narrative_note: None }];

    let first = engine.run_request(&TurnRunRequest { rounds: 1, pressures: heat.clone() }).unwrap();
    let after_first = first[0].species_snapshots.first().map(|s| s.population).unwrap_or(0.0);

    let rest = engine.run_request(&TurnRunRequest { rounds: 14, pressures: heat }).unwrap();
    let final_population = rest.last().unwrap().species_snapshots.first().map(|s| s.population).unwrap_or(0.0);

    assert!(final_population < after_first, "expected sustained heat to reduce population further: {after_first} -> {final_population}");
}

/// §8 scenario 3 (predator-prey), loosened: both species should still be
/// represented in the turn reports after a moderate run, i.e. the consumer
/// does not collapse to zero immediately nor does the producer get wiped
/// out by a single predator within a handful of turns.
#[test]
fn predator_and_prey_both_persist_for_several_turns() {
    let producer = founder("Aaa", 50_000.0, 1.0, DietType::Autotroph, vec![]);
    let carnivore = founder("Bbb", 200.0, 3.0, DietType::Carnivore, vec!["Aaa".to_string()]);
    let mut engine = Engine::genesis(config(32, 32, 3), vec![producer, carnivore]).unwrap();

    let reports = engine.run_request(&TurnRunRequest { rounds: 10, pressures: vec![] }).unwrap();
    let last = reports.last().unwrap();
    assert_eq!(last.species_snapshots.len(), 2);
    assert!(last.species_snapshots.iter().any(|s| s.lineage_code == "Aaa" && s.population > 0.0));
}

/// §8: "Tile-plate coverage: sum(plate.tile_count) == W x H always."
#[test]
fn plate_tile_counts_cover_the_whole_grid() {
    let species = vec![founder("Rex", 100.0, 1.0, DietType::Autotroph, vec![])];
    let engine = Engine::genesis(config(20, 12, 4), species).unwrap();
    let snapshot = engine.to_snapshot();

    let total: u32 = snapshot.plates.iter().map(|p| p.tile_count).sum();
    assert_eq!(total, snapshot.width * snapshot.height);
}

/// §8 round-trip law: save then load yields an engine whose next turn
/// report carries forward the same turn index and species roster.
#[test]
fn snapshot_round_trip_preserves_turn_index_and_species() {
    let species = vec![founder("Rex", 500.0, 1.0, DietType::Autotroph, vec![])];
    let mut engine = Engine::genesis(config(10, 10, 5), species).unwrap();
    engine.run_request(&TurnRunRequest { rounds: 3, pressures: vec![] }).unwrap();

    let snapshot = engine.to_snapshot();
    assert_eq!(snapshot.turn, 3);

    let mut reloaded = Engine::from_snapshot(config(10, 10, 5), snapshot).unwrap();
    assert_eq!(reloaded.turn_index(), 3);
    let reports = reloaded.run_request(&TurnRunRequest { rounds: 1, pressures: vec![] }).unwrap();
    assert_eq!(reports[0].turn_index, 4);
}

/// An invalid request (rounds == 0) is rejected before any turn runs.
#[test]
fn zero_round_request_is_rejected_before_any_turn_runs() {
    let species = vec![founder("Rex", 100.0, 1.0, DietType::Autotroph, vec![])];
    let mut engine = Engine::genesis(config(8, 8, 6), species).unwrap();
    let result = engine.run_request(&TurnRunRequest { rounds: 0, pressures: vec![] });
    assert!(result.is_err());
    assert_eq!(engine.turn_index(), 0);
}
