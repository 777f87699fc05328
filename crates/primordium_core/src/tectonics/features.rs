//! Geological feature placement and eruption gating (§4.3: hotspots,
//! subduction-arc and rift volcanoes, minimum inter-eruption intervals).

use crate::config::TectonicConfig;
use primordium_data::events::{TectonicEvent, TectonicEventKind};
use primordium_data::plate::{BoundaryType, GeoFeature, GeoFeatureKind};
use primordium_data::pressure::PressureDescriptor;
use rand::Rng;

/// Places a hotspot among existing features only if it respects
/// `min_hotspot_spacing` from every other hotspot (§3 "Geological feature"
/// invariant).
#[must_use]
pub fn can_place_hotspot(x: u32, y: u32, existing: &[GeoFeature], min_spacing: u32) -> bool {
    existing
        .iter()
        .filter(|f| f.kind == GeoFeatureKind::Hotspot)
        .all(|f| {
            let dx = f.x as i64 - x as i64;
            let dy = f.y as i64 - y as i64;
            ((dx * dx + dy * dy) as f64).sqrt() >= min_spacing as f64
        })
}

/// The boundary-type-dependent volcano kind that belongs at a reclassified
/// boundary cell, if any (§4.3: "subduction-arc volcanoes, rift volcanoes").
#[must_use]
pub fn volcano_kind_for_boundary(boundary: BoundaryType) -> Option<GeoFeatureKind> {
    match boundary {
        BoundaryType::Subduction => Some(GeoFeatureKind::Volcano),
        BoundaryType::Divergent => Some(GeoFeatureKind::Rift),
        _ => None,
    }
}

fn pressure_multiplier(kind: GeoFeatureKind, pressures: &[PressureDescriptor]) -> f32 {
    use primordium_data::pressure::PressureKind;
    let relevant = match kind {
        GeoFeatureKind::Volcano | GeoFeatureKind::Hotspot => PressureKind::VolcanicEruption,
        _ => PressureKind::Orogeny,
    };
    pressures
        .iter()
        .filter(|p| p.kind == relevant)
        .map(|p| 1.0 + f32::from(p.intensity) * 0.05)
        .fold(1.0, |acc, m| acc * m)
}

/// Rolls whether `feature` erupts this turn, respecting its minimum
/// inter-eruption interval and scaling the base probability by active
/// volcanic pressures. Mutates the feature's `last_eruption_turn` on a hit.
pub fn maybe_erupt<R: Rng + ?Sized>(
    feature: &mut GeoFeature,
    turn: u64,
    pressures: &[PressureDescriptor],
    config: &TectonicConfig,
    rng: &mut R,
) -> Option<TectonicEvent> {
    if !feature.can_erupt_at(turn, config.min_eruption_interval_turns) {
        return None;
    }
    let probability = (config.volcanic_base_probability * pressure_multiplier(feature.kind, pressures)
        * feature.intensity)
        .clamp(0.0, 1.0);
    if rng.gen::<f32>() >= probability {
        return None;
    }
    feature.last_eruption_turn = Some(turn);
    Some(TectonicEvent {
        kind: TectonicEventKind::Volcanic,
        turn,
        plate_id: feature.owning_plate,
        x: feature.x,
        y: feature.y,
        intensity: Some(feature.intensity),
    })
}

/// Rolls whether an earthquake occurs at a boundary cell this turn, scaled
/// by boundary type and active `earthquake_period` pressure.
pub fn maybe_earthquake<R: Rng + ?Sized>(
    boundary: BoundaryType,
    plate_id: u32,
    x: u32,
    y: u32,
    turn: u64,
    pressures: &[PressureDescriptor],
    config: &TectonicConfig,
    rng: &mut R,
) -> Option<TectonicEvent> {
    use primordium_data::pressure::PressureKind;
    let boundary_factor = match boundary {
        BoundaryType::Subduction => 2.0,
        BoundaryType::Convergent => 1.5,
        BoundaryType::Transform => 1.3,
        BoundaryType::Divergent => 1.0,
    };
    let pressure_factor = pressures
        .iter()
        .filter(|p| p.kind == PressureKind::EarthquakePeriod)
        .map(|p| 1.0 + f32::from(p.intensity) * 0.02)
        .fold(1.0, |acc, m| acc * m);

    let probability = (config.earthquake_base_probability * boundary_factor * pressure_factor).clamp(0.0, 1.0);
    if rng.gen::<f32>() >= probability {
        return None;
    }
    Some(TectonicEvent { kind: TectonicEventKind::Earthquake, turn, plate_id, x, y, intensity: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn hotspot(x: u32, y: u32) -> GeoFeature {
        GeoFeature { kind: GeoFeatureKind::Hotspot, x, y, intensity: 0.5, owning_plate: 0, dormant: false, last_eruption_turn: None }
    }

    #[test]
    fn hotspot_spacing_is_enforced() {
        let existing = vec![hotspot(0, 0)];
        assert!(!can_place_hotspot(1, 1, &existing, 4));
        assert!(can_place_hotspot(10, 10, &existing, 4));
    }

    #[test]
    fn eruption_respects_min_interval_even_with_high_probability() {
        let mut feature = GeoFeature {
            kind: GeoFeatureKind::Volcano,
            x: 0,
            y: 0,
            intensity: 1.0,
            owning_plate: 0,
            dormant: false,
            last_eruption_turn: Some(5),
        };
        let config = TectonicConfig { min_eruption_interval_turns: 20, volcanic_base_probability: 1.0, ..TectonicConfig::default() };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(maybe_erupt(&mut feature, 10, &[], &config, &mut rng).is_none());
    }

    #[test]
    fn divergent_boundary_places_a_rift() {
        assert_eq!(volcano_kind_for_boundary(BoundaryType::Divergent), Some(GeoFeatureKind::Rift));
        assert_eq!(volcano_kind_for_boundary(BoundaryType::Transform), None);
    }
}
