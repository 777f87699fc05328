//! Pressure bridge (§4.6): folds structured pressure descriptors into
//! `env`'s temperature/humidity/external-pressure channels and into the
//! caller-visible `pressure_overlay` summary tensor. Idempotent and
//! stateless across turns — it always starts from a zeroed external-pressure
//! channel and recomputes the overlay from scratch.

use primordium_data::pressure::{PressureDescriptor, PressureKind};
use primordium_data::tensor::{EnvChannel, Tensor3};

const OVERLAY_TEMPERATURE: usize = 0;
const OVERLAY_HUMIDITY: usize = 1;
const OVERLAY_EXTERNAL: usize = 2;

/// Applies one turn's pressure descriptors to `env` in place and returns the
/// 3-channel caller-visible overlay (temperature delta, humidity delta,
/// external-pressure intensity) matching [`primordium_data::context::TurnContext::pressure_overlay`].
///
/// Tectonic pressures ([`PressureKind::is_tectonic`]) are not applied here;
/// they are consumed directly by the tectonic subsystem's motion engine.
pub fn apply(env: &mut Tensor3, pressures: &[PressureDescriptor]) -> Tensor3 {
    env.zero_channel(EnvChannel::ExternalPressure.index());
    let mut overlay = Tensor3::zeros(3, env.height, env.width);

    for pressure in pressures {
        if pressure.kind.is_tectonic() {
            continue;
        }
        let intensity = f32::from(pressure.intensity);

        for y in 0..env.height as u32 {
            for x in 0..env.width as u32 {
                if !pressure.applies_to(x, y) {
                    continue;
                }
                let idx = y as usize * env.width + x as usize;
                match pressure.kind {
                    PressureKind::Temperature => {
                        let delta = intensity;
                        env.channel_mut(EnvChannel::Temperature.index())[idx] += delta;
                        overlay.channel_mut(OVERLAY_TEMPERATURE)[idx] += delta;
                    }
                    PressureKind::Drought => {
                        let delta = -intensity * 0.1;
                        let humidity = env.channel_mut(EnvChannel::Humidity.index());
                        humidity[idx] = (humidity[idx] + delta).clamp(0.0, 1.0);
                        overlay.channel_mut(OVERLAY_HUMIDITY)[idx] += delta;
                    }
                    PressureKind::Humidity => {
                        let delta = intensity * 0.1;
                        let humidity = env.channel_mut(EnvChannel::Humidity.index());
                        humidity[idx] = (humidity[idx] + delta).clamp(0.0, 1.0);
                        overlay.channel_mut(OVERLAY_HUMIDITY)[idx] += delta;
                    }
                    PressureKind::Radiation | PressureKind::Predation => {
                        let delta = intensity * 0.1;
                        env.channel_mut(EnvChannel::ExternalPressure.index())[idx] += delta;
                        overlay.channel_mut(OVERLAY_EXTERNAL)[idx] += delta;
                    }
                    PressureKind::VolcanicEruption => {
                        let delta = intensity * 0.2;
                        env.channel_mut(EnvChannel::ExternalPressure.index())[idx] += delta;
                        overlay.channel_mut(OVERLAY_EXTERNAL)[idx] += delta;
                    }
                    PressureKind::Orogeny | PressureKind::EarthquakePeriod => unreachable!("filtered by is_tectonic"),
                }
            }
        }
    }

    for v in env.channel_mut(EnvChannel::ExternalPressure.index()) {
        *v = v.clamp(0.0, 1.0);
    }

    overlay
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_pressure_raises_temperature_and_overlay() {
        let mut env = Tensor3::zeros(EnvChannel::COUNT, 2, 2);
        let pressures = vec![PressureDescriptor { kind: PressureKind::Temperature, intensity: 5, extent: None, narrative_note: None }];
        let overlay = apply(&mut env, &pressures);
        assert!(env.channel(EnvChannel::Temperature.index())[0] > 0.0);
        assert!(overlay.channel(OVERLAY_TEMPERATURE)[0] > 0.0);
    }

    #[test]
    fn external_pressure_channel_is_zeroed_before_reapplication() {
        let mut env = Tensor3::zeros(EnvChannel::COUNT, 2, 2);
        env.set(EnvChannel::ExternalPressure.index(), 0, 0, 0.9);
        apply(&mut env, &[]);
        assert_eq!(env.get(EnvChannel::ExternalPressure.index(), 0, 0), 0.0);
    }

    #[test]
    fn spatial_extent_confines_the_effect() {
        let mut env = Tensor3::zeros(EnvChannel::COUNT, 4, 4);
        let pressures = vec![PressureDescriptor {
            kind: PressureKind::Predation,
            intensity: 10,
            extent: Some(primordium_data::pressure::PressureExtent { x0: 0, y0: 0, x1: 0, y1: 0 }),
            narrative_note: None,
        }];
        apply(&mut env, &pressures);
        assert!(env.get(EnvChannel::ExternalPressure.index(), 0, 0) > 0.0);
        assert_eq!(env.get(EnvChannel::ExternalPressure.index(), 3, 3), 0.0);
    }

    #[test]
    fn tectonic_pressures_are_not_applied_to_env() {
        let mut env = Tensor3::zeros(EnvChannel::COUNT, 2, 2);
        let pressures = vec![PressureDescriptor { kind: PressureKind::Orogeny, intensity: 8, extent: None, narrative_note: None }];
        let overlay = apply(&mut env, &pressures);
        assert_eq!(overlay.channel_sum(OVERLAY_EXTERNAL), 0.0);
    }
}
