use criterion::{black_box, criterion_group, criterion_main, Criterion};
use primordium_core::config::BalanceConfig;
use primordium_core::tensors::kernels::{self, MortalityArgs};

const GRID: usize = 64;
const PLANE: usize = GRID * GRID;

fn bench_mortality_rate(c: &mut Criterion) {
    let own_pop = vec![120.0f32; PLANE];
    let other_pop_total = vec![40.0f32; PLANE];
    let total_pop = vec![160.0f32; PLANE];
    let resources = vec![0.6f32; PLANE];
    let env_temp = vec![26.0f32; PLANE];
    let env_humidity = vec![0.5f32; PLANE];
    let overlay_external_pressure = vec![0.1f32; PLANE];
    let balance = BalanceConfig::default();

    let args = MortalityArgs {
        own_pop: &own_pop,
        other_pop_total: &other_pop_total,
        total_pop: &total_pop,
        resources: &resources,
        env_temp: &env_temp,
        env_humidity: &env_humidity,
        overlay_external_pressure: &overlay_external_pressure,
        temp_pref: 0.5,
        tolerance: 0.4,
        humidity_pref: 0.5,
        trophic_level: 2.0,
        prey_density: None,
        era_scale: 1.0,
        balance: &balance,
    };

    c.bench_function("mortality_rate_64x64", |b| {
        b.iter(|| {
            let total: f32 = (0..PLANE).map(|cell| kernels::mortality_rate(&args, cell)).sum();
            black_box(total)
        })
    });
}

fn bench_disperse(c: &mut Criterion) {
    let own_pop: Vec<f32> = (0..PLANE).map(|i| (i % 37) as f32).collect();
    let suitability: Vec<f32> = (0..PLANE).map(|i| 0.2 + (i % 11) as f32 * 0.05).collect();

    c.bench_function("disperse_64x64", |b| {
        b.iter(|| {
            let diffused = kernels::disperse(&own_pop, &suitability, GRID, GRID, 0.15);
            black_box(diffused)
        })
    });
}

criterion_group!(benches, bench_mortality_rate, bench_disperse);
criterion_main!(benches);
