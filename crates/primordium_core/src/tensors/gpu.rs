//! GPU-accelerated backend (`gpu` feature): offloads only the mortality
//! kernel to a `wgpu` compute shader, since it is the one step that is a
//! pure elementwise map with no cross-cell or cross-species dependency.
//! Dispersal, migration, reproduction and competition delegate to
//! [`super::dense::DenseBackend`] — those steps are bandwidth- rather than
//! compute-bound at the grid sizes this engine targets, so shipping them
//! to the GPU would not pay for the transfer.
//!
//! Adapted from the compute-dispatch idiom used for n-body forces in
//! `matrix_gpu::dispatch` (bind group + compute pass + workgroup dispatch),
//! but against raw `wgpu` rather than a game engine's render-graph wrapper:
//! this is a headless batch kernel with no frame loop to hook into.

use super::dense::run_post_mortality;
use super::{other_species_total, total_population, EcologyBackend, StageContext, TurnOutputs};
use crate::error::{EngineError, EngineResult};
use primordium_data::tensor::{EnvChannel, SpeciesParamFeature, Tensor3};
use wgpu::util::DeviceExt;

const WORKGROUP_SIZE: u32 = 64;

const MORTALITY_SHADER: &str = r#"
struct Params {
    plane: u32,
    temp_pref: f32,
    tolerance: f32,
    humidity_pref: f32,
    trophic_level: f32,
    era_scale: f32,
    base_mortality: f32,
    temp_weight: f32,
    competition_weight: f32,
    resource_weight: f32,
    trophic_weight: f32,
    capacity_multiplier: f32,
};

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read> own_pop: array<f32>;
@group(0) @binding(2) var<storage, read> other_pop_total: array<f32>;
@group(0) @binding(3) var<storage, read> total_pop: array<f32>;
@group(0) @binding(4) var<storage, read> resources: array<f32>;
@group(0) @binding(5) var<storage, read> env_temp: array<f32>;
@group(0) @binding(6) var<storage, read> env_humidity: array<f32>;
@group(0) @binding(7) var<storage, read> external_pressure: array<f32>;
@group(0) @binding(8) var<storage, read_write> mortality_out: array<f32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i >= params.plane) {
        return;
    }

    let temp_dev = tanh(abs(env_temp[i] - params.temp_pref * 50.0) / max(params.tolerance, 1e-3));
    let humidity_dev = clamp(abs(env_humidity[i] - params.humidity_pref) * 0.5, 0.0, 0.4);

    let own = max(own_pop[i], 0.0);
    let competition = clamp((other_pop_total[i] / (own + 100.0)) * 0.1, 0.0, 0.3);

    let capacity = max(resources[i] * params.capacity_multiplier, 1e-3);
    let resource = clamp((total_pop[i] / capacity - 0.5) * 0.4, 0.0, 0.4);

    var trophic_scarcity = 0.0;
    if (params.trophic_level >= 2.0) {
        trophic_scarcity = 1.0;
    }

    let external = clamp(external_pressure[i], 0.0, 0.5);

    let weighted = temp_dev * params.temp_weight
        + competition * params.competition_weight
        + resource * params.resource_weight
        + trophic_scarcity * params.trophic_weight
        + humidity_dev
        + external;

    let m = (params.base_mortality + weighted) * params.era_scale;
    mortality_out[i] = clamp(m, 0.01, 0.95);
}
"#;

/// Holds the `wgpu` device/queue and compiled pipeline for the mortality
/// kernel. Every other stage runs through [`run_post_mortality`], the same
/// dispersal/migration/reproduction/competition code the dense backend uses.
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl GpuBackend {
    /// Synchronously requests a `wgpu` adapter/device. Returns an error if
    /// no compatible adapter is available, letting the caller fall back to
    /// [`super::select_backend`]'s next candidate.
    pub fn try_new() -> EngineResult<Self> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| EngineError::BackendInit("no compatible wgpu adapter".into()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("primordium-ecology-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))
        .map_err(|e| EngineError::BackendInit(e.to_string()))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mortality-kernel"),
            source: wgpu::ShaderSource::Wgsl(MORTALITY_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mortality-bind-group-layout"),
            entries: &storage_bindings(),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mortality-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("mortality-pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "main",
        });

        Ok(Self { device, queue, pipeline, bind_group_layout })
    }

    fn dispatch_mortality(&self, plane: usize, params_bytes: &[u8], buffers: &[&[f32]]) -> Vec<f32> {
        let make_buffer = |label: &str, data: &[f32], usage: wgpu::BufferUsages| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage,
            })
        };

        let params_buf = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mortality-params"),
            contents: params_bytes,
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let storage_usage = wgpu::BufferUsages::STORAGE;
        let own_pop = make_buffer("own_pop", buffers[0], storage_usage);
        let other_pop_total = make_buffer("other_pop_total", buffers[1], storage_usage);
        let total_pop = make_buffer("total_pop", buffers[2], storage_usage);
        let resources = make_buffer("resources", buffers[3], storage_usage);
        let env_temp = make_buffer("env_temp", buffers[4], storage_usage);
        let env_humidity = make_buffer("env_humidity", buffers[5], storage_usage);
        let external_pressure = make_buffer("external_pressure", buffers[6], storage_usage);

        let output_size = (plane * std::mem::size_of::<f32>()) as u64;
        let output_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mortality-out"),
            size: output_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mortality-readback"),
            size: output_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mortality-bind-group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: params_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: own_pop.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: other_pop_total.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: total_pop.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 4, resource: resources.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 5, resource: env_temp.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 6, resource: env_humidity.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 7, resource: external_pressure.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 8, resource: output_buf.as_entire_binding() },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("mortality-encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("mortality-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let workgroups = (plane as u32).div_ceil(WORKGROUP_SIZE);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }
        encoder.copy_buffer_to_buffer(&output_buf, 0, &readback_buf, 0, output_size);
        self.queue.submit(Some(encoder.finish()));

        let slice = readback_buf.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv().expect("map_async callback dropped").expect("buffer map failed");

        let data = slice.get_mapped_range();
        let result: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        readback_buf.unmap();
        result
    }
}

fn storage_bindings() -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = vec![wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer { ty: wgpu::BufferBindingType::Uniform, has_dynamic_offset: false, min_binding_size: None },
        count: None,
    }];
    for binding in 1..=7u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: 8,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    });
    entries
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct MortalityParams {
    plane: u32,
    temp_pref: f32,
    tolerance: f32,
    humidity_pref: f32,
    trophic_level: f32,
    era_scale: f32,
    base_mortality: f32,
    temp_weight: f32,
    competition_weight: f32,
    resource_weight: f32,
    trophic_weight: f32,
    capacity_multiplier: f32,
}

impl EcologyBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
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

        let mut mortality_rates = Tensor3::zeros(species_count, pop.height, pop.width);
        let mut death_counts = vec![0.0f64; species_count];

        for s in 0..species_count {
            let other = other_species_total(&pop, s);
            let before: f64 = pop.channel(s).iter().map(|&v| v as f64).sum();

            let params = MortalityParams {
                plane: plane as u32,
                temp_pref: ctx.species_params.get(s, SpeciesParamFeature::TemperaturePref),
                tolerance: ctx.species_params.get(s, SpeciesParamFeature::ToleranceWidth).max(1e-3),
                humidity_pref: ctx.species_params.get(s, SpeciesParamFeature::HumidityPref),
                trophic_level: ctx.trophic_levels[s],
                era_scale,
                base_mortality: ctx.balance.base_mortality,
                temp_weight: ctx.balance.temp_mortality_weight,
                competition_weight: ctx.balance.competition_weight,
                resource_weight: ctx.balance.resource_weight,
                trophic_weight: ctx.balance.trophic_weight,
                capacity_multiplier: ctx.balance.capacity_multiplier,
            };

            let rates = self.dispatch_mortality(
                plane,
                bytemuck::bytes_of(&params),
                &[pop.channel(s), &other, &total_before, &resources, &env_temp, &env_humidity, &external_pressure],
            );

            crate::tensors::kernels::apply_mortality(pop.channel_mut(s), &rates);
            mortality_rates.channel_mut(s).copy_from_slice(&rates);
            let after: f64 = pop.channel(s).iter().map(|&v| v as f64).sum();
            death_counts[s] = (before - after).max(0.0);
        }

        run_post_mortality(pop, ctx, mortality_rates, death_counts)
    }
}
