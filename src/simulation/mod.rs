pub mod consumers;
pub mod kernel;
pub mod leaves;
pub mod potential;
pub mod sampler;
pub mod statistics;

use std::time::Instant;

use glam::Vec3;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::field::{bake_curl, CurlField};
use crate::simulation::consumers::{ambient_wind_volume, ShaderGlobals};
use crate::simulation::kernel::{DispatchKernel, FieldKernel, ReferenceKernel};
use crate::simulation::leaves::{LeafReport, LeafSystem};
use crate::simulation::potential::{FieldParams, PlayerState, WindPotentialField};
use crate::simulation::sampler::{
    DispatchEvaluator, InfluenceSphere, ReferenceEvaluator, WindEvaluator, WindParams,
    WindSampler,
};
use crate::simulation::statistics::FrameStatistics;

/// Per-frame inputs supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    pub player: PlayerState,
    pub dt: f32,
}

/// Result of executing a single frame.
#[derive(Debug, Clone)]
pub struct FrameResult {
    pub statistics: FrameStatistics,
    pub globals: ShaderGlobals,
    pub leaves: LeafReport,
    /// Ambient wind loop level at the player.
    pub ambient_volume: f32,
    /// Phase timings in ms: [FieldUpdate, ShaderGlobals, Leaves, Statistics]
    pub phase_timings_ms: [f32; 4],
}

/// Everything the wind core owns between frames.
pub struct WindSystem {
    params: WindParams,
    field_params: FieldParams,
    curl: CurlField,
    field: WindPotentialField,
    kernel: Box<dyn FieldKernel>,
    evaluator: Box<dyn WindEvaluator>,
    spheres: Vec<InfluenceSphere>,
    wind_sphere_index: usize,
    ambient_master_volume: f32,
    leaves: LeafSystem,
    frame: u64,
    time: f32,
}

impl WindSystem {
    /// Bake the curl texture and allocate the field as configured.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, String> {
        let curl = bake_curl(config.bake.size, config.bake.seed).map_err(|e| e.to_string())?;
        let (kernel, evaluator): (Box<dyn FieldKernel>, Box<dyn WindEvaluator>) =
            if config.field.parallel {
                (Box::new(DispatchKernel), Box::new(DispatchEvaluator))
            } else {
                (Box::new(ReferenceKernel), Box::new(ReferenceEvaluator))
            };

        let system = WindSystem {
            params: WindParams::from(&config.wind),
            field_params: FieldParams::new(&config.field, config.wind.dynamic_wind_radius),
            curl,
            field: WindPotentialField::new(config.field.size, config.field.range),
            kernel,
            evaluator,
            spheres: config
                .wind
                .influence_spheres
                .iter()
                .map(|s| InfluenceSphere::new(Vec3::from_array(s.center), s.radius))
                .collect(),
            wind_sphere_index: config.wind.wind_sphere_index,
            ambient_master_volume: config.wind.ambient_master_volume,
            leaves: LeafSystem::scatter(&config.leaves),
            frame: 0,
            time: 0.0,
        };
        info!(
            field_size = config.field.size,
            field_range = config.field.range,
            kernel = system.kernel.name(),
            evaluator = system.evaluator.name(),
            influence_spheres = system.spheres.len(),
            leaves = system.leaves.leaves().len(),
            "Wind system ready"
        );
        Ok(system)
    }

    pub fn params(&self) -> WindParams {
        self.params
    }

    /// Replace the wind scalars; takes effect from the next sample.
    pub fn set_params(&mut self, params: WindParams) {
        self.params = params;
        self.field_params.dynamic_wind_radius = params.dynamic_radius;
    }

    pub fn set_influence_spheres(&mut self, spheres: Vec<InfluenceSphere>) {
        self.spheres = spheres;
    }

    pub fn influence_spheres(&self) -> &[InfluenceSphere] {
        &self.spheres
    }

    /// Sphere the ambient wind loop fades around; unbounded when none is set.
    pub fn wind_sphere(&self) -> InfluenceSphere {
        self.spheres
            .get(self.wind_sphere_index)
            .copied()
            .unwrap_or_else(InfluenceSphere::always)
    }

    pub fn curl(&self) -> &CurlField {
        &self.curl
    }

    pub fn field(&self) -> &WindPotentialField {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut WindPotentialField {
        &mut self.field
    }

    pub fn leaves(&self) -> &LeafSystem {
        &self.leaves
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    /// Sampler over the state as of the last completed frame.
    pub fn sampler(&self) -> WindSampler<'_> {
        WindSampler {
            curl: &self.curl,
            potential: Some(self.field.view()),
            spheres: &self.spheres,
            params: self.params,
            time: self.time,
        }
    }

    /// Convenience for one-off queries.
    pub fn wind_velocity(&self, position: Vec3) -> Vec3 {
        self.sampler().wind_velocity(position)
    }
}

/// Execute a single frame.
///
/// Updates the potential field (including the readback), mirrors the shader
/// globals, runs the leaf consumer against the fresh field, then computes
/// statistics. Phases run strictly in this order.
pub fn execute_frame(system: &mut WindSystem, input: &FrameInput) -> FrameResult {
    let frame_start = Instant::now();
    let mut phase_timings = [0.0_f32; 4];
    system.time += input.dt;

    // Phase 1: potential field update and readback
    let phase_start = Instant::now();
    system.field.advance(
        system.kernel.as_ref(),
        &input.player,
        input.dt,
        &system.field_params,
    );
    phase_timings[0] = phase_start.elapsed().as_secs_f32() * 1000.0;

    // Phase 2: shader globals
    let phase_start = Instant::now();
    let globals = ShaderGlobals::new(
        &system.params,
        system.time,
        system.field.center(),
        system.field.range(),
        &input.player,
    );
    phase_timings[1] = phase_start.elapsed().as_secs_f32() * 1000.0;

    // Phase 3: leaf particles
    let phase_start = Instant::now();
    let sampler = WindSampler {
        curl: &system.curl,
        potential: Some(system.field.view()),
        spheres: &system.spheres,
        params: system.params,
        time: system.time,
    };
    let leaves = system.leaves.step(
        &sampler,
        system.evaluator.as_ref(),
        system.field.center(),
        input.dt,
    );
    let player_wind_speed = sampler.wind_velocity(input.player.position).length();
    let ambient_volume = ambient_wind_volume(
        system.ambient_master_volume,
        input.player.position,
        &system.wind_sphere(),
        system.params.shift_speed,
    );
    phase_timings[2] = phase_start.elapsed().as_secs_f32() * 1000.0;

    // Phase 4: statistics
    let phase_start = Instant::now();
    let statistics = statistics::compute_statistics(
        system.frame,
        system.time,
        &system.field,
        player_wind_speed,
        ambient_volume,
        &leaves,
        frame_start.elapsed().as_secs_f32() * 1000.0,
    );
    phase_timings[3] = phase_start.elapsed().as_secs_f32() * 1000.0;

    debug!(
        frame = statistics.frame,
        max_potential = statistics.max_potential,
        player_wind = statistics.player_wind_speed,
        kicked = statistics.leaves_kicked,
        afloat = statistics.leaves_afloat,
        ms = statistics.frame_duration_ms,
        "Frame complete"
    );

    system.frame += 1;

    FrameResult {
        statistics,
        globals,
        leaves,
        ambient_volume,
        phase_timings_ms: phase_timings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::wind::{BakeConfig, FieldSettings, LeafSettings, SphereSettings};

    fn small_config(parallel: bool) -> SimulationConfig {
        SimulationConfig {
            field: FieldSettings { size: 32, range: 8.0, parallel, ..FieldSettings::default() },
            bake: BakeConfig { size: 32, seed: 0 },
            leaves: LeafSettings { count: 12, ..LeafSettings::default() },
            ..SimulationConfig::default()
        }
    }

    fn walking(frame: usize) -> FrameInput {
        let dt = 1.0 / 60.0;
        let velocity = Vec3::new(2.0, 0.0, 1.0);
        FrameInput {
            player: PlayerState {
                position: velocity * dt * (frame as f32 + 1.0),
                velocity,
                radius: 0.5,
            },
            dt,
        }
    }

    #[test]
    fn frames_advance_clock_and_counter() {
        let mut system = WindSystem::from_config(&small_config(false)).unwrap();
        for i in 0..5 {
            let result = execute_frame(&mut system, &walking(i));
            assert_eq!(result.statistics.frame, i as u64);
        }
        assert_eq!(system.frame(), 5);
        assert!((system.time() - 5.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn field_center_tracks_player() {
        let mut system = WindSystem::from_config(&small_config(true)).unwrap();
        let input = walking(3);
        let result = execute_frame(&mut system, &input);
        assert_eq!(system.field().center(), input.player.position);
        assert_eq!(result.globals.wind_buffer_center, input.player.position);
        assert_eq!(result.globals.player_position, input.player.position);
    }

    #[test]
    fn parallel_and_serial_systems_agree() {
        let mut serial = WindSystem::from_config(&small_config(false)).unwrap();
        let mut parallel = WindSystem::from_config(&small_config(true)).unwrap();
        for i in 0..15 {
            execute_frame(&mut serial, &walking(i));
            execute_frame(&mut parallel, &walking(i));
        }
        for (a, b) in serial.field().readback().iter().zip(parallel.field().readback()) {
            assert!((a - b).abs() < 1e-6);
        }
        for (a, b) in serial.leaves().leaves().iter().zip(parallel.leaves().leaves()) {
            assert!((a.position - b.position).length() < 1e-4);
        }
    }

    #[test]
    fn set_params_updates_sampler_and_field_radius() {
        let mut system = WindSystem::from_config(&small_config(false)).unwrap();
        let mut params = system.params();
        params.dynamic_strength = 0.0;
        params.dynamic_radius = 3.0;
        system.set_params(params);
        execute_frame(&mut system, &walking(0));
        let p = system.field().center();
        assert_eq!(system.sampler().dynamic_term(p), Vec3::ZERO);
        assert_eq!(system.field_params.dynamic_wind_radius, 3.0);
    }

    #[test]
    fn influence_sphere_gates_static_wind() {
        let mut system = WindSystem::from_config(&small_config(false)).unwrap();
        system.set_influence_spheres(vec![InfluenceSphere::new(Vec3::ZERO, 2.0)]);
        assert_eq!(system.sampler().static_term(Vec3::new(10.0, 0.0, 0.0)), Vec3::ZERO);
        assert_eq!(system.influence_spheres().len(), 1);
    }

    #[test]
    fn configured_sphere_gates_wind_during_frames() {
        let mut config = small_config(false);
        config.wind.dynamic_wind_strength = 0.0;
        config.wind.influence_spheres =
            vec![SphereSettings { center: [0.0, 0.0, 0.0], radius: 2.0 }];
        let mut system = WindSystem::from_config(&config).unwrap();
        assert_eq!(system.influence_spheres().len(), 1);

        let far = FrameInput {
            player: PlayerState {
                position: Vec3::new(12.0, 0.0, 0.0),
                velocity: Vec3::ZERO,
                radius: 0.5,
            },
            dt: 1.0 / 60.0,
        };
        let result = execute_frame(&mut system, &far);
        assert_eq!(result.statistics.player_wind_speed, 0.0);
        assert_eq!(result.ambient_volume, 0.0);

        let inside = FrameInput {
            player: PlayerState { position: Vec3::new(0.5, 0.0, 0.0), ..far.player },
            ..far
        };
        let result = execute_frame(&mut system, &inside);
        assert_eq!(
            result.statistics.player_wind_speed,
            system.sampler().static_term(inside.player.position).length()
        );
        assert!(result.ambient_volume > 0.0);
        assert_eq!(result.statistics.ambient_volume, result.ambient_volume);
    }

    #[test]
    fn ambient_volume_without_spheres_follows_scroll_speed() {
        let mut config = small_config(false);
        config.wind.wind_shift_speed = 0.5;
        config.wind.ambient_master_volume = 0.8;
        let mut system = WindSystem::from_config(&config).unwrap();
        let result = execute_frame(&mut system, &walking(0));
        assert!((result.ambient_volume - 0.4).abs() < 1e-6);
    }

    #[test]
    fn invalid_bake_size_is_an_error() {
        let mut config = small_config(false);
        config.bake.size = 48;
        let err = WindSystem::from_config(&config).err().unwrap();
        assert!(err.contains("power of two"));
    }
}
