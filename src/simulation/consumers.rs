use std::f32::consts::PI;

use glam::Vec3;
use serde::Serialize;

use crate::simulation::potential::PlayerState;
use crate::simulation::sampler::{InfluenceSphere, WindParams};

/// Named parameters mirrored to GPU consumers (grass shader, post process,
/// particle kernel). Built from the same [`WindParams`] the CPU sampler uses
/// so both sides evaluate the same field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShaderGlobals {
    #[serde(rename = "_AnimTime")]
    pub anim_time: f32,
    #[serde(rename = "_WindFrequency")]
    pub wind_frequency: f32,
    #[serde(rename = "_WindShiftSpeed")]
    pub wind_shift_speed: f32,
    #[serde(rename = "_WindStrength")]
    pub wind_strength: f32,
    #[serde(rename = "_DynamicWindStrength")]
    pub dynamic_wind_strength: f32,
    #[serde(rename = "_DynamicWindRadius")]
    pub dynamic_wind_radius: f32,
    #[serde(rename = "_WindBufferCenter")]
    pub wind_buffer_center: Vec3,
    #[serde(rename = "_WindBufferRange")]
    pub wind_buffer_range: f32,
    #[serde(rename = "_PlayerPosition")]
    pub player_position: Vec3,
    #[serde(rename = "_GrassSquashRadius")]
    pub grass_squash_radius: f32,
    #[serde(rename = "_GrassSquashStrength")]
    pub grass_squash_strength: f32,
}

impl ShaderGlobals {
    pub fn new(
        params: &WindParams,
        time: f32,
        field_center: Vec3,
        field_range: f32,
        player: &PlayerState,
    ) -> Self {
        ShaderGlobals {
            anim_time: time,
            wind_frequency: params.frequency,
            wind_shift_speed: params.shift_speed,
            wind_strength: params.strength,
            dynamic_wind_strength: params.dynamic_strength,
            dynamic_wind_radius: params.dynamic_radius,
            wind_buffer_center: field_center,
            wind_buffer_range: field_range,
            player_position: player.position,
            grass_squash_radius: player.radius * 1.2,
            grass_squash_strength: 0.5 * PI,
        }
    }

    /// Sampler parameters as a GPU consumer would reconstruct them.
    pub fn wind_params(&self) -> WindParams {
        WindParams {
            frequency: self.wind_frequency,
            shift_speed: self.wind_shift_speed,
            strength: self.wind_strength,
            dynamic_strength: self.dynamic_wind_strength,
            dynamic_radius: self.dynamic_wind_radius,
        }
    }
}

/// Volume of the ambient wind loop for a listener.
///
/// Fades linearly to silence at the edge of the wind sphere (a non-positive
/// radius means everywhere at full level) and scales with how fast the wind
/// texture scrolls, never below 10%.
pub fn ambient_wind_volume(
    master: f32,
    listener: Vec3,
    wind_sphere: &InfluenceSphere,
    shift_speed: f32,
) -> f32 {
    let mut factor = 1.0;
    if wind_sphere.radius > 0.0 {
        let distance = listener.distance(wind_sphere.center);
        factor = 1.0 - distance / wind_sphere.radius;
    }
    factor *= shift_speed.max(0.1);
    (master * factor).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::bake_curl;
    use crate::simulation::sampler::WindSampler;

    fn params() -> WindParams {
        WindParams {
            frequency: 0.05,
            shift_speed: 0.3,
            strength: 1.5,
            dynamic_strength: 12.0,
            dynamic_radius: 2.0,
        }
    }

    #[test]
    fn globals_mirror_sampler_parameters() {
        let player = PlayerState { position: Vec3::new(1.0, 0.0, 2.0), velocity: Vec3::ZERO, radius: 0.5 };
        let globals = ShaderGlobals::new(&params(), 3.0, player.position, 16.0, &player);
        assert_eq!(globals.wind_params(), params());
        assert_eq!(globals.grass_squash_radius, 0.6);
        assert_eq!(globals.grass_squash_strength, 0.5 * PI);
    }

    #[test]
    fn mirrored_parameters_sample_identically() {
        let curl = bake_curl(32, 0).unwrap();
        let player = PlayerState::default();
        let globals = ShaderGlobals::new(&params(), 7.25, Vec3::ZERO, 16.0, &player);
        let cpu = WindSampler { curl: &curl, potential: None, spheres: &[], params: params(), time: 7.25 };
        let gpu = WindSampler { params: globals.wind_params(), time: globals.anim_time, ..cpu };
        for i in 0..20 {
            let p = Vec3::new(i as f32 * 1.7, 0.0, i as f32 * -0.9);
            assert!((cpu.wind_velocity(p) - gpu.wind_velocity(p)).length() < 1e-6);
        }
    }

    #[test]
    fn globals_serialize_with_shader_names() {
        let player = PlayerState::default();
        let globals = ShaderGlobals::new(&params(), 1.0, Vec3::ZERO, 16.0, &player);
        let json = serde_json::to_value(globals).unwrap();
        assert_eq!(json["_WindFrequency"], serde_json::json!(0.05_f32));
        assert!(json.get("_GrassSquashRadius").is_some());
        assert!(json.get("_WindBufferCenter").is_some());
    }

    #[test]
    fn volume_fades_with_distance() {
        let sphere = InfluenceSphere::new(Vec3::ZERO, 10.0);
        let near = ambient_wind_volume(1.0, Vec3::new(1.0, 0.0, 0.0), &sphere, 1.0);
        let far = ambient_wind_volume(1.0, Vec3::new(9.0, 0.0, 0.0), &sphere, 1.0);
        assert!((near - 0.9).abs() < 1e-6);
        assert!((far - 0.1).abs() < 1e-6);
        assert_eq!(ambient_wind_volume(1.0, Vec3::new(20.0, 0.0, 0.0), &sphere, 1.0), 0.0);
    }

    #[test]
    fn volume_floor_on_shift_speed() {
        let everywhere = InfluenceSphere::always();
        let v = ambient_wind_volume(0.8, Vec3::splat(50.0), &everywhere, 0.02);
        assert!((v - 0.08).abs() < 1e-6);
    }
}
