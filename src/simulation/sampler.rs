use glam::{Vec2, Vec3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::wind::WindSettings;
use crate::field::CurlField;
use crate::simulation::kernel::sample_grid;
use crate::simulation::potential::PotentialView;

/// Particles per dispatch group for batch evaluation.
pub const BATCH_GROUP_SIZE: usize = 64;

/// Wind scalars mirrored into the sampler and the shader globals each frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindParams {
    pub frequency: f32,
    pub shift_speed: f32,
    pub strength: f32,
    pub dynamic_strength: f32,
    pub dynamic_radius: f32,
}

impl From<&WindSettings> for WindParams {
    fn from(settings: &WindSettings) -> Self {
        WindParams {
            frequency: settings.wind_scale,
            shift_speed: settings.wind_shift_speed,
            strength: settings.wind_strength,
            dynamic_strength: settings.dynamic_wind_strength,
            dynamic_radius: settings.dynamic_wind_radius,
        }
    }
}

/// Spatial gate for the static wind term. A negative radius is always active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InfluenceSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl InfluenceSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        InfluenceSphere { center, radius }
    }

    pub fn always() -> Self {
        InfluenceSphere { center: Vec3::ZERO, radius: -1.0 }
    }

    pub fn contains(&self, position: Vec3) -> bool {
        self.radius < 0.0 || position.distance_squared(self.center) < self.radius * self.radius
    }
}

/// Pure position-to-velocity query over the baked curl texture and the
/// dynamic potential field. Borrowed per frame; never mutates or allocates.
#[derive(Debug, Clone, Copy)]
pub struct WindSampler<'a> {
    pub curl: &'a CurlField,
    pub potential: Option<PotentialView<'a>>,
    pub spheres: &'a [InfluenceSphere],
    pub params: WindParams,
    pub time: f32,
}

impl WindSampler<'_> {
    /// Whether the static term applies at `position`. No spheres means ungated.
    pub fn static_active(&self, position: Vec3) -> bool {
        self.spheres.is_empty() || self.spheres.iter().any(|s| s.contains(position))
    }

    /// Scrolling curl-noise wind, gated by the influence spheres.
    pub fn static_term(&self, position: Vec3) -> Vec3 {
        if !self.static_active(position) {
            return Vec3::ZERO;
        }
        let offset = self.time * self.params.shift_speed;
        let u = position.x * self.params.frequency + offset;
        let v = position.z * self.params.frequency + offset;
        let texel = self.curl.sample_bilinear(u, v);
        Vec3::new(texel.dir.x, 0.0, texel.dir.y) * texel.speed * self.params.strength
    }

    /// Curl of the player potential field, zero outside the field window.
    pub fn dynamic_term(&self, position: Vec3) -> Vec3 {
        let Some(view) = self.potential else {
            return Vec3::ZERO;
        };
        if self.params.dynamic_strength == 0.0 {
            return Vec3::ZERO;
        }

        let offset = Vec2::new(position.x - view.center.x, position.z - view.center.z);
        let uv = offset / view.range * 0.5 + Vec2::splat(0.5);
        if uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 {
            return Vec3::ZERO;
        }

        let size = view.size;
        let tx = uv.x * size as f32 - 0.5;
        let ty = uv.y * size as f32 - 0.5;
        let scale = view.texels_per_world_unit();
        let dp_dx = (sample_grid(view.texels, size, tx + 1.0, ty)
            - sample_grid(view.texels, size, tx - 1.0, ty))
            * 0.5
            * scale;
        let dp_dz = (sample_grid(view.texels, size, tx, ty + 1.0)
            - sample_grid(view.texels, size, tx, ty - 1.0))
            * 0.5
            * scale;

        Vec3::new(dp_dz, 0.0, -dp_dx) * self.params.dynamic_strength
    }

    /// Horizontal wind velocity at `position`; `y` is always zero.
    pub fn wind_velocity(&self, position: Vec3) -> Vec3 {
        self.static_term(position) + self.dynamic_term(position)
    }
}

/// Batch evaluation of [`WindSampler::wind_velocity`].
pub trait WindEvaluator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fill `out[i]` with the wind at `positions[i]`.
    fn sample_batch(&self, sampler: &WindSampler<'_>, positions: &[Vec3], out: &mut [Vec3]);
}

fn matched_len(positions: &[Vec3], out: &[Vec3]) -> usize {
    if positions.len() != out.len() {
        error!(
            positions = positions.len(),
            results = out.len(),
            "Count mismatch between wind queries and result buffer"
        );
    }
    positions.len().min(out.len())
}

/// One query at a time on the calling thread.
pub struct ReferenceEvaluator;

impl WindEvaluator for ReferenceEvaluator {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn sample_batch(&self, sampler: &WindSampler<'_>, positions: &[Vec3], out: &mut [Vec3]) {
        let n = matched_len(positions, out);
        for (slot, &position) in out[..n].iter_mut().zip(&positions[..n]) {
            *slot = sampler.wind_velocity(position);
        }
    }
}

/// Evaluates groups of 64 queries on the rayon pool.
pub struct DispatchEvaluator;

impl WindEvaluator for DispatchEvaluator {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    fn sample_batch(&self, sampler: &WindSampler<'_>, positions: &[Vec3], out: &mut [Vec3]) {
        let n = matched_len(positions, out);
        out[..n]
            .par_chunks_mut(BATCH_GROUP_SIZE)
            .zip(positions[..n].par_chunks(BATCH_GROUP_SIZE))
            .for_each(|(slots, group)| {
                for (slot, &position) in slots.iter_mut().zip(group) {
                    *slot = sampler.wind_velocity(position);
                }
            });
    }
}
