use std::time::Instant;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::config::wind::{DisturbanceKernel, FieldSettings};
use crate::simulation::kernel::{FieldKernel, FieldUpdate, Injection};

/// Player state sampled once per frame by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f32,
}

/// Per-frame coefficients for [`WindPotentialField::advance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldParams {
    pub decay_rate: f32,
    pub diffusion: f32,
    pub injection_gain: f32,
    pub dynamic_wind_radius: f32,
    pub kernel: DisturbanceKernel,
}

impl FieldParams {
    pub fn new(field: &FieldSettings, dynamic_wind_radius: f32) -> Self {
        FieldParams {
            decay_rate: field.decay_rate,
            diffusion: field.diffusion,
            injection_gain: field.injection_gain,
            dynamic_wind_radius,
            kernel: field.kernel,
        }
    }
}

/// Read-only view of the potential as of the last readback.
#[derive(Debug, Clone, Copy)]
pub struct PotentialView<'a> {
    pub texels: &'a [f32],
    pub size: usize,
    pub range: f32,
    pub center: Vec3,
}

impl PotentialView<'_> {
    pub fn texels_per_world_unit(&self) -> f32 {
        self.size as f32 * 0.5 / self.range
    }
}

/// Serializable copy of the field, used for snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldState {
    pub frame: u64,
    pub size: usize,
    pub range: f32,
    pub center: Vec3,
    pub potential: Vec<f32>,
}

/// Player-centred scalar potential with ping-pong buffers.
///
/// Exactly one buffer is current at a time. Each [`advance`](Self::advance)
/// writes the other one from it, swaps, and copies the result into the
/// host-readable `readback` grid the sampler reads.
pub struct WindPotentialField {
    size: usize,
    range: f32,
    buffers: [Vec<f32>; 2],
    current: usize,
    readback: Vec<f32>,
    center: Vec3,
}

impl WindPotentialField {
    pub fn new(size: usize, range: f32) -> Self {
        WindPotentialField {
            size,
            range,
            buffers: [vec![0.0; size * size], vec![0.0; size * size]],
            current: 0,
            readback: vec![0.0; size * size],
            center: Vec3::ZERO,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn range(&self) -> f32 {
        self.range
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Index of the buffer holding the latest state.
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn texels_per_world_unit(&self) -> f32 {
        self.size as f32 * 0.5 / self.range
    }

    pub fn readback(&self) -> &[f32] {
        &self.readback
    }

    pub fn view(&self) -> PotentialView<'_> {
        PotentialView {
            texels: &self.readback,
            size: self.size,
            range: self.range,
            center: self.center,
        }
    }

    pub fn max_abs(&self) -> f32 {
        self.readback.iter().fold(0.0_f32, |m, v| m.max(v.abs()))
    }

    pub fn mean_abs(&self) -> f32 {
        if self.readback.is_empty() {
            return 0.0;
        }
        self.readback.iter().map(|v| v.abs()).sum::<f32>() / self.readback.len() as f32
    }

    /// Place the field window without disturbing its content.
    pub fn set_center(&mut self, center: Vec3) {
        self.center = center;
    }

    /// Clear both buffers and the readback to the neutral value.
    pub fn reset(&mut self) {
        for buffer in &mut self.buffers {
            buffer.fill(0.0);
        }
        self.readback.fill(0.0);
    }

    /// Run one frame: advect opposite to the player's motion, diffuse, decay,
    /// inject around the player, swap buffers and read back.
    pub fn advance(
        &mut self,
        kernel: &dyn FieldKernel,
        player: &PlayerState,
        dt: f32,
        params: &FieldParams,
    ) {
        let scale = self.texels_per_world_unit();
        let displacement = player.position - self.center;
        let step = Vec2::new(player.velocity.x, player.velocity.z) * dt;
        let speed = Vec2::new(player.velocity.x, player.velocity.z).length();

        let radius = params.dynamic_wind_radius;
        let injection = if radius > 0.0 && displacement.length() <= radius && speed > 0.0 {
            Some(Injection {
                amount: params.injection_gain * speed * dt,
                radius_texels: radius * scale,
                kernel: params.kernel,
            })
        } else {
            None
        };

        let update = FieldUpdate {
            size: self.size,
            shift: -step * scale,
            diffusion: params.diffusion,
            decay: (-params.decay_rate * dt).exp(),
            injection,
        };

        let [a, b] = &mut self.buffers;
        let (prev, next) = if self.current == 0 { (&*a, b) } else { (&*b, a) };
        kernel.update(prev, next, &update);

        self.current = 1 - self.current;
        self.center = player.position;

        let start = Instant::now();
        self.readback.copy_from_slice(&self.buffers[self.current]);
        trace!(
            kernel = kernel.name(),
            readback_us = start.elapsed().as_secs_f32() * 1e6,
            "Potential field read back"
        );
    }

    pub fn to_state(&self, frame: u64) -> FieldState {
        FieldState {
            frame,
            size: self.size,
            range: self.range,
            center: self.center,
            potential: self.readback.clone(),
        }
    }

    /// Load a snapshot into this field.
    ///
    /// A snapshot with a different resolution is logged and ignored; the
    /// field keeps running from its current content. Returns whether the
    /// snapshot was applied.
    pub fn restore(&mut self, state: &FieldState) -> bool {
        if state.size != self.size || state.potential.len() != self.size * self.size {
            warn!(
                snapshot_size = state.size,
                snapshot_texels = state.potential.len(),
                field_size = self.size,
                "Snapshot resolution does not match the field, ignoring"
            );
            return false;
        }
        if state.range != self.range {
            warn!(
                snapshot_range = state.range,
                field_range = self.range,
                "Snapshot range differs from the field, texels keep the field range"
            );
        }
        self.buffers[self.current].copy_from_slice(&state.potential);
        self.readback.copy_from_slice(&state.potential);
        self.center = state.center;
        true
    }
}
