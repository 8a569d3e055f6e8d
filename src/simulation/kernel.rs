use glam::Vec2;
use rayon::prelude::*;

use crate::config::wind::DisturbanceKernel;

/// Work group edge for the dispatch kernel, in texels.
pub const GROUP_SIZE: usize = 8;

/// Number of groups of `alignment` needed to cover `value` items.
pub fn divide_by_multiple(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment)
}

/// Localized impulse added around the field center this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Injection {
    /// Potential added at the kernel peak.
    pub amount: f32,
    pub radius_texels: f32,
    pub kernel: DisturbanceKernel,
}

/// Inputs for one potential-field update pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldUpdate {
    pub size: usize,
    /// Content displacement this frame, in texels.
    pub shift: Vec2,
    pub diffusion: f32,
    /// Multiplicative decay for this frame.
    pub decay: f32,
    pub injection: Option<Injection>,
}

/// Bilinear read of a square grid in texel-index space. Outside reads are 0.
pub fn sample_grid(grid: &[f32], size: usize, x: f32, y: f32) -> f32 {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let at = |ix: i64, iy: i64| -> f32 {
        if ix < 0 || iy < 0 || ix >= size as i64 || iy >= size as i64 {
            0.0
        } else {
            grid[ix as usize + iy as usize * size]
        }
    };

    let bottom = at(x0, y0) + (at(x0 + 1, y0) - at(x0, y0)) * fx;
    let top = at(x0, y0 + 1) + (at(x0 + 1, y0 + 1) - at(x0, y0 + 1)) * fx;
    bottom + (top - bottom) * fy
}

/// Texel-index coordinate of the field center on both axes.
pub fn center_texel(size: usize) -> f32 {
    size as f32 * 0.5 - 0.5
}

/// New value for texel `(x, y)`: advect, diffuse, decay, inject.
pub fn update_texel(prev: &[f32], x: usize, y: usize, update: &FieldUpdate) -> f32 {
    let size = update.size;
    let sx = x as f32 - update.shift.x;
    let sy = y as f32 - update.shift.y;

    let advected = sample_grid(prev, size, sx, sy);
    let neighbours = (sample_grid(prev, size, sx + 1.0, sy)
        + sample_grid(prev, size, sx - 1.0, sy)
        + sample_grid(prev, size, sx, sy + 1.0)
        + sample_grid(prev, size, sx, sy - 1.0))
        * 0.25;

    let mut value =
        (advected * (1.0 - update.diffusion) + neighbours * update.diffusion) * update.decay;

    if let Some(injection) = update.injection {
        let c = center_texel(size);
        let dx = x as f32 - c;
        let dy = y as f32 - c;
        let r = (dx * dx + dy * dy).sqrt() / injection.radius_texels;
        value += injection.amount * injection.kernel.falloff(r);
    }

    value
}

/// One implementation of the potential-field update pass.
///
/// Implementations must agree with [`update_texel`] within float tolerance.
pub trait FieldKernel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Write the updated field into `next`, reading only from `prev`.
    fn update(&self, prev: &[f32], next: &mut [f32], update: &FieldUpdate);
}

/// Serial row-major evaluator.
pub struct ReferenceKernel;

impl FieldKernel for ReferenceKernel {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn update(&self, prev: &[f32], next: &mut [f32], update: &FieldUpdate) {
        let size = update.size;
        for y in 0..size {
            for x in 0..size {
                next[x + y * size] = update_texel(prev, x, y, update);
            }
        }
    }
}

/// Evaluates the field in 8x8 work groups on the rayon pool.
///
/// Each band of eight rows is one parallel task; within a band the groups
/// run left to right.
pub struct DispatchKernel;

impl FieldKernel for DispatchKernel {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    fn update(&self, prev: &[f32], next: &mut [f32], update: &FieldUpdate) {
        let size = update.size;
        let groups_x = divide_by_multiple(size, GROUP_SIZE);

        next.par_chunks_mut(size * GROUP_SIZE)
            .enumerate()
            .for_each(|(band, rows)| {
                let y_start = band * GROUP_SIZE;
                let band_rows = rows.len() / size;
                for group in 0..groups_x {
                    let x_start = group * GROUP_SIZE;
                    let x_end = (x_start + GROUP_SIZE).min(size);
                    for local_y in 0..band_rows {
                        let y = y_start + local_y;
                        for x in x_start..x_end {
                            rows[x + local_y * size] = update_texel(prev, x, y, update);
                        }
                    }
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy_grid(size: usize) -> Vec<f32> {
        (0..size * size)
            .map(|i| ((i * 7919) % 113) as f32 / 113.0 - 0.5)
            .collect()
    }

    fn update(size: usize, shift: Vec2, injection: Option<Injection>) -> FieldUpdate {
        FieldUpdate { size, shift, diffusion: 0.2, decay: 0.97, injection }
    }

    #[test]
    fn divide_by_multiple_rounds_up() {
        assert_eq!(divide_by_multiple(256, 8), 32);
        assert_eq!(divide_by_multiple(257, 8), 33);
        assert_eq!(divide_by_multiple(1, 64), 1);
        assert_eq!(divide_by_multiple(0, 64), 0);
    }

    #[test]
    fn sample_grid_outside_is_zero() {
        let grid = vec![1.0; 16];
        assert_eq!(sample_grid(&grid, 4, -2.0, 1.0), 0.0);
        assert_eq!(sample_grid(&grid, 4, 1.0, 5.0), 0.0);
        assert_eq!(sample_grid(&grid, 4, -0.5, 1.0), 0.5);
        assert_eq!(sample_grid(&grid, 4, 2.0, 2.0), 1.0);
    }

    #[test]
    fn integer_shift_moves_content() {
        let size = 8;
        let mut prev = vec![0.0; size * size];
        prev[3 + 3 * size] = 1.0;
        let mut next = vec![0.0; size * size];
        let u = FieldUpdate {
            size,
            shift: Vec2::new(2.0, -1.0),
            diffusion: 0.0,
            decay: 1.0,
            injection: None,
        };
        ReferenceKernel.update(&prev, &mut next, &u);
        assert_eq!(next[5 + 2 * size], 1.0);
        assert_eq!(next.iter().sum::<f32>(), 1.0);
    }

    #[test]
    fn dispatch_matches_reference() {
        for size in [8, 16, 64] {
            let prev = noisy_grid(size);
            let injection = Some(Injection {
                amount: 0.3,
                radius_texels: 4.0,
                kernel: DisturbanceKernel::Gaussian,
            });
            let u = update(size, Vec2::new(0.37, -1.25), injection);

            let mut reference = vec![0.0; size * size];
            let mut dispatch = vec![0.0; size * size];
            ReferenceKernel.update(&prev, &mut reference, &u);
            DispatchKernel.update(&prev, &mut dispatch, &u);

            for (a, b) in reference.iter().zip(&dispatch) {
                assert!((a - b).abs() < 1e-6, "size {}: {} vs {}", size, a, b);
            }
        }
    }

    #[test]
    fn injection_peaks_at_center() {
        let size = 16;
        let prev = vec![0.0; size * size];
        let mut next = vec![0.0; size * size];
        let u = update(
            size,
            Vec2::ZERO,
            Some(Injection { amount: 1.0, radius_texels: 3.0, kernel: DisturbanceKernel::Cone }),
        );
        ReferenceKernel.update(&prev, &mut next, &u);
        let center = next[8 + 8 * size];
        assert!(center > 0.0);
        assert_eq!(next[0], 0.0);
        assert!(next.iter().all(|&v| v <= center + 1e-6));
    }

    #[test]
    fn stationary_update_never_grows() {
        let size = 16;
        let prev = noisy_grid(size);
        let mut next = vec![0.0; size * size];
        ReferenceKernel.update(&prev, &mut next, &update(size, Vec2::ZERO, None));
        let max_prev = prev.iter().fold(0.0_f32, |m, v| m.max(v.abs()));
        let max_next = next.iter().fold(0.0_f32, |m, v| m.max(v.abs()));
        assert!(max_next <= max_prev);
    }
}
