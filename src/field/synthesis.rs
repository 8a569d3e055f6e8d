use std::time::Instant;

use glam::Vec2;
use tracing::info;

use crate::field::noise::eval_2d_frac;
use crate::field::{CurlField, CurlTexel, DensityField, NoiseField};

const DENSITY_BASE_FREQUENCY: i32 = 10;
const DENSITY_OCTAVES: u32 = 4;
const CURL_BASE_FREQUENCY: i32 = 8;
const CURL_OCTAVES: u32 = 2;
const PERSISTENCE: f32 = 0.5;

/// Errors from baking a noise texture.
#[derive(Debug, Clone, PartialEq)]
pub enum BakeError {
    InvalidSize(usize),
}

impl std::fmt::Display for BakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BakeError::InvalidSize(size) => write!(
                f,
                "texture size must be a power of two >= 2, got {}. Example: size = 256",
                size
            ),
        }
    }
}

impl std::error::Error for BakeError {}

fn check_size(size: usize) -> Result<(), BakeError> {
    if size < 2 || !size.is_power_of_two() {
        return Err(BakeError::InvalidSize(size));
    }
    Ok(())
}

/// Noise-space position of texel `(x, y)`.
///
/// The seed shears the y axis by `seed * u`; for integer seeds this keeps a
/// unit-period lattice seamless while decorrelating bakes.
fn sample_position(x: usize, y: usize, size: usize, seed: i32) -> (f32, f32) {
    let step = 1.0 / size as f32;
    let u = (x as f32 + 0.5) * step;
    let v = (y as f32 + 0.5) * step;
    (u - 0.5, seed as f32 * u + v - 0.5)
}

/// Bake a cloud-density texture: fractal noise remapped to [0, 1].
pub fn bake_density(size: usize, seed: i32) -> Result<DensityField, BakeError> {
    check_size(size)?;
    let start = Instant::now();

    let mut texels = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            let (sx, sy) = sample_position(x, y, size, seed);
            let n = eval_2d_frac(sx, sy, DENSITY_BASE_FREQUENCY, DENSITY_OCTAVES, -1, PERSISTENCE);
            texels.push(n * 0.5 + 0.5);
        }
    }

    info!(
        size,
        seed,
        elapsed_ms = start.elapsed().as_secs_f32() * 1000.0,
        "Baked density texture"
    );
    Ok(NoiseField::from_texels(size, texels))
}

/// Bake a seamless curl-noise texture.
///
/// A periodic fractal potential is differentiated with wrapped central
/// differences and rotated 90 degrees, giving a divergence-free direction per
/// texel plus the gradient magnitude as speed.
pub fn bake_curl(size: usize, seed: i32) -> Result<CurlField, BakeError> {
    check_size(size)?;
    let start = Instant::now();
    let step = 1.0 / size as f32;

    let mut potential = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            let (sx, sy) = sample_position(x, y, size, seed);
            let n = eval_2d_frac(sx, sy, CURL_BASE_FREQUENCY, CURL_OCTAVES, 1, PERSISTENCE);
            potential.push(n * 0.5 + 0.5);
        }
    }

    let value = |x: usize, y: usize, dx: isize, dy: isize| -> f32 {
        let xw = (x as isize + dx).rem_euclid(size as isize) as usize;
        let yw = (y as isize + dy).rem_euclid(size as isize) as usize;
        potential[xw + yw * size]
    };

    let mut texels = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            let d_dx = (value(x, y, 1, 0) - value(x, y, -1, 0)) / (2.0 * step);
            let d_dy = (value(x, y, 0, 1) - value(x, y, 0, -1)) / (2.0 * step);
            let curl = Vec2::new(d_dy, -d_dx);
            texels.push(CurlTexel {
                dir: curl.normalize_or_zero(),
                speed: curl.length(),
            });
        }
    }

    info!(
        size,
        seed,
        elapsed_ms = start.elapsed().as_secs_f32() * 1000.0,
        "Baked curl texture"
    );
    Ok(NoiseField::from_texels(size, texels))
}
