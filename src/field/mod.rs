pub mod noise;
pub mod synthesis;

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use synthesis::{bake_curl, bake_density, BakeError};

/// A texel type that can be bilinearly filtered channel by channel.
pub trait Texel: Copy + Default {
    fn lerp(a: Self, b: Self, t: f32) -> Self;
}

impl Texel for f32 {
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        a + (b - a) * t
    }
}

/// One texel of a curl-noise bake: unit flow direction plus speed.
///
/// Filtering treats the three values as independent channels, so a filtered
/// `dir` is generally not unit length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CurlTexel {
    pub dir: Vec2,
    pub speed: f32,
}

impl Texel for CurlTexel {
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        CurlTexel {
            dir: a.dir.lerp(b.dir, t),
            speed: a.speed + (b.speed - a.speed) * t,
        }
    }
}

/// Immutable square grid with power-of-two edge and torus wrapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseField<T> {
    size: usize,
    texels: Vec<T>,
}

/// Scalar cloud-density bake, values in [0, 1].
pub type DensityField = NoiseField<f32>;

/// Divergence-free flow bake.
pub type CurlField = NoiseField<CurlTexel>;

impl<T: Texel> NoiseField<T> {
    pub(crate) fn from_texels(size: usize, texels: Vec<T>) -> Self {
        debug_assert_eq!(texels.len(), size * size);
        NoiseField { size, texels }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn texels(&self) -> &[T] {
        &self.texels
    }

    /// Texel at integer coordinates, wrapped onto the torus.
    pub fn texel(&self, x: i64, y: i64) -> T {
        let size = self.size as i64;
        let xw = x.rem_euclid(size) as usize;
        let yw = y.rem_euclid(size) as usize;
        self.texels[xw + yw * self.size]
    }

    /// Bilinear sample at normalized coordinates with repeat wrapping.
    ///
    /// Texel centers sit at `(i + 0.5) / size`, so `u = 0` and `u = 1` land
    /// on the same pair of texels.
    pub fn sample_bilinear(&self, u: f32, v: f32) -> T {
        let tx = u * self.size as f32 - 0.5;
        let ty = v * self.size as f32 - 0.5;
        let x0 = tx.floor();
        let y0 = ty.floor();
        let fx = tx - x0;
        let fy = ty - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let bottom = T::lerp(self.texel(x0, y0), self.texel(x0 + 1, y0), fx);
        let top = T::lerp(self.texel(x0, y0 + 1), self.texel(x0 + 1, y0 + 1), fx);
        T::lerp(bottom, top, fy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(size: usize) -> NoiseField<f32> {
        let texels = (0..size * size).map(|i| i as f32).collect();
        NoiseField::from_texels(size, texels)
    }

    #[test]
    fn texel_wraps_negative_and_overflowing_coordinates() {
        let field = ramp(4);
        assert_eq!(field.texel(-1, 0), field.texel(3, 0));
        assert_eq!(field.texel(4, 5), field.texel(0, 1));
        assert_eq!(field.texel(2, -4), field.texel(2, 0));
    }

    #[test]
    fn bilinear_hits_texel_centers_exactly() {
        let field = ramp(4);
        let v = field.sample_bilinear(1.5 / 4.0, 2.5 / 4.0);
        assert_eq!(v, field.texel(1, 2));
    }

    #[test]
    fn bilinear_seamless_across_unit_boundary() {
        let field = ramp(8);
        for v in [0.0, 0.13, 0.5, 0.77] {
            assert_eq!(field.sample_bilinear(0.0, v), field.sample_bilinear(1.0, v));
            assert_eq!(field.sample_bilinear(v, 0.0), field.sample_bilinear(v, 1.0));
        }
    }

    #[test]
    fn curl_texel_lerps_each_channel() {
        let a = CurlTexel { dir: Vec2::new(1.0, 0.0), speed: 2.0 };
        let b = CurlTexel { dir: Vec2::new(0.0, 1.0), speed: 4.0 };
        let mid = CurlTexel::lerp(a, b, 0.5);
        assert_eq!(mid.dir, Vec2::new(0.5, 0.5));
        assert_eq!(mid.speed, 3.0);
    }
}
