//! 2D gradient (Perlin) noise over an integer lattice, optionally periodic.
//!
//! Deterministic: lattice gradients come from Ken Perlin's fixed permutation
//! table, so every run and every platform produces the same field.

const HASH_MASK: i32 = 255;
const GRADIENT_MASK: i32 = 3;

#[rustfmt::skip]
const PERMUTATION: [i32; 256] = [
    151,160,137, 91, 90, 15,131, 13,201, 95, 96, 53,194,233,  7,225,
    140, 36,103, 30, 69,142,  8, 99, 37,240, 21, 10, 23,190,  6,148,
    247,120,234, 75,  0, 26,197, 62, 94,252,219,203,117, 35, 11, 32,
     57,177, 33, 88,237,149, 56, 87,174, 20,125,136,171,168, 68,175,
     74,165, 71,134,139, 48, 27,166, 77,146,158,231, 83,111,229,122,
     60,211,133,230,220,105, 92, 41, 55, 46,245, 40,244,102,143, 54,
     65, 25, 63,161,  1,216, 80, 73,209, 76,132,187,208, 89, 18,169,
    200,196,135,130,116,188,159, 86,164,100,109,198,173,186,  3, 64,
     52,217,226,250,124,123,  5,202, 38,147,118,126,255, 82, 85,212,
    207,206, 59,227, 47, 16, 58, 17,182,189, 28, 42,223,183,170,213,
    119,248,152,  2, 44,154,163, 70,221,153,101,155,167, 43,172,  9,
    129, 22, 39,253, 19, 98,108,110, 79,113,224,232,178,185,112,104,
    218,246, 97,228,251, 34,242,193,238,210,144, 12,191,179,162,241,
     81, 51,145,235,249, 14,239,107, 49,192,214, 31,181,199,106,157,
    184, 84,204,176,115,121, 50, 45,127,  4,150,254,138,236,205, 93,
    222,114, 67, 29, 24, 72,243,141,128,195, 78, 66,215, 61,156,180,
];

/// Axis-aligned unit gradients. Only the first four are ever selected.
const GRADIENTS: [(f32, f32); 4] = [(1.0, 0.0), (-1.0, 0.0), (0.0, 1.0), (0.0, -1.0)];

fn hash(i: i32) -> i32 {
    PERMUTATION[(i & HASH_MASK) as usize]
}

fn gradient(i: i32) -> (f32, f32) {
    GRADIENTS[(i & GRADIENT_MASK) as usize]
}

/// Lerp between `from` and `to` with a clamped smoothstep weight.
pub fn smooth_step(from: f32, to: f32, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    let s = t * t * (3.0 - 2.0 * t);
    to * s + from * (1.0 - s)
}

fn wrap(k: i32, period: i32) -> i32 {
    if period <= 0 { k } else { k.rem_euclid(period) }
}

/// Perlin noise at `(x, y)`, in [-1, 1].
///
/// `period > 0` wraps lattice indices so that the result repeats every
/// `period` units on both axes. `period <= 0` samples the raw lattice.
pub fn eval_2d(x: f32, y: f32, period: i32) -> f32 {
    let i = x.floor() as i32;
    let j = y.floor() as i32;

    let i0 = wrap(i, period);
    let i1 = wrap(i.wrapping_add(1), period);
    let j0 = wrap(j, period);
    let j1 = wrap(j.wrapping_add(1), period);

    let h0 = hash(i0);
    let h1 = hash(i1);

    let g00 = gradient(hash(h0 + (j0 & HASH_MASK)));
    let g01 = gradient(hash(h0 + (j1 & HASH_MASK)));
    let g10 = gradient(hash(h1 + (j0 & HASH_MASK)));
    let g11 = gradient(hash(h1 + (j1 & HASH_MASK)));

    let tx0 = x - i as f32;
    let ty0 = y - j as f32;
    let tx1 = tx0 - 1.0;
    let ty1 = ty0 - 1.0;

    let v00 = g00.0 * tx0 + g00.1 * ty0;
    let v01 = g01.0 * tx0 + g01.1 * ty1;
    let v10 = g10.0 * tx1 + g10.1 * ty0;
    let v11 = g11.0 * tx1 + g11.1 * ty1;

    let row0 = smooth_step(v00, v10, tx0);
    let row1 = smooth_step(v01, v11, tx0);
    (smooth_step(row0, row1, ty0) * std::f32::consts::SQRT_2).clamp(-1.0, 1.0)
}

/// Fractal sum of `octaves` Perlin layers, normalized back into [-1, 1].
///
/// Each octave doubles the frequency and scales the amplitude by
/// `persistence`. The lattice period grows with the frequency so a periodic
/// fractal still repeats every `period` units. Zero octaves behaves like one.
pub fn eval_2d_frac(
    x: f32,
    y: f32,
    base_frequency: i32,
    octaves: u32,
    period: i32,
    persistence: f32,
) -> f32 {
    let mut frequency = base_frequency;
    let lattice_period = |frequency: i32| {
        if period <= 0 { -1 } else { period.saturating_mul(frequency) }
    };

    let mut sum = eval_2d(
        x * frequency as f32,
        y * frequency as f32,
        lattice_period(frequency),
    );
    let mut amplitude = 1.0_f32;
    let mut range = 1.0_f32;
    for _ in 1..octaves {
        frequency = frequency.saturating_mul(2);
        amplitude *= persistence;
        range += amplitude;
        sum += eval_2d(
            x * frequency as f32,
            y * frequency as f32,
            lattice_period(frequency),
        ) * amplitude;
    }
    sum / range
}
