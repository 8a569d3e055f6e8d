use std::collections::BTreeSet;

use glam::{Quat, Vec3};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::config::wind::LeafSettings;
use crate::field::noise::smooth_step;
use crate::simulation::sampler::{WindEvaluator, WindSampler};

/// Random re-trigger threshold below which a grounded leaf near the player
/// gets flicked upward.
const KICK_UP_THRESHOLD: f32 = 0.8;
const FACING_TURN_RADIANS: f32 = 0.01;
/// Horizontal speed lost per second while sliding on the ground.
const GROUND_FRICTION: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Leaf {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Orientation of the leaf surface; decides how much wind it catches.
    pub facing: Vec3,
    /// Countdown until the next chance to be lifted by the wind.
    pub counter: f32,
}

impl Leaf {
    pub fn is_airborne(&self) -> bool {
        self.velocity.y.abs() > f32::EPSILON
    }
}

/// Outcome of one leaf frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LeafReport {
    /// Leaves admitted to the airborne set this frame.
    pub kicked: usize,
    /// Size of the airborne set after the frame.
    pub afloat: usize,
    /// Leaves with vertical motion after integration.
    pub airborne: usize,
}

/// Wind-driven leaf particles with a cap on how many may be lifted at once.
pub struct LeafSystem {
    leaves: Vec<Leaf>,
    afloat: BTreeSet<usize>,
    max_afloat: usize,
    wind_resistance: f32,
    gravity: f32,
    rng: ChaCha8Rng,
    positions: Vec<Vec3>,
    winds: Vec<Vec3>,
}

fn random_unit(rng: &mut ChaCha8Rng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let len_sq = v.length_squared();
        if len_sq > 1e-4 && len_sq <= 1.0 {
            return v / len_sq.sqrt();
        }
    }
}

/// Turn `current` toward `target` by at most `max_radians`, keeping its length.
pub fn rotate_towards(current: Vec3, target: Vec3, max_radians: f32) -> Vec3 {
    let from = current.normalize_or_zero();
    let to = target.normalize_or_zero();
    if from == Vec3::ZERO || to == Vec3::ZERO {
        return current;
    }
    let angle = from.angle_between(to);
    if angle <= max_radians {
        return to * current.length();
    }
    let axis = from.cross(to);
    if axis.length_squared() < 1e-12 {
        return current;
    }
    Quat::from_axis_angle(axis.normalize(), max_radians) * current
}

/// Move `current` toward `target` by at most `max_delta`.
pub fn move_towards(current: Vec3, target: Vec3, max_delta: f32) -> Vec3 {
    let diff = target - current;
    let dist = diff.length();
    if dist <= max_delta || dist == 0.0 {
        return target;
    }
    current + diff / dist * max_delta
}

impl LeafSystem {
    /// Scatter `settings.count` resting leaves over the spawn square.
    pub fn scatter(settings: &LeafSettings) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
        let extent = settings.spawn_extent;
        let leaves = (0..settings.count)
            .map(|_| Leaf {
                position: Vec3::new(
                    rng.gen_range(-extent..extent),
                    0.0,
                    rng.gen_range(-extent..extent),
                ),
                velocity: Vec3::ZERO,
                facing: random_unit(&mut rng),
                counter: rng.r#gen::<f32>(),
            })
            .collect();
        Self::with_rng(leaves, settings, rng)
    }

    pub fn from_leaves(leaves: Vec<Leaf>, settings: &LeafSettings) -> Self {
        Self::with_rng(leaves, settings, ChaCha8Rng::seed_from_u64(settings.seed))
    }

    fn with_rng(leaves: Vec<Leaf>, settings: &LeafSettings, rng: ChaCha8Rng) -> Self {
        let n = leaves.len();
        LeafSystem {
            leaves,
            afloat: BTreeSet::new(),
            max_afloat: settings.max_afloat,
            wind_resistance: settings.wind_resistance,
            gravity: settings.gravity,
            rng,
            positions: Vec::with_capacity(n),
            winds: Vec::with_capacity(n),
        }
    }

    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    pub fn afloat_count(&self) -> usize {
        self.afloat.len()
    }

    /// Advance every leaf by one frame.
    ///
    /// `center` is the wind field center (the player), used for the
    /// kick-up-when-moving effect.
    pub fn step(
        &mut self,
        sampler: &WindSampler<'_>,
        evaluator: &dyn WindEvaluator,
        center: Vec3,
        dt: f32,
    ) -> LeafReport {
        self.positions.clear();
        self.positions.extend(self.leaves.iter().map(|l| l.position));
        self.winds.clear();
        self.winds.resize(self.leaves.len(), Vec3::ZERO);
        evaluator.sample_batch(sampler, &self.positions, &mut self.winds);

        let params = sampler.params;
        let wind_speed = params.shift_speed;
        let effective_resistance = self.wind_resistance / wind_speed;
        let kick_radius = 2.0 * params.dynamic_radius;
        let min_kick_wind = 0.2 * params.dynamic_strength * effective_resistance;

        let mut kicked = 0;
        for i in 0..self.leaves.len() {
            let wind = self.winds[i];
            let Leaf { position, mut velocity, mut facing, mut counter } = self.leaves[i];
            let wind_factor = wind.dot(facing.normalize_or_zero());
            let wind_magnitude = wind.length();

            let in_air = velocity.y.abs() > f32::EPSILON;
            if !in_air && velocity.length() < 1.0 {
                self.afloat.remove(&i);
                velocity = Vec3::ZERO;
            }

            if counter > 0.0 {
                counter -= self.rng.r#gen::<f32>() * 0.01 * wind_speed;
            } else {
                counter = self.rng.r#gen::<f32>();

                let admitted = self.afloat.contains(&i) || self.afloat.len() < self.max_afloat;
                if admitted {
                    self.afloat.insert(i);
                    kicked += 1;

                    velocity = wind_factor.abs() * wind;

                    // updraft
                    if !in_air && wind_factor > 0.0 && wind_magnitude > effective_resistance {
                        velocity.y +=
                            params.strength * wind_factor * velocity.length() * facing.y;
                    }

                    facing = rotate_towards(facing, velocity, FACING_TURN_RADIANS);
                }
            }

            // kicked up by the player moving past
            let distance = center.distance(position);
            if !in_air && distance < kick_radius && wind_magnitude > min_kick_wind {
                if counter < KICK_UP_THRESHOLD {
                    velocity.x += wind_factor * wind_magnitude * facing.x;
                    velocity.y += wind_magnitude * 5.0;
                    velocity.z += wind_factor * wind_magnitude * facing.z;
                }
                counter = KICK_UP_THRESHOLD
                    + (1.0 - KICK_UP_THRESHOLD)
                        * self.rng.r#gen::<f32>()
                        * smooth_step(0.0, 1.0, distance / kick_radius);
            }

            if in_air {
                velocity = move_towards(velocity, wind, wind_speed * dt);
                // slow the fall
                if velocity.y < 0.0 {
                    velocity.y *= self.rng.gen_range(0.95..0.98);
                } else {
                    velocity.y *= self.rng.gen_range(0.98..1.02);
                }
            }

            self.leaves[i] = Leaf { position, velocity, facing, counter };
        }

        self.integrate(dt);

        LeafReport {
            kicked,
            afloat: self.afloat.len(),
            airborne: self.leaves.iter().filter(|l| l.is_airborne()).count(),
        }
    }

    /// Gravity while off the ground, friction while sliding, ground plane at y = 0.
    fn integrate(&mut self, dt: f32) {
        for leaf in &mut self.leaves {
            let off_ground = leaf.position.y > 0.0 || leaf.velocity.y > 0.0;
            if off_ground {
                leaf.velocity.y -= self.gravity * dt;
            } else {
                let keep = (1.0 - GROUND_FRICTION * dt).max(0.0);
                leaf.velocity.x *= keep;
                leaf.velocity.z *= keep;
            }

            leaf.position += leaf.velocity * dt;
            if leaf.position.y <= 0.0 {
                leaf.position.y = 0.0;
                if leaf.velocity.y < 0.0 {
                    leaf.velocity.y = 0.0;
                }
            }
        }
    }
}
