use serde::{Deserialize, Serialize};

/// Shape of the disturbance injected around the player each frame.
///
/// Input is the distance from the field center divided by the dynamic wind
/// radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisturbanceKernel {
    /// `exp(-3 r^2)`, no influence beyond 2.5 radii.
    Gaussian,
    /// Linear falloff reaching zero at one radius.
    Cone,
    /// Constant inside one radius.
    Disk,
}

impl DisturbanceKernel {
    pub fn falloff(self, r: f32) -> f32 {
        match self {
            DisturbanceKernel::Gaussian => {
                if r > 2.5 {
                    0.0
                } else {
                    (-3.0 * r * r).exp()
                }
            }
            DisturbanceKernel::Cone => (1.0 - r).max(0.0),
            DisturbanceKernel::Disk => {
                if r <= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Global wind tunables, updated into the sampler once per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindSettings {
    /// Scale applied to world positions before sampling the curl texture.
    /// Higher values vary the wind direction faster across space.
    #[serde(default = "default_wind_scale")]
    pub wind_scale: f32,
    /// Scroll speed of the curl texture.
    #[serde(default = "default_wind_shift_speed")]
    pub wind_shift_speed: f32,
    #[serde(default = "default_wind_strength")]
    pub wind_strength: f32,
    /// Scale of the player-driven wind.
    #[serde(default = "default_dynamic_wind_strength")]
    pub dynamic_wind_strength: f32,
    /// Radius of player wind influence, in world units.
    #[serde(default = "default_dynamic_wind_radius")]
    pub dynamic_wind_radius: f32,
    /// Regions where the static wind blows. Empty means everywhere.
    #[serde(default)]
    pub influence_spheres: Vec<SphereSettings>,
    /// Which influence sphere the ambient wind loop is centred on.
    #[serde(default)]
    pub wind_sphere_index: usize,
    /// Level of the ambient wind loop before distance and scroll speed.
    #[serde(default = "default_ambient_master_volume")]
    pub ambient_master_volume: f32,
}

/// One `[[wind.influence_spheres]]` entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphereSettings {
    pub center: [f32; 3],
    /// Negative means unbounded.
    #[serde(default = "default_sphere_radius")]
    pub radius: f32,
}

fn default_sphere_radius() -> f32 {
    5.0
}
fn default_ambient_master_volume() -> f32 {
    1.0
}

fn default_wind_scale() -> f32 {
    0.02
}
fn default_wind_shift_speed() -> f32 {
    0.02
}
fn default_wind_strength() -> f32 {
    1.0
}
fn default_dynamic_wind_strength() -> f32 {
    20.0
}
fn default_dynamic_wind_radius() -> f32 {
    1.0
}

impl Default for WindSettings {
    fn default() -> Self {
        WindSettings {
            wind_scale: default_wind_scale(),
            wind_shift_speed: default_wind_shift_speed(),
            wind_strength: default_wind_strength(),
            dynamic_wind_strength: default_dynamic_wind_strength(),
            dynamic_wind_radius: default_dynamic_wind_radius(),
            influence_spheres: Vec::new(),
            wind_sphere_index: 0,
            ambient_master_volume: default_ambient_master_volume(),
        }
    }
}

/// Potential field geometry and update coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSettings {
    /// Texels per edge; power of two.
    #[serde(default = "default_field_size")]
    pub size: usize,
    /// World units covered in each direction from the center.
    #[serde(default = "default_field_range")]
    pub range: f32,
    /// Exponential decay rate per second.
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f32,
    /// Blend toward the 4-neighbour average each frame, 0-1.
    #[serde(default = "default_diffusion")]
    pub diffusion: f32,
    /// Potential added per world unit travelled at the disturbance peak.
    #[serde(default = "default_injection_gain")]
    pub injection_gain: f32,
    #[serde(default = "default_kernel")]
    pub kernel: DisturbanceKernel,
    /// Evaluate the update on the rayon pool instead of serially.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_field_size() -> usize {
    256
}
fn default_field_range() -> f32 {
    16.0
}
fn default_decay_rate() -> f32 {
    2.0
}
fn default_diffusion() -> f32 {
    0.2
}
fn default_injection_gain() -> f32 {
    1.0
}
fn default_kernel() -> DisturbanceKernel {
    DisturbanceKernel::Gaussian
}
fn default_parallel() -> bool {
    true
}

impl Default for FieldSettings {
    fn default() -> Self {
        FieldSettings {
            size: default_field_size(),
            range: default_field_range(),
            decay_rate: default_decay_rate(),
            diffusion: default_diffusion(),
            injection_gain: default_injection_gain(),
            kernel: default_kernel(),
            parallel: default_parallel(),
        }
    }
}

/// Leaf particle consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafSettings {
    #[serde(default = "default_leaf_count")]
    pub count: usize,
    /// Most particles allowed airborne at once.
    #[serde(default = "default_max_afloat")]
    pub max_afloat: usize,
    #[serde(default = "default_wind_resistance")]
    pub wind_resistance: f32,
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    /// Half extent of the square the leaves are scattered over.
    #[serde(default = "default_spawn_extent")]
    pub spawn_extent: f32,
    #[serde(default = "default_leaf_seed")]
    pub seed: u64,
}

fn default_leaf_count() -> usize {
    64
}
fn default_max_afloat() -> usize {
    4
}
fn default_wind_resistance() -> f32 {
    1.0
}
fn default_gravity() -> f32 {
    1.0
}
fn default_spawn_extent() -> f32 {
    8.0
}
fn default_leaf_seed() -> u64 {
    7
}

impl Default for LeafSettings {
    fn default() -> Self {
        LeafSettings {
            count: default_leaf_count(),
            max_afloat: default_max_afloat(),
            wind_resistance: default_wind_resistance(),
            gravity: default_gravity(),
            spawn_extent: default_spawn_extent(),
            seed: default_leaf_seed(),
        }
    }
}

/// Scripted player used by the headless driver: walks a circle around the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettings {
    #[serde(default = "default_player_radius")]
    pub radius: f32,
    #[serde(default = "default_orbit_radius")]
    pub orbit_radius: f32,
    /// Walking speed along the orbit, world units per second.
    #[serde(default = "default_orbit_speed")]
    pub orbit_speed: f32,
}

fn default_player_radius() -> f32 {
    0.5
}
fn default_orbit_radius() -> f32 {
    6.0
}
fn default_orbit_speed() -> f32 {
    3.0
}

impl Default for PlayerSettings {
    fn default() -> Self {
        PlayerSettings {
            radius: default_player_radius(),
            orbit_radius: default_orbit_radius(),
            orbit_speed: default_orbit_speed(),
        }
    }
}

/// Startup texture bake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakeConfig {
    #[serde(default = "default_bake_size")]
    pub size: usize,
    #[serde(default)]
    pub seed: i32,
}

fn default_bake_size() -> usize {
    256
}

impl Default for BakeConfig {
    fn default() -> Self {
        BakeConfig {
            size: default_bake_size(),
            seed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaussian_kernel_peaks_at_center_and_cuts_off() {
        assert_eq!(DisturbanceKernel::Gaussian.falloff(0.0), 1.0);
        assert!(DisturbanceKernel::Gaussian.falloff(1.0) < 0.1);
        assert_eq!(DisturbanceKernel::Gaussian.falloff(2.6), 0.0);
    }

    #[test]
    fn cone_and_disk_kernels() {
        assert_eq!(DisturbanceKernel::Cone.falloff(0.25), 0.75);
        assert_eq!(DisturbanceKernel::Cone.falloff(1.5), 0.0);
        assert_eq!(DisturbanceKernel::Disk.falloff(1.0), 1.0);
        assert_eq!(DisturbanceKernel::Disk.falloff(1.01), 0.0);
    }

    #[test]
    fn influence_spheres_parse_with_default_radius() {
        let wind: WindSettings = toml::from_str(
            r#"
            [[influence_spheres]]
            center = [1.0, 0.0, 2.0]

            [[influence_spheres]]
            center = [0.0, 0.0, 0.0]
            radius = -1.0
        "#,
        )
        .unwrap();
        assert_eq!(wind.influence_spheres.len(), 2);
        assert_eq!(wind.influence_spheres[0].center, [1.0, 0.0, 2.0]);
        assert_eq!(wind.influence_spheres[0].radius, 5.0);
        assert_eq!(wind.influence_spheres[1].radius, -1.0);
        assert_eq!(wind.ambient_master_volume, 1.0);
    }

    #[test]
    fn kernel_parses_lowercase() {
        let field: FieldSettings = toml::from_str(r#"kernel = "cone""#).unwrap();
        assert_eq!(field.kernel, DisturbanceKernel::Cone);
        assert_eq!(field.size, 256);
    }
}
