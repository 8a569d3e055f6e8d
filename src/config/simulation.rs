use serde::Deserialize;
use std::path::Path;

use crate::config::wind::{BakeConfig, FieldSettings, LeafSettings, PlayerSettings, WindSettings};

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: f32,
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval: u32,
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: u32,
    #[serde(default = "default_snapshot_directory")]
    pub snapshot_directory: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
    #[serde(default)]
    pub wind: WindSettings,
    #[serde(default)]
    pub field: FieldSettings,
    #[serde(default)]
    pub leaves: LeafSettings,
    #[serde(default)]
    pub player: PlayerSettings,
    #[serde(default)]
    pub bake: BakeConfig,
}

/// Above this the frame period rounds toward zero.
const MAX_TICK_RATE_HZ: f32 = 1000.0;

fn default_tick_rate() -> f32 {
    60.0
}
fn default_snapshot_interval() -> u32 {
    600
}
fn default_max_snapshots() -> u32 {
    10
}
fn default_snapshot_directory() -> String {
    "./snapshots".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            tick_rate_hz: default_tick_rate(),
            snapshot_interval: default_snapshot_interval(),
            max_snapshots: default_max_snapshots(),
            snapshot_directory: default_snapshot_directory(),
            log_level: default_log_level(),
            log_json: false,
            wind: WindSettings::default(),
            field: FieldSettings::default(),
            leaves: LeafSettings::default(),
            player: PlayerSettings::default(),
            bake: BakeConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    /// Load a config file if it exists, otherwise fall back to defaults.
    pub fn from_file_or_default(path: &Path) -> Result<Self, String> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: SimulationConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field and report all violations at once.
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.tick_rate_hz.is_nan()
            || self.tick_rate_hz <= 0.0
            || self.tick_rate_hz > MAX_TICK_RATE_HZ
        {
            errors.push(format!(
                "tick_rate_hz must be > 0.0 and <= {}, got {}. Example: tick_rate_hz = 60.0",
                MAX_TICK_RATE_HZ, self.tick_rate_hz
            ));
        }

        if self.snapshot_interval == 0 {
            errors.push(format!(
                "snapshot_interval must be > 0, got {}. Example: snapshot_interval = 600",
                self.snapshot_interval
            ));
        }

        if self.max_snapshots == 0 {
            errors.push(format!(
                "max_snapshots must be > 0, got {}. Example: max_snapshots = 10",
                self.max_snapshots
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.log_level
            ));
        }

        let non_negative = [
            ("wind.wind_scale", self.wind.wind_scale),
            ("wind.wind_shift_speed", self.wind.wind_shift_speed),
            ("wind.wind_strength", self.wind.wind_strength),
            ("wind.dynamic_wind_strength", self.wind.dynamic_wind_strength),
            ("wind.dynamic_wind_radius", self.wind.dynamic_wind_radius),
            ("wind.ambient_master_volume", self.wind.ambient_master_volume),
            ("field.decay_rate", self.field.decay_rate),
            ("field.injection_gain", self.field.injection_gain),
            ("leaves.wind_resistance", self.leaves.wind_resistance),
            ("leaves.gravity", self.leaves.gravity),
            ("player.radius", self.player.radius),
            ("player.orbit_radius", self.player.orbit_radius),
            ("player.orbit_speed", self.player.orbit_speed),
        ];
        for (name, value) in non_negative {
            if value.is_nan() || value < 0.0 {
                errors.push(format!("{} must be >= 0.0, got {}", name, value));
            }
        }

        if self.field.size < 2 || !self.field.size.is_power_of_two() {
            errors.push(format!(
                "field.size must be a power of two >= 2, got {}. Example: size = 256",
                self.field.size
            ));
        }

        if self.field.range <= 0.0 {
            errors.push(format!(
                "field.range must be > 0.0, got {}. Example: range = 16.0",
                self.field.range
            ));
        }

        if !(0.0..=1.0).contains(&self.field.diffusion) {
            errors.push(format!(
                "field.diffusion must be 0.0-1.0, got {}",
                self.field.diffusion
            ));
        }

        if self.bake.size < 2 || !self.bake.size.is_power_of_two() {
            errors.push(format!(
                "bake.size must be a power of two >= 2, got {}. Example: size = 256",
                self.bake.size
            ));
        }

        let spheres = self.wind.influence_spheres.len();
        if spheres > 0 && self.wind.wind_sphere_index >= spheres {
            errors.push(format!(
                "wind.wind_sphere_index must be < {} (number of influence spheres), got {}",
                spheres, self.wind.wind_sphere_index
            ));
        }
        for (i, sphere) in self.wind.influence_spheres.iter().enumerate() {
            if sphere.center.iter().any(|c| !c.is_finite()) || sphere.radius.is_nan() {
                errors.push(format!(
                    "wind.influence_spheres[{}] must have a finite center and a radius, got {:?}",
                    i, sphere
                ));
            }
        }

        if self.leaves.spawn_extent <= 0.0 {
            errors.push(format!(
                "leaves.spawn_extent must be > 0.0, got {}",
                self.leaves.spawn_extent
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::wind::DisturbanceKernel;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn test_path() -> PathBuf {
        PathBuf::from("test-config.toml")
    }

    #[test]
    fn valid_config_loads_all_sections() {
        let toml = r#"
            tick_rate_hz = 30.0
            snapshot_interval = 50
            max_snapshots = 5
            snapshot_directory = "./data/snapshots"
            log_level = "debug"
            log_json = true

            [wind]
            wind_scale = 0.05
            wind_shift_speed = 0.1
            wind_strength = 2.0
            dynamic_wind_strength = 10.0
            dynamic_wind_radius = 1.5

            [field]
            size = 128
            range = 8.0
            decay_rate = 1.0
            diffusion = 0.5
            injection_gain = 3.0
            kernel = "disk"
            parallel = false

            [leaves]
            count = 10
            max_afloat = 2

            [player]
            orbit_speed = 1.0

            [bake]
            size = 64
            seed = 3
        "#;
        let config = SimulationConfig::from_toml_str(toml, &test_path()).unwrap();
        assert_eq!(config.tick_rate_hz, 30.0);
        assert_eq!(config.snapshot_interval, 50);
        assert_eq!(config.max_snapshots, 5);
        assert_eq!(config.snapshot_directory, "./data/snapshots");
        assert_eq!(config.log_level, "debug");
        assert!(config.log_json);
        assert_eq!(config.wind.wind_scale, 0.05);
        assert_eq!(config.wind.dynamic_wind_radius, 1.5);
        assert_eq!(config.field.size, 128);
        assert_eq!(config.field.kernel, DisturbanceKernel::Disk);
        assert!(!config.field.parallel);
        assert_eq!(config.leaves.count, 10);
        assert_eq!(config.leaves.max_afloat, 2);
        assert_eq!(config.leaves.wind_resistance, 1.0);
        assert_eq!(config.player.orbit_speed, 1.0);
        assert_eq!(config.player.orbit_radius, 6.0);
        assert_eq!(config.bake.size, 64);
        assert_eq!(config.bake.seed, 3);
    }

    #[test]
    fn defaults_applied_for_empty_config() {
        let config = SimulationConfig::from_toml_str("", &test_path()).unwrap();
        assert_eq!(config.tick_rate_hz, 60.0);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.wind.wind_scale, 0.02);
        assert_eq!(config.wind.wind_shift_speed, 0.02);
        assert_eq!(config.wind.wind_strength, 1.0);
        assert_eq!(config.wind.dynamic_wind_strength, 20.0);
        assert_eq!(config.wind.dynamic_wind_radius, 1.0);
        assert_eq!(config.field.size, 256);
        assert_eq!(config.field.range, 16.0);
        assert_eq!(config.field.kernel, DisturbanceKernel::Gaussian);
        assert_eq!(config.leaves.max_afloat, 4);
        assert_eq!(config.bake.size, 256);
        assert_eq!(config.bake.seed, 0);
    }

    #[test]
    fn excessive_tick_rate_rejected() {
        let err = SimulationConfig::from_toml_str("tick_rate_hz = 1e30", &test_path()).unwrap_err();
        assert!(err.contains("tick_rate_hz"));
        assert!(SimulationConfig::from_toml_str("tick_rate_hz = 1000.0", &test_path()).is_ok());
        assert!(SimulationConfig::from_toml_str("tick_rate_hz = nan", &test_path()).is_err());
    }

    #[test]
    fn wind_sphere_index_must_name_a_sphere() {
        let toml = r#"
            [wind]
            wind_sphere_index = 1

            [[wind.influence_spheres]]
            center = [0.0, 0.0, 0.0]
        "#;
        let err = SimulationConfig::from_toml_str(toml, &test_path()).unwrap_err();
        assert!(err.contains("wind_sphere_index"));
    }

    #[test]
    fn invalid_tick_rate_rejected() {
        let err = SimulationConfig::from_toml_str("tick_rate_hz = -1.0", &test_path()).unwrap_err();
        assert!(err.contains("tick_rate_hz"));
        assert!(err.contains("> 0.0"));
    }

    #[test]
    fn non_power_of_two_field_rejected() {
        let err =
            SimulationConfig::from_toml_str("[field]\nsize = 100", &test_path()).unwrap_err();
        assert!(err.contains("field.size"));
    }

    #[test]
    fn negative_wind_strength_rejected() {
        let err = SimulationConfig::from_toml_str("[wind]\nwind_strength = -2.0", &test_path())
            .unwrap_err();
        assert!(err.contains("wind.wind_strength"));
    }

    #[test]
    fn unknown_kernel_rejected() {
        let err = SimulationConfig::from_toml_str("[field]\nkernel = \"spiral\"", &test_path())
            .unwrap_err();
        assert!(err.contains("test-config.toml"));
    }

    #[test]
    fn invalid_log_level_rejected() {
        let err =
            SimulationConfig::from_toml_str(r#"log_level = "verbose""#, &test_path()).unwrap_err();
        assert!(err.contains("log_level"));
    }

    #[test]
    fn multiple_errors_reported_together() {
        let toml = "tick_rate_hz = 0.0\nsnapshot_interval = 0\n[field]\ndiffusion = 2.0";
        let err = SimulationConfig::from_toml_str(toml, &test_path()).unwrap_err();
        assert!(err.contains("tick_rate_hz"));
        assert!(err.contains("snapshot_interval"));
        assert!(err.contains("field.diffusion"));
    }

    #[test]
    fn malformed_toml_includes_source_path() {
        let err =
            SimulationConfig::from_toml_str("tick_rate_hz = [invalid", &test_path()).unwrap_err();
        assert!(err.contains("test-config.toml"));
    }

    #[test]
    fn from_file_loads_valid_config() {
        let mut tmp = NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(tmp, "tick_rate_hz = 5.0").unwrap();
        let config = SimulationConfig::from_file(tmp.path()).unwrap();
        assert_eq!(config.tick_rate_hz, 5.0);
    }

    #[test]
    fn from_file_missing_file_error() {
        let err = SimulationConfig::from_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.contains("Cannot read"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config =
            SimulationConfig::from_file_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.tick_rate_hz, 60.0);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }
}
