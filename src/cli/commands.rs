use std::path::Path;
use std::time::Duration;

use glam::Vec3;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::simulation::SimulationConfig;
use crate::config::wind::PlayerSettings;
use crate::field::{bake_curl, bake_density};
use crate::persistence::{self, SnapshotError};
use crate::simulation::potential::PlayerState;
use crate::simulation::{execute_frame, FrameInput, WindSystem};

/// Player walking a circle around the origin at constant speed.
///
/// Velocity is the analytic tangent, so the field sees the same speed the
/// position track implies.
pub fn scripted_player(settings: &PlayerSettings, time: f32) -> PlayerState {
    let radius = settings.orbit_radius;
    if radius <= 0.0 {
        return PlayerState { radius: settings.radius, ..PlayerState::default() };
    }
    let angular = settings.orbit_speed / radius;
    let angle = angular * time;
    let (sin, cos) = angle.sin_cos();
    PlayerState {
        position: Vec3::new(cos * radius, 0.0, sin * radius),
        velocity: Vec3::new(-sin, 0.0, cos) * settings.orbit_speed,
        radius: settings.radius,
    }
}

fn frame_input(config: &SimulationConfig, system: &WindSystem) -> FrameInput {
    let dt = 1.0 / config.tick_rate_hz;
    FrameInput {
        player: scripted_player(&config.player, system.time() + dt),
        dt,
    }
}

/// Restore the potential field from a snapshot, if one is available.
///
/// An explicit path must load; otherwise the newest valid snapshot is used and
/// an empty directory just means a cold start.
fn restore_field(
    config: &SimulationConfig,
    system: &mut WindSystem,
    snapshot: Option<&str>,
) -> Result<(), String> {
    let state = match snapshot {
        Some(path) => persistence::load_snapshot(Path::new(path))
            .map_err(|e| format!("Failed to load snapshot: {}", e))?,
        None => {
            match persistence::load_latest_valid_snapshot(Path::new(&config.snapshot_directory)) {
                Ok(state) => state,
                Err(SnapshotError::NoValidSnapshots) => {
                    info!(dir = %config.snapshot_directory, "No field snapshot, starting cold");
                    return Ok(());
                }
                Err(e) => return Err(format!("Failed to load snapshot: {}", e)),
            }
        }
    };

    if system.field_mut().restore(&state) {
        system.set_frame(state.frame + 1);
        info!(frame = state.frame, "Potential field restored");
    }
    Ok(())
}

/// Run the headless frame loop until Ctrl-C.
pub async fn run_simulation(
    config: &SimulationConfig,
    snapshot: Option<&str>,
) -> Result<(), String> {
    let mut system = WindSystem::from_config(config)?;
    restore_field(config, &mut system, snapshot)?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut interval =
        tokio::time::interval(Duration::from_secs_f32(1.0 / config.tick_rate_hz));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut frames_since_snapshot: u32 = 0;

    info!(
        tick_rate_hz = config.tick_rate_hz,
        snapshot_interval = config.snapshot_interval,
        "Wind simulation running"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }

        let input = frame_input(config, &system);
        let result = execute_frame(&mut system, &input);

        frames_since_snapshot += 1;
        if frames_since_snapshot >= config.snapshot_interval {
            frames_since_snapshot = 0;
            save_and_prune(config, &system, result.statistics.frame);
        }

        if result.statistics.frame % 600 == 0 {
            info!(
                frame = result.statistics.frame,
                max_potential = result.statistics.max_potential,
                player_wind = result.statistics.player_wind_speed,
                afloat = result.statistics.leaves_afloat,
                ambient = result.ambient_volume,
                ms = result.statistics.frame_duration_ms,
                "Frame milestone"
            );
        }
    }

    if system.frame() > 0 {
        save_and_prune(config, &system, system.frame() - 1);
    }
    info!(frame = system.frame(), "Wind simulation stopped");
    Ok(())
}

fn save_and_prune(config: &SimulationConfig, system: &WindSystem, frame: u64) {
    let snapshot_dir = Path::new(&config.snapshot_directory);
    match persistence::save_snapshot(&system.field().to_state(frame), snapshot_dir) {
        Ok(path) => {
            info!(path = %path.display(), "Field snapshot saved");
            if let Err(e) =
                persistence::prune_snapshots(snapshot_dir, config.max_snapshots as usize)
            {
                warn!(error = %e, "Snapshot pruning failed");
            }
        }
        Err(e) => warn!(error = %e, "Snapshot save failed"),
    }
}

/// Min / mean / max of one baked channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelSummary {
    pub min: f32,
    pub mean: f32,
    pub max: f32,
}

impl ChannelSummary {
    fn from_values(values: impl Iterator<Item = f32>) -> Self {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0_f64;
        let mut count = 0usize;
        for v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v as f64;
            count += 1;
        }
        if count == 0 {
            return ChannelSummary { min: 0.0, mean: 0.0, max: 0.0 };
        }
        ChannelSummary { min, mean: (sum / count as f64) as f32, max }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BakeSummary {
    pub size: usize,
    pub seed: i32,
    pub density: ChannelSummary,
    pub curl_speed: ChannelSummary,
}

/// Bake both textures as configured and summarise them.
pub fn bake_summary(config: &SimulationConfig) -> Result<BakeSummary, String> {
    let size = config.bake.size;
    let seed = config.bake.seed;
    let density = bake_density(size, seed).map_err(|e| e.to_string())?;
    let curl = bake_curl(size, seed).map_err(|e| e.to_string())?;

    Ok(BakeSummary {
        size,
        seed,
        density: ChannelSummary::from_values(density.texels().iter().copied()),
        curl_speed: ChannelSummary::from_values(curl.texels().iter().map(|t| t.speed)),
    })
}

pub fn print_bake_summary(summary: &BakeSummary) {
    println!("=== Bake Summary ===");
    println!("Size: {}x{}  Seed: {}", summary.size, summary.size, summary.seed);
    println!(
        "Density:    min {:>8.4}  mean {:>8.4}  max {:>8.4}",
        summary.density.min, summary.density.mean, summary.density.max
    );
    println!(
        "Curl speed: min {:>8.4}  mean {:>8.4}  max {:>8.4}",
        summary.curl_speed.min, summary.curl_speed.mean, summary.curl_speed.max
    );
}

/// Upper bound on debug grid points along each axis.
pub const MAX_GRID_SIDE: usize = 1024;

/// One arrow of the debug vector grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VectorDebug {
    pub position: Vec3,
    /// Wind velocity with length clamped to 1.
    pub wind: Vec3,
}

/// Sample the wind on a square grid in the XZ plane after warming the field
/// up for `frames` frames of the scripted player.
pub fn sample_grid(
    config: &SimulationConfig,
    min: f32,
    max: f32,
    step: f32,
    frames: u32,
) -> Result<Vec<VectorDebug>, String> {
    if !min.is_finite() || !max.is_finite() {
        return Err(format!("min and max must be finite, got {} and {}", min, max));
    }
    if !step.is_finite() || step <= 0.0 {
        return Err(format!("step must be a finite value > 0.0, got {}", step));
    }
    if max < min {
        return Err(format!("max ({}) must not be below min ({})", max, min));
    }
    let cells = ((max - min) / step).floor();
    if !cells.is_finite() || cells >= MAX_GRID_SIDE as f32 {
        return Err(format!(
            "grid would have more than {} points per side; increase step or shrink the box",
            MAX_GRID_SIDE
        ));
    }

    let mut system = WindSystem::from_config(config)?;
    for _ in 0..frames {
        let input = frame_input(config, &system);
        execute_frame(&mut system, &input);
    }

    let count = cells as usize + 1;
    let positions: Vec<Vec3> = (0..count)
        .flat_map(|iz| {
            (0..count).map(move |ix| Vec3::new(min + ix as f32 * step, 0.0, min + iz as f32 * step))
        })
        .collect();

    let sampler = system.sampler();
    Ok(positions
        .into_iter()
        .map(|position| VectorDebug {
            position,
            wind: sampler.wind_velocity(position).clamp_length_max(1.0),
        })
        .collect())
}

pub fn print_snapshot_list(dir: &Path) -> Result<(), String> {
    let snapshots = persistence::list_snapshots(dir)
        .map_err(|e| format!("Error listing snapshots: {}", e))?;
    if snapshots.is_empty() {
        println!("No snapshots found in {}", dir.display());
        return Ok(());
    }
    println!("{:<44} {:>8} {:>10}", "File", "Frame", "Size");
    println!("{}", "-".repeat(64));
    for s in &snapshots {
        let name = s.path.file_name().and_then(|n| n.to_str()).unwrap_or("?");
        println!("{:<44} {:>8} {:>7} KB", name, s.frame, s.file_size / 1024);
    }
    println!("\n{} snapshot(s) in {}", snapshots.len(), dir.display());
    Ok(())
}

pub fn print_snapshot_summary(path: &Path) -> Result<(), String> {
    let state = persistence::load_snapshot(path)
        .map_err(|e| format!("Error restoring snapshot: {}", e))?;
    let max = state.potential.iter().fold(0.0_f32, |m, v| m.max(v.abs()));
    println!("Restored field from {}", path.display());
    println!("Frame: {}", state.frame);
    println!("Resolution: {}x{}  Range: {}", state.size, state.size, state.range);
    println!(
        "Center: ({:.2}, {:.2}, {:.2})",
        state.center.x, state.center.y, state.center.z
    );
    println!("Max |potential|: {:.5}", max);
    Ok(())
}
