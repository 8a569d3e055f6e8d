use serde::Serialize;

use crate::simulation::leaves::LeafReport;
use crate::simulation::potential::WindPotentialField;

/// Per-frame aggregate metrics for logging and the headless driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameStatistics {
    pub frame: u64,
    pub time: f32,
    pub max_potential: f32,
    pub mean_potential: f32,
    /// Wind speed at the player, static plus dynamic.
    pub player_wind_speed: f32,
    pub ambient_volume: f32,
    pub leaves_kicked: usize,
    pub leaves_afloat: usize,
    pub leaves_airborne: usize,
    pub frame_duration_ms: f32,
}

pub fn compute_statistics(
    frame: u64,
    time: f32,
    field: &WindPotentialField,
    player_wind_speed: f32,
    ambient_volume: f32,
    leaves: &LeafReport,
    frame_duration_ms: f32,
) -> FrameStatistics {
    FrameStatistics {
        frame,
        time,
        max_potential: field.max_abs(),
        mean_potential: field.mean_abs(),
        player_wind_speed,
        ambient_volume,
        leaves_kicked: leaves.kicked,
        leaves_afloat: leaves.afloat,
        leaves_airborne: leaves.airborne,
        frame_duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_field_reports_zero_potential() {
        let field = WindPotentialField::new(16, 4.0);
        let report = LeafReport { kicked: 2, afloat: 3, airborne: 1 };
        let stats = compute_statistics(9, 0.15, &field, 0.4, 0.7, &report, 1.5);
        assert_eq!(stats.frame, 9);
        assert_eq!(stats.max_potential, 0.0);
        assert_eq!(stats.mean_potential, 0.0);
        assert_eq!(stats.ambient_volume, 0.7);
        assert_eq!(stats.leaves_kicked, 2);
        assert_eq!(stats.leaves_afloat, 3);
        assert_eq!(stats.leaves_airborne, 1);
    }
}
