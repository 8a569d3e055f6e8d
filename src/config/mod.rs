pub mod simulation;
pub mod wind;

pub use simulation::SimulationConfig;
pub use wind::{
    BakeConfig, DisturbanceKernel, FieldSettings, LeafSettings, PlayerSettings, SphereSettings,
    WindSettings,
};
