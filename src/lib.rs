pub mod cli;
pub mod config;
pub mod field;
pub mod persistence;
pub mod simulation;
