// src/cfg/mod.rs

pub mod config;
pub mod secure;

pub use config::{load_config, Config, SkipLabels};
