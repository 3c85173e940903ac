// src/config/mod.rs

//! Configuration: TOML model, validation and loading.

pub mod defaults;
pub mod loader;
pub mod model;
pub mod validate;

pub use model::{
    ConfigFile, ConfigSection, RawConfigFile, ResolveSection, TaskConfig, TaskKindConfig,
};
