//! Configuration loading and env substitution for the indus agent.
//!
//! Config files: `indus.toml`, `indus.yaml`, or `indus.json`
//! Searched in `./` then `~/.config/indus/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        apply_env_overrides, clear_config_dir, config_dir, discover_and_load, load_config,
        set_config_dir,
    },
    schema::{AgentConfig, DispatchConfig, IndusConfig, ServiceConfig},
};
