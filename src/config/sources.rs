//! Config sources: the user config file and `FRAMENAV_*` environment overrides.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing::debug;

pub const ENV_PREFIX: &str = "FRAMENAV";

/// Path to the user config file, e.g. `~/.config/framenav/config.toml` on Linux.
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "framenav").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Add the user config file to the builder if it exists.
pub fn add_user_file(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    match user_config_path() {
        Some(path) if path.exists() => builder.add_source(File::from(path).required(false)),
        Some(path) => {
            debug!(config_path = %path.display(), "No user configuration file");
            builder
        }
        None => builder,
    }
}

/// Environment source: `FRAMENAV_POLICY__COORDINATOR_SIDE_NAVIGATION=false` overrides
/// `policy.coordinator_side_navigation`.
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
