//! Configuration loading facade.

use super::{merge_policy, sources, FrameNavConfig};
use crate::error::ConfigError;
use config::File;
use std::path::Path;

/// Loads [`FrameNavConfig`] from layered sources.
///
/// Precedence (lowest to highest): defaults, user config file, explicit file,
/// `FRAMENAV_*` environment variables.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(explicit: Option<&Path>) -> Result<FrameNavConfig, ConfigError> {
        let mut builder = merge_policy::builder_with_defaults()?;
        builder = sources::add_user_file(builder);
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(sources::environment());

        let config: FrameNavConfig = builder.build()?.try_deserialize()?;
        Self::validated(config)
    }

    /// Load from a single file on top of the defaults, ignoring user and environment
    /// sources.
    pub fn load_from_file(path: &Path) -> Result<FrameNavConfig, ConfigError> {
        let config: FrameNavConfig = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()?;
        Self::validated(config)
    }

    fn validated(config: FrameNavConfig) -> Result<FrameNavConfig, ConfigError> {
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ConfigError::Invalid(error_msgs.join("\n"))
        })?;
        Ok(config)
    }
}
