//! Merge rules: defaults applied before any file or environment source.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("policy.coordinator_handles_all_top_level_requests", false)?
        .set_default("policy.coordinator_side_navigation", true)?
        .set_default("policy.suppress_client_blocked_error_page", false)?
        .set_default("policy.privileged_schemes", vec!["chrome"])?
        .set_default("policy.view_source_scheme", "view-source")?
        .set_default("policy.enforce_origin_consistency", true)?
        .set_default(
            "history.max_entries",
            i64::from(super::DEFAULT_MAX_HISTORY_ENTRIES),
        )
}
