use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - listing URLs are http(s) and non-empty
/// - the catalog marker is non-empty
/// - at least one quality tier is accepted
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if !config.listing.base_url.starts_with("http://")
        && !config.listing.base_url.starts_with("https://")
    {
        return Err(ConfigError::ValidationError(
            "listing.base_url must be an http(s) URL".to_string(),
        ));
    }

    if !config.listing.site_root.starts_with("http://")
        && !config.listing.site_root.starts_with("https://")
    {
        return Err(ConfigError::ValidationError(
            "listing.site_root must be an http(s) URL".to_string(),
        ));
    }

    if config.listing.marker.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "listing.marker cannot be empty".to_string(),
        ));
    }

    if config.listing.accepted_tiers.is_empty() {
        return Err(ConfigError::ValidationError(
            "listing.accepted_tiers cannot be empty".to_string(),
        ));
    }

    if config.library.extensions.is_empty() {
        return Err(ConfigError::ValidationError(
            "library.extensions cannot be empty".to_string(),
        ));
    }

    Ok(())
}
