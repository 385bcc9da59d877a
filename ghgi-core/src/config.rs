//! Engine configuration.
//!
//! The engine has a single tunable: the projection horizon policy. The
//! configuration deserializes from TOML so deployments can override the cap
//! without code changes; the default preserves the 50-year horizon.

use crate::errors::{EngineError, EngineResult};
use crate::projection::ProjectionPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub projection: ProjectionPolicy,
}

impl EngineConfig {
    /// Parses a configuration from a TOML document.
    pub fn from_toml_str(raw: &str) -> EngineResult<Self> {
        toml::from_str(raw).map_err(|e| EngineError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::DEFAULT_MAX_HORIZON_YEARS;

    #[test]
    fn default_preserves_the_fifty_year_horizon() {
        let config = EngineConfig::default();
        assert_eq!(
            config.projection.max_horizon_years,
            DEFAULT_MAX_HORIZON_YEARS
        );
    }

    #[test]
    fn parses_an_override_from_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            [projection]
            max_horizon_years = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.projection.max_horizon_years, 30);
        assert_eq!(config.projection.max_allowed_end_year(2024), 2054);
    }

    #[test]
    fn empty_document_falls_back_to_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn invalid_document_is_a_config_error() {
        let err = EngineConfig::from_toml_str("projection = 5").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
