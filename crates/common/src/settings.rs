use std::collections::HashMap;

use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::ExchangeError;

pub const ENVIRONMENT_VARIABLE_PREFIX: &str = "RTB_EXCHANGE";
pub const ENVIRONMENT_VARIABLE_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ExchangeSettings {
    /// Timeout applied to auctions that carry no `tmax`.
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1))]
    pub default_timeout_ms: u32,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_timeout_ms() -> u32 {
    1000
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Settings {
    #[serde(default)]
    #[validate(nested)]
    pub exchange: ExchangeSettings,
    /// Raw adapter tables keyed by bidder code; each adapter parses its own.
    #[serde(default)]
    pub adapters: HashMap<String, Value>,
}

/// Configuration owned by one adapter under `[adapters.<code>]`.
pub trait AdapterConfig: DeserializeOwned + Validate {
    fn is_enabled(&self) -> bool;
}

impl Settings {
    /// Load the settings bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Configuration`] when the bundled TOML or an
    /// environment override is invalid.
    pub fn new() -> Result<Self, Report<ExchangeError>> {
        let toml_str = include_str!("../../../rtb-exchange.toml");
        Self::from_toml(toml_str)
    }

    /// Parse settings from TOML, then apply `RTB_EXCHANGE__*` environment
    /// overrides (e.g. `RTB_EXCHANGE__EXCHANGE__DEFAULT_TIMEOUT_MS`).
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Configuration`] when the TOML cannot be
    /// parsed or the resulting settings fail validation.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<ExchangeError>> {
        let environment = Environment::default()
            .prefix(ENVIRONMENT_VARIABLE_PREFIX)
            .separator(ENVIRONMENT_VARIABLE_SEPARATOR)
            // Adapter tables stay untyped until `adapter_config`, so scalars
            // must be parsed here.
            .try_parsing(true);

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(ExchangeError::Configuration {
                message: "Failed to build configuration".to_string(),
            })?;

        let settings: Self =
            config
                .try_deserialize()
                .change_context(ExchangeError::Configuration {
                    message: "Failed to deserialize configuration".to_string(),
                })?;

        settings
            .validate()
            .change_context(ExchangeError::Configuration {
                message: "Settings validation failed".to_string(),
            })?;

        Ok(settings)
    }

    /// Typed configuration of the adapter registered under `code`.
    ///
    /// Returns `Ok(None)` when the adapter has no table or is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Configuration`] when an enabled adapter's
    /// table cannot be parsed or fails validation.
    pub fn adapter_config<T: AdapterConfig>(
        &self,
        code: &str,
    ) -> Result<Option<T>, Report<ExchangeError>> {
        let Some(raw) = self.adapters.get(code) else {
            return Ok(None);
        };

        let config: T =
            serde_json::from_value(raw.clone()).change_context(ExchangeError::Configuration {
                message: format!("Invalid configuration for adapter '{code}'"),
            })?;

        if !config.is_enabled() {
            return Ok(None);
        }

        config
            .validate()
            .change_context(ExchangeError::Configuration {
                message: format!("Configuration for adapter '{code}' failed validation"),
            })?;

        Ok(Some(config))
    }
}
