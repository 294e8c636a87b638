//! Run configuration

use crate::error::{ConformanceError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one conformance run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Server name the technology under test announces
    pub tut_server_name: String,

    /// Metadata collection id the technology under test announces
    pub tut_metadata_collection_id: String,

    /// Caller identity passed on every probe
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Run the TypeDef probes
    #[serde(default = "enabled")]
    pub run_type_def_probes: bool,

    /// Run the AttributeTypeDef probes
    #[serde(default = "enabled")]
    pub run_attribute_type_def_probes: bool,

    /// Validate inbound type definition events
    #[serde(default = "enabled")]
    pub run_event_probes: bool,

    /// How long to wait for the event stream once the query probes finish
    #[serde(default = "default_event_drain_timeout_ms")]
    pub event_drain_timeout_ms: u64,
}

fn default_user_id() -> String {
    "conformance-suite".to_string()
}

fn enabled() -> bool {
    true
}

fn default_event_drain_timeout_ms() -> u64 {
    5_000
}

impl RunConfig {
    /// Configuration with every probe group enabled
    pub fn new(
        tut_server_name: impl Into<String>,
        tut_metadata_collection_id: impl Into<String>,
    ) -> Self {
        Self {
            tut_server_name: tut_server_name.into(),
            tut_metadata_collection_id: tut_metadata_collection_id.into(),
            user_id: default_user_id(),
            run_type_def_probes: true,
            run_attribute_type_def_probes: true,
            run_event_probes: true,
            event_drain_timeout_ms: default_event_drain_timeout_ms(),
        }
    }

    /// Set the caller identity
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Set the event drain timeout
    pub fn with_event_drain_timeout(mut self, timeout: Duration) -> Self {
        self.event_drain_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn event_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.event_drain_timeout_ms)
    }

    /// Check required identity fields are present
    pub fn validate(&self) -> Result<()> {
        if self.tut_server_name.trim().is_empty() {
            return Err(ConformanceError::InvalidConfig(
                "tut_server_name is required".to_string(),
            ));
        }
        if self.tut_metadata_collection_id.trim().is_empty() {
            return Err(ConformanceError::InvalidConfig(
                "tut_metadata_collection_id is required".to_string(),
            ));
        }
        if self.user_id.trim().is_empty() {
            return Err(ConformanceError::InvalidConfig("user_id is required".to_string()));
        }
        Ok(())
    }

    /// Load configuration from TOML
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConformanceError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub async fn from_file(path: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConformanceError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConformanceError::ConfigParse(e.to_string()))
    }
}
