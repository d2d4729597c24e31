//! Registry configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Tunables for a [`Registry`](crate::Registry).
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
	/// Label attached to log events emitted by this registry.
	pub name: String,
	/// Reject factory results that do not provide every registered interface.
	pub validate_factory_interfaces: bool,
	/// Warn when a stopping module still holds service usage counts.
	pub warn_on_outstanding_usage: bool,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			name: "plexus".to_string(),
			validate_factory_interfaces: true,
			warn_on_outstanding_usage: true,
		}
	}
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid registry config: {0}")]
	Parse(#[from] toml::de::Error),
}

impl RegistryConfig {
	/// Parses a config from a TOML document.
	pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(content)?)
	}

	/// Reads and parses a TOML config file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_toml_str(&content)
	}
}
