//! Cache freshness configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CacheKey, Collection, ReadOptions};

/// Errors raised while loading [`CacheConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The TOML document is malformed or has invalid values.
	#[error("cache config parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// The configuration file could not be read.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},
}

/// Freshness windows per collection, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
	/// Window for `businesses:list`.
	pub businesses_stale_ms: u64,
	/// Window for `businesses:{id}:branches`.
	pub branches_stale_ms: u64,
	/// Window for `businesses:{id}:settings`.
	pub settings_stale_ms: u64,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			businesses_stale_ms: 60_000,
			branches_stale_ms: 30_000,
			settings_stale_ms: 30_000,
		}
	}
}

impl CacheConfig {
	/// Parses a TOML document. Missing fields keep their defaults.
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(source)?)
	}

	/// Loads a TOML file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let source = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&source)
	}

	/// Freshness window for a collection.
	pub fn stale_after(&self, collection: Collection) -> Duration {
		let ms = match collection {
			Collection::Businesses => self.businesses_stale_ms,
			Collection::Branches => self.branches_stale_ms,
			Collection::Settings => self.settings_stale_ms,
		};
		Duration::from_millis(ms)
	}

	/// Read options for `key`; sentinel keys are always disabled.
	pub fn read_options(&self, key: &CacheKey) -> ReadOptions {
		ReadOptions::fresh_for(self.stale_after(key.collection())).with_enabled(!key.is_sentinel())
	}
}
