// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for Warden.
//!
//! Sources are merged in precedence order:
//! 1. Environment variables (`WARDEN_*`)
//! 2. Config file (`/etc/warden/warden.toml` or `--config`)
//! 3. Built-in defaults

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::WardenConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WardenConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub engine: EngineConfig,
}

/// Load configuration from defaults, the system config file and the
/// environment.
pub fn load_config() -> Result<WardenConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<WardenConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<WardenConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = WardenConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Resolve a merged layer into a validated configuration.
pub fn finalize(layer: WardenConfigLayer) -> Result<WardenConfig, ConfigError> {
	let config = WardenConfig {
		database: layer.database.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
		engine: layer.engine.unwrap_or_default().finalize(),
	};

	validate(&config)?;

	info!(
		database = %config.database.url,
		max_connections = config.database.max_connections,
		log_level = %config.logging.level,
		log_format = %config.logging.format,
		max_attempts = config.engine.max_attempts,
		"configuration loaded"
	);

	Ok(config)
}

fn validate(config: &WardenConfig) -> Result<(), ConfigError> {
	if config.database.max_connections == 0 {
		return Err(ConfigError::Validation(
			"database.max_connections must be at least 1".to_string(),
		));
	}
	if config.engine.max_attempts == 0 {
		return Err(ConfigError::Validation(
			"engine.max_attempts must be at least 1".to_string(),
		));
	}
	if config.engine.base_delay_ms > config.engine.max_delay_ms {
		return Err(ConfigError::Validation(format!(
			"engine.base_delay_ms ({}) must not exceed engine.max_delay_ms ({})",
			config.engine.base_delay_ms, config.engine.max_delay_ms
		)));
	}
	Ok(())
}
