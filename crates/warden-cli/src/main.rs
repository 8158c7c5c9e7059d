// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `warden` - command-line front end for the access-control engine.

mod cli;
mod commands;
mod version;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use sqlx::SqlitePool;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden_config::{EngineConfig, LogFormat, LoggingConfig};
use warden_engine::{AccessEngine, RetryConfig};

use crate::cli::{Args, Command};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	let args = Args::parse();

	if let Command::Version = args.command {
		println!("{}", version::format_version_info());
		return Ok(ExitCode::SUCCESS);
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => warden_config::load_config_with_file(path),
		None => warden_config::load_config(),
	}
	.context("failed to load configuration")?;

	init_logging(&config.logging);

	tracing::debug!(database_url = %config.database.url, "opening database");
	let pool = warden_db::create_pool(&config.database.url, config.database.max_connections)
		.await
		.context("failed to open database")?;
	warden_db::run_migrations(&pool)
		.await
		.context("failed to run migrations")?;

	if let Command::Migrate = args.command {
		tracing::info!("migrations applied");
		pool.close().await;
		return Ok(ExitCode::SUCCESS);
	}

	execute(pool, &config.engine, args.command).await
}

/// Drive one command and close the pool before returning, whatever the
/// outcome.
async fn execute(pool: SqlitePool, config: &EngineConfig, command: Command) -> anyhow::Result<ExitCode> {
	let engine = AccessEngine::new(pool, retry_config(config));
	let outcome = commands::run(&engine, command).await;
	engine.pool().close().await;
	outcome
}

/// Logs go to stderr; stdout carries command output only.
fn init_logging(config: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
	let registry = tracing_subscriber::registry().with(filter);

	match config.format {
		LogFormat::Json => registry
			.with(fmt::layer().json().with_writer(std::io::stderr))
			.init(),
		LogFormat::Pretty => registry
			.with(fmt::layer().with_writer(std::io::stderr))
			.init(),
	}
}

fn retry_config(engine: &EngineConfig) -> RetryConfig {
	RetryConfig {
		max_attempts: engine.max_attempts,
		base_delay: Duration::from_millis(engine.base_delay_ms),
		max_delay: Duration::from_millis(engine.max_delay_ms),
		..RetryConfig::default()
	}
}
