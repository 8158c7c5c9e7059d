// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retry behaviour for transactions that lose a race.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
	pub max_attempts: u32,
	pub base_delay_ms: u64,
	pub max_delay_ms: u64,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			base_delay_ms: 10,
			max_delay_ms: 200,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EngineConfigLayer {
	#[serde(default)]
	pub max_attempts: Option<u32>,
	#[serde(default)]
	pub base_delay_ms: Option<u64>,
	#[serde(default)]
	pub max_delay_ms: Option<u64>,
}

impl EngineConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.max_attempts.is_some() {
			self.max_attempts = other.max_attempts;
		}
		if other.base_delay_ms.is_some() {
			self.base_delay_ms = other.base_delay_ms;
		}
		if other.max_delay_ms.is_some() {
			self.max_delay_ms = other.max_delay_ms;
		}
	}

	pub fn finalize(self) -> EngineConfig {
		let defaults = EngineConfig::default();
		EngineConfig {
			max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
			base_delay_ms: self.base_delay_ms.unwrap_or(defaults.base_delay_ms),
			max_delay_ms: self.max_delay_ms.unwrap_or(defaults.max_delay_ms),
		}
	}
}
