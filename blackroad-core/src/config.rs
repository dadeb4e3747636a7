//! Configuration types

use crate::{ConfigError, PlatformError, PlatformResult};
use serde::{Deserialize, Serialize};

/// Tunables shared by the three services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PlatformConfig {
    /// Minimum confidence both claims of an opposing pair need to count as a contradiction
    pub contradiction_threshold: f64,
    /// Vote weight of one live memory entry during evaluation
    pub memory_evidence_weight: f64,
    pub default_search_limit: usize,
    pub default_list_limit: usize,
    pub default_subscribe_limit: usize,
    /// Upper bound applied to every caller-supplied limit
    pub max_page_size: usize,
    pub default_task_priority: i32,
    pub max_topic_length: usize,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            contradiction_threshold: 0.5,
            memory_evidence_weight: 0.5,
            default_search_limit: 20,
            default_list_limit: 50,
            default_subscribe_limit: 100,
            max_page_size: 1000,
            default_task_priority: 5,
            max_topic_length: 256,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> PlatformError {
    PlatformError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

impl PlatformConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `BLACKROAD_CONTRADICTION_THRESHOLD` (default: 0.5)
    /// - `BLACKROAD_MEMORY_EVIDENCE_WEIGHT` (default: 0.5)
    /// - `BLACKROAD_DEFAULT_SEARCH_LIMIT` (default: 20)
    /// - `BLACKROAD_DEFAULT_LIST_LIMIT` (default: 50)
    /// - `BLACKROAD_DEFAULT_SUBSCRIBE_LIMIT` (default: 100)
    /// - `BLACKROAD_MAX_PAGE_SIZE` (default: 1000)
    /// - `BLACKROAD_DEFAULT_TASK_PRIORITY` (default: 5)
    /// - `BLACKROAD_MAX_TOPIC_LENGTH` (default: 256)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            contradiction_threshold: env_or(
                "BLACKROAD_CONTRADICTION_THRESHOLD",
                defaults.contradiction_threshold,
            ),
            memory_evidence_weight: env_or(
                "BLACKROAD_MEMORY_EVIDENCE_WEIGHT",
                defaults.memory_evidence_weight,
            ),
            default_search_limit: env_or(
                "BLACKROAD_DEFAULT_SEARCH_LIMIT",
                defaults.default_search_limit,
            ),
            default_list_limit: env_or("BLACKROAD_DEFAULT_LIST_LIMIT", defaults.default_list_limit),
            default_subscribe_limit: env_or(
                "BLACKROAD_DEFAULT_SUBSCRIBE_LIMIT",
                defaults.default_subscribe_limit,
            ),
            max_page_size: env_or("BLACKROAD_MAX_PAGE_SIZE", defaults.max_page_size),
            default_task_priority: env_or(
                "BLACKROAD_DEFAULT_TASK_PRIORITY",
                defaults.default_task_priority,
            ),
            max_topic_length: env_or("BLACKROAD_MAX_TOPIC_LENGTH", defaults.max_topic_length),
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - contradiction_threshold and memory_evidence_weight in [0.0, 1.0]
    /// - every default limit > 0 and <= max_page_size
    /// - max_topic_length > 0
    pub fn validate(&self) -> PlatformResult<()> {
        if !(0.0..=1.0).contains(&self.contradiction_threshold) {
            return Err(invalid(
                "contradiction_threshold",
                self.contradiction_threshold,
                "contradiction_threshold must be between 0.0 and 1.0",
            ));
        }

        if !(0.0..=1.0).contains(&self.memory_evidence_weight) {
            return Err(invalid(
                "memory_evidence_weight",
                self.memory_evidence_weight,
                "memory_evidence_weight must be between 0.0 and 1.0",
            ));
        }

        for (field, value) in [
            ("default_search_limit", self.default_search_limit),
            ("default_list_limit", self.default_list_limit),
            ("default_subscribe_limit", self.default_subscribe_limit),
        ] {
            if value == 0 {
                return Err(invalid(field, value, "limit must be greater than 0"));
            }
            if value > self.max_page_size {
                return Err(invalid(field, value, "limit must not exceed max_page_size"));
            }
        }

        if self.max_topic_length == 0 {
            return Err(invalid(
                "max_topic_length",
                self.max_topic_length,
                "max_topic_length must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Apply a caller-supplied limit: default when absent, clamped to `max_page_size`.
    pub fn page_limit(&self, requested: Option<usize>, default: usize) -> usize {
        requested.unwrap_or(default).min(self.max_page_size)
    }
}
