//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::{Config, ProviderConfig};

/// Ceiling above which a warning is raised.
const LARGE_CEILING: usize = 64;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// First error as a [`ConfigError`], if any.
    pub fn into_error(self) -> Option<ConfigError> {
        self.errors.into_iter().next().map(|e| ConfigError::InvalidValue {
            field: e.path,
            message: e.message,
        })
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_runtime(config, &mut result);
        Self::validate_providers(config, &mut result);
        Self::validate_health(config, &mut result);

        result
    }

    fn validate_runtime(config: &Config, result: &mut ValidationResult) {
        let runtime = &config.runtime;

        if runtime.max_concurrent_agents == 0 {
            result.add_error(ValidationError::new(
                "runtime.max_concurrent_agents",
                "max_concurrent_agents must be greater than 0",
            ));
        } else if runtime.max_concurrent_agents > LARGE_CEILING {
            result.add_warning(ValidationWarning::new(
                "runtime.max_concurrent_agents",
                format!(
                    "max_concurrent_agents is very high (>{}), each agent may hold a process",
                    LARGE_CEILING
                ),
            ));
        }

        if runtime.default_timeout_seconds == 0 {
            result.add_error(ValidationError::new(
                "runtime.default_timeout_seconds",
                "default_timeout_seconds must be greater than 0",
            ));
        }

        if runtime.poll_interval_seconds == 0 {
            result.add_error(ValidationError::new(
                "runtime.poll_interval_seconds",
                "poll_interval_seconds must be greater than 0",
            ));
        } else if runtime.poll_interval_seconds > runtime.default_timeout_seconds {
            result.add_warning(ValidationWarning::new(
                "runtime.poll_interval_seconds",
                "poll_interval_seconds is longer than default_timeout_seconds",
            ));
        }

        if let Some(name) = &runtime.default_provider {
            if !config.providers.contains_key(name) {
                result.add_error(ValidationError::new(
                    "runtime.default_provider",
                    format!("Default provider '{}' is not defined", name),
                ));
            }
        }
    }

    fn validate_providers(config: &Config, result: &mut ValidationResult) {
        for (name, provider) in &config.providers {
            match provider {
                ProviderConfig::Subprocess(sub) => {
                    if sub.executable.trim().is_empty() {
                        result.add_error(ValidationError::new(
                            format!("providers.{}.executable", name),
                            "executable cannot be empty",
                        ));
                    }
                }
                ProviderConfig::Http(http) => {
                    if http.base_url.is_empty() {
                        result.add_error(ValidationError::new(
                            format!("providers.{}.base_url", name),
                            "base_url is required for http providers",
                        ));
                    } else if !http.base_url.starts_with("http://")
                        && !http.base_url.starts_with("https://")
                    {
                        result.add_error(ValidationError::new(
                            format!("providers.{}.base_url", name),
                            "base_url must start with http:// or https://",
                        ));
                    }

                    if http.api_key.is_none() {
                        result.add_warning(ValidationWarning::new(
                            format!("providers.{}.api_key", name),
                            "API key is not set, initialization will fail",
                        ));
                    }

                    if let Some(t) = http.temperature {
                        if !(0.0..=2.0).contains(&t) {
                            result.add_error(ValidationError::new(
                                format!("providers.{}.temperature", name),
                                "temperature must be between 0.0 and 2.0",
                            ));
                        }
                    }
                }
            }
        }
    }

    fn validate_health(config: &Config, result: &mut ValidationResult) {
        let health = &config.health;
        if !health.enabled {
            return;
        }

        if health.interval_seconds == 0 {
            result.add_error(ValidationError::new(
                "health.interval_seconds",
                "interval_seconds must be greater than 0",
            ));
        }

        if health.probe_timeout_seconds == 0 {
            result.add_error(ValidationError::new(
                "health.probe_timeout_seconds",
                "probe_timeout_seconds must be greater than 0",
            ));
        } else if health.probe_timeout_seconds >= health.interval_seconds {
            result.add_warning(ValidationWarning::new(
                "health.probe_timeout_seconds",
                "probe_timeout_seconds is not shorter than interval_seconds",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
