//! Configuration validation.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::Config;

static HOST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*\.)?[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)*$")
        .expect("host pattern regex is valid")
});

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
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_surfaces(config, &mut result);
        Self::validate_automation(config, &mut result);
        Self::validate_profiles(config, &mut result);
        Self::validate_navigation(config, &mut result);

        Ok(result)
    }

    /// Whether a string is a well-formed host pattern (`host` or `*.suffix`).
    pub fn is_host_pattern(pattern: &str) -> bool {
        HOST_PATTERN.is_match(pattern)
    }

    fn validate_surfaces(config: &Config, result: &mut ValidationResult) {
        if config.surfaces.crash_retry_limit == 0 {
            result.add_error(ValidationError::new(
                "surfaces.crash_retry_limit",
                "crash_retry_limit must be greater than 0",
            ));
        }

        if config.surfaces.crash_retry_limit > 10 {
            result.add_warning(ValidationWarning::new(
                "surfaces.crash_retry_limit",
                "crash_retry_limit is very high (>10), a crashing surface will reload for a long time",
            ));
        }

        if config.surfaces.default_platform.is_empty() {
            result.add_error(ValidationError::new(
                "surfaces.default_platform",
                "Default platform cannot be empty",
            ));
        }
    }

    fn validate_automation(config: &Config, result: &mut ValidationResult) {
        let automation = &config.automation;

        let polls = [
            ("automation.input_poll_ms", automation.input_poll_ms, automation.input_wait_ms),
            ("automation.submit_poll_ms", automation.submit_poll_ms, automation.submit_wait_text_ms),
        ];
        for (path, poll, wait) in polls {
            if poll == 0 {
                result.add_error(ValidationError::new(path, "Poll interval must be greater than 0"));
            } else if poll >= wait {
                result.add_error(ValidationError::new(
                    path,
                    format!("Poll interval ({}ms) must be shorter than its wait bound ({}ms)", poll, wait),
                ));
            }
        }

        if automation.submit_wait_image_ms < automation.submit_wait_text_ms {
            result.add_warning(ValidationWarning::new(
                "automation.submit_wait_image_ms",
                "Image submit wait is shorter than the text submit wait; uploads usually take longer",
            ));
        }

        if automation.clipboard_settle_ms == 0 {
            result.add_warning(ValidationWarning::new(
                "automation.clipboard_settle_ms",
                "A zero settle delay may paste before the clipboard write lands",
            ));
        }

        if automation.max_selector_len == 0 {
            result.add_error(ValidationError::new(
                "automation.max_selector_len",
                "max_selector_len must be greater than 0",
            ));
        }
    }

    fn validate_profiles(config: &Config, result: &mut ValidationResult) {
        if config.profiles.default_partition.trim().is_empty() {
            result.add_error(ValidationError::new(
                "profiles.default_partition",
                "Default partition cannot be empty",
            ));
        }

        if config.profiles.session_freshness_days == 0 {
            result.add_warning(ValidationWarning::new(
                "profiles.session_freshness_days",
                "Every profile switch will report an expired session",
            ));
        }
    }

    fn validate_navigation(config: &Config, result: &mut ValidationResult) {
        let lists = [
            ("navigation.companion_domains", &config.navigation.companion_domains),
            ("navigation.auth_domains", &config.navigation.auth_domains),
        ];
        for (path, patterns) in lists {
            for pattern in patterns {
                if !Self::is_host_pattern(pattern) {
                    result.add_error(ValidationError::new(
                        path,
                        format!("'{}' is not a host or *.suffix pattern", pattern),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
