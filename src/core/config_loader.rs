//! Configuration file loader for bintray-publisher
//!
//! This module provides configuration loading, layering and validation.

use super::config::*;
use crate::core::error::PublishError;
use crate::security::{CredentialResolver, load_properties_file};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".bintray-publish.yaml";

/// Build properties file read from the project directory by default
pub const PROPERTIES_FILENAME: &str = "gradle.properties";

/// Environment variable pattern (${VAR_NAME})
const ENV_VAR_PATTERN: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Deepest `extends` chain followed before giving up
const MAX_EXTENDS_DEPTH: usize = 8;

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Project path to load config from
    pub project_path: PathBuf,

    /// Build properties file; defaults to `<project>/gradle.properties`
    pub properties_path: Option<PathBuf>,

    /// CLI arguments (highest priority)
    pub cli_overrides: ConfigLayer,

    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field name (e.g., "apiKey")
    pub field: String,

    pub message: String,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    pub field: String,

    pub message: String,

    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Credentials (environment, then build properties)
    /// 3. Project config (./.bintray-publish.yaml)
    /// 4. Global config (~/.bintray-publish.yaml)
    /// 5. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<PublishConfig, PublishError> {
        let mut merged = ConfigLayer::default();

        if let Some(global) = Self::load_global_config(&options.env).await? {
            merged.merge(global);
        }

        if let Some(project) = Self::load_project_config(&options.project_path).await? {
            merged.merge(project);
        }

        // ${VAR} references only make sense in file contents
        Self::expand_env_vars(&mut merged, &options.env)?;

        let properties_path = options
            .properties_path
            .clone()
            .unwrap_or_else(|| options.project_path.join(PROPERTIES_FILENAME));
        let properties = load_properties_file(&properties_path).await?;
        CredentialResolver::new(options.env, properties).apply(&mut merged);

        merged.merge(options.cli_overrides);

        Ok(PublishConfig::from_layer(merged))
    }

    /// Load global configuration from ~/.bintray-publish.yaml
    async fn load_global_config(
        env: &HashMap<String, String>,
    ) -> Result<Option<ConfigLayer>, PublishError> {
        let Some(home_dir) = env.get("HOME") else {
            tracing::debug!("HOME is not set, skipping global configuration");
            return Ok(None);
        };
        let global_config_path = PathBuf::from(home_dir).join(CONFIG_FILENAME);

        Self::load_config_file(&global_config_path, 0).await
    }

    /// Load project configuration from ./.bintray-publish.yaml
    async fn load_project_config(project_path: &Path) -> Result<Option<ConfigLayer>, PublishError> {
        let project_config_path = project_path.join(CONFIG_FILENAME);

        Self::load_config_file(&project_config_path, 0).await
    }

    /// Load configuration from YAML file
    fn load_config_file(
        file_path: &Path,
        depth: usize,
    ) -> std::pin::Pin<
        Box<
            dyn std::future::Future<Output = Result<Option<ConfigLayer>, PublishError>> + Send + '_,
        >,
    > {
        Box::pin(async move {
            if !file_path.exists() {
                return Ok(None);
            }
            if depth > MAX_EXTENDS_DEPTH {
                return Err(PublishError::InvalidConfiguration {
                    message: format!(
                        "extends chain deeper than {} at {}",
                        MAX_EXTENDS_DEPTH,
                        file_path.display()
                    ),
                });
            }

            let content = fs::read_to_string(file_path).await.map_err(|e| {
                PublishError::InvalidConfiguration {
                    message: format!("failed to read {}: {}", file_path.display(), e),
                }
            })?;

            let mut config: ConfigLayer = if content.trim().is_empty() {
                ConfigLayer::default()
            } else {
                serde_yaml::from_str(&content).map_err(|e| PublishError::InvalidConfiguration {
                    message: format!("failed to parse {}: {}", file_path.display(), e),
                })?
            };
            tracing::debug!(path = %file_path.display(), "loaded configuration file");

            // Handle extends if present
            if let Some(extends_path) = config.extends.take() {
                let base_path = file_path
                    .parent()
                    .ok_or_else(|| PublishError::InvalidConfiguration {
                        message: format!("invalid config file path {}", file_path.display()),
                    })?
                    .join(&extends_path);

                match Self::load_config_file(&base_path, depth + 1).await? {
                    Some(mut base) => {
                        base.merge(config);
                        return Ok(Some(base));
                    }
                    None => {
                        return Err(PublishError::InvalidConfiguration {
                            message: format!(
                                "{} extends missing file {}",
                                file_path.display(),
                                base_path.display()
                            ),
                        });
                    }
                }
            }

            Ok(Some(config))
        })
    }

    /// Expand ${VAR} references in every string value
    fn expand_env_vars(
        config: &mut ConfigLayer,
        env: &HashMap<String, String>,
    ) -> Result<(), PublishError> {
        let pattern = Regex::new(ENV_VAR_PATTERN).map_err(|e| PublishError::InvalidConfiguration {
            message: format!("invalid expansion pattern: {}", e),
        })?;

        config.map_strings(|value| Ok(Self::expand_string(&pattern, value, env)))
    }

    /// Expand environment variables in a single string
    ///
    /// Unknown variables are left in place and logged.
    fn expand_string(pattern: &Regex, input: &str, env: &HashMap<String, String>) -> String {
        pattern
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                match env.get(var_name) {
                    Some(value) => value.clone(),
                    None => {
                        tracing::warn!(variable = var_name, "environment variable not found");
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    /// Validate configuration
    ///
    /// `requires_version` is set when the steps to run publish, sign or sync
    /// a version.
    pub fn validate(config: &PublishConfig, requires_version: bool) -> ConfigValidationResult {
        let mut errors: Vec<ConfigValidationError> = config
            .missing_fields(requires_version)
            .into_iter()
            .map(|field| ConfigValidationError {
                field: field.to_string(),
                message: "required value is not set".to_string(),
            })
            .collect();
        let mut warnings = Vec::new();

        if requires_version
            && config.version.is_some()
            && let Err(e) = config.resolve_version()
        {
            errors.push(ConfigValidationError {
                field: "version".to_string(),
                message: e.to_string(),
            });
        }

        if config.user.is_some()
            && config.api_key.is_some()
            && let Err(e) = config.client_settings()
        {
            errors.push(ConfigValidationError {
                field: "apiUrl".to_string(),
                message: e.to_string(),
            });
        }

        if config.api_url.starts_with("http://") {
            warnings.push(ConfigValidationWarning {
                field: "apiUrl".to_string(),
                message: "credentials will be sent without TLS".to_string(),
                suggestion: Some("Use an https URL".to_string()),
            });
        }

        if config.sync_to_maven_central && config.sync_request().is_none() {
            warnings.push(ConfigValidationWarning {
                field: "syncToMavenCentral".to_string(),
                message: "Sonatype credentials are not set, sync will be skipped".to_string(),
                suggestion: Some(
                    "Set sonatypeUsername and sonatypePassword, or disable syncToMavenCentral"
                        .to_string(),
                ),
            });
        }

        if config.gpg_sign && config.gpg_passphrase.is_none() {
            warnings.push(ConfigValidationWarning {
                field: "gpgPassphrase".to_string(),
                message: "no passphrase set, signing relies on a key without one".to_string(),
                suggestion: None,
            });
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}
