//! Configuration structures for bintray-publisher
//!
//! [`ConfigLayer`] is one partial source of settings (a YAML file, resolved
//! credentials, CLI flags). Layers are merged by the loader and resolved once
//! into an immutable [`PublishConfig`] that carries every default.

use crate::core::client::ClientSettings;
use crate::core::error::PublishError;
use crate::core::models::{Coordinates, MavenCentralSyncRequest, PackageRequest, PublishRequest};
use crate::core::retry::RetryConfig;
use crate::security::mask_token;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.bintray.com";
pub const DEFAULT_LICENSE: &str = "Apache-2.0";
pub const DEFAULT_CONNECTION_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_READ_TIMEOUT_SECONDS: u64 = 900;

/// Version placeholder build tools use when no version was set
const UNSPECIFIED_VERSION: &str = "unspecified";

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.map(|v| SecretString::new(v.into())))
}

/// One partial source of configuration
///
/// Every field is optional; unset fields fall through to lower layers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigLayer {
    /// Base file to inherit from, relative to this file
    pub extends: Option<String>,

    pub api_url: Option<String>,
    pub user: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    pub user_org: Option<String>,
    pub repo: Option<String>,
    pub pkg_name: Option<String>,
    pub version: Option<String>,

    // Package metadata
    pub description: Option<String>,
    pub licenses: Option<Vec<String>>,
    pub custom_licenses: Option<Vec<String>>,
    pub labels: Option<Vec<String>>,
    pub website_url: Option<String>,
    pub issue_tracker_url: Option<String>,
    pub vcs_url: Option<String>,

    // Execution limits
    pub max_retries: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
    pub connection_timeout_seconds: Option<u64>,
    pub read_timeout_seconds: Option<u64>,
    pub publish_wait_for_secs: Option<u32>,

    // Maven Central sync
    pub sync_to_maven_central: Option<bool>,
    pub sonatype_username: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub sonatype_password: Option<SecretString>,

    // Signing
    pub gpg_sign: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub gpg_passphrase: Option<SecretString>,
}

macro_rules! overlay_fields {
    ($target:ident, $source:ident, $($field:ident),+ $(,)?) => {
        $(
            if $source.$field.is_some() {
                $target.$field = $source.$field;
            }
        )+
    };
}

impl ConfigLayer {
    /// Overlay `other` on top of `self`; set fields in `other` win
    pub fn merge(&mut self, other: ConfigLayer) {
        overlay_fields!(
            self,
            other,
            extends,
            api_url,
            user,
            api_key,
            user_org,
            repo,
            pkg_name,
            version,
            description,
            licenses,
            custom_licenses,
            labels,
            website_url,
            issue_tracker_url,
            vcs_url,
            max_retries,
            retry_delay_seconds,
            connection_timeout_seconds,
            read_timeout_seconds,
            publish_wait_for_secs,
            sync_to_maven_central,
            sonatype_username,
            sonatype_password,
            gpg_sign,
            gpg_passphrase,
        );
    }

    /// Apply `f` to every plain string value
    pub fn map_strings<F>(&mut self, mut f: F) -> Result<(), PublishError>
    where
        F: FnMut(&str) -> Result<String, PublishError>,
    {
        for value in [
            &mut self.api_url,
            &mut self.user,
            &mut self.user_org,
            &mut self.repo,
            &mut self.pkg_name,
            &mut self.version,
            &mut self.description,
            &mut self.website_url,
            &mut self.issue_tracker_url,
            &mut self.vcs_url,
            &mut self.sonatype_username,
        ]
        .into_iter()
        .flatten()
        {
            *value = f(value)?;
        }

        for list in [
            &mut self.licenses,
            &mut self.custom_licenses,
            &mut self.labels,
        ]
        .into_iter()
        .flatten()
        {
            for value in list.iter_mut() {
                *value = f(value)?;
            }
        }

        for secret in [
            &mut self.api_key,
            &mut self.sonatype_password,
            &mut self.gpg_passphrase,
        ]
        .into_iter()
        .flatten()
        {
            let mapped = f(secret.expose_secret())?;
            *secret = SecretString::new(mapped.into());
        }

        Ok(())
    }
}

/// Fully resolved, immutable configuration
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub api_url: String,
    pub user: Option<String>,
    pub api_key: Option<SecretString>,
    pub user_org: Option<String>,
    pub repo: Option<String>,
    pub pkg_name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub licenses: Vec<String>,
    pub custom_licenses: Vec<String>,
    pub labels: Vec<String>,
    pub website_url: Option<String>,
    pub issue_tracker_url: Option<String>,
    pub vcs_url: Option<String>,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub connection_timeout_seconds: u64,
    pub read_timeout_seconds: u64,
    pub publish_wait_for_secs: Option<u32>,
    pub sync_to_maven_central: bool,
    pub sonatype_username: Option<String>,
    pub sonatype_password: Option<SecretString>,
    pub gpg_sign: bool,
    pub gpg_passphrase: Option<SecretString>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self::from_layer(ConfigLayer::default())
    }
}

/// Empty strings count as unset
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn present_secret(value: Option<SecretString>) -> Option<SecretString> {
    value.filter(|v| !v.expose_secret().trim().is_empty())
}

impl PublishConfig {
    /// Resolve a merged layer, filling in defaults
    pub fn from_layer(layer: ConfigLayer) -> Self {
        let defaults = RetryConfig::default();

        Self {
            api_url: present(layer.api_url).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            user: present(layer.user),
            api_key: present_secret(layer.api_key),
            user_org: present(layer.user_org),
            repo: present(layer.repo),
            pkg_name: present(layer.pkg_name),
            version: present(layer.version),
            description: present(layer.description),
            licenses: layer
                .licenses
                .unwrap_or_else(|| vec![DEFAULT_LICENSE.to_string()]),
            custom_licenses: layer.custom_licenses.unwrap_or_default(),
            labels: layer.labels.unwrap_or_default(),
            website_url: present(layer.website_url),
            issue_tracker_url: present(layer.issue_tracker_url),
            vcs_url: present(layer.vcs_url),
            max_retries: layer.max_retries.unwrap_or(defaults.max_retries),
            retry_delay_seconds: layer
                .retry_delay_seconds
                .unwrap_or(defaults.retry_delay_seconds),
            connection_timeout_seconds: layer
                .connection_timeout_seconds
                .unwrap_or(DEFAULT_CONNECTION_TIMEOUT_SECONDS),
            read_timeout_seconds: layer
                .read_timeout_seconds
                .unwrap_or(DEFAULT_READ_TIMEOUT_SECONDS),
            publish_wait_for_secs: layer.publish_wait_for_secs,
            sync_to_maven_central: layer.sync_to_maven_central.unwrap_or(true),
            sonatype_username: present(layer.sonatype_username),
            sonatype_password: present_secret(layer.sonatype_password),
            gpg_sign: layer.gpg_sign.unwrap_or(true),
            gpg_passphrase: present_secret(layer.gpg_passphrase),
        }
    }

    /// The account packages are published under: `userOrg`, else `user`
    pub fn resolve_subject(&self) -> Result<&str, PublishError> {
        self.user_org
            .as_deref()
            .or(self.user.as_deref())
            .ok_or_else(|| PublishError::missing(["userOrg or user"]))
    }

    /// The version to publish; the build tool placeholder is rejected
    pub fn resolve_version(&self) -> Result<&str, PublishError> {
        match self.version.as_deref() {
            None => Err(PublishError::missing(["version"])),
            Some(UNSPECIFIED_VERSION) => Err(PublishError::InvalidConfiguration {
                message: "version is 'unspecified'; set an explicit version".to_string(),
            }),
            Some(version) => Ok(version),
        }
    }

    /// Names of required fields that are unset
    ///
    /// Package steps need credentials, a repo and a package name. The subject
    /// falls back to `user`, so a missing `user` covers it. Version steps
    /// additionally need a version.
    pub fn missing_fields(&self, requires_version: bool) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.user.is_none() {
            missing.push("user");
        }
        if self.api_key.is_none() {
            missing.push("apiKey");
        }
        if self.repo.is_none() {
            missing.push("repo");
        }
        if self.pkg_name.is_none() {
            missing.push("pkgName");
        }
        if requires_version && self.version.is_none() {
            missing.push("version");
        }
        missing
    }

    /// Check everything needed before any network activity
    pub fn validate(&self, requires_version: bool) -> Result<(), PublishError> {
        let missing = self.missing_fields(requires_version);
        if !missing.is_empty() {
            return Err(PublishError::missing(missing));
        }
        if requires_version {
            self.resolve_version()?;
        }
        self.client_settings()?;
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_retries, self.retry_delay_seconds)
    }

    pub fn client_settings(&self) -> Result<ClientSettings, PublishError> {
        let settings = ClientSettings::new(
            Some(self.api_url.as_str()),
            self.user.as_deref(),
            self.api_key.clone(),
        )?;

        Ok(settings.with_retry(self.retry_config()).with_timeouts(
            Duration::from_secs(self.connection_timeout_seconds),
            Duration::from_secs(self.read_timeout_seconds),
        ))
    }

    /// Package coordinates, with the version when `with_version` is set
    pub fn coordinates(&self, with_version: bool) -> Result<Coordinates, PublishError> {
        let missing = self.missing_fields(with_version);
        let missing: Vec<_> = missing
            .into_iter()
            .filter(|field| !matches!(*field, "user" | "apiKey"))
            .collect();
        if !missing.is_empty() {
            return Err(PublishError::missing(missing));
        }

        let subject = self.resolve_subject()?;
        let repo = self.repo.as_deref().unwrap_or_default();
        let pkg_name = self.pkg_name.as_deref().unwrap_or_default();
        let coordinates = Coordinates::package(subject, repo, pkg_name);

        if with_version {
            Ok(coordinates.with_version(self.resolve_version()?))
        } else {
            Ok(coordinates)
        }
    }

    /// Package metadata; the description defaults to the package name
    pub fn package_request(&self) -> Result<PackageRequest, PublishError> {
        let name = self
            .pkg_name
            .as_deref()
            .ok_or_else(|| PublishError::missing(["pkgName"]))?;
        let desc = self.description.as_deref().unwrap_or(name);

        let mut request = PackageRequest::new(name, desc);
        request.labels = self.labels.clone();
        request.licenses = self.licenses.clone();
        request.custom_licenses = self.custom_licenses.clone();
        request.vcs_url = self.vcs_url.clone().unwrap_or_default();
        request.website_url = self.website_url.clone().unwrap_or_default();
        request.issue_tracker_url = self.issue_tracker_url.clone().unwrap_or_default();
        Ok(request)
    }

    pub fn publish_request(&self) -> PublishRequest {
        match self.publish_wait_for_secs {
            Some(seconds) => PublishRequest::wait_for(seconds),
            None => PublishRequest::default(),
        }
    }

    /// Sync payload, when both Sonatype credentials are present
    pub fn sync_request(&self) -> Option<MavenCentralSyncRequest> {
        let username = self.sonatype_username.as_deref()?;
        let password = self.sonatype_password.as_ref()?;
        Some(MavenCentralSyncRequest::new(
            username,
            password.expose_secret(),
        ))
    }

    /// Key/value view for display, with secrets masked
    pub fn masked_summary(&self) -> Vec<(&'static str, String)> {
        fn text(value: &Option<String>) -> String {
            value.clone().unwrap_or_else(|| "(unset)".to_string())
        }
        fn secret(value: &Option<SecretString>) -> String {
            value
                .as_ref()
                .map(|s| mask_token(s.expose_secret()))
                .unwrap_or_else(|| "(unset)".to_string())
        }

        vec![
            ("apiUrl", self.api_url.clone()),
            ("user", text(&self.user)),
            ("apiKey", secret(&self.api_key)),
            ("userOrg", text(&self.user_org)),
            ("repo", text(&self.repo)),
            ("pkgName", text(&self.pkg_name)),
            ("version", text(&self.version)),
            ("licenses", self.licenses.join(", ")),
            ("labels", self.labels.join(", ")),
            ("maxRetries", self.max_retries.to_string()),
            ("retryDelaySeconds", self.retry_delay_seconds.to_string()),
            ("syncToMavenCentral", self.sync_to_maven_central.to_string()),
            ("sonatypeUsername", text(&self.sonatype_username)),
            ("sonatypePassword", secret(&self.sonatype_password)),
            ("gpgSign", self.gpg_sign.to_string()),
            ("gpgPassphrase", secret(&self.gpg_passphrase)),
        ]
    }
}
