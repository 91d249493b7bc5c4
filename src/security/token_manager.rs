//! Credential resolution with memory-safe handling and masking
//!
//! Credentials are looked up per field, first hit wins: an environment
//! variable, then a dotted build property, then a camelCase build property.
//! Secret values are wrapped in `secrecy::SecretString` as soon as they are
//! read so they never reach logs unmasked.

use crate::core::config::ConfigLayer;
use crate::core::error::PublishError;
use secrecy::{ExposeSecret, SecretString};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use tokio::fs;

/// Credential-bearing configuration fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialField {
    User,
    ApiKey,
    SonatypeUsername,
    SonatypePassword,
    GpgPassphrase,
}

/// Lookup keys for one field: (field, env var, dotted property, camelCase property)
const CREDENTIAL_SOURCES: &[(CredentialField, &str, &str, &str)] = &[
    (CredentialField::User, "bintrayUser", "bintray.user", "bintrayUser"),
    (CredentialField::ApiKey, "bintrayKey", "bintray.apiKey", "bintrayKey"),
    (
        CredentialField::SonatypeUsername,
        "sonatypeUsername",
        "sonatype.username",
        "sonatypeUsername",
    ),
    (
        CredentialField::SonatypePassword,
        "sonatypePassword",
        "sonatype.password",
        "sonatypePassword",
    ),
    (
        CredentialField::GpgPassphrase,
        "gpgPassphrase",
        "bintray.version.gpgPassphrase",
        "gpgPassphrase",
    ),
];

impl CredentialField {
    pub const ALL: [CredentialField; 5] = [
        Self::User,
        Self::ApiKey,
        Self::SonatypeUsername,
        Self::SonatypePassword,
        Self::GpgPassphrase,
    ];

    /// Configuration key of this field
    pub fn key(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::ApiKey => "apiKey",
            Self::SonatypeUsername => "sonatypeUsername",
            Self::SonatypePassword => "sonatypePassword",
            Self::GpgPassphrase => "gpgPassphrase",
        }
    }

    fn sources(self) -> (&'static str, &'static str, &'static str) {
        CREDENTIAL_SOURCES
            .iter()
            .find(|(field, ..)| *field == self)
            .map(|(_, env, dotted, camel)| (*env, *dotted, *camel))
            .unwrap_or(("", "", ""))
    }
}

/// Where a resolved credential came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOrigin {
    Environment(&'static str),
    Property(&'static str),
}

impl fmt::Display for CredentialOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment(name) => write!(f, "environment variable {}", name),
            Self::Property(name) => write!(f, "build property {}", name),
        }
    }
}

/// A credential value and its origin
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    pub value: SecretString,
    pub origin: CredentialOrigin,
}

/// Resolves credentials from the environment and build properties
///
/// # Examples
///
/// ```
/// use bintray_publisher::security::{CredentialField, CredentialResolver};
/// use secrecy::ExposeSecret;
/// use std::collections::{BTreeMap, HashMap};
///
/// let env = HashMap::from([("bintrayUser".to_string(), "bob".to_string())]);
/// let properties = BTreeMap::from([("bintray.apiKey".to_string(), "key".to_string())]);
///
/// let resolver = CredentialResolver::new(env, properties);
/// let user = resolver.resolve(CredentialField::User).unwrap();
/// assert_eq!(user.value.expose_secret(), "bob");
/// ```
#[derive(Default)]
pub struct CredentialResolver {
    env: HashMap<String, String>,
    properties: BTreeMap<String, String>,
}

impl CredentialResolver {
    pub fn new(env: HashMap<String, String>, properties: BTreeMap<String, String>) -> Self {
        Self { env, properties }
    }

    /// Resolve a single field; blank values count as unset
    pub fn resolve(&self, field: CredentialField) -> Option<ResolvedCredential> {
        let (env_name, dotted, camel) = field.sources();

        let found = non_blank(self.env.get(env_name))
            .map(|v| (v, CredentialOrigin::Environment(env_name)))
            .or_else(|| {
                non_blank(self.properties.get(dotted))
                    .map(|v| (v, CredentialOrigin::Property(dotted)))
            })
            .or_else(|| {
                non_blank(self.properties.get(camel))
                    .map(|v| (v, CredentialOrigin::Property(camel)))
            });

        found.map(|(value, origin)| {
            tracing::debug!(field = field.key(), %origin, "credential resolved");
            ResolvedCredential {
                value: SecretString::new(value.into()),
                origin,
            }
        })
    }

    /// Overlay every resolved credential onto a configuration layer
    pub fn apply(&self, layer: &mut ConfigLayer) {
        for field in CredentialField::ALL {
            let Some(credential) = self.resolve(field) else {
                continue;
            };
            let plain = || credential.value.expose_secret().to_string();
            match field {
                CredentialField::User => layer.user = Some(plain()),
                CredentialField::ApiKey => layer.api_key = Some(credential.value.clone()),
                CredentialField::SonatypeUsername => layer.sonatype_username = Some(plain()),
                CredentialField::SonatypePassword => {
                    layer.sonatype_password = Some(credential.value.clone())
                }
                CredentialField::GpgPassphrase => {
                    layer.gpg_passphrase = Some(credential.value.clone())
                }
            }
        }
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Load a `gradle.properties`-style `key=value` file
///
/// Blank lines and lines starting with `#` or `!` are skipped. A missing file
/// yields an empty map.
pub async fn load_properties_file(
    path: &Path,
) -> Result<BTreeMap<String, String>, PublishError> {
    let mut map = BTreeMap::new();
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(map),
        Err(e) => {
            return Err(PublishError::InvalidConfiguration {
                message: format!("failed to read properties file {}: {}", path.display(), e),
            });
        }
    };

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Ok(map)
}

/// Masks a secret for display
///
/// Shows only the first 3 and last 3 characters. Values shorter than 10
/// characters are fully masked as "****".
///
/// ```
/// use bintray_publisher::security::mask_token;
///
/// assert_eq!(mask_token("abcdef123456"), "abc...456");
/// assert_eq!(mask_token("short"), "****");
/// ```
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 10 {
        return "****".to_string();
    }

    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 3..].iter().collect();
    format!("{}...{}", prefix, suffix)
}
