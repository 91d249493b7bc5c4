//! Request payloads sent to the hosting service
//!
//! Field names follow the hosting service's JSON API, so these structs keep
//! snake_case keys on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

fn default_true() -> bool {
    true
}

/// Package metadata used to create or update a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRequest {
    pub name: String,
    pub desc: String,
    pub labels: Vec<String>,
    pub licenses: Vec<String>,
    pub custom_licenses: Vec<String>,
    pub vcs_url: String,
    pub website_url: String,
    pub issue_tracker_url: String,
    #[serde(default = "default_true")]
    pub public_download_numbers: bool,
    #[serde(default = "default_true")]
    pub public_stats: bool,
}

impl PackageRequest {
    /// Create a request with both visibility flags enabled
    pub fn new(name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
            labels: Vec::new(),
            licenses: Vec::new(),
            custom_licenses: Vec::new(),
            vcs_url: String::new(),
            website_url: String::new(),
            issue_tracker_url: String::new(),
            public_download_numbers: true,
            public_stats: true,
        }
    }
}

/// Payload for publishing a version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Seconds the service waits before answering; 0 returns immediately
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_wait_for_secs: Option<u32>,
    #[serde(default)]
    pub discard: bool,
}

impl PublishRequest {
    pub fn wait_for(seconds: u32) -> Self {
        Self {
            publish_wait_for_secs: Some(seconds),
            discard: false,
        }
    }
}

/// Payload for syncing a published version to Maven Central
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct MavenCentralSyncRequest {
    pub username: String,
    pub password: String,
    /// "1" closes and releases the staging repository, "0" leaves it open
    pub close: String,
}

impl MavenCentralSyncRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            close: "1".to_string(),
        }
    }
}

impl fmt::Debug for MavenCentralSyncRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MavenCentralSyncRequest")
            .field("username", &self.username)
            .field("password", &"****")
            .field("close", &self.close)
            .finish()
    }
}

/// Payload for signing a version with the subject's stored GPG key
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct GpgSignRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
}

impl fmt::Debug for GpgSignRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpgSignRequest")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "****"))
            .finish()
    }
}

/// Address of a remote resource: subject/repo/package and optional version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinates {
    pub subject: String,
    pub repo: String,
    pub package: String,
    pub version: Option<String>,
}

impl Coordinates {
    pub fn package(
        subject: impl Into<String>,
        repo: impl Into<String>,
        package: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            repo: repo.into(),
            package: package.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.subject, self.repo, self.package)?;
        if let Some(version) = &self.version {
            write!(f, "/{}", version)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_request_wire_format() {
        let mut request = PackageRequest::new("widget", "A widget");
        request.labels = vec!["gradle".to_string(), "nebula".to_string()];
        request.licenses = vec!["Apache-2.0".to_string()];
        request.vcs_url = "https://github.com/acme/widget.git".to_string();

        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["name"], "widget");
        assert_eq!(json["desc"], "A widget");
        assert_eq!(json["labels"], serde_json::json!(["gradle", "nebula"]));
        assert_eq!(json["custom_licenses"], serde_json::json!([]));
        assert_eq!(json["vcs_url"], "https://github.com/acme/widget.git");
        assert_eq!(json["public_download_numbers"], true);
        assert_eq!(json["public_stats"], true);
    }

    #[test]
    fn test_package_request_visibility_defaults_when_absent() {
        let json = r#"{
            "name": "widget",
            "desc": "",
            "labels": [],
            "licenses": [],
            "custom_licenses": [],
            "vcs_url": "",
            "website_url": "",
            "issue_tracker_url": ""
        }"#;

        let request: PackageRequest = serde_json::from_str(json).unwrap();
        assert!(request.public_download_numbers);
        assert!(request.public_stats);
    }

    #[test]
    fn test_publish_request_omits_unset_wait() {
        let json = serde_json::to_string(&PublishRequest::default()).unwrap();
        assert_eq!(json, r#"{"discard":false}"#);

        let json = serde_json::to_string(&PublishRequest::wait_for(0)).unwrap();
        assert!(json.contains(r#""publish_wait_for_secs":0"#));
    }

    #[test]
    fn test_secret_payloads_mask_debug_output() {
        let sync = MavenCentralSyncRequest::new("sonatype", "hunter2");
        let sign = GpgSignRequest {
            passphrase: Some("s3cret".to_string()),
        };

        assert!(!format!("{:?}", sync).contains("hunter2"));
        assert!(!format!("{:?}", sign).contains("s3cret"));
        assert_eq!(sync.close, "1");
    }

    #[test]
    fn test_gpg_request_without_passphrase_is_empty_object() {
        let json = serde_json::to_string(&GpgSignRequest::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_coordinates_display() {
        let coordinates = Coordinates::package("acme", "repo", "widget");
        assert_eq!(coordinates.to_string(), "acme/repo/widget");
        assert_eq!(
            coordinates.with_version("1.2.0").to_string(),
            "acme/repo/widget/1.2.0"
        );
    }
}
