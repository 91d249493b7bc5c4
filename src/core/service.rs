//! Hosting service interface
//!
//! Every remote operation is described by a [`ServiceOperation`] variant that
//! knows its HTTP method, path and JSON body. A [`HostingService`] executes the
//! resulting [`ServiceRequest`]; [`HttpHostingService`] is the reqwest-backed
//! implementation that adds authentication and logging.

use crate::core::client::ClientSettings;
use crate::core::error::{PublishError, TransportError};
use crate::core::models::{GpgSignRequest, MavenCentralSyncRequest, PackageRequest, PublishRequest};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::time::Instant;

/// HTTP verbs used by the hosting service API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
}

impl HttpMethod {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Patch => reqwest::Method::PATCH,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_reqwest().as_str())
    }
}

/// The remote operations the client can perform
#[derive(Debug, Clone, Copy)]
pub enum ServiceOperation<'a> {
    GetPackage {
        subject: &'a str,
        repo: &'a str,
        package: &'a str,
    },
    CreatePackage {
        subject: &'a str,
        repo: &'a str,
        request: &'a PackageRequest,
    },
    UpdatePackage {
        subject: &'a str,
        repo: &'a str,
        request: &'a PackageRequest,
    },
    PublishVersion {
        subject: &'a str,
        repo: &'a str,
        package: &'a str,
        version: &'a str,
        request: &'a PublishRequest,
    },
    SyncToMavenCentral {
        subject: &'a str,
        repo: &'a str,
        package: &'a str,
        version: &'a str,
        request: &'a MavenCentralSyncRequest,
    },
    GpgSignVersion {
        subject: &'a str,
        repo: &'a str,
        package: &'a str,
        version: &'a str,
        request: &'a GpgSignRequest,
    },
}

impl ServiceOperation<'_> {
    /// Human readable operation name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetPackage { .. } => "get package",
            Self::CreatePackage { .. } => "create package",
            Self::UpdatePackage { .. } => "update package",
            Self::PublishVersion { .. } => "publish version",
            Self::SyncToMavenCentral { .. } => "sync version to maven central",
            Self::GpgSignVersion { .. } => "gpg sign version",
        }
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            Self::GetPackage { .. } => HttpMethod::Get,
            Self::UpdatePackage { .. } => HttpMethod::Patch,
            Self::CreatePackage { .. }
            | Self::PublishVersion { .. }
            | Self::SyncToMavenCentral { .. }
            | Self::GpgSignVersion { .. } => HttpMethod::Post,
        }
    }

    /// Unencoded path segments, relative to the API base URL
    pub fn path_segments(&self) -> Vec<String> {
        let segments: Vec<&str> = match *self {
            Self::GetPackage {
                subject,
                repo,
                package,
            } => vec!["packages", subject, repo, package],
            Self::CreatePackage { subject, repo, .. } | Self::UpdatePackage { subject, repo, .. } => {
                vec!["packages", subject, repo]
            }
            Self::PublishVersion {
                subject,
                repo,
                package,
                version,
                ..
            } => vec!["content", subject, repo, package, version, "publish"],
            Self::SyncToMavenCentral {
                subject,
                repo,
                package,
                version,
                ..
            } => vec!["maven_central_sync", subject, repo, package, "versions", version],
            Self::GpgSignVersion {
                subject,
                repo,
                package,
                version,
                ..
            } => vec!["gpg", subject, repo, package, "versions", version],
        };
        segments.into_iter().map(str::to_string).collect()
    }

    pub fn body(&self) -> Result<Option<serde_json::Value>, serde_json::Error> {
        let body = match self {
            Self::GetPackage { .. } => return Ok(None),
            Self::CreatePackage { request, .. } | Self::UpdatePackage { request, .. } => {
                serde_json::to_value(request)?
            }
            Self::PublishVersion { request, .. } => serde_json::to_value(request)?,
            Self::SyncToMavenCentral { request, .. } => serde_json::to_value(request)?,
            Self::GpgSignVersion { request, .. } => serde_json::to_value(request)?,
        };
        Ok(Some(body))
    }

    pub fn to_request(&self) -> Result<ServiceRequest, PublishError> {
        Ok(ServiceRequest {
            operation: self.name(),
            method: self.method(),
            segments: self.path_segments(),
            body: self.body()?,
        })
    }
}

/// A fully described HTTP request, ready to send
#[derive(Clone, PartialEq)]
pub struct ServiceRequest {
    pub operation: &'static str,
    pub method: HttpMethod,
    pub segments: Vec<String>,
    pub body: Option<serde_json::Value>,
}

impl ServiceRequest {
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

// Bodies can carry sync passwords and GPG passphrases
impl fmt::Debug for ServiceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRequest")
            .field("operation", &self.operation)
            .field("method", &self.method)
            .field("path", &self.path())
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Status and raw body of an HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: String,
}

impl ServiceResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Outcome of looking up a package
///
/// A missing package is a normal answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageLookup {
    Found,
    NotFound,
    Error(ServiceResponse),
}

impl From<ServiceResponse> for PackageLookup {
    fn from(response: ServiceResponse) -> Self {
        if response.is_success() {
            Self::Found
        } else if response.is_not_found() {
            Self::NotFound
        } else {
            Self::Error(response)
        }
    }
}

/// Executes requests against the hosting service
///
/// Any HTTP status is returned as `Ok`; only transport failures are `Err`.
#[async_trait]
pub trait HostingService: Send + Sync {
    async fn execute(&self, request: &ServiceRequest) -> Result<ServiceResponse, TransportError>;
}

/// reqwest-backed [`HostingService`] with Basic authentication
pub struct HttpHostingService {
    http: Client,
    base_url: Url,
    user: String,
    api_key: SecretString,
}

impl HttpHostingService {
    pub fn new(settings: &ClientSettings) -> Result<Self, PublishError> {
        let http = Client::builder()
            .connect_timeout(settings.connection_timeout)
            .read_timeout(settings.read_timeout)
            .user_agent(concat!("bintray-publisher/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PublishError::Client {
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: settings.api_url.clone(),
            user: settings.user.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    /// Join the request's segments onto the base URL, percent-encoding each
    pub fn url_for(&self, request: &ServiceRequest) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(&request.segments);
        }
        url
    }
}

#[async_trait]
impl HostingService for HttpHostingService {
    async fn execute(&self, request: &ServiceRequest) -> Result<ServiceResponse, TransportError> {
        let url = self.url_for(request);
        let started = Instant::now();

        let mut builder = self
            .http
            .request(request.method.as_reqwest(), url)
            .basic_auth(&self.user, Some(self.api_key.expose_secret()))
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(
            method = %request.method,
            path = %request.path(),
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "hosting service call"
        );

        Ok(ServiceResponse { status, body })
    }
}
