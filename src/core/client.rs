//! Retry-aware client for the hosting service
//!
//! [`BintrayClient`] exposes the high-level publishing operations. Every HTTP
//! call it makes goes through the same [`RetryPolicy`], so transport failures
//! are retried while HTTP error statuses are reported straight away.

use crate::core::error::PublishError;
use crate::core::models::{
    Coordinates, GpgSignRequest, MavenCentralSyncRequest, PackageRequest, PublishRequest,
};
use crate::core::retry::{RetryConfig, RetryPolicy};
use crate::core::service::{
    HostingService, HttpHostingService, PackageLookup, ServiceOperation, ServiceResponse,
};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Default connection timeout
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Default read timeout; publishing large versions can take minutes
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(900);

/// Endpoint, credentials and execution limits for a client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_url: Url,
    pub user: String,
    pub api_key: SecretString,
    pub retry: RetryConfig,
    pub connection_timeout: Duration,
    pub read_timeout: Duration,
}

impl ClientSettings {
    /// Validate the three required inputs together
    ///
    /// Every absent or blank input is named in the returned
    /// [`PublishError::MissingConfiguration`].
    pub fn new(
        api_url: Option<&str>,
        user: Option<&str>,
        api_key: Option<SecretString>,
    ) -> Result<Self, PublishError> {
        let api_url = api_url.map(str::trim).filter(|s| !s.is_empty());
        let user = user.map(str::trim).filter(|s| !s.is_empty());
        let api_key = api_key.filter(|k| !k.expose_secret().trim().is_empty());

        let (Some(api_url), Some(user), Some(api_key)) = (api_url, user, api_key.clone()) else {
            let mut missing = Vec::new();
            if api_url.is_none() {
                missing.push("apiUrl");
            }
            if user.is_none() {
                missing.push("user");
            }
            if api_key.is_none() {
                missing.push("apiKey");
            }
            return Err(PublishError::missing(missing));
        };

        let api_url = Url::parse(api_url).map_err(|e| PublishError::InvalidConfiguration {
            message: format!("apiUrl '{}' is not a valid URL: {}", api_url, e),
        })?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(PublishError::InvalidConfiguration {
                message: format!("apiUrl must use http or https, got '{}'", api_url.scheme()),
            });
        }

        Ok(Self {
            api_url,
            user: user.to_string(),
            api_key,
            retry: RetryConfig::default(),
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeouts(mut self, connection_timeout: Duration, read_timeout: Duration) -> Self {
        self.connection_timeout = connection_timeout;
        self.read_timeout = read_timeout;
        self
    }
}

/// What `create_or_update_package` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAction {
    Created,
    Updated,
}

/// Result of a best-effort step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    Degraded { reason: String },
}

impl StepOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Client for the hosting service's publishing API
///
/// # Examples
///
/// ```no_run
/// use bintray_publisher::core::{BintrayClient, ClientSettings, PackageRequest};
/// use secrecy::SecretString;
///
/// # async fn example() -> Result<(), bintray_publisher::core::PublishError> {
/// let settings = ClientSettings::new(
///     Some("https://api.bintray.com"),
///     Some("bob"),
///     Some(SecretString::from("api-key")),
/// )?;
/// let client = BintrayClient::new(settings)?;
///
/// let request = PackageRequest::new("widget", "A widget");
/// client.create_or_update_package("acme", "maven", "widget", &request).await?;
/// # Ok(())
/// # }
/// ```
pub struct BintrayClient<S = HttpHostingService> {
    service: S,
    retry: RetryPolicy,
}

impl BintrayClient<HttpHostingService> {
    pub fn new(settings: ClientSettings) -> Result<Self, PublishError> {
        let service = HttpHostingService::new(&settings)?;
        Ok(Self::with_service(service, settings.retry))
    }
}

impl<S: HostingService> BintrayClient<S> {
    /// Build a client over any [`HostingService`]
    pub fn with_service(service: S, retry: RetryConfig) -> Self {
        Self {
            service,
            retry: RetryPolicy::new(retry),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn retry_config(&self) -> &RetryConfig {
        self.retry.config()
    }

    async fn send(&self, operation: ServiceOperation<'_>) -> Result<ServiceResponse, PublishError> {
        let request = operation.to_request()?;
        self.retry
            .execute(request.operation, || self.service.execute(&request))
            .await
    }

    /// Look up a package; a 404 is [`PackageLookup::NotFound`], not an error
    pub async fn get_package(
        &self,
        subject: &str,
        repo: &str,
        pkg: &str,
    ) -> Result<PackageLookup, PublishError> {
        let response = self
            .send(ServiceOperation::GetPackage {
                subject,
                repo,
                package: pkg,
            })
            .await?;
        Ok(PackageLookup::from(response))
    }

    /// Create the package if it does not exist yet, otherwise update it
    pub async fn create_or_update_package(
        &self,
        subject: &str,
        repo: &str,
        pkg: &str,
        request: &PackageRequest,
    ) -> Result<PackageAction, PublishError> {
        let coordinates = Coordinates::package(subject, repo, pkg);

        let (operation, action) = match self.get_package(subject, repo, pkg).await? {
            PackageLookup::Found => (
                ServiceOperation::UpdatePackage {
                    subject,
                    repo,
                    request,
                },
                PackageAction::Updated,
            ),
            PackageLookup::NotFound => (
                ServiceOperation::CreatePackage {
                    subject,
                    repo,
                    request,
                },
                PackageAction::Created,
            ),
            PackageLookup::Error(response) => {
                return Err(rejection("get package", &coordinates, response));
            }
        };

        let response = self.send(operation).await?;
        if !response.is_success() {
            return Err(rejection(operation.name(), &coordinates, response));
        }

        tracing::debug!(%coordinates, ?action, "package metadata stored");
        Ok(action)
    }

    /// Publish a version so it becomes publicly available
    pub async fn publish_version(
        &self,
        subject: &str,
        repo: &str,
        pkg: &str,
        version: &str,
        request: &PublishRequest,
    ) -> Result<(), PublishError> {
        let operation = ServiceOperation::PublishVersion {
            subject,
            repo,
            package: pkg,
            version,
            request,
        };

        let response = self.send(operation).await?;
        if !response.is_success() {
            let coordinates = Coordinates::package(subject, repo, pkg).with_version(version);
            return Err(rejection(operation.name(), &coordinates, response));
        }
        Ok(())
    }

    /// Sync a published version to Maven Central
    ///
    /// Never fails: a rejection or exhausted retries is logged and reported
    /// as [`StepOutcome::Degraded`].
    pub async fn sync_version_to_maven_central(
        &self,
        subject: &str,
        repo: &str,
        pkg: &str,
        version: &str,
        request: &MavenCentralSyncRequest,
    ) -> StepOutcome {
        let coordinates = Coordinates::package(subject, repo, pkg).with_version(version);
        let operation = ServiceOperation::SyncToMavenCentral {
            subject,
            repo,
            package: pkg,
            version,
            request,
        };

        let reason = match self.send(operation).await {
            Ok(response) if response.is_success() => return StepOutcome::Completed,
            Ok(response) => rejection(operation.name(), &coordinates, response).to_string(),
            Err(error) => error.to_string(),
        };

        tracing::error!(%coordinates, "could not sync version to maven central - {}", reason);
        StepOutcome::Degraded { reason }
    }

    /// Sign a version with the subject's GPG key stored on the service
    ///
    /// Never fails: signing is optional, so any failure is logged as a
    /// warning and reported as [`StepOutcome::Degraded`]. Subject, repository
    /// and package are sent lower-cased; the version is sent as given.
    pub async fn gpg_sign_version(
        &self,
        subject: &str,
        repo: &str,
        pkg: &str,
        version: &str,
        passphrase: Option<&SecretString>,
    ) -> StepOutcome {
        let subject = subject.to_lowercase();
        let repo = repo.to_lowercase();
        let pkg = pkg.to_lowercase();
        let coordinates = Coordinates::package(&subject, &repo, &pkg).with_version(version);
        let request = GpgSignRequest {
            passphrase: passphrase
                .map(|p| p.expose_secret().to_string())
                .filter(|p| !p.is_empty()),
        };
        let operation = ServiceOperation::GpgSignVersion {
            subject: &subject,
            repo: &repo,
            package: &pkg,
            version,
            request: &request,
        };

        let reason = match self.send(operation).await {
            Ok(response) if response.is_success() => return StepOutcome::Completed,
            Ok(response) => rejection(operation.name(), &coordinates, response).to_string(),
            Err(error) => error.to_string(),
        };

        tracing::warn!(%coordinates, "could not sign version with GPG key - {}", reason);
        StepOutcome::Degraded { reason }
    }
}

fn rejection(operation: &str, coordinates: &Coordinates, response: ServiceResponse) -> PublishError {
    PublishError::RemoteRejection {
        operation: operation.to_string(),
        coordinates: coordinates.to_string(),
        status: response.status,
        body: response.body,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ScriptedService;
    use super::*;
    use httpmock::prelude::*;
    use httpmock::Method::PATCH;
    use serde_json::json;

    fn client(service: ScriptedService) -> BintrayClient<ScriptedService> {
        BintrayClient::with_service(service, RetryConfig::new(3, 0))
    }

    fn widget() -> PackageRequest {
        let mut request = PackageRequest::new("widget", "A widget");
        request.labels = vec!["gradle".to_string()];
        request.licenses = vec!["Apache-2.0".to_string()];
        request
    }

    #[test]
    fn test_settings_report_all_missing_fields() {
        let error = ClientSettings::new(None, Some("  "), None).unwrap_err();

        match error {
            PublishError::MissingConfiguration { fields } => {
                assert_eq!(fields, vec!["apiUrl", "user", "apiKey"]);
            }
            other => panic!("expected MissingConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_settings_reject_non_http_url() {
        let error = ClientSettings::new(
            Some("ftp://api.example.com"),
            Some("bob"),
            Some(SecretString::from("key")),
        )
        .unwrap_err();

        assert_eq!(error.code(), "INVALID_CONFIGURATION");
    }

    #[test]
    fn test_settings_defaults() {
        let settings = ClientSettings::new(
            Some("https://api.bintray.com"),
            Some("bob"),
            Some(SecretString::from("key")),
        )
        .unwrap();

        assert_eq!(settings.retry, RetryConfig::default());
        assert_eq!(settings.connection_timeout, Duration::from_secs(5));
        assert_eq!(settings.read_timeout, Duration::from_secs(900));
        assert!(!format!("{:?}", settings).contains("\"key\""));
    }

    #[tokio::test]
    async fn test_missing_package_is_created_and_never_updated() {
        let client = client(
            ScriptedService::new()
                .respond("get package", 404, "")
                .respond("create package", 201, "{}"),
        );

        let action = client
            .create_or_update_package("acme", "repo", "widget", &widget())
            .await
            .unwrap();

        assert_eq!(action, PackageAction::Created);
        assert_eq!(
            client.service().trace(),
            vec!["GET /packages/acme/repo/widget", "POST /packages/acme/repo"]
        );
        assert_eq!(client.service().count("update package"), 0);
    }

    #[tokio::test]
    async fn test_existing_package_is_updated_and_never_created() {
        let client = client(
            ScriptedService::new()
                .respond("get package", 200, r#"{"name":"widget"}"#)
                .respond("update package", 200, "{}"),
        );

        let action = client
            .create_or_update_package("acme", "repo", "widget", &widget())
            .await
            .unwrap();

        assert_eq!(action, PackageAction::Updated);
        assert_eq!(
            client.service().trace(),
            vec!["GET /packages/acme/repo/widget", "PATCH /packages/acme/repo"]
        );
        assert_eq!(client.service().count("create package"), 0);
    }

    #[tokio::test]
    async fn test_lookup_error_aborts_without_create_or_update() {
        let client = client(ScriptedService::new().respond("get package", 500, "internal error"));

        let error = client
            .create_or_update_package("acme", "repo", "widget", &widget())
            .await
            .unwrap_err();

        assert_eq!(error.status(), Some(500));
        assert!(error.to_string().contains("internal error"));
        assert_eq!(client.service().trace(), vec!["GET /packages/acme/repo/widget"]);
    }

    #[tokio::test]
    async fn test_create_failure_reports_create_response_body() {
        let client = client(
            ScriptedService::new()
                .respond("get package", 404, "package not found")
                .respond("create package", 400, "license is invalid"),
        );

        let error = client
            .create_or_update_package("acme", "repo", "widget", &widget())
            .await
            .unwrap_err();

        let message = error.to_string();
        assert!(message.contains("create package"));
        assert!(message.contains("license is invalid"));
        assert!(!message.contains("package not found"));
    }

    #[tokio::test]
    async fn test_transient_lookup_failure_is_not_mistaken_for_missing_package() {
        let client = client(
            ScriptedService::new()
                .fail("get package")
                .fail("get package")
                .respond("get package", 200, "{}")
                .respond("update package", 200, "{}"),
        );

        let action = client
            .create_or_update_package("acme", "repo", "widget", &widget())
            .await
            .unwrap();

        assert_eq!(action, PackageAction::Updated);
        assert_eq!(client.service().count("get package"), 3);
        assert_eq!(client.service().count("create package"), 0);
    }

    #[tokio::test]
    async fn test_transient_create_failure_is_retried_without_update() {
        let client = client(
            ScriptedService::new()
                .respond("get package", 404, "")
                .fail("create package")
                .respond("create package", 201, "{}"),
        );

        let action = client
            .create_or_update_package("acme", "repo", "widget", &widget())
            .await
            .unwrap();

        assert_eq!(action, PackageAction::Created);
        assert_eq!(client.service().count("get package"), 1);
        assert_eq!(client.service().count("create package"), 2);
        assert_eq!(client.service().count("update package"), 0);
    }

    #[tokio::test]
    async fn test_persistent_transport_failure_is_attempted_max_retries_plus_one_times() {
        let client = client(ScriptedService::new().fail("get package"));

        let error = client
            .create_or_update_package("acme", "repo", "widget", &widget())
            .await
            .unwrap_err();

        assert_eq!(error.code(), "RETRIES_EXHAUSTED");
        assert_eq!(client.service().count("get package"), 4);
        assert_eq!(client.service().count("create package"), 0);
    }

    #[tokio::test]
    async fn test_http_error_is_attempted_once() {
        let client = client(ScriptedService::new().respond("publish version", 500, "boom"));

        let result = client
            .publish_version("acme", "repo", "widget", "1.0.0", &PublishRequest::default())
            .await;

        assert!(result.is_err());
        assert_eq!(client.service().count("publish version"), 1);
    }

    #[tokio::test]
    async fn test_publish_version_conflict_reports_status_and_body() {
        let client = client(
            ScriptedService::new().respond("publish version", 409, r#"{"message":"already exists"}"#),
        );

        let error = client
            .publish_version("acme", "repo", "widget", "1.0.0", &PublishRequest::default())
            .await
            .unwrap_err();

        let message = error.to_string();
        assert!(message.contains("409"));
        assert!(message.contains("already exists"));
        assert!(message.contains("acme/repo/widget/1.0.0"));
    }

    #[tokio::test]
    async fn test_publishing_an_already_published_version_twice() {
        let client = client(ScriptedService::new().respond("publish version", 200, r#"{"files":0}"#));
        let request = PublishRequest::wait_for(0);

        let first = client
            .publish_version("acme", "repo", "widget", "1.0.0", &request)
            .await;
        let second = client
            .publish_version("acme", "repo", "widget", "1.0.0", &request)
            .await;

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(client.service().count("publish version"), 2);
    }

    #[tokio::test]
    async fn test_sync_rejection_is_degraded() {
        let client = client(ScriptedService::new().respond("sync version to maven central", 500, "sonatype down"));

        let outcome = client
            .sync_version_to_maven_central(
                "acme",
                "repo",
                "widget",
                "1.0.0",
                &MavenCentralSyncRequest::new("user", "pass"),
            )
            .await;

        match outcome {
            StepOutcome::Degraded { reason } => assert!(reason.contains("sonatype down")),
            StepOutcome::Completed => panic!("expected degraded sync"),
        }
    }

    #[tokio::test]
    async fn test_sync_transport_exhaustion_is_degraded() {
        let client = client(ScriptedService::new().fail("sync version to maven central"));

        let outcome = client
            .sync_version_to_maven_central(
                "acme",
                "repo",
                "widget",
                "1.0.0",
                &MavenCentralSyncRequest::new("user", "pass"),
            )
            .await;

        assert!(!outcome.is_completed());
        assert_eq!(client.service().count("sync version to maven central"), 4);
    }

    #[tokio::test]
    async fn test_gpg_sign_sends_passphrase_when_present() {
        let client = client(ScriptedService::new());
        let passphrase = SecretString::from("s3cret");

        let outcome = client
            .gpg_sign_version("acme", "repo", "widget", "1.0.0", Some(&passphrase))
            .await;

        assert_eq!(outcome, StepOutcome::Completed);
        let calls = client.service().calls();
        assert_eq!(calls[0].path(), "/gpg/acme/repo/widget/versions/1.0.0");
        assert_eq!(calls[0].body, Some(json!({ "passphrase": "s3cret" })));
    }

    #[tokio::test]
    async fn test_gpg_sign_without_passphrase_sends_empty_body() {
        let client = client(ScriptedService::new());
        let empty = SecretString::from("");

        client
            .gpg_sign_version("acme", "repo", "widget", "1.0.0", Some(&empty))
            .await;

        assert_eq!(client.service().calls()[0].body, Some(json!({})));
    }

    #[tokio::test]
    async fn test_gpg_sign_failure_is_degraded() {
        let client = client(ScriptedService::new().respond("gpg sign version", 400, "no key"));

        let outcome = client
            .gpg_sign_version("acme", "repo", "widget", "1.0.0", None)
            .await;

        assert!(matches!(outcome, StepOutcome::Degraded { ref reason } if reason.contains("no key")));
    }

    #[tokio::test]
    async fn test_gpg_sign_lowercases_coordinates_but_not_version() {
        let client = client(ScriptedService::new());

        client
            .gpg_sign_version("Acme", "Repo", "Widget", "1.0.0-RC1", None)
            .await;

        assert_eq!(
            client.service().trace(),
            vec!["POST /gpg/acme/repo/widget/versions/1.0.0-RC1"]
        );
    }

    fn http_client(base_url: &str) -> BintrayClient {
        let settings = ClientSettings::new(
            Some(base_url),
            Some("bob"),
            Some(SecretString::from("key")),
        )
        .unwrap()
        .with_retry(RetryConfig::new(2, 0));
        BintrayClient::new(settings).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_create_missing_package() {
        let server = MockServer::start_async().await;
        let lookup = server
            .mock_async(|when, then| {
                when.method(GET).path("/packages/acme/repo/widget");
                then.status(404).body(r#"{"message":"Package 'widget' was not found"}"#);
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/packages/acme/repo")
                    .header("authorization", "Basic Ym9iOmtleQ==")
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "name": "widget",
                        "desc": "A widget",
                        "labels": ["gradle"],
                        "licenses": ["Apache-2.0"],
                        "custom_licenses": [],
                        "vcs_url": "",
                        "website_url": "",
                        "issue_tracker_url": "",
                        "public_download_numbers": true,
                        "public_stats": true
                    }));
                then.status(201).body(r#"{"name":"widget"}"#);
            })
            .await;
        let update = server
            .mock_async(|when, then| {
                when.method(PATCH).path("/packages/acme/repo");
                then.status(200);
            })
            .await;

        let client = http_client(&server.base_url());
        let action = client
            .create_or_update_package("acme", "repo", "widget", &widget())
            .await
            .unwrap();

        assert_eq!(action, PackageAction::Created);
        lookup.assert_async().await;
        create.assert_async().await;
        update.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_end_to_end_publish_conflict() {
        let server = MockServer::start_async().await;
        let publish = server
            .mock_async(|when, then| {
                when.method(POST).path("/content/acme/repo/widget/1.0.0/publish");
                then.status(409).body("Version already published");
            })
            .await;

        let client = http_client(&server.base_url());
        let error = client
            .publish_version("acme", "repo", "widget", "1.0.0", &PublishRequest::default())
            .await
            .unwrap_err();

        publish.assert_hits_async(1).await;
        let message = error.to_string();
        assert!(message.contains("409"));
        assert!(message.contains("Version already published"));
    }

    #[tokio::test]
    async fn test_end_to_end_sync_failure_does_not_raise() {
        let server = MockServer::start_async().await;
        let sync = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/maven_central_sync/acme/repo/widget/versions/1.0.0")
                    .json_body(json!({ "username": "user", "password": "pass", "close": "1" }));
                then.status(500).body("staging failed");
            })
            .await;

        let client = http_client(&server.base_url());
        let outcome = client
            .sync_version_to_maven_central(
                "acme",
                "repo",
                "widget",
                "1.0.0",
                &MavenCentralSyncRequest::new("user", "pass"),
            )
            .await;

        sync.assert_hits_async(1).await;
        assert!(!outcome.is_completed());
    }
}
