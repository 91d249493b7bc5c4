//! Package Publisher - workflow orchestrator for a single package version
//!
//! Runs the publishing steps in order:
//! 1. Package: create or update package metadata
//! 2. Version: publish the version
//! 3. Sign: GPG-sign the version (best-effort)
//! 4. Sync: sync the version to Maven Central (best-effort)
//!
//! Configuration is validated before any network activity. A failing
//! Package or Version step stops the run and the remaining steps are
//! recorded as skipped. Nothing is rolled back.

use crate::core::client::{BintrayClient, PackageAction, StepOutcome};
use crate::core::config::PublishConfig;
use crate::core::error::PublishError;
use crate::core::service::{HostingService, HttpHostingService};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Instant;

/// Publishing steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    Package,
    Version,
    Sign,
    Sync,
}

impl WorkflowStep {
    pub const ALL: [WorkflowStep; 4] = [Self::Package, Self::Version, Self::Sign, Self::Sync];

    pub fn requires_version(self) -> bool {
        !matches!(self, Self::Package)
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Package => "package",
            Self::Version => "version",
            Self::Sign => "sign",
            Self::Sync => "sync",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    Degraded,
    Skipped,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Succeeded => "succeeded",
            Self::Degraded => "degraded",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: WorkflowStep,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub message: Option<String>,
}

/// Publishing report returned after a workflow run
#[derive(Debug)]
pub struct PublishReport {
    /// `subject/repo/package[/version]`, when configuration allowed resolving it
    pub coordinates: Option<String>,
    pub steps: Vec<StepReport>,
    /// Set once the version step succeeded
    pub published_at: Option<DateTime<Utc>>,
    /// The error that stopped the run
    pub error: Option<PublishError>,
    pub duration_ms: u64,
}

impl PublishReport {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn status_of(&self, step: WorkflowStep) -> Option<StepStatus> {
        self.steps.iter().find(|r| r.step == step).map(|r| r.status)
    }

    /// One line per step, for terminal output
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .steps
            .iter()
            .map(|r| match &r.message {
                Some(message) => format!(
                    "  {:<8} {:<10} {:>6}ms  {}",
                    r.step.to_string(),
                    r.status.to_string(),
                    r.duration_ms,
                    message
                ),
                None => format!(
                    "  {:<8} {:<10} {:>6}ms",
                    r.step.to_string(),
                    r.status.to_string(),
                    r.duration_ms
                ),
            })
            .collect();

        if let Some(published_at) = self.published_at {
            lines.push(format!("  published at {}", published_at.to_rfc3339()));
        }
        lines
    }
}

/// Main package publisher orchestrator
pub struct PackagePublisher<S = HttpHostingService> {
    config: PublishConfig,
    client: BintrayClient<S>,
}

impl PackagePublisher<HttpHostingService> {
    /// Create a publisher for the full workflow
    pub fn new(config: PublishConfig) -> Result<Self, PublishError> {
        Self::for_steps(config, &WorkflowStep::ALL)
    }

    /// Create a publisher for the given steps
    ///
    /// The configuration is validated for those steps before the client is
    /// built, so every missing field is reported at once.
    pub fn for_steps(config: PublishConfig, steps: &[WorkflowStep]) -> Result<Self, PublishError> {
        config.validate(steps.iter().any(|s| s.requires_version()))?;
        let client = BintrayClient::new(config.client_settings()?)?;
        Ok(Self { config, client })
    }
}

impl<S: HostingService> PackagePublisher<S> {
    pub fn with_client(config: PublishConfig, client: BintrayClient<S>) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    pub fn client(&self) -> &BintrayClient<S> {
        &self.client
    }

    /// Run the full workflow, honouring `gpgSign` and `syncToMavenCentral`
    pub async fn publish(&self) -> PublishReport {
        self.execute(&WorkflowStep::ALL, true).await
    }

    /// Run the given steps, in the order given
    ///
    /// Explicitly requested steps ignore the `gpgSign` and
    /// `syncToMavenCentral` toggles.
    pub async fn run(&self, steps: &[WorkflowStep]) -> PublishReport {
        self.execute(steps, false).await
    }

    async fn execute(&self, steps: &[WorkflowStep], honor_toggles: bool) -> PublishReport {
        let started = Instant::now();
        let requires_version = steps.iter().any(|s| s.requires_version());
        let mut report = PublishReport {
            coordinates: self
                .config
                .coordinates(requires_version)
                .ok()
                .map(|c| c.to_string()),
            steps: Vec::with_capacity(steps.len()),
            published_at: None,
            error: None,
            duration_ms: 0,
        };

        if let Err(error) = self.config.validate(requires_version) {
            tracing::error!("configuration is incomplete - {}", error);
            for step in steps {
                report.steps.push(skipped(*step, "configuration is incomplete"));
            }
            report.error = Some(error);
            report.duration_ms = elapsed_ms(started);
            return report;
        }

        for step in steps.iter().copied() {
            if report.error.is_some() {
                report.steps.push(skipped(step, "an earlier step failed"));
                continue;
            }

            if honor_toggles && let Some(reason) = self.disabled_reason(step) {
                tracing::info!(%step, "{}", reason);
                report.steps.push(skipped(step, reason));
                continue;
            }

            let step_started = Instant::now();
            let result = self.run_step(step).await;
            let duration_ms = elapsed_ms(step_started);

            let (status, message) = match result {
                Ok(StepResult::Done(message)) => (StepStatus::Succeeded, message),
                Ok(StepResult::Degraded(reason)) => (StepStatus::Degraded, Some(reason)),
                Ok(StepResult::Skipped(reason)) => (StepStatus::Skipped, Some(reason)),
                Err(error) => {
                    tracing::error!(%step, "step failed - {}", error);
                    let message = error.to_string();
                    report.error = Some(error);
                    (StepStatus::Failed, Some(message))
                }
            };

            if step == WorkflowStep::Version && status == StepStatus::Succeeded {
                report.published_at = Some(Utc::now());
            }
            tracing::info!(%step, %status, duration_ms, "step finished");
            report.steps.push(StepReport {
                step,
                status,
                duration_ms,
                message,
            });
        }

        report.duration_ms = elapsed_ms(started);
        report
    }

    fn disabled_reason(&self, step: WorkflowStep) -> Option<&'static str> {
        match step {
            WorkflowStep::Sign if !self.config.gpg_sign => Some("gpgSign is disabled"),
            WorkflowStep::Sync if !self.config.sync_to_maven_central => {
                Some("syncToMavenCentral is disabled")
            }
            _ => None,
        }
    }

    async fn run_step(&self, step: WorkflowStep) -> Result<StepResult, PublishError> {
        let coordinates = self.config.coordinates(step.requires_version())?;
        let subject = coordinates.subject.as_str();
        let repo = coordinates.repo.as_str();
        let pkg = coordinates.package.as_str();
        let version = coordinates.version.as_deref().unwrap_or_default();

        match step {
            WorkflowStep::Package => {
                let request = self.config.package_request()?;
                let action = self
                    .client
                    .create_or_update_package(subject, repo, pkg, &request)
                    .await?;
                let message = match action {
                    PackageAction::Created => "package created",
                    PackageAction::Updated => "package updated",
                };
                Ok(StepResult::Done(Some(message.to_string())))
            }
            WorkflowStep::Version => {
                self.client
                    .publish_version(subject, repo, pkg, version, &self.config.publish_request())
                    .await?;
                Ok(StepResult::Done(None))
            }
            WorkflowStep::Sign => {
                let outcome = self
                    .client
                    .gpg_sign_version(subject, repo, pkg, version, self.config.gpg_passphrase.as_ref())
                    .await;
                Ok(StepResult::from(outcome))
            }
            WorkflowStep::Sync => {
                let Some(request) = self.config.sync_request() else {
                    tracing::warn!(
                        %coordinates,
                        "sonatypeUsername and sonatypePassword are required to sync to maven central, skipping"
                    );
                    return Ok(StepResult::Skipped(
                        "Sonatype credentials are not set".to_string(),
                    ));
                };
                let outcome = self
                    .client
                    .sync_version_to_maven_central(subject, repo, pkg, version, &request)
                    .await;
                Ok(StepResult::from(outcome))
            }
        }
    }
}

enum StepResult {
    Done(Option<String>),
    Degraded(String),
    Skipped(String),
}

impl From<StepOutcome> for StepResult {
    fn from(outcome: StepOutcome) -> Self {
        match outcome {
            StepOutcome::Completed => Self::Done(None),
            StepOutcome::Degraded { reason } => Self::Degraded(reason),
        }
    }
}

fn skipped(step: WorkflowStep, reason: &str) -> StepReport {
    StepReport {
        step,
        status: StepStatus::Skipped,
        duration_ms: 0,
        message: Some(reason.to_string()),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::test_support::ScriptedService;
    use crate::core::retry::RetryConfig;
    use secrecy::SecretString;

    fn config() -> PublishConfig {
        let mut config = PublishConfig::default();
        config.user = Some("bob".to_string());
        config.api_key = Some(SecretString::new("key".into()));
        config.user_org = Some("acme".to_string());
        config.repo = Some("repo".to_string());
        config.pkg_name = Some("widget".to_string());
        config.version = Some("1.0.0".to_string());
        config.sonatype_username = Some("ossrh".to_string());
        config.sonatype_password = Some(SecretString::new("hunter2".into()));
        config
    }

    fn publisher(config: PublishConfig, service: ScriptedService) -> PackagePublisher<ScriptedService> {
        let client = BintrayClient::with_service(service, RetryConfig::new(1, 0));
        PackagePublisher::with_client(config, client)
    }

    fn statuses(report: &PublishReport) -> Vec<(WorkflowStep, StepStatus)> {
        report.steps.iter().map(|r| (r.step, r.status)).collect()
    }

    #[tokio::test]
    async fn test_full_workflow_order() {
        let publisher = publisher(config(), ScriptedService::new().respond("get package", 404, ""));

        let report = publisher.publish().await;

        assert!(report.success());
        assert!(report.published_at.is_some());
        assert_eq!(report.coordinates.as_deref(), Some("acme/repo/widget/1.0.0"));
        assert_eq!(
            publisher.client().service().trace(),
            vec![
                "GET /packages/acme/repo/widget",
                "POST /packages/acme/repo",
                "POST /content/acme/repo/widget/1.0.0/publish",
                "POST /gpg/acme/repo/widget/versions/1.0.0",
                "POST /maven_central_sync/acme/repo/widget/versions/1.0.0",
            ]
        );
        assert!(
            report
                .steps
                .iter()
                .all(|r| r.status == StepStatus::Succeeded)
        );
    }

    #[tokio::test]
    async fn test_sync_failure_does_not_fail_the_workflow() {
        let publisher = publisher(
            config(),
            ScriptedService::new().respond("sync version to maven central", 500, "staging failed"),
        );

        let report = publisher.publish().await;

        assert!(report.success());
        assert_eq!(report.status_of(WorkflowStep::Sync), Some(StepStatus::Degraded));
        assert_eq!(report.status_of(WorkflowStep::Version), Some(StepStatus::Succeeded));
    }

    #[tokio::test]
    async fn test_sign_failure_still_syncs() {
        let publisher = publisher(
            config(),
            ScriptedService::new().respond("gpg sign version", 400, "no signing key"),
        );

        let report = publisher.publish().await;

        assert!(report.success());
        assert_eq!(report.status_of(WorkflowStep::Sign), Some(StepStatus::Degraded));
        assert_eq!(report.status_of(WorkflowStep::Sync), Some(StepStatus::Succeeded));
    }

    #[tokio::test]
    async fn test_publish_conflict_stops_the_run() {
        let publisher = publisher(
            config(),
            ScriptedService::new().respond("publish version", 409, "version already published"),
        );

        let report = publisher.publish().await;

        assert!(!report.success());
        assert!(report.published_at.is_none());
        assert_eq!(
            statuses(&report),
            vec![
                (WorkflowStep::Package, StepStatus::Succeeded),
                (WorkflowStep::Version, StepStatus::Failed),
                (WorkflowStep::Sign, StepStatus::Skipped),
                (WorkflowStep::Sync, StepStatus::Skipped),
            ]
        );
        let message = report.error.as_ref().unwrap().to_string();
        assert!(message.contains("409"));
        assert!(message.contains("version already published"));
        assert_eq!(publisher.client().service().count("gpg sign version"), 0);
    }

    #[tokio::test]
    async fn test_missing_configuration_makes_no_calls() {
        let mut config = config();
        config.api_key = None;
        config.version = None;
        let publisher = publisher(config, ScriptedService::new());

        let report = publisher.publish().await;

        match report.error {
            Some(PublishError::MissingConfiguration { ref fields }) => {
                assert_eq!(fields, &vec!["apiKey".to_string(), "version".to_string()]);
            }
            ref other => panic!("expected MissingConfiguration, got {:?}", other),
        }
        assert!(publisher.client().service().calls().is_empty());
        assert!(
            report
                .steps
                .iter()
                .all(|r| r.status == StepStatus::Skipped)
        );
    }

    #[test]
    fn test_constructor_reports_every_missing_field() {
        let mut config = config();
        config.api_key = None;
        config.version = None;

        match PackagePublisher::new(config).err() {
            Some(PublishError::MissingConfiguration { fields }) => {
                assert_eq!(fields, vec!["apiKey".to_string(), "version".to_string()]);
            }
            other => panic!("expected MissingConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_package_step_constructor_does_not_need_version() {
        let mut config = config();
        config.version = None;

        assert!(PackagePublisher::for_steps(config.clone(), &[WorkflowStep::Package]).is_ok());
        assert!(PackagePublisher::for_steps(config, &[WorkflowStep::Version]).is_err());
    }

    #[tokio::test]
    async fn test_toggles_skip_optional_steps() {
        let mut config = config();
        config.gpg_sign = false;
        config.sync_to_maven_central = false;
        let publisher = publisher(config, ScriptedService::new());

        let report = publisher.publish().await;

        assert!(report.success());
        assert_eq!(report.status_of(WorkflowStep::Sign), Some(StepStatus::Skipped));
        assert_eq!(report.status_of(WorkflowStep::Sync), Some(StepStatus::Skipped));
        assert_eq!(publisher.client().service().calls().len(), 3);
    }

    #[tokio::test]
    async fn test_sync_without_sonatype_credentials_is_skipped() {
        let mut config = config();
        config.sonatype_password = None;
        let publisher = publisher(config, ScriptedService::new());

        let report = publisher.publish().await;

        assert!(report.success());
        assert_eq!(report.status_of(WorkflowStep::Sync), Some(StepStatus::Skipped));
        assert_eq!(
            publisher
                .client()
                .service()
                .count("sync version to maven central"),
            0
        );
    }

    #[tokio::test]
    async fn test_package_step_alone_does_not_need_version() {
        let mut config = config();
        config.version = None;
        let publisher = publisher(config, ScriptedService::new());

        let report = publisher.run(&[WorkflowStep::Package]).await;

        assert!(report.success());
        assert_eq!(report.coordinates.as_deref(), Some("acme/repo/widget"));
        assert_eq!(
            publisher.client().service().trace(),
            vec!["GET /packages/acme/repo/widget", "PATCH /packages/acme/repo"]
        );
    }

    #[tokio::test]
    async fn test_explicit_step_ignores_toggle() {
        let mut config = config();
        config.gpg_sign = false;
        let publisher = publisher(config, ScriptedService::new());

        let report = publisher.run(&[WorkflowStep::Sign]).await;

        assert_eq!(report.status_of(WorkflowStep::Sign), Some(StepStatus::Succeeded));
        assert_eq!(publisher.client().service().count("gpg sign version"), 1);
    }

    #[tokio::test]
    async fn test_unspecified_version_is_rejected_before_any_call() {
        let mut config = config();
        config.version = Some("unspecified".to_string());
        let publisher = publisher(config, ScriptedService::new());

        let report = publisher.publish().await;

        assert_eq!(report.error.as_ref().map(|e| e.code()), Some("INVALID_CONFIGURATION"));
        assert!(publisher.client().service().calls().is_empty());
    }

    #[test]
    fn test_summary_lines() {
        let report = PublishReport {
            coordinates: Some("acme/repo/widget/1.0.0".to_string()),
            steps: vec![StepReport {
                step: WorkflowStep::Sync,
                status: StepStatus::Degraded,
                duration_ms: 12,
                message: Some("sonatype down".to_string()),
            }],
            published_at: None,
            error: None,
            duration_ms: 12,
        };

        let lines = report.summary_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("sync"));
        assert!(lines[0].contains("degraded"));
        assert!(lines[0].contains("sonatype down"));
    }
}
