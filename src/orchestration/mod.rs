//! Orchestration layer for package publishing
//!
//! This module runs the publishing workflow on top of the client.

pub mod package_publisher;

pub use package_publisher::{
    PackagePublisher, PublishReport, StepReport, StepStatus, WorkflowStep,
};
