pub mod core;
pub mod orchestration;
pub mod security;

pub use self::core::*;
pub use orchestration::{PackagePublisher, PublishReport, StepReport, StepStatus, WorkflowStep};
pub use security::{CredentialField, CredentialResolver, mask_token};
