pub mod client;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod models;
pub mod retry;
pub mod service;

pub use client::{BintrayClient, ClientSettings, PackageAction, StepOutcome};
pub use config::{ConfigLayer, PublishConfig};
pub use config_loader::{ConfigLoadOptions, ConfigLoader, ConfigValidationResult};
pub use error::*;
pub use models::*;
pub use retry::*;
pub use service::{
    HostingService, HttpHostingService, HttpMethod, PackageLookup, ServiceOperation,
    ServiceRequest, ServiceResponse,
};
