//! Bintray Publisher CLI
//!
//! Publishes a package version to Bintray, signs it and syncs it to Maven Central

use anyhow::Result;
use bintray_publisher::{
    ConfigLayer, ConfigLoadOptions, ConfigLoader, PackagePublisher, PublishConfig, PublishError,
    PublishReport, WorkflowStep,
};
use clap::{Args, Parser, Subcommand};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Bintray package publishing assistant
#[derive(Parser)]
#[command(name = "bintray-publisher")]
#[command(version)]
#[command(about = "Publish, sign and sync package versions on Bintray", long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every subcommand; they take priority over all other sources
#[derive(Args)]
struct Overrides {
    /// Project directory holding .bintray-publish.yaml and gradle.properties
    #[arg(long, global = true, value_name = "DIR")]
    project_dir: Option<PathBuf>,

    /// Build properties file with credentials
    #[arg(long, global = true, value_name = "FILE")]
    properties: Option<PathBuf>,

    /// Version to publish
    #[arg(long = "pkg-version", global = true)]
    pkg_version: Option<String>,

    /// Repository name
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Package name
    #[arg(long, global = true)]
    pkg_name: Option<String>,

    /// Organization to publish under instead of the user
    #[arg(long, global = true)]
    user_org: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full workflow: package, version, sign, sync
    Publish,

    /// Create or update package metadata
    Package,

    /// Publish the version
    Version,

    /// GPG-sign the version
    Sign,

    /// Sync the version to Maven Central
    Sync,

    /// Load and validate configuration without contacting the service
    Check,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let result = run().await;

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = load_config(cli.overrides).await?;

    match cli.command {
        Commands::Check => Ok(check_command(&config)),
        Commands::Publish => match PackagePublisher::new(config) {
            Ok(publisher) => Ok(print_report(&publisher.publish().await)),
            Err(error) => Ok(print_error(&error)),
        },
        Commands::Package => run_steps(config, &[WorkflowStep::Package]).await,
        Commands::Version => run_steps(config, &[WorkflowStep::Version]).await,
        Commands::Sign => run_steps(config, &[WorkflowStep::Sign]).await,
        Commands::Sync => run_steps(config, &[WorkflowStep::Sync]).await,
    }
}

async fn load_config(overrides: Overrides) -> Result<PublishConfig> {
    let project_path = match overrides.project_dir {
        Some(dir) => dir,
        None => env::current_dir()?,
    };

    let cli_overrides = ConfigLayer {
        version: overrides.pkg_version,
        repo: overrides.repo,
        pkg_name: overrides.pkg_name,
        user_org: overrides.user_org,
        ..Default::default()
    };

    let options = ConfigLoadOptions {
        project_path,
        properties_path: overrides.properties,
        cli_overrides,
        env: env::vars().collect::<HashMap<_, _>>(),
    };

    Ok(ConfigLoader::load(options).await?)
}

async fn run_steps(config: PublishConfig, steps: &[WorkflowStep]) -> Result<i32> {
    match PackagePublisher::for_steps(config, steps) {
        Ok(publisher) => Ok(print_report(&publisher.run(steps).await)),
        Err(error) => Ok(print_error(&error)),
    }
}

fn check_command(config: &PublishConfig) -> i32 {
    println!("🔍 Resolved configuration\n");
    for (key, value) in config.masked_summary() {
        println!("  {:<20} {}", key, value);
    }
    println!();

    let result = ConfigLoader::validate(config, true);
    println!("{}", ConfigLoader::format_validation_result(&result));

    if result.valid { 0 } else { 1 }
}

fn print_report(report: &PublishReport) -> i32 {
    let target = report.coordinates.as_deref().unwrap_or("(unresolved)");

    if report.success() {
        println!("✅ {} ({}ms)", target, report.duration_ms);
    } else {
        println!("❌ {} ({}ms)", target, report.duration_ms);
    }
    for line in report.summary_lines() {
        println!("{}", line);
    }

    match &report.error {
        None => 0,
        Some(error) => print_error(error),
    }
}

fn print_error(error: &PublishError) -> i32 {
    eprintln!("\n❌ Error [{}]", error.code());
    eprintln!("{}", error);
    let actions = error.suggested_actions();
    if !actions.is_empty() {
        eprintln!("\n💡 Suggested actions:");
        for action in actions {
            eprintln!("  - {}", action);
        }
    }
    1
}
