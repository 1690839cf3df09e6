//! stackup-provision - Provisioning library for a containerised Laravel and Next.js stack.
//!
//! Three provisioners (environment, backend, frontend) each run an ordered
//! list of steps through a shared [`Pipeline`]: configuration files are
//! generated from templates, and the container runtime, composer and npm are
//! driven as subprocesses.

pub mod compose;
mod config;
pub mod docker;
pub mod fs;
pub mod health;
pub mod pipeline;
pub mod process;
pub mod provisioners;
pub mod readiness;

pub use compose::{COMPOSE_FILENAME, Compose, ComposeManifest, StackService};
pub use config::{DatabaseConfig, ENV_PREFIX, PortsConfig, STACKUP_CONFIG_FILENAME, StackConfig};
pub use docker::{ContainerHealth, ContainerStatus, HealthProbe, StackDocker};
pub use fs::{ConflictPolicy, FsHandler, MergeSummary};
pub use health::{StackHealthReport, health_check};
pub use pipeline::{
    Criticality, Pipeline, PipelineReport, Step, StepOutcome, StepRecord, StepStatus,
};
pub use process::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use provisioners::{
    ProvisionContext, Provisioner, STAGING_DIR,
    backend::{AdminPanel, BackendOptions, BackendProvisioner, BackendStep},
    environment::{EnvFile, EnvironmentProvisioner, EnvironmentStep, generate_app_key},
    frontend::{FrontendOptions, FrontendProvisioner, FrontendStep},
};
pub use readiness::{DEFAULT_READINESS_TIMEOUT, ReadinessOptions, wait_until_healthy};
