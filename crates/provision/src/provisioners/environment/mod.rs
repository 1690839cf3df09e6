//! Writes the infrastructure files and starts the stack.

mod env_file;
mod templates;

use anyhow::{Context, Result};

pub use env_file::{EnvFile, REDACTED_PLACEHOLDER, generate_app_key};
pub use templates::{
    BACKEND_DOCKERFILE, BACKEND_DOCKERIGNORE, FRONTEND_DOCKERFILE, FRONTEND_DOCKERIGNORE,
    NGINX_CONF,
};

use super::{ProvisionContext, Provisioner};
use crate::{
    compose::{COMPOSE_FILENAME, ComposeManifest},
    docker::HealthProbe,
    fs::FsHandler,
    health,
    pipeline::{Criticality, Step, StepOutcome},
    process::CommandRunner,
};

/// Steps of the environment provisioner, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum EnvironmentStep {
    #[strum(to_string = "Creating docker-compose.yml")]
    ComposeManifest,
    #[strum(to_string = "Creating backend Dockerfile")]
    BackendDockerfile,
    #[strum(to_string = "Creating nginx config")]
    NginxConfig,
    #[strum(to_string = "Creating frontend Dockerfile")]
    FrontendDockerfile,
    #[strum(to_string = "Creating environment files")]
    EnvFiles,
    #[strum(to_string = "Creating .dockerignore files")]
    DockerIgnore,
    #[strum(to_string = "Starting containers")]
    StartContainers,
    #[strum(to_string = "Verifying setup")]
    Verify,
}

impl EnvironmentStep {
    pub const ALL: [EnvironmentStep; 8] = [
        EnvironmentStep::ComposeManifest,
        EnvironmentStep::BackendDockerfile,
        EnvironmentStep::NginxConfig,
        EnvironmentStep::FrontendDockerfile,
        EnvironmentStep::EnvFiles,
        EnvironmentStep::DockerIgnore,
        EnvironmentStep::StartContainers,
        EnvironmentStep::Verify,
    ];
}

impl Step for EnvironmentStep {
    fn criticality(&self) -> Criticality {
        match self {
            EnvironmentStep::Verify => Criticality::BestEffort,
            _ => Criticality::Fatal,
        }
    }
}

/// Generates the compose manifest, build files and env files, then starts
/// the services.
pub struct EnvironmentProvisioner<'a, R, P> {
    ctx: ProvisionContext<'a, R, P>,
}

impl<'a, R: CommandRunner, P: HealthProbe> EnvironmentProvisioner<'a, R, P> {
    pub fn new(ctx: ProvisionContext<'a, R, P>) -> Self {
        Self { ctx }
    }

    async fn write_compose_manifest(&self) -> Result<()> {
        let manifest = ComposeManifest::for_stack(self.ctx.config);
        FsHandler::write_artifact(
            &self.ctx.project_dir.join(COMPOSE_FILENAME),
            manifest.to_yaml()?,
        )
        .await
    }

    async fn write_env_files(&self) -> Result<()> {
        let config = self.ctx.config;
        let backend_dir = self.ctx.backend_dir();
        let frontend_dir = self.ctx.frontend_dir();

        let backend = EnvFile::backend(config, &generate_app_key());
        FsHandler::write_artifact(&backend_dir.join(".env"), backend.to_string()).await?;
        FsHandler::write_artifact(
            &backend_dir.join(".env.example"),
            backend
                .redacted("DB_PASSWORD", REDACTED_PLACEHOLDER)
                .to_string(),
        )
        .await?;

        let frontend = EnvFile::frontend(config).to_string();
        FsHandler::write_artifact(&frontend_dir.join(".env.local"), &frontend).await?;
        FsHandler::write_artifact(&frontend_dir.join(".env.example"), &frontend).await?;

        Ok(())
    }

    async fn write_dockerignores(&self) -> Result<()> {
        FsHandler::write_artifact(
            &self.ctx.backend_dir().join(".dockerignore"),
            BACKEND_DOCKERIGNORE,
        )
        .await?;
        FsHandler::write_artifact(
            &self.ctx.frontend_dir().join(".dockerignore"),
            FRONTEND_DOCKERIGNORE,
        )
        .await
    }

    async fn verify(&self) -> Result<StepOutcome> {
        let ps = self.ctx.compose().ps().await?;
        if !ps.stdout.contains("Up") {
            return Ok(StepOutcome::Degraded(format!(
                "Some services may not be running properly:\n{}",
                ps.stdout.trim_end()
            )));
        }

        let report = health::health_check(self.ctx.probe, self.ctx.config)
            .await
            .context("Failed to inspect stack containers")?;
        tracing::info!("\n{}", report);

        let down: Vec<_> = report
            .down_critical()
            .map(|service| service.container_name.as_str())
            .collect();
        if !down.is_empty() {
            return Ok(StepOutcome::Degraded(format!(
                "Critical containers not running: {}",
                down.join(", ")
            )));
        }

        self.log_endpoints();
        Ok(StepOutcome::Done)
    }

    fn log_endpoints(&self) {
        let ports = &self.ctx.config.ports;
        tracing::info!("Docker environment setup complete");
        tracing::info!("Laravel API: http://localhost:{}", ports.backend);
        tracing::info!("Next.js:     http://localhost:{}", ports.frontend);
        tracing::info!("Mailhog UI:  http://localhost:{}", ports.mail_ui);
        tracing::info!("MySQL:       localhost:{}", ports.mysql);
        tracing::info!("Next steps: `stackup backend`, then `stackup frontend`");
    }
}

impl<'a, R: CommandRunner, P: HealthProbe> Provisioner for EnvironmentProvisioner<'a, R, P> {
    const NAME: &'static str = "environment";

    type Step = EnvironmentStep;

    async fn plan(&self) -> Vec<EnvironmentStep> {
        EnvironmentStep::ALL.to_vec()
    }

    async fn execute(&self, step: EnvironmentStep) -> Result<StepOutcome> {
        let backend_dir = self.ctx.backend_dir();
        let frontend_dir = self.ctx.frontend_dir();

        match step {
            EnvironmentStep::ComposeManifest => self.write_compose_manifest().await?,
            EnvironmentStep::BackendDockerfile => {
                FsHandler::write_artifact(&backend_dir.join("Dockerfile"), BACKEND_DOCKERFILE)
                    .await?
            }
            EnvironmentStep::NginxConfig => {
                FsHandler::write_artifact(&backend_dir.join("docker/nginx.conf"), NGINX_CONF)
                    .await?
            }
            EnvironmentStep::FrontendDockerfile => {
                FsHandler::write_artifact(&frontend_dir.join("Dockerfile"), FRONTEND_DOCKERFILE)
                    .await?
            }
            EnvironmentStep::EnvFiles => self.write_env_files().await?,
            EnvironmentStep::DockerIgnore => self.write_dockerignores().await?,
            EnvironmentStep::StartContainers => {
                self.ctx.compose().up_detached().await?;
            }
            EnvironmentStep::Verify => return self.verify().await,
        }

        Ok(StepOutcome::Done)
    }
}
