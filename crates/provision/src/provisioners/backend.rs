//! Laravel backend: project scaffold, packages, admin panel and migrations.

use anyhow::Result;

use super::{ProvisionContext, Provisioner, STAGING_DIR, is_provisioned};
use crate::{
    compose::StackService,
    docker::HealthProbe,
    fs::FsHandler,
    pipeline::{Criticality, Step, StepOutcome},
    process::CommandRunner,
    readiness::{ReadinessOptions, wait_until_healthy},
};

/// File whose presence means the backend project already exists.
pub const BACKEND_MARKER: &str = "composer.json";

/// Framework version constraint used for new projects.
pub const LARAVEL_PACKAGE: &str = "laravel/laravel:^11.0";

/// Packages required on every run.
pub const BACKEND_PACKAGES: [&str; 4] = [
    "laravel/sanctum",
    "spatie/laravel-permission",
    "spatie/laravel-medialibrary",
    "spatie/laravel-sluggable",
];

/// Admin panel installed into the backend.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum AdminPanel {
    #[default]
    Filament,
    /// Commercial; needs a license key and `auth.json`, so it is left to the user.
    Nova,
}

/// Steps of the backend provisioner.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
pub enum BackendStep {
    #[strum(to_string = "Scaffolding Laravel project")]
    Scaffold,
    #[strum(to_string = "Merging scaffold into backend")]
    Merge,
    #[strum(to_string = "Fixing permissions")]
    FixPermissions,
    #[strum(to_string = "Installing {0}")]
    InstallPackage(String),
    #[strum(to_string = "Installing admin panel")]
    InstallAdminPanel,
    #[strum(to_string = "Waiting for database")]
    WaitForDatabase,
    #[strum(to_string = "Running migrations")]
    Migrate,
}

impl Step for BackendStep {
    fn criticality(&self) -> Criticality {
        match self {
            BackendStep::Scaffold | BackendStep::Merge | BackendStep::FixPermissions => {
                Criticality::Fatal
            }
            _ => Criticality::BestEffort,
        }
    }
}

/// Options of the backend provisioner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendOptions {
    pub admin_panel: AdminPanel,
    pub readiness: ReadinessOptions,
}

pub struct BackendProvisioner<'a, R, P> {
    ctx: ProvisionContext<'a, R, P>,
    options: BackendOptions,
}

impl<'a, R: CommandRunner, P: HealthProbe> BackendProvisioner<'a, R, P> {
    pub fn new(ctx: ProvisionContext<'a, R, P>, options: BackendOptions) -> Self {
        Self { ctx, options }
    }

    async fn artisan(&self, args: &[&str]) -> Result<()> {
        self.ctx
            .compose()
            .exec(
                StackService::Laravel,
                ["php", "artisan"].iter().chain(args).copied(),
            )
            .await?;
        Ok(())
    }

    async fn composer(&self, args: &[&str]) -> Result<()> {
        self.ctx
            .compose()
            .exec(
                StackService::Laravel,
                std::iter::once("composer").chain(args.iter().copied()),
            )
            .await?;
        Ok(())
    }

    async fn scaffold(&self) -> Result<()> {
        self.ctx
            .clear_staging(StackService::Laravel, &self.ctx.backend_dir())
            .await?;

        self.composer(&[
            "create-project",
            LARAVEL_PACKAGE,
            STAGING_DIR,
            "--prefer-dist",
            "--no-interaction",
        ])
        .await?;

        self.ctx.release_staging(StackService::Laravel).await
    }

    async fn merge(&self) -> Result<()> {
        let backend_dir = self.ctx.backend_dir();
        let summary = FsHandler::merge_staged(
            &backend_dir.join(STAGING_DIR),
            &backend_dir,
            self.ctx.conflict_policy,
        )
        .await?;

        tracing::info!(
            moved = summary.moved,
            overwritten = summary.overwritten,
            preserved = summary.preserved,
            policy = %self.ctx.conflict_policy,
            "Scaffold merged into backend"
        );
        Ok(())
    }

    async fn fix_permissions(&self) -> Result<()> {
        let compose = self.ctx.compose();
        compose
            .exec(
                StackService::Laravel,
                ["chown", "-R", "www-data:www-data", "storage", "bootstrap/cache"],
            )
            .await?;
        compose
            .exec(
                StackService::Laravel,
                ["chmod", "-R", "775", "storage", "bootstrap/cache"],
            )
            .await?;
        Ok(())
    }

    async fn install_admin_panel(&self) -> Result<StepOutcome> {
        match self.options.admin_panel {
            AdminPanel::Filament => {
                self.composer(&["require", "filament/filament:^3.2", "--no-interaction"])
                    .await?;
                self.artisan(&["filament:install", "--panels", "--no-interaction"])
                    .await?;
                Ok(StepOutcome::Done)
            }
            AdminPanel::Nova => {
                tracing::warn!(
                    "⚠ Nova installation requires a license key and auth.json; install it manually"
                );
                Ok(StepOutcome::Skipped(
                    "Nova requires a license key and auth.json".to_string(),
                ))
            }
        }
    }

    async fn wait_for_database(&self) -> Result<()> {
        let container = self.ctx.config.container_name(StackService::Mysql);
        wait_until_healthy(
            self.ctx.probe,
            &container,
            &self.options.readiness,
            shutdown_signal(),
        )
        .await?;
        Ok(())
    }
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::debug!(error = %err, "Ctrl-C handler unavailable");
        std::future::pending::<()>().await;
    }
}

impl<'a, R: CommandRunner, P: HealthProbe> Provisioner for BackendProvisioner<'a, R, P> {
    const NAME: &'static str = "backend";

    type Step = BackendStep;

    async fn plan(&self) -> Vec<BackendStep> {
        let mut steps = Vec::new();

        if is_provisioned(&self.ctx.backend_dir().join(BACKEND_MARKER)).await {
            tracing::info!("Laravel already installed ({} found), skipping installation", BACKEND_MARKER);
        } else {
            steps.extend([
                BackendStep::Scaffold,
                BackendStep::Merge,
                BackendStep::FixPermissions,
            ]);
        }

        steps.extend(
            BACKEND_PACKAGES
                .iter()
                .map(|package| BackendStep::InstallPackage(package.to_string())),
        );
        steps.extend([
            BackendStep::InstallAdminPanel,
            BackendStep::WaitForDatabase,
            BackendStep::Migrate,
        ]);

        steps
    }

    async fn execute(&self, step: BackendStep) -> Result<StepOutcome> {
        match step {
            BackendStep::Scaffold => self.scaffold().await?,
            BackendStep::Merge => self.merge().await?,
            BackendStep::FixPermissions => self.fix_permissions().await?,
            BackendStep::InstallPackage(package) => {
                self.composer(&["require", package.as_str(), "--no-interaction"])
                    .await?
            }
            BackendStep::InstallAdminPanel => return self.install_admin_panel().await,
            BackendStep::WaitForDatabase => self.wait_for_database().await?,
            BackendStep::Migrate => self.artisan(&["migrate", "--force"]).await?,
        }

        Ok(StepOutcome::Done)
    }

    fn log_summary(&self) {
        let backend = format!("http://localhost:{}", self.ctx.config.ports.backend);
        tracing::info!("Laravel backend setup complete");
        tracing::info!("API:   {}", backend);
        tracing::info!("Admin: {}/admin", backend);
        if self.options.admin_panel == AdminPanel::Filament {
            tracing::info!(
                "Create an admin user with: docker compose exec laravel php artisan make:filament-user"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_labels() {
        assert_eq!(BackendStep::Scaffold.to_string(), "Scaffolding Laravel project");
        assert_eq!(
            BackendStep::InstallPackage("laravel/sanctum".to_string()).to_string(),
            "Installing laravel/sanctum"
        );
        assert_eq!(BackendStep::Migrate.to_string(), "Running migrations");
    }

    #[test]
    fn test_only_project_creation_is_fatal() {
        assert_eq!(BackendStep::Merge.criticality(), Criticality::Fatal);
        assert_eq!(BackendStep::FixPermissions.criticality(), Criticality::Fatal);
        assert_eq!(
            BackendStep::InstallAdminPanel.criticality(),
            Criticality::BestEffort
        );
        assert_eq!(BackendStep::WaitForDatabase.criticality(), Criticality::BestEffort);
    }

    #[test]
    fn test_admin_panel_parse() {
        assert_eq!("nova".parse::<AdminPanel>().unwrap(), AdminPanel::Nova);
        assert_eq!(AdminPanel::default().to_string(), "filament");
        assert!("django".parse::<AdminPanel>().is_err());
    }
}
