//! Next.js frontend: project scaffold, packages, directory layout and API client.

use anyhow::Result;

use super::{ProvisionContext, Provisioner, STAGING_DIR, is_provisioned};
use crate::{
    compose::StackService,
    docker::HealthProbe,
    fs::FsHandler,
    pipeline::{Criticality, Step, StepOutcome},
    process::CommandRunner,
};

/// File whose presence means the frontend project already exists.
pub const FRONTEND_MARKER: &str = "package.json";

pub const FRONTEND_PACKAGES: [&str; 6] = [
    "@tanstack/react-query",
    "axios",
    "zod",
    "react-hook-form",
    "clsx",
    "tailwind-merge",
];

pub const FRONTEND_DEV_PACKAGES: [&str; 2] = ["@tailwindcss/typography", "@tailwindcss/forms"];

/// Route groups, component folders and static asset folders of the app.
pub const FRONTEND_DIRS: [&str; 22] = [
    "app/(shop)/products/[slug]",
    "app/(shop)/cart",
    "app/(shop)/checkout",
    "app/(travel)/tours/[slug]",
    "app/(travel)/booking",
    "app/(restaurant)/menu",
    "app/(restaurant)/reservation",
    "app/(corporate)/services",
    "app/(corporate)/portfolio",
    "app/(corporate)/about",
    "app/(corporate)/contact",
    "app/api/revalidate",
    "components/shared",
    "components/themes/shop",
    "components/themes/travel",
    "components/themes/restaurant",
    "components/themes/corporate",
    "lib",
    "types",
    "public/images",
    "public/fonts",
    "public/icons",
];

/// Path of the API client, relative to the frontend directory.
pub const API_CLIENT_PATH: &str = "lib/api.ts";

/// `lib/api.ts`.
pub const API_CLIENT: &str = r#"import axios from 'axios'

const api = axios.create({
  baseURL: process.env.NEXT_PUBLIC_API_URL || 'http://localhost:8000/api/v1',
  headers: {
    'Content-Type': 'application/json',
  },
})

// Product API
export const productApi = {
  getAll: async (params?: { category_id?: number; search?: string }) => {
    const { data } = await api.get('/shop/products', { params })
    return data
  },
  getBySlug: async (slug: string) => {
    const { data } = await api.get(`/shop/products/${slug}`)
    return data
  },
}

export default api
"#;

/// Steps of the frontend provisioner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum FrontendStep {
    #[strum(to_string = "Scaffolding Next.js project")]
    Scaffold,
    #[strum(to_string = "Merging scaffold into frontend")]
    Merge,
    #[strum(to_string = "Installing packages")]
    InstallPackages,
    #[strum(to_string = "Installing dev packages")]
    InstallDevPackages,
    #[strum(to_string = "Creating directory structure")]
    CreateDirectories,
    #[strum(to_string = "Creating API client")]
    ApiClient,
}

impl Step for FrontendStep {
    fn criticality(&self) -> Criticality {
        match self {
            FrontendStep::Scaffold | FrontendStep::Merge => Criticality::Fatal,
            _ => Criticality::BestEffort,
        }
    }
}

/// Options of the frontend provisioner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendOptions {
    /// Theme identifier; recorded in the logs only.
    pub theme: String,
}

impl Default for FrontendOptions {
    fn default() -> Self {
        Self {
            theme: "modern".to_string(),
        }
    }
}

pub struct FrontendProvisioner<'a, R, P> {
    ctx: ProvisionContext<'a, R, P>,
    options: FrontendOptions,
}

impl<'a, R: CommandRunner, P: HealthProbe> FrontendProvisioner<'a, R, P> {
    pub fn new(ctx: ProvisionContext<'a, R, P>, options: FrontendOptions) -> Self {
        Self { ctx, options }
    }

    async fn exec(&self, args: impl IntoIterator<Item = &'static str>) -> Result<()> {
        self.ctx.compose().exec(StackService::Nextjs, args).await?;
        Ok(())
    }

    async fn scaffold(&self) -> Result<()> {
        self.ctx
            .clear_staging(StackService::Nextjs, &self.ctx.frontend_dir())
            .await?;

        self.exec([
            "npx",
            "create-next-app@latest",
            STAGING_DIR,
            "--typescript",
            "--tailwind",
            "--eslint",
            "--app",
            "--no-src-dir",
            "--import-alias",
            "@/*",
            "--use-npm",
            "--no-git",
            "--yes",
        ])
        .await?;

        self.ctx.release_staging(StackService::Nextjs).await
    }

    async fn merge(&self) -> Result<()> {
        let frontend_dir = self.ctx.frontend_dir();
        let summary = FsHandler::merge_staged(
            &frontend_dir.join(STAGING_DIR),
            &frontend_dir,
            self.ctx.conflict_policy,
        )
        .await?;

        tracing::info!(
            moved = summary.moved,
            overwritten = summary.overwritten,
            preserved = summary.preserved,
            policy = %self.ctx.conflict_policy,
            "Scaffold merged into frontend"
        );
        Ok(())
    }

    async fn create_directories(&self) -> Result<()> {
        let frontend_dir = self.ctx.frontend_dir();
        for dir in FRONTEND_DIRS {
            FsHandler::ensure_dir(&frontend_dir.join(dir)).await?;
        }
        tracing::debug!(count = FRONTEND_DIRS.len(), "Directory structure created");
        Ok(())
    }
}

impl<'a, R: CommandRunner, P: HealthProbe> Provisioner for FrontendProvisioner<'a, R, P> {
    const NAME: &'static str = "frontend";

    type Step = FrontendStep;

    async fn plan(&self) -> Vec<FrontendStep> {
        tracing::info!(theme = %self.options.theme, "Setting up Next.js frontend");

        let mut steps = Vec::new();

        if is_provisioned(&self.ctx.frontend_dir().join(FRONTEND_MARKER)).await {
            tracing::info!("Next.js already initialized ({} found), skipping install", FRONTEND_MARKER);
        } else {
            steps.extend([FrontendStep::Scaffold, FrontendStep::Merge]);
        }

        steps.extend([
            FrontendStep::InstallPackages,
            FrontendStep::InstallDevPackages,
            FrontendStep::CreateDirectories,
            FrontendStep::ApiClient,
        ]);

        steps
    }

    async fn execute(&self, step: FrontendStep) -> Result<StepOutcome> {
        match step {
            FrontendStep::Scaffold => self.scaffold().await?,
            FrontendStep::Merge => self.merge().await?,
            FrontendStep::InstallPackages => {
                self.exec(["npm", "install"].into_iter().chain(FRONTEND_PACKAGES))
                    .await?
            }
            FrontendStep::InstallDevPackages => {
                self.exec(["npm", "install", "-D"].into_iter().chain(FRONTEND_DEV_PACKAGES))
                    .await?
            }
            FrontendStep::CreateDirectories => self.create_directories().await?,
            FrontendStep::ApiClient => {
                FsHandler::write_artifact(
                    &self.ctx.frontend_dir().join(API_CLIENT_PATH),
                    API_CLIENT,
                )
                .await?
            }
        }

        Ok(StepOutcome::Done)
    }

    fn log_summary(&self) {
        tracing::info!("Frontend setup complete");
        tracing::info!("URL: http://localhost:{}", self.ctx.config.ports.frontend);
        tracing::info!("Restart the dev server with: docker compose restart nextjs");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_project_creation_is_fatal() {
        assert_eq!(FrontendStep::Scaffold.criticality(), Criticality::Fatal);
        assert_eq!(FrontendStep::Merge.criticality(), Criticality::Fatal);
        assert_eq!(FrontendStep::InstallPackages.criticality(), Criticality::BestEffort);
        assert_eq!(FrontendStep::ApiClient.criticality(), Criticality::BestEffort);
    }

    #[test]
    fn test_api_client_defaults_to_local_backend() {
        assert!(API_CLIENT.contains(
            "baseURL: process.env.NEXT_PUBLIC_API_URL || 'http://localhost:8000/api/v1'"
        ));
        assert!(API_CLIENT.contains("getBySlug: async (slug: string)"));
    }

    #[test]
    fn test_route_groups() {
        for group in ["(shop)", "(travel)", "(restaurant)", "(corporate)"] {
            assert!(FRONTEND_DIRS.iter().any(|dir| dir.contains(group)));
        }
    }
}
