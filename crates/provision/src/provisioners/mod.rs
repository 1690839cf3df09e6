//! The three provisioners and the trait they share.

pub mod backend;
pub mod environment;
pub mod frontend;

use std::{
    future::Future,
    path::{Path, PathBuf},
};

use anyhow::Result;

use crate::{
    StackConfig,
    compose::{Compose, StackService},
    docker::HealthProbe,
    fs::{ConflictPolicy, FsHandler},
    pipeline::{Pipeline, PipelineReport, Step, StepOutcome},
    process::CommandRunner,
};

/// Name of the directory scaffolders write into before it is merged.
pub const STAGING_DIR: &str = "scaffold-staging";

/// Everything a provisioner needs from the outside world.
pub struct ProvisionContext<'a, R, P> {
    pub runner: &'a R,
    pub probe: &'a P,
    pub config: &'a StackConfig,
    /// Directory holding `docker-compose.yml`, `backend/` and `frontend/`.
    pub project_dir: PathBuf,
    pub conflict_policy: ConflictPolicy,
}

impl<'a, R: CommandRunner, P: HealthProbe> ProvisionContext<'a, R, P> {
    pub fn new(runner: &'a R, probe: &'a P, config: &'a StackConfig, project_dir: PathBuf) -> Self {
        Self {
            runner,
            probe,
            config,
            project_dir,
            conflict_policy: ConflictPolicy::default(),
        }
    }

    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn compose(&self) -> Compose<'a, R> {
        Compose::new(self.runner, &self.project_dir)
    }

    pub fn backend_dir(&self) -> PathBuf {
        self.project_dir.join("backend")
    }

    pub fn frontend_dir(&self) -> PathBuf {
        self.project_dir.join("frontend")
    }

    /// Remove a staging directory left in `dir` by an earlier failed run.
    ///
    /// Runs inside `service`, where the scaffolder created it as the container user.
    pub(crate) async fn clear_staging(&self, service: StackService, dir: &Path) -> Result<()> {
        let staging = dir.join(STAGING_DIR);
        if !tokio::fs::try_exists(&staging).await.unwrap_or(false) {
            return Ok(());
        }

        self.compose()
            .exec(service, ["rm", "-rf", STAGING_DIR])
            .await?;
        tracing::debug!(path = %staging.display(), "Removed stale staging directory");
        Ok(())
    }

    /// Give the staging tree to the owner of the project directory so the
    /// host-side merge can move its entries.
    pub(crate) async fn release_staging(&self, service: StackService) -> Result<()> {
        let Some(owner) = FsHandler::owner(&self.project_dir).await? else {
            return Ok(());
        };

        self.compose()
            .exec(service, ["chown", "-R", owner.as_str(), STAGING_DIR])
            .await?;
        tracing::debug!(%owner, %service, "Staging directory handed to host user");
        Ok(())
    }
}

/// Whether `marker` exists, meaning the project was already created.
pub(crate) async fn is_provisioned(marker: &Path) -> bool {
    tokio::fs::try_exists(marker).await.unwrap_or(false)
}

/// One part of the stack, provisioned as an ordered list of steps.
///
/// A provisioner decides its steps up front in [`Provisioner::plan`] and
/// executes them one at a time; [`Provisioner::provision`] drives both through
/// a [`Pipeline`].
pub trait Provisioner: Sync {
    /// Name used in logs and in the failure message.
    const NAME: &'static str;

    type Step: Step + Send;

    /// The steps to run, in order.
    fn plan(&self) -> impl Future<Output = Vec<Self::Step>> + Send;

    /// Execute one step.
    fn execute(&self, step: Self::Step) -> impl Future<Output = Result<StepOutcome>> + Send;

    /// Log what to do next once every fatal step has passed.
    fn log_summary(&self) {}

    /// Plan and run every step.
    fn provision(&self, strict: bool) -> impl Future<Output = PipelineReport> + Send {
        async move {
            let steps = self.plan().await;
            tracing::debug!(provisioner = Self::NAME, steps = steps.len(), "Provisioning plan ready");

            let report = Pipeline::new(Self::NAME)
                .strict(strict)
                .run(steps, |step| self.execute(step))
                .await;

            if report.succeeded() {
                self.log_summary();
            }
            report
        }
    }
}
