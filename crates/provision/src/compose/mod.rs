//! The compose CLI: manifest model, command builder and a runner-backed client.

mod cmd;
mod manifest;

use std::path::PathBuf;

use anyhow::Result;

pub use cmd::ComposeCmdBuilder;
pub use manifest::{
    COMPOSE_FILENAME, ComposeBuild, ComposeManifest, ComposeNetwork, ComposeService,
    ComposeVolume, DependsOn, DependsOnCondition, Healthcheck, NETWORK_NAME, StackService,
};

use crate::process::{CommandOutput, CommandRunner, CommandSpec};

/// Program every compose command runs through.
pub const DOCKER_PROGRAM: &str = "docker";

/// Runs `docker compose` commands in a project directory.
#[derive(Debug, Clone)]
pub struct Compose<'a, R> {
    runner: &'a R,
    project_dir: PathBuf,
}

impl<'a, R: CommandRunner> Compose<'a, R> {
    pub fn new(runner: &'a R, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            project_dir: project_dir.into(),
        }
    }

    /// `docker compose up -d`.
    pub async fn up_detached(&self) -> Result<CommandOutput> {
        self.run(ComposeCmdBuilder::up().detach(true)).await
    }

    /// `docker compose ps`, returning its raw output.
    pub async fn ps(&self) -> Result<CommandOutput> {
        self.run(ComposeCmdBuilder::ps()).await
    }

    /// Run `args` inside `service` without a TTY.
    pub async fn exec(
        &self,
        service: StackService,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<CommandOutput> {
        self.run(
            ComposeCmdBuilder::exec(service.to_string())
                .no_tty()
                .args(args),
        )
        .await
    }

    async fn run(&self, builder: ComposeCmdBuilder) -> Result<CommandOutput> {
        let spec = CommandSpec::new(DOCKER_PROGRAM, &self.project_dir).args(builder.build());
        self.runner.run(&spec).await?.ensure_success(&spec)
    }
}
