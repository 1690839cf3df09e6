//! stackup scaffolds a containerised Laravel + Next.js stack: compose environment, backend and frontend.

mod cli;
mod summary;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use stackup_provision::{
    BackendOptions, BackendProvisioner, EnvironmentProvisioner, FrontendOptions,
    FrontendProvisioner, ProvisionContext, Provisioner, ReadinessOptions,
    STACKUP_CONFIG_FILENAME, StackConfig, StackDocker, SystemRunner,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.project_dir.join(STACKUP_CONFIG_FILENAME));

    // Layer CLI flags over the file and environment configuration.
    let mut config = StackConfig::load(&config_path)?;
    if let Some(project_name) = &cli.project_name {
        config.project_name = project_name.clone();
    }
    if let Command::Env(args) = &cli.command {
        if let Some(password) = &args.mysql_password {
            config.database.password = password.clone();
        }
        if let Some(database) = &args.mysql_database {
            config.database.name = database.clone();
        }
    }
    config.validate()?;

    tracing::info!(
        project = %config.project_name,
        database = %config.database.name,
        project_dir = %cli.project_dir.display(),
        strict = cli.strict,
        "Provisioning {}...",
        cli.command
    );

    let runner = SystemRunner;
    let docker = StackDocker::connect()?;
    let ctx = ProvisionContext::new(&runner, &docker, &config, cli.project_dir.clone())
        .conflict_policy(cli.on_conflict);

    let report = match &cli.command {
        Command::Env(_) => EnvironmentProvisioner::new(ctx).provision(cli.strict).await,
        Command::Backend(args) => {
            let options = BackendOptions {
                admin_panel: args.admin_panel,
                readiness: ReadinessOptions::with_timeout(Duration::from_secs(
                    args.readiness_timeout,
                )),
            };
            BackendProvisioner::new(ctx, options)
                .provision(cli.strict)
                .await
        }
        Command::Frontend(args) => {
            let options = FrontendOptions {
                theme: args.theme.clone(),
            };
            FrontendProvisioner::new(ctx, options)
                .provision(cli.strict)
                .await
        }
    };

    println!("{}", summary::render(&report));
    let soft_failures = report.soft_failures().count();
    if soft_failures > 0 {
        tracing::warn!(count = soft_failures, "⚠ Completed with best-effort failures, see the table above");
    }

    report.into_result()?;

    // Later backend/frontend runs reuse the same project name and credentials.
    if matches!(cli.command, Command::Env(_)) {
        config.save_to_file(&config_path).await?;
    }

    Ok(())
}
