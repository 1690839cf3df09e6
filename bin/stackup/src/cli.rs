use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use stackup_provision::{AdminPanel, ConflictPolicy, DEFAULT_READINESS_TIMEOUT};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "stackup")]
#[command(
    author,
    version,
    about = "Scaffold a containerised Laravel + Next.js stack in a few commands"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "STACKUP_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Directory holding docker-compose.yml, backend/ and frontend/.
    #[arg(long, env = "STACKUP_PROJECT_DIR", default_value = ".")]
    pub project_dir: PathBuf,

    /// Path to a stackup.toml configuration file.
    ///
    /// Defaults to stackup.toml in the project directory.
    #[arg(long, alias = "conf", env = "STACKUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Project name, used as the container name prefix.
    #[arg(long, env = "STACKUP_PROJECT_NAME")]
    pub project_name: Option<String>,

    /// Treat every best-effort step failure as fatal.
    #[arg(long, env = "STACKUP_STRICT")]
    pub strict: bool,

    /// What to do with existing files when merging a freshly scaffolded project.
    #[arg(long, env = "STACKUP_ON_CONFLICT", default_value_t = ConflictPolicy::Preserve)]
    pub on_conflict: ConflictPolicy,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Command {
    /// Write the compose manifest, build files and env files, then start the containers.
    Env(EnvArgs),
    /// Scaffold the Laravel backend, install packages and run migrations.
    Backend(BackendArgs),
    /// Scaffold the Next.js frontend, install packages and create the app layout.
    Frontend(FrontendArgs),
}

#[derive(Debug, Clone, Args)]
pub struct EnvArgs {
    /// MySQL root password.
    #[arg(long, env = "STACKUP_MYSQL_PASSWORD")]
    pub mysql_password: Option<String>,

    /// MySQL database name.
    #[arg(long, env = "STACKUP_MYSQL_DATABASE")]
    pub mysql_database: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct BackendArgs {
    /// Admin panel to install.
    #[arg(long, env = "STACKUP_ADMIN_PANEL", default_value_t = AdminPanel::Filament)]
    pub admin_panel: AdminPanel,

    /// Seconds to wait for the database to report healthy.
    #[arg(long, env = "STACKUP_READINESS_TIMEOUT", default_value_t = DEFAULT_READINESS_TIMEOUT.as_secs())]
    pub readiness_timeout: u64,
}

#[derive(Debug, Clone, Args)]
pub struct FrontendArgs {
    /// Theme identifier.
    #[arg(long, env = "STACKUP_THEME", default_value = "modern")]
    pub theme: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_args() {
        let cli = Cli::try_parse_from([
            "stackup",
            "--strict",
            "--on-conflict",
            "overwrite",
            "backend",
            "--admin-panel",
            "nova",
            "--readiness-timeout",
            "30",
        ])
        .unwrap();

        assert!(cli.strict);
        assert_eq!(cli.on_conflict, ConflictPolicy::Overwrite);
        let Command::Backend(args) = cli.command else {
            panic!("expected backend subcommand");
        };
        assert_eq!(args.admin_panel, AdminPanel::Nova);
        assert_eq!(args.readiness_timeout, 30);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["stackup", "frontend"]).unwrap();

        assert_eq!(cli.project_dir, PathBuf::from("."));
        assert_eq!(cli.on_conflict, ConflictPolicy::Preserve);
        assert_eq!(cli.command.to_string(), "frontend");
        let Command::Frontend(args) = cli.command else {
            panic!("expected frontend subcommand");
        };
        assert_eq!(args.theme, "modern");
    }

    #[test]
    fn test_rejects_unknown_admin_panel() {
        assert!(Cli::try_parse_from(["stackup", "backend", "--admin-panel", "django"]).is_err());
    }
}
