//! Command builder for `docker compose`.

/// The compose subcommand to build.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ComposeAction {
    Up,
    Ps,
    Exec { service: String },
}

/// Builder for `docker compose` argument lists.
///
/// The result excludes the `docker` program itself and starts with `compose`.
#[derive(Debug, Clone)]
pub struct ComposeCmdBuilder {
    action: ComposeAction,
    detach: bool,
    tty: bool,
    args: Vec<String>,
}

impl ComposeCmdBuilder {
    fn new(action: ComposeAction) -> Self {
        Self {
            action,
            detach: false,
            tty: true,
            args: Vec::new(),
        }
    }

    /// `docker compose up`.
    pub fn up() -> Self {
        Self::new(ComposeAction::Up)
    }

    /// `docker compose ps`.
    pub fn ps() -> Self {
        Self::new(ComposeAction::Ps)
    }

    /// `docker compose exec <service>`.
    pub fn exec(service: impl Into<String>) -> Self {
        Self::new(ComposeAction::Exec {
            service: service.into(),
        })
    }

    /// Run `up` in the background.
    pub fn detach(mut self, detach: bool) -> Self {
        self.detach = detach;
        self
    }

    /// Disable pseudo-TTY allocation for `exec`.
    pub fn no_tty(mut self) -> Self {
        self.tty = false;
        self
    }

    /// Add trailing arguments (the command to run for `exec`).
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build the command as a vector of strings.
    pub fn build(self) -> Vec<String> {
        let mut cmd = vec!["compose".to_string()];

        match self.action {
            ComposeAction::Up => {
                cmd.push("up".to_string());
                if self.detach {
                    cmd.push("-d".to_string());
                }
            }
            ComposeAction::Ps => cmd.push("ps".to_string()),
            ComposeAction::Exec { service } => {
                cmd.push("exec".to_string());
                if !self.tty {
                    cmd.push("-T".to_string());
                }
                cmd.push(service);
            }
        }

        cmd.extend(self.args);

        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_up_detached() {
        assert_eq!(ComposeCmdBuilder::up().detach(true).build(), ["compose", "up", "-d"]);
    }

    #[test]
    fn test_exec_without_tty() {
        let cmd = ComposeCmdBuilder::exec("laravel")
            .no_tty()
            .args(["php", "artisan", "migrate", "--force"])
            .build();

        assert_eq!(
            cmd,
            ["compose", "exec", "-T", "laravel", "php", "artisan", "migrate", "--force"]
        );
    }

    #[test]
    fn test_ps() {
        assert_eq!(ComposeCmdBuilder::ps().build(), ["compose", "ps"]);
    }
}
