//! Docker Engine client used to observe container state.

use std::{fmt, future::Future};

use anyhow::{Context, Result};
use bollard::{Docker, errors::Error as DockerError, secret::HealthStatusEnum};
use derive_more::Deref;

/// Outcome of a container's own health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ContainerHealth {
    Healthy,
    Starting,
    Unhealthy,
    /// The container defines no health check.
    #[strum(serialize = "no-check")]
    NoCheck,
}

impl From<Option<HealthStatusEnum>> for ContainerHealth {
    fn from(status: Option<HealthStatusEnum>) -> Self {
        match status {
            Some(HealthStatusEnum::HEALTHY) => ContainerHealth::Healthy,
            Some(HealthStatusEnum::STARTING) => ContainerHealth::Starting,
            Some(HealthStatusEnum::UNHEALTHY) => ContainerHealth::Unhealthy,
            _ => ContainerHealth::NoCheck,
        }
    }
}

/// Observed state of one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerStatus {
    /// Whether the container exists.
    pub exists: bool,
    pub running: bool,
    pub health: ContainerHealth,
}

impl ContainerStatus {
    /// A container that does not exist.
    pub fn missing() -> Self {
        Self {
            exists: false,
            running: false,
            health: ContainerHealth::NoCheck,
        }
    }

    /// A running container with the given health.
    pub fn running(health: ContainerHealth) -> Self {
        Self {
            exists: true,
            running: true,
            health,
        }
    }

    /// Running and either healthy or without a health check.
    pub fn is_ready(&self) -> bool {
        self.running && matches!(self.health, ContainerHealth::Healthy | ContainerHealth::NoCheck)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.exists {
            return f.write_str("not found");
        }
        let state = if self.running { "running" } else { "stopped" };
        write!(f, "{}, health: {}", state, self.health)
    }
}

/// Reads container state.
pub trait HealthProbe: Send + Sync {
    /// Status of the container named `name`. A missing container is not an error.
    fn container_status(&self, name: &str) -> impl Future<Output = Result<ContainerStatus>> + Send;
}

/// Docker client wrapper for inspecting the stack's containers.
#[derive(Debug, Clone, Deref)]
pub struct StackDocker {
    #[deref]
    docker: Docker,
}

impl StackDocker {
    /// Connect to the local Docker daemon.
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("Failed to connect to Docker. Is Docker running?")?;
        Ok(Self { docker })
    }
}

impl HealthProbe for StackDocker {
    async fn container_status(&self, name: &str) -> Result<ContainerStatus> {
        let inspect = match self.inspect_container(name, None).await {
            Ok(inspect) => inspect,
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => return Ok(ContainerStatus::missing()),
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to inspect container {}", name));
            }
        };

        let state = inspect.state.unwrap_or_default();
        let status = ContainerStatus {
            exists: true,
            running: state.running.unwrap_or(false),
            health: state.health.and_then(|health| health.status).into(),
        };

        tracing::trace!(container = %name, %status, "Container inspected");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_from_docker_status() {
        assert_eq!(
            ContainerHealth::from(Some(HealthStatusEnum::HEALTHY)),
            ContainerHealth::Healthy
        );
        assert_eq!(
            ContainerHealth::from(Some(HealthStatusEnum::UNHEALTHY)),
            ContainerHealth::Unhealthy
        );
        assert_eq!(ContainerHealth::from(Some(HealthStatusEnum::NONE)), ContainerHealth::NoCheck);
        assert_eq!(ContainerHealth::from(None), ContainerHealth::NoCheck);
    }

    #[test]
    fn test_readiness() {
        assert!(ContainerStatus::running(ContainerHealth::Healthy).is_ready());
        assert!(ContainerStatus::running(ContainerHealth::NoCheck).is_ready());
        assert!(!ContainerStatus::running(ContainerHealth::Starting).is_ready());
        assert!(!ContainerStatus::missing().is_ready());

        let stopped = ContainerStatus {
            running: false,
            ..ContainerStatus::running(ContainerHealth::Healthy)
        };
        assert!(!stopped.is_ready());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(
            ContainerStatus::running(ContainerHealth::Starting).to_string(),
            "running, health: starting"
        );
        assert_eq!(ContainerStatus::missing().to_string(), "not found");
    }
}
