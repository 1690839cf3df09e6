//! Health report for a provisioned stack.

use std::fmt;

use anyhow::Result;

use crate::{
    StackConfig,
    compose::StackService,
    docker::{ContainerHealth, ContainerStatus, HealthProbe},
};

/// Health report for the whole stack.
pub struct StackHealthReport {
    pub services: Vec<ServiceHealth>,
    /// Every critical container runs and none reports unhealthy.
    pub healthy: bool,
}

/// Health of one service container.
pub struct ServiceHealth {
    pub service: StackService,
    pub container_name: String,
    pub status: ContainerStatus,
}

impl StackHealthReport {
    /// Critical services whose container is not running.
    pub fn down_critical(&self) -> impl Iterator<Item = &ServiceHealth> {
        self.services
            .iter()
            .filter(|s| s.service.is_critical() && !s.status.running)
    }
}

/// Inspect every container of the stack.
pub async fn health_check<P: HealthProbe>(
    probe: &P,
    config: &StackConfig,
) -> Result<StackHealthReport> {
    let mut services = Vec::with_capacity(StackService::ALL.len());

    for service in StackService::ALL {
        let container_name = config.container_name(service);
        let status = probe.container_status(&container_name).await?;
        services.push(ServiceHealth {
            service,
            container_name,
            status,
        });
    }

    let healthy = compute_healthy(&services);

    Ok(StackHealthReport { services, healthy })
}

fn compute_healthy(services: &[ServiceHealth]) -> bool {
    services
        .iter()
        .filter(|s| s.service.is_critical())
        .all(|s| s.status.running)
        && services
            .iter()
            .all(|s| s.status.health != ContainerHealth::Unhealthy)
}

impl fmt::Display for StackHealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.healthy { "HEALTHY" } else { "UNHEALTHY" };
        writeln!(f, "Stack Status: {}", status)?;

        for service in &self.services {
            writeln!(f, "{}", service)?;
        }

        Ok(())
    }
}

impl fmt::Display for ServiceHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = status_icon(self.status.running);
        write!(
            f,
            "  {} {} ({}) {}",
            status, self.service, self.container_name, self.status
        )?;
        if !self.status.running && !self.service.is_critical() {
            write!(f, " [non-critical]")?;
        }
        Ok(())
    }
}

fn status_icon(running: bool) -> &'static str {
    if running { "[ok]" } else { "[DOWN]" }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy_services() -> Vec<ServiceHealth> {
        StackService::ALL
            .into_iter()
            .map(|service| ServiceHealth {
                service,
                container_name: format!("cms-system_{}", service),
                status: ContainerStatus::running(ContainerHealth::Healthy),
            })
            .collect()
    }

    fn set(services: &mut [ServiceHealth], service: StackService, status: ContainerStatus) {
        if let Some(entry) = services.iter_mut().find(|s| s.service == service) {
            entry.status = status;
        }
    }

    #[test]
    fn test_healthy_report() {
        assert!(compute_healthy(&healthy_services()));
    }

    #[test]
    fn test_unhealthy_stopped_critical_container() {
        let mut services = healthy_services();
        set(&mut services, StackService::Redis, ContainerStatus::missing());
        assert!(!compute_healthy(&services));
    }

    #[test]
    fn test_healthy_with_mailhog_down() {
        let mut services = healthy_services();
        set(&mut services, StackService::Mailhog, ContainerStatus::missing());
        assert!(compute_healthy(&services));
    }

    #[test]
    fn test_unhealthy_check_fails() {
        let mut services = healthy_services();
        set(
            &mut services,
            StackService::Nextjs,
            ContainerStatus::running(ContainerHealth::Unhealthy),
        );
        assert!(!compute_healthy(&services));
    }

    #[test]
    fn test_report_display() {
        let mut services = healthy_services();
        set(&mut services, StackService::Laravel, ContainerStatus::missing());
        let healthy = compute_healthy(&services);
        let report = StackHealthReport { services, healthy };

        let rendered = report.to_string();
        assert!(rendered.starts_with("Stack Status: UNHEALTHY"));
        assert!(rendered.contains("[DOWN] laravel (cms-system_laravel) not found"));
        assert!(rendered.contains("[ok] mysql (cms-system_mysql) running, health: healthy"));
        assert_eq!(report.down_critical().count(), 1);
    }
}
