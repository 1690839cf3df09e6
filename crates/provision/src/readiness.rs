//! Waiting for a container to become healthy.

use std::{fmt, future::Future, sync::Mutex, time::Duration};

use anyhow::Result;
use backon::{ExponentialBuilder, Retryable};

use crate::docker::{ContainerStatus, HealthProbe};

/// Default time to wait for a container to report healthy.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(120);

/// Polling bounds for [`wait_until_healthy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessOptions {
    /// Give up after this long.
    pub timeout: Duration,
    /// First delay between polls.
    pub min_delay: Duration,
    /// Upper bound for the delay between polls.
    pub max_delay: Duration,
}

impl Default for ReadinessOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_READINESS_TIMEOUT,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl ReadinessOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Why a single poll failed.
enum Attempt {
    NotReady(ContainerStatus),
    /// The container exists but has stopped; polling again won't help.
    Stopped(ContainerStatus),
    Probe(anyhow::Error),
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attempt::NotReady(status) | Attempt::Stopped(status) => fmt::Display::fmt(status, f),
            Attempt::Probe(err) => write!(f, "{:#}", err),
        }
    }
}

/// Poll `container` until it runs and reports healthy (or defines no health
/// check), backing off exponentially between polls.
///
/// Fails when the container stops, when `options.timeout` elapses, or when
/// `cancel` resolves first. The error carries the last observed status.
pub async fn wait_until_healthy<P, C>(
    probe: &P,
    container: &str,
    options: &ReadinessOptions,
    cancel: C,
) -> Result<ContainerStatus>
where
    P: HealthProbe,
    C: Future<Output = ()>,
{
    let last_seen = Mutex::new(String::from("never observed"));
    let last_seen_ref = &last_seen;

    let poll = move || async move {
        let attempt = match probe.container_status(container).await {
            Ok(status) if status.is_ready() => return Ok(status),
            Ok(status) if status.exists && !status.running => Attempt::Stopped(status),
            Ok(status) => Attempt::NotReady(status),
            Err(err) => Attempt::Probe(err),
        };
        if let Ok(mut last) = last_seen_ref.lock() {
            *last = attempt.to_string();
        }
        Err(attempt)
    };

    let backoff = ExponentialBuilder::default()
        .with_min_delay(options.min_delay)
        .with_max_delay(options.max_delay)
        .with_max_times(usize::MAX);

    let retry = poll
        .retry(backoff)
        .sleep(tokio::time::sleep)
        .when(|attempt| !matches!(attempt, Attempt::Stopped(_)))
        .notify(|attempt, delay| {
            tracing::debug!(container = %container, status = %attempt, ?delay, "Container not ready, retrying");
        });

    tracing::debug!(container = %container, timeout = ?options.timeout, "Waiting for container to become healthy");

    let last = || {
        last_seen
            .lock()
            .map(|last| last.clone())
            .unwrap_or_default()
    };

    tokio::select! {
        result = tokio::time::timeout(options.timeout, retry) => match result {
            Ok(Ok(status)) => {
                tracing::info!(container = %container, "✓ {} is ready", container);
                Ok(status)
            }
            Ok(Err(Attempt::Stopped(status))) => {
                anyhow::bail!("Container {} is not running ({})", container, status)
            }
            Ok(Err(attempt)) => {
                anyhow::bail!("Container {} did not become ready: {}", container, attempt)
            }
            Err(_) => anyhow::bail!(
                "Timeout after {}s waiting for {} to become healthy (last status: {})",
                options.timeout.as_secs(),
                container,
                last()
            ),
        },
        _ = cancel => anyhow::bail!(
            "Cancelled while waiting for {} (last status: {})",
            container,
            last()
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::docker::ContainerHealth;

    /// Replays a fixed sequence of statuses, repeating the last one.
    struct ScriptedProbe {
        statuses: Mutex<VecDeque<ContainerStatus>>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(statuses: impl IntoIterator<Item = ContainerStatus>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into_iter().collect()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl HealthProbe for ScriptedProbe {
        async fn container_status(&self, _name: &str) -> Result<ContainerStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.len() > 1 {
                Ok(statuses.pop_front().unwrap())
            } else {
                Ok(*statuses.front().unwrap())
            }
        }
    }

    fn fast(timeout: Duration) -> ReadinessOptions {
        ReadinessOptions {
            timeout,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_ready_after_starting() {
        let probe = ScriptedProbe::new([
            ContainerStatus::missing(),
            ContainerStatus::running(ContainerHealth::Starting),
            ContainerStatus::running(ContainerHealth::Healthy),
        ]);

        let status = wait_until_healthy(
            &probe,
            "cms-system_mysql",
            &fast(Duration::from_secs(5)),
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(status.health, ContainerHealth::Healthy);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_reports_last_status() {
        let probe = ScriptedProbe::new([ContainerStatus::running(ContainerHealth::Unhealthy)]);

        let err = wait_until_healthy(
            &probe,
            "cms-system_mysql",
            &fast(Duration::from_millis(50)),
            std::future::pending(),
        )
        .await
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Timeout"));
        assert!(message.contains("health: unhealthy"));
    }

    #[tokio::test]
    async fn test_stopped_container_fails_fast() {
        let stopped = ContainerStatus {
            running: false,
            ..ContainerStatus::running(ContainerHealth::NoCheck)
        };
        let probe = ScriptedProbe::new([stopped]);

        let err = wait_until_healthy(
            &probe,
            "cms-system_mysql",
            &fast(Duration::from_secs(5)),
            std::future::pending(),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("is not running"));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let probe = ScriptedProbe::new([ContainerStatus::running(ContainerHealth::Starting)]);

        let err = wait_until_healthy(
            &probe,
            "cms-system_mysql",
            &fast(Duration::from_secs(5)),
            tokio::time::sleep(Duration::from_millis(20)),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("Cancelled"));
    }
}
