//! Ordered-steps pipeline shared by every provisioner.
//!
//! A pipeline runs a list of named steps in order. Each step declares a
//! [`Criticality`]: an error from a [`Criticality::Fatal`] step halts the run,
//! an error from a [`Criticality::BestEffort`] step is recorded as a soft
//! failure and the run moves on. Nothing is retried and nothing is rolled back.

use std::{fmt, future::Future};

use anyhow::Result;

/// How the pipeline reacts to a step error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Criticality {
    /// An error aborts the pipeline.
    Fatal,
    /// An error is logged and the pipeline continues.
    BestEffort,
}

/// A pipeline step. The `Display` impl is the human-readable label.
pub trait Step: fmt::Display {
    fn criticality(&self) -> Criticality;
}

/// What a step reports when it returns normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    /// Nothing to do, with the reason.
    Skipped(String),
    /// Completed, but with a problem worth reporting.
    Degraded(String),
}

/// Final status of one executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    Skipped(String),
    SoftFailed(String),
    Failed(String),
}

/// Record of one executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub label: String,
    pub criticality: Criticality,
    pub status: StepStatus,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Name of the pipeline (e.g. "environment").
    pub name: String,
    /// One record per executed step, in execution order.
    pub records: Vec<StepRecord>,
}

impl PipelineReport {
    /// The step that halted the pipeline, if any.
    pub fn failure(&self) -> Option<&StepRecord> {
        self.records
            .iter()
            .find(|record| matches!(record.status, StepStatus::Failed(_)))
    }

    /// Steps that failed without halting the pipeline.
    pub fn soft_failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.records
            .iter()
            .filter(|record| matches!(record.status, StepStatus::SoftFailed(_)))
    }

    pub fn succeeded(&self) -> bool {
        self.failure().is_none()
    }

    /// Convert into an error when the pipeline halted.
    pub fn into_result(self) -> Result<Self> {
        if let Some(StepRecord {
            label,
            status: StepStatus::Failed(diagnostic),
            ..
        }) = self.failure()
        {
            anyhow::bail!(
                "{} setup failed at: {}\n{}",
                self.name,
                label,
                diagnostic
            );
        }

        Ok(self)
    }
}

/// Runs steps in order.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    strict: bool,
}

impl Pipeline {
    /// Create a new pipeline with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strict: false,
        }
    }

    /// Treat every soft failure as fatal.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Execute `steps` in order with `execute`.
    ///
    /// Stops at the first hard failure; steps after it are never executed.
    pub async fn run<S, F, Fut>(&self, steps: Vec<S>, mut execute: F) -> PipelineReport
    where
        S: Step,
        F: FnMut(S) -> Fut,
        Fut: Future<Output = Result<StepOutcome>>,
    {
        let mut records = Vec::with_capacity(steps.len());

        for step in steps {
            let label = step.to_string();
            let criticality = step.criticality();

            tracing::info!(pipeline = %self.name, step = %label, "{}...", label);

            let status = match execute(step).await {
                Ok(StepOutcome::Done) => {
                    tracing::info!(step = %label, "✓ {}", label);
                    StepStatus::Done
                }
                Ok(StepOutcome::Skipped(reason)) => {
                    tracing::info!(step = %label, %reason, "Skipped");
                    StepStatus::Skipped(reason)
                }
                Ok(StepOutcome::Degraded(diagnostic)) => self.soft_failure(&label, diagnostic),
                Err(err) => {
                    let diagnostic = format!("{:#}", err);
                    match criticality {
                        Criticality::Fatal => StepStatus::Failed(diagnostic),
                        Criticality::BestEffort => self.soft_failure(&label, diagnostic),
                    }
                }
            };

            let halted = matches!(status, StepStatus::Failed(_));
            if let StepStatus::Failed(diagnostic) = &status {
                tracing::error!(step = %label, %diagnostic, "✗ {} setup failed at: {}", self.name, label);
            }

            records.push(StepRecord {
                label,
                criticality,
                status,
            });

            if halted {
                break;
            }
        }

        PipelineReport {
            name: self.name.clone(),
            records,
        }
    }

    fn soft_failure(&self, label: &str, diagnostic: String) -> StepStatus {
        if self.strict {
            return StepStatus::Failed(diagnostic);
        }

        tracing::warn!(step = %label, %diagnostic, "⚠ {} did not complete, continuing", label);
        StepStatus::SoftFailed(diagnostic)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Debug, Clone)]
    struct TestStep {
        label: &'static str,
        criticality: Criticality,
        fails: bool,
    }

    impl fmt::Display for TestStep {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.label)
        }
    }

    impl Step for TestStep {
        fn criticality(&self) -> Criticality {
            self.criticality
        }
    }

    fn step(label: &'static str, criticality: Criticality, fails: bool) -> TestStep {
        TestStep {
            label,
            criticality,
            fails,
        }
    }

    async fn run(pipeline: Pipeline, steps: Vec<TestStep>) -> (PipelineReport, Vec<&'static str>) {
        let executed = RefCell::new(Vec::new());
        let report = pipeline
            .run(steps, |step| {
                executed.borrow_mut().push(step.label);
                async move {
                    if step.fails {
                        anyhow::bail!("{} broke", step.label);
                    }
                    Ok(StepOutcome::Done)
                }
            })
            .await;
        (report, executed.into_inner())
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let steps = vec![
            step("one", Criticality::Fatal, false),
            step("two", Criticality::BestEffort, false),
        ];
        let (report, executed) = run(Pipeline::new("test"), steps).await;

        assert!(report.succeeded());
        assert_eq!(executed, vec!["one", "two"]);
        assert!(report.records.iter().all(|r| r.status == StepStatus::Done));
    }

    #[tokio::test]
    async fn test_fatal_failure_halts() {
        let steps = vec![
            step("one", Criticality::Fatal, false),
            step("two", Criticality::Fatal, true),
            step("three", Criticality::Fatal, false),
            step("four", Criticality::BestEffort, false),
        ];
        let (report, executed) = run(Pipeline::new("test"), steps).await;

        assert_eq!(executed, vec!["one", "two"]);
        let failure = report.failure().unwrap();
        assert_eq!(failure.label, "two");
        assert_eq!(report.records.len(), 2);

        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("test setup failed at: two"));
        assert!(err.to_string().contains("two broke"));
    }

    #[tokio::test]
    async fn test_best_effort_failure_continues() {
        let steps = vec![
            step("one", Criticality::BestEffort, true),
            step("two", Criticality::Fatal, false),
            step("three", Criticality::BestEffort, true),
        ];
        let (report, executed) = run(Pipeline::new("test"), steps).await;

        assert_eq!(executed, vec!["one", "two", "three"]);
        assert!(report.succeeded());
        let soft: Vec<_> = report.soft_failures().map(|r| r.label.as_str()).collect();
        assert_eq!(soft, vec!["one", "three"]);
        assert!(report.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_strict_promotes_soft_failures() {
        let steps = vec![
            step("one", Criticality::BestEffort, true),
            step("two", Criticality::Fatal, false),
        ];
        let (report, executed) = run(Pipeline::new("test").strict(true), steps).await;

        assert_eq!(executed, vec!["one"]);
        assert_eq!(report.failure().unwrap().label, "one");
    }

    #[tokio::test]
    async fn test_degraded_and_skipped_outcomes() {
        let report = Pipeline::new("test")
            .run(
                vec![
                    step("verify", Criticality::Fatal, false),
                    step("notice", Criticality::BestEffort, false),
                ],
                |step| async move {
                    Ok(match step.label {
                        "verify" => StepOutcome::Degraded("services down".to_string()),
                        _ => StepOutcome::Skipped("manual".to_string()),
                    })
                },
            )
            .await;

        assert!(report.succeeded());
        assert_eq!(
            report.records[0].status,
            StepStatus::SoftFailed("services down".to_string())
        );
        assert_eq!(report.records[1].status, StepStatus::Skipped("manual".to_string()));
    }
}
