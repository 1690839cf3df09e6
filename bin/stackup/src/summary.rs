//! Final step table.

use comfy_table::{Table, presets::UTF8_FULL};
use stackup_provision::{PipelineReport, StepStatus};

/// Render one row per executed step.
pub fn render(report: &PipelineReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Step", "Criticality", "Status"]);

    for record in &report.records {
        table.add_row(vec![
            record.label.clone(),
            record.criticality.to_string(),
            status_cell(&record.status),
        ]);
    }

    table
}

fn status_cell(status: &StepStatus) -> String {
    let first_line = |text: &str| text.lines().next().unwrap_or_default().to_string();
    match status {
        StepStatus::Done => "✓ done".to_string(),
        StepStatus::Skipped(reason) => format!("skipped: {}", first_line(reason)),
        StepStatus::SoftFailed(diagnostic) => format!("⚠ {}", first_line(diagnostic)),
        StepStatus::Failed(diagnostic) => format!("✗ {}", first_line(diagnostic)),
    }
}

#[cfg(test)]
mod tests {
    use stackup_provision::{Criticality, StepRecord};

    use super::*;

    #[test]
    fn test_render_rows() {
        let report = PipelineReport {
            name: "backend".to_string(),
            records: vec![
                StepRecord {
                    label: "Installing laravel/sanctum".to_string(),
                    criticality: Criticality::BestEffort,
                    status: StepStatus::SoftFailed("`docker compose exec` failed\nstderr: x".to_string()),
                },
                StepRecord {
                    label: "Running migrations".to_string(),
                    criticality: Criticality::BestEffort,
                    status: StepStatus::Done,
                },
            ],
        };

        let rendered = render(&report).to_string();
        assert!(rendered.contains("Installing laravel/sanctum"));
        assert!(rendered.contains("best-effort"));
        assert!(rendered.contains("⚠ `docker compose exec` failed"));
        assert!(!rendered.contains("stderr: x"));
        assert!(rendered.contains("✓ done"));
    }
}
