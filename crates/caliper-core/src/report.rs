//! Persisted benchmark artifacts and console summary.
//!
//! The JSON document shape is a compatibility contract: the matrix
//! orchestrator parses it back out of each container.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::{format_duration, format_duration_detailed};
use crate::runner::BenchmarkOutcome;
use crate::stats::Statistics;

/// `config` section of the JSON artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    pub command: String,
    pub runs: usize,
    pub name: String,
    pub output_dir: String,
}

/// `summary` section of the JSON artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDocument {
    pub total_runs: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Seconds.
    pub total_duration: f64,
}

/// One entry of the `runs` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDocument {
    pub run_number: usize,
    /// Seconds.
    pub duration: f64,
    pub success: bool,
    pub error: Option<String>,
}

/// Canonical `<name>.json` artifact for one benchmark invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDocument {
    #[serde(default)]
    pub config: ConfigDocument,
    pub summary: SummaryDocument,
    pub statistics: Statistics,
    #[serde(default)]
    pub runs: Vec<RunDocument>,
}

impl OutcomeDocument {
    pub fn from_outcome(outcome: &BenchmarkOutcome) -> Self {
        let successful = outcome.successful_runs();
        Self {
            config: ConfigDocument {
                command: outcome.config.command.clone(),
                runs: outcome.config.runs,
                name: outcome.config.name.clone(),
                output_dir: outcome.config.output_dir.display().to_string(),
            },
            summary: SummaryDocument {
                total_runs: outcome.config.runs,
                successful,
                failed: outcome.config.runs - successful,
                success_rate: outcome.success_rate,
                start_time: outcome.start_time,
                end_time: outcome.end_time,
                total_duration: outcome.total_duration.as_secs_f64(),
            },
            statistics: outcome.statistics,
            runs: outcome
                .runs
                .iter()
                .map(|r| RunDocument {
                    run_number: r.run_number,
                    duration: r.seconds(),
                    success: r.success,
                    error: r.error.clone(),
                })
                .collect(),
        }
    }
}

/// Write `<name>.json` in pretty JSON format.
pub fn save_json(outcome: &BenchmarkOutcome, path: &Path) -> Result<()> {
    let doc = OutcomeDocument::from_outcome(outcome);
    let content = serde_json::to_string_pretty(&doc).context("serialize benchmark outcome")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Per-run rows followed by a summary statistics block.
pub fn render_csv(outcome: &BenchmarkOutcome) -> String {
    let mut out = String::from("Run,Success,Duration (seconds),Error\n");
    for run in &outcome.runs {
        out.push_str(&format!(
            "{},{},{:.6},{}\n",
            run.run_number,
            run.success,
            run.seconds(),
            csv_field(run.error.as_deref().unwrap_or(""))
        ));
    }

    let s = &outcome.statistics;
    out.push('\n');
    out.push_str("Summary Statistics\n");
    out.push_str("Metric,Value\n");
    out.push_str(&format!("N,{}\n", s.n));
    for (label, value) in [
        ("Mean", s.mean),
        ("Median", s.median),
        ("Std Dev", s.std_dev),
        ("Min", s.min),
        ("Max", s.max),
        ("P90", s.p90),
        ("P95", s.p95),
    ] {
        out.push_str(&format!("{} (seconds),{:.6}\n", label, value));
    }
    out.push_str(&format!("Success Rate (%),{:.1}\n", outcome.success_rate));
    out
}

/// Write `<name>.csv`.
pub fn save_csv(outcome: &BenchmarkOutcome, path: &Path) -> Result<()> {
    std::fs::write(path, render_csv(outcome)).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Render the Markdown report.
pub fn render_markdown(outcome: &BenchmarkOutcome) -> String {
    let s = &outcome.statistics;
    let mut md = String::new();

    md.push_str("# Benchmark Report\n\n");
    md.push_str(&format!("**Generated:** {}\n\n", outcome.end_time.to_rfc2822()));

    md.push_str("## Configuration\n\n");
    md.push_str(&format!("- **Command:** `{}`\n", outcome.config.command));
    md.push_str(&format!("- **Benchmark Name:** {}\n", outcome.config.name));
    md.push_str(&format!("- **Total Runs:** {}\n", outcome.config.runs));
    md.push_str(&format!("- **Start Time:** {}\n", outcome.start_time.to_rfc2822()));
    md.push_str(&format!("- **End Time:** {}\n", outcome.end_time.to_rfc2822()));
    md.push_str(&format!(
        "- **Total Duration:** {}\n\n",
        format_duration(outcome.total_duration.as_secs_f64())
    ));

    md.push_str("## Summary\n\n");
    md.push_str(&format!("- **Successful Runs:** {}\n", outcome.successful_runs()));
    md.push_str(&format!("- **Failed Runs:** {}\n", outcome.failed_runs()));
    md.push_str(&format!("- **Success Rate:** {:.1}%\n\n", outcome.success_rate));

    if s.n > 0 {
        md.push_str("## Statistics\n\n");
        md.push_str("Statistics calculated from successful runs only:\n\n");
        md.push_str("| Metric | Value |\n");
        md.push_str("|--------|-------|\n");
        md.push_str(&format!("| N | {} |\n", s.n));
        for (label, value) in statistic_rows(s) {
            md.push_str(&format!("| {} | {} |\n", label, format_duration_detailed(value)));
        }
        md.push('\n');
    }

    md.push_str("## Individual Runs\n\n");
    md.push_str("| Run | Status | Duration | Error |\n");
    md.push_str("|-----|--------|----------|-------|\n");
    for run in &outcome.runs {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            run.run_number,
            if run.success { "✓" } else { "✗" },
            format_duration(run.seconds()),
            run.error.as_deref().unwrap_or("")
        ));
    }
    md
}

/// Write `<name>.md`.
pub fn save_markdown(outcome: &BenchmarkOutcome, path: &Path) -> Result<()> {
    std::fs::write(path, render_markdown(outcome)).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Print the results summary and statistics table to stdout.
pub fn print_console(outcome: &BenchmarkOutcome) {
    let s = &outcome.statistics;
    println!();
    println!("Benchmark Results");
    println!("=================\n");
    println!("Command:        {}", outcome.config.command);
    println!("Total Runs:     {}", outcome.config.runs);
    println!("Successful:     {}", outcome.successful_runs());
    println!("Failed:         {}", outcome.failed_runs());
    println!("Success Rate:   {:.1}%", outcome.success_rate);
    println!(
        "Total Duration: {}\n",
        format_duration(outcome.total_duration.as_secs_f64())
    );

    if s.n == 0 {
        println!("No successful runs to calculate statistics.");
        return;
    }

    println!("Statistics (successful runs only)");
    println!("---------------------------------\n");
    println!("{:<8}  {}", "Metric", "Value");
    println!("{:<8}  {}", "------", "-----");
    println!("{:<8}  {}", "N", s.n);
    for (label, value) in statistic_rows(s) {
        println!("{:<8}  {}", label, format_duration_detailed(value));
    }
}

fn statistic_rows(s: &Statistics) -> [(&'static str, f64); 7] {
    [
        ("Mean", s.mean),
        ("Median", s.median),
        ("Std Dev", s.std_dev),
        ("Min", s.min),
        ("Max", s.max),
        ("P90", s.p90),
        ("P95", s.p95),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{BenchmarkConfig, RunRecord};
    use crate::stats::calculate_statistics;
    use std::time::Duration;

    fn sample_outcome() -> BenchmarkOutcome {
        let runs = vec![
            RunRecord {
                run_number: 1,
                duration: Duration::from_millis(1500),
                success: true,
                error: None,
            },
            RunRecord {
                run_number: 2,
                duration: Duration::from_millis(200),
                success: false,
                error: Some("exit status 1: a, b".to_string()),
            },
        ];
        let mut config = BenchmarkConfig::new("cargo build", 2);
        config.name = "sample".to_string();
        BenchmarkOutcome {
            config,
            warmup: None,
            runs,
            statistics: calculate_statistics(&[1.5]),
            success_rate: 50.0,
            start_time: DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            end_time: DateTime::parse_from_rfc3339("2026-01-01T00:00:02Z")
                .unwrap()
                .with_timezone(&Utc),
            total_duration: Duration::from_secs(2),
        }
    }

    #[test]
    fn json_document_has_normative_keys() {
        let doc = OutcomeDocument::from_outcome(&sample_outcome());
        let value = serde_json::to_value(&doc).unwrap();

        for key in ["command", "runs", "name", "outputDir"] {
            assert!(value["config"].get(key).is_some(), "config.{key}");
        }
        for key in [
            "totalRuns",
            "successful",
            "failed",
            "successRate",
            "startTime",
            "endTime",
            "totalDuration",
        ] {
            assert!(value["summary"].get(key).is_some(), "summary.{key}");
        }
        for key in ["n", "mean", "median", "stdDev", "min", "max", "p90", "p95"] {
            assert!(value["statistics"].get(key).is_some(), "statistics.{key}");
        }
        for key in ["runNumber", "duration", "success", "error"] {
            assert!(value["runs"][0].get(key).is_some(), "runs[0].{key}");
        }
        assert_eq!(value["summary"]["failed"], 1);
        assert_eq!(value["runs"][0]["duration"], 1.5);
    }

    #[test]
    fn json_document_parses_without_optional_sections() {
        let raw = r#"{
            "summary": {"totalRuns": 3, "successful": 2, "failed": 1, "successRate": 66.7,
                        "startTime": "2026-01-01T00:00:00Z", "endTime": "2026-01-01T00:01:00Z",
                        "totalDuration": 60.0},
            "statistics": {"n": 2, "mean": 1.0, "median": 1.0, "stdDev": 0.0,
                           "min": 1.0, "max": 1.0, "p90": 1.0, "p95": 1.0}
        }"#;
        let doc: OutcomeDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.summary.successful, 2);
        assert_eq!(doc.statistics.n, 2);
        assert!(doc.runs.is_empty());
    }

    #[test]
    fn csv_quotes_errors_with_commas() {
        let csv = render_csv(&sample_outcome());
        assert!(csv.starts_with("Run,Success,Duration (seconds),Error\n"));
        assert!(csv.contains("2,false,0.200000,\"exit status 1: a, b\""));
        assert!(csv.contains("Success Rate (%),50.0"));
    }

    #[test]
    fn markdown_marks_run_status() {
        let md = render_markdown(&sample_outcome());
        assert!(md.contains("| 1 | ✓ |"));
        assert!(md.contains("| 2 | ✗ |"));
        assert!(md.contains("## Statistics"));
    }

    #[test]
    fn save_writes_all_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = sample_outcome();
        save_json(&outcome, &dir.path().join("sample.json")).unwrap();
        save_csv(&outcome, &dir.path().join("sample.csv")).unwrap();
        save_markdown(&outcome, &dir.path().join("sample.md")).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("sample.json")).unwrap();
        let doc: OutcomeDocument = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc.config.name, "sample");
        assert!(dir.path().join("sample.csv").exists());
        assert!(dir.path().join("sample.md").exists());
    }
}
