//! Matrix summary: console table, JSON, CSV, and Markdown.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use caliper_core::format_duration;
use caliper_core::report::csv_field;

use crate::chart::charts_for;
use crate::config::MatrixKind;
use crate::result::{ConfigResult, MatrixDocument, MatrixResult};

fn stat_cells(result: &ConfigResult) -> [String; 5] {
    match result.statistics.filter(|s| s.n > 0) {
        Some(s) => [s.mean, s.median, s.std_dev, s.min, s.max].map(format_duration),
        None => std::array::from_fn(|_| "-".to_string()),
    }
}

/// Print the results table and the list of failed configurations.
pub fn print_summary(result: &MatrixResult) {
    println!();
    println!("Matrix Results: {}", result.config.kind.title());
    println!("========================================\n");
    println!(
        "{:>4}  {:>5}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>8}",
        "CPUs", "RAM", "Mean", "Median", "StdDev", "Min", "Max", "Success"
    );
    println!("{}", "-".repeat(82));
    for r in &result.results {
        let [mean, median, std_dev, min, max] = stat_cells(r);
        let success = if r.success {
            format!("{:.0}%", r.success_rate)
        } else {
            "FAILED".to_string()
        };
        println!(
            "{:>4}  {:>5}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>8}",
            r.resources.cpus,
            format!("{}GB", r.resources.memory_gb),
            mean,
            median,
            std_dev,
            min,
            max,
            success
        );
    }

    let failed: Vec<&ConfigResult> = result.failed().collect();
    if !failed.is_empty() {
        println!("\nFailed configurations:");
        for r in failed {
            println!(
                "  ✗ {}: {}",
                r.resources.label(),
                r.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    if result.cancelled {
        println!("\nMatrix was interrupted before completion.");
    }
    println!(
        "\nTotal matrix time: {}",
        format_duration(result.elapsed.as_secs_f64())
    );
}

/// One row per configuration.
pub fn render_summary_csv(result: &MatrixResult) -> String {
    let mut out = String::from(
        "CPUs,Memory (GB),Success,Total Runs,Successful Runs,Success Rate (%),Mean (s),Median (s),Std Dev (s),Min (s),Max (s),P90 (s),P95 (s),Error\n",
    );
    for r in &result.results {
        let s = r.statistics.unwrap_or_default();
        out.push_str(&format!(
            "{},{},{},{},{},{:.1},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{}\n",
            r.resources.cpus,
            r.resources.memory_gb,
            r.success,
            r.total_runs,
            r.success_runs,
            r.success_rate,
            s.mean,
            s.median,
            s.std_dev,
            s.min,
            s.max,
            s.p90,
            s.p95,
            csv_field(r.error.as_deref().unwrap_or(""))
        ));
    }
    out
}

/// Full Markdown report including charts.
pub fn render_summary_markdown(result: &MatrixResult) -> String {
    let c = &result.config;
    let mut md = String::new();

    md.push_str(&format!("# Matrix Benchmark: {}\n\n", c.kind.title()));
    md.push_str("## Configuration\n\n");
    md.push_str(&format!("- **Image:** `{}`\n", c.image));
    md.push_str(&format!("- **Repository:** {}\n", c.repo_url));
    md.push_str(&format!("- **Command:** `{}`\n", c.command));
    md.push_str(&format!("- **Runs per configuration:** {}\n", c.runs));
    md.push_str(&format!("- **Warm-up:** {}\n", if c.skip_warmup { "skipped" } else { "enabled" }));
    match c.kind {
        MatrixKind::SweepCpu => {
            if let Some(ram) = c.fixed_ram {
                md.push_str(&format!("- **Fixed RAM:** {} GB\n", ram));
            }
        }
        MatrixKind::SweepRam => {
            if let Some(cpu) = c.fixed_cpu {
                md.push_str(&format!("- **Fixed CPUs:** {}\n", cpu));
            }
        }
        MatrixKind::All => {
            md.push_str(&format!("- **CPU values:** {:?}\n", c.cpu_list));
            md.push_str(&format!("- **RAM values (GB):** {:?}\n", c.ram_list));
        }
        MatrixKind::Custom => {}
    }
    md.push_str(&format!("- **Configurations:** {}\n\n", c.configs.len()));

    md.push_str("## Results\n\n");
    md.push_str("| CPUs | RAM | Mean | Median | Std Dev | Min | Max | Success |\n");
    md.push_str("|------|-----|------|--------|---------|-----|-----|---------|\n");
    for r in &result.results {
        let [mean, median, std_dev, min, max] = stat_cells(r);
        let success = if r.success {
            format!("{:.0}%", r.success_rate)
        } else {
            "✗".to_string()
        };
        md.push_str(&format!(
            "| {} | {} GB | {} | {} | {} | {} | {} | {} |\n",
            r.resources.cpus, r.resources.memory_gb, mean, median, std_dev, min, max, success
        ));
    }
    md.push('\n');

    md.push_str("## Details\n\n");
    for r in &result.results {
        md.push_str(&format!("### {}\n\n", r.resources.label()));
        md.push_str(&format!(
            "- **Status:** {}\n",
            if r.success { "✓ success" } else { "✗ failed" }
        ));
        md.push_str(&format!("- **Runs:** {}/{} successful\n", r.success_runs, r.total_runs));
        if let Some(s) = r.statistics.filter(|s| s.n > 0) {
            md.push_str(&format!(
                "- **P90 / P95:** {} / {}\n",
                format_duration(s.p90),
                format_duration(s.p95)
            ));
        }
        if let Some(err) = &r.error {
            md.push_str(&format!("- **Note:** {}\n", err));
        }
        md.push('\n');
    }

    let failed: Vec<&ConfigResult> = result.failed().collect();
    if !failed.is_empty() {
        md.push_str("## Failed Configurations\n\n");
        for r in failed {
            md.push_str(&format!(
                "- {}: {}\n",
                r.resources.label(),
                r.error.as_deref().unwrap_or("unknown error")
            ));
        }
        md.push('\n');
    }

    md.push_str("## Graphs\n\n");
    for chart in charts_for(result) {
        md.push_str("```\n");
        md.push_str(&chart);
        md.push_str("```\n\n");
    }
    md
}

/// Write `<repo>_<kind>_summary.{json,csv,md}` into `dir`.
pub fn save_summary(result: &MatrixResult, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {:?}", dir))?;
    let stem = result.config.summary_stem();

    let json_path = dir.join(format!("{}.json", stem));
    let json = serde_json::to_string_pretty(&MatrixDocument::from_result(result))
        .context("serialize matrix summary")?;
    std::fs::write(&json_path, json).with_context(|| format!("write {:?}", json_path))?;

    let csv_path = dir.join(format!("{}.csv", stem));
    std::fs::write(&csv_path, render_summary_csv(result))
        .with_context(|| format!("write {:?}", csv_path))?;

    let md_path = dir.join(format!("{}.md", stem));
    std::fs::write(&md_path, render_summary_markdown(result))
        .with_context(|| format!("write {:?}", md_path))?;

    Ok(vec![json_path, csv_path, md_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{sweep_cpu, MatrixConfig, ResourceConfig};
    use caliper_core::Statistics;
    use std::time::Duration;

    fn sample() -> MatrixResult {
        let configs = sweep_cpu(&[1, 2], 8);
        let mut config = MatrixConfig::new(
            MatrixKind::SweepCpu,
            "rust:latest",
            "https://github.com/org/widget.git",
            "cargo build",
            configs,
        );
        config.fixed_ram = Some(8);
        MatrixResult {
            config,
            results: vec![
                ConfigResult::failed(ResourceConfig::new(1, 8), 3, "repository clone failed: exit status 128"),
                ConfigResult {
                    resources: ResourceConfig::new(2, 8),
                    success: true,
                    error: None,
                    total_runs: 3,
                    success_runs: 3,
                    success_rate: 100.0,
                    statistics: Some(Statistics {
                        n: 3,
                        mean: 2.0,
                        median: 2.0,
                        std_dev: 0.5,
                        min: 1.5,
                        max: 2.5,
                        p90: 2.4,
                        p95: 2.45,
                    }),
                    elapsed: Duration::from_secs(10),
                },
            ],
            cancelled: false,
            elapsed: Duration::from_secs(20),
        }
    }

    #[test]
    fn test_csv_row_per_config() {
        let csv = render_summary_csv(&sample());
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.lines().nth(2).unwrap().starts_with("2,8,true,3,3,100.0,2.000000"));
    }

    #[test]
    fn test_markdown_sections() {
        let md = render_summary_markdown(&sample());
        assert!(md.contains("- **Fixed RAM:** 8 GB"));
        assert!(md.contains("## Failed Configurations"));
        assert!(md.contains("repository clone failed"));
        assert!(md.contains("Build Time vs CPU (8 GB RAM)"));
    }

    #[test]
    fn test_save_summary_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let paths = save_summary(&sample(), dir.path()).unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "widget_sweep-cpu_summary.json",
                "widget_sweep-cpu_summary.csv",
                "widget_sweep-cpu_summary.md",
            ]
        );
        let raw = std::fs::read_to_string(&paths[0]).unwrap();
        let doc: MatrixDocument = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc.results.len(), 2);
    }
}
