//! ASCII bar charts of mean build time.

use caliper_core::format_duration;

use crate::config::{MatrixKind, ResourceConfig};
use crate::result::{ConfigResult, MatrixResult};

/// Width of the longest bar.
pub const BAR_WIDTH: usize = 50;

/// One labelled bar; `None` marks a configuration without timing data.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub seconds: Option<f64>,
}

/// Render a horizontal bar chart. Bars are scaled against the largest
/// value; any non-zero value gets at least one column.
pub fn bar_chart(title: &str, bars: &[Bar]) -> String {
    let mut out = String::new();
    out.push_str(title);
    out.push('\n');
    out.push_str(&"=".repeat(title.chars().count()));
    out.push('\n');

    if bars.is_empty() {
        out.push_str("(no data)\n");
        return out;
    }

    let label_width = bars.iter().map(|b| b.label.chars().count()).max().unwrap_or(0);
    let max = bars
        .iter()
        .filter_map(|b| b.seconds)
        .fold(0.0_f64, f64::max);

    for bar in bars {
        match bar.seconds {
            Some(secs) => {
                let width = if max > 0.0 {
                    ((secs / max) * BAR_WIDTH as f64).round() as usize
                } else {
                    0
                };
                out.push_str(&format!(
                    "{:<w$} | {} {}\n",
                    bar.label,
                    "█".repeat(width.max(1)),
                    format_duration(secs),
                    w = label_width
                ));
            }
            None => out.push_str(&format!("{:<w$} | (failed)\n", bar.label, w = label_width)),
        }
    }
    out
}

fn mean_of(result: &ConfigResult) -> Option<f64> {
    result
        .statistics
        .filter(|s| result.success && s.n > 0)
        .map(|s| s.mean)
}

fn cpu_label(cpus: u32) -> String {
    if cpus == 1 {
        "1 CPU".to_string()
    } else {
        format!("{} CPUs", cpus)
    }
}

fn bars_by<F, L>(results: &[ConfigResult], keep: F, label: L) -> Vec<Bar>
where
    F: Fn(&ResourceConfig) -> bool,
    L: Fn(&ResourceConfig) -> String,
{
    results
        .iter()
        .filter(|r| keep(&r.resources))
        .map(|r| Bar {
            label: label(&r.resources),
            seconds: mean_of(r),
        })
        .collect()
}

fn unique(values: impl Iterator<Item = u32>) -> Vec<u32> {
    let mut seen = Vec::new();
    for v in values {
        if !seen.contains(&v) {
            seen.push(v);
        }
    }
    seen
}

fn cpu_chart(results: &[ConfigResult], ram: u32) -> String {
    bar_chart(
        &format!("Build Time vs CPU ({} GB RAM)", ram),
        &bars_by(results, |c| c.memory_gb == ram, |c| cpu_label(c.cpus)),
    )
}

fn ram_chart(results: &[ConfigResult], cpus: u32) -> String {
    bar_chart(
        &format!("Build Time vs RAM ({})", cpu_label(cpus)),
        &bars_by(results, |c| c.cpus == cpus, |c| format!("{} GB", c.memory_gb)),
    )
}

/// Charts appropriate to the matrix kind.
pub fn charts_for(result: &MatrixResult) -> Vec<String> {
    let config = &result.config;
    let results = &result.results;
    let first = config.configs.first().copied();

    match config.kind {
        MatrixKind::SweepCpu => {
            let ram = config.fixed_ram.or(first.map(|c| c.memory_gb)).unwrap_or(0);
            vec![cpu_chart(results, ram)]
        }
        MatrixKind::SweepRam => {
            let cpus = config.fixed_cpu.or(first.map(|c| c.cpus)).unwrap_or(0);
            vec![ram_chart(results, cpus)]
        }
        MatrixKind::All => {
            let rams = if config.ram_list.is_empty() {
                unique(config.configs.iter().map(|c| c.memory_gb))
            } else {
                config.ram_list.clone()
            };
            let cpus = if config.cpu_list.is_empty() {
                unique(config.configs.iter().map(|c| c.cpus))
            } else {
                config.cpu_list.clone()
            };
            rams.iter()
                .map(|&ram| cpu_chart(results, ram))
                .chain(cpus.iter().map(|&c| ram_chart(results, c)))
                .collect()
        }
        MatrixKind::Custom => vec![bar_chart(
            "Build Time vs Configuration",
            &bars_by(results, |_| true, ResourceConfig::label),
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{grid, MatrixConfig};
    use caliper_core::Statistics;
    use std::time::Duration;

    fn ok(cpus: u32, memory_gb: u32, mean: f64) -> ConfigResult {
        ConfigResult {
            resources: ResourceConfig::new(cpus, memory_gb),
            success: true,
            error: None,
            total_runs: 1,
            success_runs: 1,
            success_rate: 100.0,
            statistics: Some(Statistics {
                n: 1,
                mean,
                ..Default::default()
            }),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_longest_bar_is_full_width_and_minimum_one() {
        let chart = bar_chart(
            "t",
            &[
                Bar {
                    label: "a".to_string(),
                    seconds: Some(100.0),
                },
                Bar {
                    label: "b".to_string(),
                    seconds: Some(0.1),
                },
            ],
        );
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines[2].matches('█').count(), BAR_WIDTH);
        assert_eq!(lines[3].matches('█').count(), 1);
    }

    #[test]
    fn test_failed_bar_has_no_blocks() {
        let chart = bar_chart(
            "t",
            &[Bar {
                label: "x".to_string(),
                seconds: None,
            }],
        );
        assert!(chart.contains("x | (failed)"));
    }

    #[test]
    fn test_all_kind_draws_chart_per_axis_value() {
        let configs = grid(&[1, 2], &[4, 8]);
        let mut config = MatrixConfig::new(MatrixKind::All, "img", "repo", "make", configs.clone());
        config.cpu_list = vec![1, 2];
        config.ram_list = vec![4, 8];
        let result = MatrixResult {
            config,
            results: configs
                .iter()
                .map(|c| ok(c.cpus, c.memory_gb, 10.0 / c.cpus as f64))
                .collect(),
            cancelled: false,
            elapsed: Duration::ZERO,
        };

        let charts = charts_for(&result);
        assert_eq!(charts.len(), 4);
        assert!(charts[0].starts_with("Build Time vs CPU (4 GB RAM)"));
        assert!(charts[1].starts_with("Build Time vs CPU (8 GB RAM)"));
        assert!(charts[2].starts_with("Build Time vs RAM (1 CPU)"));
        assert!(charts[3].starts_with("Build Time vs RAM (2 CPUs)"));
    }

    #[test]
    fn test_custom_kind_single_chart() {
        let configs = vec![ResourceConfig::new(2, 8)];
        let result = MatrixResult {
            config: MatrixConfig::new(MatrixKind::Custom, "img", "repo", "make", configs),
            results: vec![ok(2, 8, 3.0)],
            cancelled: false,
            elapsed: Duration::ZERO,
        };
        let charts = charts_for(&result);
        assert_eq!(charts.len(), 1);
        assert!(charts[0].contains("2 CPU, 8 GB | "));
    }
}
