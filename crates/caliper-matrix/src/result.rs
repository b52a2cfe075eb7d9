//! Per-configuration and whole-matrix results.

use std::time::Duration;

use caliper_core::Statistics;
use serde::{Deserialize, Serialize};

use crate::config::{MatrixConfig, ResourceConfig};

/// Outcome of the benchmark inside one resource envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResult {
    #[serde(rename = "config")]
    pub resources: ResourceConfig,

    pub success: bool,

    /// Failure reason, prefixed with the step that failed.
    pub error: Option<String>,

    pub total_runs: usize,
    pub success_runs: usize,
    pub success_rate: f64,

    /// Absent when no result document could be collected.
    pub statistics: Option<Statistics>,

    /// Wall time of the whole configuration, setup and teardown included.
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ConfigResult {
    /// A configuration that never produced a benchmark outcome.
    pub fn failed(resources: ResourceConfig, total_runs: usize, reason: impl Into<String>) -> Self {
        Self {
            resources,
            success: false,
            error: Some(reason.into()),
            total_runs,
            success_runs: 0,
            success_rate: 0.0,
            statistics: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Succeeded and every measured run succeeded.
    pub fn fully_successful(&self) -> bool {
        self.success && self.success_runs == self.total_runs
    }
}

/// Ordered results of one matrix invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixResult {
    pub config: MatrixConfig,
    /// One entry per input configuration, in input order.
    pub results: Vec<ConfigResult>,
    /// An interrupt stopped the matrix early.
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl MatrixResult {
    pub fn successful(&self) -> impl Iterator<Item = &ConfigResult> {
        self.results.iter().filter(|r| r.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ConfigResult> {
        self.results.iter().filter(|r| !r.success)
    }

    /// True only when every configuration and every run succeeded.
    pub fn all_succeeded(&self) -> bool {
        !self.cancelled && self.results.iter().all(ConfigResult::fully_successful)
    }
}

/// `config` section of the matrix summary JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixConfigDocument {
    pub image: String,
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    pub command: String,
    pub runs: usize,
    pub output_dir: String,
    pub name: String,
    pub skip_warmup: bool,
}

/// `<repo>_<kind>_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixDocument {
    pub config: MatrixConfigDocument,
    pub results: Vec<ConfigResult>,
}

impl MatrixDocument {
    pub fn from_result(result: &MatrixResult) -> Self {
        let c = &result.config;
        Self {
            config: MatrixConfigDocument {
                image: c.image.clone(),
                repo_url: c.repo_url.clone(),
                command: c.command.clone(),
                runs: c.runs,
                output_dir: c.output_dir.display().to_string(),
                name: c.name.clone(),
                skip_warmup: c.skip_warmup,
            },
            results: result.results.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatrixKind;

    fn result_with(results: Vec<ConfigResult>) -> MatrixResult {
        MatrixResult {
            config: MatrixConfig::new(
                MatrixKind::Custom,
                "rust:latest",
                "https://example.com/x.git",
                "make",
                results.iter().map(|r| r.resources).collect(),
            ),
            results,
            cancelled: false,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_json_keys() {
        let ok = ConfigResult {
            resources: ResourceConfig::new(2, 8),
            success: true,
            error: None,
            total_runs: 3,
            success_runs: 3,
            success_rate: 100.0,
            statistics: Some(Statistics::default()),
            elapsed: Duration::from_secs(5),
        };
        let doc = MatrixDocument::from_result(&result_with(vec![ok]));
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["config"]["repoURL"], "https://example.com/x.git");
        assert_eq!(value["config"]["skipWarmup"], false);
        assert!(value["config"].get("outputDir").is_some());
        let first = &value["results"][0];
        assert_eq!(first["config"]["cpus"], 2);
        assert_eq!(first["config"]["memory"], 8);
        assert_eq!(first["totalRuns"], 3);
        assert_eq!(first["successRuns"], 3);
        assert_eq!(first["successRate"], 100.0);
        assert!(first["statistics"].get("stdDev").is_some());
        assert!(first.get("elapsed").is_none());
    }

    #[test]
    fn test_partial_runs_are_not_full_success() {
        let mut partial = ConfigResult::failed(ResourceConfig::new(1, 1), 3, "x");
        partial.success = true;
        partial.error = None;
        partial.success_runs = 2;
        let result = result_with(vec![partial]);
        assert_eq!(result.successful().count(), 1);
        assert!(!result.all_succeeded());
    }

    #[test]
    fn test_cancelled_is_never_success() {
        let mut result = result_with(vec![]);
        result.cancelled = true;
        assert!(!result.all_succeeded());
    }
}
