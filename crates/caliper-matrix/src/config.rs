//! Resource configuration sets and the matrix invocation config.
//!
//! Everything here is pure and validated eagerly, before any environment
//! exists.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigSetError;

/// A CPU count and memory ceiling (GiB) for one isolated environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub cpus: u32,
    #[serde(rename = "memory")]
    pub memory_gb: u32,
}

impl ResourceConfig {
    pub fn new(cpus: u32, memory_gb: u32) -> Self {
        Self { cpus, memory_gb }
    }

    /// Human-readable label, e.g. `2 CPU, 8 GB`.
    pub fn label(&self) -> String {
        format!("{} CPU, {} GB", self.cpus, self.memory_gb)
    }

    /// Filesystem-safe label, e.g. `2cpu_8gb`.
    pub fn dir_name(&self) -> String {
        format!("{}cpu_{}gb", self.cpus, self.memory_gb)
    }
}

impl fmt::Display for ResourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

fn positive(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|v| *v > 0)
}

/// Parse `"2:8,4:16"` into resource configs.
pub fn parse_configs(input: &str) -> Result<Vec<ResourceConfig>, ConfigSetError> {
    if input.trim().is_empty() {
        return Err(ConfigSetError::MalformedConfig {
            entry: input.to_string(),
        });
    }

    input
        .split(',')
        .map(|pair| {
            let pair = pair.trim();
            let malformed = || ConfigSetError::MalformedConfig {
                entry: pair.to_string(),
            };
            let parts: Vec<&str> = pair.split(':').collect();
            if parts.len() != 2 {
                return Err(malformed());
            }
            let cpus = positive(parts[0]).ok_or_else(malformed)?;
            let memory_gb = positive(parts[1]).ok_or_else(malformed)?;
            Ok(ResourceConfig::new(cpus, memory_gb))
        })
        .collect()
}

/// Parse `"2,4,8"` into positive integers.
pub fn parse_int_list(input: &str) -> Result<Vec<u32>, ConfigSetError> {
    if input.trim().is_empty() {
        return Err(ConfigSetError::MalformedList {
            entry: input.to_string(),
        });
    }

    input
        .split(',')
        .map(|entry| {
            positive(entry).ok_or_else(|| ConfigSetError::MalformedList {
                entry: entry.trim().to_string(),
            })
        })
        .collect()
}

/// Vary CPU count at a fixed memory ceiling.
pub fn sweep_cpu(cpus: &[u32], fixed_ram: u32) -> Vec<ResourceConfig> {
    cpus.iter()
        .map(|&c| ResourceConfig::new(c, fixed_ram))
        .collect()
}

/// Vary memory ceiling at a fixed CPU count.
pub fn sweep_ram(rams: &[u32], fixed_cpu: u32) -> Vec<ResourceConfig> {
    rams.iter()
        .map(|&m| ResourceConfig::new(fixed_cpu, m))
        .collect()
}

/// Full cartesian product, CPU-major.
pub fn grid(cpus: &[u32], rams: &[u32]) -> Vec<ResourceConfig> {
    cpus.iter()
        .flat_map(|&c| rams.iter().map(move |&m| ResourceConfig::new(c, m)))
        .collect()
}

/// Which axis a matrix invocation varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatrixKind {
    Custom,
    SweepCpu,
    SweepRam,
    All,
}

impl MatrixKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatrixKind::Custom => "custom",
            MatrixKind::SweepCpu => "sweep-cpu",
            MatrixKind::SweepRam => "sweep-ram",
            MatrixKind::All => "all",
        }
    }

    /// Report heading for this kind.
    pub fn title(&self) -> &'static str {
        match self {
            MatrixKind::Custom => "Custom Configuration Matrix",
            MatrixKind::SweepCpu => "CPU Sweep",
            MatrixKind::SweepRam => "RAM Sweep",
            MatrixKind::All => "Full CPU x RAM Matrix",
        }
    }
}

impl fmt::Display for MatrixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable configuration of one matrix invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Container image with `git` and `bash`.
    pub image: String,

    /// Repository cloned into every environment.
    pub repo_url: String,

    /// Command benchmarked inside the cloned repository.
    pub command: String,

    /// Measured runs per configuration.
    pub runs: usize,

    /// Host directory receiving per-configuration results and summaries.
    pub output_dir: PathBuf,

    pub name: String,

    /// Envelopes to test, in execution order.
    pub configs: Vec<ResourceConfig>,

    pub skip_warmup: bool,
    pub debug: bool,

    pub kind: MatrixKind,

    /// Memory ceiling held constant by a CPU sweep.
    pub fixed_ram: Option<u32>,

    /// CPU count held constant by a RAM sweep.
    pub fixed_cpu: Option<u32>,

    /// Axis values as given, used for chart grouping.
    pub cpu_list: Vec<u32>,
    pub ram_list: Vec<u32>,
}

impl MatrixConfig {
    /// Config with no axis metadata; callers fill in the kind-specific fields.
    pub fn new(
        kind: MatrixKind,
        image: impl Into<String>,
        repo_url: impl Into<String>,
        command: impl Into<String>,
        configs: Vec<ResourceConfig>,
    ) -> Self {
        Self {
            image: image.into(),
            repo_url: repo_url.into(),
            command: command.into(),
            runs: 10,
            output_dir: PathBuf::from("./matrix-results"),
            name: caliper_core::default_name(kind.as_str()),
            configs,
            skip_warmup: false,
            debug: false,
            kind,
            fixed_ram: None,
            fixed_cpu: None,
            cpu_list: Vec::new(),
            ram_list: Vec::new(),
        }
    }

    /// Short repository name: last path segment without `.git`.
    pub fn repo_name(&self) -> String {
        repo_name(&self.repo_url)
    }

    /// Report name used by the nested benchmark for one envelope.
    pub fn nested_name(&self, resources: &ResourceConfig) -> String {
        format!("{}_{}", self.repo_name(), resources.dir_name())
    }

    /// Stem of the summary report files, `<repo>_<kind>_summary`.
    pub fn summary_stem(&self) -> String {
        format!("{}_{}_summary", self.repo_name(), self.kind)
    }

    pub fn validate(&self) -> Result<(), ConfigSetError> {
        if self.configs.is_empty() {
            return Err(ConfigSetError::Empty);
        }
        Ok(())
    }
}

/// Derive a short name from a clone URL. Falls back to `repo`.
pub fn repo_name(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default()
        .trim();
    if last.is_empty() {
        "repo".to_string()
    } else {
        last.to_string()
    }
}
