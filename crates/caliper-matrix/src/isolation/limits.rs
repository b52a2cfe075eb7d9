//! Translation of a [`ResourceConfig`] into hard container limits.

use crate::config::ResourceConfig;

const GIB: u64 = 1024 * 1024 * 1024;
const NANOS_PER_CPU: u64 = 1_000_000_000;

/// Kernel-enforced limits for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLimits {
    /// CPU quota in billionths of a CPU.
    pub nano_cpus: u64,
    /// Pinned core set, `0-(N-1)` or `0`.
    pub cpuset: String,
    pub memory_bytes: u64,
    /// Equal to `memory_bytes`, so no swap is available.
    pub memory_swap_bytes: u64,
}

impl ResourceLimits {
    pub fn for_config(config: &ResourceConfig) -> Self {
        let memory_bytes = u64::from(config.memory_gb) * GIB;
        Self {
            nano_cpus: u64::from(config.cpus) * NANOS_PER_CPU,
            cpuset: cpuset(config.cpus),
            memory_bytes,
            memory_swap_bytes: memory_bytes,
        }
    }

    /// Whole CPUs, as passed to `--cpus`.
    pub fn cpus(&self) -> u64 {
        self.nano_cpus / NANOS_PER_CPU
    }

    /// Flags for `docker create`.
    pub fn docker_args(&self) -> Vec<String> {
        vec![
            "--cpus".to_string(),
            self.cpus().to_string(),
            "--cpuset-cpus".to_string(),
            self.cpuset.clone(),
            "--memory".to_string(),
            format!("{}b", self.memory_bytes),
            "--memory-swap".to_string(),
            format!("{}b", self.memory_swap_bytes),
        ]
    }
}

fn cpuset(cpus: u32) -> String {
    if cpus <= 1 {
        "0".to_string()
    } else {
        format!("0-{}", cpus - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_cpu_pins_core_zero() {
        let limits = ResourceLimits::for_config(&ResourceConfig::new(1, 2));
        assert_eq!(limits.cpuset, "0");
        assert_eq!(limits.nano_cpus, 1_000_000_000);
    }

    #[test]
    fn test_memory_and_swap_match() {
        let limits = ResourceLimits::for_config(&ResourceConfig::new(4, 16));
        assert_eq!(limits.cpuset, "0-3");
        assert_eq!(limits.memory_bytes, 16 * 1024 * 1024 * 1024);
        assert_eq!(limits.memory_swap_bytes, limits.memory_bytes);
    }

    #[test]
    fn test_docker_args() {
        let args = ResourceLimits::for_config(&ResourceConfig::new(2, 1)).docker_args();
        assert_eq!(
            args,
            vec![
                "--cpus",
                "2",
                "--cpuset-cpus",
                "0-1",
                "--memory",
                "1073741824b",
                "--memory-swap",
                "1073741824b",
            ]
        );
    }
}
