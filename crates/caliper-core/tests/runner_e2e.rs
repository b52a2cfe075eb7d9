//! End-to-end runner behavior against a clock-controlled executor.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use caliper_core::{
    BenchmarkConfig, BenchmarkRunner, ExecError, ExecOutput, HostShell, ShellExecutor,
};

/// Sleeps a scripted duration per call, then exits with a scripted code.
struct Sleeper {
    script: Mutex<Vec<(u64, i32)>>,
}

impl Sleeper {
    fn new(script: &[(u64, i32)]) -> Self {
        Self {
            script: Mutex::new(script.iter().rev().copied().collect()),
        }
    }
}

#[async_trait]
impl ShellExecutor for Sleeper {
    async fn run_shell(&self, _command: &str, _mirror: bool) -> Result<ExecOutput, ExecError> {
        let (secs, code) = self.script.lock().unwrap().pop().unwrap_or((0, 0));
        tokio::time::sleep(Duration::from_secs(secs)).await;
        Ok(ExecOutput {
            exit_code: code,
            stderr: if code == 0 { String::new() } else { "boom".to_string() },
            ..Default::default()
        })
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-3
}

#[tokio::test(start_paused = true)]
async fn timings_feed_statistics() {
    let exec = Sleeper::new(&[(9, 0), (1, 0), (2, 0), (3, 0)]);
    let config = BenchmarkConfig::new("cargo build", 3);

    let outcome = BenchmarkRunner::new(&exec).run(&config).await.unwrap();

    let warmup = outcome.warmup.as_ref().unwrap();
    assert_eq!(warmup.run_number, 0);
    assert!(approx(warmup.seconds(), 9.0));

    let s = outcome.statistics;
    assert_eq!(s.n, 3);
    assert!(approx(s.mean, 2.0));
    assert!(approx(s.median, 2.0));
    assert!((s.std_dev - 0.8165).abs() < 1e-3);
    assert!(approx(s.min, 1.0));
    assert!(approx(s.max, 3.0));
    assert_eq!(outcome.success_rate, 100.0);
    assert!(outcome.all_succeeded());
}

#[tokio::test(start_paused = true)]
async fn failed_run_is_recorded_and_loop_continues() {
    let exec = Sleeper::new(&[(1, 0), (5, 1), (3, 0)]);
    let mut config = BenchmarkConfig::new("flaky", 3);
    config.skip_warmup = true;

    let outcome = BenchmarkRunner::new(&exec).run(&config).await.unwrap();

    assert_eq!(outcome.runs.len(), 3);
    assert!(!outcome.runs[1].success);
    assert_eq!(outcome.runs[1].error.as_deref(), Some("exit status 1: boom"));
    assert!(outcome.runs[2].success);
    assert_eq!(outcome.statistics.n, 2);
    assert!(approx(outcome.statistics.mean, 2.0));
    assert!((outcome.success_rate - 66.666).abs() < 0.01);
}

#[cfg(unix)]
#[tokio::test]
async fn host_shell_runs_real_commands() {
    let exec = HostShell::new();
    let mut config = BenchmarkConfig::new("true && exit 0", 2);
    config.skip_warmup = true;

    let outcome = BenchmarkRunner::new(&exec).run(&config).await.unwrap();
    assert_eq!(outcome.successful_runs(), 2);
}
