//! Nightly batch pipeline: sequential external scripts, fail-fast.
//!
//! Each step runs to completion before the next starts. A non-zero exit status
//! (or a step killed by a signal) aborts the run; nothing is retried. Captured
//! stdout/stderr is logged for every step and carried in the error of the step
//! that failed.

pub mod steps;

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

pub use steps::{plan, PipelineKind, PipelineSettings, PipelineStep};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to start step {step}: {source}")]
    Spawn {
        step: String,
        #[source]
        source: std::io::Error,
    },
    #[error("step {step} failed (exit code {})", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    StepFailed {
        step: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

/// What a finished process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl StepOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs a single step. Implemented by the real process launcher and by fakes
/// in tests.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, step: &PipelineStep) -> Result<StepOutput, PipelineError>;
}

/// Launches each step as `<interpreter> <script> <args...>`.
pub struct ProcessExecutor {
    interpreter: String,
    workdir: PathBuf,
}

impl ProcessExecutor {
    pub fn new(interpreter: impl Into<String>, workdir: PathBuf) -> Self {
        ProcessExecutor {
            interpreter: interpreter.into(),
            workdir,
        }
    }
}

#[async_trait]
impl StepExecutor for ProcessExecutor {
    async fn execute(&self, step: &PipelineStep) -> Result<StepOutput, PipelineError> {
        let output = tokio::process::Command::new(&self.interpreter)
            .arg(&step.script)
            .args(&step.args)
            .current_dir(&self.workdir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| PipelineError::Spawn {
                step: step.name.to_string(),
                source,
            })?;
        Ok(StepOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub name: &'static str,
    pub elapsed: Duration,
}

/// Steps that completed, in order.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub completed: Vec<StepRecord>,
}

/// Run `steps` in order, stopping at the first failure.
pub async fn run_pipeline(
    executor: &dyn StepExecutor,
    steps: &[PipelineStep],
) -> Result<PipelineReport, PipelineError> {
    let mut report = PipelineReport::default();

    for step in steps {
        info!("Running: {}", step.command_line());
        let started = Instant::now();
        let output = executor.execute(step).await?;
        let elapsed = started.elapsed();

        info!(
            "Step {} finished in {:.1}s, return code: {:?}",
            step.name,
            elapsed.as_secs_f64(),
            output.code
        );
        if !output.stdout.trim().is_empty() {
            info!("{} STDOUT:\n{}", step.name, output.stdout.trim_end());
        }
        if !output.stderr.trim().is_empty() {
            warn!("{} STDERR:\n{}", step.name, output.stderr.trim_end());
        }

        if !output.success() {
            error!(
                "Step {} failed; skipping {} remaining step(s)",
                step.name,
                steps.len() - report.completed.len() - 1
            );
            return Err(PipelineError::StepFailed {
                step: step.name.to_string(),
                code: output.code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        report.completed.push(StepRecord {
            name: step.name,
            elapsed,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every step it is asked to run and fails the named one.
    struct FakeExecutor {
        fail_on: Option<&'static str>,
        ran: Mutex<Vec<&'static str>>,
    }

    impl FakeExecutor {
        fn new(fail_on: Option<&'static str>) -> Self {
            FakeExecutor {
                fail_on,
                ran: Mutex::new(Vec::new()),
            }
        }

        fn ran(&self) -> Vec<&'static str> {
            self.ran.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StepExecutor for FakeExecutor {
        async fn execute(&self, step: &PipelineStep) -> Result<StepOutput, PipelineError> {
            self.ran.lock().unwrap().push(step.name);
            let failed = self.fail_on == Some(step.name);
            Ok(StepOutput {
                code: Some(if failed { 2 } else { 0 }),
                stdout: format!("{} done", step.name),
                stderr: if failed { "Traceback: boom".into() } else { String::new() },
            })
        }
    }

    fn settings() -> PipelineSettings {
        PipelineSettings::new(PathBuf::from("scripts"), 2025, None)
    }

    #[tokio::test]
    async fn all_steps_run_in_order() {
        let executor = FakeExecutor::new(None);
        let steps = plan(PipelineKind::Full, &settings());
        let report = run_pipeline(&executor, &steps).await.unwrap();
        assert_eq!(report.completed.len(), 6);
        assert_eq!(executor.ran(), steps.iter().map(|s| s.name).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn failure_stops_the_run() {
        let executor = FakeExecutor::new(Some("train-model"));
        let steps = plan(PipelineKind::Full, &settings());
        let err = run_pipeline(&executor, &steps).await.unwrap_err();

        assert_eq!(
            executor.ran(),
            vec!["fetch-history", "data-prep", "feature-engineering", "train-model"]
        );
        match err {
            PipelineError::StepFailed {
                step,
                code,
                stdout,
                stderr,
            } => {
                assert_eq!(step, "train-model");
                assert_eq!(code, Some(2));
                assert_eq!(stdout, "train-model done");
                assert!(stderr.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn signal_termination_counts_as_failure() {
        struct Killed;

        #[async_trait]
        impl StepExecutor for Killed {
            async fn execute(&self, _step: &PipelineStep) -> Result<StepOutput, PipelineError> {
                Ok(StepOutput {
                    code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                })
            }
        }

        let steps = plan(PipelineKind::Retrain, &settings());
        let err = run_pipeline(&Killed, &steps).await.unwrap_err();
        assert_eq!(err.to_string(), "step feature-engineering failed (exit code none)");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn real_process_output_is_captured_and_exit_code_gates() {
        let dir = tempfile::tempdir().unwrap();
        let failing = dir.path().join("failing.sh");
        std::fs::write(&failing, "echo out-line\necho err-line >&2\nexit 3\n").unwrap();
        let marker = dir.path().join("ran");
        let after = dir.path().join("after.sh");
        std::fs::write(&after, format!("touch {}\n", marker.display())).unwrap();

        let steps = vec![
            PipelineStep {
                name: "failing",
                script: failing,
                args: Vec::new(),
            },
            PipelineStep {
                name: "after",
                script: after,
                args: Vec::new(),
            },
        ];
        let executor = ProcessExecutor::new("sh", dir.path().to_path_buf());
        let err = run_pipeline(&executor, &steps).await.unwrap_err();

        match err {
            PipelineError::StepFailed {
                step,
                code,
                stdout,
                stderr,
            } => {
                assert_eq!(step, "failing");
                assert_eq!(code, Some(3));
                assert_eq!(stdout, "out-line\n");
                assert_eq!(stderr, "err-line\n");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn real_process_success_runs_every_step() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ok.sh");
        std::fs::write(&script, "echo \"$1\"\n").unwrap();
        let steps = vec![PipelineStep {
            name: "ok",
            script,
            args: vec!["hello".into()],
        }];
        let executor = ProcessExecutor::new("sh", dir.path().to_path_buf());
        let output = executor.execute(&steps[0]).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "hello\n");

        let report = run_pipeline(&executor, &steps).await.unwrap();
        assert_eq!(report.completed.len(), 1);
    }

    #[tokio::test]
    async fn missing_interpreter_is_a_spawn_error() {
        let executor = ProcessExecutor::new("definitely-not-a-real-interpreter", PathBuf::from("."));
        let steps = plan(PipelineKind::Retrain, &settings());
        let err = run_pipeline(&executor, &steps).await.unwrap_err();
        assert!(matches!(err, PipelineError::Spawn { ref step, .. } if step == "feature-engineering"));
    }
}
