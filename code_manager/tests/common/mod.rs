#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use code_manager::{Grader, GradingManager, ManagerSettings, RetryPolicy};
use code_runner::sandbox::scripted::{ScriptedCall, ScriptedSandbox, ScriptedSandboxFactory};
use code_runner::{CommandRequest, CompletedCommand, Executor, Sandbox, SandboxError, SandboxFactory};
use db::MemoryStore;
use db::models::SubmissionStatus;
use db::test_utils::{TEST_GROUP_ID, TEST_PROJECT_ID, add_submission, setup_test_store};
use tempfile::TempDir;
use util::paths::StorageLayout;
use util::test_helpers::{setup_test_storage_root, write_files};

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub layout: StorageLayout,
    _root: TempDir,
}

pub async fn harness() -> Harness {
    let (root, layout) = setup_test_storage_root();
    std::fs::create_dir_all(layout.project_files_dir(TEST_PROJECT_ID)).unwrap();
    Harness {
        store: setup_test_store().await,
        layout,
        _root: root,
    }
}

impl Harness {
    /// Adds submission `id` holding one `impl.cpp`, on disk and in the store.
    pub async fn submit(&self, id: i64, status: SubmissionStatus) {
        write_files(
            &self.layout.submission_dir(TEST_PROJECT_ID, TEST_GROUP_ID, id),
            &[("impl.cpp", "int f() { return 1; }")],
        );
        add_submission(&self.store, id, &["impl.cpp"], status).await;
    }

    pub fn settings(&self, num_workers: usize) -> ManagerSettings {
        ManagerSettings {
            num_workers,
            queue_interval: Duration::from_secs(3600),
            retry: RetryPolicy::immediate(2),
            layout: self.layout.clone(),
            max_output_length: 10_000,
        }
    }

    pub fn grader(&self, retry: RetryPolicy) -> Grader {
        Grader::new(
            self.store.clone(),
            Executor::new(10_000),
            self.layout.clone(),
            retry,
        )
    }
}

pub fn always_passes(_: &ScriptedCall) -> Result<CompletedCommand, SandboxError> {
    Ok(CompletedCommand::exited(0, "ok", ""))
}

/// Tracks how many commands run at once, overall and per submission.
#[derive(Debug, Default)]
pub struct Gauge {
    running: AtomicUsize,
    max_running: AtomicUsize,
    per_submission: Mutex<HashMap<PathBuf, usize>>,
    max_per_submission: AtomicUsize,
}

impl Gauge {
    fn enter(&self, submission: Option<&Path>) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        if let Some(dir) = submission {
            let mut per = self.per_submission.lock().unwrap();
            let count = per.entry(dir.to_path_buf()).or_default();
            *count += 1;
            self.max_per_submission.fetch_max(*count, Ordering::SeqCst);
        }
    }

    fn leave(&self, submission: Option<&Path>) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        if let Some(dir) = submission {
            if let Some(count) = self.per_submission.lock().unwrap().get_mut(dir) {
                *count -= 1;
            }
        }
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub fn max_per_submission(&self) -> usize {
        self.max_per_submission.load(Ordering::SeqCst)
    }
}

/// A scripted sandbox whose commands take `delay` and report to a gauge.
pub struct SlowSandbox {
    inner: ScriptedSandbox,
    delay: Duration,
    gauge: Arc<Gauge>,
    submission_dir: Option<PathBuf>,
}

#[async_trait]
impl Sandbox for SlowSandbox {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn add_files(&mut self, files: &[PathBuf]) -> Result<(), SandboxError> {
        if let Some(dir) = files
            .iter()
            .filter_map(|f| f.parent())
            .find(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with("submission_"))
            })
        {
            self.submission_dir = Some(dir.to_path_buf());
        }
        self.inner.add_files(files).await
    }

    async fn add_and_rename_file(&mut self, file: &Path, dest_name: &str) -> Result<(), SandboxError> {
        self.inner.add_and_rename_file(file, dest_name).await
    }

    async fn run_command(&mut self, request: CommandRequest) -> Result<CompletedCommand, SandboxError> {
        let dir = self.submission_dir.clone();
        self.gauge.enter(dir.as_deref());
        tokio::time::sleep(self.delay).await;
        self.gauge.leave(dir.as_deref());
        self.inner.run_command(request).await
    }

    async fn reset(&mut self) -> Result<(), SandboxError> {
        self.submission_dir = None;
        self.inner.reset().await
    }
}

pub struct SlowSandboxFactory {
    pub delay: Duration,
    pub gauge: Arc<Gauge>,
}

impl SandboxFactory for SlowSandboxFactory {
    fn create(&self, name: String) -> Box<dyn Sandbox> {
        Box::new(SlowSandbox {
            inner: ScriptedSandboxFactory::new(always_passes).sandbox(name),
            delay: self.delay,
            gauge: Arc::clone(&self.gauge),
            submission_dir: None,
        })
    }
}

/// Runs the manager until the queue drains or `limit` passes.
pub async fn drain(manager: &GradingManager, limit: Duration) {
    tokio::time::timeout(limit, manager.wait_until_idle())
        .await
        .expect("grading did not finish in time");
}
