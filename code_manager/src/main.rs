//main.rs
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use code_manager::{GradingManager, ManagerSettings};
use code_runner::sandbox::docker::DockerSandboxFactory;
use db::{GradingStore, MemoryStore, StoreSnapshot};
use marker::{FeedbackContext, Viewer, build_submission_report};
use util::config::AppConfig;

#[derive(Parser, Debug)]
#[command(version, about = "Grades queued submissions against a store snapshot")]
struct Args {
    /// Store snapshot to load. A missing file starts an empty store
    #[arg(env = "GRADER_SNAPSHOT", default_value = "grader_snapshot.json")]
    snapshot: PathBuf,
    /// Where the final store snapshot is written
    #[arg(env = "GRADER_OUTPUT", default_value = "grader_output.json")]
    output: PathBuf,
    /// Queue every received submission and exit once the queue is empty
    #[arg(long)]
    drain: bool,
}

#[tokio::main]
async fn main() {
    let (log_file, log_level, log_to_stdout) = {
        let config = AppConfig::global();
        (
            config.log_file.clone(),
            config.log_level.clone(),
            config.log_to_stdout,
        )
    };
    let _log_guard = common::logger::init_logging(&log_file, &log_level, log_to_stdout);

    if let Err(err) = run(Args::parse()).await {
        tracing::error!(error = %err, "grader exited with an error");
        eprintln!("grader: {err}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let snapshot: StoreSnapshot = if args.snapshot.is_file() {
        serde_json::from_str(&fs::read_to_string(&args.snapshot)?)?
    } else {
        tracing::warn!(path = %args.snapshot.display(), "no snapshot found, starting empty");
        StoreSnapshot::default()
    };
    let store = Arc::new(MemoryStore::from_snapshot(snapshot));

    let manager = GradingManager::new(
        store.clone(),
        Arc::new(DockerSandboxFactory),
        ManagerSettings::from_config(),
    );
    let handles = manager.start();

    if args.drain {
        manager.queue_submissions().await?;
        tokio::select! {
            _ = manager.wait_until_idle() => tracing::info!("all work drained"),
            _ = tokio::signal::ctrl_c() => tracing::info!("interrupted while draining"),
        }
    } else {
        tokio::signal::ctrl_c().await?;
        tracing::info!("shutdown requested");
    }

    manager.shutdown();
    futures::future::join_all(handles).await;

    log_report_totals(store.as_ref()).await;

    let snapshot = store.snapshot().await;
    fs::write(&args.output, serde_json::to_string_pretty(&snapshot)?)?;
    tracing::info!(path = %args.output.display(), "store snapshot written");
    Ok(())
}

/// Logs each submission's score with every result shown.
async fn log_report_totals(store: &MemoryStore) {
    let snapshot = store.snapshot().await;
    for submission in &snapshot.submissions {
        let Ok(group) = store.group(submission.group_id).await else {
            continue;
        };
        let (Ok(project), Ok(ag_suites), Ok(student_suites)) = (
            store.project(group.project_id).await,
            store.ag_test_suites(group.project_id).await,
            store.student_test_suites(group.project_id).await,
        ) else {
            continue;
        };
        let (Ok(results), Ok(student_results)) = (
            store.submission_test_case_results(submission.id).await,
            store.submission_student_suite_results(submission.id).await,
        ) else {
            continue;
        };

        let ctx = FeedbackContext::new(Utc::now(), Viewer::Staff, submission.id, &group, &project)
            .with_max_feedback();
        match build_submission_report(&ctx, &ag_suites, &student_suites, &results, &student_results) {
            Ok(report) => tracing::info!(
                submission_id = submission.id,
                status = %submission.status,
                awarded = report.total_points_awarded,
                possible = report.total_points_possible,
                "submission report"
            ),
            Err(err) => {
                tracing::warn!(submission_id = submission.id, error = %err, "could not build report")
            }
        }
    }
}
