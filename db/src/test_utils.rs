use std::sync::Arc;

use crate::memory::MemoryStore;
use crate::models::{
    AgTestCase, AgTestSuite, CompiledProgram, Project, Submission, SubmissionGroup,
    SubmissionStatus, TestCaseBase, TestCaseKind,
};

pub const TEST_PROJECT_ID: i64 = 1;
pub const TEST_GROUP_ID: i64 = 1;

/// An empty store holding one project (id 1) and one group (id 1) with no
/// deadline.
pub async fn setup_test_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store
        .insert_project(Project {
            id: TEST_PROJECT_ID,
            name: "test project".into(),
            closing_time: None,
            project_files: Vec::new(),
        })
        .await;
    store
        .insert_group(SubmissionGroup {
            id: TEST_GROUP_ID,
            project_id: TEST_PROJECT_ID,
            members: vec!["student".into()],
            extended_due_date: None,
            submission_ids: Vec::new(),
        })
        .await;
    Arc::new(store)
}

/// Adds a submission of `files` to the test group in `status`.
pub async fn add_submission(
    store: &MemoryStore,
    id: i64,
    files: &[&str],
    status: SubmissionStatus,
) -> Submission {
    let mut submission = Submission::new(
        id,
        TEST_GROUP_ID,
        files.iter().map(|f| f.to_string()).collect(),
    );
    submission.status = status;
    store.insert_submission(submission.clone()).await;
    submission
}

/// A compile-and-run case building every submitted `.cpp` file.
pub fn compiled_case(id: i64, suite_id: i64, name: &str) -> AgTestCase {
    let mut base = TestCaseBase::new(name);
    base.expected_return_code = Some(0);
    base.points_for_correct_return_code = 1;
    AgTestCase {
        id,
        suite_id,
        base,
        kind: TestCaseKind::CompiledAndRun(CompiledProgram {
            compiler: Default::default(),
            compiler_flags: Vec::new(),
            project_files_to_compile_together: Vec::new(),
            student_files_to_compile_together: vec!["*.cpp".into()],
            executable_name: "prog".into(),
        }),
    }
}

pub fn suite(id: i64, name: &str, deferred: bool, test_cases: Vec<AgTestCase>) -> AgTestSuite {
    AgTestSuite {
        id,
        project_id: TEST_PROJECT_ID,
        name: name.into(),
        deferred,
        test_cases,
    }
}
