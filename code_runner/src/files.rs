use globset::{Glob, GlobSetBuilder};
use std::path::{Path, PathBuf};
use util::paths::StorageLayout;

use db::ValidationError;
use db::models::{Project, Submission};

use crate::error::{ExecutionError, ExecutionResult};

/// Where the inputs of one grading run live on the host.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingFiles {
    pub project_files_dir: PathBuf,
    /// Names instructors uploaded to the project.
    pub project_files: Vec<String>,
    pub submission_dir: PathBuf,
    pub submitted_filenames: Vec<String>,
}

impl GradingFiles {
    pub fn for_submission(
        layout: &StorageLayout,
        project: &Project,
        submission: &Submission,
    ) -> Self {
        Self {
            project_files_dir: layout.project_files_dir(project.id),
            project_files: project.project_files.clone(),
            submission_dir: layout.submission_dir(project.id, submission.group_id, submission.id),
            submitted_filenames: submission.submitted_filenames.clone(),
        }
    }

    /// Host path of a project file, which must exist.
    pub fn project_file(&self, name: &str) -> ExecutionResult<PathBuf> {
        existing(self.project_files_dir.join(name))
    }

    pub fn project_file_paths(&self, names: &[String]) -> ExecutionResult<Vec<PathBuf>> {
        names.iter().map(|n| self.project_file(n)).collect()
    }

    /// Host path of a submitted file, which must exist.
    pub fn student_file(&self, name: &str) -> ExecutionResult<PathBuf> {
        existing(self.submission_dir.join(name))
    }

    /// Submitted filenames matching any of `patterns`, in submission order.
    ///
    /// `field` names the test field the patterns came from, for error
    /// messages.
    pub fn matching_student_files(
        &self,
        field: &str,
        patterns: &[String],
    ) -> ExecutionResult<Vec<String>> {
        if patterns.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                ValidationError::new(field, format!("invalid pattern {pattern:?}: {e}"))
            })?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| ValidationError::new(field, e.to_string()))?;

        Ok(self
            .submitted_filenames
            .iter()
            .filter(|name| set.is_match(Path::new(name.as_str())))
            .cloned()
            .collect())
    }
}

fn existing(path: PathBuf) -> ExecutionResult<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(ExecutionError::MissingFile { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(submitted: &[&str]) -> GradingFiles {
        GradingFiles {
            project_files_dir: PathBuf::from("/nonexistent/project"),
            project_files: Vec::new(),
            submission_dir: PathBuf::from("/nonexistent/submission"),
            submitted_filenames: submitted.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn globs_keep_submission_order() {
        let f = files(&["b.cpp", "test_a.cpp", "a.cpp", "notes.txt", "test_b.cpp"]);
        let cpp = f
            .matching_student_files("student_files", &["*.cpp".into()])
            .unwrap();
        assert_eq!(cpp, vec!["b.cpp", "test_a.cpp", "a.cpp", "test_b.cpp"]);

        let tests = f
            .matching_student_files("pattern", &["test_*.cpp".into(), "notes.txt".into()])
            .unwrap();
        assert_eq!(tests, vec!["test_a.cpp", "notes.txt", "test_b.cpp"]);
    }

    #[test]
    fn bad_glob_is_a_validation_error() {
        let err = files(&["a.cpp"])
            .matching_student_files("pattern", &["[".into()])
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Validation(ref v) if v.field == "pattern"));
    }

    #[test]
    fn missing_project_file_is_reported() {
        let err = files(&[]).project_file("impl.cpp").unwrap_err();
        assert!(!err.is_transient());
    }
}
