use serde::{Deserialize, Serialize};
use util::execution_config::DEFAULT_SUBPROCESS_TIMEOUT;
use util::languages::Compiler;
use util::validation::{first_illegal_arg, is_legal_filename};

use crate::error::ValidationError;
use crate::models::feedback_config::StudentSuiteFeedbackConfiguration;
use crate::models::test_case::check_project_files;

/// A mutation-testing suite: student-written tests are checked against a
/// correct implementation and then used to hunt instructor-planted bugs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StudentTestSuite {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    /// Glob matched against submitted filenames to find candidate tests.
    pub student_test_case_filename_pattern: String,
    pub correct_implementation_filename: String,
    #[serde(default)]
    pub buggy_implementation_filenames: Vec<String>,
    /// Name the implementation is staged under, if it differs from its own.
    #[serde(default)]
    pub implementation_file_alias: Option<String>,
    #[serde(default)]
    pub suite_resource_filenames: Vec<String>,
    #[serde(default)]
    pub suite_resource_files_to_compile_together: Vec<String>,
    #[serde(default = "default_compile_implementation_files")]
    pub compile_implementation_files: bool,
    #[serde(default)]
    pub compiler: Compiler,
    #[serde(default)]
    pub compiler_flags: Vec<String>,
    #[serde(default = "default_time_limit")]
    pub time_limit: u64,
    #[serde(default)]
    pub points_per_buggy_implementation_exposed: u32,
    #[serde(default)]
    pub deferred: bool,
    #[serde(default)]
    pub feedback_configuration: StudentSuiteFeedbackConfiguration,
    #[serde(default)]
    pub post_deadline_final_submission_feedback_configuration:
        Option<StudentSuiteFeedbackConfiguration>,
}

fn default_compile_implementation_files() -> bool {
    true
}

fn default_time_limit() -> u64 {
    DEFAULT_SUBPROCESS_TIMEOUT
}

impl StudentTestSuite {
    /// The name an implementation file carries inside the sandbox.
    pub fn staged_implementation_name<'a>(&'a self, implementation: &'a str) -> &'a str {
        self.implementation_file_alias
            .as_deref()
            .unwrap_or(implementation)
    }

    pub fn points_possible(&self) -> u32 {
        self.points_per_buggy_implementation_exposed
            .saturating_mul(self.buggy_implementation_filenames.len() as u32)
    }

    pub fn validate(&self, project_files: &[String]) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("name", "suite name must not be empty"));
        }
        if self.student_test_case_filename_pattern.trim().is_empty() {
            return Err(ValidationError::new(
                "student_test_case_filename_pattern",
                "pattern must not be empty",
            ));
        }
        if !(1..=util::execution_config::MAX_SUBPROCESS_TIMEOUT).contains(&self.time_limit) {
            return Err(ValidationError::new(
                "time_limit",
                "time_limit must be between 1 and 60 seconds",
            ));
        }
        if let Some(flag) = first_illegal_arg(&self.compiler_flags) {
            return Err(ValidationError::new(
                "compiler_flags",
                format!("illegal flag {flag:?}"),
            ));
        }
        if let Some(alias) = &self.implementation_file_alias {
            if !is_legal_filename(alias) {
                return Err(ValidationError::new(
                    "implementation_file_alias",
                    format!("{alias:?} is not a legal filename"),
                ));
            }
        }
        check_project_files(
            "correct_implementation_filename",
            std::slice::from_ref(&self.correct_implementation_filename),
            project_files,
        )?;
        check_project_files(
            "buggy_implementation_filenames",
            &self.buggy_implementation_filenames,
            project_files,
        )?;
        check_project_files(
            "suite_resource_filenames",
            &self.suite_resource_filenames,
            project_files,
        )?;
        for name in &self.suite_resource_files_to_compile_together {
            if !self.suite_resource_filenames.contains(name) {
                return Err(ValidationError::new(
                    "suite_resource_files_to_compile_together",
                    format!("{name:?} is not one of the suite's resource files"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite() -> StudentTestSuite {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "project_id": 1,
            "name": "mutants",
            "student_test_case_filename_pattern": "test_*.cpp",
            "correct_implementation_filename": "correct.cpp",
            "buggy_implementation_filenames": ["bug1.cpp", "bug2.cpp"],
            "implementation_file_alias": "impl.cpp",
            "suite_resource_filenames": ["impl.h"],
            "suite_resource_files_to_compile_together": ["impl.h"],
            "points_per_buggy_implementation_exposed": 3
        }))
        .unwrap()
    }

    fn files() -> Vec<String> {
        ["correct.cpp", "bug1.cpp", "bug2.cpp", "impl.h"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn json_defaults() {
        let s = suite();
        assert!(s.compile_implementation_files);
        assert_eq!(s.time_limit, DEFAULT_SUBPROCESS_TIMEOUT);
        assert_eq!(s.points_possible(), 6);
        assert_eq!(s.staged_implementation_name("bug1.cpp"), "impl.cpp");
        s.validate(&files()).unwrap();
    }

    #[test]
    fn buggy_impl_must_be_a_project_file() {
        let mut s = suite();
        s.buggy_implementation_filenames.push("bug3.cpp".into());
        assert_eq!(
            s.validate(&files()).unwrap_err().field,
            "buggy_implementation_filenames"
        );
    }

    #[test]
    fn no_alias_keeps_original_name() {
        let mut s = suite();
        s.implementation_file_alias = None;
        assert_eq!(s.staged_implementation_name("bug1.cpp"), "bug1.cpp");
    }
}
