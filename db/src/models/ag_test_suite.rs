use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::test_case::AgTestCase;

/// An ordered group of instructor test cases graded as one unit.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AgTestSuite {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    /// Deferred suites run after the submission's primary grade is reported.
    #[serde(default)]
    pub deferred: bool,
    #[serde(default)]
    pub test_cases: Vec<AgTestCase>,
}

impl AgTestSuite {
    /// The cases to run. An empty id list selects every case; otherwise
    /// only listed cases run, in suite order.
    pub fn select_cases(&self, case_ids: &[i64]) -> Vec<&AgTestCase> {
        self.test_cases
            .iter()
            .filter(|c| case_ids.is_empty() || case_ids.contains(&c.id))
            .collect()
    }

    pub fn validate(&self, project_files: &[String]) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("name", "suite name must not be empty"));
        }
        for case in &self.test_cases {
            case.validate(project_files).map_err(|e| {
                ValidationError::new(format!("{}.{}", case.base.name, e.field), e.message)
            })?;
        }
        Ok(())
    }
}
