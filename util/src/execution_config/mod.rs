//! Resource limits applied to every sandboxed command, together with the
//! defaults and upper bounds instructors may configure.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

pub const DEFAULT_SUBPROCESS_TIMEOUT: u64 = 10;
pub const MAX_SUBPROCESS_TIMEOUT: u64 = 60;

pub const DEFAULT_STACK_SIZE_LIMIT: u64 = 10_000_000;
pub const MAX_STACK_SIZE_LIMIT: u64 = 100_000_000;

pub const DEFAULT_VIRTUAL_MEM_LIMIT: u64 = 500_000_000;
pub const MAX_VIRTUAL_MEM_LIMIT: u64 = 1_000_000_000;

pub const DEFAULT_PROCESS_LIMIT: u32 = 0;
pub const MAX_PROCESS_LIMIT: u32 = 10;

/// Process budget for compiler invocations. Compilers fork helpers
/// (cc1plus, as, ld), so the per-test spawn limit would starve them.
pub const COMPILATION_PROCESS_LIMIT: u32 = 16;

pub const TRUNCATION_NOTICE: &str = "\nOutput truncated";

pub fn default_valgrind_flags() -> Vec<String> {
    vec!["--leak-check=full".into(), "--error-exitcode=1".into()]
}

/// Per-command limits. All byte values are hard caps enforced by the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct ResourceLimits {
    #[serde(default = "default_time_limit")]
    #[validate(range(min = 1, max = 60, message = "time_limit must be between 1 and 60 seconds"))]
    pub time_limit: u64,

    #[serde(default = "default_stack_size_limit")]
    #[validate(range(
        min = 1,
        max = 100_000_000,
        message = "stack_size_limit must be between 1 and 100000000 bytes"
    ))]
    pub stack_size_limit: u64,

    #[serde(default = "default_virtual_memory_limit")]
    #[validate(range(
        min = 1,
        max = 1_000_000_000,
        message = "virtual_memory_limit must be between 1 and 1000000000 bytes"
    ))]
    pub virtual_memory_limit: u64,

    #[serde(default = "default_process_spawn_limit")]
    #[validate(range(max = 10, message = "process_spawn_limit must be at most 10"))]
    pub process_spawn_limit: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            time_limit: default_time_limit(),
            stack_size_limit: default_stack_size_limit(),
            virtual_memory_limit: default_virtual_memory_limit(),
            process_spawn_limit: default_process_spawn_limit(),
        }
    }
}

impl ResourceLimits {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.time_limit)
    }

    /// Same limits with only the timeout replaced.
    pub fn with_time_limit(self, time_limit: u64) -> Self {
        Self { time_limit, ..self }
    }

    /// Limits used for compiler invocations: the test's timeout and memory
    /// caps, but enough processes for the toolchain.
    pub fn for_compilation(self) -> Self {
        Self {
            process_spawn_limit: COMPILATION_PROCESS_LIMIT,
            ..self
        }
    }
}

fn default_time_limit() -> u64 {
    DEFAULT_SUBPROCESS_TIMEOUT
}

fn default_stack_size_limit() -> u64 {
    DEFAULT_STACK_SIZE_LIMIT
}

fn default_virtual_memory_limit() -> u64 {
    DEFAULT_VIRTUAL_MEM_LIMIT
}

fn default_process_spawn_limit() -> u32 {
    DEFAULT_PROCESS_LIMIT
}

/// Cuts `output` to at most `max_len` characters, appending
/// [`TRUNCATION_NOTICE`] when anything was dropped.
pub fn truncate_output(output: String, max_len: usize) -> String {
    match output.char_indices().nth(max_len) {
        None => output,
        Some((cut, _)) => {
            let mut kept = output;
            kept.truncate(cut);
            kept.push_str(TRUNCATION_NOTICE);
            kept
        }
    }
}
