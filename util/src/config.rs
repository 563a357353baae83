//! Global grader configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock, RwLockReadGuard};
use std::time::Duration;

/// Represents the complete grader configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub storage_root: String,
    pub num_workers: usize,
    pub queue_interval_secs: u64,
    pub max_retries: u32,
    pub min_retry_delay_secs: u64,
    pub max_retry_delay_secs: u64,
    pub sandbox_image: String,
    pub max_output_length: usize,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Every key has a default; malformed numbers fall back to it.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let min_retry_delay_secs = parsed_or("AG_TEST_MIN_RETRY_DELAY", 1);
        let max_retry_delay_secs = parsed_or("AG_TEST_MAX_RETRY_DELAY", 2);

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "autograder".into()),
            log_level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "code_manager=info,code_runner=info,marker=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "grader.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            storage_root: env::var("STORAGE_ROOT").unwrap_or_else(|_| "data".into()),
            num_workers: parsed_or("GRADER_WORKERS", 4usize).max(1),
            queue_interval_secs: parsed_or("QUEUE_SUBMISSIONS_INTERVAL_SECS", 5u64).max(1),
            max_retries: parsed_or("AG_TEST_MAX_RETRIES", 2),
            min_retry_delay_secs: min_retry_delay_secs.min(max_retry_delay_secs),
            max_retry_delay_secs: max_retry_delay_secs.max(min_retry_delay_secs),
            sandbox_image: env::var("SANDBOX_IMAGE")
                .unwrap_or_else(|_| "autograder-sandbox".into()),
            max_output_length: parsed_or("MAX_OUTPUT_LENGTH", 8_000_000usize),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// A poisoned lock is recovered rather than propagated; the config is
    /// plain data and stays consistent.
    pub fn global() -> RwLockReadGuard<'static, AppConfig> {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        match lock.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = match lock.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = AppConfig::from_env();
        }
    }

    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = match lock.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        setter(&mut guard);
    }

    pub fn queue_interval(&self) -> Duration {
        Duration::from_secs(self.queue_interval_secs)
    }

    pub fn min_retry_delay(&self) -> Duration {
        Duration::from_secs(self.min_retry_delay_secs)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_secs(self.max_retry_delay_secs)
    }

    // --- Per-field setters below ---

    pub fn set_log_level(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_level = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_storage_root(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.storage_root = value.into());
    }

    pub fn set_num_workers(value: usize) {
        AppConfig::set_field(|cfg| cfg.num_workers = value.max(1));
    }

    pub fn set_max_retries(value: u32) {
        AppConfig::set_field(|cfg| cfg.max_retries = value);
    }

    pub fn set_retry_delays(min_secs: u64, max_secs: u64) {
        AppConfig::set_field(|cfg| {
            cfg.min_retry_delay_secs = min_secs.min(max_secs);
            cfg.max_retry_delay_secs = max_secs.max(min_secs);
        });
    }

    pub fn set_max_output_length(value: usize) {
        AppConfig::set_field(|cfg| cfg.max_output_length = value);
    }
}
