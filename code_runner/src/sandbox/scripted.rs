//! A sandbox that runs nothing. Every command is answered by a handler
//! closure, and every call is recorded for later inspection.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use util::execution_config::ResourceLimits;

use super::{CommandRequest, CompletedCommand, Sandbox, SandboxFactory};
use crate::error::SandboxError;

pub type Handler =
    Arc<dyn Fn(&ScriptedCall) -> Result<CompletedCommand, SandboxError> + Send + Sync>;

/// A command as the handler sees it, with the files staged at that moment.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedCall {
    pub sandbox: String,
    pub argv: Vec<String>,
    pub stdin: Option<String>,
    pub limits: ResourceLimits,
    /// Staged name -> file it was copied from.
    pub staged: BTreeMap<String, PathBuf>,
}

impl ScriptedCall {
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.argv.iter().any(|a| a == arg)
    }

    pub fn is_staged(&self, name: &str) -> bool {
        self.staged.contains_key(name)
    }

    /// The original filename of whatever was staged as `name`.
    pub fn staged_source_name(&self, name: &str) -> Option<&str> {
        self.staged
            .get(name)
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
    }
}

/// Shared record of every command run by a sandbox (or by every sandbox a
/// factory created).
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<ScriptedCall>>>);

impl CallLog {
    fn push(&self, call: ScriptedCall) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResetCounter(Arc<AtomicUsize>);

impl ResetCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct ScriptedSandbox {
    name: String,
    handler: Handler,
    staged: BTreeMap<String, PathBuf>,
    log: CallLog,
    resets: ResetCounter,
}

impl ScriptedSandbox {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ScriptedCall) -> Result<CompletedCommand, SandboxError> + Send + Sync + 'static,
    {
        Self::from_parts("scripted".into(), Arc::new(handler), CallLog::default(), ResetCounter::default())
    }

    fn from_parts(name: String, handler: Handler, log: CallLog, resets: ResetCounter) -> Self {
        Self {
            name,
            handler,
            staged: BTreeMap::new(),
            log,
            resets,
        }
    }

    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn reset_counter(&self) -> ResetCounter {
        self.resets.clone()
    }

    /// Names currently staged in the working directory.
    pub fn staged_names(&self) -> Vec<String> {
        self.staged.keys().cloned().collect()
    }

    fn stage(&mut self, source: &Path, dest_name: String) -> Result<(), SandboxError> {
        if !source.is_file() {
            return Err(SandboxError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", source.display()),
            )));
        }
        self.staged.insert(dest_name, source.to_path_buf());
        Ok(())
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add_files(&mut self, files: &[PathBuf]) -> Result<(), SandboxError> {
        for file in files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.stage(file, name)?;
        }
        Ok(())
    }

    async fn add_and_rename_file(
        &mut self,
        file: &Path,
        dest_name: &str,
    ) -> Result<(), SandboxError> {
        self.stage(file, dest_name.to_string())
    }

    async fn run_command(
        &mut self,
        request: CommandRequest,
    ) -> Result<CompletedCommand, SandboxError> {
        let call = ScriptedCall {
            sandbox: self.name.clone(),
            argv: request.argv,
            stdin: request.stdin,
            limits: request.limits,
            staged: self.staged.clone(),
        };
        let outcome = (self.handler)(&call);
        self.log.push(call);
        outcome
    }

    async fn reset(&mut self) -> Result<(), SandboxError> {
        self.staged.clear();
        self.resets.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out scripted sandboxes sharing one handler, call log and reset
/// counter.
#[derive(Clone)]
pub struct ScriptedSandboxFactory {
    handler: Handler,
    log: CallLog,
    resets: ResetCounter,
}

impl ScriptedSandboxFactory {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ScriptedCall) -> Result<CompletedCommand, SandboxError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            log: CallLog::default(),
            resets: ResetCounter::default(),
        }
    }

    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn reset_counter(&self) -> ResetCounter {
        self.resets.clone()
    }

    pub fn sandbox(&self, name: impl Into<String>) -> ScriptedSandbox {
        ScriptedSandbox::from_parts(
            name.into(),
            self.handler.clone(),
            self.log.clone(),
            self.resets.clone(),
        )
    }
}

impl SandboxFactory for ScriptedSandboxFactory {
    fn create(&self, name: String) -> Box<dyn Sandbox> {
        Box::new(self.sandbox(name))
    }
}
