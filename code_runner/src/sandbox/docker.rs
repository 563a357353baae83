use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use util::config::AppConfig;
use util::execution_config::truncate_output;
use uuid::Uuid;

use super::{CommandRequest, CompletedCommand, Sandbox, SandboxFactory};
use crate::error::SandboxError;

/// Runs every command in a throwaway container with the working directory
/// bind-mounted at `/code`.
///
/// Containers are created and started as separate steps, and the exit code
/// is read back from the container's state. A program that exits with a
/// code `docker` also uses for its own failures is still reported as the
/// program's result.
pub struct DockerSandbox {
    name: String,
    image: String,
    max_output_length: usize,
    workdir: Option<TempDir>,
}

impl DockerSandbox {
    pub fn new(name: impl Into<String>, image: impl Into<String>, max_output_length: usize) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            max_output_length,
            workdir: None,
        }
    }

    pub fn from_config(name: impl Into<String>) -> Self {
        let config = AppConfig::global();
        Self::new(name, config.sandbox_image.clone(), config.max_output_length)
    }

    /// The host directory mounted into containers, created on first use.
    fn workdir(&mut self) -> Result<&Path, SandboxError> {
        if self.workdir.is_none() {
            let dir = tempfile::Builder::new()
                .prefix(&format!("{}-", self.name))
                .tempdir()?;
            self.workdir = Some(dir);
        }
        match &self.workdir {
            Some(dir) => Ok(dir.path()),
            None => Err(SandboxError::Unavailable("working directory missing".into())),
        }
    }

    async fn copy_in(&mut self, source: &Path, dest_name: &str) -> Result<(), SandboxError> {
        let dest = self.workdir()?.join(dest_name);
        tokio::fs::copy(source, &dest).await?;
        Ok(())
    }

    /// Runs a short `docker` subcommand, returning its stdout.
    async fn docker(args: &[&str]) -> Result<String, SandboxError> {
        let output = Command::new("docker")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(SandboxError::Spawn)?;
        if !output.status.success() {
            return Err(SandboxError::Unavailable(format!(
                "docker {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn start_and_wait(
        &self,
        container: &str,
        request: &CommandRequest,
    ) -> Result<CompletedCommand, SandboxError> {
        let mut start = Command::new("docker");
        start.arg("start").arg("-a");
        if request.stdin.is_some() {
            start.arg("-i");
        }
        let mut child = start
            .arg(container)
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SandboxError::Spawn)?;

        if let (Some(input), Some(mut pipe)) = (request.stdin.clone(), child.stdin.take()) {
            tokio::spawn(async move {
                // A program that exits without reading its input breaks the pipe.
                let _ = pipe.write_all(input.as_bytes()).await;
            });
        }
        // Enough bytes for `max_output_length` characters plus one.
        let limit = u64::try_from(self.max_output_length)
            .unwrap_or(u64::MAX)
            .saturating_mul(4)
            .saturating_add(1);
        let stdout = drain(child.stdout.take(), limit);
        let stderr = drain(child.stderr.take(), limit);

        let finished = match timeout(request.limits.timeout(), child.wait()).await {
            Ok(status) => {
                status?;
                true
            }
            Err(_) => {
                // Detaching the client leaves the container to the caller's
                // `docker rm -f`.
                let _ = child.kill().await;
                false
            }
        };

        let stdout = truncate_output(collect(stdout).await, self.max_output_length);
        let stderr = truncate_output(collect(stderr).await, self.max_output_length);

        if !finished {
            tracing::debug!(sandbox = %self.name, "command timed out");
            return Ok(CompletedCommand::timed_out(stdout, stderr));
        }

        let state = Self::docker(&[
            "inspect",
            "--format",
            "{{.State.Status}} {{.State.ExitCode}}",
            container,
        ])
        .await?;
        Ok(CompletedCommand {
            stdout,
            stderr,
            return_code: Some(container_exit_code(&state)?),
            timed_out: false,
        })
    }

    async fn force_remove(container: &str) {
        match Command::new("docker")
            .args(["rm", "-f", container])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) if status.success() => {}
            Ok(status) => tracing::warn!(container, %status, "docker rm -f failed"),
            Err(e) => tracing::warn!(container, error = %e, "could not run docker rm -f"),
        }
    }
}

/// Arguments to `docker` creating the container for one command.
pub(crate) fn docker_create_args(
    container: &str,
    image: &str,
    workdir: &Path,
    request: &CommandRequest,
) -> Vec<String> {
    let limits = &request.limits;
    let mut args = vec!["create".to_string()];
    if request.stdin.is_some() {
        args.push("-i".into());
    }
    args.push(format!("--name={container}"));
    if !request.allow_network {
        args.push("--network=none".into());
    }
    // The program itself counts against the pid limit.
    args.push(format!("--pids-limit={}", limits.process_spawn_limit + 1));
    args.push(format!("--memory={}b", limits.virtual_memory_limit));
    args.push(format!("--memory-swap={}b", limits.virtual_memory_limit));
    args.push(format!(
        "--ulimit=stack={0}:{0}",
        limits.stack_size_limit
    ));
    args.push("--security-opt=no-new-privileges".into());
    args.push("-v".into());
    args.push(format!("{}:/code:rw", workdir.display()));
    args.push("-w".into());
    args.push("/code".into());
    args.push(image.to_string());
    args.extend(request.argv.iter().cloned());
    args
}

/// The program's exit code from `docker inspect` state output.
fn container_exit_code(state: &str) -> Result<i32, SandboxError> {
    let mut fields = state.split_whitespace();
    match (fields.next(), fields.next().map(str::parse::<i32>)) {
        (Some("exited"), Some(Ok(code))) => Ok(code),
        _ => Err(SandboxError::Unavailable(format!(
            "container did not run to completion (state {:?})",
            state.trim()
        ))),
    }
}

/// Reads at most `limit` bytes and discards the rest, so the child never
/// blocks on a full pipe.
fn drain<R>(reader: Option<R>, limit: u64) -> Option<JoinHandle<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    reader.map(|mut r| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            // Keep whatever arrived before the pipe broke.
            let _ = (&mut r).take(limit).read_to_end(&mut buf).await;
            let _ = tokio::io::copy(&mut r, &mut tokio::io::sink()).await;
            buf
        })
    })
}

async fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    match handle {
        Some(h) => String::from_utf8_lossy(&h.await.unwrap_or_default()).into_owned(),
        None => String::new(),
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add_files(&mut self, files: &[PathBuf]) -> Result<(), SandboxError> {
        for file in files {
            let name = file
                .file_name()
                .ok_or_else(|| SandboxError::Unavailable(format!("invalid file path {}", file.display())))?
                .to_string_lossy()
                .into_owned();
            self.copy_in(file, &name).await?;
        }
        Ok(())
    }

    async fn add_and_rename_file(
        &mut self,
        file: &Path,
        dest_name: &str,
    ) -> Result<(), SandboxError> {
        self.copy_in(file, dest_name).await
    }

    async fn run_command(
        &mut self,
        request: CommandRequest,
    ) -> Result<CompletedCommand, SandboxError> {
        let container = format!("{}-{}", self.name, Uuid::new_v4().simple());
        let workdir = self.workdir()?.to_path_buf();
        let args = docker_create_args(&container, &self.image, &workdir, &request);

        tracing::debug!(sandbox = %self.name, argv = ?request.argv, "running command");

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Self::docker(&args).await?;
        let result = self.start_and_wait(&container, &request).await;
        Self::force_remove(&container).await;
        result
    }

    async fn reset(&mut self) -> Result<(), SandboxError> {
        if let Some(dir) = self.workdir.take() {
            dir.close()?;
        }
        Ok(())
    }
}

/// Creates [`DockerSandbox`]es from the global configuration.
#[derive(Debug, Clone, Default)]
pub struct DockerSandboxFactory;

impl SandboxFactory for DockerSandboxFactory {
    fn create(&self, name: String) -> Box<dyn Sandbox> {
        Box::new(DockerSandbox::from_config(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use util::execution_config::ResourceLimits;

    #[test]
    fn run_args_carry_limits_and_isolation() {
        let request = CommandRequest::new(["./prog", "--fast"])
            .with_limits(ResourceLimits {
                time_limit: 5,
                stack_size_limit: 2_000,
                virtual_memory_limit: 1_000_000,
                process_spawn_limit: 2,
            })
            .with_stdin("in");
        let args = docker_create_args("w1-abc", "img", Path::new("/tmp/x"), &request);

        assert_eq!(&args[..2], ["create", "-i"]);
        for expected in [
            "--name=w1-abc",
            "--network=none",
            "--pids-limit=3",
            "--memory=1000000b",
            "--ulimit=stack=2000:2000",
            "--security-opt=no-new-privileges",
            "/tmp/x:/code:rw",
        ] {
            assert!(args.iter().any(|a| a == expected), "missing {expected}");
        }
        assert_eq!(&args[args.len() - 3..], ["img", "./prog", "--fast"]);
    }

    #[test]
    fn network_flag_is_dropped_when_allowed() {
        let request = CommandRequest::new(["curl"]).with_network(true);
        let args = docker_create_args("c", "img", Path::new("/w"), &request);
        assert!(!args.iter().any(|a| a == "--network=none"));
        assert!(!args.iter().any(|a| a == "-i"));
    }

    #[test]
    fn program_exit_codes_come_from_the_container_state() {
        assert_eq!(container_exit_code("exited 0\n").unwrap(), 0);
        // 125 is also what `docker run` uses for its own failures.
        assert_eq!(container_exit_code("exited 125\n").unwrap(), 125);
        assert_eq!(container_exit_code("exited 137").unwrap(), 137);
    }

    #[test]
    fn container_that_never_ran_is_a_sandbox_failure() {
        for state in ["created 0", "running 0", "", "exited ?"] {
            assert!(
                matches!(container_exit_code(state), Err(SandboxError::Unavailable(_))),
                "{state:?}"
            );
        }
    }

    #[tokio::test]
    async fn output_is_capped_while_the_writer_keeps_going() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let handle = drain(Some(reader), 10).unwrap();

        let written = tokio::spawn(async move {
            let chunk = vec![b'x'; 4096];
            for _ in 0..256 {
                writer.write_all(&chunk).await.unwrap();
            }
        });
        tokio::time::timeout(std::time::Duration::from_secs(5), written)
            .await
            .expect("writer blocked on a full pipe")
            .unwrap();

        assert_eq!(handle.await.unwrap(), vec![b'x'; 10]);
    }

    #[tokio::test]
    async fn files_land_in_the_working_directory_until_reset() {
        let source = tempfile::tempdir().unwrap();
        let file = source.path().join("impl.cpp");
        std::fs::write(&file, "int f();").unwrap();

        let mut sandbox = DockerSandbox::new("t", "img", 100);
        sandbox.add_files(&[file.clone()]).await.unwrap();
        sandbox.add_and_rename_file(&file, "alias.cpp").await.unwrap();
        let dir = sandbox.workdir().unwrap().to_path_buf();
        assert!(dir.join("impl.cpp").is_file());
        assert!(dir.join("alias.cpp").is_file());

        sandbox.reset().await.unwrap();
        assert!(!dir.exists());
    }
}
