//! ProcessInvoker — run a module through an external `wasmtime` binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{InvokeError, ModuleInvoker, ModuleOutput};

/// Spawns `<runtime> run <module>` once per invocation.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    runtime: PathBuf,
    timeout: Duration,
}

impl ProcessInvoker {
    pub fn new(runtime: PathBuf, timeout: Duration) -> Self {
        Self { runtime, timeout }
    }
}

#[async_trait]
impl ModuleInvoker for ProcessInvoker {
    async fn invoke(&self, module: &Path, request: &str) -> Result<ModuleOutput, InvokeError> {
        let mut cmd = Command::new(&self.runtime);
        cmd.arg("run")
            .arg(module)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("spawning {} run {}", self.runtime.display(), module.display());
        let mut child = cmd.spawn().map_err(|source| InvokeError::Spawn {
            runtime: self.runtime.display().to_string(),
            source,
        })?;

        // Feed stdin concurrently so a module that writes before it has read
        // everything cannot deadlock against a full pipe.
        let feeder = child.stdin.take().map(|mut stdin| {
            let bytes = request.as_bytes().to_vec();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&bytes).await {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        return Err(e);
                    }
                    debug!("module closed stdin early");
                }
                Ok(())
            })
        });

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(InvokeError::Timeout(self.timeout)),
        };

        if let Some(feeder) = feeder {
            match feeder.await {
                Ok(result) => result?,
                Err(e) => debug!("stdin feeder did not finish: {e}"),
            }
        }

        // Killed by a signal: no code, report plain failure.
        let status = output.status.code().unwrap_or(1);
        debug!("runtime exited with status {status}");

        Ok(ModuleOutput::from_bytes(&output.stdout, &output.stderr, status))
    }
}

#[cfg(all(test, unix))]
pub(crate) mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Write an executable shell script standing in for `wasmtime`.
    pub(crate) fn fake_runtime(path: &Path, body: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn invoker(dir: &TempDir, body: &str, timeout: Duration) -> ProcessInvoker {
        let path = dir.path().join("wasmtime");
        fake_runtime(&path, body);
        ProcessInvoker::new(path, timeout)
    }

    #[tokio::test]
    async fn passes_run_and_module_arguments() {
        let dir = TempDir::new().unwrap();
        let inv = invoker(&dir, r#"cat >/dev/null; echo "$1 $2""#, Duration::from_secs(10));
        let out = inv.invoke(Path::new("/dist/validate-test.wasm"), "{}").await.unwrap();
        assert_eq!(out.stdout.trim(), "run /dist/validate-test.wasm");
        assert_eq!(out.status, 0);
    }

    #[tokio::test]
    async fn request_arrives_on_stdin() {
        let dir = TempDir::new().unwrap();
        let inv = invoker(&dir, "cat", Duration::from_secs(10));
        let request = r#"{"action":"validate","spec":{"name":"t"}}"#;
        let out = inv.invoke(Path::new("m.wasm"), request).await.unwrap();
        assert_eq!(out.stdout, request);
    }

    #[tokio::test]
    async fn captures_stderr_and_status() {
        let dir = TempDir::new().unwrap();
        let inv = invoker(&dir, "cat >/dev/null; echo oops >&2; exit 42", Duration::from_secs(10));
        let out = inv.invoke(Path::new("m.wasm"), "{}").await.unwrap();
        assert_eq!(out.stderr.trim(), "oops");
        assert_eq!(out.status, 42);
    }

    #[tokio::test]
    async fn module_ignoring_stdin_is_fine() {
        let dir = TempDir::new().unwrap();
        let inv = invoker(&dir, "echo done", Duration::from_secs(10));
        let big = "x".repeat(1 << 20);
        let out = inv.invoke(Path::new("m.wasm"), &big).await.unwrap();
        assert_eq!(out.stdout.trim(), "done");
    }

    #[tokio::test]
    async fn runtime_killed_by_signal_reports_status_1() {
        let dir = TempDir::new().unwrap();
        let body = "cat >/dev/null; echo partial; kill -9 $$";
        let inv = invoker(&dir, body, Duration::from_secs(10));
        let out = inv.invoke(Path::new("m.wasm"), "{}").await.unwrap();
        assert_eq!(out.status, 1);
        assert_eq!(out.stdout.trim(), "partial");
    }

    #[tokio::test]
    async fn hung_module_times_out() {
        let dir = TempDir::new().unwrap();
        let inv = invoker(&dir, "sleep 30", Duration::from_millis(200));
        match inv.invoke(Path::new("m.wasm"), "{}").await {
            Err(InvokeError::Timeout(_)) => {}
            other => panic!("expected Timeout, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_runtime_is_spawn_error() {
        let inv = ProcessInvoker::new("/nonexistent/wasmtime".into(), Duration::from_secs(1));
        match inv.invoke(Path::new("m.wasm"), "{}").await {
            Err(InvokeError::Spawn { runtime, .. }) => assert!(runtime.contains("wasmtime")),
            other => panic!("expected Spawn error, got: {other:?}"),
        }
    }
}
