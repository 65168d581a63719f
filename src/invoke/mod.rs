//! Module invocation — one skill module run per call.
//!
//! Two interchangeable strategies behind [`ModuleInvoker`]:
//! - `process.rs` — spawn a `wasmtime` binary, pipe the request through it
//! - `embedded.rs` — run the module in-process (feature `embedded`)
//!
//! Both feed the serialized request on stdin, capture stdout/stderr
//! (lossy UTF-8), and report the module's exit status.

#[cfg(feature = "embedded")]
pub mod embedded;
pub mod process;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::locator::RuntimeChoice;

#[cfg(feature = "embedded")]
pub use embedded::EmbeddedInvoker;
pub use process::ProcessInvoker;

/// Everything a module produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleOutput {
    pub stdout: String,
    pub stderr: String,
    /// Native exit status of the run.
    pub status: i32,
}

impl ModuleOutput {
    /// Decode raw stream bytes, replacing invalid UTF-8.
    pub fn from_bytes(stdout: &[u8], stderr: &[u8], status: i32) -> Self {
        Self {
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
            status,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("failed to start {runtime}: {source}")]
    Spawn {
        runtime: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error talking to module: {0}")]
    Io(#[from] std::io::Error),
    #[error("module timed out after {0:?}")]
    Timeout(Duration),
    #[error("embedded engine: {0}")]
    Engine(String),
}

/// A way to run one module with one request.
#[async_trait]
pub trait ModuleInvoker: Send + Sync {
    /// Run `module` with `request` on stdin and wait for it to finish.
    async fn invoke(&self, module: &Path, request: &str) -> Result<ModuleOutput, InvokeError>;
}

/// Build the invoker matching a located runtime.
pub fn invoker_for(
    choice: &RuntimeChoice,
    timeout: Duration,
) -> Result<Box<dyn ModuleInvoker>, InvokeError> {
    match choice {
        RuntimeChoice::Bundled(path) | RuntimeChoice::System(path) => {
            Ok(Box::new(ProcessInvoker::new(path.clone(), timeout)))
        }
        #[cfg(feature = "embedded")]
        RuntimeChoice::Embedded => Ok(Box::new(EmbeddedInvoker::new(timeout)?)),
        #[cfg(not(feature = "embedded"))]
        RuntimeChoice::Embedded => Err(InvokeError::Engine(
            "built without the embedded feature".into(),
        )),
    }
}
