//! The two skill loaders and the glue they share.
//!
//! Flow: CLI args → request → locate runtime → invoke module → interpret
//! response → exit code. Usage and environment problems are caught before
//! any module runs.
//!
//! - `validate.rs` — validation loader (`validate-test.wasm`)
//! - `inject.rs` — injection loader (`inject-inline.wasm`)
//! - `error.rs` — LoaderError and exit codes

pub mod error;
pub mod inject;
pub mod validate;

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::LoaderConfig;
use crate::invoke::{invoker_for, ModuleOutput};
use crate::locator::RuntimeLocator;
pub use error::{LoaderError, LoaderResult, EXIT_FAILURE, EXIT_SUCCESS, EXIT_USAGE};

/// Where loader output goes. Stdout carries module results, stderr carries
/// diagnostics.
pub struct Console<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

impl<'a> Console<'a> {
    pub fn new(out: &'a mut dyn Write, err: &'a mut dyn Write) -> Self {
        Self { out, err }
    }

    /// Print a line to stdout. Write failures (closed pipe) are ignored.
    pub fn say(&mut self, line: impl std::fmt::Display) {
        let _ = writeln!(self.out, "{line}");
    }

    /// Print a line to stderr.
    pub fn warn(&mut self, line: impl std::fmt::Display) {
        let _ = writeln!(self.err, "{line}");
    }

    /// Report a loader error and return its exit code.
    pub fn fail(&mut self, error: &LoaderError) -> i32 {
        self.warn(format_args!("Error: {error}"));
        if let Some(hint) = error.hint() {
            self.warn(hint);
        }
        error.exit_code()
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
        let _ = self.err.flush();
    }
}

/// Dist path of `module_name`, or ModuleNotFound.
pub(crate) fn require_module(config: &LoaderConfig, module_name: &str) -> LoaderResult<PathBuf> {
    let path = config.module_path(module_name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(LoaderError::ModuleNotFound(path))
    }
}

/// Locate a runtime, build the matching invoker and run one request.
pub(crate) async fn run_module(
    config: &LoaderConfig,
    module: &Path,
    request: &str,
    offer_embedded: bool,
    runtime_hint: &'static str,
) -> LoaderResult<ModuleOutput> {
    let locator = RuntimeLocator::for_host(&config.runtimes_dir, offer_embedded, config.engine);
    let choice = locator
        .locate()
        .map_err(|_| LoaderError::RuntimeNotFound { hint: runtime_hint })?;
    info!("using {}", choice.describe());

    let invoker = invoker_for(&choice, config.timeout)?;
    let output = invoker.invoke(module, request).await?;
    debug!(
        "module finished: status {}, {} bytes stdout, {} bytes stderr",
        output.status,
        output.stdout.len(),
        output.stderr.len()
    );
    Ok(output)
}

/// Read a whole file, mapping I/O failure to a loader error.
pub(crate) fn read_text(path: &Path) -> LoaderResult<String> {
    std::fs::read_to_string(path).map_err(|source| LoaderError::Read {
        path: path.to_path_buf(),
        source,
    })
}
