//! Validation loader — checks a test spec with `validate-test.wasm`.
//!
//! Exit codes: 0 passed, 1 failed, 2 usage/input error.

use std::io::Read;
use std::path::PathBuf;

use tracing::warn;

use super::{read_text, require_module, run_module, Console, LoaderError, LoaderResult};
use crate::config::LoaderConfig;
use crate::envelope::{effective_exit_code, RequestEnvelope, ResponseEnvelope, SpecFormat};
use crate::invoke::ModuleOutput;
use crate::loader::EXIT_FAILURE;

pub const MODULE_NAME: &str = "validate-test.wasm";

const RUNTIME_HINT: &str =
    "Install wasmtime, build the loader with the `embedded` feature, or run build-wasm.sh";

/// Where the spec comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    File(PathBuf),
    Stdin,
}

impl SpecSource {
    fn label(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Stdin => "<stdin>".into(),
        }
    }
}

/// Run the validation loader end to end and return the process exit code.
pub async fn run(
    source: &SpecSource,
    config: &LoaderConfig,
    stdin: &mut dyn Read,
    console: &mut Console<'_>,
) -> i32 {
    let code = match execute(source, config, stdin).await {
        Ok(output) => report(&output, console),
        Err(e) => console.fail(&e),
    };
    console.flush();
    code
}

async fn execute(
    source: &SpecSource,
    config: &LoaderConfig,
    stdin: &mut dyn Read,
) -> LoaderResult<ModuleOutput> {
    let text = read_spec(source, stdin)?;
    let module = require_module(config, MODULE_NAME)?;
    let request = build_request(source, &text)?;
    let json = request.to_json().map_err(|e| LoaderError::InvalidSpec {
        origin: source.label(),
        reason: e.to_string(),
    })?;
    run_module(config, &module, &json, true, RUNTIME_HINT).await
}

fn read_spec(source: &SpecSource, stdin: &mut dyn Read) -> LoaderResult<String> {
    match source {
        SpecSource::File(path) => {
            if !path.exists() {
                return Err(LoaderError::FileNotFound(path.clone()));
            }
            read_text(path)
        }
        SpecSource::Stdin => {
            let mut text = String::new();
            stdin
                .read_to_string(&mut text)
                .map_err(|source| LoaderError::Read {
                    path: PathBuf::from("<stdin>"),
                    source,
                })?;
            Ok(text)
        }
    }
}

/// Wrap the spec text as `{"action":"validate","spec":...}`.
pub fn build_request(source: &SpecSource, text: &str) -> LoaderResult<RequestEnvelope> {
    let format = match source {
        SpecSource::File(path) => SpecFormat::from_path(path),
        SpecSource::Stdin => SpecFormat::Json,
    };
    let spec = format.parse(text).map_err(|reason| LoaderError::InvalidSpec {
        origin: source.label(),
        reason,
    })?;
    Ok(RequestEnvelope::Validate { spec })
}

/// Relay module output and compute the exit code.
pub fn report(output: &ModuleOutput, console: &mut Console<'_>) -> i32 {
    let stdout = output.stdout.trim();
    let stderr = output.stderr.trim();

    let mut code = effective_exit_code(stdout, output.status);
    if let Some(response) = ResponseEnvelope::parse(stdout) {
        if response.success == Some(false) && code == 0 {
            warn!("module reported failure with exit code 0, forcing {EXIT_FAILURE}");
            code = EXIT_FAILURE;
        }
    }

    if !stdout.is_empty() {
        console.say(stdout);
    }
    if !stderr.is_empty() {
        console.warn(stderr);
    }
    code
}
