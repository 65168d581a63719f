//! Injection loader — weaves generated test steps into a source file with
//! `inject-inline.wasm`.
//!
//! Exit codes: 0 success (preview or applied), 1 injection failed, 2
//! usage/input error. The source file is only rewritten when `--apply` was
//! given and the module confirms it applied the change.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{read_text, require_module, run_module, Console, LoaderError, LoaderResult};
use super::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::config::LoaderConfig;
use crate::envelope::{
    effective_exit_code, InjectOptions, RequestEnvelope, ResponseEnvelope, SpecFormat,
};
use crate::invoke::ModuleOutput;

pub const MODULE_NAME: &str = "inject-inline.wasm";

const RUNTIME_HINT: &str = "Install wasmtime or run build-wasm.sh";

/// Parsed command line of the injection loader.
#[derive(Debug, Clone)]
pub struct InjectArgs {
    pub spec: PathBuf,
    pub source: PathBuf,
    pub options: InjectOptions,
}

/// Run the injection loader end to end and return the process exit code.
pub async fn run(args: &InjectArgs, config: &LoaderConfig, console: &mut Console<'_>) -> i32 {
    let code = match execute(args, config).await {
        Ok(output) => report(args, &output, console),
        Err(e) => console.fail(&e),
    };
    console.flush();
    code
}

async fn execute(args: &InjectArgs, config: &LoaderConfig) -> LoaderResult<ModuleOutput> {
    if !args.spec.exists() {
        return Err(LoaderError::SpecNotFound(args.spec.clone()));
    }
    if !args.source.exists() {
        return Err(LoaderError::SourceNotFound(args.source.clone()));
    }
    let module = require_module(config, MODULE_NAME)?;
    let request = build_request(args)?;
    let json = request.to_json().map_err(|e| LoaderError::InvalidSpec {
        origin: args.spec.display().to_string(),
        reason: e.to_string(),
    })?;
    // The embedded engine is not offered here: injection always goes
    // through a runtime binary.
    run_module(config, &module, &json, false, RUNTIME_HINT).await
}

/// Parse the spec by extension, read the source verbatim, wrap both.
pub fn build_request(args: &InjectArgs) -> LoaderResult<RequestEnvelope> {
    let spec_text = read_text(&args.spec)?;
    let spec = SpecFormat::from_path(&args.spec)
        .parse(&spec_text)
        .map_err(|reason| LoaderError::InvalidSpec {
            origin: args.spec.display().to_string(),
            reason,
        })?;
    let source_content = read_text(&args.source)?;

    Ok(RequestEnvelope::Inject {
        spec,
        source_content,
        source_path: args.source.display().to_string(),
        options: args.options.clone(),
    })
}

/// Interpret the module response: write back, preview, or fail.
pub fn report(args: &InjectArgs, output: &ModuleOutput, console: &mut Console<'_>) -> i32 {
    let stdout = output.stdout.trim();
    let stderr = output.stderr.trim();

    if !stderr.is_empty() {
        console.warn(stderr);
    }

    let Some(response) = ResponseEnvelope::parse(stdout) else {
        if !stdout.is_empty() {
            console.say(stdout);
        }
        return effective_exit_code(stdout, output.status);
    };

    if response.success != Some(true) {
        let error = response.error.as_deref().unwrap_or("Unknown error");
        console.warn(format_args!("Error: {error}"));
        return EXIT_FAILURE;
    }

    if let Err(e) = apply_or_preview(args, &response, console) {
        return console.fail(&e);
    }
    report_unmatched(&response, console);
    EXIT_SUCCESS
}

fn apply_or_preview(
    args: &InjectArgs,
    response: &ResponseEnvelope,
    console: &mut Console<'_>,
) -> LoaderResult<()> {
    let steps = response.step_count_display();
    let applied = response.applied.unwrap_or(false);

    if applied && args.options.apply {
        let text = response.result_text().ok_or_else(|| {
            LoaderError::ModuleFailure("module reported applied changes without a result".into())
        })?;
        write_back(&args.source, text)?;
        info!("wrote {} bytes to {}", text.len(), args.source.display());
        console.say(format_args!(
            "Injected {steps} steps into {}",
            args.source.display()
        ));
        return Ok(());
    }

    if applied {
        warn!("module reported applied changes without --apply; treating as preview");
    }
    let preview = match &response.result {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    console.say(preview);
    console.say("");
    console.say(format_args!("Preview: {steps} steps would be injected"));
    console.say("   Run with --apply to apply changes");
    Ok(())
}

fn report_unmatched(response: &ResponseEnvelope, console: &mut Console<'_>) {
    if response.unmatched_steps.is_empty() {
        return;
    }
    console.say("");
    console.say("Unmatched steps (will be inserted at suggested positions):");
    for test in &response.unmatched_steps {
        console.say(format_args!("  Test: {}", test.test_id_display()));
        for step in &test.steps {
            console.say(format_args!(
                "    - Step {}: {} (suggested line {})",
                step.display_index(),
                step.action_display(),
                step.suggested_line_display()
            ));
        }
    }
}

/// Replace `path` with `content` atomically, keeping its permissions.
fn write_back(path: &Path, content: &str) -> LoaderResult<()> {
    let fail = |reason: String| LoaderError::WriteBack {
        path: path.to_path_buf(),
        reason,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| fail(e.to_string()))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| fail(e.to_string()))?;
    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| fail(e.to_string()))?;
    }
    tmp.persist(path).map_err(|e| fail(e.error.to_string()))?;
    Ok(())
}
