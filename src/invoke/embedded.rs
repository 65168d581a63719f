//! EmbeddedInvoker — run a module inside this process via wasmtime.
//!
//! The sync engine runs on a blocking task. A ticker task bumps the engine
//! epoch after the deadline so a runaway guest traps instead of hanging.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{InvokeError, ModuleInvoker, ModuleOutput};
use crate::wasm::error::WasmError;
use crate::wasm::runtime::WasmRuntime;

const EPOCH_RETICK: Duration = Duration::from_millis(50);

pub struct EmbeddedInvoker {
    runtime: WasmRuntime,
    timeout: Duration,
}

impl EmbeddedInvoker {
    pub fn new(timeout: Duration) -> Result<Self, InvokeError> {
        let runtime = WasmRuntime::new().map_err(|e| InvokeError::Engine(e.to_string()))?;
        Ok(Self { runtime, timeout })
    }
}

#[async_trait]
impl ModuleInvoker for EmbeddedInvoker {
    async fn invoke(&self, module: &Path, request: &str) -> Result<ModuleOutput, InvokeError> {
        let runtime = self.runtime.clone();
        let path = module.to_path_buf();
        let input = request.as_bytes().to_vec();
        let limit = self.timeout;

        let ticker_runtime = self.runtime.clone();
        let ticker = tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            // Keep ticking in case the guest had not armed its deadline yet.
            loop {
                ticker_runtime.interrupt();
                tokio::time::sleep(EPOCH_RETICK).await;
            }
        });

        debug!("running {} in-process", path.display());
        let result = tokio::task::spawn_blocking(move || {
            let compiled = runtime.load_module_from_path(&path)?;
            runtime.run_command(&compiled, &input, limit)
        })
        .await;
        ticker.abort();

        let output = result
            .map_err(|e| InvokeError::Engine(format!("engine task panicked: {e}")))?
            .map_err(|e| match e {
                WasmError::Interrupted(limit) => InvokeError::Timeout(limit),
                other => InvokeError::Engine(other.to_string()),
            })?;

        debug!("module exited with status {}", output.exit_code);
        Ok(ModuleOutput::from_bytes(
            &output.stdout,
            &output.stderr,
            output.exit_code,
        ))
    }
}
