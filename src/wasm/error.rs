//! Error types for the embedded WASM engine.

#[derive(Debug, thiserror::Error)]
pub enum WasmError {
    #[error("engine creation failed: {0}")]
    EngineCreation(String),
    #[error("module compilation failed: {0}")]
    Compilation(String),
    #[error("instantiation failed: {0}")]
    Instantiation(String),
    #[error("module execution failed: {0}")]
    Execution(String),
    #[error("module did not finish within {0:?}")]
    Interrupted(std::time::Duration),
}
