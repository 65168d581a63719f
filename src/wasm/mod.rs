//! Embedded WASM engine — runs skill modules in-process via wasmtime.
//!
//! Only compiled with the `embedded` feature. When present, the locator can
//! offer it as an alternative to a `wasmtime` binary.
//!
//! - `runtime.rs` — WasmRuntime engine, module loading, `_start` execution
//! - `capabilities.rs` — stdio-only WASI context with in-memory pipes
//! - `error.rs` — WasmError types

pub mod capabilities;
pub mod error;
pub mod runtime;
