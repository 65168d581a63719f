//! Skill loaders — host side of the WASM skill protocol.
//!
//! A skill module is an opaque WASI command: it reads one JSON request on
//! stdin and writes one JSON response on stdout. This crate finds a runtime
//! for it, feeds it the request, and turns its answer into an exit code.

pub mod cli;
pub mod config;
pub mod envelope;
pub mod invoke;
pub mod loader;
pub mod locator;
#[cfg(feature = "embedded")]
pub mod wasm;
