//! Embedded WASM runtime — runs WASI preview1 command modules in-process.
//!
//! A skill module is a plain core module exporting `_start`. Each run gets a
//! fresh Store (no state leaks between runs) with stdio wired to in-memory
//! pipes. Wall-clock limits use epoch interruption: the caller bumps the
//! engine epoch once the deadline passes and the running guest traps.

use std::path::Path;
use std::time::Duration;

use wasmtime::{Engine, Linker, Module, Store, Trap};
use wasmtime_wasi::p1::{self, WasiP1Ctx};
use wasmtime_wasi::I32Exit;

use super::capabilities::{StdioCapture, MAX_CAPTURE};
use super::error::WasmError;

/// Raw result of one `_start` call.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Value passed to `proc_exit`, or 0 when `_start` returned normally.
    pub exit_code: i32,
}

/// The WASM engine. Cheap to clone; clones share compiled code and epoch.
#[derive(Clone)]
pub struct WasmRuntime {
    engine: Engine,
    capture_limit: usize,
}

impl std::fmt::Debug for WasmRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmRuntime").finish_non_exhaustive()
    }
}

impl WasmRuntime {
    /// Create a runtime with epoch interruption enabled.
    pub fn new() -> Result<Self, WasmError> {
        let mut config = wasmtime::Config::new();
        config.epoch_interruption(true);
        let engine =
            Engine::new(&config).map_err(|e| WasmError::EngineCreation(e.to_string()))?;
        Ok(Self {
            engine,
            capture_limit: MAX_CAPTURE,
        })
    }

    /// Cap captured stdout and stderr at `limit` bytes each.
    #[cfg(test)]
    pub(crate) fn with_capture_limit(mut self, limit: usize) -> Self {
        self.capture_limit = limit;
        self
    }

    /// Interrupt every guest currently running on this engine.
    pub fn interrupt(&self) {
        self.engine.increment_epoch();
    }

    /// Compile a module from raw bytes (binary or text format).
    pub fn load_module(&self, bytes: &[u8]) -> Result<Module, WasmError> {
        Module::new(&self.engine, bytes).map_err(|e| WasmError::Compilation(e.to_string()))
    }

    /// Compile a module from a filesystem path.
    pub fn load_module_from_path(&self, path: &Path) -> Result<Module, WasmError> {
        Module::from_file(&self.engine, path)
            .map_err(|e| WasmError::Compilation(format!("{}: {e}", path.display())))
    }

    /// Run a command module to completion with `input` as its stdin.
    ///
    /// Blocks the calling thread. `limit` is only used to label the
    /// `Interrupted` error; the deadline itself is enforced by whoever
    /// calls [`WasmRuntime::interrupt`].
    pub fn run_command(
        &self,
        module: &Module,
        input: &[u8],
        limit: Duration,
    ) -> Result<CommandOutput, WasmError> {
        let (ctx, capture) = StdioCapture::wire(input, self.capture_limit);
        let mut store = Store::new(&self.engine, ctx);
        store.set_epoch_deadline(1);

        let mut linker: Linker<WasiP1Ctx> = Linker::new(&self.engine);
        p1::add_to_linker_sync(&mut linker, |ctx| ctx)
            .map_err(|e| WasmError::Instantiation(format!("WASI link failed: {e}")))?;

        let instance = linker
            .instantiate(&mut store, module)
            .map_err(|e| WasmError::Instantiation(e.to_string()))?;

        let start = instance
            .get_typed_func::<(), ()>(&mut store, "_start")
            .map_err(|e| WasmError::Instantiation(format!("export '_start' not usable: {e}")))?;

        let exit_code = match start.call(&mut store, ()) {
            Ok(()) => 0,
            Err(e) => {
                if let Some(exit) = e.downcast_ref::<I32Exit>() {
                    exit.0
                } else if matches!(e.downcast_ref::<Trap>(), Some(Trap::Interrupt)) {
                    return Err(WasmError::Interrupted(limit));
                } else {
                    return Err(WasmError::Execution(format!("_start trapped: {e}")));
                }
            }
        };

        drop(store);
        Ok(CommandOutput {
            stdout: capture.stdout(),
            stderr: capture.stderr(),
            exit_code,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Tiny preview1 command modules assembled from WAT.

    /// Writes `text` to stdout, then returns normally.
    pub fn print_module(text: &str) -> Vec<u8> {
        let escaped: String = text
            .bytes()
            .map(|b| format!("\\{b:02x}"))
            .collect();
        wat::parse_str(format!(
            r#"(module
                (import "wasi_snapshot_preview1" "fd_write"
                  (func $fd_write (param i32 i32 i32 i32) (result i32)))
                (memory (export "memory") 1)
                (data (i32.const 64) "{escaped}")
                (func (export "_start")
                  (i32.store (i32.const 0) (i32.const 64))
                  (i32.store (i32.const 4) (i32.const {len}))
                  (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 16)))))"#,
            len = text.len()
        ))
        .unwrap()
    }

    /// Copies one read of stdin to stdout.
    pub fn echo_module() -> Vec<u8> {
        wat::parse_str(
            r#"(module
                (import "wasi_snapshot_preview1" "fd_read"
                  (func $fd_read (param i32 i32 i32 i32) (result i32)))
                (import "wasi_snapshot_preview1" "fd_write"
                  (func $fd_write (param i32 i32 i32 i32) (result i32)))
                (memory (export "memory") 1)
                (func (export "_start")
                  (i32.store (i32.const 0) (i32.const 64))
                  (i32.store (i32.const 4) (i32.const 4096))
                  (drop (call $fd_read (i32.const 0) (i32.const 0) (i32.const 1) (i32.const 8)))
                  (i32.store (i32.const 4) (i32.load (i32.const 8)))
                  (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 16)))))"#,
        )
        .unwrap()
    }

    /// Calls `proc_exit(code)` without printing anything.
    pub fn exit_module(code: i32) -> Vec<u8> {
        wat::parse_str(format!(
            r#"(module
                (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
                (memory (export "memory") 1)
                (func (export "_start")
                  (call $proc_exit (i32.const {code}))))"#
        ))
        .unwrap()
    }

    /// Never returns.
    pub fn spin_module() -> Vec<u8> {
        wat::parse_str(
            r#"(module
                (memory (export "memory") 1)
                (func (export "_start")
                  (loop $forever (br $forever))))"#,
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: Duration = Duration::from_secs(5);

    #[test]
    fn engine_creation() {
        assert!(WasmRuntime::new().is_ok());
    }

    #[test]
    fn load_invalid_bytes_fails() {
        let runtime = WasmRuntime::new().unwrap();
        match runtime.load_module(b"\xff\xff\xff\xff\x01\x00\x00\x00") {
            Err(WasmError::Compilation(_)) => {}
            other => panic!("expected Compilation error, got: {other:?}"),
        }
    }

    #[test]
    fn load_missing_path_fails() {
        let runtime = WasmRuntime::new().unwrap();
        let result = runtime.load_module_from_path(Path::new("/nonexistent/skill.wasm"));
        assert!(matches!(result, Err(WasmError::Compilation(_))));
    }

    #[test]
    fn stdout_is_captured() {
        let runtime = WasmRuntime::new().unwrap();
        let module = runtime
            .load_module(&fixtures::print_module(r#"{"success":true}"#))
            .unwrap();
        let out = runtime.run_command(&module, b"", LIMIT).unwrap();
        assert_eq!(out.stdout, br#"{"success":true}"#);
        assert!(out.stderr.is_empty());
        assert_eq!(out.exit_code, 0);
    }

    #[test]
    fn output_past_capture_limit_is_not_buffered() {
        let runtime = WasmRuntime::new().unwrap().with_capture_limit(8);
        let module = runtime
            .load_module(&fixtures::print_module(&"x".repeat(64)))
            .unwrap();
        match runtime.run_command(&module, b"", LIMIT) {
            Ok(out) => assert!(out.stdout.len() <= 8, "captured {} bytes", out.stdout.len()),
            Err(WasmError::Execution(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn output_within_capture_limit_is_kept_whole() {
        let runtime = WasmRuntime::new().unwrap().with_capture_limit(16);
        let module = runtime.load_module(&fixtures::print_module("12345678")).unwrap();
        let out = runtime.run_command(&module, b"", LIMIT).unwrap();
        assert_eq!(out.stdout, b"12345678");
    }

    #[test]
    fn stdin_reaches_the_module() {
        let runtime = WasmRuntime::new().unwrap();
        let module = runtime.load_module(&fixtures::echo_module()).unwrap();
        let request = br#"{"action":"validate","spec":{"name":"t"}}"#;
        let out = runtime.run_command(&module, request, LIMIT).unwrap();
        assert_eq!(out.stdout, request);
    }

    #[test]
    fn proc_exit_sets_exit_code() {
        let runtime = WasmRuntime::new().unwrap();
        let module = runtime.load_module(&fixtures::exit_module(3)).unwrap();
        let out = runtime.run_command(&module, b"", LIMIT).unwrap();
        assert_eq!(out.exit_code, 3);
    }

    #[test]
    fn missing_start_is_instantiation_error() {
        let runtime = WasmRuntime::new().unwrap();
        let module = runtime.load_module(b"(module)").unwrap();
        let result = runtime.run_command(&module, b"", LIMIT);
        assert!(matches!(result, Err(WasmError::Instantiation(_))));
    }

    #[test]
    fn interrupt_stops_a_spinning_guest() {
        let runtime = WasmRuntime::new().unwrap();
        let module = runtime.load_module(&fixtures::spin_module()).unwrap();

        let ticker = runtime.clone();
        let handle = std::thread::spawn(move || {
            for _ in 0..20 {
                std::thread::sleep(Duration::from_millis(50));
                ticker.interrupt();
            }
        });

        let result = runtime.run_command(&module, b"", Duration::from_millis(100));
        handle.join().unwrap();
        assert!(matches!(result, Err(WasmError::Interrupted(_))));
    }
}
