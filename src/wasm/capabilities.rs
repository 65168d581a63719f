//! WASI grants for a skill module run.
//!
//! A skill module gets stdio and nothing else: no filesystem, no env, no
//! sockets. Stdin is an in-memory buffer holding the request, stdout and
//! stderr are in-memory sinks the host drains after `_start` returns.

use wasmtime_wasi::p1::WasiP1Ctx;
use wasmtime_wasi::p2::pipe::{MemoryInputPipe, MemoryOutputPipe};
use wasmtime_wasi::WasiCtxBuilder;

/// Default upper bound on captured stdout/stderr per run. Writes past the
/// bound fail inside the guest; the host never buffers more.
pub const MAX_CAPTURE: usize = 16 * 1024 * 1024;

/// Host-side ends of the module's stdio.
pub struct StdioCapture {
    stdout: MemoryOutputPipe,
    stderr: MemoryOutputPipe,
}

impl StdioCapture {
    /// Build a preview1 context whose stdin yields `input` and whose
    /// stdout/stderr are captured, each up to `limit` bytes. Returns the
    /// context and the capture handle.
    pub fn wire(input: &[u8], limit: usize) -> (WasiP1Ctx, Self) {
        let stdout = MemoryOutputPipe::new(limit);
        let stderr = MemoryOutputPipe::new(limit);

        let ctx = WasiCtxBuilder::new()
            .stdin(MemoryInputPipe::new(input.to_vec()))
            .stdout(stdout.clone())
            .stderr(stderr.clone())
            .build_p1();

        (ctx, Self { stdout, stderr })
    }

    /// Captured stdout bytes so far.
    pub fn stdout(&self) -> Vec<u8> {
        self.stdout.contents().to_vec()
    }

    /// Captured stderr bytes so far.
    pub fn stderr(&self) -> Vec<u8> {
        self.stderr.contents().to_vec()
    }
}
