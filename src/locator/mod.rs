//! Runtime locator — decides what will execute a skill module.
//!
//! Order, first match wins:
//! 1. bundled binary at `runtimes/<platform>/wasmtime[.exe]`
//! 2. the embedded engine, when compiled in and offered by the caller
//! 3. `wasmtime[.exe]` on `PATH`
//!
//! Unsupported platforms skip step 1. Resolved once per run, never cached.

pub mod platform;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::EnginePreference;
pub use platform::Platform;

/// Whether the embedded engine was compiled into this binary.
pub const EMBEDDED_AVAILABLE: bool = cfg!(feature = "embedded");

/// The selected execution strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeChoice {
    /// Runtime binary shipped under `runtimes/`.
    Bundled(PathBuf),
    /// In-process wasmtime.
    Embedded,
    /// Runtime binary found on `PATH`.
    System(PathBuf),
}

impl RuntimeChoice {
    /// Human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Bundled(path) => format!("bundled runtime {}", path.display()),
            Self::Embedded => "embedded wasmtime engine".into(),
            Self::System(path) => format!("system runtime {}", path.display()),
        }
    }
}

/// No runtime could be found.
#[derive(Debug, Clone, thiserror::Error)]
#[error("wasmtime not found")]
pub struct RuntimeNotFound;

/// Inputs to runtime resolution. Everything host-specific is a field so it
/// can be substituted.
#[derive(Debug, Clone)]
pub struct RuntimeLocator<'a> {
    pub platform: Platform<'a>,
    pub runtimes_dir: PathBuf,
    /// Raw `PATH` value; `None` means no search path.
    pub search_path: Option<OsString>,
    /// Embedded engine is compiled in.
    pub embedded_available: bool,
    /// Caller accepts the embedded engine (validation loader only).
    pub offer_embedded: bool,
    pub preference: EnginePreference,
}

impl RuntimeLocator<'static> {
    /// Locator for the current host and process environment.
    pub fn for_host(runtimes_dir: &Path, offer_embedded: bool, preference: EnginePreference) -> Self {
        Self {
            platform: Platform::host(),
            runtimes_dir: runtimes_dir.to_path_buf(),
            search_path: std::env::var_os("PATH"),
            embedded_available: EMBEDDED_AVAILABLE,
            offer_embedded,
            preference,
        }
    }
}

impl RuntimeLocator<'_> {
    /// Resolve a runtime, first match wins.
    pub fn locate(&self) -> Result<RuntimeChoice, RuntimeNotFound> {
        let embedded_ok = self.embedded_available && self.offer_embedded;

        if self.preference == EnginePreference::Embedded {
            return if embedded_ok {
                Ok(RuntimeChoice::Embedded)
            } else {
                Err(RuntimeNotFound)
            };
        }

        if let Some(path) = self.bundled() {
            return Ok(RuntimeChoice::Bundled(path));
        }

        if embedded_ok && self.preference == EnginePreference::Auto {
            return Ok(RuntimeChoice::Embedded);
        }

        if let Some(path) = self.system() {
            return Ok(RuntimeChoice::System(path));
        }

        Err(RuntimeNotFound)
    }

    /// Bundled binary for this platform, if present and executable.
    fn bundled(&self) -> Option<PathBuf> {
        let key = self.platform.key()?;
        let candidate = self.runtimes_dir.join(key).join(self.platform.binary_name());
        debug!("checking bundled runtime at {}", candidate.display());
        is_executable(&candidate).then_some(candidate)
    }

    /// First executable runtime binary on the search path.
    fn system(&self) -> Option<PathBuf> {
        let search_path = self.search_path.as_ref()?;
        let name = self.platform.binary_name();
        std::env::split_paths(search_path)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
    }
}

/// Regular file with an execute bit (any file on non-unix hosts).
pub fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
