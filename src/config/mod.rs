//! Loader configuration — where modules and runtimes live, and run limits.
//!
//! Defaults come from the loader's own location, never the caller's cwd:
//!
//! ```text
//! <repo>/runtimes/<platform>/wasmtime       runtimes_dir
//! <repo>/skills/<skill>/scripts/dist/       dist_dir
//! <repo>/skills/<skill>/scripts/loaders/    loader_dir (the executable)
//! ```
//!
//! Resolution: defaults → `loader.yaml` next to the executable → env vars.
//! CLI flags are applied on top by the binaries.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const ENV_DIST_DIR: &str = "SKILL_LOADER_DIST_DIR";
pub const ENV_RUNTIMES_DIR: &str = "SKILL_LOADER_RUNTIMES_DIR";
pub const ENV_TIMEOUT_SECS: &str = "SKILL_LOADER_TIMEOUT_SECS";
pub const ENV_ENGINE: &str = "SKILL_LOADER_ENGINE";

/// Which execution strategies the locator may pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EnginePreference {
    /// Bundled binary, then embedded engine (when offered), then PATH.
    #[default]
    Auto,
    /// Only runtime binaries, never the embedded engine.
    Process,
    /// Only the embedded engine.
    Embedded,
}

impl std::str::FromStr for EnginePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "process" => Ok(Self::Process),
            "embedded" => Ok(Self::Embedded),
            other => Err(format!("unknown engine '{other}' (expected auto, process or embedded)")),
        }
    }
}

/// Optional `loader.yaml` contents. Every key may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    dist_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    runtimes_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine: Option<EnginePreference>,
}

/// Fully resolved loader configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub dist_dir: PathBuf,
    pub runtimes_dir: PathBuf,
    pub timeout: Duration,
    pub engine: EnginePreference,
}

/// Directory holding the running executable.
pub fn loader_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.canonicalize().ok())
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl LoaderConfig {
    /// Layout defaults relative to `loader_dir`.
    pub fn defaults_for(loader_dir: &Path) -> Self {
        let scripts_dir = loader_dir.join("..");
        let repo_root = loader_dir.join("..").join("..").join("..").join("..");
        Self {
            dist_dir: scripts_dir.join("dist"),
            runtimes_dir: repo_root.join("runtimes"),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            engine: EnginePreference::Auto,
        }
    }

    /// Load config for the running executable: defaults, file, then env.
    pub fn load() -> Self {
        let dir = loader_dir();
        let mut config = Self::defaults_for(&dir);
        config.merge_file(&dir);
        config.merge_env(|key| std::env::var(key).ok());
        config
    }

    /// Path of a module inside the dist directory.
    pub fn module_path(&self, module_name: &str) -> PathBuf {
        self.dist_dir.join(module_name)
    }

    /// Overlay `loader.yaml` from `loader_dir`, if present and well-formed.
    fn merge_file(&mut self, loader_dir: &Path) {
        let path = loader_dir.join("loader.yaml");
        let file: FileConfig = match std::fs::read_to_string(&path) {
            Ok(content) => serde_yaml::from_str(&content).unwrap_or_else(|e| {
                warn!("ignoring malformed {}: {e}", path.display());
                FileConfig::default()
            }),
            Err(_) => return,
        };
        self.apply_file(file, loader_dir);
    }

    fn apply_file(&mut self, file: FileConfig, base: &Path) {
        if let Some(dist) = file.dist_dir {
            self.dist_dir = base.join(dist);
        }
        if let Some(runtimes) = file.runtimes_dir {
            self.runtimes_dir = base.join(runtimes);
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(engine) = file.engine {
            self.engine = engine;
        }
    }

    /// Overlay environment variables read through `lookup`.
    fn merge_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dist) = lookup(ENV_DIST_DIR).filter(|v| !v.is_empty()) {
            self.dist_dir = PathBuf::from(dist);
        }
        if let Some(runtimes) = lookup(ENV_RUNTIMES_DIR).filter(|v| !v.is_empty()) {
            self.runtimes_dir = PathBuf::from(runtimes);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.timeout = Duration::from_secs(secs),
                Err(e) => warn!("ignoring {ENV_TIMEOUT_SECS}={raw}: {e}"),
            }
        }
        if let Some(raw) = lookup(ENV_ENGINE) {
            match raw.parse::<EnginePreference>() {
                Ok(engine) => self.engine = engine,
                Err(e) => warn!("ignoring {ENV_ENGINE}: {e}"),
            }
        }
    }
}
