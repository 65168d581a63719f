//! Loader error taxonomy and exit-code mapping.

use std::path::PathBuf;

use thiserror::Error;

use crate::invoke::InvokeError;

/// Bad arguments or unreadable input.
pub const EXIT_USAGE: i32 = 2;
/// The module ran and reported failure.
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_SUCCESS: i32 = 0;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Spec file not found: {}", .0.display())]
    SpecNotFound(PathBuf),

    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid spec in {origin}: {reason}")]
    InvalidSpec { origin: String, reason: String },

    #[error("WASM module not found: {}", .0.display())]
    ModuleNotFound(PathBuf),

    #[error("wasmtime not found.")]
    RuntimeNotFound { hint: &'static str },

    #[error("{0}")]
    Invoke(#[from] InvokeError),

    #[error("{0}")]
    ModuleFailure(String),

    #[error("Cannot write {}: {reason}", .path.display())]
    WriteBack { path: PathBuf, reason: String },
}

pub type LoaderResult<T> = Result<T, LoaderError>;

impl LoaderError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound(_)
            | Self::SpecNotFound(_)
            | Self::SourceNotFound(_)
            | Self::Read { .. }
            | Self::InvalidSpec { .. }
            | Self::ModuleNotFound(_)
            | Self::RuntimeNotFound { .. } => EXIT_USAGE,
            Self::Invoke(InvokeError::Timeout(_)) => EXIT_FAILURE,
            Self::Invoke(_) => EXIT_USAGE,
            Self::ModuleFailure(_) | Self::WriteBack { .. } => EXIT_FAILURE,
        }
    }

    /// Follow-up line printed after the error, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ModuleNotFound(_) => Some("Run build-wasm.sh to build the module."),
            Self::RuntimeNotFound { hint } => Some(*hint),
            _ => None,
        }
    }
}
