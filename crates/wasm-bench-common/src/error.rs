//! Error types for wasm-bench.
//!
//! [`BenchError`] is the single error taxonomy shared by every engine adapter,
//! the runner and the comparator. Each variant corresponds to the phase that
//! produced it, so a failed run can always be attributed:
//!
//! - [`BenchError::Compile`]: the engine rejected the module bytes
//! - [`BenchError::Instantiation`]: linking or memory initialisation failed
//! - [`BenchError::ExportNotFound`]: the module has no usable `program` export
//! - [`BenchError::Call`]: the exported function trapped or returned garbage
//! - [`BenchError::Configuration`]: the harness itself was misconfigured

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message reported verbatim when the `program` export cannot be resolved.
pub const EXPORT_NOT_FOUND_MESSAGE: &str = "the program wasm function is not found";

/// Benchmark errors.
#[derive(Error, Debug)]
pub enum BenchError {
    /// The engine failed to compile (or deserialize) the module.
    #[error("Compilation failed: {reason}")]
    Compile {
        /// Description of the compilation failure.
        reason: String,
    },

    /// The compiled module could not be instantiated.
    ///
    /// Typically caused by unresolved imports or a memory minimum that
    /// exceeds the configured page limit.
    #[error("Instantiation failed: {reason}")]
    Instantiation {
        /// Description of the instantiation failure.
        reason: String,
    },

    /// The module does not export a zero-argument `program` function.
    #[error("{}", EXPORT_NOT_FOUND_MESSAGE)]
    ExportNotFound {
        /// Name of the export that was looked up.
        name: String,
    },

    /// Invoking the exported function failed.
    #[error("Call failed: {reason}")]
    Call {
        /// Description of the trap or result mismatch.
        reason: String,
    },

    /// Invalid harness configuration.
    #[error("Invalid configuration: {reason}")]
    Configuration {
        /// Description of the configuration error.
        reason: String,
    },

    /// The engine panicked while running a variant.
    #[error("Engine panicked: {message}")]
    Panicked {
        /// Panic payload, if it was a string.
        message: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Serializable discriminant of a [`BenchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`BenchError::Compile`].
    CompileFailure,
    /// See [`BenchError::Instantiation`].
    InstantiationFailure,
    /// See [`BenchError::ExportNotFound`].
    ExportNotFound,
    /// See [`BenchError::Call`].
    CallFailure,
    /// See [`BenchError::Configuration`].
    ConfigurationError,
    /// See [`BenchError::Panicked`].
    Panicked,
    /// See [`BenchError::Io`].
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::CompileFailure => "CompileFailure",
            ErrorKind::InstantiationFailure => "InstantiationFailure",
            ErrorKind::ExportNotFound => "ExportNotFound",
            ErrorKind::CallFailure => "CallFailure",
            ErrorKind::ConfigurationError => "ConfigurationError",
            ErrorKind::Panicked => "Panicked",
            ErrorKind::Io => "Io",
        };
        f.write_str(label)
    }
}

impl BenchError {
    /// Create a new `Compile` error.
    pub fn compile(reason: impl Into<String>) -> Self {
        Self::Compile {
            reason: reason.into(),
        }
    }

    /// Create a new `Instantiation` error.
    pub fn instantiation(reason: impl Into<String>) -> Self {
        Self::Instantiation {
            reason: reason.into(),
        }
    }

    /// Create a new `ExportNotFound` error.
    pub fn export_not_found(name: impl Into<String>) -> Self {
        Self::ExportNotFound { name: name.into() }
    }

    /// Create a new `Call` error.
    pub fn call(reason: impl Into<String>) -> Self {
        Self::Call {
            reason: reason.into(),
        }
    }

    /// Create a new `Configuration` error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a new `Panicked` error.
    pub fn panicked(message: impl Into<String>) -> Self {
        Self::Panicked {
            message: message.into(),
        }
    }

    /// The serializable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Compile { .. } => ErrorKind::CompileFailure,
            Self::Instantiation { .. } => ErrorKind::InstantiationFailure,
            Self::ExportNotFound { .. } => ErrorKind::ExportNotFound,
            Self::Call { .. } => ErrorKind::CallFailure,
            Self::Configuration { .. } => ErrorKind::ConfigurationError,
            Self::Panicked { .. } => ErrorKind::Panicked,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Returns `true` if the module lacks a usable `program` export.
    pub fn is_export_not_found(&self) -> bool {
        matches!(self, Self::ExportNotFound { .. })
    }

    /// Returns `true` if this error must abort the whole comparison
    /// rather than a single variant.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Io(_))
    }
}
