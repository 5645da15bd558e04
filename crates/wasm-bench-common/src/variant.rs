//! Engine variant descriptions.
//!
//! An [`EngineVariant`] names one benchmarking target: which backend runs the
//! module and with which [`EngineSettings`]. Variants are resolved once from
//! configuration and never mutated afterwards.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// WebAssembly page size in bytes (64 KiB).
pub const WASM_PAGE_SIZE: usize = 65536;

/// The execution backend behind a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Pure interpreter (wasmi).
    Interpreter,
    /// Cranelift-compiled, recompiled on every run.
    Aot,
    /// Cranelift-compiled, reusing artifacts from the compilation cache.
    AotCached,
    /// Third-party interpreter (tinywasm).
    Tinywasm,
    /// Wasmtime's Winch baseline compiler.
    Winch,
}

impl BackendKind {
    /// Every backend, in the default run order.
    pub const ALL: [BackendKind; 5] = [
        BackendKind::Interpreter,
        BackendKind::Aot,
        BackendKind::AotCached,
        BackendKind::Tinywasm,
        BackendKind::Winch,
    ];

    /// Stable short name, also accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Interpreter => "interpreter",
            BackendKind::Aot => "aot",
            BackendKind::AotCached => "aot-cached",
            BackendKind::Tinywasm => "tinywasm",
            BackendKind::Winch => "winch",
        }
    }

    /// Default display label for a variant of this backend.
    pub fn default_label(self) -> &'static str {
        match self {
            BackendKind::Interpreter => "wasmi (interpreter)",
            BackendKind::Aot => "wasmtime (aot, no cache)",
            BackendKind::AotCached => "wasmtime (aot, cached)",
            BackendKind::Tinywasm => "tinywasm",
            BackendKind::Winch => "wasmtime (winch)",
        }
    }

    /// Whether this backend uses the compilation cache.
    pub fn uses_cache(self) -> bool {
        matches!(self, BackendKind::AotCached)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = BackendKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown backend '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

/// Engine-specific settings for one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Cap on linear memory, in 64 KiB pages.
    pub memory_limit_pages: u32,

    /// Directory for persisted compilation artifacts.
    ///
    /// `None` means the in-memory cache is used. Only read by cached backends.
    pub cache_dir: Option<PathBuf>,
}

impl EngineSettings {
    /// Memory limit in bytes.
    pub fn memory_limit_bytes(&self) -> usize {
        self.memory_limit_pages as usize * WASM_PAGE_SIZE
    }
}

/// One benchmarking target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineVariant {
    /// Display label used in reports.
    pub name: String,

    /// Backend executing the module.
    pub backend: BackendKind,

    /// Engine-specific settings.
    pub settings: EngineSettings,
}

impl EngineVariant {
    /// Create a variant.
    pub fn new(name: impl Into<String>, backend: BackendKind, settings: EngineSettings) -> Self {
        Self {
            name: name.into(),
            backend,
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_round_trip_names() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.as_str().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_backend_kind_unknown() {
        let err = "wasm3".parse::<BackendKind>().unwrap_err();
        assert!(err.contains("unknown backend 'wasm3'"));
        assert!(err.contains("aot-cached"));
    }

    #[test]
    fn test_backend_kind_serde_matches_as_str() {
        let json = serde_json::to_string(&BackendKind::AotCached).unwrap();
        assert_eq!(json, "\"aot-cached\"");
    }

    #[test]
    fn test_memory_limit_bytes() {
        let settings = EngineSettings {
            memory_limit_pages: 62,
            cache_dir: None,
        };
        assert_eq!(settings.memory_limit_bytes(), 62 * 65536);
    }

    #[test]
    fn test_only_aot_cached_uses_cache() {
        let cached: Vec<_> = BackendKind::ALL
            .into_iter()
            .filter(|k| k.uses_cache())
            .collect();
        assert_eq!(cached, vec![BackendKind::AotCached]);
    }
}
