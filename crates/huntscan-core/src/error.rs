use std::path::PathBuf;

use thiserror::Error;

/// Failure modes surfaced while compiling one ruleset file. Per §7,
/// `RulesetSyntax` only discards the offending ruleset; it never reaches
/// `CoreError`.
#[derive(Debug, Error)]
pub enum RulesetError {
    #[error("syntax error in ruleset {path}: {source}")]
    Syntax {
        path: PathBuf,
        #[source]
        source: yara_x::errors::CompileError,
    },

    #[error("ruleset {path} produced {count} warning(s) and warnings_are_errors is set")]
    WarningsAsErrors { path: PathBuf, count: usize },

    #[error("failed to serialize compiled ruleset {path}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: yara_x::errors::SerializationError,
    },

    #[error("failed to read ruleset file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-job failures. Logged and folded into the per-evidence state machine
/// (§4.7); never propagated out of the pool.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan of {path} against ruleset {ruleset} timed out")]
    Timeout { path: PathBuf, ruleset: String },

    #[error("scan engine error on {path} against ruleset {ruleset}: {source}")]
    Engine {
        path: PathBuf,
        ruleset: String,
        #[source]
        source: yara_x::errors::ScanError,
    },

    #[error("failed to read evidence {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to deserialize compiled ruleset {ruleset}")]
    Deserialize {
        ruleset: String,
        #[source]
        source: yara_x::errors::SerializationError,
    },
}

/// Archival failures. Logged per-file; the archive loop always continues.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to create storage directory {path}")]
    CreateStorageDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy matching evidence {from} to {to}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to neutralize stored copy {path}")]
    Neutralize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reader-loop failures. `OutputOpenError` is fatal; `OutputEncodeError`
/// only drops the offending record.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("failed to open output file {path}")]
    OutputOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write record for {identifier} to output file")]
    OutputEncode {
        identifier: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level error returned by [`crate::run_scan`]. Only the two fatal
/// kinds from §7 (`NoRulesetsLoaded`, `OutputOpenError`) and configuration
/// validation failures surface here.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no YARA ruleset(s) loaded")]
    NoRulesetsLoaded,

    #[error(transparent)]
    OutputOpen(#[from] ReaderError),

    #[error("unsupported output format {0:?}")]
    UnsupportedFormat(String),

    #[error("unsupported output character encoding {0:?}")]
    UnsupportedEncoding(String),

    #[error("failed to discover ruleset files under {path}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
