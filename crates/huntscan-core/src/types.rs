use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One `{algorithm → hex digest}` entry, selectable per run. Mirrors the
/// `hash_algorithms` tunable in §6; an empty set means `match.hashes == {}`
/// and the evidence is never read for hashing (§8 boundary property).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha3_256,
    Blake2b,
}

impl HashAlgorithm {
    pub fn label(self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha3_256 => "sha3-256",
            HashAlgorithm::Blake2b => "blake2b",
        }
    }
}

/// The only target kind the core knows about: a file on disk (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub identifier: PathBuf,
}

impl Target {
    pub fn file(identifier: PathBuf) -> Self {
        Target {
            kind: "file",
            identifier,
        }
    }
}

/// One matched pattern occurrence inside an evidence (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StringMatch {
    pub offset: u64,
    pub reference: String,
    pub literal: String,
}

/// The rule-hit payload nested under `MatchRecord.match` (named `detail`
/// here since `match` is a reserved word).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchDetail {
    pub timestamp: String,
    pub rule: String,
    pub meta: BTreeMap<String, String>,
    pub namespace: String,
    pub tags: Vec<String>,
    pub hashes: BTreeMap<String, String>,
    pub strings: Vec<StringMatch>,
}

/// One line of the `matches.json` output artifact (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchRecord {
    pub origin: String,
    pub target: Target,
    #[serde(rename = "match")]
    pub detail: MatchDetail,
}

/// Outcome of scanning one evidence against one ruleset, returned in place
/// of exceptions-as-control-flow (§9 redesign note).
#[derive(Debug)]
pub enum ScanOutcome {
    Ok(Vec<MatchRecord>),
    Skipped(String),
    Failed(crate::error::ScanError),
}

/// Immutable configuration snapshot delivered to the core (§5: "no global
/// mutable state... configuration is an immutable snapshot taken at
/// start"; §6 lists the recognized tunables).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub processes: usize,
    pub fallback_processes: usize,
    pub max_size: u64,
    pub hash_algorithms: Vec<HashAlgorithm>,
    pub fast: bool,
    pub ignore_warnings: bool,
    pub includes_enabled: bool,
    pub match_timeout: std::time::Duration,
    pub output_character_encoding: OutputEncoding,
    pub output_format: OutputFormat,
    pub neutralize_matching_evidences: bool,
    pub product_suffix: String,
    /// `chrono` strftime pattern `match.timestamp` is rendered with (§3:
    /// "ISO-ish local timestamp string, format configurable").
    pub timestamp_format: String,
}

impl RunConfig {
    /// Default `timestamp_format`, matching the original's pendulum
    /// `timestamp()` helper default.
    pub fn default_timestamp_format() -> String {
        "%Y-%m-%d %H:%M:%S".to_string()
    }
    /// `warnings_are_errors` as used by `RulesetCompiler` (§4.1), the
    /// inverse of the caller-facing `ignore_warnings` flag.
    pub fn warnings_are_errors(&self) -> bool {
        !self.ignore_warnings
    }

    /// Worker count after applying the CPU-detection fallback (§4.3,
    /// §9 open question: fallback only substitutes on a zero detection,
    /// it never caps a non-zero one).
    pub fn effective_processes(&self) -> usize {
        if self.processes == 0 {
            self.fallback_processes.max(1)
        } else {
            self.processes
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }

    /// §9 open question: "implementers should treat unknown formats as a
    /// fatal configuration error." Only one format is wired today, so any
    /// other string is rejected here rather than reaching `RunConfig`.
    pub fn parse_or_err(value: &str) -> Result<Self, crate::error::CoreError> {
        Self::parse(value).ok_or_else(|| crate::error::CoreError::UnsupportedFormat(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    Utf8,
}

impl OutputEncoding {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(OutputEncoding::Utf8),
            _ => None,
        }
    }

    pub fn parse_or_err(value: &str) -> Result<Self, crate::error::CoreError> {
        Self::parse(value)
            .ok_or_else(|| crate::error::CoreError::UnsupportedEncoding(value.to_string()))
    }
}

/// The `Case` handle the outer program hands to the core (§6).
#[derive(Debug, Clone)]
pub struct Case {
    pub evidences: Vec<PathBuf>,
    pub matches_path: PathBuf,
    pub storage_dir: PathBuf,
    pub config: RunConfig,
}

/// Summary returned by [`crate::run_scan`] once the pipeline completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanSummary {
    pub rulesets_loaded: usize,
    pub rules_loaded: usize,
    pub match_count: usize,
    pub matched_evidence_count: usize,
}
