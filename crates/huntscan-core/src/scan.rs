use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::Path;

use tracing::warn;

use crate::error::ScanError;
use crate::hashing::compute_hashes;
use crate::store::CompiledRuleStore;
use crate::types::{MatchDetail, MatchRecord, RunConfig, StringMatch, Target};

const ORIGIN: &str = "huntscan";

/// Per-worker cache of deserialized rulesets, kept warm across jobs handled
/// by the same worker (§4.3 step 1: "cache across jobs within the worker
/// when possible"). Lives for the lifetime of one worker slot.
#[derive(Default)]
pub struct WorkerRuleCache {
    loaded: HashMap<String, yara_x::Rules>,
}

impl WorkerRuleCache {
    pub fn new() -> Self {
        WorkerRuleCache::default()
    }

    fn get_or_load<'a>(
        &'a mut self,
        ruleset_id: &str,
        serialized: &[u8],
    ) -> Result<&'a yara_x::Rules, ScanError> {
        if !self.loaded.contains_key(ruleset_id) {
            let rules =
                yara_x::Rules::deserialize(serialized).map_err(|source| ScanError::Deserialize {
                    ruleset: ruleset_id.to_string(),
                    source,
                })?;
            self.loaded.insert(ruleset_id.to_string(), rules);
        }
        Ok(self.loaded.get(ruleset_id).unwrap())
    }
}

/// Executes §4.3's per-job procedure for one evidence against every
/// ruleset in `store`. Timeout, engine, and I/O failures on an individual
/// ruleset are logged and skipped; they never abort the remaining
/// rulesets or propagate out of this call (§4.3 step 5, §7).
pub fn scan_evidence(
    path: &Path,
    store: &CompiledRuleStore,
    config: &RunConfig,
    cache: &mut WorkerRuleCache,
) -> Vec<MatchRecord> {
    let mut records = Vec::new();
    let mut hashes: Option<BTreeMap<String, String>> = None;

    for (ruleset_id, serialized) in store.iter() {
        let rules = match cache.get_or_load(ruleset_id, serialized) {
            Ok(rules) => rules,
            Err(err) => {
                warn!(evidence = %path.display(), ruleset = ruleset_id, error = %err, "skipping ruleset");
                continue;
            }
        };

        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(source) => {
                warn!(evidence = %path.display(), error = %source, "failed to read evidence");
                return records;
            }
        };

        let mut scanner = yara_x::Scanner::new(rules);
        scanner.set_timeout(config.match_timeout);
        // `fast` is forwarded verbatim to the engine per the open question
        // in the design notes ("preserve whatever the engine defines");
        // yara-x does not expose a distinct fast-matching mode the way
        // libyara's YARA_SCAN_FLAGS_FAST_MODE does, so there is nothing
        // further to set here today.
        let _ = config.fast;

        let results = match scanner.scan(&data) {
            Ok(results) => results,
            Err(source) => {
                warn!(
                    evidence = %path.display(),
                    ruleset = ruleset_id,
                    error = %source,
                    "scan failed or timed out, skipping ruleset for this evidence"
                );
                continue;
            }
        };

        for rule in results.matching_rules() {
            if hashes.is_none() {
                // First hit for this evidence: compute every requested
                // digest in one streaming pass (§4.3 step 3), memoized for
                // the rest of this evidence's jobs.
                match compute_hashes(path, &config.hash_algorithms) {
                    Ok(computed) => hashes = Some(computed),
                    Err(source) => {
                        warn!(evidence = %path.display(), error = %source, "failed to hash evidence");
                        hashes = Some(BTreeMap::new());
                    }
                }
            }

            records.push(build_record(
                path,
                &rule,
                hashes.clone().unwrap_or_default(),
                &config.timestamp_format,
            ));
        }
    }

    records
}

fn build_record(
    path: &Path,
    rule: &yara_x::Rule,
    hashes: BTreeMap<String, String>,
    timestamp_format: &str,
) -> MatchRecord {
    let meta = rule
        .metadata()
        .iter()
        .map(|(k, v)| (k.to_string(), meta_value_to_string(&v)))
        .collect();

    let tags = rule.tags().iter().map(|t| t.identifier().to_string()).collect();

    let mut strings = Vec::new();
    for pattern in rule.patterns() {
        for m in pattern.matches() {
            let range = m.range();
            let literal = backslashreplace(m.data());
            strings.push(StringMatch {
                offset: range.start as u64,
                reference: pattern.identifier().to_string(),
                literal,
            });
        }
    }

    MatchRecord {
        origin: ORIGIN.to_string(),
        target: Target::file(path.to_path_buf()),
        detail: MatchDetail {
            timestamp: local_timestamp(timestamp_format),
            rule: rule.identifier().to_string(),
            meta,
            namespace: rule.namespace().to_string(),
            tags,
            hashes,
            strings,
        },
    }
}

/// Bare scalar rendering of a rule metadata value (§3 `match.meta`), as
/// opposed to Rust's own Debug representation.
fn meta_value_to_string(value: &yara_x::MetaValue) -> String {
    match value {
        yara_x::MetaValue::Integer(i) => i.to_string(),
        yara_x::MetaValue::Float(f) => f.to_string(),
        yara_x::MetaValue::Bool(b) => b.to_string(),
        yara_x::MetaValue::String(s) => s.to_string(),
        yara_x::MetaValue::Bytes(b) => backslashreplace(b),
    }
}

/// Decodes `bytes` as UTF-8, escaping each invalid byte as `\xHH` rather
/// than substituting U+FFFD — the original's `decode("utf-8",
/// "backslashreplace")` behavior (§3: "invalid bytes escaped, never
/// dropped").
fn backslashreplace(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                break;
            }
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                out.push_str(std::str::from_utf8(&rest[..valid_up_to]).unwrap());
                let bad_len = err.error_len().unwrap_or(rest.len() - valid_up_to);
                for byte in &rest[valid_up_to..valid_up_to + bad_len] {
                    let _ = write!(out, "\\x{byte:02x}");
                }
                rest = &rest[valid_up_to + bad_len..];
            }
        }
    }
    out
}

/// Renders the current local time with `format` (a `chrono` strftime
/// pattern), the configurable ISO-ish timestamp §3 asks for.
fn local_timestamp(format: &str) -> String {
    chrono::Local::now().format(format).to_string()
}
