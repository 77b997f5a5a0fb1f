use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::RulesetError;
use crate::store::CompiledRuleStore;

/// Glob patterns a ruleset directory is searched with by default (§4.1).
pub const DEFAULT_PATTERNS: &[&str] = &["*.yar", "*.yara"];

#[derive(Debug, Default, Clone, Copy)]
pub struct CompileCounts {
    pub rulesets_loaded: usize,
    pub rules_loaded: usize,
}

/// Discovers ruleset files under `root` matching `patterns` (recursively)
/// and compiles each in isolation into `store` (§4.1).
///
/// A syntax error, or warnings when `warnings_are_errors` is set, discards
/// only that ruleset; every other candidate still compiles. Returns the
/// aggregate counts the caller uses to decide whether the run can proceed
/// (`rulesets_loaded == 0` is fatal, per §4.1 / §7 `NoRulesetsLoaded`).
pub fn compile_rulesets(
    root: &Path,
    patterns: &[&str],
    includes_enabled: bool,
    warnings_are_errors: bool,
    store: &mut CompiledRuleStore,
) -> std::io::Result<CompileCounts> {
    let mut counts = CompileCounts::default();

    for path in discover(root, patterns)? {
        match compile_one(&path, includes_enabled, warnings_are_errors) {
            Ok((ruleset_id, rule_count, serialized)) => {
                debug!(
                    ruleset = %ruleset_id,
                    rules = rule_count,
                    "precompiled YARA ruleset in memory"
                );
                store.insert(ruleset_id, serialized);
                counts.rulesets_loaded += 1;
                counts.rules_loaded += rule_count;
            }
            Err(err) => warn!(error = %err, path = %path.display(), "discarding ruleset"),
        }
    }

    Ok(counts)
}

/// Recursive directory walk collecting files whose name matches any of
/// `patterns` (default `{*.yar, *.yara}`, §4.1).
fn discover(root: &Path, patterns: &[&str]) -> std::io::Result<Vec<PathBuf>> {
    let matchers: Vec<glob::Pattern> = patterns
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect();

    let mut found = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if matchers.iter().any(|m| m.matches(name)) {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Compiles one ruleset file in isolation, returning its identifier (file
/// stem), rule count, and serialized artifact (§4.1: "serialize, not share
/// the compiled object directly").
fn compile_one(
    path: &Path,
    includes_enabled: bool,
    warnings_are_errors: bool,
) -> Result<(String, usize, Vec<u8>), RulesetError> {
    let ruleset_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("ruleset")
        .to_string();

    let source = fs::read_to_string(path).map_err(|source| RulesetError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    // yara-x resolves `include "other.yar"` statements relative to the
    // including source's origin rather than through a compiler flag, so
    // `includes_enabled` is wired by whether we tell the compiler this
    // source's origin at all: without an origin, a relative include has no
    // base directory to resolve against and fails to compile.
    let mut compiler = yara_x::Compiler::new();

    let source_code = if includes_enabled {
        yara_x::SourceCode::from(source.as_str()).with_origin(&path.to_string_lossy())
    } else {
        yara_x::SourceCode::from(source.as_str())
    };

    compiler
        .add_source(source_code)
        .map_err(|source| RulesetError::Syntax {
            path: path.to_path_buf(),
            source,
        })?;

    let warnings = compiler.warnings();
    if warnings_are_errors && !warnings.is_empty() {
        return Err(RulesetError::WarningsAsErrors {
            path: path.to_path_buf(),
            count: warnings.len(),
        });
    }

    let rules = compiler.build();
    let rule_count = rules.iter().count();

    let serialized = rules
        .serialize()
        .map_err(|source| RulesetError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;

    Ok((ruleset_id, rule_count, serialized))
}
