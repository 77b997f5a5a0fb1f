// huntscan-core: batch YARA threat-hunting scan pipeline.

pub mod archiver;
pub mod cancellation;
pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod hashing;
pub mod plugin;
pub mod pool;
pub mod reader;
pub mod ruleset;
pub mod runstate;
pub mod scan;
pub mod store;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use cancellation::CancellationToken;
use channel::result_channel;
use dispatcher::{dispatch_all, signal_done};
use plugin::PluginRegistry;
use pool::WorkerPool;
use reader::run as run_reader;
use runstate::RunState;
use store::CompiledRuleStore;
use types::{Case, ScanSummary};

pub use error::{ArchiveError, CoreError, ReaderError, RulesetError, ScanError};
pub use types::{
    HashAlgorithm, MatchDetail, MatchRecord, OutputEncoding, OutputFormat, RunConfig, StringMatch,
    Target,
};

/// Runs the full pipeline described in §2 against `case`: compile every
/// ruleset under `ruleset_root`, dispatch every tracked evidence, collect
/// and persist results, then archive matched evidences. This is the single
/// public entry point the outer program drives; it owns nothing about CLI
/// parsing, case-directory lifecycle, or preprocessing — those live
/// entirely outside the core (§1).
pub fn run_scan(
    case: &Case,
    ruleset_root: &Path,
    plugins: PluginRegistry,
    cancellation: CancellationToken,
) -> Result<ScanSummary, CoreError> {
    let mut store = CompiledRuleStore::new();
    let counts = ruleset::compile_rulesets(
        ruleset_root,
        ruleset::DEFAULT_PATTERNS,
        case.config.includes_enabled,
        case.config.warnings_are_errors(),
        &mut store,
    )
    .map_err(|source| CoreError::Discovery {
        path: ruleset_root.to_path_buf(),
        source,
    })?;

    if counts.rulesets_loaded == 0 {
        return Err(CoreError::NoRulesetsLoaded);
    }

    info!(
        rules = counts.rules_loaded,
        rulesets = counts.rulesets_loaded,
        "applying YARA rule(s)"
    );

    let store = Arc::new(store);
    let config = Arc::new(case.config.clone());
    let plugins = Arc::new(plugins);
    let state = RunState::new();

    let (results_tx, results_rx) = result_channel(config.effective_processes() * 4);

    let pool = WorkerPool::new(
        config.effective_processes(),
        Arc::clone(&store),
        Arc::clone(&config),
        results_tx.clone(),
        cancellation.clone(),
        Arc::clone(&plugins),
    );

    let reader_handle = {
        let matches_path = case.matches_path.clone();
        std::thread::spawn(move || run_reader(&results_rx, &matches_path, &state).map(|_| state))
    };

    dispatch_all(
        case.evidences.iter().map(|p| p.as_path()),
        &config,
        &pool,
    );
    pool.shutdown();
    signal_done(&results_tx);

    let state = reader_handle
        .join()
        .expect("reader thread panicked")
        .map_err(CoreError::OutputOpen)?;

    let matched_evidences = state.matched_evidences();
    debug!(count = matched_evidences.len(), "archiving matched evidence(s)");
    archiver::archive(
        &matched_evidences,
        &case.storage_dir,
        config.neutralize_matching_evidences,
        &config.product_suffix,
    );

    let summary = ScanSummary {
        rulesets_loaded: counts.rulesets_loaded,
        rules_loaded: counts.rules_loaded,
        match_count: state.match_count(),
        matched_evidence_count: matched_evidences.len(),
    };

    plugins.invoke_post_modules(&summary);

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn config(max_size: u64) -> RunConfig {
        RunConfig {
            processes: 2,
            fallback_processes: 1,
            max_size,
            hash_algorithms: vec![HashAlgorithm::Sha256],
            fast: false,
            ignore_warnings: false,
            includes_enabled: true,
            match_timeout: Duration::from_secs(5),
            output_character_encoding: OutputEncoding::Utf8,
            output_format: OutputFormat::Json,
            neutralize_matching_evidences: false,
            product_suffix: "huntscan".into(),
            timestamp_format: RunConfig::default_timestamp_format(),
        }
    }

    #[test]
    fn no_rulesets_loaded_is_fatal() {
        let rules_dir = tempfile::tempdir().unwrap();
        let case_dir = tempfile::tempdir().unwrap();

        let case = Case {
            evidences: vec![],
            matches_path: case_dir.path().join("matches.json"),
            storage_dir: case_dir.path().join("storage"),
            config: config(1024),
        };

        let result = run_scan(
            &case,
            rules_dir.path(),
            PluginRegistry::new(),
            CancellationToken::new(),
        );

        assert!(matches!(result, Err(CoreError::NoRulesetsLoaded)));
    }

    #[test]
    fn single_hit_end_to_end() {
        let rules_dir = tempfile::tempdir().unwrap();
        fs::write(
            rules_dir.path().join("foo.yar"),
            "rule has_foo { strings: $a = \"foo\" condition: $a }",
        )
        .unwrap();

        let case_dir = tempfile::tempdir().unwrap();
        let evidence_dir = tempfile::tempdir().unwrap();
        let a = evidence_dir.path().join("a.bin");
        let b = evidence_dir.path().join("b.bin");
        fs::write(&a, b"foobar").unwrap();
        fs::write(&b, b"zzz").unwrap();

        let case = Case {
            evidences: vec![a.clone(), b],
            matches_path: case_dir.path().join("matches.json"),
            storage_dir: case_dir.path().join("storage"),
            config: config(1024),
        };

        let summary = run_scan(
            &case,
            rules_dir.path(),
            PluginRegistry::new(),
            CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(summary.match_count, 1);
        assert_eq!(summary.matched_evidence_count, 1);

        let content = fs::read_to_string(&case.matches_path).unwrap();
        assert_eq!(content.lines().count(), 1);
        let record: MatchRecord = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert!(record.target.identifier.ends_with("a.bin"));
        assert_eq!(record.detail.rule, "has_foo");

        assert!(case.storage_dir.join("a.bin").exists());
    }
}
