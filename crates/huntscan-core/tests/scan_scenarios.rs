use std::fs;
use std::time::Duration;

use huntscan_core::cancellation::CancellationToken;
use huntscan_core::plugin::{Callback, PluginRegistry, SupportedOs};
use huntscan_core::types::{Case, HashAlgorithm, MatchRecord, OutputEncoding, OutputFormat, RunConfig};
use huntscan_core::{run_scan, CoreError};

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

fn output_lines(path: &std::path::Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Seed scenario 1: empty match set.
#[test]
fn empty_match_set_produces_empty_output_and_no_storage() {
    let rules_dir = tempfile::tempdir().unwrap();
    fs::write(
        rules_dir.path().join("never.yar"),
        "rule never { condition: false }",
    )
    .unwrap();

    let evidence_dir = tempfile::tempdir().unwrap();
    let mut evidences = vec![];
    for (name, content) in [("a.bin", "one"), ("b.bin", "two"), ("c.bin", "three")] {
        let path = evidence_dir.path().join(name);
        fs::write(&path, content).unwrap();
        evidences.push(path);
    }

    let case_dir = tempfile::tempdir().unwrap();
    let storage_dir = case_dir.path().join("storage");
    let case = Case {
        evidences,
        matches_path: case_dir.path().join("matches.json"),
        storage_dir: storage_dir.clone(),
        config: config(1024),
    };

    let summary = run_scan(
        &case,
        rules_dir.path(),
        PluginRegistry::new(),
        CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(summary.match_count, 0);
    assert_eq!(fs::metadata(&case.matches_path).unwrap().len(), 0);
    assert!(!storage_dir.exists());
}

/// Seed scenario 2: single hit.
#[test]
fn single_hit_is_recorded_and_archived() {
    let rules_dir = tempfile::tempdir().unwrap();
    fs::write(
        rules_dir.path().join("foo.yar"),
        "rule has_foo { strings: $a = \"foo\" condition: $a }",
    )
    .unwrap();

    let evidence_dir = tempfile::tempdir().unwrap();
    let a = evidence_dir.path().join("a.bin");
    let b = evidence_dir.path().join("b.bin");
    fs::write(&a, b"foobar").unwrap();
    fs::write(&b, b"zzz").unwrap();

    let case_dir = tempfile::tempdir().unwrap();
    let storage_dir = case_dir.path().join("storage");
    let case = Case {
        evidences: vec![a, b],
        matches_path: case_dir.path().join("matches.json"),
        storage_dir: storage_dir.clone(),
        config: config(1024),
    };

    run_scan(
        &case,
        rules_dir.path(),
        PluginRegistry::new(),
        CancellationToken::new(),
    )
    .unwrap();

    let lines = output_lines(&case.matches_path);
    assert_eq!(lines.len(), 1);

    let record: MatchRecord = serde_json::from_str(&lines[0]).unwrap();
    assert!(record.target.identifier.ends_with("a.bin"));
    assert_eq!(record.detail.rule, "has_foo");
    assert_eq!(record.detail.strings[0].literal, "foo");
    assert!(!record.detail.hashes.is_empty());

    assert_eq!(fs::read(storage_dir.join("a.bin")).unwrap(), b"foobar");
}

/// Seed scenario 3: oversize skip.
#[test]
fn oversized_evidence_is_skipped_entirely() {
    let rules_dir = tempfile::tempdir().unwrap();
    fs::write(
        rules_dir.path().join("foo.yar"),
        "rule has_foo { strings: $a = \"foo\" condition: $a }",
    )
    .unwrap();

    let evidence_dir = tempfile::tempdir().unwrap();
    let big = evidence_dir.path().join("big.bin");
    fs::write(&big, vec![b'f', b'o', b'o'].repeat(16)).unwrap();

    let case_dir = tempfile::tempdir().unwrap();
    let storage_dir = case_dir.path().join("storage");
    let case = Case {
        evidences: vec![big],
        matches_path: case_dir.path().join("matches.json"),
        storage_dir: storage_dir.clone(),
        config: config(16),
    };

    let summary = run_scan(
        &case,
        rules_dir.path(),
        PluginRegistry::new(),
        CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(summary.match_count, 0);
    assert_eq!(output_lines(&case.matches_path).len(), 0);
    assert!(!storage_dir.exists());
}

/// Seed scenario 4: multiple rulesets, one broken.
#[test]
fn broken_ruleset_does_not_prevent_others_from_loading() {
    let rules_dir = tempfile::tempdir().unwrap();
    fs::write(rules_dir.path().join("r1.yar"), "rule r1 { condition: true }").unwrap();
    fs::write(rules_dir.path().join("r2.yar"), "rule r2 { condition: ((( }").unwrap();
    fs::write(
        rules_dir.path().join("r3.yar"),
        "rule r3 { strings: $a = \"bar\" condition: $a }",
    )
    .unwrap();

    let evidence_dir = tempfile::tempdir().unwrap();
    let evidence = evidence_dir.path().join("a.bin");
    fs::write(&evidence, b"bar").unwrap();

    let case_dir = tempfile::tempdir().unwrap();
    let case = Case {
        evidences: vec![evidence],
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

    assert_eq!(summary.rulesets_loaded, 2);

    let lines = output_lines(&case.matches_path);
    assert_eq!(lines.len(), 2);
    for line in lines {
        let record: MatchRecord = serde_json::from_str(&line).unwrap();
        assert!(["r1", "r3"].contains(&record.detail.rule.as_str()));
    }
}

/// Seed scenario 5: callback invocation.
#[test]
fn callback_is_invoked_once_per_output_line() {
    use std::sync::{Arc, Mutex};

    struct CollectingCallback {
        seen: Arc<Mutex<Vec<MatchRecord>>>,
    }

    impl Callback for CollectingCallback {
        fn supported_os(&self) -> &[SupportedOs] {
            &[SupportedOs::Linux, SupportedOs::MacOs, SupportedOs::Windows]
        }

        fn run(&self, record: &MatchRecord) {
            self.seen.lock().unwrap().push(record.clone());
        }
    }

    let rules_dir = tempfile::tempdir().unwrap();
    fs::write(
        rules_dir.path().join("foo.yar"),
        "rule has_foo { strings: $a = \"foo\" condition: $a }",
    )
    .unwrap();

    let evidence_dir = tempfile::tempdir().unwrap();
    let a = evidence_dir.path().join("a.bin");
    fs::write(&a, b"foofoofoo").unwrap();

    let case_dir = tempfile::tempdir().unwrap();
    let case = Case {
        evidences: vec![a],
        matches_path: case_dir.path().join("matches.json"),
        storage_dir: case_dir.path().join("storage"),
        config: config(1024),
    };

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut registry = PluginRegistry::new();
    registry.register_callback(Box::new(CollectingCallback { seen: Arc::clone(&seen) }));

    run_scan(&case, rules_dir.path(), registry, CancellationToken::new()).unwrap();

    let lines = output_lines(&case.matches_path);
    assert_eq!(seen.lock().unwrap().len(), lines.len());
}

#[test]
fn no_rulesets_loaded_is_a_fatal_error() {
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
