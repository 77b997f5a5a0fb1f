use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use huntscan_core::cancellation::CancellationToken;
use huntscan_core::plugin::PluginRegistry;
use huntscan_core::types::{Case, HashAlgorithm, OutputEncoding, OutputFormat, RunConfig};
use huntscan_core::run_scan;

/// Scan a directory of evidences against a directory of YARA rulesets.
///
/// CLI argument parsing, case directory layout, and preprocessing plugins
/// live outside the core; this binary only wires the two directories
/// together and prints the resulting summary.
#[derive(Parser, Debug)]
#[command(name = "huntscan", about = "Batch YARA threat-hunting scanner")]
struct Args {
    /// Directory of evidence files to scan.
    #[arg(long)]
    evidences: PathBuf,

    /// Directory of *.yar / *.yara ruleset files (searched recursively).
    #[arg(long)]
    rulesets: PathBuf,

    /// Case directory; matches.json and the storage/ subdirectory are
    /// created under here.
    #[arg(long)]
    case_dir: PathBuf,

    /// Worker count. 0 falls back to the configured default.
    #[arg(long, default_value_t = 0)]
    processes: usize,

    /// Maximum evidence size in bytes. Larger files are skipped.
    #[arg(long, default_value_t = 300 * 1024 * 1024)]
    max_size: u64,

    /// Per-ruleset match timeout in seconds.
    #[arg(long, env = "YARA_MATCH_TIMEOUT", default_value_t = 60)]
    match_timeout_secs: u64,

    /// Rename stored copies and clear their executable bits.
    #[arg(long, env = "NEUTRALIZE_MATCHING_EVIDENCES")]
    neutralize: bool,

    /// Treat compilation warnings as fatal for the offending ruleset.
    #[arg(long)]
    error_on_warnings: bool,

    /// Worker count substituted when CPU-count detection returns 0.
    #[arg(long, env = "FALLBACK_PROCESSES", default_value_t = 4)]
    fallback_processes: usize,

    /// `chrono` strftime pattern `match.timestamp` is rendered with.
    #[arg(long, default_value = "%Y-%m-%d %H:%M:%S")]
    timestamp_format: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let evidences = match std::fs::read_dir(&args.evidences) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(err) => {
            eprintln!("failed to read evidence directory {}: {err}", args.evidences.display());
            std::process::exit(1);
        }
    };

    if let Err(err) = std::fs::create_dir_all(&args.case_dir) {
        eprintln!("failed to create case directory {}: {err}", args.case_dir.display());
        std::process::exit(1);
    }

    let config = RunConfig {
        processes: args.processes,
        fallback_processes: args.fallback_processes,
        max_size: args.max_size,
        hash_algorithms: vec![HashAlgorithm::Sha256],
        fast: false,
        ignore_warnings: !args.error_on_warnings,
        includes_enabled: true,
        match_timeout: Duration::from_secs(args.match_timeout_secs),
        output_character_encoding: OutputEncoding::Utf8,
        output_format: OutputFormat::Json,
        neutralize_matching_evidences: args.neutralize,
        product_suffix: "huntscan".to_string(),
        timestamp_format: args.timestamp_format,
    };

    let case = Case {
        evidences,
        matches_path: args.case_dir.join("matches.json"),
        storage_dir: args.case_dir.join("storage"),
        config,
    };

    let cancellation = CancellationToken::new();
    let sigint_cancellation = cancellation.clone();
    let _ = ctrlc::set_handler(move || {
        tracing::warn!("aborted due to manual user interruption (SIGINT)");
        sigint_cancellation.cancel();
    });

    match run_scan(&case, &args.rulesets, PluginRegistry::new(), cancellation) {
        Ok(summary) => {
            let json = serde_json::json!({
                "rulesets_loaded": summary.rulesets_loaded,
                "rules_loaded": summary.rules_loaded,
                "match_count": summary.match_count,
                "matched_evidence_count": summary.matched_evidence_count,
            });
            println!("{json}");
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
