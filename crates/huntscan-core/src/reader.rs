use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::channel::{ResultMessage, ResultReceiver};
use crate::error::ReaderError;
use crate::runstate::RunState;

/// Runs the Reader loop described in §4.5 to completion: drains the
/// ResultChannel until `done_sentinel`, writing one JSON line per record
/// and updating `state` as it goes. Returns once the terminal value has
/// been observed — never before, never more than once (§3 invariant).
pub fn run(
    receiver: &ResultReceiver,
    output_path: &Path,
    state: &RunState,
) -> Result<(), ReaderError> {
    let file = open_output_file(output_path)?;
    let mut writer = BufWriter::new(file);

    while let Some(message) = receiver.recv() {
        match message {
            ResultMessage::Done => break,
            ResultMessage::Record(record) => {
                match serde_json::to_string(&record) {
                    Ok(line) => {
                        if let Err(source) = writeln!(writer, "{line}") {
                            warn!(error = %source, "failed to append record to output file");
                            continue;
                        }
                        state.record_match(record.target.identifier.clone());
                        tracing::debug!(
                            rule = %record.detail.rule,
                            evidence = %record.target.identifier.display(),
                            "matching signature"
                        );
                    }
                    Err(source) => {
                        warn!(
                            identifier = %record.target.identifier.display(),
                            error = %source,
                            "failed to encode record, dropping it"
                        );
                    }
                }
            }
        }
    }

    writer.flush().map_err(|source| ReaderError::OutputOpen {
        path: output_path.to_path_buf(),
        source,
    })?;

    let count = state.match_count();
    if count > 0 {
        warn!(count, path = %output_path.display(), "total matching pattern(s), see output file for details");
    } else {
        info!("no matching pattern(s) found");
    }

    Ok(())
}

/// Opened once, in append mode (§4.5: "opened once, in append mode... and
/// closed when the Reader exits").
fn open_output_file(path: &Path) -> Result<File, ReaderError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ReaderError::OutputOpen {
            path: path.to_path_buf(),
            source,
        })
}
