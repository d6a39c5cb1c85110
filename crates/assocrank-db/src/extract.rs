//! Evidence extraction: JSON-lines evidence documents to score-map rows.

use crate::schema::{EvidenceDocument, ScoreMapRow};
use assocrank_common::format::millify;
use assocrank_common::{AssocError, Result};
use std::io::BufRead;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

const LOG_EVERY_ROWS: u64 = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ExtractStats {
    pub documents: u64,
    pub rows: u64,
    /// Blank lines are not counted.
    pub skipped: u64,
}

/// Parse every line of `reader` as an evidence document. Lines that are
/// not UTF-8 or fail to parse are skipped with a warning.
pub fn extract_rows<R: BufRead>(mut reader: R) -> Result<(Vec<ScoreMapRow>, ExtractStats)> {
    let started = Instant::now();
    let mut stats = ExtractStats::default();
    let mut rows = Vec::new();
    let mut buf = Vec::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping evidence line that is not UTF-8");
                stats.skipped += 1;
                continue;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let doc: EvidenceDocument = match serde_json::from_str(trimmed) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed evidence document");
                stats.skipped += 1;
                continue;
            }
        };
        stats.documents += 1;

        for row in doc.to_rows() {
            rows.push(row);
            stats.rows += 1;
            if stats.rows % LOG_EVERY_ROWS == 0 {
                let rate = stats.rows as f64 / started.elapsed().as_secs_f64().max(1e-9);
                info!(
                    rows = %millify(stats.rows as f64),
                    rate = %format!("{}/s", millify(rate)),
                    "Extracted score-map rows"
                );
            }
        }
    }

    info!(
        documents = stats.documents,
        rows = stats.rows,
        skipped = stats.skipped,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Evidence extraction complete"
    );
    Ok((rows, stats))
}

/// Extract from a file on a blocking thread.
pub async fn extract_file(path: impl AsRef<Path>) -> Result<(Vec<ScoreMapRow>, ExtractStats)> {
    let path = path.as_ref().to_path_buf();
    info!(path = %path.display(), "Extracting evidence");
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path)?;
        extract_rows(std::io::BufReader::new(file))
    })
    .await
    .map_err(|e| AssocError::Repository(format!("extraction task failed: {e}")))?
}
