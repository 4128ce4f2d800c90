//! Delimited reader: header-keyed rows with a consistency-scoring
//! delimiter sniffer.

use std::path::Path;

use serde_json::Value;

use claimdock_engine::options::DelimiterChoice;
use claimdock_engine::record::RawRow;

use crate::error::ReadError;

/// Guess the delimiter by scoring each candidate over the first lines:
/// (lines agreeing with line 1's field count) × field count. A candidate
/// must split the first line into more than one field to be viable; comma
/// wins when nothing scores.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Higher field count breaks ties: more columns means more likely
        // the real delimiter.
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read header-keyed rows. Headers are trimmed; cell values stay verbatim
/// (the normalizer trims them). A short row simply has no entry for its
/// missing trailing columns — absent, not blank — and extra cells beyond
/// the header are dropped.
pub fn read_rows(
    path: &Path,
    content: &str,
    delimiter: DelimiterChoice,
) -> Result<Vec<RawRow>, ReadError> {
    let delimiter = match delimiter {
        DelimiterChoice::Fixed(byte) => byte,
        DelimiterChoice::Sniff => sniff_delimiter(content),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReadError::Delimited {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ReadError::Delimited {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut row = RawRow::new();
        for (idx, header) in headers.iter().enumerate() {
            if let Some(cell) = record.get(idx) {
                row.insert(header.clone(), Value::String(cell.to_string()));
            }
        }
        rows.push(row);
    }
    Ok(rows)
}
