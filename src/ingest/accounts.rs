// src/ingest/accounts.rs
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

const USERNAME_COLUMNS: [&str; 3] = ["username", "Username", "account"];

/// Load monitored account handles from a CSV file with a header row.
///
/// The handle column is the first of `username`, `Username`, `account` that
/// exists, otherwise the first column. Leading `@` is stripped, blanks are
/// skipped and repeats (case-insensitive) are dropped. Non-UTF-8 bytes are
/// replaced rather than rejected.
pub fn load_accounts(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening accounts file {}", path.display()))?;
    let accounts = parse_accounts(file)
        .with_context(|| format!("parsing accounts file {}", path.display()))?;
    tracing::info!(count = accounts.len(), path = %path.display(), "loaded accounts");
    Ok(accounts)
}

pub fn parse_accounts<R: Read>(input: R) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader.byte_headers()?.clone();
    let header_names: Vec<String> = headers
        .iter()
        .map(|h| String::from_utf8_lossy(h).trim().to_string())
        .collect();
    let col = USERNAME_COLUMNS
        .iter()
        .find_map(|want| header_names.iter().position(|h| h == want))
        .unwrap_or(0);

    let mut out: Vec<String> = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let Some(raw) = record.get(col) else {
            continue;
        };
        let handle = String::from_utf8_lossy(raw)
            .trim()
            .trim_start_matches('@')
            .trim()
            .to_string();
        if handle.is_empty() || out.iter().any(|h| h.eq_ignore_ascii_case(&handle)) {
            continue;
        }
        out.push(handle);
    }
    Ok(out)
}
