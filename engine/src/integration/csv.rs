//! CSV import into memory tables, with encoding and delimiter auto-detection.
//!
//! Every column becomes a `string` property of the target table; the typed
//! conversion happens later, when a mapping moves the values.

use std::path::Path;

use indexmap::IndexMap;
use serde_json::json;

use super::{Integration, MemoryIntegration};
use crate::error::{IntegrationError, IntegrationResult};
use crate::models::Value;

/// What an import detected and loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvImport {
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
    /// Number of rows inserted
    pub rows: usize,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-15".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes with an `encoding_rs` label, falling back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding_rs::Encoding::for_label(encoding.as_bytes()) {
        Some(decoder) => decoder.decode(bytes).0.into_owned(),
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ';';
    let mut best_count = 0;
    for sep in [';', ',', '\t', '|'] {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }
    best_sep
}

/// Import CSV bytes into `record_type`, declaring the table when needed.
pub fn import_bytes(
    integration: &mut MemoryIntegration,
    record_type: &str,
    bytes: &[u8],
) -> IntegrationResult<CsvImport> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(::csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(String::is_empty) {
        return Err(IntegrationError::Failed("CSV has no header row".to_string()));
    }

    if integration.schema().record_type(record_type).is_err() {
        let properties: IndexMap<String, serde_json::Value> = headers
            .iter()
            .map(|h| (h.clone(), json!({"type": "string"})))
            .collect();
        integration.add_table(record_type, properties);
    }

    let mut rows = 0;
    for result in reader.records() {
        let record = result?;
        let row: Vec<(String, Value)> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.clone(), Value::from(record.get(i).unwrap_or(""))))
            .collect();
        integration.insert(record_type, row)?;
        rows += 1;
    }

    tracing::info!(record_type, rows, %encoding, ?delimiter, "CSV imported");
    Ok(CsvImport {
        encoding,
        delimiter,
        headers,
        rows,
    })
}

/// Import a CSV file into `record_type`.
pub fn import_file<P: AsRef<Path>>(
    integration: &mut MemoryIntegration,
    record_type: &str,
    path: P,
) -> IntegrationResult<CsvImport> {
    let bytes = std::fs::read(path.as_ref())?;
    import_bytes(integration, record_type, &bytes)
}
