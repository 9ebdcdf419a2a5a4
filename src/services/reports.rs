use crate::error::{CoreError, Result};
use crate::model::report::ReportTable;
use crate::services::encoding;

use csv::ReaderBuilder;
use std::fs;
use std::path::Path;

/// Loads a Local Storm Report CSV with a header row.
///
/// The remark column is matched case-insensitively. Every other column is kept
/// as text so it can be written back unchanged.
pub fn load_reports(path: &Path, remark_column: &str) -> Result<ReportTable> {
    let bytes = fs::read(path).map_err(|e| CoreError::io(path, e))?;
    let decoded = encoding::decode(&bytes);

    tracing::debug!(
        path = %path.display(),
        encoding = %decoded.encoding,
        confidence = decoded.confidence,
        "decoded report file"
    );

    parse_reports(&decoded.text, remark_column)
}

pub fn parse_reports(text: &str, remark_column: &str) -> Result<ReportTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let remark_index = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(remark_column))
        .ok_or_else(|| CoreError::InvalidInput(format!("missing remark column '{remark_column}'")))?;

    let mut rows = Vec::new();
    for (n, record) in reader.records().enumerate() {
        let record = record?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();

        if row.len() > headers.len() {
            let extra = row.split_off(headers.len());
            if extra.iter().any(|f| !f.trim().is_empty()) {
                return Err(CoreError::InvalidInput(format!(
                    "report row {} has {} fields, header has {}",
                    n + 1,
                    headers.len() + extra.len(),
                    headers.len()
                )));
            }
            tracing::debug!(row = n + 1, dropped = extra.len(), "dropped empty trailing fields");
        }

        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Ok(ReportTable {
        headers,
        rows,
        remark_column: remark_index,
    })
}

/// Reads the taxonomy definition verbatim.
pub fn read_taxonomy(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| CoreError::io(path, e))
}
