use std::borrow::Cow;
use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::ingest::schema::{
    is_known_column, is_numeric_optional, ERROR_COLUMNS, OPTIONAL_COLUMNS, RANGE_CHECKS,
    REQUIRED_COLUMNS, SPARSE_COLUMN_THRESHOLD, TEXT_COLUMNS,
};
use crate::models::candidate::{FeatureMap, NewCandidate};

/// File-level failures. Any of these rejects the whole upload.
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("CSV file is empty")]
    Empty,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("CSV file contains no data rows")]
    NoDataRows,

    #[error("CSV parsing error: {0}")]
    Malformed(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    /// 1-based data row (the header is not counted).
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ParsedUpload {
    pub rows: Vec<NewCandidate>,
    pub rejected: Vec<RejectedRow>,
    pub warnings: Vec<String>,
}

/// UTF-8 when valid, otherwise every byte is read as its Latin-1 code point.
pub fn decode(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    fn new(headers: &[String]) -> Self {
        let mut positions = HashMap::new();
        for (i, name) in headers.iter().enumerate() {
            positions.entry(name.clone()).or_insert(i);
        }
        Self { positions }
    }

    fn has(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, column: &str) -> Option<&'r str> {
        self.positions.get(column).and_then(|&i| record.get(i))
    }
}

enum NumberIssue {
    Empty,
    NotNumeric,
    NotFinite,
}

fn parse_number(raw: &str) -> Result<f64, NumberIssue> {
    if raw.is_empty() {
        return Err(NumberIssue::Empty);
    }
    let value: f64 = raw.parse().map_err(|_| NumberIssue::NotNumeric)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NumberIssue::NotFinite)
    }
}

/// Accepts `10797460` and the float-rendered `10797460.0`.
fn parse_kepid(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15)
            .map(|f| f as i64)
    })
}

/// Parses an uploaded KOI table. Bad rows are collected in `rejected` and
/// never abort the parse; only header-level problems return `Err`.
pub fn parse_csv(bytes: &[u8]) -> Result<ParsedUpload, CsvError> {
    let decoded = decode(bytes);
    let body = decoded
        .strip_prefix('\u{feff}')
        .unwrap_or(&*decoded);
    if body.trim().is_empty() {
        return Err(CsvError::Empty);
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::Empty);
    }
    let columns = ColumnIndex::new(&headers);

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !columns.has(c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(CsvError::MissingColumns(missing));
    }

    let generate_kepids = !columns.has("kepid");
    let mut parsed = ParsedUpload::default();
    let mut empty_required: HashMap<&str, usize> = HashMap::new();
    let mut data_rows = 0usize;

    for (idx, record) in reader.records().enumerate() {
        let row = idx + 1;
        data_rows += 1;

        let record = match record {
            Ok(record) => record,
            Err(e) => {
                parsed.rejected.push(RejectedRow {
                    row,
                    reason: format!("unreadable record: {e}"),
                });
                continue;
            }
        };
        if record.len() != headers.len() {
            parsed.rejected.push(RejectedRow {
                row,
                reason: format!(
                    "expected {} fields, found {}",
                    headers.len(),
                    record.len()
                ),
            });
            continue;
        }

        for &col in REQUIRED_COLUMNS {
            if columns.get(&record, col).map_or(true, str::is_empty) {
                *empty_required.entry(col).or_default() += 1;
            }
        }

        match parse_row(&columns, &record, row, generate_kepids) {
            Ok(candidate) => parsed.rows.push(candidate),
            Err(reason) => parsed.rejected.push(RejectedRow { row, reason }),
        }
    }

    if data_rows == 0 {
        return Err(CsvError::NoDataRows);
    }

    parsed.warnings = collect_warnings(
        &headers,
        &columns,
        &parsed.rows,
        &empty_required,
        data_rows,
    );
    Ok(parsed)
}

fn parse_row(
    columns: &ColumnIndex,
    record: &csv::StringRecord,
    row: usize,
    generate_kepids: bool,
) -> Result<NewCandidate, String> {
    let mut features = FeatureMap::new();
    let mut problems = Vec::new();

    for &col in REQUIRED_COLUMNS {
        let raw = columns.get(record, col).unwrap_or("");
        match parse_number(raw) {
            Ok(value) => {
                features.insert(col.to_string(), value);
            }
            Err(NumberIssue::Empty) => problems.push(format!("required column '{col}' is empty")),
            Err(NumberIssue::NotNumeric) => {
                problems.push(format!("required column '{col}' is not numeric: '{raw}'"))
            }
            Err(NumberIssue::NotFinite) => {
                problems.push(format!("required column '{col}' is not finite: '{raw}'"))
            }
        }
    }

    let kepid = if generate_kepids {
        Some(row as i64)
    } else {
        match columns.get(record, "kepid").filter(|v| !v.is_empty()) {
            None => None,
            Some(raw) => {
                let parsed = parse_kepid(raw);
                if parsed.is_none() {
                    problems.push(format!("kepid is not an integer: '{raw}'"));
                }
                parsed
            }
        }
    };

    if !problems.is_empty() {
        return Err(problems.join("; "));
    }

    for &col in OPTIONAL_COLUMNS.iter().filter(|c| is_numeric_optional(c)) {
        if let Some(Ok(value)) = columns.get(record, col).map(parse_number) {
            features.insert(col.to_string(), value);
        }
    }

    for &col in ERROR_COLUMNS {
        if columns.has(col) {
            if let Some(Ok(value)) = columns.get(record, col).map(parse_number) {
                features.insert(col.to_string(), value);
            }
        } else {
            features.insert(col.to_string(), 0.0);
        }
    }

    let text = |col: &str| {
        columns
            .get(record, col)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    Ok(NewCandidate {
        row_number: i32::try_from(row).unwrap_or(i32::MAX),
        kepid,
        kepoi_name: text(TEXT_COLUMNS[0]),
        kepler_name: text(TEXT_COLUMNS[1]),
        koi_disposition: text(TEXT_COLUMNS[2]),
        koi_pdisposition: text(TEXT_COLUMNS[3]),
        features,
    })
}

fn collect_warnings(
    headers: &[String],
    columns: &ColumnIndex,
    rows: &[NewCandidate],
    empty_required: &HashMap<&str, usize>,
    data_rows: usize,
) -> Vec<String> {
    let mut warnings = Vec::new();

    let missing_optional: Vec<&str> = OPTIONAL_COLUMNS
        .iter()
        .copied()
        .filter(|c| !columns.has(c))
        .collect();
    if !missing_optional.is_empty() {
        warnings.push(format!(
            "Missing optional columns: {}",
            missing_optional.join(", ")
        ));
    }
    if !columns.has("kepid") {
        warnings.push("kepid column missing; generated sequential IDs".to_string());
    }

    let missing_errors = ERROR_COLUMNS.iter().filter(|c| !columns.has(c)).count();
    if missing_errors > 0 {
        warnings.push(format!(
            "{missing_errors} error columns missing; filled with 0.0"
        ));
    }

    let unknown: Vec<&str> = headers
        .iter()
        .map(String::as_str)
        .filter(|h| !h.is_empty() && !is_known_column(h))
        .collect();
    if !unknown.is_empty() {
        warnings.push(format!("Ignored unknown columns: {}", unknown.join(", ")));
    }

    for &col in REQUIRED_COLUMNS {
        let empty = empty_required.get(col).copied().unwrap_or(0);
        let share = empty as f64 / data_rows as f64;
        if share > SPARSE_COLUMN_THRESHOLD {
            warnings.push(format!(
                "Column '{col}' has {:.1}% missing values",
                share * 100.0
            ));
        }
    }

    for check in RANGE_CHECKS {
        let out_of_range = rows
            .iter()
            .filter_map(|r| r.features.get(check.column))
            .filter(|v| !check.contains(**v))
            .count();
        if out_of_range > 0 {
            warnings.push(format!(
                "Column '{}' has {out_of_range} values out of expected range",
                check.column
            ));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: [&str; 13] = [
        "9.488", "615.8", "2.957", "0.146", "93.59", "35.8", "5455", "4.467", "0.927", "291.93",
        "48.14", "15.347", "1.0",
    ];

    fn header(extra: &[&str]) -> String {
        REQUIRED_COLUMNS
            .iter()
            .chain(extra.iter())
            .copied()
            .collect::<Vec<_>>()
            .join(",")
    }

    fn row(extra: &[&str]) -> String {
        VALID
            .iter()
            .chain(extra.iter())
            .copied()
            .collect::<Vec<_>>()
            .join(",")
    }

    fn row_with(column: &str, value: &str, extra: &[&str]) -> String {
        let pos = REQUIRED_COLUMNS.iter().position(|c| *c == column).unwrap();
        let mut values: Vec<&str> = VALID.to_vec();
        values[pos] = value;
        values.extend_from_slice(extra);
        values.join(",")
    }

    fn file(lines: &[String]) -> Vec<u8> {
        lines.join("\n").into_bytes()
    }

    #[test]
    fn test_valid_and_invalid_rows_are_split() {
        let csv = file(&[
            header(&["kepid", "kepoi_name"]),
            row(&["10797460", "K00752.01"]),
            row_with("koi_period", "", &["10797461", "K00752.02"]),
            row(&["10811496", "K00753.01"]),
            row_with("koi_depth", "deep", &["10848459", "K00754.01"]),
            "1.0,2.0".to_string(),
            row(&["10854555", "K00755.01"]),
        ]);

        let parsed = parse_csv(&csv).unwrap();
        assert_eq!(parsed.rows.len(), 3);
        assert_eq!(parsed.rejected.len(), 3);

        let rejected_rows: Vec<usize> = parsed.rejected.iter().map(|r| r.row).collect();
        assert_eq!(rejected_rows, vec![2, 4, 5]);
        assert!(parsed.rejected[0].reason.contains("koi_period"));
        assert!(parsed.rejected[1].reason.contains("not numeric"));
        assert!(parsed.rejected[2].reason.contains("expected 15 fields"));

        let first = &parsed.rows[0];
        assert_eq!(first.row_number, 1);
        assert_eq!(first.kepid, Some(10797460));
        assert_eq!(first.kepoi_name.as_deref(), Some("K00752.01"));
        assert_eq!(first.features["koi_period"], 9.488);
    }

    #[test]
    fn test_non_finite_required_value_rejected() {
        let csv = file(&[header(&[]), row_with("koi_score", "inf", &[]), row(&[])]);
        let parsed = parse_csv(&csv).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert!(parsed.rejected[0].reason.contains("not finite"));
    }

    #[test]
    fn test_non_integer_kepid_rejected() {
        let csv = file(&[
            header(&["kepid"]),
            row(&["12.5"]),
            row(&["757450.0"]),
        ]);
        let parsed = parse_csv(&csv).unwrap();
        assert_eq!(parsed.rejected.len(), 1);
        assert!(parsed.rejected[0].reason.contains("kepid"));
        assert_eq!(parsed.rows[0].kepid, Some(757450));
    }

    #[test]
    fn test_missing_required_columns_lists_all() {
        let csv = b"kepid,koi_period,koi_depth\n1,2.0,3.0\n";
        match parse_csv(csv) {
            Err(CsvError::MissingColumns(cols)) => {
                assert_eq!(cols.len(), REQUIRED_COLUMNS.len() - 2);
                assert!(cols.contains(&"koi_score".to_string()));
                assert!(!cols.contains(&"koi_period".to_string()));
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_file() {
        assert!(matches!(parse_csv(b""), Err(CsvError::Empty)));
        assert!(matches!(parse_csv(b"  \n\n"), Err(CsvError::Empty)));
    }

    #[test]
    fn test_header_without_rows() {
        let csv = file(&[header(&[])]);
        assert!(matches!(parse_csv(&csv), Err(CsvError::NoDataRows)));
    }

    #[test]
    fn test_latin1_fallback() {
        let mut csv = header(&["kepler_name"]).into_bytes();
        csv.push(b'\n');
        csv.extend_from_slice(row(&[]).as_bytes());
        csv.extend_from_slice(b",Kepler-\xe9\n");

        let parsed = parse_csv(&csv).unwrap();
        assert_eq!(parsed.rows[0].kepler_name.as_deref(), Some("Kepler-é"));
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let mut csv = "\u{feff}".as_bytes().to_vec();
        csv.extend(file(&[header(&[]), row(&[])]));
        let parsed = parse_csv(&csv).unwrap();
        assert_eq!(parsed.rows.len(), 1);
    }

    #[test]
    fn test_sequential_kepids_when_column_absent() {
        let csv = file(&[header(&[]), row(&[]), row_with("ra", "", &[]), row(&[])]);
        let parsed = parse_csv(&csv).unwrap();
        let kepids: Vec<Option<i64>> = parsed.rows.iter().map(|r| r.kepid).collect();
        assert_eq!(kepids, vec![Some(1), Some(3)]);
        assert!(parsed
            .warnings
            .iter()
            .any(|w| w.contains("generated sequential IDs")));
    }

    #[test]
    fn test_error_columns_default_to_zero() {
        let csv = file(&[header(&["koi_period_err1"]), row(&["0.0001"])]);
        let parsed = parse_csv(&csv).unwrap();
        let features = &parsed.rows[0].features;
        assert_eq!(features["koi_period_err1"], 0.0001);
        assert_eq!(features["koi_period_err2"], 0.0);
        assert_eq!(features["koi_srad_err2"], 0.0);
    }

    #[test]
    fn test_unparseable_optional_value_dropped() {
        let csv = file(&[header(&["koi_teq", "koi_prad"]), row(&["n/a", "2.26"])]);
        let parsed = parse_csv(&csv).unwrap();
        let features = &parsed.rows[0].features;
        assert!(!features.contains_key("koi_teq"));
        assert_eq!(features["koi_prad"], 2.26);
    }

    #[test]
    fn test_quality_warnings() {
        let csv = file(&[
            header(&["rowid"]),
            row_with("koi_steff", "50000", &["1"]),
            row_with("koi_kepmag", "", &["2"]),
            row_with("koi_kepmag", "", &["3"]),
        ]);
        let parsed = parse_csv(&csv).unwrap();
        let warnings = parsed.warnings.join("\n");
        assert!(warnings.contains("Missing optional columns"));
        assert!(warnings.contains("Ignored unknown columns: rowid"));
        assert!(warnings.contains("Column 'koi_kepmag' has 66.7% missing values"));
        assert!(warnings.contains("Column 'koi_steff' has 1 values out of expected range"));
    }
}
