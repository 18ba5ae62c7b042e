//! CSV parsing and row normalization.
//!
//! Turns a published sheet export into [`NormalizedRow`]s. Bad rows are
//! collected as [`SkipReason`]s and never abort the document; only a
//! document that cannot be read as CSV at all (broken quoting, no header)
//! is an error.

use std::sync::OnceLock;

use pulse_core::calendar::parse_ymd;
use pulse_core::models::{ColumnMap, NormalizedRow, NormalizedSet, RawRecord, SkipCause, SkipReason};
use pulse_core::{PulseError, Result};
use regex::Regex;
use tracing::{debug, info, warn};

// ── Public API ────────────────────────────────────────────────────────────────

/// Parse `raw_text` into header-keyed records.
///
/// The first row is the header. Blank lines, and lines whose cells are all
/// blank, are skipped. Rows shorter than the header simply lack the missing
/// keys; extra trailing cells are ignored. When a header name repeats, the
/// first column wins.
pub fn parse_records(raw_text: &str) -> Result<Vec<RawRecord>> {
    Ok(read_records(raw_text)?
        .into_iter()
        .map(|(_, record)| record)
        .collect())
}

/// Parse and validate a whole document.
///
/// Returns accepted rows in input order plus one skip entry per rejected
/// row, so `rows.len() + skipped.len()` equals the number of data rows.
pub fn normalize(raw_text: &str, columns: &ColumnMap) -> Result<NormalizedSet> {
    let records = read_records(raw_text)?;
    if let Some((_, first)) = records.first() {
        warn_on_missing_columns(first, columns);
    }

    let mut set = NormalizedSet::default();
    for (index, (line, record)) in records.iter().enumerate() {
        match normalize_record(record, columns) {
            Ok(row) => set.rows.push(row),
            Err(cause) => {
                debug!("Skipping data row {} (line {}): {}", index, line, cause);
                set.skipped.push(SkipReason {
                    row: index,
                    line: *line,
                    cause,
                });
            }
        }
    }

    info!(
        "Normalized {} rows ({} accepted, {} skipped)",
        set.total_rows(),
        set.rows.len(),
        set.skipped.len()
    );

    Ok(set)
}

/// Validate a single record against `columns`.
pub fn normalize_record(
    record: &RawRecord,
    columns: &ColumnMap,
) -> std::result::Result<NormalizedRow, SkipCause> {
    let cell = |name: &str| {
        record
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };

    let count_str = cell(&columns.count).ok_or(SkipCause::MissingCount)?;
    let count =
        parse_count(count_str).ok_or_else(|| SkipCause::InvalidCount(count_str.to_string()))?;

    let date_str = cell(&columns.date).ok_or(SkipCause::MissingDate)?;
    let date = parse_ymd(date_str).ok_or_else(|| SkipCause::InvalidDate(date_str.to_string()))?;

    let label = cell(&columns.label).unwrap_or_default().to_string();
    let category = columns
        .category
        .as_deref()
        .and_then(cell)
        .map(str::to_string);

    Ok(NormalizedRow {
        date,
        label,
        count,
        category,
    })
}

/// Parse a non-negative integer count.
///
/// Plain digits are accepted, as are correctly grouped thousands
/// (`1,234,567`) which spreadsheet exports emit for formatted cells.
pub fn parse_count(s: &str) -> Option<u64> {
    let s = s.trim();
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok();
    }
    if grouped_re().is_match(s) {
        return s.replace(',', "").parse().ok();
    }
    None
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Header-keyed records paired with the source line each one starts on.
fn read_records(raw_text: &str) -> Result<Vec<(u64, RawRecord)>> {
    let text = raw_text.strip_prefix('\u{feff}').unwrap_or(raw_text);
    check_quoting(text)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(PulseError::MissingHeader);
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let line = record.position().map_or(0, |pos| record_start_line(text, pos));
        let mut raw = RawRecord::with_capacity(headers.len());
        for (header, cell) in headers.iter().zip(record.iter()) {
            raw.entry(header.to_string())
                .or_insert_with(|| cell.to_string());
        }
        records.push((line, raw));
    }

    Ok(records)
}

fn grouped_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,3}(,\d{3})+$").expect("valid thousands regex"))
}

/// Reject documents with an unterminated quoted field, or with text between
/// a closing quote and the next delimiter. The `csv` reader would otherwise
/// silently swallow the rest of the document into one cell.
pub(crate) fn check_quoting(text: &str) -> Result<()> {
    let mut chars = text.chars().peekable();
    let mut line: u64 = 1;
    let mut quote_line: u64 = 1;
    let mut in_quotes = false;
    let mut at_field_start = true;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                }
                '"' => {
                    in_quotes = false;
                    match chars.peek() {
                        None | Some(',') | Some('\n') | Some('\r') => {}
                        Some(_) => return Err(PulseError::MalformedQuoting { line }),
                    }
                }
                '\n' => line += 1,
                _ => {}
            }
            continue;
        }

        match c {
            '"' if at_field_start => {
                in_quotes = true;
                quote_line = line;
                at_field_start = false;
            }
            ',' | '\r' => at_field_start = true,
            '\n' => {
                line += 1;
                at_field_start = true;
            }
            _ => at_field_start = false,
        }
    }

    if in_quotes {
        return Err(PulseError::MalformedQuoting { line: quote_line });
    }
    Ok(())
}

/// The reader may report a record's position before the blank lines that
/// precede it; advance past them so the line is where the record starts.
fn record_start_line(text: &str, pos: &csv::Position) -> u64 {
    let start = usize::try_from(pos.byte()).unwrap_or(usize::MAX);
    let mut line = pos.line();
    for b in text.bytes().skip(start) {
        match b {
            b'\n' => line += 1,
            b'\r' => {}
            _ => break,
        }
    }
    line
}

fn warn_on_missing_columns(first: &RawRecord, columns: &ColumnMap) {
    for name in [&columns.date, &columns.count] {
        if !first.contains_key(name.as_str()) {
            warn!("Column \"{}\" not found in CSV header", name);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const HEADER: &str = "Date,Object,Request Count\n";

    fn doc(body: &str) -> String {
        format!("{HEADER}{body}")
    }

    // ── parse_records ─────────────────────────────────────────────────────────

    #[test]
    fn test_parse_records_quoted_comma_and_newline() {
        let text = doc("2024-06-01,\"/a,b\",10\n2024-06-01,\"multi\nline\",5\n");
        let records = parse_records(&text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Object"], "/a,b");
        assert_eq!(records[1]["Object"], "multi\nline");
    }

    #[test]
    fn test_parse_records_doubled_quotes() {
        let text = doc("2024-06-01,\"say \"\"hi\"\"\",1\n");
        let records = parse_records(&text).unwrap();
        assert_eq!(records[0]["Object"], "say \"hi\"");
    }

    #[test]
    fn test_parse_records_skips_blank_lines() {
        let text = doc("\n2024-06-01,/a,1\n\n,,\n2024-06-02,/a,2\n\n");
        let records = parse_records(&text).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_parse_records_short_row_lacks_keys() {
        let text = doc("2024-06-01,/a\n");
        let records = parse_records(&text).unwrap();
        assert!(!records[0].contains_key("Request Count"));
    }

    #[test]
    fn test_parse_records_crlf() {
        let text = "Date,Object,Request Count\r\n2024-06-01,/a,3\r\n";
        let records = parse_records(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["Request Count"], "3");
    }

    #[test]
    fn test_parse_records_strips_bom() {
        let text = "\u{feff}Date,Object,Request Count\n2024-06-01,/a,3\n";
        let records = parse_records(text).unwrap();
        assert!(records[0].contains_key("Date"));
    }

    #[test]
    fn test_unterminated_quote_is_document_error() {
        let text = doc("2024-06-01,\"/a,10\n2024-06-02,/b,3\n");
        let err = parse_records(&text).unwrap_err();
        assert!(matches!(err, PulseError::MalformedQuoting { line: 2 }));
    }

    #[test]
    fn test_text_after_closing_quote_is_document_error() {
        let text = doc("2024-06-01,\"/a\"x,10\n");
        assert!(matches!(
            parse_records(&text),
            Err(PulseError::MalformedQuoting { .. })
        ));
    }

    #[test]
    fn test_quote_inside_unquoted_field_is_literal() {
        let text = doc("2024-06-01,/a\"b,10\n");
        let records = parse_records(&text).unwrap();
        assert_eq!(records[0]["Object"], "/a\"b");
    }

    #[test]
    fn test_empty_document_has_no_header() {
        assert!(matches!(parse_records(""), Err(PulseError::MissingHeader)));
        assert!(matches!(parse_records("\n\n"), Err(PulseError::MissingHeader)));
    }

    #[test]
    fn test_header_only_document_is_empty() {
        let records = parse_records(HEADER).unwrap();
        assert!(records.is_empty());
    }

    // ── normalize ─────────────────────────────────────────────────────────────

    #[test]
    fn test_normalize_accepts_valid_rows_in_order() {
        let text = doc("2024-06-01,/a,10\n2024-06-01,/b,30\n2024-06-01,/a,5\n");
        let set = normalize(&text, &ColumnMap::default()).unwrap();
        assert!(set.skipped.is_empty());
        let labels: Vec<&str> = set.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["/a", "/b", "/a"]);
        assert_eq!(set.rows[1].count, 30);
        assert_eq!(set.rows[0].date, ymd(2024, 6, 1));
    }

    #[test]
    fn test_normalize_rejects_invalid_day_for_february() {
        let text = doc("2024-02-30,/a,10\n2024-02-29,/a,4\n");
        let set = normalize(&text, &ColumnMap::default()).unwrap();
        assert_eq!(set.rows.len(), 1);
        assert_eq!(set.skipped.len(), 1);
        assert_eq!(set.skipped[0].row, 0);
        assert_eq!(
            set.skipped[0].cause,
            SkipCause::InvalidDate("2024-02-30".to_string())
        );
        assert!(set.skipped[0].cause.to_string().starts_with("invalid date"));
    }

    #[test]
    fn test_normalize_skip_causes() {
        let text = doc(concat!(
            ",/a,10\n",           // missing date
            "2024-06-01,/a,\n",   // missing count
            "2024-06-01,/a,ten\n", // invalid count
            "2024-06-01,/a,-3\n", // negative count
            "2024-6-1,/a,1.5\n",  // non-integer count
            "06/01/2024,/a,1\n",  // wrong date shape
            "2024-06-01,/a,7\n",  // accepted
        ));
        let set = normalize(&text, &ColumnMap::default()).unwrap();
        let causes: Vec<&SkipCause> = set.skipped.iter().map(|s| &s.cause).collect();
        assert_eq!(
            causes,
            vec![
                &SkipCause::MissingDate,
                &SkipCause::MissingCount,
                &SkipCause::InvalidCount("ten".to_string()),
                &SkipCause::InvalidCount("-3".to_string()),
                &SkipCause::InvalidCount("1.5".to_string()),
                &SkipCause::InvalidDate("06/01/2024".to_string()),
            ]
        );
        assert_eq!(set.rows.len(), 1);
        assert_eq!(set.rows[0].count, 7);
    }

    #[test]
    fn test_normalize_accepted_plus_skipped_equals_data_rows() {
        let text = doc(concat!(
            "2024-06-01,/a,1\n",
            "2024-13-01,/a,1\n",
            "2024-06-02,/b,2\n",
            "\n",
            "2024-06-03,/c,x\n",
            "2024-06-04,/d,4\n",
        ));
        let set = normalize(&text, &ColumnMap::default()).unwrap();
        assert_eq!(set.total_rows(), 5);
        assert_eq!(set.rows.len(), 3);
        assert_eq!(set.skipped.len(), 2);
        let skipped_rows: Vec<usize> = set.skipped.iter().map(|s| s.row).collect();
        assert_eq!(skipped_rows, vec![1, 3]);
    }

    #[test]
    fn test_skip_lines_count_blank_and_multiline_rows() {
        let text = doc(concat!(
            "2024-06-01,\"/a\n/b\",1\n", // line 2-3
            "\n",                         // line 4
            "\n",                         // line 5
            "2024-06-01,/c,x\n",          // line 6
            ",,\n",                       // line 7
            "2024-13-01,/d,1\n",          // line 8
        ));
        let set = normalize(&text, &ColumnMap::default()).unwrap();
        let skipped: Vec<(usize, u64)> = set
            .skipped
            .iter()
            .map(|s| (s.row, s.source_line()))
            .collect();
        assert_eq!(skipped, vec![(1, 6), (2, 8)]);
    }

    #[test]
    fn test_normalize_trims_cells() {
        let text = doc(" 2024-06-01 , /a ,  12 \n");
        let set = normalize(&text, &ColumnMap::default()).unwrap();
        assert_eq!(set.rows[0].label, "/a");
        assert_eq!(set.rows[0].count, 12);
    }

    #[test]
    fn test_normalize_missing_label_becomes_empty() {
        let text = doc("2024-06-01,,12\n");
        let set = normalize(&text, &ColumnMap::default()).unwrap();
        assert_eq!(set.rows[0].label, "");
    }

    #[test]
    fn test_normalize_with_category_column() {
        let text = "Fecha,Evento,Usuarios,Categoria\n\
                    2024-06-01,Final,1200,LigaMX\n\
                    2024-06-02,Gala,300,\n";
        let columns = ColumnMap {
            date: "Fecha".to_string(),
            label: "Evento".to_string(),
            count: "Usuarios".to_string(),
            category: Some("Categoria".to_string()),
        };
        let set = normalize(text, &columns).unwrap();
        assert_eq!(set.rows.len(), 2);
        assert_eq!(set.rows[0].category.as_deref(), Some("LigaMX"));
        assert_eq!(set.rows[1].category, None);
    }

    #[test]
    fn test_normalize_missing_configured_column_skips_rows() {
        let text = "Day,Object,Hits\n2024-06-01,/a,3\n";
        let set = normalize(text, &ColumnMap::default()).unwrap();
        assert!(set.rows.is_empty());
        assert_eq!(set.skipped.len(), 1);
        assert_eq!(set.skipped[0].cause, SkipCause::MissingCount);
    }

    #[test]
    fn test_normalize_propagates_document_error() {
        let text = doc("2024-06-01,\"/a,1\n");
        assert!(normalize(&text, &ColumnMap::default()).is_err());
    }

    // ── parse_count ───────────────────────────────────────────────────────────

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("0"), Some(0));
        assert_eq!(parse_count(" 42 "), Some(42));
        assert_eq!(parse_count("1,234"), Some(1234));
        assert_eq!(parse_count("12,345,678"), Some(12_345_678));
        assert_eq!(parse_count("1,23"), None);
        assert_eq!(parse_count("1234,567"), None);
        assert_eq!(parse_count("+5"), None);
        assert_eq!(parse_count("99999999999999999999999"), None);
        assert_eq!(parse_count(""), None);
    }
}
