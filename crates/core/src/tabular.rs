//! Tabular decoding of uploaded import files.
//!
//! `.csv` files are decoded as delimited text, `.xlsx` / `.xls` files as
//! workbooks. Both produce the same shape: an ordered list of rows mapping
//! the header-row labels to cell text. Cells with empty values are dropped
//! from their row, so absence of a key is always per-row.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use indexmap::IndexMap;

/// One decoded row: header label → cell text.
pub type RawRow = IndexMap<String, String>;

/// File extensions accepted by the decoder.
pub const DELIMITED_EXTENSIONS: &[&str] = &["csv"];
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls"];

/// Integral floats below this magnitude are rendered without a fraction.
const MAX_INTEGRAL_FLOAT: f64 = 1e15;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Unsupported file type: {0}. Upload a .csv, .xlsx or .xls file")]
    UnsupportedFileType(String),

    #[error("Failed to read {file}: {message}")]
    Read { file: String, message: String },

    #[error("Workbook {0} contains no sheets")]
    NoSheets(String),

    #[error("Sheet not found in workbook: {0}")]
    UnknownSheet(String),
}

/// How a file's content is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    DelimitedText,
    Spreadsheet,
}

impl FileKind {
    /// Route a file by its extension (case-insensitive).
    pub fn from_file_name(name: &str) -> Result<Self, DecodeError> {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        if DELIMITED_EXTENSIONS.contains(&ext.as_str()) {
            Ok(Self::DelimitedText)
        } else if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
            Ok(Self::Spreadsheet)
        } else {
            Err(DecodeError::UnsupportedFileType(name.to_string()))
        }
    }
}

/// A user-supplied file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub size: u64,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            bytes,
        }
    }
}

/// Result of decoding one file (and, for workbooks, one sheet).
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFile {
    pub kind: FileKind,
    /// Sheet names in workbook order; empty for delimited text.
    pub sheet_names: Vec<String>,
    pub active_sheet: Option<String>,
    pub rows: Vec<RawRow>,
}

/// Decode `file`. For workbooks, `sheet` selects the sheet to read and
/// defaults to the first one.
pub fn decode(file: &UploadFile, sheet: Option<&str>) -> Result<DecodedFile, DecodeError> {
    match FileKind::from_file_name(&file.name)? {
        FileKind::DelimitedText => {
            let rows = decode_delimited(&file.bytes).map_err(|e| DecodeError::Read {
                file: file.name.clone(),
                message: e.to_string(),
            })?;
            Ok(DecodedFile {
                kind: FileKind::DelimitedText,
                sheet_names: Vec::new(),
                active_sheet: None,
                rows,
            })
        }
        FileKind::Spreadsheet => decode_workbook(file, sheet),
    }
}

/// Decode delimited text using the first record as the header row.
pub fn decode_delimited(bytes: &[u8]) -> Result<Vec<RawRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches('\u{feff}').to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = build_row(&headers, record.iter().map(|v| Some(v.to_string())));
        if !row.is_empty() {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn decode_workbook(file: &UploadFile, sheet: Option<&str>) -> Result<DecodedFile, DecodeError> {
    let read_error = |message: String| DecodeError::Read {
        file: file.name.clone(),
        message,
    };

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(file.bytes.clone()))
        .map_err(|e| read_error(e.to_string()))?;

    let sheet_names = workbook.sheet_names();
    let active = match sheet {
        Some(name) if sheet_names.iter().any(|s| s == name) => name.to_string(),
        Some(name) => return Err(DecodeError::UnknownSheet(name.to_string())),
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| DecodeError::NoSheets(file.name.clone()))?,
    };

    let range = workbook
        .worksheet_range(&active)
        .map_err(|e| read_error(e.to_string()))?;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = sheet_rows
        .next()
        .map(|cells| {
            cells
                .iter()
                .map(|c| cell_to_text(c).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default();

    let rows = sheet_rows
        .map(|cells| build_row(&headers, cells.iter().map(cell_to_text)))
        .filter(|row| !row.is_empty())
        .collect();

    Ok(DecodedFile {
        kind: FileKind::Spreadsheet,
        sheet_names,
        active_sheet: Some(active),
        rows,
    })
}

/// Zip header labels with cell values, dropping empty headers and values.
fn build_row(headers: &[String], cells: impl Iterator<Item = Option<String>>) -> RawRow {
    headers
        .iter()
        .zip(cells)
        .filter_map(|(header, value)| {
            let value = value?;
            if header.is_empty() || value.is_empty() {
                None
            } else {
                Some((header.clone(), value))
            }
        })
        .collect()
}

/// Text form of a workbook cell. Numbers are rendered as text so that
/// identifiers compare as strings downstream.
fn cell_to_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(float_to_text(*f)),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(match dt.as_datetime() {
            Some(ts) if ts.time() == chrono::NaiveTime::MIN => ts.format("%Y-%m-%d").to_string(),
            Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => float_to_text(dt.as_f64()),
        }),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

fn float_to_text(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < MAX_INTEGRAL_FLOAT {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_xlsxwriter::Workbook;

    fn two_sheet_workbook() -> Vec<u8> {
        let mut workbook = Workbook::new();
        {
            let sheet = workbook.add_worksheet();
            sheet.set_name("Waves").unwrap();
            sheet.write_string(0, 0, "wave_name").unwrap();
            sheet.write_string(0, 1, "wave_id").unwrap();
            sheet.write_string(1, 0, "Wave1").unwrap();
            sheet.write_number(1, 1, 42.0).unwrap();
            sheet.write_string(2, 0, "Wave2").unwrap();
        }
        {
            let sheet = workbook.add_worksheet();
            sheet.set_name("Servers").unwrap();
            sheet.write_string(0, 0, "server_name").unwrap();
            sheet.write_string(1, 0, "srv1").unwrap();
            sheet.write_number(2, 0, 1.5).unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn routes_by_extension() {
        assert_eq!(FileKind::from_file_name("a.CSV").unwrap(), FileKind::DelimitedText);
        assert_eq!(FileKind::from_file_name("a.xlsx").unwrap(), FileKind::Spreadsheet);
        assert_eq!(FileKind::from_file_name("a.xls").unwrap(), FileKind::Spreadsheet);
        assert_matches!(
            FileKind::from_file_name("a.txt"),
            Err(DecodeError::UnsupportedFileType(_))
        );
        assert_matches!(
            FileKind::from_file_name("noext"),
            Err(DecodeError::UnsupportedFileType(_))
        );
    }

    #[test]
    fn delimited_rows_drop_empty_cells() {
        let csv = "wave_name,wave_status\nWave1,\n,Planning\n,\n";
        let rows = decode_delimited(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("wave_name").map(String::as_str), Some("Wave1"));
        assert!(!rows[0].contains_key("wave_status"));
        assert!(!rows[1].contains_key("wave_name"));
    }

    #[test]
    fn delimited_header_bom_is_stripped() {
        let csv = "\u{feff}wave_name\nWave1\n";
        let rows = decode_delimited(csv.as_bytes()).unwrap();
        assert!(rows[0].contains_key("wave_name"));
    }

    #[test]
    fn delimited_tolerates_ragged_rows() {
        let csv = "a,b,c\n1,2\n1,2,3,4\n";
        let rows = decode_delimited(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[1].len(), 3);
    }

    #[test]
    fn decode_csv_upload() {
        let file = UploadFile::new("waves.csv", b"wave_name\nWave1\n".to_vec());
        let decoded = decode(&file, None).unwrap();
        assert_eq!(decoded.kind, FileKind::DelimitedText);
        assert!(decoded.sheet_names.is_empty());
        assert_eq!(decoded.rows.len(), 1);
        assert_eq!(file.size, 16);
    }

    #[test]
    fn workbook_defaults_to_first_sheet_and_stringifies_numbers() {
        let file = UploadFile::new("import.xlsx", two_sheet_workbook());
        let decoded = decode(&file, None).unwrap();

        assert_eq!(decoded.sheet_names, vec!["Waves".to_string(), "Servers".to_string()]);
        assert_eq!(decoded.active_sheet.as_deref(), Some("Waves"));
        assert_eq!(decoded.rows.len(), 2);
        assert_eq!(decoded.rows[0]["wave_id"], "42");
        assert!(!decoded.rows[1].contains_key("wave_id"));
    }

    #[test]
    fn workbook_sheet_selection() {
        let file = UploadFile::new("import.xlsx", two_sheet_workbook());
        let decoded = decode(&file, Some("Servers")).unwrap();
        assert_eq!(decoded.active_sheet.as_deref(), Some("Servers"));
        assert_eq!(decoded.rows[0]["server_name"], "srv1");
        assert_eq!(decoded.rows[1]["server_name"], "1.5");

        assert_matches!(
            decode(&file, Some("Missing")),
            Err(DecodeError::UnknownSheet(name)) if name == "Missing"
        );
    }

    #[test]
    fn unreadable_workbook_is_a_read_error() {
        let file = UploadFile::new("broken.xlsx", b"not a zip".to_vec());
        assert_matches!(decode(&file, None), Err(DecodeError::Read { .. }));
    }
}
