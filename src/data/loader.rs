//! Read CSV and spreadsheet sources into [`Table`]s.
//! CSV text is decoded with encoding_rs first (the locations file ships as latin-1); spreadsheets
//! go through calamine.

use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_from_rs, Data, Range, Reader, Xlsx, XlsxError};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::error::LoadError;
use crate::table::{Table, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    Csv,
    Spreadsheet,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Option<InputFormat> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" | "tsv" => Some(InputFormat::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(InputFormat::Spreadsheet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub encoding: String,
    pub max_rows: Option<usize>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            delimiter: b',',
            encoding: "utf-8".to_string(),
            max_rows: None,
        }
    }
}

pub fn load_table(source: &SourceConfig) -> Result<Table, LoadError> {
    let path = source.path.as_path();
    let label = path.display().to_string();
    let format = source
        .format
        .or_else(|| InputFormat::from_path(path))
        .unwrap_or(InputFormat::Csv);

    let table = match format {
        InputFormat::Csv => {
            let bytes = fs::read(path).map_err(|source| LoadError::Read {
                path: label.clone(),
                source,
            })?;
            let delimiter = source
                .delimiter_byte()
                .map_err(|err| LoadError::Options {
                    path: label.clone(),
                    message: err.to_string(),
                })?;
            let options = CsvOptions {
                delimiter,
                encoding: source.encoding.clone(),
                max_rows: source.max_rows,
            };
            read_csv_bytes(&label, &bytes, &options)?
        }
        InputFormat::Spreadsheet => {
            if !path.is_file() {
                return Err(LoadError::Read {
                    path: label,
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                });
            }
            let mut workbook = open_workbook_auto(path).map_err(|err| LoadError::Spreadsheet {
                path: label.clone(),
                message: err.to_string(),
            })?;
            let range = read_range(&label, &mut workbook, source.sheet.as_deref())?;
            table_from_range(&label, &range, source.max_rows)?
        }
    };

    info!(
        path = %label,
        rows = table.len(),
        columns = table.columns.len(),
        "loaded source table"
    );
    Ok(table)
}

/// Parse CSV bytes with a header row. `label` names the source in errors.
pub fn read_csv_bytes(label: &str, bytes: &[u8], options: &CsvOptions) -> Result<Table, LoadError> {
    let encoding = resolve_encoding(&options.encoding).ok_or_else(|| LoadError::Encoding {
        path: label.to_string(),
        label: options.encoding.clone(),
    })?;
    // decode() sniffs and strips a BOM.
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!(path = label, encoding = encoding.name(), "replaced undecodable bytes");
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let csv_err = |source| LoadError::Csv {
        path: label.to_string(),
        source,
    };
    let headers = reader.headers().map_err(csv_err)?.clone();
    if headers.is_empty() {
        return Err(LoadError::NoHeader {
            path: label.to_string(),
        });
    }
    let mut table = Table::new(header_names(headers.iter()));

    for record in reader.records() {
        if options.max_rows.is_some_and(|max| table.len() >= max) {
            break;
        }
        let record = record.map_err(csv_err)?;
        let mut row: Vec<Value> = record.iter().map(infer_value).collect();
        row.resize(table.columns.len(), Value::Missing);
        table.rows.push(row);
    }
    Ok(table)
}

/// WHATWG label lookup, retried with `-`/`_` removed so `latin-1` and `latin_1` resolve like
/// `latin1`.
pub fn resolve_encoding(label: &str) -> Option<&'static Encoding> {
    let label = label.trim();
    Encoding::for_label(label.as_bytes()).or_else(|| {
        let compact: String = label.chars().filter(|c| !matches!(c, '-' | '_')).collect();
        Encoding::for_label(compact.as_bytes())
    })
}

/// Parse an xlsx payload (first sheet unless `sheet` names one).
pub fn read_xlsx_bytes(label: &str, bytes: &[u8], sheet: Option<&str>) -> Result<Table, LoadError> {
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(Cursor::new(bytes)).map_err(|err: XlsxError| {
            LoadError::Spreadsheet {
                path: label.to_string(),
                message: err.to_string(),
            }
        })?;
    let range = read_range(label, &mut workbook, sheet)?;
    table_from_range(label, &range, None)
}

fn read_range<RS, R>(label: &str, workbook: &mut R, sheet: Option<&str>) -> Result<Range<Data>, LoadError>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    let spreadsheet_err = |message: String| LoadError::Spreadsheet {
        path: label.to_string(),
        message,
    };
    let names = workbook.sheet_names();
    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| spreadsheet_err(format!("sheet '{wanted}' not found")))?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| spreadsheet_err("workbook has no sheets".to_string()))?,
    };
    debug!(path = label, sheet = %name, "reading sheet");
    workbook
        .worksheet_range(&name)
        .map_err(|err| spreadsheet_err(err.to_string()))
}

fn table_from_range(label: &str, range: &Range<Data>, max_rows: Option<usize>) -> Result<Table, LoadError> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Err(LoadError::NoHeader {
            path: label.to_string(),
        });
    };
    let header: Vec<String> = header.iter().map(|cell| cell_value(cell).to_string()).collect();
    let mut table = Table::new(header_names(header.iter().map(String::as_str)));

    for row in rows.take(max_rows.unwrap_or(usize::MAX)) {
        let mut values: Vec<Value> = row.iter().map(cell_value).collect();
        values.resize(table.columns.len(), Value::Missing);
        table.rows.push(values);
    }
    Ok(table)
}

fn header_names<'a>(cells: impl Iterator<Item = &'a str>) -> Vec<String> {
    cells
        .enumerate()
        .map(|(i, name)| {
            let name = name.trim_start_matches('\u{feff}');
            if name.trim().is_empty() {
                format!("UNNAMED: {i}")
            } else {
                name.to_string()
            }
        })
        .collect()
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Missing,
        Data::String(s) if s.is_empty() => Value::Missing,
        Data::String(s) => Value::Text(s.clone()),
        Data::Float(f) => Value::Number(*f),
        Data::Int(i) => Value::Number(*i as f64),
        Data::Bool(b) => Value::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        other => Value::Text(other.to_string()),
    }
}

/// Empty → missing, plain decimal → number, anything else stays text.
/// Codes with a leading zero (`010101`) stay text so ubigeo codes survive.
pub fn infer_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Missing;
    }
    if looks_numeric(raw) {
        if let Ok(n) = raw.parse::<f64>() {
            return Value::Number(n);
        }
    }
    Value::Text(raw.to_string())
}

fn looks_numeric(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let mut parts = digits.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();

    let int_ok = !int_part.is_empty()
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && !(int_part.len() > 1 && int_part.starts_with('0'));
    let frac_ok = frac_part.map_or(true, |f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()));
    int_ok && frac_ok
}
