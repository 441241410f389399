//! Serialize tables into downloadable payloads.

pub mod csv_export;
pub mod xlsx_export;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::table::Table;

pub use csv_export::export_csv;
pub use xlsx_export::export_xlsx;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" | "excel" => Ok(Self::Xlsx),
            other => Err(format!("unknown export format '{other}' (expected csv or xlsx)")),
        }
    }
}

/// Which table a download carries; fixes its file name and sheet name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    Establishments,
    Stations,
    Consolidated,
}

impl DownloadKind {
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Establishments => "servicios_filtrados",
            Self::Stations => "comisarias_filtradas",
            Self::Consolidated => "servicios_y_comisarias_filtrados",
        }
    }

    pub fn sheet_name(&self) -> &'static str {
        match self {
            Self::Establishments => "Servicios",
            Self::Stations => "Comisarias",
            Self::Consolidated => "Consolidado",
        }
    }

    pub fn file_name(&self, format: ExportFormat) -> String {
        format!("{}.{}", self.file_stem(), format.extension())
    }
}

impl FromStr for DownloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "servicios" | "establecimientos" => Ok(Self::Establishments),
            "comisarias" => Ok(Self::Stations),
            "consolidado" | "servicios_y_comisarias" => Ok(Self::Consolidated),
            other => Err(format!("unknown download '{other}'")),
        }
    }
}

/// A ready-to-send file.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// `sheet_name` is only used by spreadsheet output.
pub fn export_table(table: &Table, format: ExportFormat, sheet_name: &str) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => export_csv(table),
        ExportFormat::Xlsx => export_xlsx(table, sheet_name),
    }
}

pub fn build_download(
    table: &Table,
    kind: DownloadKind,
    format: ExportFormat,
) -> Result<Download, ExportError> {
    let bytes = export_table(table, format, kind.sheet_name())?;
    Ok(Download {
        file_name: kind.file_name(format),
        mime: format.mime(),
        bytes,
    })
}
