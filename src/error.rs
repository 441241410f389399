use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse csv {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("failed to read spreadsheet {path}: {message}")]
    Spreadsheet { path: String, message: String },
    #[error("unknown text encoding '{label}' for {path}")]
    Encoding { path: String, label: String },
    #[error("{path}: {message}")]
    Options { path: String, message: String },
    #[error("{path}: no header row")]
    NoHeader { path: String },
    #[error("{path}: missing required column {column}")]
    MissingColumn { path: String, column: &'static str },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{table} table has no {column} column")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv export error: {0}")]
    Csv(String),
    #[error("xlsx export error: {0}")]
    Xlsx(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Export(#[from] ExportError),
}
