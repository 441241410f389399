use csv::WriterBuilder;

use crate::error::ExportError;
use crate::table::Table;

/// UTF-8 CSV with a header row; missing cells are empty fields.
pub fn export_csv(table: &Table) -> Result<Vec<u8>, ExportError> {
    let mut w = WriterBuilder::new().from_writer(Vec::new());
    if !table.columns.is_empty() {
        w.write_record(&table.columns)
            .map_err(|e| ExportError::Csv(e.to_string()))?;
    }
    for row in &table.rows {
        w.write_record(row.iter().map(|v| v.to_string()))
            .map_err(|e| ExportError::Csv(e.to_string()))?;
    }
    w.into_inner().map_err(|e| ExportError::Csv(e.to_string()))
}
