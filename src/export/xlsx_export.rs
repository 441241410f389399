use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::error::ExportError;
use crate::table::{Table, Value};

fn header_format() -> Format {
    Format::new().set_bold()
}

fn xlsx_err(err: XlsxError) -> ExportError {
    ExportError::Xlsx(err.to_string())
}

/// Single-sheet workbook: bold header row, text as strings, numbers as numbers, missing as blank.
pub fn export_xlsx(table: &Table, sheet_name: &str) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet();
    ws.set_name(sheet_name).map_err(xlsx_err)?;

    let hfmt = header_format();
    for (c, name) in table.columns.iter().enumerate() {
        let col = column_u16(c)?;
        ws.write_string_with_format(0, col, name, &hfmt).map_err(xlsx_err)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let row_idx = u32::try_from(r + 1)
            .map_err(|_| ExportError::Xlsx(format!("row {} exceeds worksheet limits", r + 1)))?;
        for (c, value) in row.iter().enumerate() {
            let col = column_u16(c)?;
            match value {
                Value::Missing => {}
                Value::Text(s) => {
                    ws.write_string(row_idx, col, s).map_err(xlsx_err)?;
                }
                Value::Number(n) => {
                    ws.write_number(row_idx, col, *n).map_err(xlsx_err)?;
                }
            }
        }
    }

    workbook.save_to_buffer().map_err(xlsx_err)
}

fn column_u16(c: usize) -> Result<u16, ExportError> {
    u16::try_from(c).map_err(|_| ExportError::Xlsx(format!("column {c} exceeds worksheet limits")))
}
