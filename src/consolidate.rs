//! Merge filtered establishments and police stations into one table tagged by `TIPO`.

use tracing::debug;

use crate::error::SchemaError;
use crate::table::{Table, Value};

pub const TYPE_COLUMN: &str = "TIPO";
pub const NAME_COLUMN: &str = "ESTABLECIMIENTO";
pub const CATEGORY_COLUMN: &str = "CATEGORIA";
pub const STATION_COLUMN: &str = "COMISARIA";

pub const ESTABLISHMENT_TYPE: &str = "SERVICIO DE AYUDA";
pub const STATION_TYPE: &str = "COMISARIA";
pub const NOT_AVAILABLE: &str = "NO DISPONIBLE";

/// Inputs are untouched. Establishment rows come first; the result has `TIPO` as its first
/// column, no `CATEGORIA`/`COMISARIA` columns and no missing cells.
pub fn consolidate(establishments: &Table, stations: &Table) -> Result<Table, SchemaError> {
    if !establishments.has_column(CATEGORY_COLUMN) {
        return Err(SchemaError::MissingColumn {
            table: "establishments",
            column: CATEGORY_COLUMN,
        });
    }
    let station_idx = stations
        .column_index(STATION_COLUMN)
        .ok_or(SchemaError::MissingColumn {
            table: "stations",
            column: STATION_COLUMN,
        })?;

    let mut services = establishments.clone();
    services.set_column(TYPE_COLUMN, |_, _| Value::text(ESTABLISHMENT_TYPE));

    let mut police = stations.clone();
    police.set_column(NAME_COLUMN, |_, row| row[station_idx].clone());
    police.set_column(TYPE_COLUMN, |_, _| Value::text(STATION_TYPE));

    let mut merged = union(&services, &police);
    merged.drop_column(CATEGORY_COLUMN);
    merged.drop_column(STATION_COLUMN);
    for cell in merged.rows.iter_mut().flatten() {
        if cell.is_missing() {
            *cell = Value::text(NOT_AVAILABLE);
        }
    }
    merged.move_column_first(TYPE_COLUMN);

    debug!(
        establishments = establishments.len(),
        stations = stations.len(),
        columns = merged.columns.len(),
        "consolidated tables"
    );
    Ok(merged)
}

/// Row-wise union aligned on column name: left columns, then right-only columns.
fn union(left: &Table, right: &Table) -> Table {
    let mut columns = left.columns.clone();
    for column in &right.columns {
        if !columns.contains(column) {
            columns.push(column.clone());
        }
    }

    let mut rows = Vec::with_capacity(left.len() + right.len());
    for table in [left, right] {
        let positions: Vec<Option<usize>> =
            columns.iter().map(|c| table.column_index(c)).collect();
        rows.extend(table.rows.iter().map(|row| {
            positions
                .iter()
                .map(|pos| pos.map_or(Value::Missing, |i| row[i].clone()))
                .collect::<Vec<_>>()
        }));
    }

    Table { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_fills_absent_columns_with_missing() {
        let left = Table::from_records(vec![vec![("A", Value::text("a")), ("B", Value::text("b"))]]);
        let right = Table::from_records(vec![vec![("C", Value::text("c")), ("A", Value::text("x"))]]);
        let merged = union(&left, &right);
        assert_eq!(merged.columns, vec!["A", "B", "C"]);
        assert_eq!(merged.rows[0], vec![Value::text("a"), Value::text("b"), Value::Missing]);
        assert_eq!(merged.rows[1], vec![Value::text("x"), Value::Missing, Value::text("c")]);
    }

    #[test]
    fn station_name_overwrites_existing_establishment_column() {
        let establishments = Table::from_records(vec![vec![
            (CATEGORY_COLUMN, Value::text("X")),
            (NAME_COLUMN, Value::text("Posta A")),
        ]]);
        let stations = Table::from_records(vec![vec![
            (STATION_COLUMN, Value::text("Comisaria B")),
            (NAME_COLUMN, Value::text("sede antigua")),
        ]]);
        let merged = consolidate(&establishments, &stations).expect("merge");
        assert_eq!(merged.get(1, NAME_COLUMN), Some(&Value::text("Comisaria B")));
    }
}
