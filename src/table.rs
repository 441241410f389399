//! In-memory record tables: ordered columns, ordered rows, one value per cell.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single cell. Serializes as JSON `null`, string or number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Missing,
    Text(String),
    Number(f64),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => f.write_str(&format_number(*n)),
        }
    }
}

/// Integral numbers render without a fractional part (`15`, not `15.0`).
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from `(column, value)` rows. Columns appear in first-seen order;
    /// cells a row does not name are `Missing`.
    pub fn from_records<I, R, K>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut table = Table::default();
        let mut pending: Vec<Vec<(usize, Value)>> = Vec::new();
        for record in records {
            let mut cells = Vec::new();
            for (name, value) in record {
                let name = name.into();
                let idx = match table.column_index(&name) {
                    Some(idx) => idx,
                    None => {
                        table.columns.push(name);
                        table.columns.len() - 1
                    }
                };
                cells.push((idx, value));
            }
            pending.push(cells);
        }
        let width = table.columns.len();
        table.rows = pending
            .into_iter()
            .map(|cells| {
                let mut row = vec![Value::Missing; width];
                for (idx, value) in cells {
                    row[idx] = value;
                }
                row
            })
            .collect();
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell lookup by row position and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Values of one column, top to bottom. `None` if the column is absent.
    pub fn column_values(&self, column: &str) -> Option<impl Iterator<Item = &Value> + '_> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Add a column (or overwrite an existing one) with the given per-row values.
    pub fn set_column(&mut self, name: &str, mut values: impl FnMut(usize, &[Value]) -> Value) {
        match self.column_index(name) {
            Some(idx) => {
                for (i, row) in self.rows.iter_mut().enumerate() {
                    let value = values(i, row);
                    row[idx] = value;
                }
            }
            None => {
                for (i, row) in self.rows.iter_mut().enumerate() {
                    let value = values(i, row);
                    row.push(value);
                }
                self.columns.push(name.to_string());
            }
        }
    }

    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        true
    }

    /// Move `name` to position 0, keeping the relative order of the rest.
    pub fn move_column_first(&mut self, name: &str) {
        let Some(idx) = self.column_index(name) else {
            return;
        };
        let column = self.columns.remove(idx);
        self.columns.insert(0, column);
        for row in &mut self.rows {
            let value = row.remove(idx);
            row.insert(0, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_records_aligns_columns_by_name() {
        let table = Table::from_records(vec![
            vec![("A", Value::text("1")), ("B", Value::text("2"))],
            vec![("B", Value::text("3")), ("C", Value::Number(4.0))],
        ]);
        assert_eq!(table.columns, vec!["A", "B", "C"]);
        assert_eq!(table.rows[0], vec![Value::text("1"), Value::text("2"), Value::Missing]);
        assert_eq!(table.rows[1], vec![Value::Missing, Value::text("3"), Value::Number(4.0)]);
    }

    #[test]
    fn move_column_first_keeps_remaining_order() {
        let mut table = Table::from_records(vec![vec![
            ("A", Value::text("a")),
            ("B", Value::text("b")),
            ("C", Value::text("c")),
        ]]);
        table.move_column_first("C");
        assert_eq!(table.columns, vec!["C", "A", "B"]);
        assert_eq!(table.rows[0], vec![Value::text("c"), Value::text("a"), Value::text("b")]);
    }

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(Value::Number(15.0).to_string(), "15");
        assert_eq!(Value::Number(3.5).to_string(), "3.5");
        assert_eq!(Value::Missing.to_string(), "");
    }
}
