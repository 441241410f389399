//! Row filtering by a (department, province, district) selection.

use serde::{Deserialize, Serialize};

use crate::location::normalize::canonical_text;
use crate::location::{NormalizationPolicy, DEPARTMENT, DISTRICT, PROVINCE};
use crate::table::{Table, Value};

/// Label the dashboard shows for an unset level.
pub const ALL_LABEL: &str = "(Todos)";

/// A (department, province, district) selection. `None` means no constraint at that level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSelection {
    #[serde(rename = "departamento")]
    pub department: Option<String>,
    #[serde(rename = "provincia")]
    pub province: Option<String>,
    #[serde(rename = "distrito")]
    pub district: Option<String>,
}

fn concrete(label: Option<&str>) -> Option<String> {
    label
        .map(str::trim)
        .filter(|l| !l.is_empty() && *l != ALL_LABEL)
        .map(str::to_string)
}

impl LocationSelection {
    pub fn all() -> Self {
        LocationSelection::default()
    }

    /// Empty strings and `(Todos)` are unset.
    pub fn from_labels(
        department: Option<&str>,
        province: Option<&str>,
        district: Option<&str>,
    ) -> Self {
        LocationSelection {
            department: concrete(department),
            province: concrete(province),
            district: concrete(district),
        }
    }

    /// Canonicalize concrete levels the same way table location columns are.
    pub fn canonicalized(&self, policy: NormalizationPolicy) -> Self {
        let canon = |level: &Option<String>| level.as_deref().map(|v| canonical_text(v, policy));
        LocationSelection {
            department: canon(&self.department),
            province: canon(&self.province),
            district: canon(&self.district),
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.department.is_none() && self.province.is_none() && self.district.is_none()
    }

    fn levels(&self) -> [(&'static str, Option<&str>); 3] {
        [
            (DEPARTMENT, self.department.as_deref()),
            (PROVINCE, self.province.as_deref()),
            (DISTRICT, self.district.as_deref()),
        ]
    }
}

/// Rows of `table` matching every concrete level of `selection`, in original order.
/// A level whose column the table lacks is skipped.
pub fn filter_table(table: &Table, selection: &LocationSelection) -> Table {
    let constraints: Vec<(usize, &str)> = selection
        .levels()
        .into_iter()
        .filter_map(|(column, wanted)| Some((table.column_index(column)?, wanted?)))
        .collect();

    if constraints.is_empty() {
        return table.clone();
    }

    let rows = table
        .rows
        .iter()
        .filter(|row| {
            constraints
                .iter()
                .all(|(idx, wanted)| matches!(&row[*idx], Value::Text(v) if v == wanted))
        })
        .cloned()
        .collect();

    Table {
        columns: table.columns.clone(),
        rows,
    }
}
