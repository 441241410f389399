//! Cascading department → province → district option lists built from the locations table.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::SchemaError;
use crate::location::{LocationSelection, DEPARTMENT, DISTRICT, PROVINCE};
use crate::table::{Table, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
struct LocationEntry {
    department: Option<String>,
    province: Option<String>,
    district: Option<String>,
}

/// The three option lists a dashboard shows for one selection (without the `(Todos)` entry).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocationOptions {
    #[serde(rename = "departamentos")]
    pub departments: Vec<String>,
    #[serde(rename = "provincias")]
    pub provinces: Vec<String>,
    #[serde(rename = "distritos")]
    pub districts: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LocationIndex {
    entries: Vec<LocationEntry>,
}

fn text(value: &Value) -> Option<String> {
    value.as_text().map(str::to_string)
}

fn matches(level: Option<&String>, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(w) => level.map(String::as_str) == Some(w),
    }
}

impl LocationIndex {
    /// Expects a normalized table carrying all three location columns.
    pub fn from_table(table: &Table) -> Result<LocationIndex, SchemaError> {
        let column = |name: &'static str| {
            table.column_index(name).ok_or(SchemaError::MissingColumn {
                table: "locations",
                column: name,
            })
        };
        let (dep, prov, dist) = (column(DEPARTMENT)?, column(PROVINCE)?, column(DISTRICT)?);

        let entries = table
            .rows
            .iter()
            .map(|row| LocationEntry {
                department: text(&row[dep]),
                province: text(&row[prov]),
                district: text(&row[dist]),
            })
            .collect();
        Ok(LocationIndex { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn departments(&self) -> Vec<String> {
        collect_sorted(self.entries.iter().map(|e| e.department.as_ref()))
    }

    pub fn provinces(&self, department: Option<&str>) -> Vec<String> {
        collect_sorted(
            self.entries
                .iter()
                .filter(|e| matches(e.department.as_ref(), department))
                .map(|e| e.province.as_ref()),
        )
    }

    /// Each concrete level narrows the list; an unset level imposes nothing.
    pub fn districts(&self, department: Option<&str>, province: Option<&str>) -> Vec<String> {
        collect_sorted(
            self.entries
                .iter()
                .filter(|e| matches(e.department.as_ref(), department))
                .filter(|e| matches(e.province.as_ref(), province))
                .map(|e| e.district.as_ref()),
        )
    }

    /// Lists are computed top-down: a province that is not offered under the selected
    /// department no longer narrows the districts.
    pub fn options(&self, selection: &LocationSelection) -> LocationOptions {
        let department = selection.department.as_deref();
        let provinces = self.provinces(department);
        let province = selection
            .province
            .as_deref()
            .filter(|p| provinces.iter().any(|offered| offered == p));
        LocationOptions {
            departments: self.departments(),
            districts: self.districts(department, province),
            provinces,
        }
    }
}

fn collect_sorted<'a>(values: impl Iterator<Item = Option<&'a String>>) -> Vec<String> {
    values
        .flatten()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
