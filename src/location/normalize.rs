//! Canonical column names and location values so that index lookups and filters can use exact
//! string equality.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::location::LOCATION_COLUMNS;
use crate::table::{format_number, Table, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationPolicy {
    /// Upper-case column names and location values.
    #[default]
    Uppercase,
    /// Additionally strip diacritics from column names and from every text cell.
    StripAccents,
}

impl NormalizationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uppercase => "uppercase",
            Self::StripAccents => "strip_accents",
        }
    }

    pub fn strips_accents(&self) -> bool {
        matches!(self, Self::StripAccents)
    }
}

impl fmt::Display for NormalizationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "uppercase" | "upper" => Ok(Self::Uppercase),
            "strip_accents" | "accents" => Ok(Self::StripAccents),
            other => Err(format!("unknown normalization policy '{other}'")),
        }
    }
}

/// Remove diacritics: NFD decomposition with combining marks dropped.
pub fn strip_accents(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect()
}

pub fn canonical_column_name(name: &str, policy: NormalizationPolicy) -> String {
    let upper = name.trim().to_uppercase();
    if policy.strips_accents() {
        strip_accents(&upper)
    } else {
        upper
    }
}

/// Canonical form of a location value: trimmed, upper-cased, accent-free under `StripAccents`.
/// Also used for user-typed selections.
pub fn canonical_text(value: &str, policy: NormalizationPolicy) -> String {
    let upper = value.trim().to_uppercase();
    if policy.strips_accents() {
        strip_accents(&upper)
    } else {
        upper
    }
}

fn canonical_location(value: &Value, policy: NormalizationPolicy) -> Value {
    match value {
        Value::Missing => Value::Missing,
        Value::Text(s) => Value::Text(canonical_text(s, policy)),
        Value::Number(n) => Value::Text(canonical_text(&format_number(*n), policy)),
    }
}

fn canonical_cell(value: &Value, policy: NormalizationPolicy) -> Value {
    match value {
        Value::Text(s) if policy.strips_accents() => Value::Text(strip_accents(s)),
        other => other.clone(),
    }
}

/// Returns a normalized copy of `table`. Running it on its own output is a no-op.
pub fn normalize_table(table: &Table, policy: NormalizationPolicy) -> Table {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| canonical_column_name(c, policy))
        .collect();
    let is_location: Vec<bool> = columns
        .iter()
        .map(|c| LOCATION_COLUMNS.contains(&c.as_str()))
        .collect();

    let rows = table
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(&is_location)
                .map(|(value, &location)| {
                    if location {
                        canonical_location(value, policy)
                    } else {
                        canonical_cell(value, policy)
                    }
                })
                .collect()
        })
        .collect();

    Table { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_records(vec![vec![
            ("Departamento", Value::text(" lima ")),
            ("Provincia", Value::text("Lima")),
            ("Distrito", Value::Missing),
            ("Dirección", Value::text("Av. Perú 123")),
            ("Ubigeo", Value::Number(150101.0)),
        ]])
    }

    #[test]
    fn uppercase_policy_touches_names_and_location_values_only() {
        let table = normalize_table(&sample(), NormalizationPolicy::Uppercase);
        assert_eq!(
            table.columns,
            vec!["DEPARTAMENTO", "PROVINCIA", "DISTRITO", "DIRECCIÓN", "UBIGEO"]
        );
        assert_eq!(table.rows[0][0], Value::text("LIMA"));
        assert_eq!(table.rows[0][1], Value::text("LIMA"));
        assert_eq!(table.rows[0][2], Value::Missing);
        assert_eq!(table.rows[0][3], Value::text("Av. Perú 123"));
        assert_eq!(table.rows[0][4], Value::Number(150101.0));
    }

    #[test]
    fn strip_accents_policy_strips_every_text_cell() {
        let table = normalize_table(&sample(), NormalizationPolicy::StripAccents);
        assert_eq!(table.columns[3], "DIRECCION");
        assert_eq!(table.rows[0][3], Value::text("Av. Peru 123"));
    }

    #[test]
    fn numeric_location_values_become_text() {
        let table = Table::from_records(vec![vec![("distrito", Value::Number(7.0))]]);
        let table = normalize_table(&table, NormalizationPolicy::Uppercase);
        assert_eq!(table.rows[0][0], Value::text("7"));
    }

    #[test]
    fn strip_accents_handles_spanish_letters() {
        assert_eq!(strip_accents("ÁNCASH"), "ANCASH");
        assert_eq!(strip_accents("Piñón"), "Pinon");
        assert_eq!(canonical_text(" san martín ", NormalizationPolicy::StripAccents), "SAN MARTIN");
        assert_eq!(canonical_text(" san martín ", NormalizationPolicy::Uppercase), "SAN MARTÍN");
    }

    #[test]
    fn policy_parses_from_env_strings() {
        assert_eq!("strip-accents".parse::<NormalizationPolicy>(), Ok(NormalizationPolicy::StripAccents));
        assert_eq!("UPPERCASE".parse::<NormalizationPolicy>(), Ok(NormalizationPolicy::Uppercase));
        assert!("lower".parse::<NormalizationPolicy>().is_err());
    }
}
