//! Location canonicalization, the cascading option index, and the location filter.

pub mod filter;
pub mod index;
pub mod normalize;

pub use filter::{filter_table, LocationSelection, ALL_LABEL};
pub use index::{LocationIndex, LocationOptions};
pub use normalize::{normalize_table, NormalizationPolicy};

pub const DEPARTMENT: &str = "DEPARTAMENTO";
pub const PROVINCE: &str = "PROVINCIA";
pub const DISTRICT: &str = "DISTRITO";

/// Location columns, coarsest level first.
pub const LOCATION_COLUMNS: [&str; 3] = [DEPARTMENT, PROVINCE, DISTRICT];
