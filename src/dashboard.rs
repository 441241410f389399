//! One dashboard interaction: filter both subject tables for a selection and serve what the
//! page shows (tables, counts, summary) or downloads.

use tracing::debug;

use crate::consolidate::consolidate;
use crate::data::Snapshot;
use crate::error::{DashboardError, SchemaError};
use crate::export::{build_download, Download, DownloadKind, ExportFormat};
use crate::location::{filter_table, LocationSelection};
use crate::table::Table;

#[derive(Debug, Clone)]
pub struct FilteredView {
    pub selection: LocationSelection,
    pub establishments: Table,
    pub stations: Table,
}

impl FilteredView {
    pub fn compute(snapshot: &Snapshot, selection: &LocationSelection) -> FilteredView {
        let establishments = filter_table(&snapshot.establishments, selection);
        let stations = filter_table(&snapshot.stations, selection);
        debug!(
            generation = snapshot.generation,
            establishments = establishments.len(),
            stations = stations.len(),
            "filtered view"
        );
        FilteredView {
            selection: selection.clone(),
            establishments,
            stations,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Resultados: {} servicios y {} comisarías mostradas.",
            self.establishments.len(),
            self.stations.len()
        )
    }

    pub fn consolidated(&self) -> Result<Table, SchemaError> {
        consolidate(&self.establishments, &self.stations)
    }

    pub fn download(&self, kind: DownloadKind, format: ExportFormat) -> Result<Download, DashboardError> {
        let download = match kind {
            DownloadKind::Establishments => build_download(&self.establishments, kind, format)?,
            DownloadKind::Stations => build_download(&self.stations, kind, format)?,
            DownloadKind::Consolidated => build_download(&self.consolidated()?, kind, format)?,
        };
        debug!(file = %download.file_name, bytes = download.bytes.len(), "built download");
        Ok(download)
    }
}
