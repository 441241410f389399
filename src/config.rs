//! Application configuration: defaults, optional YAML file, environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::loader::InputFormat;
use crate::error::ConfigError;
use crate::export::ExportFormat;
use crate::location::NormalizationPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "buscador.yaml";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8501";
pub const DEFAULT_ESTABLISHMENTS_PATH: &str = "data/establecimientos.csv";
pub const DEFAULT_STATIONS_PATH: &str = "data/comisarias.csv";
pub const DEFAULT_LOCATIONS_PATH: &str = "data/ubigeos.csv";

/// Where and how to read one tabular source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    /// Inferred from the file extension when absent.
    pub format: Option<InputFormat>,
    pub delimiter: char,
    /// WHATWG encoding label (`utf-8`, `latin1`, `windows-1252`, ...); `latin-1` style
    /// spellings with `-`/`_` are accepted too.
    pub encoding: String,
    /// Spreadsheet sheet; first sheet when absent.
    pub sheet: Option<String>,
    pub max_rows: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            path: PathBuf::new(),
            format: None,
            delimiter: ',',
            encoding: "utf-8".to_string(),
            sheet: None,
            max_rows: None,
        }
    }
}

impl SourceConfig {
    pub fn csv(path: impl Into<PathBuf>) -> Self {
        SourceConfig {
            path: path.into(),
            ..SourceConfig::default()
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "delimiter",
                reason: format!("'{}' is not a single ASCII character", self.delimiter),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub normalization: NormalizationPolicy,
    pub export_format: ExportFormat,
    pub establishments: SourceConfig,
    pub stations: SourceConfig,
    pub locations: SourceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            normalization: NormalizationPolicy::default(),
            export_format: ExportFormat::default(),
            establishments: SourceConfig::csv(DEFAULT_ESTABLISHMENTS_PATH),
            stations: SourceConfig::csv(DEFAULT_STATIONS_PATH),
            locations: SourceConfig::csv(DEFAULT_LOCATIONS_PATH).with_delimiter(';'),
        }
    }
}

/// A source block as written in YAML. Omitted fields keep that source's default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct SourceFile {
    path: Option<PathBuf>,
    format: Option<InputFormat>,
    delimiter: Option<char>,
    encoding: Option<String>,
    sheet: Option<String>,
    max_rows: Option<usize>,
}

impl SourceFile {
    fn apply(self, base: &mut SourceConfig) {
        if let Some(path) = self.path {
            base.path = path;
        }
        if self.format.is_some() {
            base.format = self.format;
        }
        if let Some(delimiter) = self.delimiter {
            base.delimiter = delimiter;
        }
        if let Some(encoding) = self.encoding {
            base.encoding = encoding;
        }
        if self.sheet.is_some() {
            base.sheet = self.sheet;
        }
        if self.max_rows.is_some() {
            base.max_rows = self.max_rows;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    bind_addr: Option<String>,
    normalization: Option<NormalizationPolicy>,
    export_format: Option<ExportFormat>,
    establishments: Option<SourceFile>,
    stations: Option<SourceFile>,
    locations: Option<SourceFile>,
}

impl ConfigFile {
    fn into_config(self) -> AppConfig {
        let mut config = AppConfig::default();
        if let Some(bind_addr) = self.bind_addr {
            config.bind_addr = bind_addr;
        }
        if let Some(policy) = self.normalization {
            config.normalization = policy;
        }
        if let Some(format) = self.export_format {
            config.export_format = format;
        }
        for (file, source) in [
            (self.establishments, &mut config.establishments),
            (self.stations, &mut config.stations),
            (self.locations, &mut config.locations),
        ] {
            if let Some(file) = file {
                file.apply(source);
            }
        }
        config
    }
}

impl AppConfig {
    /// `BUSCADOR_CONFIG`, else `buscador.yaml` when present, else defaults; then env overrides.
    pub fn load() -> Result<AppConfig, ConfigError> {
        let mut config = match env::var("BUSCADOR_CONFIG") {
            Ok(path) => Self::from_yaml_file(Path::new(&path))?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).is_file() => {
                Self::from_yaml_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            Err(_) => AppConfig::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<AppConfig, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Fields the YAML omits, including fields inside a source block, keep their defaults.
    pub fn from_yaml_str(raw: &str) -> Result<AppConfig, serde_yaml::Error> {
        let file: ConfigFile = serde_yaml::from_str(raw)?;
        Ok(file.into_config())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(bind) = env::var("BUSCADOR_BIND") {
            self.bind_addr = bind;
        }
        if let Ok(raw) = env::var("BUSCADOR_NORMALIZATION") {
            self.normalization = raw.parse().map_err(|reason| ConfigError::InvalidValue {
                field: "BUSCADOR_NORMALIZATION",
                reason,
            })?;
        }
        if let Ok(raw) = env::var("BUSCADOR_EXPORT_FORMAT") {
            self.export_format = raw.parse().map_err(|reason| ConfigError::InvalidValue {
                field: "BUSCADOR_EXPORT_FORMAT",
                reason,
            })?;
        }
        if let Ok(dir) = env::var("BUSCADOR_DATA_DIR") {
            self.reroot_sources(Path::new(&dir));
        }
        Ok(())
    }

    /// Keep each source's file name but look for it under `dir`.
    pub fn reroot_sources(&mut self, dir: &Path) {
        for source in [
            &mut self.establishments,
            &mut self.stations,
            &mut self.locations,
        ] {
            if let Some(name) = source.path.file_name() {
                source.path = dir.join(name);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for source in [&self.establishments, &self.stations, &self.locations] {
            source.delimiter_byte()?;
            if source.path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "path",
                    reason: "source path must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_overrides_only_named_fields() {
        let raw = r#"
normalization: strip_accents
export_format: xlsx
establishments:
  path: datos/establecimientos_consolidados.xlsx
  sheet: Hoja1
"#;
        let config = AppConfig::from_yaml_str(raw).expect("config should parse");
        assert_eq!(config.normalization, NormalizationPolicy::StripAccents);
        assert_eq!(config.export_format, ExportFormat::Xlsx);
        assert_eq!(
            config.establishments.path,
            PathBuf::from("datos/establecimientos_consolidados.xlsx")
        );
        assert_eq!(config.establishments.sheet.as_deref(), Some("Hoja1"));
        assert_eq!(config.stations.path, PathBuf::from(DEFAULT_STATIONS_PATH));
        assert_eq!(config.locations.delimiter, ';');
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
    }

    #[test]
    fn partial_source_block_keeps_slot_defaults() {
        let raw = r#"
locations:
  encoding: latin-1
  max_rows: 1892
stations:
  delimiter: "|"
"#;
        let config = AppConfig::from_yaml_str(raw).expect("config should parse");
        assert_eq!(config.locations.path, PathBuf::from(DEFAULT_LOCATIONS_PATH));
        assert_eq!(config.locations.delimiter, ';');
        assert_eq!(config.locations.encoding, "latin-1");
        assert_eq!(config.locations.max_rows, Some(1892));
        assert_eq!(config.stations.path, PathBuf::from(DEFAULT_STATIONS_PATH));
        assert_eq!(config.stations.delimiter, '|');
        assert_eq!(config.establishments, AppConfig::default().establishments);
    }

    #[test]
    fn empty_yaml_is_the_default_config() {
        let config = AppConfig::from_yaml_str("{}").expect("config should parse");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        let mut config = AppConfig::default();
        config.locations.delimiter = '§';
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "delimiter", .. })
        ));
    }

    #[test]
    fn reroot_keeps_file_names() {
        let mut config = AppConfig::default();
        config.reroot_sources(Path::new("/srv/padron"));
        assert_eq!(config.stations.path, PathBuf::from("/srv/padron/comisarias.csv"));
        assert_eq!(config.locations.path, PathBuf::from("/srv/padron/ubigeos.csv"));
    }
}
