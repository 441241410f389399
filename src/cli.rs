use std::fs;
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::dashboard::FilteredView;
use crate::data::DataCache;
use crate::export::{DownloadKind, ExportFormat};
use crate::location::LocationSelection;
use crate::server::{self, AppState};

const USAGE: &str = "usage: buscador <serve|options|results|export|version>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    Options,
    Results,
    Export,
    Version,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("serve") => Some(Command::Serve),
        Some("options") => Some(Command::Options),
        Some("results") => Some(Command::Results),
        Some("export") => Some(Command::Export),
        Some("version") => Some(Command::Version),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    let Some(command) = parse_command(args) else {
        eprintln!("{USAGE}");
        return 2;
    };
    // Usage errors are reported before any data is loaded.
    let export = if command == Command::Export {
        match parse_export_args(args) {
            Ok(export) => Some(export),
            Err(reason) => return export_usage(&reason),
        }
    } else {
        None
    };

    let state = match load_state() {
        Ok(state) => state,
        Err(code) => return code,
    };

    match command {
        Command::Serve => handle_serve(state),
        Command::Options => handle_options(&state, args),
        Command::Results => handle_results(&state, args),
        Command::Export => match export {
            Some(export) => handle_export(&state, args, export),
            None => export_usage("missing table name"),
        },
        Command::Version => handle_version(&state),
    }
}

fn load_state() -> Result<AppState, i32> {
    let config = AppConfig::load().map_err(|err| {
        eprintln!("config error: {err}");
        1
    })?;
    let cache = DataCache::load(&config).map_err(|err| {
        eprintln!("load failed: {err}");
        1
    })?;
    Ok(AppState::new(config, cache))
}

fn handle_serve(state: AppState) -> i32 {
    match server::run_server(state) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

fn handle_options(state: &AppState, args: &[String]) -> i32 {
    let selection = selection_from_args(state, args);
    let options = state.cache.snapshot().index.options(&selection);
    print_json(&options)
}

fn handle_results(state: &AppState, args: &[String]) -> i32 {
    let selection = selection_from_args(state, args);
    let snapshot = state.cache.snapshot();
    let view = FilteredView::compute(&snapshot, &selection);
    print_json(&serde_json::json!({
        "seleccion": view.selection,
        "establecimientos": view.establishments.len(),
        "comisarias": view.stations.len(),
        "resumen": view.summary(),
    }))
}

struct ExportArgs {
    kind: DownloadKind,
    format: Option<ExportFormat>,
    output: Option<PathBuf>,
}

fn parse_export_args(args: &[String]) -> Result<ExportArgs, String> {
    let kind = args
        .get(2)
        .filter(|a| !a.starts_with("--"))
        .ok_or_else(|| "missing table name".to_string())?
        .parse::<DownloadKind>()?;
    let format = flag_value(args, "--formato")
        .map(|raw| raw.parse::<ExportFormat>())
        .transpose()?;
    let output = flag_value(args, "--output").map(PathBuf::from);
    Ok(ExportArgs {
        kind,
        format,
        output,
    })
}

fn export_usage(reason: &str) -> i32 {
    eprintln!("{reason}");
    eprintln!(
        "usage: buscador export <servicios|comisarias|consolidado> [--formato csv|xlsx] \
         [--departamento X] [--provincia Y] [--distrito Z] [--output PATH]"
    );
    2
}

fn handle_export(state: &AppState, args: &[String], export: ExportArgs) -> i32 {
    let format = export.format.unwrap_or(state.config.export_format);
    let selection = selection_from_args(state, args);
    let snapshot = state.cache.snapshot();
    let view = FilteredView::compute(&snapshot, &selection);

    let download = match view.download(export.kind, format) {
        Ok(download) => download,
        Err(err) => {
            eprintln!("export failed: {err}");
            return 1;
        }
    };
    let output = export
        .output
        .unwrap_or_else(|| PathBuf::from(&download.file_name));
    if let Err(err) = fs::write(&output, &download.bytes) {
        eprintln!("failed to write {}: {err}", output.display());
        return 1;
    }
    println!(
        "export complete: file='{}', bytes={}",
        output.display(),
        download.bytes.len()
    );
    0
}

fn handle_version(state: &AppState) -> i32 {
    match server::api::data_version_payload(state) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize data version: {err}");
            1
        }
    }
}

fn selection_from_args(state: &AppState, args: &[String]) -> LocationSelection {
    LocationSelection::from_labels(
        flag_value(args, "--departamento"),
        flag_value(args, "--provincia"),
        flag_value(args, "--distrito"),
    )
    .canonicalized(state.cache.policy())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize output: {err}");
            1
        }
    }
}
