// termgrid - terminal spreadsheet with a live formula engine

mod exit_codes;
mod logging;
mod render;
mod tui;
mod util;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use termgrid_config::Settings;
use termgrid_engine::{CellRef, Workbook};

use exit_codes::{commit_exit_code, native_exit_code, EXIT_ERROR, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "termgrid")]
#[command(about = "Terminal spreadsheet with live formula recalculation")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, env = "TERMGRID_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a workbook in the full-screen editor (created on first save if missing)
    #[command(after_help = "\
Examples:
  termgrid open budget.tgrid
  termgrid -vv open budget.tgrid   # debug log in the cache directory")]
    Open {
        file: PathBuf,
    },

    /// Print a window of a sheet as a plain text table
    #[command(after_help = "\
Examples:
  termgrid show budget.tgrid
  termgrid show budget.tgrid --sheet Totals --at C10 --rows 5 --cols 3")]
    Show {
        file: PathBuf,

        /// Sheet name (defaults to the active sheet)
        #[arg(long)]
        sheet: Option<String>,

        /// Top-left cell of the window
        #[arg(long, default_value = "A1")]
        at: String,

        /// Rows to print (defaults to the configured viewport)
        #[arg(long)]
        rows: Option<u32>,

        /// Columns to print (defaults to the configured viewport)
        #[arg(long)]
        cols: Option<u32>,
    },

    /// Write one cell, recalculate, and save
    #[command(after_help = "\
Examples:
  termgrid set budget.tgrid A1 1200
  termgrid set budget.tgrid B1 '$=A1 * 12' --create
  termgrid set budget.tgrid A1 ''          # clear")]
    Set {
        file: PathBuf,

        /// Cell reference, e.g. B7
        cell: String,

        /// Raw input; formulas start with $=
        #[arg(allow_hyphen_values = true)]
        value: String,

        /// Sheet name (defaults to the active sheet)
        #[arg(long)]
        sheet: Option<String>,

        /// Create the workbook if the file does not exist
        #[arg(long)]
        create: bool,
    },

    /// List the functions available in formulas
    Functions,

    /// Print the settings file location and the effective settings
    Config,
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn native(err: termgrid_io::NativeError) -> Self {
        Self { code: native_exit_code(&err), message: err.to_string(), hint: None }
    }

    pub fn commit(err: termgrid_engine::EngineError) -> Self {
        Self { code: commit_exit_code(&err), message: err.to_string(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if !matches!(cli.command, Some(Commands::Open { .. })) {
        logging::init_terminal(cli.verbose);
    }
    let config = cli.config.as_deref();

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: termgrid <command> [options]");
            eprintln!("       termgrid --help for more information");
            Ok(())
        }
        Some(Commands::Open { file }) => cmd_open(file, cli.verbose, config),
        Some(Commands::Show { file, sheet, at, rows, cols }) => {
            cmd_show(&load_settings(config), &file, sheet.as_deref(), &at, rows, cols)
        }
        Some(Commands::Set { file, cell, value, sheet, create }) => {
            cmd_set(&load_settings(config), &file, sheet.as_deref(), &cell, &value, create)
        }
        Some(Commands::Functions) => cmd_functions(),
        Some(Commands::Config) => cmd_config(&load_settings(config), config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn load_settings(path: Option<&Path>) -> Settings {
    match path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
}

/// Read a workbook, or start an empty one bound to `path` when allowed.
fn load_workbook(settings: &Settings, path: &Path, create: bool) -> Result<Workbook, CliError> {
    if !path.exists() {
        if !create {
            return Err(CliError::io(format!("{}: no such file", path.display()))
                .with_hint("pass --create to start a new workbook"));
        }
        log::info!("starting new workbook at {}", path.display());
        let mut workbook = Workbook::new(settings.sheet_options());
        workbook.set_current_file(Some(path.to_path_buf()));
        return Ok(workbook);
    }
    termgrid_io::load_workbook(path, settings.sheet_options()).map_err(CliError::native)
}

fn resolve_sheet(workbook: &Workbook, name: Option<&str>) -> Result<usize, CliError> {
    match name {
        None => Ok(workbook.active_sheet_index()),
        Some(name) => workbook.sheet_index(name).ok_or_else(|| {
            CliError::args(format!("no sheet named '{}'", name))
                .with_hint(format!("sheets: {}", workbook.sheet_names().join(", ")))
        }),
    }
}

fn parse_cell(text: &str) -> Result<CellRef, CliError> {
    CellRef::parse(text).map_err(|e| CliError::args(format!("invalid cell reference '{}': {}", text, e)))
}

// ============================================================================
// open
// ============================================================================

fn cmd_open(file: PathBuf, verbose: u8, config: Option<&Path>) -> Result<(), CliError> {
    let log_path = logging::init_file(verbose).map_err(CliError::io)?;
    let settings = load_settings(config);
    let workbook = load_workbook(&settings, &file, true)?;
    log::info!("opened {} ({} sheets)", file.display(), workbook.sheet_count());

    let workbook = tui::run(workbook, file).map_err(CliError::other)?;
    if workbook.is_dirty() {
        eprintln!("quit with unsaved changes");
    }
    if verbose > 0 {
        eprintln!("log written to {}", log_path.display());
    }
    Ok(())
}

// ============================================================================
// show
// ============================================================================

fn cmd_show(
    settings: &Settings,
    file: &Path,
    sheet: Option<&str>,
    at: &str,
    rows: Option<u32>,
    cols: Option<u32>,
) -> Result<(), CliError> {
    let top_left = parse_cell(at)?;
    let mut workbook = load_workbook(settings, file, false)?;
    let index = resolve_sheet(&workbook, sheet)?;
    let sheet = workbook
        .sheet_mut(index)
        .ok_or_else(|| CliError::args(format!("no sheet at index {}", index)))?;

    let viewport = sheet.viewport_mut();
    viewport.resize(
        rows.unwrap_or(settings.viewport_rows),
        cols.unwrap_or(settings.viewport_cols),
    );
    viewport.scroll_to(top_left.row, top_left.col);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", sheet.name).map_err(|e| CliError::io(e.to_string()))?;
    render::write_plain(sheet, &mut handle).map_err(|e| CliError::io(e.to_string()))
}

// ============================================================================
// set
// ============================================================================

fn cmd_set(
    settings: &Settings,
    file: &Path,
    sheet: Option<&str>,
    cell: &str,
    value: &str,
    create: bool,
) -> Result<(), CliError> {
    let at = parse_cell(cell)?;
    let mut workbook = load_workbook(settings, file, create)?;
    let index = resolve_sheet(&workbook, sheet)?;

    workbook.commit_edit_on(index, at, value).map_err(CliError::commit)?;
    termgrid_io::save_workbook(&workbook, file).map_err(CliError::native)?;
    workbook.mark_clean();

    let sheet = workbook
        .sheet(index)
        .ok_or_else(|| CliError::args(format!("no sheet at index {}", index)))?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}!{} = {}", sheet.name, at, sheet.display(at)).map_err(|e| CliError::io(e.to_string()))?;
    for dependent in sheet.transitive_dependents(at) {
        writeln!(handle, "  {} = {}", dependent, sheet.display(dependent))
            .map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// functions / config
// ============================================================================

fn cmd_functions() -> Result<(), CliError> {
    let functions = termgrid_engine::formula::functions::FunctionRegistry::standard();
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for name in functions.names() {
        writeln!(handle, "{}", name).map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}

fn cmd_config(settings: &Settings, path: Option<&Path>) -> Result<(), CliError> {
    let location = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(Settings::config_path_display);
    let json = serde_json::to_string_pretty(settings).map_err(|e| CliError::other(e.to_string()))?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "// {}", location).map_err(|e| CliError::io(e.to_string()))?;
    writeln!(handle, "{}", json).map_err(|e| CliError::io(e.to_string()))
}
