use std::{
    collections::BTreeMap,
    env,
    io::{self, IsTerminal, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::buildlogs_core::filters::{Filters, ProjectFilter, StatusFilter};
use crate::buildlogs_core::source::{BuiltinSource, EntrySource, JsonFileSource};
use crate::buildlogs_core::types::LogEntry;
use crate::buildlogs_tui::{Action, PaletteError, Tui, TuiConfig, TuiPalette, DEFAULT_MAX_QUERY_LEN};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, layout::Rect, Terminal};
use serde::Deserialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "buildlogs.json";
const DEFAULT_TUI_ENABLED: bool = true;
const DEFAULT_LOG_FILTER: &str = "warn";
const TUI_TICK_MS: u64 = 50;

pub type DynError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "buildlogs", version, about = "Browse and search build log entries")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON file with an array of entries, replacing the built-in list.
    #[arg(long)]
    data: Option<PathBuf>,
    #[arg(long)]
    query: Option<String>,
    /// Project name, or `all`.
    #[arg(long)]
    project: Option<ProjectFilter>,
    /// completed, in-progress, planned, or `all`.
    #[arg(long)]
    status: Option<StatusFilter>,
    #[arg(long, action = clap::ArgAction::SetTrue)]
    tui: bool,
    #[arg(long, action = clap::ArgAction::SetTrue)]
    no_tui: bool,
    /// Print matching entries as JSON instead of text cards.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    json: bool,
}

#[derive(Debug, Clone)]
struct Config {
    data: Option<PathBuf>,
    tui_enabled: bool,
    max_query_len: usize,
    palette: Option<TuiPalette>,
}

#[derive(Debug, Default, Clone)]
struct PartialConfig {
    data: Option<PathBuf>,
    tui_enabled: Option<bool>,
    max_query_len: Option<usize>,
    palette: Option<TuiPalette>,
}

impl PartialConfig {
    fn merge(&mut self, other: PartialConfig) {
        if other.data.is_some() {
            self.data = other.data;
        }
        if other.tui_enabled.is_some() {
            self.tui_enabled = other.tui_enabled;
        }
        if other.max_query_len.is_some() {
            self.max_query_len = other.max_query_len;
        }
        if other.palette.is_some() {
            self.palette = other.palette;
        }
    }
}

impl Config {
    fn from_partial(partial: PartialConfig) -> Self {
        Self {
            data: partial.data,
            tui_enabled: partial.tui_enabled.unwrap_or(DEFAULT_TUI_ENABLED),
            max_query_len: partial.max_query_len.unwrap_or(DEFAULT_MAX_QUERY_LEN),
            palette: partial.palette,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    data: Option<PathBuf>,
    tui: Option<bool>,
    #[serde(alias = "noTui", alias = "no-tui")]
    no_tui: Option<bool>,
    #[serde(alias = "maxQueryLen")]
    max_query_len: Option<usize>,
    palette: Option<String>,
}

impl FileConfig {
    /// Relative `data` paths resolve against the directory holding the config file.
    fn into_partial(self, path: &Path) -> Result<PartialConfig, ConfigError> {
        let tui_enabled = match (self.tui, self.no_tui) {
            (_, Some(no_tui)) => Some(!no_tui),
            (Some(tui), None) => Some(tui),
            (None, None) => None,
        };
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let data = self.data.map(|data| if data.is_relative() { base_dir.join(data) } else { data });
        let palette = match self.palette.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Some(value.parse::<TuiPalette>().map_err(|source| {
                ConfigError::InvalidPalette { origin: path.display().to_string(), source }
            })?),
            _ => None,
        };

        Ok(PartialConfig { data, tui_enabled, max_query_len: self.max_query_len, palette })
    }
}

#[derive(Debug, thiserror::Error)]
enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    ParseFile { path: PathBuf, source: serde_json::Error },
    #[error("config file not found: {path}")]
    MissingConfig { path: PathBuf },
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },
    #[error("invalid palette in {origin}: {source}")]
    InvalidPalette { origin: String, source: PaletteError },
}

fn cli_overrides(cli: &Cli) -> PartialConfig {
    let tui_enabled = if cli.no_tui {
        Some(false)
    } else if cli.tui {
        Some(true)
    } else {
        None
    };
    PartialConfig { data: cli.data.clone(), tui_enabled, ..PartialConfig::default() }
}

fn env_overrides(env: &BTreeMap<String, String>) -> Result<PartialConfig, ConfigError> {
    let mut partial = PartialConfig::default();
    if let Some(data) = env.get("BUILDLOGS_DATA") {
        if !data.trim().is_empty() {
            partial.data = Some(PathBuf::from(data));
        }
    }
    if let Some(value) = env.get("BUILDLOGS_MAX_QUERY_LEN") {
        partial.max_query_len = Some(parse_usize("BUILDLOGS_MAX_QUERY_LEN", value)?);
    }
    if let Some(no_tui) = env.get("BUILDLOGS_NO_TUI") {
        let disabled = parse_bool("BUILDLOGS_NO_TUI", no_tui)?;
        partial.tui_enabled = Some(!disabled);
    }
    if partial.tui_enabled.is_none() {
        if let Some(tui) = env.get("BUILDLOGS_TUI") {
            partial.tui_enabled = Some(parse_bool("BUILDLOGS_TUI", tui)?);
        }
    }
    partial.palette = tui_palette_override(env)?;
    Ok(partial)
}

fn tui_palette_override(env: &BTreeMap<String, String>) -> Result<Option<TuiPalette>, ConfigError> {
    let (name, value) = match env.get("BUILDLOGS_TUI_PALETTE") {
        Some(value) => ("BUILDLOGS_TUI_PALETTE", value),
        None => match env.get("BUILDLOGS_PALETTE") {
            Some(value) => ("BUILDLOGS_PALETTE", value),
            None => return Ok(None),
        },
    };

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let parsed = trimmed.parse::<TuiPalette>().map_err(|error| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: format!("{trimmed} ({error})"),
    })?;
    Ok(Some(parsed))
}

fn parse_usize(name: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidEnv { name: name.to_string(), value: value.to_string() })
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { name: name.to_string(), value: value.to_string() }),
    }
}

fn load_config_file(path: &Path) -> Result<PartialConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let parsed: FileConfig = serde_json::from_str(&contents)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })?;
    parsed.into_partial(path)
}

fn find_config_path(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            break;
        }
    }
    None
}

fn resolve_config(
    cli: &Cli,
    cwd: &Path,
    env: &BTreeMap<String, String>,
) -> Result<(Config, Option<PathBuf>), ConfigError> {
    let mut partial = PartialConfig::default();

    let config_path = if let Some(path) = &cli.config {
        if !path.is_file() {
            return Err(ConfigError::MissingConfig { path: path.clone() });
        }
        Some(path.clone())
    } else {
        find_config_path(cwd)
    };

    if let Some(path) = config_path.as_ref() {
        partial.merge(load_config_file(path)?);
    }
    partial.merge(env_overrides(env)?);
    partial.merge(cli_overrides(cli));

    let mut config = Config::from_partial(partial);
    if let Some(data) = config.data.take() {
        config.data = Some(if data.is_relative() { cwd.join(data) } else { data });
    }
    Ok((config, config_path))
}

fn initial_filters(cli: &Cli) -> Filters {
    Filters {
        query: cli.query.clone().unwrap_or_default(),
        project: cli.project.clone().unwrap_or_default(),
        status: cli.status.unwrap_or_default(),
    }
}

fn entry_source(config: &Config) -> Box<dyn EntrySource> {
    match &config.data {
        Some(path) => Box::new(JsonFileSource::new(path)),
        None => Box::new(BuiltinSource),
    }
}

fn format_card(entry: &LogEntry) -> String {
    let mut out = entry.display_date();
    if let Some(status) = entry.status {
        out.push_str(&format!(" [{status}]"));
    }
    if let Some(project) = &entry.project {
        out.push_str(&format!(" [{project}]"));
    }
    out.push('\n');
    out.push_str(&entry.title);
    out.push('\n');
    out.push_str(&entry.content);
    if !entry.tags.is_empty() {
        out.push_str("\nTags: ");
        out.push_str(&entry.tags.join(", "));
    }
    out
}

/// Print the filtered entries as text cards separated by blank lines, or as JSON.
fn write_list<W: Write>(
    out: &mut W,
    entries: &[LogEntry],
    filters: &Filters,
    json: bool,
) -> Result<usize, DynError> {
    let matched = filters.apply(entries);
    if json {
        serde_json::to_writer_pretty(&mut *out, &matched)?;
        writeln!(out)?;
        return Ok(matched.len());
    }
    for (idx, entry) in matched.iter().enumerate() {
        if idx > 0 {
            writeln!(out)?;
        }
        writeln!(out, "{}", format_card(entry))?;
    }
    Ok(matched.len())
}

async fn run_tui(config: TuiConfig, entries: Vec<LogEntry>, filters: Filters) -> Result<(), DynError> {
    let running = Arc::new(AtomicBool::new(true));
    let running_loop = running.clone();
    let mut tui_handle =
        tokio::task::spawn_blocking(move || run_tui_loop(config, entries, filters, running_loop));

    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        res = &mut tui_handle => {
            res??;
            false
        }
    };

    if interrupted {
        info!("interrupted, shutting down");
        running.store(false, Ordering::SeqCst);
        tui_handle.await??;
    }
    Ok(())
}

fn run_tui_loop(
    config: TuiConfig,
    entries: Vec<LogEntry>,
    filters: Filters,
    running: Arc<AtomicBool>,
) -> Result<(), DynError> {
    let _guard = TerminalGuard::enter()?;
    let stdout = io::stdout();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    terminal.hide_cursor()?;

    let mut tui = Tui::new(config, entries);
    if !filters.is_default() {
        tui.set_filters(filters);
    }

    while running.load(Ordering::SeqCst) {
        terminal.draw(|frame| {
            tui.render(frame);
        })?;

        if event::poll(Duration::from_millis(TUI_TICK_MS))? {
            let action = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => tui.handle_key(key),
                Event::Mouse(mouse) => {
                    let size = terminal.size()?;
                    let rect = Rect { x: 0, y: 0, width: size.width, height: size.height };
                    tui.handle_mouse(mouse, rect)
                }
                _ => Action::None,
            };
            // stderr would tear the alternate screen, so failures stay at debug level
            if let Some(error) = tui.state.last_error.take() {
                debug!(error = %error, "tui action failed");
            }
            if action == Action::Quit {
                running.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    terminal.show_cursor()?;
    Ok(())
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self, DynError> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).try_init();
}

pub async fn run() -> Result<(), DynError> {
    init_tracing();

    let cli = Cli::parse();
    let cwd = env::current_dir()?;
    let env_map: BTreeMap<String, String> = env::vars().collect();
    let (config, config_path) = resolve_config(&cli, &cwd, &env_map)?;

    if let Some(path) = &config_path {
        info!(path = %path.display(), "loaded config file");
    } else {
        debug!("no buildlogs.json found, using defaults and env/cli overrides");
    }

    info!(
        data = ?config.data,
        tui_enabled = config.tui_enabled,
        max_query_len = config.max_query_len,
        palette = config.palette.is_some(),
        "resolved config"
    );

    let source = entry_source(&config);
    let entries = source.load()?;
    info!(source = %source.describe(), entries = entries.len(), "loaded entries");

    let filters = initial_filters(&cli);
    let interactive = !cli.json && config.tui_enabled && (cli.tui || io::stdout().is_terminal());
    if !interactive {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let matched = write_list(&mut out, &entries, &filters, cli.json)?;
        out.flush()?;
        debug!(matched, "printed entries");
        return Ok(());
    }

    let tui_config = TuiConfig { palette: config.palette, max_query_len: config.max_query_len };
    run_tui(tui_config, entries, filters).await
}
