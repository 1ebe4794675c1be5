//! Buildlogs: searchable, filterable build log entries in the terminal.

mod buildlogs_core;
mod buildlogs_tui;
mod cli;
mod status;

pub use buildlogs_core::filters::{distinct_projects, Filters, ProjectFilter, StatusFilter};
pub use buildlogs_core::source::{parse_entries, BuiltinSource, EntrySource, JsonFileSource, SourceError};
pub use buildlogs_core::types::{format_date, LogEntry, INVALID_DATE};
pub use buildlogs_tui::{
    fuzzy_rank_items, wrap_preview, Action, Clipboard, DetailView, PaletteError, PickerItem,
    PickerItemId, SystemClipboard, Tui, TuiConfig, TuiError, TuiPalette,
};
pub use cli::{run, DynError};
pub use status::{status_tone, Status, StatusTone, UnknownStatus, ALL_STATUSES};
