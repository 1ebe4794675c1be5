//! Ratatui interface for browsing build logs.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use rapidfuzz::fuzz;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Clear, List, ListItem, ListState, Paragraph, Scrollbar, ScrollbarOrientation,
    ScrollbarState, Wrap,
};
use ratatui::Frame;
use thiserror::Error;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::buildlogs_core::filters::{
    contains_ascii_case_insensitive, distinct_projects, Filters, ProjectFilter, StatusFilter,
};
use crate::buildlogs_core::types::LogEntry;
use crate::status::{status_tone, Status, StatusTone, ALL_STATUSES};

pub const DEFAULT_MAX_QUERY_LEN: usize = 256;

const CARD_CONTENT_LINES: usize = 3;
/// Header, title, clamped content, tags and a spacer row.
const CARD_HEIGHT: usize = 2 + CARD_CONTENT_LINES + 2;
const TOP_BAR_HEIGHT: u16 = 3;
const FOOTER_HEIGHT: u16 = 2;
const PROJECT_BOX_WIDTH: u16 = 26;
const STATUS_BOX_WIDTH: u16 = 20;
const DETAIL_POPUP: (u16, u16) = (80, 80);
const PICKER_POPUP: (u16, u16) = (50, 50);
const HELP_POPUP: (u16, u16) = (60, 70);

/// Key handling modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Search,
    Picker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerKind {
    Projects,
    Statuses,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerItemId {
    AllProjects,
    Project(String),
    AllStatuses,
    Status(Status),
}

#[derive(Debug, Clone)]
pub struct PickerItem {
    pub label: String,
    pub id: PickerItemId,
    pub active: bool,
}

/// Dropdown overlay with its own narrowing query.
#[derive(Debug, Clone)]
pub struct PickerState {
    pub kind: PickerKind,
    pub query: InputState,
    pub items: Vec<PickerItem>,
    pub filtered: Vec<usize>,
    pub selected: usize,
    pub offset: usize,
}

impl PickerState {
    pub fn new(kind: PickerKind, items: Vec<PickerItem>) -> Self {
        let mut picker = Self {
            kind,
            query: InputState::default(),
            items,
            filtered: Vec::new(),
            selected: 0,
            offset: 0,
        };
        picker.recompute();
        if let Some(pos) = picker
            .filtered
            .iter()
            .position(|idx| picker.items.get(*idx).is_some_and(|item| item.active))
        {
            picker.selected = pos;
        }
        picker
    }

    fn recompute(&mut self) {
        let query = self.query.buffer.trim();
        if query.is_empty() {
            self.filtered = (0..self.items.len()).collect();
        } else {
            self.filtered = fuzzy_rank_items(&self.items, query);
        }
        self.offset = 0;
        if self.filtered.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.filtered.len() {
            self.selected = self.filtered.len() - 1;
        }
    }

    fn move_selection(&mut self, delta: i32) {
        let len = self.filtered.len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let next = (self.selected as i64 + i64::from(delta)).clamp(0, len as i64 - 1);
        self.selected = next as usize;
    }

    fn selected_item(&self) -> Option<&PickerItem> {
        let idx = *self.filtered.get(self.selected)?;
        self.items.get(idx)
    }
}

/// Input buffer with a byte cursor that always sits on a char boundary.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    pub buffer: String,
    pub cursor: usize,
}

impl InputState {
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    pub fn set(&mut self, value: &str) {
        self.buffer = value.to_string();
        self.cursor = self.buffer.len();
    }

    pub fn insert_str(&mut self, value: &str) {
        if self.cursor >= self.buffer.len() {
            self.buffer.push_str(value);
            self.cursor = self.buffer.len();
            return;
        }
        self.buffer.insert_str(self.cursor, value);
        self.cursor += value.len();
    }

    pub fn backspace(&mut self) {
        let Some((idx, _)) = self.buffer[..self.cursor].char_indices().next_back() else {
            return;
        };
        self.buffer.remove(idx);
        self.cursor = idx;
    }

    fn char_len(&self) -> usize {
        self.buffer.chars().count()
    }
}

/// Whether the detail modal is showing, and for which entry.
///
/// The entry is held by its index into the immutable entry list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DetailView {
    #[default]
    Closed,
    Open(usize),
}

impl DetailView {
    pub fn select(&mut self, index: usize) {
        *self = Self::Open(index);
    }

    pub fn dismiss(&mut self) {
        *self = Self::Closed;
    }

    pub fn is_open(self) -> bool {
        matches!(self, Self::Open(_))
    }

    pub fn index(self) -> Option<usize> {
        match self {
            Self::Open(index) => Some(index),
            Self::Closed => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaletteError {
    #[error(
        "expected {expected} comma-separated colors (fg,bg,black,red,green,yellow,blue,magenta,cyan,white,bright_black,bright_red,bright_green,bright_yellow,bright_blue,bright_magenta,bright_cyan,bright_white), got {got}"
    )]
    WrongCount { expected: usize, got: usize },
    #[error("invalid color {0:?} (expected #RRGGBB or rgb:RR/GG/BB)")]
    InvalidColor(String),
}

/// Terminal palette override: foreground, background and the 16 ANSI colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuiPalette {
    pub fg: Color,
    pub bg: Color,
    pub ansi: [Color; 16],
}

impl TuiPalette {
    pub const CSV_LEN: usize = 18;

    pub fn ansi_color(&self, idx: usize) -> Color {
        self.ansi[idx]
    }
}

impl FromStr for TuiPalette {
    type Err = PaletteError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        if parts.len() != Self::CSV_LEN {
            return Err(PaletteError::WrongCount { expected: Self::CSV_LEN, got: parts.len() });
        }
        let mut colors = parts.iter().map(|part| parse_palette_color(part));
        let fg = colors.next().unwrap_or(Ok(Color::Reset))?;
        let bg = colors.next().unwrap_or(Ok(Color::Reset))?;
        let mut ansi = [Color::Reset; 16];
        for (slot, color) in ansi.iter_mut().zip(colors) {
            *slot = color?;
        }
        Ok(Self { fg, bg, ansi })
    }
}

fn parse_palette_color(value: &str) -> Result<Color, PaletteError> {
    let invalid = || PaletteError::InvalidColor(value.to_string());
    let lower = value.trim().to_ascii_lowercase();
    if lower.is_empty() {
        return Err(invalid());
    }

    if let Some(rest) = lower.strip_prefix("rgb:") {
        let channels = rest
            .split('/')
            .map(|channel| match channel.len() {
                2 => u8::from_str_radix(channel, 16).ok(),
                4 => u16::from_str_radix(channel, 16).ok().map(|wide| (wide >> 8) as u8),
                _ => None,
            })
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(invalid)?;
        let [r, g, b] = channels[..] else {
            return Err(invalid());
        };
        return Ok(Color::Rgb(r, g, b));
    }

    let hex = lower.strip_prefix('#').or_else(|| lower.strip_prefix("0x")).unwrap_or(&lower);
    if hex.len() != 6 || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let rgb = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
    Ok(Color::Rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8))
}

/// Slots of the 16-color ANSI table that the interface draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ansi16 {
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,
    BrightBlack = 8,
    BrightBlue = 12,
    BrightWhite = 15,
}

impl From<Ansi16> for Color {
    fn from(value: Ansi16) -> Self {
        match value {
            Ansi16::Green => Color::Green,
            Ansi16::Yellow => Color::Yellow,
            Ansi16::Blue => Color::Blue,
            Ansi16::Magenta => Color::Magenta,
            Ansi16::Cyan => Color::Cyan,
            Ansi16::White => Color::Gray,
            Ansi16::BrightBlack => Color::DarkGray,
            Ansi16::BrightBlue => Color::LightBlue,
            Ansi16::BrightWhite => Color::White,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TuiConfig {
    pub palette: Option<TuiPalette>,
    pub max_query_len: usize,
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self { palette: None, max_query_len: DEFAULT_MAX_QUERY_LEN }
    }
}

/// TUI state used for rendering and event handling.
#[derive(Debug, Clone)]
pub struct TuiState {
    pub mode: Mode,
    pub entries: Vec<LogEntry>,
    pub projects: Vec<String>,
    pub filters: Filters,
    pub search: InputState,
    pub filtered: Vec<usize>,
    pub selected: usize,
    pub card_offset: usize,
    pub detail: DetailView,
    pub detail_scroll: u16,
    pub detail_viewport_height: u16,
    pub detail_content_height: u16,
    pub picker: Option<PickerState>,
    pub show_help: bool,
    pub notice: Option<String>,
    pub last_error: Option<String>,
    pub last_yank: Option<String>,
}

impl TuiState {
    fn new(entries: Vec<LogEntry>) -> Self {
        let projects = distinct_projects(&entries);
        let filtered = (0..entries.len()).collect();
        Self {
            mode: Mode::Normal,
            entries,
            projects,
            filters: Filters::default(),
            search: InputState::default(),
            filtered,
            selected: 0,
            card_offset: 0,
            detail: DetailView::Closed,
            detail_scroll: 0,
            detail_viewport_height: 0,
            detail_content_height: 0,
            picker: None,
            show_help: false,
            notice: None,
            last_error: None,
            last_yank: None,
        }
    }
}

/// Clipboard abstraction for yank/paste support.
pub trait Clipboard: Send {
    fn get(&mut self) -> Result<String, TuiError>;
    fn set(&mut self, contents: &str) -> Result<(), TuiError>;
}

/// System clipboard using arboard, opened on first use.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self { inner: None }
    }

    fn ensure(&mut self) -> Result<&mut arboard::Clipboard, TuiError> {
        if self.inner.is_none() {
            self.inner = Some(arboard::Clipboard::new()?);
        }
        self.inner.as_mut().ok_or(TuiError::ClipboardUnavailable)
    }
}

impl Clipboard for SystemClipboard {
    fn get(&mut self) -> Result<String, TuiError> {
        Ok(self.ensure()?.get_text()?)
    }

    fn set(&mut self, contents: &str) -> Result<(), TuiError> {
        Ok(self.ensure()?.set_text(contents.to_string())?)
    }
}

/// Outcome of an input event that the runtime has to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
}

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("clipboard error: {0}")]
    Clipboard(#[from] arboard::Error),
    #[error("clipboard unavailable")]
    ClipboardUnavailable,
    #[error("no entry to copy")]
    NoSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum YankKind {
    Title,
    Detail,
}

enum PickerAction {
    None,
    Close,
    Select(PickerItemId),
    Paste,
}

/// Rectangles of the main screen, shared by rendering and mouse hit-testing.
struct ScreenLayout {
    search: Rect,
    project: Rect,
    status: Rect,
    cards: Rect,
    footer: Rect,
}

fn screen_layout(area: Rect) -> ScreenLayout {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(TOP_BAR_HEIGHT),
            Constraint::Min(0),
            Constraint::Length(FOOTER_HEIGHT),
        ])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(PROJECT_BOX_WIDTH),
            Constraint::Length(STATUS_BOX_WIDTH),
        ])
        .split(rows[0]);
    ScreenLayout { search: top[0], project: top[1], status: top[2], cards: rows[1], footer: rows[2] }
}

/// Inner list area of the cards panel (inside the border, left of the scrollbar).
fn cards_list_area(cards: Rect) -> Rect {
    let inner = Block::default().borders(Borders::ALL).inner(cards);
    split_for_scrollbar(inner).0
}

/// Modal rectangle, scrollable body and the close-button row.
fn detail_areas(size: Rect) -> (Rect, Rect, Rect) {
    let area = centered_rect(DETAIL_POPUP.0, DETAIL_POPUP.1, size);
    let inner = Block::default().borders(Borders::ALL).inner(area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(inner);
    (area, chunks[0], chunks[1])
}

/// Modal rectangle and list area of the picker overlay.
fn picker_areas(size: Rect) -> (Rect, Rect) {
    let area = centered_rect(PICKER_POPUP.0, PICKER_POPUP.1, size);
    let inner = Block::default().borders(Borders::ALL).inner(area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0), Constraint::Length(1)])
        .split(inner);
    (area, chunks[1])
}

fn contains(rect: Rect, event: &MouseEvent) -> bool {
    event.column >= rect.x
        && event.column < rect.x.saturating_add(rect.width)
        && event.row >= rect.y
        && event.row < rect.y.saturating_add(rect.height)
}

/// Main TUI container.
pub struct Tui {
    pub config: TuiConfig,
    pub state: TuiState,
    clipboard: Box<dyn Clipboard>,
}

impl Tui {
    pub fn new(config: TuiConfig, entries: Vec<LogEntry>) -> Self {
        Self::with_clipboard(config, entries, Box::new(SystemClipboard::new()))
    }

    pub fn with_clipboard(
        config: TuiConfig,
        entries: Vec<LogEntry>,
        clipboard: Box<dyn Clipboard>,
    ) -> Self {
        Self { config, state: TuiState::new(entries), clipboard }
    }

    /// Replace all filter criteria at once, e.g. from command-line flags.
    pub fn set_filters(&mut self, mut filters: Filters) {
        if let Some((idx, _)) = filters.query.char_indices().nth(self.config.max_query_len) {
            filters.query.truncate(idx);
        }
        self.state.search.set(&filters.query);
        self.state.filters = filters;
        self.recompute_filter();
    }

    /// Entry under the card highlight.
    pub fn selected_entry(&self) -> Option<&LogEntry> {
        let idx = *self.state.filtered.get(self.state.selected)?;
        self.state.entries.get(idx)
    }

    /// Entry shown in the detail modal, resolved against the current list.
    pub fn detail_entry(&self) -> Option<&LogEntry> {
        self.state.detail.index().and_then(|idx| self.state.entries.get(idx))
    }

    pub fn open_detail(&mut self, entry_index: usize) {
        if entry_index >= self.state.entries.len() {
            return;
        }
        self.state.detail.select(entry_index);
        self.state.detail_scroll = 0;
        self.state.notice = None;
    }

    pub fn open_selected(&mut self) {
        if let Some(idx) = self.state.filtered.get(self.state.selected).copied() {
            self.open_detail(idx);
        }
    }

    pub fn dismiss_detail(&mut self) {
        self.state.detail.dismiss();
        self.state.detail_scroll = 0;
    }

    fn modal_open(&self) -> bool {
        self.state.detail.is_open() || self.state.picker.is_some() || self.state.show_help
    }

    fn quit(&mut self) -> Action {
        Action::Quit
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            return self.quit();
        }

        if self.state.show_help && self.state.picker.is_none() {
            match key.code {
                KeyCode::Char('q') => return self.quit(),
                _ => {
                    self.state.show_help = false;
                    return Action::None;
                }
            }
        }

        if self.state.detail.is_open() {
            return self.handle_detail(key);
        }

        match self.state.mode {
            Mode::Normal => self.handle_normal(key),
            Mode::Search => self.handle_search(key),
            Mode::Picker => self.handle_picker(key),
        }
    }

    fn handle_normal(&mut self, key: KeyEvent) -> Action {
        match key {
            KeyEvent { code: KeyCode::Char('q'), modifiers: KeyModifiers::NONE, .. } => self.quit(),
            KeyEvent { code: KeyCode::Char('j') | KeyCode::Down, modifiers: KeyModifiers::NONE, .. } => {
                self.move_selection(1);
                Action::None
            }
            KeyEvent { code: KeyCode::Char('k') | KeyCode::Up, modifiers: KeyModifiers::NONE, .. } => {
                self.move_selection(-1);
                Action::None
            }
            KeyEvent { code: KeyCode::Char('g') | KeyCode::Home, modifiers: KeyModifiers::NONE, .. } => {
                self.move_selection(i32::MIN);
                Action::None
            }
            KeyEvent { code: KeyCode::Char('G'), .. }
            | KeyEvent { code: KeyCode::End, modifiers: KeyModifiers::NONE, .. } => {
                self.move_selection(i32::MAX);
                Action::None
            }
            KeyEvent { code: KeyCode::Enter | KeyCode::Char('o'), .. } => {
                self.open_selected();
                Action::None
            }
            KeyEvent { code: KeyCode::Char('/'), .. } => {
                self.enter_search();
                Action::None
            }
            KeyEvent { code: KeyCode::Char('p'), modifiers: KeyModifiers::NONE, .. } => {
                self.open_project_picker();
                Action::None
            }
            KeyEvent { code: KeyCode::Char('s'), modifiers: KeyModifiers::NONE, .. } => {
                self.open_status_picker();
                Action::None
            }
            KeyEvent { code: KeyCode::Char('u'), modifiers: KeyModifiers::NONE, .. } => {
                self.clear_filters();
                Action::None
            }
            KeyEvent { code: KeyCode::Char('y'), modifiers: KeyModifiers::NONE, .. } => {
                self.yank_and_report(YankKind::Title);
                Action::None
            }
            KeyEvent { code: KeyCode::Char('Y'), .. } => {
                self.yank_and_report(YankKind::Detail);
                Action::None
            }
            KeyEvent { code: KeyCode::Char('?'), .. } => {
                self.state.show_help = true;
                Action::None
            }
            KeyEvent { code: KeyCode::Esc, .. } => {
                self.state.notice = None;
                Action::None
            }
            _ => Action::None,
        }
    }

    fn handle_detail(&mut self, key: KeyEvent) -> Action {
        match key {
            KeyEvent { code: KeyCode::Esc | KeyCode::Enter | KeyCode::Backspace, .. }
            | KeyEvent { code: KeyCode::Char('q'), modifiers: KeyModifiers::NONE, .. } => {
                self.dismiss_detail();
            }
            KeyEvent { code: KeyCode::Char('j') | KeyCode::Down, modifiers: KeyModifiers::NONE, .. } => {
                self.scroll_detail_by(1);
            }
            KeyEvent { code: KeyCode::Char('k') | KeyCode::Up, modifiers: KeyModifiers::NONE, .. } => {
                self.scroll_detail_by(-1);
            }
            KeyEvent { code: KeyCode::PageDown | KeyCode::Char(' '), .. } => {
                self.scroll_detail_page(1);
            }
            KeyEvent { code: KeyCode::PageUp, .. } => {
                self.scroll_detail_page(-1);
            }
            KeyEvent { code: KeyCode::Char('n'), modifiers: KeyModifiers::NONE, .. } => {
                self.step_detail(1);
            }
            KeyEvent { code: KeyCode::Char('N'), .. } => {
                self.step_detail(-1);
            }
            KeyEvent { code: KeyCode::Char('y'), modifiers: KeyModifiers::NONE, .. } => {
                self.yank_and_report(YankKind::Title);
            }
            KeyEvent { code: KeyCode::Char('Y'), .. } => {
                self.yank_and_report(YankKind::Detail);
            }
            _ => {}
        }
        Action::None
    }

    fn handle_search(&mut self, key: KeyEvent) -> Action {
        match key {
            KeyEvent { code: KeyCode::Esc | KeyCode::Enter, .. } => {
                self.state.mode = Mode::Normal;
            }
            KeyEvent { code: KeyCode::Backspace, .. } => {
                self.state.search.backspace();
                self.recompute_filter();
            }
            KeyEvent { code: KeyCode::Char('u'), modifiers, .. }
                if modifiers.contains(KeyModifiers::CONTROL) =>
            {
                self.state.search.clear();
                self.recompute_filter();
            }
            KeyEvent { code: KeyCode::Char('y'), modifiers, .. }
                if modifiers.contains(KeyModifiers::CONTROL) =>
            {
                if let Err(error) = self.paste_into_search() {
                    self.report_error(error);
                }
            }
            KeyEvent { code: KeyCode::Char(c), modifiers, .. }
                if modifiers.difference(KeyModifiers::SHIFT).is_empty() =>
            {
                if self.state.search.char_len() < self.config.max_query_len {
                    self.state.search.insert_str(c.encode_utf8(&mut [0u8; 4]));
                    self.recompute_filter();
                }
            }
            _ => {}
        }
        Action::None
    }

    fn handle_picker(&mut self, key: KeyEvent) -> Action {
        let max_query_len = self.config.max_query_len;
        let action = {
            let Some(picker) = self.state.picker.as_mut() else {
                self.state.mode = Mode::Normal;
                return Action::None;
            };

            match key {
                KeyEvent { code: KeyCode::Esc, .. } => PickerAction::Close,
                KeyEvent { code: KeyCode::Enter, .. }
                | KeyEvent { code: KeyCode::Char(' '), modifiers: KeyModifiers::NONE, .. } => picker
                    .selected_item()
                    .map(|item| PickerAction::Select(item.id.clone()))
                    .unwrap_or(PickerAction::None),
                KeyEvent { code: KeyCode::Down, .. } => {
                    picker.move_selection(1);
                    PickerAction::None
                }
                KeyEvent { code: KeyCode::Up, .. } => {
                    picker.move_selection(-1);
                    PickerAction::None
                }
                KeyEvent { code: KeyCode::Char('j' | 'n'), modifiers, .. }
                    if modifiers.contains(KeyModifiers::CONTROL) =>
                {
                    picker.move_selection(1);
                    PickerAction::None
                }
                KeyEvent { code: KeyCode::Char('k' | 'p'), modifiers, .. }
                    if modifiers.contains(KeyModifiers::CONTROL) =>
                {
                    picker.move_selection(-1);
                    PickerAction::None
                }
                KeyEvent { code: KeyCode::Char('y'), modifiers, .. }
                    if modifiers.contains(KeyModifiers::CONTROL) =>
                {
                    PickerAction::Paste
                }
                KeyEvent { code: KeyCode::Backspace, .. } => {
                    picker.query.backspace();
                    picker.recompute();
                    PickerAction::None
                }
                KeyEvent { code: KeyCode::Char(c), modifiers, .. }
                    if modifiers.difference(KeyModifiers::SHIFT).is_empty() =>
                {
                    if picker.query.char_len() < max_query_len {
                        picker.query.insert_str(c.encode_utf8(&mut [0u8; 4]));
                        picker.recompute();
                    }
                    PickerAction::None
                }
                _ => PickerAction::None,
            }
        };

        match action {
            PickerAction::None => {}
            PickerAction::Close => self.close_picker(),
            PickerAction::Select(item) => {
                self.apply_picker_selection(item);
                self.close_picker();
            }
            PickerAction::Paste => {
                if let Err(error) = self.paste_into_picker() {
                    self.report_error(error);
                }
            }
        }
        Action::None
    }

    pub fn handle_mouse(&mut self, event: MouseEvent, size: Rect) -> Action {
        if self.state.show_help {
            if matches!(event.kind, MouseEventKind::Down(_)) {
                self.state.show_help = false;
            }
            return Action::None;
        }

        if self.state.detail.is_open() {
            let (area, body, close_row) = detail_areas(size);
            match event.kind {
                MouseEventKind::Down(MouseButton::Left) => {
                    if contains(close_row, &event) || !contains(area, &event) {
                        self.dismiss_detail();
                    }
                }
                MouseEventKind::ScrollUp if contains(body, &event) => self.scroll_detail_by(-1),
                MouseEventKind::ScrollDown if contains(body, &event) => self.scroll_detail_by(1),
                _ => {}
            }
            return Action::None;
        }

        if self.state.picker.is_some() {
            self.handle_picker_mouse(event, size);
            return Action::None;
        }

        let layout = screen_layout(size);
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if contains(layout.search, &event) {
                    self.enter_search();
                } else if contains(layout.project, &event) {
                    self.state.mode = Mode::Normal;
                    self.open_project_picker();
                } else if contains(layout.status, &event) {
                    self.state.mode = Mode::Normal;
                    self.open_status_picker();
                } else if contains(layout.cards, &event) {
                    self.state.mode = Mode::Normal;
                    let list_area = cards_list_area(layout.cards);
                    if contains(list_area, &event) {
                        let row = usize::from(event.row - list_area.y);
                        let pos = self.state.card_offset.saturating_add(row / CARD_HEIGHT);
                        if pos < self.state.filtered.len() {
                            self.state.selected = pos;
                            self.open_selected();
                        }
                    }
                }
            }
            MouseEventKind::ScrollUp if contains(layout.cards, &event) => self.move_selection(-1),
            MouseEventKind::ScrollDown if contains(layout.cards, &event) => self.move_selection(1),
            _ => {}
        }
        Action::None
    }

    fn handle_picker_mouse(&mut self, event: MouseEvent, size: Rect) {
        let (area, list_area) = picker_areas(size);
        let mut chosen = None;
        {
            let Some(picker) = self.state.picker.as_mut() else {
                return;
            };
            match event.kind {
                MouseEventKind::Down(MouseButton::Left) => {
                    if !contains(area, &event) {
                        chosen = Some(None);
                    } else if contains(list_area, &event) {
                        let pos = picker.offset + usize::from(event.row - list_area.y);
                        if pos < picker.filtered.len() {
                            picker.selected = pos;
                            chosen = picker.selected_item().map(|item| Some(item.id.clone()));
                        }
                    }
                }
                MouseEventKind::ScrollUp => picker.move_selection(-1),
                MouseEventKind::ScrollDown => picker.move_selection(1),
                _ => {}
            }
        }
        match chosen {
            Some(Some(item)) => {
                self.apply_picker_selection(item);
                self.close_picker();
            }
            Some(None) => self.close_picker(),
            None => {}
        }
    }

    pub fn enter_search(&mut self) {
        self.state.mode = Mode::Search;
        self.state.search.cursor = self.state.search.buffer.len();
        self.state.notice = None;
    }

    fn open_picker(&mut self, picker: PickerState) {
        self.state.picker = Some(picker);
        self.state.mode = Mode::Picker;
        self.state.show_help = false;
    }

    fn close_picker(&mut self) {
        self.state.picker = None;
        self.state.mode = Mode::Normal;
    }

    fn open_project_picker(&mut self) {
        let mut items = vec![PickerItem {
            label: ProjectFilter::All.to_string(),
            id: PickerItemId::AllProjects,
            active: self.state.filters.project == ProjectFilter::All,
        }];
        for project in &self.state.projects {
            let active =
                matches!(&self.state.filters.project, ProjectFilter::Only(current) if current == project);
            items.push(PickerItem {
                label: project.clone(),
                id: PickerItemId::Project(project.clone()),
                active,
            });
        }
        self.open_picker(PickerState::new(PickerKind::Projects, items));
    }

    fn open_status_picker(&mut self) {
        let mut items = vec![PickerItem {
            label: StatusFilter::All.to_string(),
            id: PickerItemId::AllStatuses,
            active: self.state.filters.status == StatusFilter::All,
        }];
        for status in ALL_STATUSES {
            items.push(PickerItem {
                label: status.label().to_string(),
                id: PickerItemId::Status(status),
                active: self.state.filters.status == StatusFilter::Only(status),
            });
        }
        self.open_picker(PickerState::new(PickerKind::Statuses, items));
    }

    fn apply_picker_selection(&mut self, item: PickerItemId) {
        match item {
            PickerItemId::AllProjects => self.state.filters.project = ProjectFilter::All,
            PickerItemId::Project(project) => {
                self.state.filters.project = ProjectFilter::Only(project)
            }
            PickerItemId::AllStatuses => self.state.filters.status = StatusFilter::All,
            PickerItemId::Status(status) => self.state.filters.status = StatusFilter::Only(status),
        }
        self.recompute_filter();
    }

    fn clear_filters(&mut self) {
        self.state.search.clear();
        self.state.filters = Filters::default();
        self.state.notice = None;
        self.recompute_filter();
    }

    fn recompute_filter(&mut self) {
        self.state.filters.query.clone_from(&self.state.search.buffer);
        self.state.filtered = self.state.filters.indices(&self.state.entries);
        self.state.card_offset = 0;
        if self.state.filtered.is_empty() {
            self.state.selected = 0;
        } else if self.state.selected >= self.state.filtered.len() {
            self.state.selected = self.state.filtered.len() - 1;
        }
    }

    fn move_selection(&mut self, delta: i32) {
        let len = self.state.filtered.len();
        if len == 0 {
            return;
        }
        let next = (self.state.selected as i64 + i64::from(delta)).clamp(0, len as i64 - 1);
        self.state.selected = next as usize;
        self.state.notice = None;
    }

    /// Open the next/previous filtered entry while the modal stays up.
    fn step_detail(&mut self, delta: i32) {
        let Some(current) = self.state.detail.index() else {
            return;
        };
        let Some(pos) = self.state.filtered.iter().position(|idx| *idx == current) else {
            return;
        };
        let next = (pos as i64 + i64::from(delta)).clamp(0, self.state.filtered.len() as i64 - 1);
        let next = next as usize;
        if next != pos {
            self.state.selected = next;
            self.open_detail(self.state.filtered[next]);
        }
    }

    fn max_detail_scroll(&self) -> u16 {
        self.state.detail_content_height.saturating_sub(self.state.detail_viewport_height)
    }

    fn scroll_detail_by(&mut self, delta: i32) {
        let next = (i32::from(self.state.detail_scroll) + delta).max(0);
        self.state.detail_scroll = u16::try_from(next).unwrap_or(u16::MAX).min(self.max_detail_scroll());
    }

    fn scroll_detail_page(&mut self, direction: i32) {
        let page = i32::from(self.state.detail_viewport_height.max(1));
        self.scroll_detail_by(page * direction);
    }

    fn yank_and_report(&mut self, kind: YankKind) {
        match self.yank(kind) {
            Ok(()) => {
                let what = match kind {
                    YankKind::Title => "title",
                    YankKind::Detail => "entry",
                };
                self.state.notice = Some(format!("copied {what} to clipboard"));
            }
            Err(error) => self.report_error(error),
        }
    }

    fn report_error(&mut self, error: TuiError) {
        let message = error.to_string();
        self.state.notice = Some(message.clone());
        self.state.last_error = Some(message);
    }

    fn yank(&mut self, kind: YankKind) -> Result<(), TuiError> {
        let entry = self.detail_entry().or_else(|| self.selected_entry()).ok_or(TuiError::NoSelection)?;
        let text = match kind {
            YankKind::Title => entry.title.clone(),
            YankKind::Detail => entry.detail_text(),
        };
        self.clipboard.set(&text)?;
        self.state.last_yank = Some(text);
        Ok(())
    }

    fn paste_into_search(&mut self) -> Result<(), TuiError> {
        let text = self.clipboard.get()?;
        let room = self.config.max_query_len.saturating_sub(self.state.search.char_len());
        let pasted: String = first_line(&text).chars().take(room).collect();
        self.state.search.insert_str(&pasted);
        self.recompute_filter();
        Ok(())
    }

    fn paste_into_picker(&mut self) -> Result<(), TuiError> {
        let text = self.clipboard.get()?;
        let max_query_len = self.config.max_query_len;
        if let Some(picker) = self.state.picker.as_mut() {
            let room = max_query_len.saturating_sub(picker.query.char_len());
            let pasted: String = first_line(&text).chars().take(room).collect();
            picker.query.insert_str(&pasted);
            picker.recompute();
        }
        Ok(())
    }

    pub fn render(&mut self, frame: &mut Frame<'_>) {
        let layout = screen_layout(frame.area());

        self.render_top_bar(frame, &layout);
        self.render_cards(frame, layout.cards);
        self.render_footer(frame, layout.footer);

        if self.state.detail.is_open() {
            self.render_detail(frame);
        }
        if self.state.picker.is_some() {
            self.render_picker(frame);
        } else if self.state.show_help {
            self.render_help(frame);
        }
    }

    fn base_style(&self) -> Style {
        if let Some(palette) = &self.config.palette {
            Style::default().fg(palette.fg).bg(palette.bg)
        } else {
            Style::default()
        }
    }

    fn ansi_color(&self, color: Ansi16) -> Color {
        if let Some(palette) = &self.config.palette {
            palette.ansi_color(color as usize)
        } else {
            color.into()
        }
    }

    fn fg(&self, color: Ansi16) -> Style {
        self.base_style().fg(self.ansi_color(color))
    }

    fn tone_style(&self, tone: StatusTone) -> Style {
        let color = match tone {
            StatusTone::Green => Ansi16::Green,
            StatusTone::Blue => Ansi16::Blue,
            StatusTone::Yellow => Ansi16::Yellow,
            StatusTone::Primary => Ansi16::Cyan,
        };
        self.fg(color).add_modifier(Modifier::BOLD)
    }

    fn panel_border_style(&self, focused: bool) -> Style {
        if focused {
            self.fg(Ansi16::Green)
        } else if self.modal_open() {
            self.dimmed_style()
        } else {
            self.base_style()
        }
    }

    fn panel_title_style(&self, focused: bool) -> Style {
        self.panel_border_style(focused).add_modifier(Modifier::BOLD)
    }

    fn dimmed_style(&self) -> Style {
        self.fg(Ansi16::BrightBlack)
    }

    fn key_style(&self) -> Style {
        self.fg(Ansi16::BrightBlue).add_modifier(Modifier::BOLD)
    }

    fn heading_style(&self) -> Style {
        self.fg(Ansi16::Green).add_modifier(Modifier::BOLD)
    }

    fn status_badge(&self, status: Status) -> Span<'static> {
        Span::styled(format!("[{status}]"), self.tone_style(status_tone(Some(status))))
    }

    fn project_badge(&self, project: &str) -> Span<'static> {
        Span::styled(format!("[{project}]"), self.fg(Ansi16::Magenta))
    }

    fn tag_spans(&self, tags: &[String]) -> Vec<Span<'static>> {
        let mut spans = Vec::with_capacity(tags.len() * 2);
        for (idx, tag) in tags.iter().enumerate() {
            if idx > 0 {
                spans.push(Span::raw(" "));
            }
            spans.push(Span::styled(format!(" {tag} "), self.fg(Ansi16::White).add_modifier(Modifier::REVERSED)));
        }
        spans
    }

    fn render_top_bar(&self, frame: &mut Frame<'_>, layout: &ScreenLayout) {
        let searching = self.state.mode == Mode::Search && !self.modal_open();
        let block = Block::default()
            .borders(Borders::ALL)
            .title("─ Search ")
            .border_style(self.panel_border_style(searching))
            .title_style(self.panel_title_style(searching));
        let inner = block.inner(layout.search);
        frame.render_widget(block, layout.search);

        let query_style = if searching {
            self.base_style().add_modifier(Modifier::BOLD)
        } else {
            self.base_style()
        };
        let mut spans = vec![Span::styled("/ ", self.dimmed_style())];
        if self.state.search.buffer.is_empty() && !searching {
            spans.push(Span::styled("Search logs...", self.dimmed_style()));
        } else {
            spans.push(Span::styled(self.state.search.buffer.clone(), query_style));
        }
        if searching {
            spans.push(Span::styled(" ", self.base_style().add_modifier(Modifier::REVERSED)));
        }
        if let Some(notice) = &self.state.notice {
            spans.push(Span::styled(format!("  {notice}"), self.fg(Ansi16::Yellow)));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)).style(self.base_style()), inner);

        let picking = |kind: PickerKind| {
            self.state.picker.as_ref().is_some_and(|picker| picker.kind == kind)
        };
        self.render_dropdown(
            frame,
            layout.project,
            "Project",
            Span::raw(self.state.filters.project.to_string()),
            picking(PickerKind::Projects),
        );
        let status_value = match self.state.filters.status {
            StatusFilter::All => Span::raw(StatusFilter::All.to_string()),
            StatusFilter::Only(status) => {
                Span::styled(status.label(), self.tone_style(status_tone(Some(status))))
            }
        };
        self.render_dropdown(frame, layout.status, "Status", status_value, picking(PickerKind::Statuses));
    }

    fn render_dropdown(
        &self,
        frame: &mut Frame<'_>,
        area: Rect,
        title: &str,
        value: Span<'static>,
        focused: bool,
    ) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("─ {title} "))
            .border_style(self.panel_border_style(focused))
            .title_style(self.panel_title_style(focused));
        let inner = block.inner(area);
        frame.render_widget(block, area);
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(2)])
            .split(inner);
        frame.render_widget(Paragraph::new(Line::from(value)).style(self.base_style()), chunks[0]);
        frame.render_widget(
            Paragraph::new("▾").alignment(Alignment::Right).style(self.dimmed_style()),
            chunks[1],
        );
    }

    fn render_cards(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let focused = self.state.mode == Mode::Normal && !self.modal_open();
        let total = self.state.filtered.len();
        let pos = if total == 0 { 0 } else { self.state.selected.saturating_add(1).min(total) };
        let title = Line::from(vec![
            Span::raw("─ "),
            Span::styled("#", self.fg(Ansi16::Green).add_modifier(Modifier::BOLD)),
            Span::raw(" Build Logs "),
        ]);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .title_bottom(Line::from(format!("─ {pos} of {total} ─")).right_aligned())
            .border_style(self.panel_border_style(focused))
            .title_style(self.panel_title_style(focused));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let (list_area, scrollbar_area) = split_for_scrollbar(inner);
        let text_width = usize::from(list_area.width).saturating_sub(2);
        let items: Vec<ListItem> = self
            .state
            .filtered
            .iter()
            .enumerate()
            .filter_map(|(pos, idx)| {
                let entry = self.state.entries.get(*idx)?;
                Some(ListItem::new(self.card_text(entry, text_width, pos == self.state.selected)))
            })
            .collect();

        let mut state = ListState::default().with_offset(self.state.card_offset);
        if total > 0 {
            state.select(Some(self.state.selected));
        }
        let list = List::new(items).style(self.base_style());
        frame.render_stateful_widget(list, list_area, &mut state);
        self.state.card_offset = state.offset();

        if let Some(scrollbar_area) = scrollbar_area {
            let visible = (usize::from(list_area.height) / CARD_HEIGHT).max(1);
            if total > visible {
                let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                    .thumb_style(if focused { self.fg(Ansi16::Green) } else { self.dimmed_style() })
                    .track_style(self.dimmed_style());
                let mut scrollbar_state = ScrollbarState::new(total.saturating_sub(visible) + 1)
                    .position(self.state.card_offset)
                    .viewport_content_length(visible);
                frame.render_stateful_widget(scrollbar, scrollbar_area, &mut scrollbar_state);
            }
        }
    }

    fn card_text(&self, entry: &LogEntry, width: usize, highlighted: bool) -> Text<'static> {
        let marker = || {
            if highlighted {
                Span::styled("▌ ", self.fg(Ansi16::Green))
            } else {
                Span::raw("  ")
            }
        };

        let mut header = vec![marker(), Span::styled(entry.display_date(), self.dimmed_style())];
        if entry.status.is_some() || entry.project.is_some() {
            header.push(Span::styled(" ·", self.dimmed_style()));
        }
        if let Some(status) = entry.status {
            header.push(Span::raw(" "));
            header.push(self.status_badge(status));
        }
        if let Some(project) = &entry.project {
            header.push(Span::raw(" "));
            header.push(self.project_badge(project));
        }

        let title_style = if highlighted {
            self.fg(Ansi16::BrightWhite).add_modifier(Modifier::BOLD)
        } else {
            self.base_style().add_modifier(Modifier::BOLD)
        };
        let mut lines = vec![
            Line::from(header),
            Line::from(vec![marker(), Span::styled(entry.title.clone(), title_style)]),
        ];

        let mut preview = wrap_preview(&entry.content, width, CARD_CONTENT_LINES);
        preview.resize(CARD_CONTENT_LINES, String::new());
        for text in preview {
            lines.push(Line::from(vec![marker(), Span::styled(text, self.base_style())]));
        }

        let mut tags = vec![marker()];
        tags.extend(self.tag_spans(&entry.tags));
        lines.push(Line::from(tags));
        lines.push(Line::raw(""));
        Text::from(lines)
    }

    fn render_footer(&self, frame: &mut Frame<'_>, area: Rect) {
        frame.render_widget(Block::default().style(self.base_style()), area);
        let footer_area = if area.height > 1 {
            Rect { x: area.x, y: area.y + area.height - 1, width: area.width, height: 1 }
        } else {
            area
        };

        let key_style = self.key_style();
        let sep_style = self.dimmed_style();
        let mut spans: Vec<Span<'static>> = Vec::new();
        let mut push_item = |label: &'static str, key: &'static str| {
            if !spans.is_empty() {
                spans.push(Span::styled(" | ", sep_style));
            }
            spans.push(Span::styled(label, sep_style));
            spans.push(Span::raw(":"));
            spans.push(Span::styled(key, key_style));
        };

        if self.state.detail.is_open() {
            push_item("Scroll", "j/k");
            push_item("Next/Prev", "n/N");
            push_item("Yank", "y/Y");
            push_item("Close", "Esc");
        } else {
            match self.state.mode {
                Mode::Search => {
                    push_item("Clear", "Ctrl-u");
                    push_item("Paste", "Ctrl-y");
                    push_item("Done", "Enter/Esc");
                }
                Mode::Picker => {
                    push_item("Move", "↑/↓");
                    push_item("Select", "Enter");
                    push_item("Close", "Esc");
                }
                Mode::Normal => {
                    push_item("Move", "j/k");
                    push_item("Open", "Enter");
                    push_item("Search", "/");
                    push_item("Project", "p");
                    push_item("Status", "s");
                    push_item("Reset", "u");
                    push_item("Yank", "y/Y");
                    push_item("Help", "?");
                    push_item("Quit", "q");
                }
            }
        }

        let brand = "buildlogs ";
        let brand_width = brand.len() as u16;
        let left = Paragraph::new(Line::from(spans)).alignment(Alignment::Left).style(sep_style);
        if footer_area.width > brand_width * 3 {
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Min(0), Constraint::Length(brand_width)])
                .split(footer_area);
            frame.render_widget(left, chunks[0]);
            frame.render_widget(
                Paragraph::new(brand)
                    .alignment(Alignment::Right)
                    .style(self.base_style().add_modifier(Modifier::BOLD)),
                chunks[1],
            );
        } else {
            frame.render_widget(left, footer_area);
        }
    }

    fn detail_text(&self, entry: &LogEntry) -> Text<'static> {
        let heading = self.heading_style();
        let muted = self.fg(Ansi16::White);
        let mut lines: Vec<Line<'static>> = Vec::new();

        lines.push(Line::from(Span::styled(
            entry.title.clone(),
            self.fg(Ansi16::BrightWhite).add_modifier(Modifier::BOLD),
        )));
        let mut meta = vec![Span::styled(entry.display_date(), self.dimmed_style())];
        if let Some(project) = &entry.project {
            meta.push(Span::raw("  "));
            meta.push(self.project_badge(project));
        }
        if let Some(status) = entry.status {
            meta.push(Span::raw(" "));
            meta.push(self.status_badge(status));
        }
        lines.push(Line::from(meta));

        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled("Description", heading)));
        lines.extend(entry.content.split('\n').map(|text| Line::styled(text.to_string(), muted)));

        if let Some(impact) = &entry.impact {
            lines.push(Line::raw(""));
            lines.push(Line::from(Span::styled("Impact", heading)));
            lines.push(Line::styled(impact.clone(), muted));
        }
        for (title, items) in [("Challenges", &entry.challenges), ("Next Steps", &entry.next_steps)] {
            if items.is_empty() {
                continue;
            }
            lines.push(Line::raw(""));
            lines.push(Line::from(Span::styled(title, heading)));
            lines.extend(items.iter().map(|item| Line::styled(format!("• {item}"), muted)));
        }

        if !entry.tags.is_empty() {
            lines.push(Line::raw(""));
            lines.push(Line::styled("─".repeat(12), self.dimmed_style()));
            lines.push(Line::from(self.tag_spans(&entry.tags)));
        }
        Text::from(lines)
    }

    fn render_detail(&mut self, frame: &mut Frame<'_>) {
        let Some(entry) = self.detail_entry() else {
            return;
        };
        let text = self.detail_text(entry);
        let (area, body, close_row) = detail_areas(frame.area());

        frame.render_widget(Clear, area);
        let block = Block::default()
            .borders(Borders::ALL)
            .title("─ Build Log ")
            .title_bottom(Line::from("─ Esc: close ─").right_aligned())
            .border_style(self.panel_border_style(true))
            .title_style(self.panel_title_style(true))
            .style(self.base_style());
        frame.render_widget(block, area);

        let paragraph = Paragraph::new(text).wrap(Wrap { trim: false }).style(self.base_style());
        let content_height = paragraph.line_count(body.width);
        self.state.detail_viewport_height = body.height;
        self.state.detail_content_height = u16::try_from(content_height).unwrap_or(u16::MAX);
        self.state.detail_scroll = self.state.detail_scroll.min(self.max_detail_scroll());

        frame.render_widget(paragraph.scroll((self.state.detail_scroll, 0)), body);
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "[ Close ]",
                self.base_style().add_modifier(Modifier::REVERSED | Modifier::BOLD),
            )))
            .alignment(Alignment::Right),
            close_row,
        );
    }

    fn render_picker(&mut self, frame: &mut Frame<'_>) {
        let (area, list_area) = picker_areas(frame.area());
        let selection_style = self.base_style().add_modifier(Modifier::REVERSED | Modifier::BOLD);
        let dimmed = self.dimmed_style();
        let border_style = self.panel_border_style(true);
        let title_style = self.panel_title_style(true);
        let base = self.base_style();
        let status_styles: Vec<(Status, Style)> = ALL_STATUSES
            .iter()
            .map(|status| (*status, self.tone_style(status_tone(Some(*status)))))
            .collect();

        let Some(picker) = self.state.picker.as_mut() else {
            return;
        };
        frame.render_widget(Clear, area);
        let title = match picker.kind {
            PickerKind::Projects => "─ Filter by project ",
            PickerKind::Statuses => "─ Filter by status ",
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(border_style)
            .title_style(title_style)
            .style(base);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let header = Paragraph::new(Line::from(vec![
            Span::styled("Filter: ", dimmed),
            Span::styled(picker.query.buffer.clone(), base.add_modifier(Modifier::BOLD)),
        ]));
        frame.render_widget(header, Rect { height: inner.height.min(1), ..inner });

        let items: Vec<ListItem> = if picker.filtered.is_empty() {
            vec![ListItem::new(Span::styled("No matches", dimmed))]
        } else {
            picker
                .filtered
                .iter()
                .filter_map(|idx| picker.items.get(*idx))
                .map(|item| {
                    let marker = if item.active { "● " } else { "  " };
                    let style = match &item.id {
                        PickerItemId::Status(status) => status_styles
                            .iter()
                            .find(|(candidate, _)| candidate == status)
                            .map(|(_, style)| *style)
                            .unwrap_or(base),
                        _ => base,
                    };
                    ListItem::new(Line::from(vec![
                        Span::raw(marker),
                        Span::styled(item.label.clone(), style),
                    ]))
                })
                .collect()
        };
        let mut state = ListState::default().with_offset(picker.offset);
        if !picker.filtered.is_empty() {
            state.select(Some(picker.selected));
        }
        let list = List::new(items).style(base).highlight_style(selection_style);
        frame.render_stateful_widget(list, list_area, &mut state);
        picker.offset = state.offset();

        let footer_row = Rect {
            y: inner.y + inner.height.saturating_sub(1),
            height: inner.height.min(1),
            ..inner
        };
        frame.render_widget(
            Paragraph::new("Enter: select  Esc: close").style(dimmed),
            footer_row,
        );
    }

    fn render_help(&self, frame: &mut Frame<'_>) {
        let area = centered_rect(HELP_POPUP.0, HELP_POPUP.1, frame.area());
        frame.render_widget(Clear, area);
        let key_style = self.key_style();
        let header_style = self.heading_style();
        let key_col_width = "PgUp/PgDn".len();
        let kv = |key: &str, desc: &str| -> Line<'static> {
            Line::from(vec![
                Span::styled(format!("{key:>width$}", width = key_col_width), key_style),
                Span::raw("  "),
                Span::raw(desc.to_string()),
            ])
        };

        let lines = vec![
            Line::from(Span::styled("Cards", header_style)),
            kv("j/k", "move highlight"),
            kv("g/G", "first / last card"),
            kv("Enter", "open detail"),
            kv("/", "search title, content and tags"),
            kv("p", "filter by project"),
            kv("s", "filter by status"),
            kv("u", "reset search and filters"),
            kv("y/Y", "copy title / full entry"),
            kv("q", "quit"),
            Line::raw(""),
            Line::from(Span::styled("Detail", header_style)),
            kv("j/k", "scroll"),
            kv("PgUp/PgDn", "scroll by page"),
            kv("n/N", "next / previous entry"),
            kv("Esc", "close"),
            Line::raw(""),
            Line::from(Span::styled("Mouse", header_style)),
            kv("click", "open card, pick filter, close detail"),
            kv("wheel", "move highlight / scroll detail"),
        ];
        let block = Block::default()
            .borders(Borders::ALL)
            .title("─ Keybindings ")
            .border_style(self.panel_border_style(true))
            .title_style(self.panel_title_style(true))
            .style(self.base_style());
        frame.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
            area,
        );
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

/// Word-wrap `content` to `width` display columns, keep explicit line breaks, and clamp
/// to `max_lines`, ending the last kept line with an ellipsis when text was cut.
pub fn wrap_preview(content: &str, width: usize, max_lines: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut truncated = false;

    'paragraphs: for paragraph in content.split('\n') {
        let mut current = String::new();
        let mut current_width = 0usize;
        for mut word in paragraph.split_whitespace() {
            loop {
                let gap = usize::from(current_width > 0);
                let word_width = word.width();
                if current_width + gap + word_width <= width {
                    if gap == 1 {
                        current.push(' ');
                    }
                    current.push_str(word);
                    current_width += gap + word_width;
                    break;
                }
                if current_width > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0;
                } else {
                    let split = split_at_width(word, width);
                    lines.push(word[..split].to_string());
                    word = &word[split..];
                }
                if lines.len() > max_lines {
                    truncated = true;
                    break 'paragraphs;
                }
            }
        }
        lines.push(current);
        if lines.len() > max_lines {
            truncated = true;
            break;
        }
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        truncated = true;
    }
    if truncated {
        if let Some(last) = lines.last_mut() {
            while last.as_str().width() >= width {
                last.pop();
            }
            last.truncate(last.trim_end().len());
            last.push('…');
        }
    }
    lines
}

/// Byte index where `text` stops fitting in `width` columns; always keeps the first char.
fn split_at_width(text: &str, width: usize) -> usize {
    let mut used = 0usize;
    for (idx, ch) in text.char_indices() {
        let ch_width = ch.width().unwrap_or(0);
        if idx > 0 && used + ch_width > width {
            return idx;
        }
        used += ch_width;
    }
    text.len()
}

/// Rank picker items against `query`: substring hits first, then fuzzy matches.
pub fn fuzzy_rank_items(items: &[PickerItem], query: &str) -> Vec<usize> {
    let query_lower = query.to_lowercase();
    let threshold = if query_lower.len() <= 2 { 0.2 } else { 0.35 };

    let mut scored: Vec<(usize, f64)> = items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let score = if query_lower.is_ascii() && item.label.is_ascii() {
                if contains_ascii_case_insensitive(item.label.as_bytes(), query_lower.as_bytes()) {
                    1.0
                } else {
                    fuzz::ratio(
                        query_lower.bytes(),
                        item.label.bytes().map(|b| b.to_ascii_lowercase()),
                    )
                }
            } else {
                let candidate = item.label.to_lowercase();
                if candidate.contains(&query_lower) {
                    1.0
                } else {
                    fuzz::ratio(query_lower.chars(), candidate.chars())
                }
            };
            (score >= threshold).then_some((idx, score))
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
    scored.into_iter().map(|(idx, _)| idx).collect()
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn split_for_scrollbar(area: Rect) -> (Rect, Option<Rect>) {
    if area.width <= 1 || area.height == 0 {
        return (area, None);
    }
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);
    (chunks[0], Some(chunks[1]))
}

impl fmt::Debug for Tui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tui").field("config", &self.config).field("state", &self.state).finish()
    }
}
