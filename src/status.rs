//! Entry status values and their badge tones.
//!
//! A build log entry may carry one of three statuses. Every status, plus the
//! "no status" case, maps to exactly one badge tone; the TUI resolves tones to
//! concrete colors through its palette.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// All known statuses, in picker order.
pub const ALL_STATUSES: [Status; 3] = [Status::Completed, Status::InProgress, Status::Planned];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Completed,
    InProgress,
    Planned,
}

impl Status {
    /// Wire spelling, as used in data files and on the command line.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::InProgress => "in-progress",
            Self::Planned => "planned",
        }
    }

    /// Human label used by the status dropdown.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::InProgress => "In Progress",
            Self::Planned => "Planned",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status {0:?} (expected completed, in-progress or planned)")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "completed" => Ok(Self::Completed),
            "in-progress" | "in_progress" | "inprogress" => Ok(Self::InProgress),
            "planned" => Ok(Self::Planned),
            _ => Err(UnknownStatus(value.to_string())),
        }
    }
}

/// Categorical badge tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Green,
    Blue,
    Yellow,
    Primary,
}

/// Map an optional status to its badge tone.
///
/// Entries without a status get the primary tone.
pub const fn status_tone(status: Option<Status>) -> StatusTone {
    match status {
        Some(Status::Completed) => StatusTone::Green,
        Some(Status::InProgress) => StatusTone::Blue,
        Some(Status::Planned) => StatusTone::Yellow,
        None => StatusTone::Primary,
    }
}
