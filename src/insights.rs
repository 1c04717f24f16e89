use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Broken,
    Skipped,
}

impl Status {
    /// Fixed display order.
    pub const ALL: [Status; 4] = [
        Status::Passed,
        Status::Failed,
        Status::Broken,
        Status::Skipped,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            "broken" => Some(Self::Broken),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Broken => "broken",
            Self::Skipped => "skipped",
        }
    }

    pub fn color(self) -> Option<&'static str> {
        match self {
            Self::Passed => Some("green"),
            Self::Failed => Some("red"),
            Self::Broken => Some("orange"),
            Self::Skipped => Some("gray"),
        }
    }
}

/// Facts extracted from one report. Built fresh per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Earliest case start, in epoch seconds.
    pub timestamp: i64,
    pub team_name: String,
    /// Always holds all four statuses, in [`Status::ALL`] order.
    pub status_counts: IndexMap<Status, usize>,
    pub initiators: Vec<String>,
    pub defect_links: Vec<String>,
    pub duplicate_names: Vec<String>,
}

impl ReportSummary {
    pub fn count(&self, status: Status) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    pub fn total_counted(&self) -> usize {
        self.status_counts.values().sum()
    }
}
