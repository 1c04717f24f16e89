use std::collections::{BTreeSet, HashMap};

use super::normalize_timestamp;
use super::TestCase;
use crate::insights::{ReportSummary, Status};

const TEAM_LABEL: &str = "parentSuite";
const INITIATOR_LABELS: [&str; 3] = ["owner", "user", "initiator"];

/// Summarise a report in a single pass. Never fails: malformed fields were
/// already dropped while parsing.
pub fn aggregate(cases: &[TestCase], fallback_timestamp: i64) -> ReportSummary {
    let mut earliest: Option<f64> = None;
    let mut team_names = BTreeSet::new();
    let mut status_counts: HashMap<Status, usize> = HashMap::new();
    let mut initiators = BTreeSet::new();
    let mut defect_links = BTreeSet::new();
    let mut name_counts: HashMap<&str, usize> = HashMap::new();

    for case in cases {
        // A zero start is how unset times come through.
        if let Some(start) = case.start_time().filter(|s| *s != 0.0) {
            earliest = Some(earliest.map_or(start, |e| e.min(start)));
        }

        team_names.extend(case.label_values(TEAM_LABEL).map(str::to_string));
        for label in INITIATOR_LABELS {
            initiators.extend(case.label_values(label).map(str::to_string));
        }

        if let Some(status) = case.recognized_status() {
            *status_counts.entry(status).or_insert(0) += 1;
        }

        defect_links.extend(case.defect_links());

        if let Some(name) = case.name.as_deref().filter(|n| !n.is_empty()) {
            *name_counts.entry(name).or_insert(0) += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let timestamp = normalize_timestamp(earliest.unwrap_or(fallback_timestamp as f64));

    let duplicate_names: BTreeSet<String> = name_counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name.to_string())
        .collect();

    ReportSummary {
        timestamp,
        team_name: resolve_team_name(team_names),
        status_counts: Status::ALL
            .iter()
            .map(|s| (*s, status_counts.get(s).copied().unwrap_or(0)))
            .collect(),
        initiators: initiators.into_iter().collect(),
        defect_links: defect_links.into_iter().collect(),
        duplicate_names: duplicate_names.into_iter().collect(),
    }
}

// Several distinct teams are joined rather than picking one. This is a
// heuristic; callers that need exactly one owner use `extract_team_name`.
fn resolve_team_name(candidates: BTreeSet<String>) -> String {
    candidates.into_iter().collect::<Vec<_>>().join("_")
}
