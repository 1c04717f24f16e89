use super::format_date;
use crate::insights::{ReportSummary, Status};

pub const LINE_BREAK: &str = "<br/>";

/// Line captions of the rendered summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captions {
    pub team: String,
    pub initiators: String,
    pub defect: String,
    pub duplicates: String,
    /// Placeholder for an empty initiators or duplicates list.
    pub none: String,
}

impl Default for Captions {
    fn default() -> Self {
        Self {
            team: "Команда".to_string(),
            initiators: "Инициаторы".to_string(),
            defect: "jira".to_string(),
            duplicates: "Дубликаты".to_string(),
            none: "нет".to_string(),
        }
    }
}

impl Captions {
    pub fn english() -> Self {
        Self {
            team: "Team".to_string(),
            initiators: "Initiators".to_string(),
            defect: "jira".to_string(),
            duplicates: "Duplicates".to_string(),
            none: "none".to_string(),
        }
    }
}

pub fn format_summary(summary: &ReportSummary, colorize: bool) -> String {
    format_summary_with(summary, colorize, &Captions::default())
}

/// Render a summary as `<br/>`-separated lines with bold captions.
///
/// Line order: date and status counts, team (only when known), initiators,
/// one line per defect link, duplicates.
pub fn format_summary_with(
    summary: &ReportSummary,
    colorize: bool,
    captions: &Captions,
) -> String {
    let status_line = Status::ALL
        .iter()
        .map(|s| format_status(*s, summary.count(*s), colorize))
        .collect::<Vec<_>>()
        .join(", ");

    let mut lines = vec![format!(
        "**{}**: {status_line}",
        format_date(summary.timestamp)
    )];

    if !summary.team_name.is_empty() {
        lines.push(format!("**{}**: {}", captions.team, summary.team_name));
    }

    lines.push(format!(
        "**{}**: {}",
        captions.initiators,
        join_or(&summary.initiators, &captions.none)
    ));

    for link in &summary.defect_links {
        lines.push(format!("**{}**: {link}", captions.defect));
    }

    lines.push(format!(
        "**{}**: {}",
        captions.duplicates,
        join_or(&summary.duplicate_names, &captions.none)
    ));

    lines.join(LINE_BREAK)
}

fn format_status(status: Status, count: usize, colorize: bool) -> String {
    let pair = format!("{}={count}", status.as_str());
    match status.color() {
        Some(color) if colorize => format!(r#"<span style="color:{color};">{pair}</span>"#),
        _ => pair,
    }
}

fn join_or(items: &[String], placeholder: &str) -> String {
    if items.is_empty() {
        placeholder.to_string()
    } else {
        items.join(", ")
    }
}
