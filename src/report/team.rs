use super::TestCase;

/// The single team a report run is attributed to.
///
/// The first non-empty `parentSuite` label in case order wins; reports
/// without one fall back to the first `suite` label.
pub fn extract_team_name(cases: &[TestCase]) -> Option<String> {
    first_label_value(cases, "parentSuite").or_else(|| first_label_value(cases, "suite"))
}

fn first_label_value(cases: &[TestCase], name: &str) -> Option<String> {
    cases
        .iter()
        .find_map(|case| case.label_values(name).next())
        .map(str::to_string)
}
