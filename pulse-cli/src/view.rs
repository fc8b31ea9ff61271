use std::fmt::Write;

use pulse_core::interests::{MIN_INTERESTS, INTERESTS};
use pulse_core::{Alert, Category, CategoryFilter, FeedState, InterestSelection, LocationMatch, Severity};

pub const HELP: &str = "\
Commands:
  all | traffic | weather | safety   switch the category filter
  refresh                            fetch the current category again
  list                               show the feed
  like <n|id>, dislike <n|id>        rate an alert
  interests                          show the interest catalog
  pick <id>...                       toggle interests
  save                               save the selected interests
  search <area>                      look up an area
  help, quit";

fn category_icon(category: Category) -> &'static str {
    match category {
        Category::Traffic => "🚗",
        Category::Weather => "🌧️",
        Category::Safety => "⚠️",
    }
}

fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "·",
        Severity::Medium => "!",
        Severity::High => "!!",
    }
}

fn filter_tab(state: &FeedState, filter: CategoryFilter, label: &str) -> String {
    let count = state.count_for(filter);
    if state.active_filter() == filter {
        format!("[{label} {count}]")
    } else {
        format!(" {label} {count} ")
    }
}

pub fn alert_line(index: usize, alert: &Alert) -> String {
    let mut line = format!(
        "{index:>2}. {} {:<2} {} ({})\n      {}\n      {} · {} · id {}",
        category_icon(alert.category),
        severity_marker(alert.severity),
        alert.title,
        alert.category.label(),
        alert.description,
        alert.location,
        alert.age_label,
        alert.id,
    );
    if let Some(verdict) = alert.feedback() {
        let _ = write!(line, "\n      ✓ you said: {verdict}");
    }
    line
}

pub fn feed(state: &FeedState, location: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} active alerts near {location}", state.count_for(CategoryFilter::All));

    let mut tabs = vec![filter_tab(state, CategoryFilter::All, "All")];
    tabs.extend(
        Category::ALL
            .into_iter()
            .map(|category| filter_tab(state, category.into(), category.label())),
    );
    let _ = writeln!(out, "{}", tabs.join(" "));

    let visible: Vec<&Alert> = state.visible().collect();
    if visible.is_empty() {
        let _ = writeln!(out, "  No alerts right now.");
    }
    for (index, alert) in visible.into_iter().enumerate() {
        let _ = writeln!(out, "{}", alert_line(index + 1, alert));
    }
    if let Some(error) = state.last_error() {
        let _ = writeln!(out, "  (last update failed: {error})");
    }
    let _ = write!(out, "Feedback submitted: {}", state.feedback_count());
    out
}

pub fn interests(selection: &InterestSelection) -> String {
    let mut out = String::new();
    for interest in INTERESTS {
        let mark = if selection.is_selected(interest.id) { "x" } else { " " };
        let _ = writeln!(out, "  [{mark}] {} {} ({})", interest.emoji, interest.label, interest.id);
    }
    let _ = write!(
        out,
        "{} selected, pick at least {MIN_INTERESTS} to continue",
        selection.len()
    );
    out
}

pub fn locations(matches: &[LocationMatch]) -> String {
    if matches.is_empty() {
        return "No matching areas.".to_owned();
    }
    matches
        .iter()
        .map(|found| {
            format!(
                "  {} ({:.4}, {:.4})",
                found.name, found.coordinates.lat, found.coordinates.lng
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::Verdict;

    #[test]
    fn alert_line_shows_the_recorded_verdict() {
        let mut alert = Alert::new("t-1", Category::Traffic, "Road Closed", "Main St blocked");
        assert!(!alert_line(1, &alert).contains("you said"));

        alert.record_feedback(Verdict::Like);
        let line = alert_line(1, &alert);
        assert!(line.starts_with(" 1. 🚗"));
        assert!(line.contains("you said: like"));
    }

    #[test]
    fn empty_feed_says_so() {
        let rendered = feed(&FeedState::default(), "HSR Layout, Bengaluru");
        assert!(rendered.starts_with("0 active alerts near HSR Layout, Bengaluru"));
        assert!(rendered.contains("[All 0]"));
        assert!(rendered.contains("No alerts right now."));
        assert!(rendered.ends_with("Feedback submitted: 0"));
    }

    #[test]
    fn interest_catalog_marks_selected_entries() {
        let mut selection = InterestSelection::default();
        selection.toggle("music").unwrap();
        let rendered = interests(&selection);
        assert!(rendered.contains("[x] 🎵 Music (music)"));
        assert!(rendered.contains("[ ] 🐱 Cats (cats)"));
        assert!(rendered.ends_with("1 selected, pick at least 2 to continue"));
    }
}
