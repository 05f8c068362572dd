//! Rendering of a [`Report`] into the notification text posted to the channel.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

use super::Report;

pub const DIVIDER: &str = "━━━━━━━━━━━━━━━━━━━━";
pub const DEFAULT_REPORT_URL_TEMPLATE: &str = "https://iceout.org/en/reportInfo/{id}";

const UNKNOWN: &str = "Unknown";

static STATE_WITH_ZIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([A-Z]{2})\s+\d{5}").expect("valid regex"));
static STATE_BETWEEN_COMMAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([A-Z]{2})\s*,").expect("valid regex"));

const US_STATES: &[(&str, &str)] = &[
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
    ("DC", "District of Columbia"),
];

fn state_name(abbr: &str) -> Option<&'static str> {
    US_STATES
        .iter()
        .find(|(code, _)| *code == abbr)
        .map(|(_, name)| *name)
}

/// Extracts the US state from a free-form address, e.g.
/// `"5127 W Imperial Hwy, Lennox, CA 90304, USA"` becomes `"California (CA)"`.
pub fn extract_us_state(location: &str) -> String {
    if location.trim().is_empty() {
        return UNKNOWN.to_string();
    }

    let captured = STATE_WITH_ZIP
        .captures(location)
        .or_else(|| STATE_BETWEEN_COMMAS.captures(location))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());

    if let Some(abbr) = captured {
        let name = state_name(abbr).unwrap_or(abbr);
        return format!("{} ({})", name, abbr);
    }

    for part in location.split(',') {
        if let Some(token) = part.split_whitespace().next()
            && let Some(name) = state_name(token)
        {
            return format!("{} ({})", name, token);
        }
    }

    UNKNOWN.to_string()
}

/// Formats an ISO-8601 timestamp as `"05 Mar 2025, 14:30 UTC"`.
/// Unparseable input is returned as-is; empty input becomes `"Unknown"`.
pub fn format_timestamp(raw: Option<&str>) -> String {
    let raw = match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return UNKNOWN.to_string(),
    };

    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc())
        });

    match parsed {
        Ok(dt) => dt.format("%d %b %Y, %H:%M UTC").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Escapes text for Telegram's HTML parse mode. `&` must go first.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Truncates to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Like [`truncate_chars`], but for already-escaped HTML: never leaves a
/// dangling partial entity such as `&am` at the cut.
pub fn truncate_html(text: &str, max_chars: usize) -> String {
    let mut cut = truncate_chars(text, max_chars);
    if cut.len() == text.len() {
        return cut;
    }
    if let Some(amp) = cut.rfind('&')
        && !cut[amp..].contains(';')
    {
        cut.truncate(amp);
    }
    cut
}

#[derive(Debug, Clone)]
pub struct MessageFormatter {
    report_url_template: String,
    source_label: String,
}

impl MessageFormatter {
    pub fn new(report_url_template: impl Into<String>, source_label: impl Into<String>) -> Self {
        Self {
            report_url_template: report_url_template.into(),
            source_label: source_label.into(),
        }
    }

    pub fn report_url(&self, id: u64) -> String {
        self.report_url_template.replace("{id}", &id.to_string())
    }

    /// Plain-text notification body; escape with [`escape_html`] before an HTML send.
    pub fn format(&self, report: &Report) -> String {
        let location = report.location().unwrap_or("Location not specified");
        let state = extract_us_state(report.location().unwrap_or_default());
        let incident_time = format_timestamp(report.incident_time.as_deref());
        let verification = if report.is_verified() {
            "✅ Verified"
        } else {
            "⏳ Not Confirmed"
        };

        let mut text = String::new();
        text.push_str(report.category().badge());
        text.push('\n');
        text.push_str(DIVIDER);
        text.push_str("\n\n");
        text.push_str(&format!("📍 {}\n", location));
        text.push_str(&format!("🏛️ {}\n", state));
        text.push_str(&format!("📅 {}\n", incident_time));
        text.push_str(&format!("🔖 {}", verification));
        if let Some(officials) = report.officials() {
            text.push_str(&format!("\n👮 Officials: {}", officials));
        }
        if let Some(description) = report.description() {
            text.push_str(&format!("\n\n📝 {}", description));
        }
        text.push_str("\n\n");
        text.push_str(&format!("🔗 Details: {}\n", self.report_url(report.id)));
        text.push_str(DIVIDER);
        text.push('\n');
        text.push_str(&format!("📡 {} • #{}", self.source_label, report.id));
        text
    }
}
