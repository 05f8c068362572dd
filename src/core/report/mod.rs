pub mod format;

use serde::{Deserialize, Serialize};

use crate::core::relay::Identified;

/// One incident report as returned by the reports API.
///
/// Only `id` is required; every payload field is optional because the API
/// omits or nulls them freely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: u64,
    #[serde(default)]
    pub location_description: Option<String>,
    #[serde(default)]
    pub incident_time: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub activity_description: Option<String>,
    #[serde(default)]
    pub category_enum: Option<i64>,
    #[serde(default)]
    pub approved: Option<bool>,
    /// Sometimes a number, sometimes a string.
    #[serde(default)]
    pub number_of_officials: Option<serde_json::Value>,
    #[serde(default)]
    pub media: Option<Vec<ReportMedia>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportMedia {
    #[serde(default)]
    pub medium_thumbnail: Option<String>,
    #[serde(default)]
    pub small_thumbnail: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Critical,
    Active,
    Observed,
    Other,
}

impl Category {
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(0) => Category::Critical,
            Some(1) => Category::Active,
            Some(2) => Category::Observed,
            _ => Category::Other,
        }
    }

    pub fn badge(self) -> &'static str {
        match self {
            Category::Critical => "🔴 Critical",
            Category::Active => "🟠 Active",
            Category::Observed => "🟢 Observed",
            Category::Other => "🟣 Other",
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Report {
    pub fn category(&self) -> Category {
        Category::from_code(self.category_enum)
    }

    pub fn location(&self) -> Option<&str> {
        non_empty(&self.location_description)
    }

    pub fn description(&self) -> Option<&str> {
        non_empty(&self.activity_description)
    }

    pub fn is_verified(&self) -> bool {
        self.approved.unwrap_or(false)
    }

    /// Officials count rendered for display, `None` when absent, zero or blank.
    pub fn officials(&self) -> Option<String> {
        match self.number_of_officials.as_ref()? {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(v) if v > 0.0 => Some(n.to_string()),
                _ => None,
            },
            serde_json::Value::String(s) => {
                let s = s.trim();
                (!s.is_empty() && s != "0").then(|| s.to_string())
            }
            _ => None,
        }
    }

    /// Best image to attach: the first media entry's medium thumbnail, then
    /// its small thumbnail, then the full image.
    pub fn photo_url(&self) -> Option<&str> {
        let first = self.media.as_ref()?.first()?;
        non_empty(&first.medium_thumbnail)
            .or_else(|| non_empty(&first.small_thumbnail))
            .or_else(|| non_empty(&first.image))
    }
}

impl Identified for Report {
    fn report_id(&self) -> u64 {
        self.id
    }
}
