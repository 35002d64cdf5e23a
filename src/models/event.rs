use std::fmt;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

/// Event fields exactly as the model reported them. Nothing here is validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawExtraction {
    pub title: Option<String>,
    pub date_expression: Option<String>,
    pub time_expression: Option<String>,
    pub end_time_expression: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalEvent {
    pub title: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// A pre-filled "create event" URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CalendarLink(String);

impl CalendarLink {
    pub(crate) fn new(url: String) -> Self {
        Self(url)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CalendarLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
