use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AddEvent,
    Greeting,
    HelpRequest,
    Other,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::AddEvent => "add_event",
            Intent::Greeting => "greeting",
            Intent::HelpRequest => "help",
            Intent::Other => "other",
        }
    }

    /// Maps a model label onto an intent. Accepts the label spellings the
    /// prompt asks for plus the variants models drift into; `None` for
    /// anything else.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c == '*')
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();

        match normalized.as_str() {
            "add_event" | "addevent" | "create_event" | "schedule_event" | "new_event" => {
                Some(Intent::AddEvent)
            }
            "greeting" | "greet" | "hello" => Some(Intent::Greeting),
            "help" | "help_request" | "helprequest" => Some(Intent::HelpRequest),
            "other" | "unknown" | "none" => Some(Intent::Other),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label_variants() {
        assert_eq!(Intent::from_label("add_event"), Some(Intent::AddEvent));
        assert_eq!(Intent::from_label("  ADD-EVENT "), Some(Intent::AddEvent));
        assert_eq!(Intent::from_label("\"greet\""), Some(Intent::Greeting));
        assert_eq!(Intent::from_label("Help Request."), Some(Intent::HelpRequest));
        assert_eq!(Intent::from_label("`other`"), Some(Intent::Other));
        assert_eq!(Intent::from_label("weather"), None);
    }

    #[test]
    fn test_as_str_round_trips() {
        for intent in [
            Intent::AddEvent,
            Intent::Greeting,
            Intent::HelpRequest,
            Intent::Other,
        ] {
            assert_eq!(Intent::from_label(intent.as_str()), Some(intent));
        }
    }
}
