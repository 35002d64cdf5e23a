use chrono::{DateTime, Utc};
use serde::Serialize;

/// One unit of work: a single user message, already downloaded.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub first_name: Option<String>,
    /// Receipt time; relative dates resolve against it.
    pub received_at: DateTime<Utc>,
    pub payload: Payload,
}

#[derive(Debug, Clone)]
pub enum Payload {
    Text(String),
    Command(Command),
    Image { bytes: Vec<u8>, mime_type: String },
    Voice { bytes: Vec<u8>, mime_type: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
}

impl Command {
    /// Parses `/start`, `/help@MyBot` and friends. Unknown commands fall back to help.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_lowercase().as_str() {
            "start" => Some(Command::Start),
            _ => Some(Command::Help),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundReply {
    /// HTML-formatted body.
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<ReplyLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyLink {
    pub label: String,
    pub url: String,
}

impl OutboundReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.link = Some(ReplyLink {
            label: label.into(),
            url: url.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/START@calbot"), Some(Command::Start));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(Command::parse("/whatever now"), Some(Command::Help));
        assert_eq!(Command::parse("start"), None);
        assert_eq!(Command::parse("/"), None);
    }
}
