use chrono::DateTime;
use chrono_tz::Tz;

const INTENT_PROMPT: &str = r#"You classify messages sent to a calendar assistant bot.
Current date and time: {current_datetime}.

Reply with exactly one of these labels and nothing else (no punctuation, no explanation):
- add_event: the user wants to add an event, meeting, appointment or reminder to the calendar
- greeting: the user is greeting the bot
- help: the user is asking what the bot can do or how to use it
- other: anything else

User message: {user_message}
"#;

const EXTRACTION_PROMPT: &str = r#"Extract calendar event information from the user's message.
Current date and time: {current_datetime}.

Return ONLY a single JSON object (no markdown, no explanation) with these keys:
{
  "title": "short title of the event, without date, time or place",
  "date_expression": "the date exactly as the user said it, e.g. \"tomorrow\", \"next Tuesday\", \"June 14\", or YYYY-MM-DD",
  "time_expression": "the start time as said, e.g. \"2:30pm\", \"14:30\", or a range like \"2pm-3pm\"",
  "end_time_expression": "the end time if the user gave one separately",
  "location": "where the event takes place",
  "description": "any other relevant details"
}
Use null for every key the message does not mention. Do not invent dates or times.

User message: {user_message}
"#;

const IMAGE_EXTRACTION_PROMPT: &str = r#"Look at this image and extract the event it describes (poster, ticket, invitation, screenshot).
Current date and time: {current_datetime}.

Return ONLY a single JSON object (no markdown, no explanation) with these keys:
{
  "title": "event title",
  "date_expression": "the event date as shown, preferably YYYY-MM-DD",
  "time_expression": "the start time as shown, or a range like \"20:00-23:00\"",
  "end_time_expression": "the end time if shown separately",
  "location": "event venue or address",
  "description": "other relevant details from the image",
  "confidence": "a number between 0 and 1: how sure you are the image shows an event"
}
Use null for every key that is not visible in the image.
"#;

fn current_datetime(now: &DateTime<Tz>) -> String {
    format!("{} ({})", now.format("%A, %Y-%m-%d %H:%M"), now.timezone().name())
}

fn fill(template: &str, now: &DateTime<Tz>, user_message: &str) -> String {
    // User text goes in last so braces inside it are never treated as placeholders.
    template
        .replace("{current_datetime}", &current_datetime(now))
        .replace("{user_message}", user_message.trim())
}

pub fn intent_prompt(user_message: &str, now: &DateTime<Tz>) -> String {
    fill(INTENT_PROMPT, now, user_message)
}

pub fn extraction_prompt(user_message: &str, now: &DateTime<Tz>) -> String {
    fill(EXTRACTION_PROMPT, now, user_message)
}

pub fn image_extraction_prompt(now: &DateTime<Tz>) -> String {
    fill(IMAGE_EXTRACTION_PROMPT, now, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn monday_morning() -> DateTime<Tz> {
        chrono_tz::UTC.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_intent_prompt_lists_labels() {
        let prompt = intent_prompt("  hello there ", &monday_morning());
        for label in ["add_event", "greeting", "help", "other"] {
            assert!(prompt.contains(label));
        }
        assert!(prompt.contains("User message: hello there\n"));
        assert!(prompt.contains("Monday, 2024-06-10 09:00 (UTC)"));
    }

    #[test]
    fn test_extraction_prompt_keys() {
        let prompt = extraction_prompt("lunch tomorrow", &monday_morning());
        for key in ["\"title\"", "\"date_expression\"", "\"time_expression\"", "\"location\""] {
            assert!(prompt.contains(key));
        }
        assert!(!prompt.contains("{user_message}"));
        assert!(!prompt.contains("{current_datetime}"));
    }

    #[test]
    fn test_user_braces_left_alone() {
        let prompt = extraction_prompt("party {current_datetime}", &monday_morning());
        assert!(prompt.contains("User message: party {current_datetime}"));
    }

    #[test]
    fn test_image_prompt_asks_for_confidence() {
        let prompt = image_extraction_prompt(&monday_morning());
        assert!(prompt.contains("\"confidence\""));
        assert!(!prompt.contains("User message"));
    }
}
