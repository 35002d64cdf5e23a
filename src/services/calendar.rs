use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::models::{CalendarLink, CanonicalEvent};

const GOOGLE_CALENDAR_TEMPLATE_URL: &str = "https://calendar.google.com/calendar/render";

/// Google Calendar's compact UTC form, e.g. `20240611T143000Z`.
fn compact_utc(dt: &DateTime<Tz>) -> String {
    dt.with_timezone(&Utc).format("%Y%m%dT%H%M%SZ").to_string()
}

/// Serializes an event into a pre-filled "add event" link. Pure: the same
/// event always yields the same bytes.
pub fn build_link(event: &CanonicalEvent) -> CalendarLink {
    let dates = format!("{}/{}", compact_utc(&event.start), compact_utc(&event.end));

    let mut url = format!(
        "{GOOGLE_CALENDAR_TEMPLATE_URL}?action=TEMPLATE&text={}&dates={}",
        urlencoding::encode(&event.title),
        urlencoding::encode(&dates),
    );
    if let Some(details) = &event.description {
        url.push_str("&details=");
        url.push_str(&urlencoding::encode(details));
    }
    if let Some(location) = &event.location {
        url.push_str("&location=");
        url.push_str(&urlencoding::encode(location));
    }

    CalendarLink::new(url)
}
