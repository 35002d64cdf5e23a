pub mod event;
pub mod intent;
pub mod message;

pub use event::{CalendarLink, CanonicalEvent, RawExtraction};
pub use intent::Intent;
pub use message::{Command, InboundMessage, OutboundReply, Payload, ReplyLink};
