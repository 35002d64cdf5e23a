pub mod ai;
pub mod calendar;
pub mod conversation;
pub mod dispatch;
pub mod messaging;
pub mod normalizer;
pub mod polling;
pub mod transcription;
