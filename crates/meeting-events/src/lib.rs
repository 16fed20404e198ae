pub mod event;
pub mod hub;

pub use event::{DeltaKind, MeetingEvent};
pub use hub::{EventHub, EventStream};
