pub mod event;
pub mod message;
pub mod notice;
pub mod transcript;

pub use event::{ArcEventTx, Event, EventTx};
pub use message::{Message, Role};
pub use notice::*;
pub use transcript::Transcript;
