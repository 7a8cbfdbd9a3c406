use std::sync::Arc;

use tokio::sync::mpsc;

use super::{Message, NoticeMessage};

#[derive(Debug)]
pub enum Event {
    Notice(NoticeMessage),

    MessageAdded(Message),
    MessageUpdated { id: String, text: String },
    MessageRemoved(String),

    ConversationCleared,
    ConversationLoaded(Vec<Message>),

    GenerationStarted,
    GenerationFinished,

    ContextString(String),
    Summary(String),
}

#[macro_export]
macro_rules! notice_info {
    ($msg:expr) => {
        $crate::models::Event::Notice($crate::models::NoticeMessage::info($msg))
    };
}

#[macro_export]
macro_rules! notice_warning {
    ($msg:expr) => {
        $crate::models::Event::Notice($crate::models::NoticeMessage::warning($msg))
    };
}

#[macro_export]
macro_rules! notice_error {
    ($msg:expr) => {
        $crate::models::Event::Notice($crate::models::NoticeMessage::error($msg))
    };
}

#[async_trait::async_trait]
pub trait EventTx {
    async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>>;
}

#[async_trait::async_trait]
impl EventTx for mpsc::UnboundedSender<Event> {
    async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.send(event)
    }
}

pub type ArcEventTx = Arc<dyn EventTx + Send + Sync>;
