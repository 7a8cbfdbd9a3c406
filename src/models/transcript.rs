#[cfg(test)]
#[path = "transcript_test.rs"]
mod tests;

use super::Message;

/// Messages as shown to the user, oldest first.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// update replaces the content of the message with the given id. Returns
    /// false when the message is gone, e.g. removed by a cancel.
    pub fn update(&mut self, id: &str, content: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id() == id) {
            Some(message) => {
                message.set_content(content);
                true
            }
            None => false,
        }
    }

    pub fn most_recent(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn remove_most_recent(&mut self) -> Option<Message> {
        self.messages.pop()
    }

    pub fn last_bot_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_bot())
    }

    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
