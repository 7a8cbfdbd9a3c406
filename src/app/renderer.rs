#[cfg(test)]
#[path = "renderer_test.rs"]
mod tests;

use std::io::Write;

use crossterm::{
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
};
use eyre::Result;

use crate::models::{Event, Message, NoticeMessage, Role};

const USER_COLOR: Color = Color::Rgb {
    r: 129,
    g: 199,
    b: 132,
};
const BOT_COLOR: Color = Color::Rgb {
    r: 100,
    g: 181,
    b: 246,
};

/// Renderer prints conversation events to a terminal.
///
/// Message updates carry the full text of the message. Only the part that was
/// not printed yet is written, so rendering the same text twice is a no-op.
pub struct Renderer<W: Write> {
    out: W,
    color: bool,
    // The bot message being written on the current line and the text
    // already printed for it.
    active: Option<(String, String)>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            color: true,
            active: None,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn render(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::MessageAdded(message) => self.add_message(message)?,
            Event::MessageUpdated { id, text } => self.update_message(id, text)?,
            Event::MessageRemoved(id) => {
                self.close_active()?;
                log::debug!("Message {} removed", id);
                self.dim("(last message removed)")?;
            }
            Event::ConversationCleared => {
                self.close_active()?;
                self.dim("── conversation reset ──")?;
            }
            Event::ConversationLoaded(messages) => {
                self.close_active()?;
                for message in messages {
                    self.add_message(message)?;
                }
                self.close_active()?;
            }
            Event::GenerationStarted => {}
            Event::GenerationFinished => self.close_active()?,
            Event::ContextString(text) => {
                self.close_active()?;
                self.dim(&format!("[{}]", text))?;
            }
            Event::Summary(summary) => {
                self.close_active()?;
                self.styled("📝 Summary:", Color::Yellow)?;
                self.line(summary)?;
            }
            Event::Notice(notice) => self.notice(notice)?,
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn help(&mut self, text: &str) -> Result<()> {
        self.close_active()?;
        self.line(text)?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn add_message(&mut self, message: &Message) -> Result<()> {
        self.close_active()?;
        let (emoji, color) = match message.role() {
            Role::User => ("👤", USER_COLOR),
            _ => ("🤖", BOT_COLOR),
        };
        self.prefix(emoji, color)?;
        queue!(self.out, Print(message.content()))?;

        if message.is_user() {
            queue!(self.out, Print("\n"))?;
        } else {
            self.active = Some((message.id().to_string(), message.content().to_string()));
        }
        Ok(())
    }

    fn update_message(&mut self, id: &str, text: &str) -> Result<()> {
        let extends = match self.active.as_mut() {
            Some((active_id, shown)) if active_id == id => {
                let rest = text.strip_prefix(shown.as_str()).map(str::to_string);
                *shown = text.to_string();
                Some(rest)
            }
            _ => None,
        };

        match extends {
            Some(Some(rest)) => queue!(self.out, Print(rest))?,
            Some(None) => {
                // The text no longer extends what is on screen.
                queue!(self.out, Print("\n"))?;
                self.prefix("🤖", BOT_COLOR)?;
                queue!(self.out, Print(text))?;
            }
            None => {
                self.close_active()?;
                self.prefix("🤖", BOT_COLOR)?;
                queue!(self.out, Print(text))?;
                self.active = Some((id.to_string(), text.to_string()));
            }
        }
        Ok(())
    }

    fn close_active(&mut self) -> Result<()> {
        if self.active.take().is_some() {
            queue!(self.out, Print("\n"))?;
        }
        Ok(())
    }

    fn notice(&mut self, notice: &NoticeMessage) -> Result<()> {
        self.close_active()?;
        let label = format!("[{}]", notice.kind().label());
        if self.color {
            queue!(
                self.out,
                SetForegroundColor(notice.kind().text_color()),
                Print(label),
                ResetColor,
            )?;
        } else {
            queue!(self.out, Print(label))?;
        }
        queue!(self.out, Print(format!(" {}\n", notice.message())))?;
        Ok(())
    }

    fn prefix(&mut self, emoji: &str, color: Color) -> Result<()> {
        if self.color {
            queue!(
                self.out,
                SetForegroundColor(color),
                Print(emoji),
                ResetColor,
                Print(" ")
            )?;
        } else {
            queue!(self.out, Print(format!("{} ", emoji)))?;
        }
        Ok(())
    }

    fn styled(&mut self, text: &str, color: Color) -> Result<()> {
        if self.color {
            queue!(
                self.out,
                SetForegroundColor(color),
                Print(text),
                ResetColor,
                Print("\n")
            )?;
        } else {
            self.line(text)?;
        }
        Ok(())
    }

    fn dim(&mut self, text: &str) -> Result<()> {
        if self.color {
            queue!(
                self.out,
                SetAttribute(Attribute::Dim),
                Print(text),
                SetAttribute(Attribute::Reset),
                Print("\n")
            )?;
        } else {
            self.line(text)?;
        }
        Ok(())
    }

    fn line(&mut self, text: &str) -> Result<()> {
        queue!(self.out, Print(text), Print("\n"))?;
        Ok(())
    }
}
