#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Context, Result};
use thiserror::Error;

use crate::backend::ArcBackend;
use crate::config::constants::{MAX_INPUT_LENGTH, SWIPE_DELAY_MS};
use crate::models::{ArcEventTx, Event, Message, Transcript};
use crate::stream::{BoxChunkStream, MessageSink, stream_to_message};

use super::generation::{GenerationError, GenerationState, Ticket};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("input exceeds maximum length of {max} characters")]
    InputTooLong { max: usize },

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Controller runs the conversation actions against the backend and keeps
/// the local transcript in sync with the server. Every change is published
/// as an [`Event`].
pub struct Controller {
    backend: ArcBackend,
    event_tx: ArcEventTx,
    generation: GenerationState,
    transcript: Mutex<Transcript>,
    max_input_length: usize,
    swipe_delay: Duration,
}

impl Controller {
    pub fn new(backend: ArcBackend, event_tx: ArcEventTx) -> Self {
        Self {
            backend,
            event_tx,
            generation: GenerationState::new(),
            transcript: Mutex::new(Transcript::new()),
            max_input_length: MAX_INPUT_LENGTH,
            swipe_delay: Duration::from_millis(SWIPE_DELAY_MS),
        }
    }

    pub fn with_max_input_length(mut self, max: usize) -> Self {
        self.max_input_length = max;
        self
    }

    pub fn with_swipe_delay(mut self, delay: Duration) -> Self {
        self.swipe_delay = delay;
        self
    }

    pub fn is_generating(&self) -> bool {
        self.generation.is_active()
    }

    pub fn generation(&self) -> &GenerationState {
        &self.generation
    }

    pub fn messages(&self) -> Vec<Message> {
        self.transcript().messages().to_vec()
    }

    pub fn last_bot_message(&self) -> Option<String> {
        self.transcript()
            .last_bot_message()
            .map(|m| m.content().to_string())
    }

    /// submit sends a user prompt and streams the reply. While a generation
    /// runs it cancels that generation instead, and an empty prompt asks the
    /// bot to speak next.
    pub async fn submit(&self, input: &str) -> Result<()> {
        if self.generation.is_active() {
            return self.cancel().await;
        }

        let prompt = input.trim();
        if prompt.is_empty() {
            return self.new_bot_message(None).await;
        }
        self.check_length(prompt)?;

        let ticket = self.generation.try_begin()?;
        self.emit(Event::GenerationStarted).await;
        let res = self.run_submit(&ticket, prompt).await;
        self.finish(&ticket).await;
        res
    }

    async fn run_submit(&self, ticket: &Ticket, prompt: &str) -> Result<()> {
        self.push_message(Message::new_user(prompt)).await;

        let stream = self
            .backend
            .submit(prompt.to_string())
            .await
            .wrap_err("submitting prompt")?;
        if ticket.token().is_cancelled() {
            return Ok(());
        }

        let reply = Message::new_bot("");
        let id = reply.id().to_string();
        self.push_message(reply).await;
        self.stream_reply(ticket, stream, &id, None).await
    }

    /// new_bot_message asks the server for a bot message. A non-empty
    /// `prefix` is shown right away and the reply continues it.
    pub async fn new_bot_message(&self, prefix: Option<String>) -> Result<()> {
        if self.generation.is_active() {
            log::info!("refuse to trigger new bot message - already generating");
            return Ok(());
        }
        let prefix = prefix.filter(|p| !p.is_empty());
        if let Some(prefix) = prefix.as_deref() {
            self.check_length(prefix)?;
        }

        let ticket = match self.generation.try_begin() {
            Ok(ticket) => ticket,
            Err(GenerationError::Busy) => {
                log::info!("refuse to trigger new bot message - already generating");
                return Ok(());
            }
        };
        self.emit(Event::GenerationStarted).await;
        let res = self.run_trigger(&ticket, prefix).await;
        self.finish(&ticket).await;
        res
    }

    async fn run_trigger(&self, ticket: &Ticket, prefix: Option<String>) -> Result<()> {
        let mut reply_id = None;
        if let Some(prefix) = prefix.as_deref() {
            let reply = Message::new_bot(prefix);
            reply_id = Some(reply.id().to_string());
            self.push_message(reply).await;
        }

        let stream = self
            .backend
            .trigger(prefix.clone())
            .await
            .wrap_err("triggering bot message")?;
        if ticket.token().is_cancelled() {
            return Ok(());
        }

        let id = match reply_id {
            Some(id) => id,
            None => {
                let reply = Message::new_bot("");
                let id = reply.id().to_string();
                self.push_message(reply).await;
                id
            }
        };
        self.stream_reply(ticket, stream, &id, prefix.as_deref())
            .await
    }

    /// cancel stops the running generation on the server, drops the local
    /// stream and removes the message being generated.
    pub async fn cancel(&self) -> Result<()> {
        if !self.generation.is_active() {
            return Ok(());
        }

        self.backend
            .cancel()
            .await
            .wrap_err("cancelling generation")?;
        // The generation may have finished while /cancel was in flight. Its
        // reply is then complete on the server and stays.
        if !self.generation.abort() {
            log::info!("Generation already finished, keeping the last message");
            return Ok(());
        }
        self.emit(Event::GenerationFinished).await;

        let removed = self.transcript().remove_most_recent();
        if let Some(message) = removed {
            self.emit(Event::MessageRemoved(message.id().to_string()))
                .await;
        }
        Ok(())
    }

    pub async fn remove_last(&self) -> Result<()> {
        if self.generation.is_active() {
            log::info!("refuse to remove last message - currently generating");
            return Ok(());
        }
        let empty = self.transcript().is_empty();
        if empty {
            return Ok(());
        }

        self.backend
            .remove_last()
            .await
            .wrap_err("removing last message")?;

        let removed = self.transcript().remove_most_recent();
        if let Some(message) = removed {
            log::debug!("Removed message {}", message.id());
            self.emit(Event::MessageRemoved(message.id().to_string()))
                .await;
        }
        self.refresh_context().await;
        Ok(())
    }

    pub async fn reset(&self) -> Result<()> {
        if let Err(err) = self.cancel().await {
            log::error!("Failed to cancel before reset: {:#}", err);
        }

        self.backend
            .reset()
            .await
            .wrap_err("resetting conversation")?;
        self.transcript().clear();
        self.emit(Event::ConversationCleared).await;
        self.refresh_context().await;
        Ok(())
    }

    /// swipe throws away the last reply and generates a new one.
    pub async fn swipe(&self, prefix: Option<String>) -> Result<()> {
        if self.generation.is_active() {
            self.cancel().await?;
        } else {
            self.remove_last().await?;
        }

        tokio::time::sleep(self.swipe_delay).await;
        self.new_bot_message(prefix).await
    }

    /// summarize returns the summary of the conversation, or `None` when a
    /// generation is running.
    pub async fn summarize(&self) -> Result<Option<String>> {
        let ticket = match self.generation.try_begin() {
            Ok(ticket) => ticket,
            Err(GenerationError::Busy) => {
                log::info!("refuse to generate summary - already generating");
                return Ok(None);
            }
        };
        self.emit(Event::GenerationStarted).await;

        let res = self
            .backend
            .summarize()
            .await
            .wrap_err("generating summary");
        if self.generation.end(&ticket) {
            self.emit(Event::GenerationFinished).await;
        }

        let summary = res?;
        log::info!("summary: {}", summary);
        self.emit(Event::Summary(summary.clone())).await;
        Ok(Some(summary))
    }

    /// load_conversation replaces the transcript with the conversation held
    /// by the server. System messages are not shown.
    pub async fn load_conversation(&self) -> Result<()> {
        let messages = self
            .backend
            .conversation()
            .await
            .wrap_err("loading conversation")?
            .into_iter()
            .filter(|m| !m.is_system())
            .collect::<Vec<_>>();

        log::debug!("Loaded {} messages", messages.len());
        self.transcript().replace(messages.clone());
        self.emit(Event::ConversationLoaded(messages)).await;
        self.refresh_context().await;
        Ok(())
    }

    /// refresh_context publishes the server's context usage. Failures are
    /// only logged.
    pub async fn refresh_context(&self) {
        if self.generation.is_active() {
            log::debug!("refuse to fetch context string - currently generating");
            return;
        }

        match self.backend.context_string().await {
            Ok(text) => self.emit(Event::ContextString(text)).await,
            Err(err) => log::error!("updating context string: {:#}", err),
        }
    }

    /// attach_files reads the files as text and returns them fenced as code
    /// blocks, ready to be appended to the draft.
    pub async fn attach_files(&self, paths: &[PathBuf]) -> Result<String> {
        let mut ret = String::new();
        for path in paths {
            let content = tokio::fs::read_to_string(path)
                .await
                .wrap_err(format!("reading {}", path.display()))?;
            ret.push_str(&fence(&content));
        }
        Ok(ret)
    }

    async fn stream_reply(
        &self,
        ticket: &Ticket,
        mut stream: BoxChunkStream,
        message_id: &str,
        prefix: Option<&str>,
    ) -> Result<()> {
        let sink = TranscriptSink {
            controller: self,
            message_id,
        };

        tokio::select! {
            _ = ticket.token().cancelled() => {
                log::info!("Generation {} cancelled", ticket.id());
                Ok(())
            }
            report = stream_to_message(stream.as_mut(), &sink, prefix) => {
                let report = report.wrap_err("streaming reply")?;
                for failure in &report.failures {
                    if let Err(err) = &failure.result {
                        log::warn!("Dropped undecodable unit {:?}: {}", failure.unit, err);
                    }
                }
                log::debug!("Streamed {} characters", report.text.chars().count());
                Ok(())
            }
        }
    }

    async fn finish(&self, ticket: &Ticket) {
        if self.generation.end(ticket) {
            self.emit(Event::GenerationFinished).await;
        }
        self.refresh_context().await;
    }

    fn check_length(&self, text: &str) -> Result<(), ControllerError> {
        if text.chars().count() > self.max_input_length {
            return Err(ControllerError::InputTooLong {
                max: self.max_input_length,
            });
        }
        Ok(())
    }

    async fn push_message(&self, message: Message) {
        self.transcript().push(message.clone());
        self.emit(Event::MessageAdded(message)).await;
    }

    async fn emit(&self, event: Event) {
        self.event_tx.send(event).await.unwrap_or_else(|err| {
            log::error!("Failed to send event: {}", err);
        });
    }

    fn transcript(&self) -> MutexGuard<'_, Transcript> {
        self.transcript.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct TranscriptSink<'a> {
    controller: &'a Controller,
    message_id: &'a str,
}

#[async_trait]
impl MessageSink for TranscriptSink<'_> {
    async fn update(&self, text: &str) -> Result<()> {
        let updated = self.controller.transcript().update(self.message_id, text);
        if !updated {
            return Ok(());
        }
        self.controller
            .emit(Event::MessageUpdated {
                id: self.message_id.to_string(),
                text: text.to_string(),
            })
            .await;
        Ok(())
    }
}

pub fn fence(content: &str) -> String {
    format!("```\n{}\n```\n\n", content)
}
