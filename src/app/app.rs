#[cfg(test)]
#[path = "app_test.rs"]
mod tests;

use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use eyre::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::models::Event;
use crate::{notice_error, notice_info, notice_warning};

use super::clipboard;
use super::command::{self, HELP, UserCommand};
use super::controller::Controller;
use super::renderer::Renderer;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Quit,
    EndOfInput,
}

/// App reads user lines, dispatches them to the [`Controller`] and renders
/// the events it publishes.
pub struct App<W: Write> {
    controller: Arc<Controller>,
    event_tx: mpsc::UnboundedSender<Event>,
    event_rx: mpsc::UnboundedReceiver<Event>,
    renderer: Renderer<W>,
    draft: String,
    tasks: JoinSet<()>,
    cancel_token: CancellationToken,
}

impl<W: Write> App<W> {
    pub fn new(
        controller: Arc<Controller>,
        event_tx: mpsc::UnboundedSender<Event>,
        event_rx: mpsc::UnboundedReceiver<Event>,
        renderer: Renderer<W>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            controller,
            event_tx,
            event_rx,
            renderer,
            draft: String::new(),
            tasks: JoinSet::new(),
            cancel_token,
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn into_renderer(self) -> Renderer<W> {
        self.renderer
    }

    pub async fn run<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        if let Err(err) = self.controller.load_conversation().await {
            log::error!("Failed to load conversation: {:#}", err);
            self.notify(notice_error!(format!("Failed to load conversation: {}", err)));
        }

        let result = self.start_loop(input).await;
        let exit = match &result {
            Ok(exit) => *exit,
            Err(_) => Exit::Quit,
        };
        self.shutdown(exit).await?;
        self.cancel_token.cancel();
        result.map(|_| ())
    }

    async fn start_loop<R>(&mut self, input: R) -> Result<Exit>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    log::debug!("App cancelled");
                    return Ok(Exit::Quit);
                }

                Ok(()) = tokio::signal::ctrl_c() => {
                    if !self.controller.is_generating() {
                        return Ok(Exit::Quit);
                    }
                    self.spawn_action("cancel", |c| async move { c.cancel().await });
                }

                line = lines.next_line() => {
                    let Some(line) = line? else {
                        return Ok(Exit::EndOfInput);
                    };
                    if self.handle_line(line).await {
                        return Ok(Exit::Quit);
                    }
                }

                Some(event) = self.event_rx.recv() => {
                    self.renderer.render(&event)?;
                }

                Some(res) = self.tasks.join_next() => {
                    if let Err(err) = res {
                        log::error!("Task error: {}", err);
                    }
                }
            }
        }
    }

    /// handle_line runs one line of user input. It returns true when the user
    /// asked to quit.
    async fn handle_line(&mut self, line: String) -> bool {
        if let Some(rest) = line.strip_suffix('\\') {
            self.draft.push_str(rest);
            self.draft.push('\n');
            return false;
        }

        let cmd = match command::parse(&line) {
            Ok(cmd) => cmd,
            Err(err) => {
                self.notify(notice_error!(err.to_string()));
                return false;
            }
        };
        log::debug!("Command: {:?}", cmd);

        match cmd {
            UserCommand::Submit(text) => {
                if self.controller.is_generating() {
                    // Submitting while a reply streams only stops it.
                    self.draft.push_str(&text);
                    self.spawn_action("cancel", |c| async move { c.cancel().await });
                    return false;
                }
                let input = self.take_draft(&text);
                self.spawn_action("submit", move |c| async move { c.submit(&input).await });
            }
            UserCommand::New(prefix) => {
                if self.controller.is_generating() {
                    self.notify(notice_warning!("A reply is already being generated"));
                    return false;
                }
                let prefix = prefix.or_else(|| self.take_prefix());
                self.spawn_action("new message", move |c| async move {
                    c.new_bot_message(prefix).await
                });
            }
            UserCommand::Cancel => {
                self.spawn_action("cancel", |c| async move { c.cancel().await });
            }
            UserCommand::Remove => {
                self.spawn_action("remove", |c| async move { c.remove_last().await });
            }
            UserCommand::Swipe => {
                let prefix = self.take_prefix();
                self.spawn_action("swipe", move |c| async move { c.swipe(prefix).await });
            }
            UserCommand::Reset => {
                self.draft.clear();
                self.spawn_action("reset", |c| async move { c.reset().await });
            }
            UserCommand::Summarize => {
                self.spawn_action("summarize", |c| async move {
                    c.summarize().await.map(|_| ())
                });
            }
            UserCommand::Upload(paths) => match self.controller.attach_files(&paths).await {
                Ok(text) => {
                    self.draft.push_str(&text);
                    self.notify(notice_info!(format!(
                        "Attached {} file(s), send a message to submit them",
                        paths.len()
                    )));
                }
                Err(err) => {
                    log::error!("Failed to attach files: {:#}", err);
                    self.notify(notice_error!(format!("{:#}", err)));
                }
            },
            UserCommand::Copy => self.copy_last_bot_message(),
            UserCommand::Reload => {
                self.spawn_action("reload", |c| async move { c.load_conversation().await });
            }
            UserCommand::Help => {
                if let Err(err) = self.renderer.help(HELP) {
                    log::error!("Failed to print help: {}", err);
                }
            }
            UserCommand::Quit => return true,
        }
        false
    }

    fn copy_last_bot_message(&mut self) {
        let Some(text) = self.controller.last_bot_message() else {
            self.notify(notice_warning!("Nothing to copy"));
            return;
        };

        match clipboard::set(text) {
            Ok(_) => self.notify(notice_info!("Copied to clipboard!")),
            Err(err) => {
                log::error!("Failed to copy message: {}", err);
                self.notify(notice_error!(format!("Failed to copy message: {}", err)));
            }
        }
    }

    fn spawn_action<F, Fut>(&mut self, name: &'static str, action: F)
    where
        F: FnOnce(Arc<Controller>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let controller = Arc::clone(&self.controller);
        let event_tx = self.event_tx.clone();
        let fut = action(controller);
        self.tasks.spawn(async move {
            if let Err(err) = fut.await {
                log::error!("{} failed: {:#}", name, err);
                if let Err(err) = event_tx.send(notice_error!(format!("{} failed: {}", name, err))) {
                    log::error!("Failed to send notice: {}", err);
                }
            }
        });
    }

    fn take_draft(&mut self, line: &str) -> String {
        let mut text = std::mem::take(&mut self.draft);
        text.push_str(line);
        text
    }

    fn take_prefix(&mut self) -> Option<String> {
        Some(std::mem::take(&mut self.draft)).filter(|p| !p.is_empty())
    }

    fn notify(&self, event: Event) {
        if let Err(err) = self.event_tx.send(event) {
            log::error!("Failed to send notice: {}", err);
        }
    }

    async fn shutdown(&mut self, exit: Exit) -> Result<()> {
        if exit == Exit::Quit && self.controller.is_generating() {
            if let Err(err) = self.controller.cancel().await {
                log::error!("Failed to cancel generation on exit: {:#}", err);
            }
        }

        let tasks = &mut self.tasks;
        let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(err) = res {
                    log::error!("Task error: {}", err);
                }
            }
        })
        .await;
        if drained.is_err() {
            log::warn!("Shutdown timeout reached, aborting pending tasks");
            self.tasks.abort_all();
        }

        while let Ok(event) = self.event_rx.try_recv() {
            self.renderer.render(&event)?;
        }
        Ok(())
    }
}
