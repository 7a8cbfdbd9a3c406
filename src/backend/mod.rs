pub mod webui;

pub use webui::{WebUi, WebUiError};

#[cfg(test)]
use mockall::automock;

use crate::{
    config::{ServerConfig, verbose},
    models::Message,
    stream::BoxChunkStream,
};
use async_trait::async_trait;
use eyre::{Context, Result};
use std::sync::Arc;

/// The HTTP surface of the chat WebUI server. The server owns the
/// conversation; the client only asks it to change and streams its replies.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait Backend {
    fn name(&self) -> &str;

    /// Adds a user message and streams the bot reply.
    async fn submit(&self, prompt: String) -> Result<BoxChunkStream>;

    /// Streams a bot message, continuing from `prefix` when given.
    async fn trigger(&self, prefix: Option<String>) -> Result<BoxChunkStream>;

    async fn cancel(&self) -> Result<()>;
    async fn remove_last(&self) -> Result<()>;
    async fn reset(&self) -> Result<()>;

    /// The full conversation, system prompt included.
    async fn conversation(&self) -> Result<Vec<Message>>;

    async fn context_string(&self) -> Result<String>;
    async fn summarize(&self) -> Result<String>;
}

pub type ArcBackend = Arc<dyn Backend + Send + Sync>;

pub fn new_backend(config: &ServerConfig) -> Result<ArcBackend> {
    verbose!("  [+] Connecting to {}", config.endpoint);
    let mut webui = WebUi::new()
        .with_endpoint(&config.endpoint)
        .with_accept_invalid_certs(config.accept_invalid_certs);
    if let Some(timeout) = config.timeout() {
        webui = webui.with_timeout(timeout);
    }
    let webui = webui.build().wrap_err("building http client")?;
    log::debug!("Using WebUI backend at {}", webui.endpoint());
    Ok(Arc::new(webui))
}
