#[cfg(test)]
#[path = "webui_test.rs"]
mod tests;

use crate::backend::Backend;
use crate::config::{constants::DEFAULT_ENDPOINT, user_agent};
use crate::models::{Message, Role};
use crate::stream::{BoxChunkStream, DecodeError, HttpChunkStream, decode, encode};
use async_trait::async_trait;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebUiError {
    #[error("bad response from {endpoint}: {status} {reason}")]
    Status {
        endpoint: String,
        status: u16,
        reason: String,
    },

    #[error("decoding payload from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: DecodeError,
    },

    #[error("message {index} from /convo has no role")]
    EmptyMessage { index: usize },
}

/// Client for the chat WebUI server.
pub struct WebUi {
    endpoint: String,
    timeout: Option<time::Duration>,
    accept_invalid_certs: bool,
    client: reqwest::Client,
}

#[async_trait]
impl Backend for WebUi {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn submit(&self, prompt: String) -> Result<BoxChunkStream> {
        self.post_stream("/submit", encode(&prompt)).await
    }

    async fn trigger(&self, prefix: Option<String>) -> Result<BoxChunkStream> {
        let body = prefix.as_deref().map(encode).unwrap_or_default();
        self.post_stream("/trigger", body).await
    }

    async fn cancel(&self) -> Result<()> {
        self.post_ok("/cancel").await
    }

    async fn remove_last(&self) -> Result<()> {
        self.post_ok("/remove").await
    }

    async fn reset(&self) -> Result<()> {
        self.post_ok("/reset").await
    }

    async fn conversation(&self) -> Result<Vec<Message>> {
        let res = self.get("/convo").await?;
        let body = res.text().await.wrap_err("reading conversation")?;
        let convo = serde_json::from_str::<BTreeMap<usize, BTreeMap<String, String>>>(&body)
            .wrap_err(format!("parsing conversation: {}", body))?;

        let mut messages = Vec::with_capacity(convo.len());
        for (index, entry) in convo {
            let (role, content) = entry
                .into_iter()
                .next()
                .ok_or(WebUiError::EmptyMessage { index })?;
            let role = decode(&role).map_err(|e| decode_error("/convo", e))?;
            let content = decode(&content).map_err(|e| decode_error("/convo", e))?;
            messages.push(Message::new(Role::from(role.as_str()), content));
        }
        Ok(messages)
    }

    async fn context_string(&self) -> Result<String> {
        let res = self.get("/get_context_string").await?;
        let body = res.text().await.wrap_err("reading context string")?;
        let data = serde_json::from_str::<ContextStringResponse>(&body)
            .wrap_err(format!("parsing context string: {}", body))?;
        Ok(decode(&data.text).map_err(|e| decode_error("/get_context_string", e))?)
    }

    async fn summarize(&self) -> Result<String> {
        let res = self.get("/summarize").await?;
        let body = res.text().await.wrap_err("reading summary")?;
        Ok(decode(body.trim()).map_err(|e| decode_error("/summarize", e))?)
    }
}

impl WebUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// build recreates the http client from the current settings.
    pub fn build(mut self) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent())
            .danger_accept_invalid_certs(self.accept_invalid_certs);
        if let Some(timeout) = self.timeout {
            builder = builder.connect_timeout(timeout);
        }
        self.client = builder.build()?;
        Ok(self)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Option<time::Duration> {
        self.timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    // Only the connect timeout of the client applies to streamed bodies.
    async fn post_stream(&self, path: &str, body: String) -> Result<BoxChunkStream> {
        log::debug!("POST {} ({} bytes)", path, body.len());
        let res = self
            .client
            .post(self.url(path))
            .header("User-Agent", user_agent())
            .body(body)
            .send()
            .await
            .wrap_err(format!("sending request to {}", path))?;
        let res = check_status(path, res)?;
        Ok(Box::new(HttpChunkStream::new(res)))
    }

    async fn post_ok(&self, path: &str) -> Result<()> {
        log::debug!("POST {}", path);
        let mut req = self
            .client
            .post(self.url(path))
            .header("User-Agent", user_agent());
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let res = req
            .send()
            .await
            .wrap_err(format!("sending request to {}", path))?;
        check_status(path, res)?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        log::debug!("GET {}", path);
        let mut req = self
            .client
            .get(self.url(path))
            .header("User-Agent", user_agent());
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let res = req
            .send()
            .await
            .wrap_err(format!("sending request to {}", path))?;
        Ok(check_status(path, res)?)
    }
}

impl Default for WebUi {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: None,
            accept_invalid_certs: false,
            client: reqwest::Client::new(),
        }
    }
}

fn check_status(path: &str, res: reqwest::Response) -> Result<reqwest::Response, WebUiError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status();
    log::error!("Bad response from {}: {}", path, status);
    Err(WebUiError::Status {
        endpoint: path.to_string(),
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
    })
}

fn decode_error(path: &str, source: DecodeError) -> WebUiError {
    WebUiError::Decode {
        endpoint: path.to_string(),
        source,
    }
}

#[derive(Default, Debug, Serialize, Deserialize)]
struct ContextStringResponse {
    text: String,
}
