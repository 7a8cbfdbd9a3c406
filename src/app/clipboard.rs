use eyre::{Result, bail};
use once_cell::sync::OnceCell;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::verbose;

static SENDER: OnceCell<mpsc::UnboundedSender<String>> = OnceCell::new();

/// Runs the clipboard writer until `cancel_token` fires. Copy requests arrive
/// through [`set`].
pub async fn start(cancel_token: CancellationToken) -> Result<()> {
    verbose!("[+] Initializing clipboard service");
    let mut clipboard = arboard::Clipboard::new()?;
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    if SENDER.set(tx).is_err() {
        bail!("clipboard service is already running");
    }
    verbose!("[+] Clipboard service initialized");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log::debug!("Clipboard service cancelled");
                return Ok(());
            }
            text = rx.recv() => {
                let Some(text) = text else {
                    return Ok(());
                };
                if let Err(err) = clipboard.set_text(text) {
                    log::error!("Failed to write clipboard: {}", err);
                }
            }
        }
    }
}

pub fn set(text: impl Into<String>) -> Result<()> {
    if let Some(tx) = SENDER.get() {
        tx.send(text.into())?;
        return Ok(());
    }

    bail!("clipboard is not available")
}
