#[cfg(test)]
#[path = "generation_test.rs"]
mod tests;

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("a generation is already in progress")]
    Busy,
}

/// Handed out by [`GenerationState::try_begin`]. The token is cancelled when
/// the generation is aborted.
#[derive(Debug, Clone)]
pub struct Ticket {
    id: u64,
    token: CancellationToken,
}

impl Ticket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// GenerationState guards the single generation that may run at a time.
#[derive(Debug, Default)]
pub struct GenerationState {
    next_id: AtomicU64,
    active: Mutex<Option<Ticket>>,
}

impl GenerationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(&self) -> Result<Ticket, GenerationError> {
        let mut active = self.lock();
        if active.is_some() {
            return Err(GenerationError::Busy);
        }
        let ticket = Ticket {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            token: CancellationToken::new(),
        };
        *active = Some(ticket.clone());
        log::debug!("Set generating state: true ({})", ticket.id);
        Ok(ticket)
    }

    /// end clears the state if `ticket` still owns it. A generation that was
    /// aborted, and possibly replaced by a newer one, ends as a no-op.
    pub fn end(&self, ticket: &Ticket) -> bool {
        let mut active = self.lock();
        if active.as_ref().is_some_and(|t| t.id == ticket.id) {
            *active = None;
            log::debug!("Set generating state: false ({})", ticket.id);
            return true;
        }
        false
    }

    /// abort cancels whatever generation is running and clears the state.
    pub fn abort(&self) -> bool {
        match self.lock().take() {
            Some(ticket) => {
                ticket.token.cancel();
                log::debug!("Aborted generation {}", ticket.id);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Ticket>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}
