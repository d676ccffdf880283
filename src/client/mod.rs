pub mod transport;

pub use transport::{ DirectTransport, HttpRelayTransport, RelayTransport, TransportError };

use crate::config::Configuration;
use crate::models::chat::{ Transcript, Turn };
use crate::models::relay::RelayRequest;
use log::{ info, warn };
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError };
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("A request is already in flight")]
    Busy,
}

#[derive(Debug, Default)]
struct SessionState {
    transcript: Transcript,
    input: String,
    busy: bool,
    config: Configuration,
}

/// Clears the busy flag if a send exits before appending its reply, e.g. when
/// the send future is dropped. Disarmed by the append itself, so it can never
/// clear a flag set by a later send.
struct BusyGuard<'a> {
    state: &'a Mutex<SessionState>,
    armed: bool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.lock().unwrap_or_else(PoisonError::into_inner).busy = false;
        }
    }
}

/// One conversation with the model server.
///
/// Owns the transcript for as long as the session lives. At most one send is in
/// flight; a second send while busy is refused with [`SendError::Busy`].
pub struct ChatSession {
    id: String,
    state: Mutex<SessionState>,
    transport: Arc<dyn RelayTransport>,
    updates: watch::Sender<usize>,
}

impl ChatSession {
    pub fn new(config: Configuration, transport: Arc<dyn RelayTransport>) -> Self {
        let (updates, _) = watch::channel(0);
        let id = Uuid::new_v4().to_string();
        info!("Opened chat session {} (model={})", id, config.model);
        Self {
            id,
            state: Mutex::new(SessionState { config, ..SessionState::default() }),
            transport,
            updates,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transcript(&self) -> Transcript {
        self.lock().transcript.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    pub fn config(&self) -> Configuration {
        self.lock().config.clone()
    }

    pub fn set_model(&self, model: impl Into<String>) {
        self.lock().config.model = model.into();
    }

    pub fn set_upstream_base_url(&self, base_url: impl Into<String>) {
        self.lock().config.upstream_base_url = base_url.into();
    }

    pub fn input(&self) -> String {
        self.lock().input.clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.lock().input = text.into();
    }

    /// Receives the transcript length after every append. Presentation layers
    /// use it to scroll to the latest turn.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.updates.subscribe()
    }

    /// Sends the pending input buffer.
    pub async fn submit(&self) -> Result<Turn, SendError> {
        let text = self.input();
        self.send_turn(&text).await
    }

    /// Appends `text` as a user turn, relays the whole transcript and appends
    /// the reply. Relay failures become an assistant turn describing the error,
    /// so the returned turn is always the one that was appended.
    pub async fn send_turn(&self, text: &str) -> Result<Turn, SendError> {
        if text.trim().is_empty() {
            return Err(SendError::EmptyInput);
        }

        let (request, len) = {
            let mut state = self.lock();
            if state.busy {
                return Err(SendError::Busy);
            }
            state.transcript.push(Turn::user(text));
            state.input.clear();
            state.busy = true;
            let request = RelayRequest::new(state.config.model.clone(), state.transcript.clone())
                .with_base_url(state.config.upstream_base_url.clone());
            (request, state.transcript.len())
        };
        let mut busy = BusyGuard { state: &self.state, armed: true };
        self.updates.send_replace(len);

        let reply = match self.transport.send(request).await {
            Ok(content) => Turn::assistant(content),
            Err(e) => {
                warn!("Session {}: relay failed: {}", self.id, e);
                Turn::assistant(format!("Error connecting to Ollama: {}", e))
            }
        };

        let len = {
            let mut state = self.lock();
            state.transcript.push(reply.clone());
            state.busy = false;
            busy.armed = false;
            state.transcript.len()
        };
        self.updates.send_replace(len);

        Ok(reply)
    }
}
