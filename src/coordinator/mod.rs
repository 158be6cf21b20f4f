//! # Session Coordinator
//!
//! One long-lived coordinator per interview. It owns the interview's session
//! registry, drives the transcribe → persist → generate → persist pipeline for
//! each audio submission and reports every step to attached connections.
//!
//! ## Pipeline states:
//! `Idle` → `AwaitingTranscription` → `AwaitingResponse` → `Idle`, published on
//! a watch channel. Audio submissions for the same interview run strictly one
//! at a time: later submissions wait on a fair lock and run in arrival order.
//!
//! ## Failure model:
//! Adapter failures, storage failures and cancellation abort only the current
//! submission. The originating connection receives an error event; nothing
//! half-finished is persisted and the coordinator stays usable.

pub mod directory;

pub use directory::CoordinatorDirectory;

use crate::generation::{prompt_for, ResponseGenerator};
use crate::provider::AdapterError;
use crate::session::{ConnectionHandle, ServerEvent, SessionRegistry};
use crate::store::{
    Interview, InterviewStatus, InterviewStore, InterviewTitle, InterviewWithMessages, Message,
    MessageRole, StoreError,
};
use crate::transcription::Transcriber;

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Where the audio pipeline currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    AwaitingTranscription,
    AwaitingResponse,
}

/// The two external collaborators a coordinator calls.
#[derive(Clone)]
pub struct Adapters {
    pub transcriber: Arc<dyn Transcriber>,
    pub generator: Arc<dyn ResponseGenerator>,
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Largest accepted audio submission (bytes)
    pub max_audio_bytes: usize,
}

/// Why one audio submission did not produce a full exchange.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("connection is not attached to this interview")]
    NotPaired,

    #[error("audio submission was empty")]
    EmptyAudio,

    #[error("audio submission of {size} bytes exceeds the {limit} byte limit")]
    AudioTooLarge { size: usize, limit: usize },

    #[error("interview {0} does not exist")]
    InterviewNotFound(String),

    #[error("interview is {0} and no longer accepts audio")]
    InterviewClosed(InterviewStatus),

    #[error("transcription failed: {0}")]
    Transcription(AdapterError),

    #[error("response generation failed: {0}")]
    Generation(AdapterError),

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Only adapter failures are worth resubmitting the same audio for.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Transcription(err) | PipelineError::Generation(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Text shown to the client in the error event.
    pub fn client_message(&self) -> String {
        match self {
            PipelineError::Transcription(AdapterError::Cancelled)
            | PipelineError::Generation(AdapterError::Cancelled) => {
                "Processing was cancelled. Please try again.".to_string()
            }
            PipelineError::Transcription(_) => {
                "Could not transcribe your audio. Please try again.".to_string()
            }
            PipelineError::Generation(_) => {
                "The interviewer could not respond. Please try again.".to_string()
            }
            PipelineError::Store(_) => "Failed to save the conversation.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result of one successful audio submission.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub user: Message,
    pub assistant: Message,
}

pub struct Coordinator {
    interview_id: String,
    store: InterviewStore,
    registry: SessionRegistry,
    adapters: Adapters,
    settings: CoordinatorSettings,
    pipeline_lock: Mutex<()>,
    state: watch::Sender<PipelineState>,
}

/// Puts the pipeline back to `Idle` however the run ends, including when the
/// future is dropped mid-flight.
struct IdleOnDrop<'a>(&'a watch::Sender<PipelineState>);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.send_replace(PipelineState::Idle);
    }
}

impl Coordinator {
    /// Build a coordinator for `interview_id`, making sure the schema exists.
    /// A schema failure is fatal for this coordinator only.
    pub async fn start(
        interview_id: impl Into<String>,
        store: InterviewStore,
        adapters: Adapters,
        settings: CoordinatorSettings,
    ) -> Result<Self, StoreError> {
        let interview_id = interview_id.into();
        store.blocking(|store| store.ensure_schema()).await?;

        let (state, _) = watch::channel(PipelineState::Idle);
        debug!(interview_id = %interview_id, "Coordinator started");

        Ok(Self {
            interview_id,
            store,
            registry: SessionRegistry::new(),
            adapters,
            settings,
            pipeline_lock: Mutex::new(()),
            state,
        })
    }

    pub fn interview_id(&self) -> &str {
        &self.interview_id
    }

    pub fn pipeline_state(&self) -> PipelineState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connections_for(&self.interview_id)
    }

    /// Register a connection and push the current interview to it.
    ///
    /// An unknown interview is logged and nothing is pushed. Storage failures
    /// are reported to the connection and returned; the pairing stays in place.
    pub async fn on_attach(&self, handle: ConnectionHandle) -> Result<(), StoreError> {
        let connection_id = handle.id();
        self.registry.attach(handle, &self.interview_id);
        info!(
            interview_id = %self.interview_id,
            connection_id = %connection_id,
            connections = self.connection_count(),
            "Connection attached to interview"
        );

        match self.load_interview().await {
            Ok(Some(details)) => {
                self.registry
                    .send_to(connection_id, &ServerEvent::details(details));
                Ok(())
            }
            Ok(None) => {
                warn!(
                    interview_id = %self.interview_id,
                    connection_id = %connection_id,
                    "Attached to an interview that does not exist"
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    interview_id = %self.interview_id,
                    connection_id = %connection_id,
                    "Failed to load interview on attach: {}",
                    err
                );
                self.registry.send_to(
                    connection_id,
                    &ServerEvent::error("Failed to load the interview."),
                );
                Err(err)
            }
        }
    }

    /// Remove a connection. Safe to call more than once.
    pub fn on_detach(&self, connection_id: Uuid) -> bool {
        let removed = self.registry.detach(connection_id);
        if removed {
            info!(
                interview_id = %self.interview_id,
                connection_id = %connection_id,
                connections = self.connection_count(),
                "Connection detached from interview"
            );
        }
        removed
    }

    /// Run the audio pipeline for one submission from `connection_id`.
    ///
    /// Every failure is also reported to that connection as an error event,
    /// except [`PipelineError::NotPaired`] which has nobody to report to here.
    pub async fn on_audio(
        &self,
        connection_id: Uuid,
        audio: Vec<u8>,
        cancel: CancellationToken,
    ) -> Result<Exchange, PipelineError> {
        match self.registry.interview_for(connection_id) {
            Some(interview_id) if interview_id == self.interview_id => {}
            _ => {
                warn!(
                    interview_id = %self.interview_id,
                    connection_id = %connection_id,
                    "Audio from a connection that is not attached"
                );
                return Err(PipelineError::NotPaired);
            }
        }

        let result = match self.check_audio(&audio) {
            Ok(()) => self.run_pipeline(connection_id, audio, &cancel).await,
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            warn!(
                interview_id = %self.interview_id,
                connection_id = %connection_id,
                retryable = err.is_retryable(),
                "Audio submission aborted: {}",
                err
            );
            self.registry
                .send_to(connection_id, &ServerEvent::error(err.client_message()));
        }
        result
    }

    fn check_audio(&self, audio: &[u8]) -> Result<(), PipelineError> {
        if audio.is_empty() {
            return Err(PipelineError::EmptyAudio);
        }
        if audio.len() > self.settings.max_audio_bytes {
            return Err(PipelineError::AudioTooLarge {
                size: audio.len(),
                limit: self.settings.max_audio_bytes,
            });
        }
        Ok(())
    }

    async fn run_pipeline(
        &self,
        connection_id: Uuid,
        audio: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<Exchange, PipelineError> {
        let _guard = tokio::select! {
            guard = self.pipeline_lock.lock() => guard,
            _ = cancel.cancelled() => return Err(PipelineError::Transcription(AdapterError::Cancelled)),
        };
        let _idle = IdleOnDrop(&self.state);

        let current = self
            .load_interview()
            .await?
            .ok_or_else(|| PipelineError::InterviewNotFound(self.interview_id.clone()))?;
        if current.interview.status.is_terminal() {
            return Err(PipelineError::InterviewClosed(current.interview.status));
        }

        // Stage one: speech to text.
        let user_message_id = Uuid::new_v4().to_string();
        self.broadcast(&ServerEvent::processing(
            &self.interview_id,
            &user_message_id,
            MessageRole::User,
        ));
        self.state.send_replace(PipelineState::AwaitingTranscription);
        debug!(
            interview_id = %self.interview_id,
            connection_id = %connection_id,
            message_id = %user_message_id,
            audio_bytes = audio.len(),
            "Transcribing audio"
        );

        let transcriber = Arc::clone(&self.adapters.transcriber);
        let transcript = cancellable(cancel, async move { transcriber.transcribe(audio).await })
            .await
            .map_err(PipelineError::Transcription)?;

        let user = self
            .persist(MessageRole::User, transcript, user_message_id)
            .await?;

        if current.interview.status == InterviewStatus::Created {
            self.mark_in_progress().await;
        }

        // Stage two: the interviewer's reply, with the user's words in context.
        let context = self
            .load_interview()
            .await?
            .ok_or_else(|| PipelineError::InterviewNotFound(self.interview_id.clone()))?;

        let assistant_message_id = Uuid::new_v4().to_string();
        self.broadcast(&ServerEvent::processing(
            &self.interview_id,
            &assistant_message_id,
            MessageRole::Assistant,
        ));
        self.state.send_replace(PipelineState::AwaitingResponse);

        let prompt = prompt_for(&context);
        debug!(
            interview_id = %self.interview_id,
            message_id = %assistant_message_id,
            turns = prompt.turns(),
            "Generating response"
        );
        let reply = cancellable(cancel, self.adapters.generator.generate(&prompt))
            .await
            .map_err(PipelineError::Generation)?;

        let assistant = self
            .persist(MessageRole::Assistant, reply, assistant_message_id)
            .await?;

        let interview_id = self.interview_id.clone();
        if let Err(err) = self
            .store
            .blocking(move |store| store.touch_interview(&interview_id))
            .await
        {
            warn!(interview_id = %self.interview_id, "Failed to bump interview timestamp: {}", err);
        }

        info!(
            interview_id = %self.interview_id,
            user_message_id = %user.id,
            assistant_message_id = %assistant.id,
            "Exchange completed"
        );
        Ok(Exchange { user, assistant })
    }

    async fn persist(
        &self,
        role: MessageRole,
        content: String,
        message_id: String,
    ) -> Result<Message, StoreError> {
        let interview_id = self.interview_id.clone();
        let message = self
            .store
            .blocking(move |store| store.add_message(&interview_id, role, &content, &message_id))
            .await?;
        self.broadcast(&ServerEvent::completed(&message));
        Ok(message)
    }

    async fn mark_in_progress(&self) {
        let interview_id = self.interview_id.clone();
        let updated = self
            .store
            .blocking(move |store| store.update_status(&interview_id, InterviewStatus::InProgress))
            .await;
        match updated {
            Ok(_) => {}
            // Someone else moved it on in the meantime.
            Err(StoreError::InvalidTransition { .. }) => {}
            Err(err) => {
                warn!(interview_id = %self.interview_id, "Failed to start interview: {}", err);
            }
        }
    }

    fn broadcast(&self, event: &ServerEvent) {
        let delivered = self.registry.broadcast(&self.interview_id, event);
        debug!(
            interview_id = %self.interview_id,
            event = event.kind(),
            delivered,
            "Event broadcast"
        );
    }

    async fn load_interview(&self) -> Result<Option<InterviewWithMessages>, StoreError> {
        let interview_id = self.interview_id.clone();
        self.store
            .blocking(move |store| store.get_interview(&interview_id))
            .await
    }

    /// Persist a message, then notify every connection on that interview.
    /// Broadcast is best effort and never undoes the write.
    pub async fn add_message(
        &self,
        interview_id: &str,
        role: MessageRole,
        content: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Result<Message, StoreError> {
        let (id, content, message_id) = (interview_id.to_string(), content.into(), message_id.into());
        let message = self
            .store
            .blocking(move |store| store.add_message(&id, role, &content, &message_id))
            .await?;
        self.registry
            .broadcast(interview_id, &ServerEvent::completed(&message));
        Ok(message)
    }

    pub async fn create_interview(
        &self,
        title: InterviewTitle,
        skills: Vec<String>,
    ) -> Result<Interview, StoreError> {
        self.store
            .blocking(move |store| store.create_interview(title, &skills))
            .await
    }

    pub async fn list_interviews(&self) -> Result<Vec<Interview>, StoreError> {
        self.store.blocking(|store| store.list_interviews()).await
    }

    /// Re-send the current interview to every attached connection.
    /// Returns `false` if the interview does not exist.
    pub async fn publish_details(&self) -> Result<bool, StoreError> {
        match self.load_interview().await? {
            Some(details) => {
                self.broadcast(&ServerEvent::details(details));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Await an adapter call unless `cancel` fires first.
async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T, AdapterError>
where
    F: Future<Output = Result<T, AdapterError>>,
{
    tokio::select! {
        result = call => result,
        _ = cancel.cancelled() => Err(AdapterError::Cancelled),
    }
}
