//! Chat session management.
//!
//! A `ChatSession` owns the transcript and mediates every user turn: it
//! validates the input, appends the user entry and a pending placeholder,
//! sends the question to the answer service in the background, and swaps the
//! placeholder for the answer (or an error entry) when the call resolves.
//!
//! Submissions are single-flight. The input affordance is disabled while a
//! call is in flight and re-enabled by a guard that is released on every
//! exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{AnswerService, ContextRegistry};
use crate::error::ChatError;
use crate::render::render;
use crate::state::{
    ChatRequest, ContextOption, MessageId, Role, Transcript, CONNECTION_ERROR_TEXT,
    GENERAL_CONTEXT, NO_ANSWER_TEXT,
};

const EVENT_CAPACITY: usize = 64;

/// UI events, expressed as commands for the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SubmitClicked { text: String },
    ContextChanged { context_id: String },
}

/// Change notifications for front-ends observing the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptEvent {
    Appended(MessageId),
    Removed(MessageId),
    InputEnabled(bool),
    /// Number of loaded contexts, not counting the general option
    ContextsLoaded(usize),
}

/// Whether the user may submit, shared with the in-flight guard
#[derive(Clone)]
struct InputGate {
    enabled: Arc<AtomicBool>,
    events: broadcast::Sender<TranscriptEvent>,
}

impl InputGate {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn open(&self) {
        if !self.enabled.swap(true, Ordering::AcqRel) {
            let _ = self.events.send(TranscriptEvent::InputEnabled(true));
        }
    }
}

/// Keeps input disabled for as long as it lives
struct InFlightGuard {
    gate: InputGate,
}

impl InFlightGuard {
    /// Returns `None` if input is already disabled.
    fn acquire(gate: &InputGate) -> Option<Self> {
        if gate
            .enabled
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let _ = gate.events.send(TranscriptEvent::InputEnabled(false));
        Some(Self { gate: gate.clone() })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gate.open();
    }
}

type ContextsTask = JoinHandle<Result<Vec<ContextOption>, ChatError>>;

struct InFlight {
    pending: MessageId,
    task: JoinHandle<Result<String, ChatError>>,
    guard: InFlightGuard,
}

pub struct ChatSession {
    answers: Arc<dyn AnswerService>,
    registry: Arc<dyn ContextRegistry>,
    transcript: Transcript,
    /// Selectable contexts; the general option is always first.
    contexts: Vec<ContextOption>,
    selected_context: String,
    contexts_loaded: bool,
    contexts_task: Option<ContextsTask>,
    gate: InputGate,
    in_flight: Option<InFlight>,
}

impl ChatSession {
    /// Input starts disabled; load the contexts with
    /// [`ChatSession::load_contexts`] or [`ChatSession::begin_loading_contexts`]
    /// to enable it.
    pub fn new(answers: Arc<dyn AnswerService>, registry: Arc<dyn ContextRegistry>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            answers,
            registry,
            transcript: Transcript::new(),
            contexts: vec![ContextOption::general()],
            selected_context: GENERAL_CONTEXT.to_string(),
            contexts_loaded: false,
            contexts_task: None,
            gate: InputGate {
                enabled: Arc::new(AtomicBool::new(false)),
                events,
            },
            in_flight: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.gate.events.subscribe()
    }

    fn emit(&self, event: TranscriptEvent) {
        // No subscribers is fine
        let _ = self.gate.events.send(event);
    }

    /// Start fetching the selectable contexts in the background. Returns
    /// `false` if contexts are already loaded or being loaded; the set is
    /// fetched once per session.
    ///
    /// Must be called from within a tokio runtime.
    pub fn begin_loading_contexts(&mut self) -> bool {
        if self.contexts_loaded || self.contexts_task.is_some() {
            debug!("contexts already requested");
            return false;
        }

        let registry = Arc::clone(&self.registry);
        self.contexts_task = Some(tokio::spawn(async move { registry.list().await }));
        true
    }

    /// Apply the context list if the registry has already answered.
    /// Returns `true` if contexts were applied.
    pub async fn poll_contexts(&mut self) -> bool {
        let finished = self
            .contexts_task
            .as_ref()
            .is_some_and(|task| task.is_finished());
        if !finished {
            return false;
        }
        self.finish_loading_contexts().await
    }

    /// Fetch the selectable contexts and enable input. Later calls are no-ops.
    ///
    /// A registry failure is logged and leaves only the general option.
    pub async fn load_contexts(&mut self) {
        self.begin_loading_contexts();
        self.finish_loading_contexts().await;
    }

    async fn finish_loading_contexts(&mut self) -> bool {
        let joined = match self.contexts_task.as_mut() {
            Some(task) => task.await,
            None => return false,
        };
        self.contexts_task = None;

        let loaded = match joined.map_err(ChatError::from).and_then(|listed| listed) {
            Ok(options) => {
                info!(count = options.len(), "contexts loaded");
                options
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "failed to load contexts");
                Vec::new()
            }
        };

        self.contexts = std::iter::once(ContextOption::general())
            .chain(loaded.into_iter().filter(|option| !option.is_general()))
            .collect();

        if !self.contexts.iter().any(|c| c.id == self.selected_context) {
            self.selected_context = GENERAL_CONTEXT.to_string();
        }

        self.contexts_loaded = true;
        self.emit(TranscriptEvent::ContextsLoaded(self.contexts.len() - 1));

        if self.in_flight.is_none() {
            self.gate.open();
        }
        true
    }

    /// Start a turn. Returns `false` when nothing was submitted: blank input,
    /// or input currently disabled. The answer is applied later by
    /// [`ChatSession::poll_reply`] or [`ChatSession::wait_for_reply`].
    ///
    /// Must be called from within a tokio runtime; the answer call is
    /// spawned onto it.
    pub fn submit(&mut self, raw_text: &str, selected_context: Option<&str>) -> bool {
        let text = raw_text.trim();
        if text.is_empty() {
            return false;
        }

        let Some(guard) = InFlightGuard::acquire(&self.gate) else {
            debug!("submission rejected while input is disabled");
            return false;
        };

        let user = self.transcript.push(Role::User, text, None);
        self.emit(TranscriptEvent::Appended(user));
        let pending = self.transcript.push(Role::Pending, "", None);
        self.emit(TranscriptEvent::Appended(pending));

        let request = ChatRequest::new(text, selected_context);
        debug!(
            contextual = request.is_contextual(),
            context_id = request.context_id.as_deref().unwrap_or(GENERAL_CONTEXT),
            "submitting turn"
        );

        let answers = Arc::clone(&self.answers);
        let task = tokio::spawn(async move { answers.ask(&request).await });

        self.in_flight = Some(InFlight {
            pending,
            task,
            guard,
        });
        true
    }

    /// Apply the in-flight answer if it has already arrived.
    /// Returns `true` if the transcript changed.
    pub async fn poll_reply(&mut self) -> bool {
        let finished = self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.task.is_finished());
        if !finished {
            return false;
        }
        self.wait_for_reply().await
    }

    /// Wait for the in-flight answer and apply it.
    /// Returns `false` if nothing was in flight.
    pub async fn wait_for_reply(&mut self) -> bool {
        let joined = match self.in_flight.as_mut() {
            Some(in_flight) => (&mut in_flight.task).await,
            None => return false,
        };

        let Some(InFlight { pending, guard, .. }) = self.in_flight.take() else {
            return false;
        };

        let outcome = joined.map_err(ChatError::from).and_then(|answer| answer);
        self.resolve(pending, outcome);

        // Re-enable only once the transcript is settled
        drop(guard);
        true
    }

    fn resolve(&mut self, pending: MessageId, outcome: Result<String, ChatError>) {
        if self.transcript.remove(pending).is_some() {
            self.emit(TranscriptEvent::Removed(pending));
        }

        let id = match outcome {
            Ok(answer) if answer.trim().is_empty() => {
                info!("backend returned an empty answer");
                self.transcript.push(Role::Assistant, NO_ANSWER_TEXT, None)
            }
            Ok(answer) => {
                let html = render(&answer);
                self.transcript.push(Role::Assistant, answer, Some(html))
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "chat request failed");
                self.transcript.push(Role::Error, CONNECTION_ERROR_TEXT, None)
            }
        };
        self.emit(TranscriptEvent::Appended(id));
    }

    /// Handle a UI command. Returns `true` if the command took effect.
    pub fn dispatch(&mut self, command: Command) -> bool {
        match command {
            Command::SubmitClicked { text } => {
                let selected = self.selected_context.clone();
                self.submit(&text, Some(&selected))
            }
            Command::ContextChanged { context_id } => self.select_context(&context_id),
        }
    }

    /// Select one of the loaded contexts. Unknown ids are ignored.
    pub fn select_context(&mut self, context_id: &str) -> bool {
        if self.contexts.iter().any(|c| c.id == context_id) {
            self.selected_context = context_id.to_string();
            true
        } else {
            warn!(context_id, "ignoring unknown context");
            false
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn contexts(&self) -> &[ContextOption] {
        &self.contexts
    }

    pub fn selected_context(&self) -> &str {
        &self.selected_context
    }

    pub fn selected_context_option(&self) -> Option<&ContextOption> {
        self.contexts.iter().find(|c| c.id == self.selected_context)
    }

    pub fn contexts_loaded(&self) -> bool {
        self.contexts_loaded
    }

    pub fn is_input_enabled(&self) -> bool {
        self.gate.is_enabled()
    }

    pub fn is_waiting(&self) -> bool {
        self.in_flight.is_some()
    }
}
