use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::backend::{BackendAdapter, BoxedBackend};
use super::context::{self, DEFAULT_MAX_CONTEXT_CHARS};
use super::db::Persistence;
use super::events::StreamEvent;
use super::language;
use super::memory::ConversationMemoryStore;
use super::models::{PersonaPrompt, Role, Turn};

/// Written as the assistant's reply and sent to the client whenever a
/// turn fails, whatever the cause.
pub const APOLOGY: &str = "抱歉，AI服务出现错误，请稍后重试。";

/// Returned by `summarize` when no summary could be generated.
pub const SUMMARY_PLACEHOLDER: &str = "会话摘要";

const SUMMARY_HISTORY_TURNS: usize = 10;

/// Where the prior turns of a conversation come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContextSource {
    /// Rebuild a bounded window from the durable log every turn.
    #[default]
    History,
    /// Send the in-memory transcript as is. A transcript that isn't in
    /// memory is loaded from the durable log first.
    Transcript,
}

impl FromStr for ContextSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "history" => Ok(ContextSource::History),
            "transcript" => Ok(ContextSource::Transcript),
            other => Err(anyhow!("Unknown context source: {}", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    Created,
    Streaming,
    Finalizing,
    Completed,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum TurnFailure {
    #[error("backend is not configured")]
    BackendUnavailable,
    #[error("backend failed: {0:#}")]
    BackendFailure(Error),
    #[error("client disconnected")]
    Cancelled,
    #[error("persistence failed: {0:#}")]
    Persistence(Error),
}

#[derive(Debug)]
pub struct TurnOutcome {
    pub state: TurnState,
    /// ID of the assistant message, if one was created.
    pub message_id: Option<String>,
}

/// Drives one user turn end to end: persists the user message, builds
/// the context, streams the backend's reply to the client as
/// `StreamEvent`s and records the final reply.
///
/// A coordinator handles exactly one turn. Use
/// `CoordinatorBuilder::new()` to construct one.
pub struct ResponseStreamCoordinator {
    persistence: Arc<dyn Persistence>,
    backend: BoxedBackend,
    memory: Arc<ConversationMemoryStore>,
    tx: mpsc::UnboundedSender<StreamEvent>,
    max_context_chars: usize,
    context_source: ContextSource,
    cancel: CancellationToken,
    state: TurnState,
}

impl ResponseStreamCoordinator {
    /// Handle the next user message in a conversation.
    ///
    /// The client always sees `MessageStart`, zero or more `Content`,
    /// then either `MessageEnd` or `Error`, and finally `Done`. If the
    /// turn can't be recorded at all there is no `MessageStart`.
    pub async fn handle_turn(
        mut self,
        conversation_id: &str,
        persona: &PersonaPrompt,
        session_override: Option<&str>,
        user_text: &str,
    ) -> TurnOutcome {
        let outcome = match self
            .prepare(conversation_id, persona, session_override, user_text)
            .await
        {
            Ok((context, message_id)) => {
                self.transition(TurnState::Streaming);
                self.emit(StreamEvent::MessageStart {
                    message_id: message_id.clone(),
                });
                let result = self.generate(&context).await;
                self.finish(conversation_id, user_text, &message_id, result)
                    .await;
                TurnOutcome {
                    state: self.state,
                    message_id: Some(message_id),
                }
            }
            Err(e) => {
                tracing::error!(
                    "Failed to start turn for conversation {}: {:#}",
                    conversation_id,
                    e
                );
                self.transition(TurnState::Failed);
                self.emit(StreamEvent::Error {
                    message: APOLOGY.to_string(),
                });
                TurnOutcome {
                    state: self.state,
                    message_id: None,
                }
            }
        };

        self.emit(StreamEvent::Done);
        outcome
    }

    /// Record the user message, build the context and create the empty
    /// assistant message. Returns the context and the assistant
    /// message ID.
    async fn prepare(
        &self,
        conversation_id: &str,
        persona: &PersonaPrompt,
        session_override: Option<&str>,
        user_text: &str,
    ) -> Result<(Vec<Turn>, String), Error> {
        // Fill a missing transcript before this turn's message lands
        // in the log so it isn't sent twice
        if self.context_source == ContextSource::Transcript
            && !self.memory.contains(conversation_id)
        {
            let history = self.persistence.load_history(conversation_id).await?;
            tracing::debug!(
                "Hydrating transcript for conversation {} with {} turns",
                conversation_id,
                history.len()
            );
            self.memory.hydrate(conversation_id, &history);
        }

        self.persistence
            .append_message(conversation_id, Role::User, user_text)
            .await?;
        self.persistence
            .touch_conversation(conversation_id, Utc::now())
            .await?;

        let mut context = match self.context_source {
            ContextSource::History => {
                let history = self.persistence.load_history(conversation_id).await?;
                context::build(persona, session_override, &history, self.max_context_chars)
            }
            ContextSource::Transcript => {
                let mut context = vec![context::system_turn(persona, session_override)];
                context.extend(self.memory.get(conversation_id).iter().map(Turn::from));
                context.push(Turn::user(user_text));
                context
            }
        };

        let lang = language::detect(user_text);
        tracing::debug!(
            "Detected language {} for conversation {}",
            lang,
            conversation_id
        );
        if let Some(system) = context.first_mut() {
            system.content.push_str("\n\n");
            system.content.push_str(lang.instruction());
        }

        let placeholder = self
            .persistence
            .append_message(conversation_id, Role::Assistant, "")
            .await?;

        Ok((context, placeholder.id))
    }

    /// Relay fragments from the backend to the client as they arrive
    /// and return the full reply.
    async fn generate(&self, context: &[Turn]) -> Result<String, TurnFailure> {
        if !self.backend.is_available() {
            return Err(TurnFailure::BackendUnavailable);
        }

        let mut fragments = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(TurnFailure::Cancelled),
            stream = self.backend.generate(context) => {
                stream.map_err(TurnFailure::BackendFailure)?
            }
        };

        let mut reply = String::new();
        let mut count = 0;
        loop {
            // Dropping `fragments` on cancellation abandons the request
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TurnFailure::Cancelled),
                next = fragments.next() => next,
            };
            match next {
                Some(Ok(fragment)) => {
                    count += 1;
                    reply.push_str(&fragment);
                    self.emit(StreamEvent::Content { content: fragment });
                }
                Some(Err(e)) => return Err(TurnFailure::BackendFailure(e)),
                None => break,
            }
        }

        tracing::debug!("Received {} fragments from backend", count);
        Ok(reply)
    }

    async fn finish(
        &mut self,
        conversation_id: &str,
        user_text: &str,
        message_id: &str,
        result: Result<String, TurnFailure>,
    ) {
        let result = match result {
            Ok(reply) => {
                self.transition(TurnState::Finalizing);
                self.persistence
                    .update_message_content(message_id, &reply)
                    .await
                    .map(|()| reply)
                    .map_err(TurnFailure::Persistence)
            }
            Err(failure) => Err(failure),
        };

        match result {
            Ok(reply) => {
                if let Err(e) = self
                    .persistence
                    .touch_conversation(conversation_id, Utc::now())
                    .await
                {
                    tracing::warn!(
                        "Failed to update last activity for conversation {}: {:#}",
                        conversation_id,
                        e
                    );
                }
                self.memory.append_user(conversation_id, user_text);
                self.memory.append_assistant(conversation_id, &reply);
                self.transition(TurnState::Completed);
                tracing::info!(
                    "Completed reply {} for conversation {} ({} chars)",
                    message_id,
                    conversation_id,
                    reply.chars().count()
                );
                self.emit(StreamEvent::MessageEnd {
                    message_id: message_id.to_string(),
                });
            }
            Err(failure) => {
                match &failure {
                    TurnFailure::Cancelled => tracing::info!(
                        "Client disconnected from conversation {}, abandoning reply {}",
                        conversation_id,
                        message_id
                    ),
                    other => tracing::error!(
                        "Reply {} for conversation {} failed: {}",
                        message_id,
                        conversation_id,
                        other
                    ),
                }
                if let Err(e) = self
                    .persistence
                    .update_message_content(message_id, APOLOGY)
                    .await
                {
                    tracing::error!(
                        "Failed to record apology for message {}: {:#}",
                        message_id,
                        e
                    );
                }
                self.transition(TurnState::Failed);
                self.emit(StreamEvent::Error {
                    message: APOLOGY.to_string(),
                });
            }
        }
    }

    fn transition(&mut self, next: TurnState) {
        tracing::debug!("Turn state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn emit(&self, event: StreamEvent) {
        // A closed receiver means the client went away; the turn still
        // runs to a terminal state so the log is consistent
        let _ = self.tx.send(event);
    }

    /// Best-effort summary of a conversation from its most recent
    /// turns. Never fails: falls back to `SUMMARY_PLACEHOLDER`.
    pub async fn summarize(
        persistence: &dyn Persistence,
        backend: &dyn BackendAdapter,
        conversation_id: &str,
        max_len: usize,
    ) -> String {
        if !backend.is_available() {
            return SUMMARY_PLACEHOLDER.to_string();
        }

        let history = match persistence.load_history(conversation_id).await {
            Ok(history) if !history.is_empty() => history,
            Ok(_) => return SUMMARY_PLACEHOLDER.to_string(),
            Err(e) => {
                tracing::error!(
                    "Failed to load history for summary of {}: {:#}",
                    conversation_id,
                    e
                );
                return SUMMARY_PLACEHOLDER.to_string();
            }
        };
        let recent = &history[history.len().saturating_sub(SUMMARY_HISTORY_TURNS)..];

        match backend.summarize(recent, max_len).await {
            Ok(summary) if !summary.trim().is_empty() => {
                summary.trim().chars().take(max_len).collect()
            }
            Ok(_) => SUMMARY_PLACEHOLDER.to_string(),
            Err(e) => {
                tracing::error!("Summary failed for {}: {:#}", conversation_id, e);
                SUMMARY_PLACEHOLDER.to_string()
            }
        }
    }
}

pub struct CoordinatorBuilder {
    persistence: Arc<dyn Persistence>,
    backend: BoxedBackend,
    memory: Arc<ConversationMemoryStore>,
    tx: mpsc::UnboundedSender<StreamEvent>,
    max_context_chars: usize,
    context_source: ContextSource,
    cancel: CancellationToken,
}

impl CoordinatorBuilder {
    pub fn new(
        persistence: Arc<dyn Persistence>,
        backend: BoxedBackend,
        memory: Arc<ConversationMemoryStore>,
        tx: mpsc::UnboundedSender<StreamEvent>,
    ) -> Self {
        Self {
            persistence,
            backend,
            memory,
            tx,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            context_source: ContextSource::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn max_context_chars(mut self, max_chars: usize) -> Self {
        self.max_context_chars = max_chars;
        self
    }

    pub fn context_source(mut self, source: ContextSource) -> Self {
        self.context_source = source;
        self
    }

    /// Abandon generation when `token` is cancelled, e.g. when the
    /// client disconnects.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn build(self) -> ResponseStreamCoordinator {
        ResponseStreamCoordinator {
            persistence: self.persistence,
            backend: self.backend,
            memory: self.memory,
            tx: self.tx,
            max_context_chars: self.max_context_chars,
            context_source: self.context_source,
            cancel: self.cancel,
            state: TurnState::Created,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::DateTime;
    use futures::stream;

    use crate::chat::backend::FragmentStream;
    use crate::chat::models::StoredMessage;

    #[derive(Default)]
    struct RecordingPersistence {
        messages: Mutex<Vec<StoredMessage>>,
        updates: Mutex<Vec<(String, String)>>,
        touches: AtomicUsize,
        fail_appends: bool,
    }

    impl RecordingPersistence {
        fn with_history(turns: &[(Role, &str)]) -> Self {
            let store = Self::default();
            {
                let mut messages = store.messages.lock().unwrap();
                for (idx, (role, content)) in turns.iter().enumerate() {
                    messages.push(StoredMessage {
                        id: format!("old{}", idx),
                        conversation_id: "c1".to_string(),
                        role: *role,
                        content: content.to_string(),
                        created_at: Utc::now(),
                    });
                }
            }
            store
        }

        fn updates(&self) -> Vec<(String, String)> {
            self.updates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Persistence for RecordingPersistence {
        async fn append_message(
            &self,
            conversation_id: &str,
            role: Role,
            content: &str,
        ) -> Result<StoredMessage, Error> {
            if self.fail_appends {
                return Err(anyhow!("disk full"));
            }
            let mut messages = self.messages.lock().unwrap();
            let msg = StoredMessage {
                id: format!("m{}", messages.len()),
                conversation_id: conversation_id.to_string(),
                role,
                content: content.to_string(),
                created_at: Utc::now(),
            };
            messages.push(msg.clone());
            Ok(msg)
        }

        async fn update_message_content(
            &self,
            message_id: &str,
            content: &str,
        ) -> Result<(), Error> {
            self.updates
                .lock()
                .unwrap()
                .push((message_id.to_string(), content.to_string()));
            let mut messages = self.messages.lock().unwrap();
            let msg = messages
                .iter_mut()
                .find(|m| m.id == message_id)
                .ok_or(anyhow!("missing message"))?;
            msg.content = content.to_string();
            Ok(())
        }

        async fn touch_conversation(
            &self,
            _conversation_id: &str,
            _last_activity: DateTime<Utc>,
        ) -> Result<(), Error> {
            self.touches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn load_history(&self, conversation_id: &str) -> Result<Vec<Turn>, Error> {
            Ok(self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.conversation_id == conversation_id)
                .cloned()
                .map(Turn::from)
                .collect())
        }
    }

    enum Script {
        Fragments(Vec<Result<&'static str, &'static str>>),
        // Yields the fragments then never finishes
        Hang(Vec<&'static str>),
    }

    struct ScriptedBackend {
        available: bool,
        script: Script,
        summary: Result<&'static str, &'static str>,
        calls: AtomicUsize,
        contexts: Mutex<Vec<Vec<Turn>>>,
    }

    impl ScriptedBackend {
        fn new(script: Script) -> Self {
            Self {
                available: true,
                script,
                summary: Ok("A chat about the sea"),
                calls: AtomicUsize::new(0),
                contexts: Mutex::new(Vec::new()),
            }
        }

        fn fragments(fragments: Vec<Result<&'static str, &'static str>>) -> Self {
            Self::new(Script::Fragments(fragments))
        }

        fn last_context(&self) -> Vec<Turn> {
            self.contexts.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl BackendAdapter for ScriptedBackend {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn generate(&self, context: &[Turn]) -> Result<FragmentStream, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.contexts.lock().unwrap().push(context.to_vec());
            let stream: FragmentStream = match &self.script {
                Script::Fragments(fragments) => {
                    let items: Vec<Result<String, Error>> = fragments
                        .iter()
                        .map(|f| f.map(String::from).map_err(|e| anyhow!(e)))
                        .collect();
                    Box::pin(stream::iter(items))
                }
                Script::Hang(fragments) => {
                    let items: Vec<Result<String, Error>> =
                        fragments.iter().map(|f| Ok(f.to_string())).collect();
                    Box::pin(stream::iter(items).chain(stream::pending()))
                }
            };
            Ok(stream)
        }

        async fn summarize(&self, history: &[Turn], _max_len: usize) -> Result<String, Error> {
            self.contexts.lock().unwrap().push(history.to_vec());
            self.summary.map(String::from).map_err(|e| anyhow!(e))
        }
    }

    fn persona() -> PersonaPrompt {
        PersonaPrompt::new("You are a pirate.", "Ahoy!")
    }

    async fn run_turn(
        persistence: Arc<RecordingPersistence>,
        backend: Arc<ScriptedBackend>,
        memory: Arc<ConversationMemoryStore>,
        source: ContextSource,
        user_text: &str,
    ) -> (TurnOutcome, Vec<StreamEvent>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = CoordinatorBuilder::new(persistence, backend, memory, tx)
            .context_source(source)
            .build()
            .handle_turn("c1", &persona(), None, user_text)
            .await;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (outcome, events)
    }

    #[tokio::test]
    async fn test_streams_and_persists_reply() {
        let persistence = Arc::new(RecordingPersistence::default());
        let backend = Arc::new(ScriptedBackend::fragments(vec![Ok("He"), Ok("llo")]));
        let memory = Arc::new(ConversationMemoryStore::new(8));

        let (outcome, events) = run_turn(
            persistence.clone(),
            backend.clone(),
            memory.clone(),
            ContextSource::History,
            "Hi",
        )
        .await;

        let id = outcome.message_id.clone().unwrap();
        assert_eq!(outcome.state, TurnState::Completed);
        assert_eq!(
            events,
            vec![
                StreamEvent::MessageStart {
                    message_id: id.clone()
                },
                StreamEvent::Content {
                    content: "He".to_string()
                },
                StreamEvent::Content {
                    content: "llo".to_string()
                },
                StreamEvent::MessageEnd {
                    message_id: id.clone()
                },
                StreamEvent::Done,
            ]
        );

        // Assistant message is written exactly once with the full reply
        assert_eq!(persistence.updates(), vec![(id, "Hello".to_string())]);
        // Once for the user turn, once for the reply
        assert_eq!(persistence.touches.load(Ordering::SeqCst), 2);

        let transcript = memory.get("c1");
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].content, "Hi");
        assert_eq!(transcript[1].content, "Hello");
    }

    #[tokio::test]
    async fn test_failure_mid_stream_records_apology() {
        let persistence = Arc::new(RecordingPersistence::default());
        let backend = Arc::new(ScriptedBackend::fragments(vec![
            Ok("Par"),
            Err("connection reset"),
        ]));
        let memory = Arc::new(ConversationMemoryStore::new(8));

        let (outcome, events) = run_turn(
            persistence.clone(),
            backend,
            memory.clone(),
            ContextSource::History,
            "Hi",
        )
        .await;

        let id = outcome.message_id.clone().unwrap();
        assert_eq!(outcome.state, TurnState::Failed);
        assert_eq!(
            events,
            vec![
                StreamEvent::MessageStart {
                    message_id: id.clone()
                },
                StreamEvent::Content {
                    content: "Par".to_string()
                },
                StreamEvent::Error {
                    message: APOLOGY.to_string()
                },
                StreamEvent::Done,
            ]
        );
        assert_eq!(persistence.updates(), vec![(id, APOLOGY.to_string())]);
        // The raw error never reaches the client
        assert!(!events.iter().any(|e| e.data().contains("connection reset")));
        assert!(!memory.contains("c1"));
    }

    #[tokio::test]
    async fn test_unavailable_backend_is_never_called() {
        let persistence = Arc::new(RecordingPersistence::default());
        let mut backend = ScriptedBackend::fragments(vec![Ok("unused")]);
        backend.available = false;
        let backend = Arc::new(backend);

        let (outcome, events) = run_turn(
            persistence.clone(),
            backend.clone(),
            Arc::new(ConversationMemoryStore::new(8)),
            ContextSource::History,
            "Hi",
        )
        .await;

        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.state, TurnState::Failed);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], StreamEvent::MessageStart { .. }));
        assert_eq!(
            events[1],
            StreamEvent::Error {
                message: APOLOGY.to_string()
            }
        );
        assert_eq!(events[2], StreamEvent::Done);
        assert_eq!(persistence.updates()[0].1, APOLOGY);
    }

    #[tokio::test]
    async fn test_setup_failure_still_terminates_stream() {
        let persistence = Arc::new(RecordingPersistence {
            fail_appends: true,
            ..Default::default()
        });
        let backend = Arc::new(ScriptedBackend::fragments(vec![Ok("unused")]));

        let (outcome, events) = run_turn(
            persistence,
            backend.clone(),
            Arc::new(ConversationMemoryStore::new(8)),
            ContextSource::History,
            "Hi",
        )
        .await;

        assert_eq!(outcome.state, TurnState::Failed);
        assert!(outcome.message_id.is_none());
        assert_eq!(
            events,
            vec![
                StreamEvent::Error {
                    message: APOLOGY.to_string()
                },
                StreamEvent::Done,
            ]
        );
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_history_context_with_language_instruction() {
        let persistence = Arc::new(RecordingPersistence::with_history(&[
            (Role::Assistant, "Ahoy!"),
            (Role::User, "Hello"),
            (Role::Assistant, "Arr"),
        ]));
        let backend = Arc::new(ScriptedBackend::fragments(vec![Ok("好")]));

        run_turn(
            persistence,
            backend.clone(),
            Arc::new(ConversationMemoryStore::new(8)),
            ContextSource::History,
            "你好世界",
        )
        .await;

        let context = backend.last_context();
        assert_eq!(context.len(), 5);
        assert_eq!(
            context[0].content,
            "You are a pirate.\n\nIMPORTANT: Always respond in Chinese (中文)."
        );
        assert_eq!(context[4].role, Role::User);
        assert_eq!(context[4].content, "你好世界");
    }

    #[tokio::test]
    async fn test_transcript_context_skips_durable_log() {
        let persistence = Arc::new(RecordingPersistence::with_history(&[(
            Role::User,
            "only in the log",
        )]));
        let backend = Arc::new(ScriptedBackend::fragments(vec![Ok("Aye")]));
        let memory = Arc::new(ConversationMemoryStore::new(8));
        memory.append_user("c1", "Hi");
        memory.append_assistant("c1", "Ahoy");

        run_turn(
            persistence,
            backend.clone(),
            memory.clone(),
            ContextSource::Transcript,
            "Ready?",
        )
        .await;

        let context = backend.last_context();
        let contents: Vec<&str> = context[1..].iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["Hi", "Ahoy", "Ready?"]);
        assert!(context[0].content.ends_with("Always respond in English."));
        assert_eq!(memory.get("c1").len(), 4);
    }

    #[tokio::test]
    async fn test_transcript_miss_hydrates_from_log() {
        let persistence = Arc::new(RecordingPersistence::with_history(&[
            (Role::Assistant, "Ahoy!"),
            (Role::User, "Hi"),
        ]));
        let backend = Arc::new(ScriptedBackend::fragments(vec![Ok("Aye")]));
        let memory = Arc::new(ConversationMemoryStore::new(8));

        run_turn(
            persistence,
            backend.clone(),
            memory.clone(),
            ContextSource::Transcript,
            "Ready?",
        )
        .await;

        let context = backend.last_context();
        let contents: Vec<&str> = context[1..].iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["Ahoy!", "Hi", "Ready?"]);
        let transcript = memory.get("c1");
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[3].content, "Aye");
    }

    #[tokio::test]
    async fn test_cancellation_abandons_generation() {
        let persistence = Arc::new(RecordingPersistence::default());
        let backend = Arc::new(ScriptedBackend::new(Script::Hang(vec!["Par"])));
        let memory = Arc::new(ConversationMemoryStore::new(8));
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let coordinator = CoordinatorBuilder::new(persistence.clone(), backend, memory, tx)
            .cancellation(cancel.clone())
            .build();
        let handle = tokio::spawn(async move {
            coordinator
                .handle_turn("c1", &persona(), None, "Hi")
                .await
        });

        assert!(matches!(
            rx.recv().await,
            Some(StreamEvent::MessageStart { .. })
        ));
        assert_eq!(
            rx.recv().await,
            Some(StreamEvent::Content {
                content: "Par".to_string()
            })
        );
        cancel.cancel();

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.state, TurnState::Failed);
        assert_eq!(
            rx.recv().await,
            Some(StreamEvent::Error {
                message: APOLOGY.to_string()
            })
        );
        assert_eq!(rx.recv().await, Some(StreamEvent::Done));
        assert_eq!(rx.recv().await, None);
        assert_eq!(persistence.updates()[0].1, APOLOGY);
    }

    #[tokio::test]
    async fn test_summarize() {
        let turns: Vec<(Role, &str)> = (0..12)
            .map(|i| (if i % 2 == 0 { Role::User } else { Role::Assistant }, "msg"))
            .collect();
        let persistence = RecordingPersistence::with_history(&turns);
        let backend = ScriptedBackend::fragments(vec![]);

        let summary = ResponseStreamCoordinator::summarize(&persistence, &backend, "c1", 5).await;
        assert_eq!(summary, "A cha");
        // Only the most recent turns are summarized
        assert_eq!(backend.last_context().len(), 10);
    }

    #[tokio::test]
    async fn test_summarize_failure_returns_placeholder() {
        let persistence = RecordingPersistence::with_history(&[(Role::User, "Hi")]);
        let mut backend = ScriptedBackend::fragments(vec![]);
        backend.summary = Err("rate limited");

        let summary =
            ResponseStreamCoordinator::summarize(&persistence, &backend, "c1", 100).await;
        assert_eq!(summary, SUMMARY_PLACEHOLDER);

        backend.available = false;
        backend.summary = Ok("unused");
        let summary =
            ResponseStreamCoordinator::summarize(&persistence, &backend, "c1", 100).await;
        assert_eq!(summary, SUMMARY_PLACEHOLDER);

        let backend = ScriptedBackend::fragments(vec![]);
        let summary =
            ResponseStreamCoordinator::summarize(&persistence, &backend, "empty", 100).await;
        assert_eq!(summary, SUMMARY_PLACEHOLDER);
    }

    #[test]
    fn test_context_source_from_str() {
        assert_eq!(
            "Transcript".parse::<ContextSource>().unwrap(),
            ContextSource::Transcript
        );
        assert_eq!(
            "history".parse::<ContextSource>().unwrap(),
            ContextSource::History
        );
        assert!("both".parse::<ContextSource>().is_err());
    }
}
