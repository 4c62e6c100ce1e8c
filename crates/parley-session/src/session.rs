//! One learning session: channel events in, proposals out.
//!
//! The actor task owns the transcript, the turn cursor and the
//! [`TurnProcessor`], so turns are processed strictly in arrival order and
//! never overlap.

use std::collections::HashSet;
use std::future::pending;
use std::sync::Arc;

use parley_channel::SessionChannel;
use parley_core::wire::{
    Author, InboundMessage, OutboundMessage, SessionSummary, TranscriptLine, WordAction,
};
use parley_core::{ChannelEvent, ConnectionState, SessionId};
use parley_settings::{LearnerSettings, SchedulerSettings, SessionSettings};
use parley_telemetry::MetricsRecorder;
use parley_vocab::{FallbackTranslator, Translation, TranslationService, TurnCursor, TurnProcessor};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::update::{SessionSnapshot, SessionUpdate};

pub const METRIC_TURNS_PROCESSED: &str = "session.turns.processed";
/// Channel events the session fell too far behind to receive.
pub const METRIC_EVENTS_LAGGED: &str = "session.events.lagged";

const UPDATE_CAPACITY: usize = 128;

pub struct SessionOptions {
    /// Send `word_interaction` frames for practiced words, new proposals
    /// and mastered words.
    pub echo_proposals: bool,
    pub translator: Arc<dyn TranslationService>,
    pub update_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            echo_proposals: false,
            translator: Arc::new(FallbackTranslator::offline()),
            update_capacity: UPDATE_CAPACITY,
        }
    }
}

impl SessionOptions {
    pub fn from_settings(settings: &SessionSettings, translator: Arc<dyn TranslationService>) -> Self {
        Self {
            echo_proposals: settings.echo_proposals,
            translator,
            update_capacity: UPDATE_CAPACITY,
        }
    }
}

enum Command {
    SendChat(String),
    MarkWords {
        words: Vec<String>,
        success: bool,
        reply: oneshot::Sender<Vec<String>>,
    },
    UpdateSettings {
        learner: LearnerSettings,
        scheduler: Option<SchedulerSettings>,
    },
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Handle to a running session actor.
#[derive(Clone)]
pub struct LearningSession {
    id: SessionId,
    commands: mpsc::UnboundedSender<Command>,
    updates: broadcast::Sender<SessionUpdate>,
    channel: SessionChannel,
    translator: Arc<dyn TranslationService>,
    language: watch::Receiver<String>,
    cancel: CancellationToken,
}

impl LearningSession {
    /// Spawn the actor. Must be called inside a tokio runtime.
    ///
    /// The channel is not dialled; call [`connect`](Self::connect) when ready.
    pub fn spawn(
        id: SessionId,
        channel: SessionChannel,
        processor: TurnProcessor,
        options: SessionOptions,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(options.update_capacity.max(1));
        let (language_tx, language_rx) = watch::channel(processor.learner().language.clone());
        let cancel = CancellationToken::new();

        let actor = SessionActor {
            id: id.clone(),
            events: Some(channel.events()),
            state: Some(channel.watch_state()),
            metrics: channel.metrics(),
            channel: channel.clone(),
            processor,
            commands: cmd_rx,
            updates: updates.clone(),
            language: language_tx,
            cancel: cancel.clone(),
            echo_proposals: options.echo_proposals,
            transcript: Vec::new(),
            cursor: TurnCursor::new(),
            xp: 0.0,
            summary: None,
        };
        tokio::spawn(actor.run());

        Self {
            id,
            commands: cmd_tx,
            updates,
            channel,
            translator: options.translator,
            language: language_rx,
            cancel,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn channel(&self) -> &SessionChannel {
        &self.channel
    }

    pub fn connect(&self) {
        self.channel.connect();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// Updates as a stream. Lagged gaps are skipped.
    pub fn update_stream(&self) -> impl Stream<Item = SessionUpdate> {
        BroadcastStream::new(self.updates.subscribe()).filter_map(|update| update.ok())
    }

    /// Send a learner utterance and record it in the transcript.
    pub fn send_chat(&self, text: impl Into<String>) -> Result<()> {
        self.command(Command::SendChat(text.into()))
    }

    /// Explicit practice feedback. Returns words that became mastered.
    pub async fn mark_words<I, S>(&self, words: I, success: bool) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words.into_iter().map(|w| w.as_ref().to_string()).collect();
        let (reply, rx) = oneshot::channel();
        self.command(Command::MarkWords {
            words,
            success,
            reply,
        })?;
        rx.await.map_err(|_| SessionError::ActorClosed)
    }

    /// Replace learner settings, and optionally scheduler settings, then
    /// recompute proposals.
    pub fn update_settings(
        &self,
        learner: LearnerSettings,
        scheduler: Option<SchedulerSettings>,
    ) -> Result<()> {
        self.command(Command::UpdateSettings { learner, scheduler })
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Snapshot(reply))?;
        rx.await.map_err(|_| SessionError::ActorClosed)
    }

    /// Translate `word` from the session's target language.
    pub async fn translate(&self, word: &str) -> Result<Translation> {
        let language = self.language.borrow().clone();
        Ok(self.translator.translate(word, &language).await?)
    }

    /// Stop the actor and close the channel.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Resolves once the actor has stopped.
    pub async fn closed(&self) {
        self.commands.closed().await;
    }

    fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::ActorClosed)
    }
}

struct SessionActor {
    id: SessionId,
    channel: SessionChannel,
    processor: TurnProcessor,
    events: Option<broadcast::Receiver<ChannelEvent>>,
    state: Option<watch::Receiver<ConnectionState>>,
    commands: mpsc::UnboundedReceiver<Command>,
    updates: broadcast::Sender<SessionUpdate>,
    language: watch::Sender<String>,
    metrics: Arc<MetricsRecorder>,
    cancel: CancellationToken,
    echo_proposals: bool,
    transcript: Vec<TranscriptLine>,
    cursor: TurnCursor,
    xp: f64,
    summary: Option<SessionSummary>,
}

impl SessionActor {
    async fn run(mut self) {
        let initial = self.processor.proposals();
        self.echo(&[], &[], &initial, &[]);
        info!(session_id = %self.id, proposals = initial.len(), "session started");

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = next_event(&mut self.events, &self.metrics) => match event {
                    Some(event) => self.handle_event(event),
                    None => self.events = None,
                },
                state = next_state(&mut self.state) => match state {
                    Some(state) => self.publish(SessionUpdate::Connection(state)),
                    None => self.state = None,
                },
            }
        }

        self.channel.disconnect();
        info!(
            session_id = %self.id,
            turns = self.metrics.counter_get(METRIC_TURNS_PROCESSED, &[]),
            "session stopped"
        );
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SendChat(text) => {
                self.channel.send(&OutboundMessage::ChatMessage {
                    session_id: self.id.clone(),
                    text: text.clone(),
                });
                self.transcript.push(TranscriptLine {
                    author: Author::User,
                    text,
                });
            }
            Command::MarkWords {
                words,
                success,
                reply,
            } => {
                let mastered = self.processor.mark_words(&words, success);
                let _ = reply.send(mastered.clone());
                self.refresh_proposals(mastered);
            }
            Command::UpdateSettings { learner, scheduler } => {
                self.language.send_replace(learner.language.clone());
                self.processor.update_learner(learner);
                if let Some(scheduler) = scheduler {
                    self.processor.update_scheduler(scheduler);
                }
                self.refresh_proposals(Vec::new());
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::MessageReceived(frame) => self.handle_frame(&frame),
            ChannelEvent::SessionSummaryReceived(summary) => self.store_summary(summary),
            _ => {}
        }
    }

    fn handle_frame(&mut self, frame: &Value) {
        let message = match InboundMessage::from_value(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "malformed session frame");
                return;
            }
        };
        match message {
            // Learner lines are recorded when sent; the endpoint's copy is an echo.
            InboundMessage::ChatMessage(chat) if chat.author == Author::User => {}
            InboundMessage::ChatMessage(chat) => {
                self.transcript.push(TranscriptLine {
                    author: chat.author,
                    text: chat.text,
                });
                self.process_turns();
            }
            InboundMessage::Typing { is_typing } => self.publish(SessionUpdate::Typing(is_typing)),
            InboundMessage::XpGain { amount } => {
                self.xp += amount;
                self.publish(SessionUpdate::Xp {
                    gained: amount,
                    total: self.xp,
                });
            }
            InboundMessage::VocabularyUpdate { words } => {
                let added = self.processor.add_candidates(&words);
                debug!(session_id = %self.id, offered = words.len(), added = added.len(), "vocabulary update");
                self.refresh_proposals(Vec::new());
            }
            InboundMessage::SessionSummary(summary) => self.store_summary(summary),
            InboundMessage::Unknown => {}
        }
    }

    fn process_turns(&mut self) {
        for turn in self.cursor.take_pairs(&self.transcript) {
            let previous = self.processor.current_proposals().to_vec();
            let outcome = self.processor.process(&turn);
            self.metrics.counter_inc(METRIC_TURNS_PROCESSED, &[], 1);
            self.echo(&outcome.practiced, &previous, &outcome.proposals, &outcome.mastered);
            self.publish(SessionUpdate::Proposals {
                words: outcome.proposals,
                mastered: outcome.mastered,
            });
        }
    }

    fn refresh_proposals(&mut self, mastered: Vec<String>) {
        let previous = self.processor.current_proposals().to_vec();
        let words = self.processor.proposals();
        self.echo(&[], &previous, &words, &mastered);
        self.publish(SessionUpdate::Proposals { words, mastered });
    }

    fn store_summary(&mut self, summary: SessionSummary) {
        info!(
            session_id = %self.id,
            xp = summary.xp_earned,
            learned = summary.vocabulary_learned.len(),
            "session summary received"
        );
        self.summary = Some(summary.clone());
        self.publish(SessionUpdate::Summary(summary));
    }

    fn echo(
        &self,
        practiced: &[String],
        previous: &[String],
        proposals: &[String],
        mastered: &[String],
    ) {
        if !self.echo_proposals {
            return;
        }
        let mut seen = HashSet::new();
        for word in practiced.iter().filter(|word| seen.insert(word.as_str())) {
            self.send_interaction(word, WordAction::Practiced);
        }
        let proposed = proposals.iter().filter(|word| !previous.contains(*word));
        for word in proposed {
            self.send_interaction(word, WordAction::Proposed);
        }
        for word in mastered {
            self.send_interaction(word, WordAction::Mastered);
        }
    }

    fn send_interaction(&self, word: &str, action: WordAction) {
        self.channel.send(&OutboundMessage::WordInteraction {
            session_id: self.id.clone(),
            word: word.to_string(),
            action,
        });
    }

    fn publish(&self, update: SessionUpdate) {
        // No subscribers is fine.
        let _ = self.updates.send(update);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            connection: self.channel.state(),
            proposals: self.processor.current_proposals().to_vec(),
            statuses: self.processor.statuses(),
            stats: self.processor.stats(),
            transcript: self.transcript.clone(),
            xp: self.xp,
            summary: self.summary.clone(),
            learner: self.processor.learner().clone(),
        }
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<ChannelEvent>>,
    metrics: &MetricsRecorder,
) -> Option<ChannelEvent> {
    let Some(rx) = events.as_mut() else {
        return pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "session lagged behind channel events");
                metrics.counter_inc(METRIC_EVENTS_LAGGED, &[], skipped);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

async fn next_state(state: &mut Option<watch::Receiver<ConnectionState>>) -> Option<ConnectionState> {
    let Some(rx) = state.as_mut() else {
        return pending().await;
    };
    match rx.changed().await {
        Ok(()) => Some(*rx.borrow_and_update()),
        Err(_) => None,
    }
}
