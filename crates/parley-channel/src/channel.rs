//! Resilient session channel.
//!
//! A single actor task owns the connection, the offline queue, the retry
//! counter and all timers. [`SessionChannel`] is a cheap, cloneable handle
//! that talks to it over an unbounded command queue, so calls never block
//! and never fail.
//!
//! State machine:
//!
//! ```text
//! Connecting ──open──▶ Open ──drop──▶ Reconnecting ──delay──▶ Connecting
//!      │                                   │
//!      └──────fail (retries left)──────────┘
//!      └──────fail (retries exhausted)──▶ Offline ──online/connect──▶ Connecting
//! any ──disconnect──▶ Closed
//! ```

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parley_core::wire::{OutboundMessage, SessionSummary, SESSION_SUMMARY_TYPE};
use parley_core::{
    ChannelEvent, ChannelEventKind, ConnectionState, OfflineReason, SubscriptionId,
    TransportError,
};
use parley_telemetry::MetricsRecorder;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::config::ChannelConfig;
use crate::connectivity::{Connectivity, ConnectivitySubscription};
use crate::queue::OfflineQueue;
use crate::transport::{Connection, Connector};

pub const METRIC_QUEUE_EVICTED: &str = "channel.queue.evicted";
pub const METRIC_QUEUE_DEPTH: &str = "channel.queue.depth";
pub const METRIC_RECONNECT_ATTEMPTS: &str = "channel.reconnect.attempts";
pub const METRIC_RECONNECT_DELAY_MS: &str = "channel.reconnect.delay_ms";
pub const METRIC_FRAMES_DROPPED: &str = "channel.frames.dropped";
pub const METRIC_FRAMES_SENT: &str = "channel.frames.sent";
pub const METRIC_FRAMES_RECEIVED: &str = "channel.frames.received";

const EVENT_CAPACITY: usize = 256;

enum Command {
    Connect,
    Disconnect,
    Send(String),
    Queued(oneshot::Sender<Vec<String>>),
}

/// Configures and spawns a [`SessionChannel`].
pub struct ChannelBuilder {
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    connectivity: Option<ConnectivitySubscription>,
    metrics: Option<Arc<MetricsRecorder>>,
    event_capacity: usize,
}

impl ChannelBuilder {
    /// Follow platform connectivity signals.
    pub fn connectivity(mut self, subscription: ConnectivitySubscription) -> Self {
        self.connectivity = Some(subscription);
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Buffer size of the broadcast stream returned by [`SessionChannel::events`].
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Spawn the actor. Must be called inside a tokio runtime.
    ///
    /// The channel starts in `Connecting` but does not dial until
    /// [`SessionChannel::connect`] is called.
    pub fn spawn(self) -> SessionChannel {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let bus = Arc::new(EventBus::new(self.event_capacity));
        let metrics = self.metrics.unwrap_or_default();

        let period = self.config.heartbeat_interval.max(Duration::from_millis(1));
        let mut heartbeat = tokio::time::interval(period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let actor = ChannelActor {
            queue: OfflineQueue::new(self.config.offline_queue_limit),
            config: self.config,
            connector: self.connector,
            commands: cmd_rx,
            connectivity: self.connectivity,
            state: state_tx,
            bus: Arc::clone(&bus),
            metrics: Arc::clone(&metrics),
            conn: None,
            attempt: None,
            backoff: None,
            heartbeat,
            retries: 0,
        };
        tokio::spawn(actor.run());

        SessionChannel {
            commands: cmd_tx,
            state: state_rx,
            bus,
            metrics,
        }
    }
}

/// Handle to a running channel actor.
#[derive(Clone)]
pub struct SessionChannel {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    bus: Arc<EventBus>,
    metrics: Arc<MetricsRecorder>,
}

impl SessionChannel {
    pub fn builder(config: ChannelConfig, connector: Arc<dyn Connector>) -> ChannelBuilder {
        ChannelBuilder {
            config,
            connector,
            connectivity: None,
            metrics: None,
            event_capacity: EVENT_CAPACITY,
        }
    }

    /// Start a connection attempt now.
    ///
    /// No-op while open, while an attempt is in flight, or once closed. From
    /// `Reconnecting` or `Offline` this skips the pending delay but keeps the
    /// retry counter.
    pub fn connect(&self) {
        self.command(Command::Connect);
    }

    /// Close for good. Pending attempts and timers are cancelled and the
    /// queue is discarded. Idempotent.
    pub fn disconnect(&self) {
        self.command(Command::Disconnect);
    }

    /// Serialize and send `payload`, queueing it while not open.
    pub fn send<T: Serialize>(&self, payload: &T) {
        match serde_json::to_string(payload) {
            Ok(text) => self.send_raw(text),
            Err(e) => warn!(error = %e, "dropping unserializable payload"),
        }
    }

    /// Send an already-serialized payload.
    pub fn send_raw(&self, payload: String) {
        self.command(Command::Send(payload));
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the channel reaches `target`. Returns `false` if the actor
    /// stopped without getting there.
    pub async fn wait_for_state(&self, target: ConnectionState) -> bool {
        let mut rx = self.state.clone();
        let reached = rx.wait_for(|state| *state == target).await.is_ok();
        reached
    }

    pub fn subscribe<F>(&self, kind: ChannelEventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(kind, handler)
    }

    pub fn unsubscribe(&self, kind: ChannelEventKind, id: &SubscriptionId) -> bool {
        self.bus.unsubscribe(kind, id)
    }

    /// Stream of every event emitted after this call.
    pub fn events(&self) -> broadcast::Receiver<ChannelEvent> {
        self.bus.receiver()
    }

    /// Payloads currently waiting in the offline queue, oldest first.
    pub async fn queued(&self) -> Vec<String> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::Queued(tx));
        rx.await.unwrap_or_default()
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        Arc::clone(&self.metrics)
    }

    /// Payloads evicted from the offline queue since the channel started.
    pub fn evicted_total(&self) -> u64 {
        self.metrics.counter_get(METRIC_QUEUE_EVICTED, &[])
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("channel closed, ignoring command");
        }
    }
}

type AttemptHandle = JoinHandle<Result<Box<dyn Connection>, TransportError>>;

struct ChannelActor {
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    connectivity: Option<ConnectivitySubscription>,
    state: watch::Sender<ConnectionState>,
    bus: Arc<EventBus>,
    metrics: Arc<MetricsRecorder>,
    queue: OfflineQueue,
    conn: Option<Box<dyn Connection>>,
    attempt: Option<AttemptHandle>,
    backoff: Option<Pin<Box<Sleep>>>,
    heartbeat: Interval,
    retries: u32,
}

impl ChannelActor {
    async fn run(mut self) {
        info!(url = %self.config.url, "channel actor started");
        loop {
            let heartbeat_due = self.conn.is_some();
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Connect) => self.handle_connect(),
                    Some(Command::Send(payload)) => self.handle_send(payload).await,
                    Some(Command::Queued(reply)) => {
                        let _ = reply.send(self.queue.snapshot());
                    }
                    Some(Command::Disconnect) | None => break,
                },
                result = wait_attempt(&mut self.attempt) => {
                    self.attempt = None;
                    self.handle_attempt(result).await;
                }
                () = wait_backoff(&mut self.backoff) => {
                    self.backoff = None;
                    self.begin_attempt();
                }
                inbound = recv_frame(&mut self.conn) => self.handle_inbound(inbound).await,
                _ = self.heartbeat.tick(), if heartbeat_due => self.send_heartbeat().await,
                signal = next_signal(&mut self.connectivity) => self.handle_connectivity(signal),
            }
        }
        self.shutdown().await;
    }

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "channel state changed");
        }
    }

    fn handle_connect(&mut self) {
        match self.current() {
            ConnectionState::Open => debug!("connect ignored, already open"),
            _ if self.attempt.is_some() => debug!("connect ignored, attempt in flight"),
            _ => {
                self.backoff = None;
                self.begin_attempt();
            }
        }
    }

    fn begin_attempt(&mut self) {
        self.set_state(ConnectionState::Connecting);
        let connector = Arc::clone(&self.connector);
        let url = self.config.url.clone();
        let token = self.config.token.clone();
        let limit = self.config.connect_timeout;
        debug!(url = %url, retries = self.retries, "opening connection");
        self.attempt = Some(tokio::spawn(async move {
            match tokio::time::timeout(limit, connector.connect(&url, token.as_ref())).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(limit)),
            }
        }));
    }

    async fn handle_attempt(&mut self, result: Result<Box<dyn Connection>, TransportError>) {
        match result {
            Ok(conn) => self.on_open(conn).await,
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), retries = self.retries, "connect attempt failed");
                self.bus.emit(ChannelEvent::SocketError {
                    message: e.to_string(),
                });
                self.schedule_reconnect();
            }
        }
    }

    async fn on_open(&mut self, conn: Box<dyn Connection>) {
        let attempts = std::mem::take(&mut self.retries);
        self.conn = Some(conn);
        self.heartbeat.reset();
        self.set_state(ConnectionState::Open);
        info!(url = %self.config.url, queued = self.queue.len(), "channel open");
        self.bus.emit(ChannelEvent::ConnectionOpened);
        if attempts > 0 {
            self.bus.emit(ChannelEvent::ReconnectSucceeded { attempts });
        }
        self.flush().await;
    }

    /// Drain the offline queue front-first. Stops at the first failed write,
    /// leaving that payload and the rest queued in order.
    async fn flush(&mut self) {
        while let Some(payload) = self.queue.front().cloned() {
            if self.conn.is_none() {
                return;
            }
            match self.write(payload).await {
                Ok(()) => {
                    self.queue.pop_front();
                    self.metrics.counter_inc(METRIC_FRAMES_SENT, &[], 1);
                }
                Err(e) => {
                    warn!(error = %e, remaining = self.queue.len(), "flush interrupted");
                    self.record_queue_depth();
                    self.connection_lost(e.to_string()).await;
                    return;
                }
            }
        }
        self.record_queue_depth();
    }

    async fn handle_send(&mut self, payload: String) {
        if self.conn.is_none() {
            self.enqueue(payload);
            return;
        }
        match self.write(payload.clone()).await {
            Ok(()) => self.metrics.counter_inc(METRIC_FRAMES_SENT, &[], 1),
            Err(e) => {
                warn!(error = %e, "write failed, requeueing payload");
                self.enqueue(payload);
                self.connection_lost(e.to_string()).await;
            }
        }
    }

    fn enqueue(&mut self, payload: String) {
        if let Some(evicted) = self.queue.push(payload) {
            self.metrics.counter_inc(METRIC_QUEUE_EVICTED, &[], 1);
            warn!(
                evicted_bytes = evicted.len(),
                capacity = self.queue.capacity(),
                total_evicted = self.metrics.counter_get(METRIC_QUEUE_EVICTED, &[]),
                "offline queue full, dropped oldest payload"
            );
        }
        self.record_queue_depth();
    }

    /// Write one frame, bounded by `write_timeout` so a peer that stops
    /// reading cannot stall the actor.
    async fn write(&mut self, text: String) -> Result<(), TransportError> {
        let limit = self.config.write_timeout;
        let Some(conn) = self.conn.as_mut() else {
            return Err(TransportError::Closed("no open connection".into()));
        };
        match tokio::time::timeout(limit, conn.send_text(text)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(limit)),
        }
    }

    async fn close_conn(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        if tokio::time::timeout(self.config.write_timeout, conn.close()).await.is_err() {
            debug!("close handshake timed out, dropping connection");
        }
    }

    fn record_queue_depth(&self) {
        self.metrics
            .gauge_set(METRIC_QUEUE_DEPTH, &[], self.queue.len() as f64);
    }

    async fn handle_inbound(&mut self, inbound: Option<Result<String, TransportError>>) {
        match inbound {
            Some(Ok(text)) => {
                self.metrics.counter_inc(METRIC_FRAMES_RECEIVED, &[], 1);
                let event = route_frame(&text);
                if let ChannelEvent::SocketError { message } = &event {
                    warn!(error = %message, "dropping inbound frame");
                    self.metrics.counter_inc(METRIC_FRAMES_DROPPED, &[], 1);
                }
                self.bus.emit(event);
            }
            Some(Err(e)) => {
                warn!(error = %e, "socket error");
                self.bus.emit(ChannelEvent::SocketError {
                    message: e.to_string(),
                });
                self.connection_lost(e.to_string()).await;
            }
            None => self.connection_lost("closed by peer".to_string()).await,
        }
    }

    async fn send_heartbeat(&mut self) {
        if self.conn.is_none() {
            return;
        }
        let ping = match serde_json::to_string(&OutboundMessage::Ping) {
            Ok(ping) => ping,
            Err(e) => {
                warn!(error = %e, "heartbeat serialization failed");
                return;
            }
        };
        if let Err(e) = self.write(ping).await {
            warn!(error = %e, "heartbeat write failed");
            self.connection_lost(e.to_string()).await;
        }
    }

    /// Tear down the live connection after an unexpected closure and apply
    /// the reconnect policy.
    async fn connection_lost(&mut self, reason: String) {
        self.close_conn().await;
        info!(reason = %reason, "connection closed");
        self.bus.emit(ChannelEvent::ConnectionClosed {
            reason,
            by_caller: false,
        });
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.retries < self.config.max_retries {
            self.retries += 1;
            let attempt = self.retries;
            let delay = self.config.backoff_delay(attempt);
            self.set_state(ConnectionState::Reconnecting);
            self.metrics.counter_inc(METRIC_RECONNECT_ATTEMPTS, &[], 1);
            self.metrics
                .histogram_observe(METRIC_RECONNECT_DELAY_MS, &[], delay.as_millis() as f64);
            warn!(
                attempt,
                max_retries = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                "scheduling reconnect"
            );
            self.bus
                .emit(ChannelEvent::ReconnectAttempting { attempt, delay });
            self.backoff = Some(Box::pin(tokio::time::sleep(delay)));
        } else {
            self.set_state(ConnectionState::Offline);
            warn!(
                max_retries = self.config.max_retries,
                queued = self.queue.len(),
                "reconnect attempts exhausted, going offline"
            );
            self.bus.emit(ChannelEvent::WentOffline {
                reason: OfflineReason::RetriesExhausted,
            });
        }
    }

    fn handle_connectivity(&mut self, signal: Option<Connectivity>) {
        match signal {
            Some(Connectivity::Online) => {
                info!("network back online");
                self.bus.emit(ChannelEvent::CameOnline);
                self.handle_connect();
            }
            Some(Connectivity::Offline) => {
                info!("network unavailable");
                self.bus.emit(ChannelEvent::WentOffline {
                    reason: OfflineReason::NetworkUnavailable,
                });
            }
            None => {
                debug!("connectivity source gone");
                self.connectivity = None;
            }
        }
    }

    async fn shutdown(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
        self.backoff = None;
        self.connectivity = None;
        self.close_conn().await;
        let discarded = self.queue.len();
        self.queue.clear();
        self.record_queue_depth();
        self.set_state(ConnectionState::Closed);
        info!(discarded, "channel closed by caller");
        self.bus.emit(ChannelEvent::ConnectionClosed {
            reason: "disconnect requested".to_string(),
            by_caller: true,
        });
    }
}

/// Classify one inbound text frame.
///
/// Malformed JSON and unreadable summaries become `SocketError`; summaries
/// are routed to their dedicated event; everything else is passed through.
pub fn route_frame(text: &str) -> ChannelEvent {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            return ChannelEvent::SocketError {
                message: format!("malformed frame: {e}"),
            }
        }
    };
    if value.get("type").and_then(Value::as_str) != Some(SESSION_SUMMARY_TYPE) {
        return ChannelEvent::MessageReceived(value);
    }
    match serde_json::from_value::<SessionSummary>(value) {
        Ok(summary) => ChannelEvent::SessionSummaryReceived(summary),
        Err(e) => ChannelEvent::SocketError {
            message: format!("malformed session summary: {e}"),
        },
    }
}

async fn wait_attempt(
    attempt: &mut Option<AttemptHandle>,
) -> Result<Box<dyn Connection>, TransportError> {
    match attempt.as_mut() {
        Some(handle) => match handle.await {
            Ok(result) => result,
            Err(e) => Err(TransportError::ConnectFailed(format!("connect task failed: {e}"))),
        },
        None => pending().await,
    }
}

async fn wait_backoff(backoff: &mut Option<Pin<Box<Sleep>>>) {
    match backoff.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

async fn recv_frame(
    conn: &mut Option<Box<dyn Connection>>,
) -> Option<Result<String, TransportError>> {
    match conn.as_mut() {
        Some(conn) => conn.recv_text().await,
        None => pending().await,
    }
}

async fn next_signal(subscription: &mut Option<ConnectivitySubscription>) -> Option<Connectivity> {
    match subscription.as_mut() {
        Some(sub) => sub.next().await,
        None => pending().await,
    }
}
