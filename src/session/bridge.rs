//! The realtime bridge: session state machine and event loop.
//!
//! Owns the peer transport and data channel for one session at a time,
//! orchestrates the SDP offer/answer exchange, routes inbound events to the
//! transcript aggregator and tool registry, and writes outbound events (the
//! session configuration, user text, tool outputs) back down the channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::BridgeConfig;
use crate::credentials::CredentialProvider;
use crate::error::{BridgeError, Result};
use crate::tools::ToolRegistry;
use crate::transcript::{Speaker, TranscriptAggregator, TranscriptEntry};

use super::events::{self, ServerEvent};
use super::transport::{
    negotiate_answer, ChannelSignal, DataChannel, MediaTransport, TransportFactory,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle of one realtime session.
///
/// `Closed` is terminal for a session instance; a new `start()` constructs a
/// fresh session rather than resuming a partial negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Negotiating,
    Open,
    Closed,
}

/// Events surfaced to the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    StateChanged(SessionState),
    /// Coalesced snapshot of the visible conversation.
    TranscriptUpdated(Vec<TranscriptEntry>),
    /// The transport failed after the session was open.
    Disconnected { reason: String },
}

enum SessionCommand {
    SendUserText(String),
}

struct SessionHandle {
    epoch: u64,
    shutdown: watch::Sender<bool>,
    commands: mpsc::UnboundedSender<SessionCommand>,
    task: Option<JoinHandle<()>>,
}

struct BridgeInner {
    config: BridgeConfig,
    credentials: Arc<dyn CredentialProvider>,
    factory: Arc<dyn TransportFactory>,
    tools: Arc<ToolRegistry>,
    http: reqwest::Client,
    state: watch::Sender<SessionState>,
    events: mpsc::UnboundedSender<BridgeEvent>,
    active: Mutex<Option<SessionHandle>>,
    epoch: AtomicU64,
}

impl BridgeInner {
    /// Apply a state transition on behalf of session `epoch`, dropping it if
    /// that session is no longer the current one.
    fn set_state(&self, epoch: u64, state: SessionState) {
        if epoch != self.epoch.load(Ordering::SeqCst) {
            tracing::debug!(epoch, ?state, "dropping state change from stale session");
            return;
        }
        let changed = self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            let _ = self.events.send(BridgeEvent::StateChanged(state));
        }
    }

    fn emit(&self, epoch: u64, event: BridgeEvent) {
        if epoch != self.epoch.load(Ordering::SeqCst) {
            tracing::debug!(epoch, "dropping event from stale session");
            return;
        }
        let _ = self.events.send(event);
    }
}

impl Drop for BridgeInner {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(handle) = active.take() {
                let _ = handle.shutdown.send(true);
                if let Some(task) = handle.task {
                    task.abort();
                }
            }
        }
    }
}

/// Bridge between a conversation view and a hosted realtime speech model.
///
/// Cheap to clone; all clones share one session slot. At most one session is
/// active at a time, and its transport and microphone stream are released
/// before a new one can start.
#[derive(Clone)]
pub struct RealtimeBridge {
    inner: Arc<BridgeInner>,
}

impl RealtimeBridge {
    /// Create a bridge and the receiving half of its event stream.
    pub fn new(
        config: BridgeConfig,
        credentials: Arc<dyn CredentialProvider>,
        factory: Arc<dyn TransportFactory>,
        tools: Arc<ToolRegistry>,
    ) -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self::new_with_client(config, credentials, factory, tools, http)
    }

    pub fn new_with_client(
        config: BridgeConfig,
        credentials: Arc<dyn CredentialProvider>,
        factory: Arc<dyn TransportFactory>,
        tools: Arc<ToolRegistry>,
        http: reqwest::Client,
    ) -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(SessionState::Idle);
        let bridge = Self {
            inner: Arc::new(BridgeInner {
                config,
                credentials,
                factory,
                tools,
                http,
                state: state_tx,
                events: events_tx,
                active: Mutex::new(None),
                epoch: AtomicU64::new(0),
            }),
        };
        (bridge, events_rx)
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Watch session state transitions.
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Start a fresh session: acquire the microphone and an ephemeral
    /// credential, negotiate the transport, and hand the open data channel to
    /// the session loop.
    ///
    /// Any failure aborts cleanly: the transport is torn down, the state ends
    /// in `Closed`, and the error says which step failed. `stop()` may be
    /// called while negotiation is in flight; the abandoned negotiation
    /// notices and releases its resources instead of reopening.
    pub async fn start(&self) -> Result<()> {
        let (epoch, mut shutdown_rx, commands_rx) = {
            let mut active = self.inner.active.lock().expect("session slot lock poisoned");
            if matches!(
                self.state(),
                SessionState::Negotiating | SessionState::Open
            ) {
                return Err(BridgeError::InvalidState(
                    "a session is already active".to_string(),
                ));
            }
            let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let (commands_tx, commands_rx) = mpsc::unbounded_channel();
            *active = Some(SessionHandle {
                epoch,
                shutdown: shutdown_tx,
                commands: commands_tx,
                task: None,
            });
            (epoch, shutdown_rx, commands_rx)
        };

        self.inner.set_state(epoch, SessionState::Negotiating);

        let mut transport = match self.inner.factory.create().await {
            Ok(transport) => transport,
            Err(error) => {
                self.abort_session(epoch);
                return Err(error);
            }
        };

        let negotiated = self.negotiate(&mut transport, &mut shutdown_rx).await;
        let (channel, signals) = match negotiated {
            Ok(parts) => parts,
            Err(error) => {
                transport.close().await;
                self.abort_session(epoch);
                return Err(error);
            }
        };

        let runtime = SessionRuntime {
            epoch,
            config: self.inner.config.clone(),
            tools: Arc::clone(&self.inner.tools),
            transport,
            channel,
            signals,
            commands: commands_rx,
            shutdown_rx,
        };
        let task = tokio::spawn(run_session(Arc::clone(&self.inner), runtime));

        let mut active = self.inner.active.lock().expect("session slot lock poisoned");
        match active.as_mut() {
            Some(handle) if handle.epoch == epoch => handle.task = Some(task),
            // stop() already took the handle; the loop sees the shutdown flag
            // and tears itself down.
            _ => {}
        }
        Ok(())
    }

    async fn negotiate(
        &self,
        transport: &mut Box<dyn MediaTransport>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<(Arc<dyn DataChannel>, mpsc::UnboundedReceiver<ChannelSignal>)> {
        transport.attach_microphone().await?;
        ensure_live(shutdown_rx)?;

        let credential = self.inner.credentials.ephemeral_credential().await?;
        ensure_live(shutdown_rx)?;

        // Channel handlers must exist before the answer is applied; events can
        // arrive the moment the remote description is set.
        let (channel, signals) = transport
            .open_data_channel(&self.inner.config.data_channel_label)
            .await?;
        let offer = transport.create_offer().await?;
        ensure_live(shutdown_rx)?;

        let answer = negotiate_answer(
            &self.inner.http,
            &self.inner.config.negotiation_url,
            &self.inner.config.model,
            &credential.secret,
            &offer,
        )
        .await?;
        ensure_live(shutdown_rx)?;

        transport.set_remote_answer(&answer).await?;
        Ok((channel, signals))
    }

    fn abort_session(&self, epoch: u64) {
        let mut active = self.inner.active.lock().expect("session slot lock poisoned");
        if matches!(active.as_ref(), Some(handle) if handle.epoch == epoch) {
            active.take();
        }
        drop(active);
        self.inner.set_state(epoch, SessionState::Closed);
    }

    /// Stop the active session, releasing the data channel, transport, and
    /// microphone. Safe to call at any time, including mid-negotiation and
    /// when no session exists.
    pub async fn stop(&self) {
        let handle = self
            .inner
            .active
            .lock()
            .expect("session slot lock poisoned")
            .take();
        let Some(mut handle) = handle else {
            return;
        };
        let _ = handle.shutdown.send(true);
        if let Some(task) = handle.task.take() {
            if let Err(error) = task.await {
                tracing::warn!(%error, "session task ended abnormally");
            }
        }
        self.inner.set_state(handle.epoch, SessionState::Closed);
    }

    /// Send a typed user message into the conversation. Logged and dropped
    /// when no session is open.
    pub fn send_user_text(&self, text: impl Into<String>) {
        if self.state() != SessionState::Open {
            tracing::warn!("dropping user text: session is not open");
            return;
        }
        let active = self.inner.active.lock().expect("session slot lock poisoned");
        if let Some(handle) = active.as_ref() {
            let _ = handle
                .commands
                .send(SessionCommand::SendUserText(text.into()));
        }
    }
}

struct SessionRuntime {
    epoch: u64,
    config: BridgeConfig,
    tools: Arc<ToolRegistry>,
    transport: Box<dyn MediaTransport>,
    channel: Arc<dyn DataChannel>,
    signals: mpsc::UnboundedReceiver<ChannelSignal>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    shutdown_rx: watch::Receiver<bool>,
}

fn ensure_live(shutdown_rx: &watch::Receiver<bool>) -> Result<()> {
    if *shutdown_rx.borrow() {
        Err(BridgeError::InvalidState(
            "session stopped during negotiation".to_string(),
        ))
    } else {
        Ok(())
    }
}

async fn run_session(inner: Arc<BridgeInner>, mut rt: SessionRuntime) {
    let mut aggregator = TranscriptAggregator::new();
    let mut flush = time::interval(rt.config.flush_interval);
    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
    flush.tick().await;

    let mut open = false;
    let mut disconnect_reason: Option<String> = None;

    loop {
        tokio::select! {
            changed = rt.shutdown_rx.changed() => {
                if changed.is_err() || *rt.shutdown_rx.borrow() {
                    break;
                }
            }
            _ = flush.tick() => {
                if aggregator.take_dirty() {
                    inner.emit(rt.epoch, BridgeEvent::TranscriptUpdated(aggregator.snapshot()));
                }
            }
            Some(command) = rt.commands.recv() => {
                let SessionCommand::SendUserText(text) = command;
                if !open {
                    tracing::warn!("dropping user text queued before the channel opened");
                    continue;
                }
                match rt.channel.send(events::user_text_item(&text).to_string()).await {
                    Ok(()) => {
                        aggregator.apply_complete(Speaker::User, &text);
                        flush_transcript(&inner, rt.epoch, &mut aggregator);
                    }
                    Err(error) => tracing::warn!(%error, "failed to send user text"),
                }
            }
            signal = rt.signals.recv() => {
                match signal {
                    Some(ChannelSignal::Open) => {
                        // A stop() racing the open signal wins: no session
                        // configuration goes out for a cancelled session.
                        if *rt.shutdown_rx.borrow() {
                            break;
                        }
                        let payload = events::session_update(&rt.config, &rt.tools.schemas());
                        if let Err(error) = rt.channel.send(payload.to_string()).await {
                            disconnect_reason =
                                Some(format!("session configuration send failed: {error}"));
                            break;
                        }
                        open = true;
                        inner.set_state(rt.epoch, SessionState::Open);
                    }
                    Some(ChannelSignal::Message(raw)) => {
                        handle_message(
                            &inner,
                            rt.epoch,
                            &rt.channel,
                            &rt.tools,
                            &mut aggregator,
                            &raw,
                        );
                    }
                    Some(ChannelSignal::Error(reason)) => {
                        disconnect_reason = Some(reason);
                        break;
                    }
                    Some(ChannelSignal::Closed) | None => {
                        if open {
                            disconnect_reason =
                                Some("data channel closed by remote".to_string());
                        }
                        break;
                    }
                }
            }
        }
    }

    // Final flush so sealed-but-unemitted text is not lost on shutdown.
    flush_transcript(&inner, rt.epoch, &mut aggregator);

    rt.channel.close().await;
    rt.transport.close().await;
    if let Some(reason) = disconnect_reason {
        inner.emit(rt.epoch, BridgeEvent::Disconnected { reason });
    }
    inner.set_state(rt.epoch, SessionState::Closed);

    let mut active = inner.active.lock().expect("session slot lock poisoned");
    if matches!(active.as_ref(), Some(handle) if handle.epoch == rt.epoch) {
        active.take();
    }
}

fn flush_transcript(inner: &Arc<BridgeInner>, epoch: u64, aggregator: &mut TranscriptAggregator) {
    if aggregator.take_dirty() {
        inner.emit(epoch, BridgeEvent::TranscriptUpdated(aggregator.snapshot()));
    }
}

fn handle_message(
    inner: &Arc<BridgeInner>,
    epoch: u64,
    channel: &Arc<dyn DataChannel>,
    tools: &Arc<ToolRegistry>,
    aggregator: &mut TranscriptAggregator,
    raw: &str,
) {
    let payload: Value = match serde_json::from_str(raw) {
        Ok(payload) => payload,
        Err(error) => {
            tracing::warn!(%error, "ignoring undecodable wire message");
            return;
        }
    };
    let Some(event) = ServerEvent::from_payload(&payload) else {
        tracing::warn!("ignoring wire message with missing type or fields");
        return;
    };

    match event {
        ServerEvent::TranscriptDelta { response_id, delta } => {
            aggregator.apply_delta(&response_id, &delta);
        }
        ServerEvent::ContentPartDone { response_id } => {
            match response_id {
                Some(id) => {
                    aggregator.seal(&id);
                }
                None => aggregator.seal_all(),
            }
            flush_transcript(inner, epoch, aggregator);
        }
        ServerEvent::UserTranscriptCompleted { transcript } => {
            aggregator.apply_complete(Speaker::User, &transcript);
            flush_transcript(inner, epoch, aggregator);
        }
        ServerEvent::FunctionCallArgsDone {
            name,
            arguments,
            call_id,
        } => {
            // Runs off the session loop so a slow retrieval cannot starve
            // inbound dispatch. Late results land on a closed channel and are
            // dropped there.
            tokio::spawn(dispatch_tool_call(
                Arc::clone(channel),
                Arc::clone(tools),
                name,
                arguments,
                call_id,
            ));
        }
        ServerEvent::Other { event_type } => {
            tracing::debug!(%event_type, "ignoring unhandled event type");
        }
    }
}

/// Resolve one model-initiated tool call.
///
/// Whatever happens (unknown tool, malformed arguments, handler failure) the
/// remote session gets exactly one `function_call_output` followed by
/// `response.create`; a degraded answer beats leaving the model waiting.
async fn dispatch_tool_call(
    channel: Arc<dyn DataChannel>,
    tools: Arc<ToolRegistry>,
    name: String,
    arguments: String,
    call_id: String,
) {
    let output = match serde_json::from_str::<Value>(&arguments) {
        Ok(args) => match tools.invoke(&name, &args).await {
            Ok(result) => result,
            Err(BridgeError::UnknownTool(_)) => {
                tracing::warn!(tool = %name, "model invoked an unregistered tool");
                format!("tool {name} is not available")
            }
            Err(error) => {
                tracing::warn!(tool = %name, %error, "tool execution failed");
                format!("tool {name} failed: {error}")
            }
        },
        Err(error) => {
            tracing::warn!(tool = %name, %error, "tool call had malformed arguments");
            format!("tool {name} received malformed arguments")
        }
    };

    if let Err(error) = channel
        .send(events::function_call_output(&call_id, &output).to_string())
        .await
    {
        tracing::warn!(%error, call_id = %call_id, "failed to send tool output");
        return;
    }
    if let Err(error) = channel.send(events::response_create().to_string()).await {
        tracing::warn!(%error, call_id = %call_id, "failed to send response.create");
    }
}
