//! Named real-time channels.
//!
//! The hub keeps at most one live channel per id. Each channel is driven by a
//! single task that reads one frame, hands it to the channel's consumer, and
//! only then reads the next, so consumers never run concurrently with
//! themselves and always observe frames in transport order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::events::{ChannelClosed, ChannelErrored, ChannelOpened, EventBus};
use crate::core::transport::{Connection, Transport};
use crate::utils::url::channel_url;

/// Upper bound on waiting for a graceful close handshake.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// One decoded inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Json(Value),
    /// Payload that was not valid JSON, passed through untouched
    Raw(String),
}

impl Frame {
    /// Decode a payload. Never fails: undecodable input becomes [`Frame::Raw`].
    pub fn decode(payload: &str) -> Self {
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => Frame::Json(value),
            Err(_) => Frame::Raw(payload.to_string()),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Frame::Json(value) => value.get(name),
            Frame::Raw(_) => None,
        }
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// The frame's `type` tag; raw frames report `"raw"`.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Frame::Json(_) => self.str_field("type"),
            Frame::Raw(_) => Some("raw"),
        }
    }

    /// JSON view of the frame. Raw frames render as `{"type":"raw","content":...}`.
    pub fn to_value(&self) -> Value {
        match self {
            Frame::Json(value) => value.clone(),
            Frame::Raw(content) => json!({ "type": "raw", "content": content }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

struct LiveChannel {
    generation: u64,
    state: ChannelState,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

struct HubInner {
    transport: Arc<dyn Transport>,
    realtime_base: String,
    events: Arc<EventBus>,
    channels: Mutex<HashMap<String, LiveChannel>>,
    next_generation: AtomicU64,
}

impl HubInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, LiveChannel>> {
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mark_open(&self, channel_id: &str, generation: u64) -> bool {
        match self.lock().get_mut(channel_id) {
            Some(entry) if entry.generation == generation => {
                entry.state = ChannelState::Open;
                true
            }
            _ => false,
        }
    }

    /// Drop the entry unless it has already been replaced by a newer connection.
    fn forget(&self, channel_id: &str, generation: u64) {
        let mut channels = self.lock();
        if channels
            .get(channel_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            channels.remove(channel_id);
        }
    }

    fn report_error(&self, channel_id: &str, message: String) {
        warn!(channel = channel_id, error = %message, "channel error");
        self.events.channel_errored.publish(&ChannelErrored {
            channel_id: channel_id.to_string(),
            message,
        });
    }
}

/// Owner of every live channel. Cheap to clone; clones share the same table.
#[derive(Clone)]
pub struct ChannelHub {
    inner: Arc<HubInner>,
}

impl ChannelHub {
    pub fn new(transport: Arc<dyn Transport>, realtime_base: &str, events: Arc<EventBus>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                transport,
                realtime_base: realtime_base.to_string(),
                events,
                channels: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Open `channel_id`, replacing any existing channel with that id.
    ///
    /// A replaced channel is fully closed, including its `on_close`, before
    /// the new connection is started. `on_message` runs once per frame in
    /// arrival order; `on_close` runs exactly once when the channel ends for
    /// any reason. Must not be awaited from the consumer of the channel being
    /// replaced.
    ///
    /// Ordering only holds for a channel that is still registered. After
    /// [`disconnect`](Self::disconnect) the old task is no longer tracked, so
    /// its `on_close` may run after the new channel opens.
    pub async fn connect<M, C>(&self, channel_id: &str, on_message: M, on_close: C)
    where
        M: FnMut(Frame) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let previous = self.inner.lock().remove(channel_id);
        if let Some(previous) = previous {
            debug!(channel = channel_id, "replacing existing channel");
            previous.cancel.cancel();
            if let Some(task) = previous.task {
                let _ = task.await;
            }
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        self.inner.lock().insert(
            channel_id.to_string(),
            LiveChannel {
                generation,
                state: ChannelState::Connecting,
                outbound,
                cancel: cancel.clone(),
                task: None,
            },
        );

        let task = tokio::spawn(run_channel(
            Arc::clone(&self.inner),
            channel_id.to_string(),
            generation,
            cancel,
            outbound_rx,
            on_message,
            on_close,
        ));

        // The task may already have finished and removed its entry.
        if let Some(entry) = self
            .inner
            .lock()
            .get_mut(channel_id)
            .filter(|entry| entry.generation == generation)
        {
            entry.task = Some(task);
        }
    }

    /// Serialize and send `data` if the channel is open.
    ///
    /// Anything else (unknown id, still connecting, closed, unserializable
    /// data) drops the message without error. Returns whether it was queued.
    pub fn send<T: Serialize + ?Sized>(&self, channel_id: &str, data: &T) -> bool {
        let channels = self.inner.lock();
        let Some(entry) = channels.get(channel_id) else {
            return false;
        };
        if entry.state != ChannelState::Open {
            return false;
        }
        match serde_json::to_string(data) {
            Ok(text) => entry.outbound.send(text).is_ok(),
            Err(_) => false,
        }
    }

    /// Close one channel. Safe to call from that channel's own consumer.
    pub fn disconnect(&self, channel_id: &str) -> bool {
        let removed = self.inner.lock().remove(channel_id);
        match removed {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn disconnect_all(&self) {
        let drained: Vec<LiveChannel> = self.inner.lock().drain().map(|(_, entry)| entry).collect();
        for entry in drained {
            entry.cancel.cancel();
        }
    }

    /// Close every channel and wait for their close handlers to finish.
    pub async fn shutdown(&self) {
        let drained: Vec<LiveChannel> = self.inner.lock().drain().map(|(_, entry)| entry).collect();
        for entry in &drained {
            entry.cancel.cancel();
        }
        for entry in drained {
            if let Some(task) = entry.task {
                let _ = task.await;
            }
        }
    }

    pub fn is_connected(&self, channel_id: &str) -> bool {
        self.state(channel_id) == ChannelState::Open
    }

    pub fn state(&self, channel_id: &str) -> ChannelState {
        self.inner
            .lock()
            .get(channel_id)
            .map(|entry| entry.state)
            .unwrap_or(ChannelState::Closed)
    }

    pub fn live_channels(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

async fn run_channel<M, C>(
    hub: Arc<HubInner>,
    channel_id: String,
    generation: u64,
    cancel: CancellationToken,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    on_message: M,
    on_close: C,
) where
    M: FnMut(Frame) + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    let url = channel_url(&hub.realtime_base, &channel_id);
    debug!(channel = %channel_id, %url, "opening channel");

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = hub.transport.open(&url) => Some(result),
    };

    match opened {
        Some(Ok(connection)) => {
            if hub.mark_open(&channel_id, generation) {
                info!(channel = %channel_id, "channel open");
                hub.events.channel_opened.publish(&ChannelOpened {
                    channel_id: channel_id.clone(),
                });
                pump(&hub, &channel_id, &cancel, connection, outbound_rx, on_message).await;
            }
        }
        Some(Err(err)) => hub.report_error(&channel_id, err.to_string()),
        None => {}
    }

    hub.forget(&channel_id, generation);
    info!(channel = %channel_id, "channel closed");
    hub.events.channel_closed.publish(&ChannelClosed {
        channel_id: channel_id.clone(),
    });
    on_close();
}

async fn pump<M>(
    hub: &HubInner,
    channel_id: &str,
    cancel: &CancellationToken,
    connection: Connection,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    mut on_message: M,
) where
    M: FnMut(Frame),
{
    let Connection {
        mut outgoing,
        mut incoming,
    } = connection;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(text) = outbound_rx.recv() => {
                if let Err(err) = outgoing.send(text).await {
                    hub.report_error(channel_id, err.to_string());
                    break;
                }
            }
            next = incoming.next() => match next {
                Some(Ok(payload)) => on_message(Frame::decode(&payload)),
                Some(Err(err)) => {
                    hub.report_error(channel_id, err.to_string());
                    break;
                }
                None => break,
            },
        }
    }

    let _ = tokio::time::timeout(CLOSE_GRACE, outgoing.close()).await;
}
