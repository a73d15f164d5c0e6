use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::core::channel_hub::{ChannelHub, Frame};
use crate::core::constants::RUN_CHANNEL_PREFIX;
use crate::utils::append_log::AppendLog;

const DEFAULT_AGENT: &str = "SYSTEM";
const DEFAULT_KIND: &str = "info";

/// One entry of a run's event log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamEvent {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub text: String,
    pub kind: String,
}

impl StreamEvent {
    /// Build an event from a frame, filling gaps from `received_at` and defaults.
    pub fn from_frame(frame: &Frame, received_at: DateTime<Utc>) -> Self {
        match frame {
            Frame::Raw(content) => Self {
                timestamp: received_at,
                agent: DEFAULT_AGENT.to_string(),
                text: content.clone(),
                kind: "raw".to_string(),
            },
            Frame::Json(value) => Self {
                timestamp: first_str(value, &["timestamp", "ts"])
                    .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                    .map(|parsed| parsed.with_timezone(&Utc))
                    .unwrap_or(received_at),
                agent: first_str(value, &["agent_name", "agent", "source"])
                    .unwrap_or(DEFAULT_AGENT)
                    .to_string(),
                text: first_str(value, &["message", "content", "text", "summary", "stage"])
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string()),
                kind: first_str(value, &["type", "level", "severity"])
                    .unwrap_or(DEFAULT_KIND)
                    .to_string(),
            },
        }
    }
}

fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|text| !text.is_empty())
}

/// Shared, append-only log of a run's events.
pub type EventLog = AppendLog<StreamEvent>;

pub fn run_channel_id(run_id: &str) -> String {
    format!("{RUN_CHANNEL_PREFIX}/{run_id}")
}

/// A frame with `type: "complete"` or `status: "done"` ends the run.
pub fn is_terminal(frame: &Frame) -> bool {
    frame.kind() == Some("complete") || frame.str_field("status") == Some("done")
}

type CompletionSlot = Arc<Mutex<Option<Box<dyn FnOnce(Frame) + Send>>>>;

fn take_completion(slot: &CompletionSlot) -> Option<Box<dyn FnOnce(Frame) + Send>> {
    slot.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take()
}

/// Observes one backend run over its dedicated channel.
pub struct StreamSink {
    hub: ChannelHub,
    channel_id: String,
}

impl StreamSink {
    /// Subscribe to `run_id`, appending every frame to `log`.
    ///
    /// `on_complete` fires exactly once: with the terminal frame, or with a
    /// synthesized `{"type":"closed","status":"closed"}` frame if the channel
    /// ends first.
    pub async fn start<F>(hub: &ChannelHub, run_id: &str, log: EventLog, on_complete: F) -> Self
    where
        F: FnOnce(Frame) + Send + 'static,
    {
        let channel_id = run_channel_id(run_id);
        let callback: Box<dyn FnOnce(Frame) + Send> = Box::new(on_complete);
        let completion: CompletionSlot = Arc::new(Mutex::new(Some(callback)));

        let message_hub = hub.clone();
        let message_channel = channel_id.clone();
        let message_completion = Arc::clone(&completion);
        let on_message = move |frame: Frame| {
            log.push(StreamEvent::from_frame(&frame, Utc::now()));
            if !is_terminal(&frame) {
                return;
            }
            if let Some(callback) = take_completion(&message_completion) {
                info!(channel = %message_channel, "run complete");
                message_hub.disconnect(&message_channel);
                callback(frame);
            }
        };

        let close_completion = Arc::clone(&completion);
        let on_close = move || {
            if let Some(callback) = take_completion(&close_completion) {
                callback(Frame::Json(json!({ "type": "closed", "status": "closed" })));
            }
        };

        hub.connect(&channel_id, on_message, on_close).await;

        Self {
            hub: hub.clone(),
            channel_id,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn is_active(&self) -> bool {
        self.hub.is_connected(&self.channel_id)
    }

    /// Stop observing. Completion fires through the closed path if still pending.
    pub fn stop(&self) -> bool {
        self.hub.disconnect(&self.channel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::EventBus;
    use crate::core::transport::Transport;
    use crate::utils::test_utils::{wait_until, MemoryTransport};
    use chrono::TimeZone;

    fn hub_with(transport: &Arc<MemoryTransport>) -> ChannelHub {
        let transport: Arc<dyn Transport> = transport.clone();
        ChannelHub::new(transport, "ws://test/ws", Arc::new(EventBus::new()))
    }

    fn completion_recorder() -> (Arc<Mutex<Vec<Frame>>>, impl FnOnce(Frame) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |frame: Frame| sink.lock().unwrap().push(frame))
    }

    #[test]
    fn event_fields_fall_back_when_absent() {
        let received = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let full = StreamEvent::from_frame(
            &Frame::decode(
                r#"{"type":"warning","agent_name":"ASSESS","message":"3 repos skipped","timestamp":"2026-02-01T08:30:00Z"}"#,
            ),
            received,
        );
        assert_eq!(full.agent, "ASSESS");
        assert_eq!(full.kind, "warning");
        assert_eq!(full.text, "3 repos skipped");
        assert_eq!(
            full.timestamp,
            Utc.with_ymd_and_hms(2026, 2, 1, 8, 30, 0).unwrap()
        );

        let sparse = StreamEvent::from_frame(&Frame::decode(r#"{"progress":40}"#), received);
        assert_eq!(sparse.agent, "SYSTEM");
        assert_eq!(sparse.kind, "info");
        assert_eq!(sparse.text, r#"{"progress":40}"#);
        assert_eq!(sparse.timestamp, received);

        let raw = StreamEvent::from_frame(&Frame::decode("plain text line"), received);
        assert_eq!(raw.kind, "raw");
        assert_eq!(raw.text, "plain text line");
    }

    #[test]
    fn terminal_frames_are_detected_by_kind_or_status() {
        assert!(is_terminal(&Frame::decode(r#"{"type":"complete"}"#)));
        assert!(is_terminal(&Frame::decode(r#"{"type":"log","status":"done"}"#)));
        assert!(!is_terminal(&Frame::decode(r#"{"type":"log","status":"running"}"#)));
        assert!(!is_terminal(&Frame::decode("complete")));
    }

    #[tokio::test]
    async fn complete_frame_finishes_run_exactly_once() {
        let transport = MemoryTransport::new();
        let hub = hub_with(&transport);
        let log = EventLog::new();
        let (completions, on_complete) = completion_recorder();

        let sink = StreamSink::start(&hub, "42", log.clone(), on_complete).await;
        let peer = transport.next_peer().await;
        assert_eq!(peer.url, "ws://test/ws/agent/42");
        assert_eq!(sink.channel_id(), "agent/42");
        wait_until(|| sink.is_active()).await;

        peer.push(r#"{"type":"complete","agent_name":"ORCH"}"#);
        wait_until(|| !completions.lock().unwrap().is_empty()).await;
        wait_until(|| !hub.is_connected("agent/42")).await;
        peer.hang_up();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let events = log.snapshot();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "complete");
        assert_eq!(events[0].agent, "ORCH");

        let completions = completions.lock().unwrap();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].kind(), Some("complete"));
    }

    #[tokio::test]
    async fn done_status_also_completes_and_later_frames_are_ignored() {
        let transport = MemoryTransport::new();
        let hub = hub_with(&transport);
        let log = EventLog::new();
        let (completions, on_complete) = completion_recorder();

        let sink = StreamSink::start(&hub, "run-7", log.clone(), on_complete).await;
        let peer = transport.next_peer().await;
        wait_until(|| sink.is_active()).await;

        peer.push(r#"{"type":"log","agent_name":"MIGRATE","message":"terraform plan"}"#);
        peer.push(r#"{"type":"status","status":"done"}"#);
        peer.push(r#"{"type":"log","message":"after the end"}"#);
        wait_until(|| !completions.lock().unwrap().is_empty()).await;
        wait_until(|| !sink.is_active()).await;

        let texts: Vec<String> = log.snapshot().into_iter().map(|e| e.text).collect();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], "terraform plan");
        assert_eq!(completions.lock().unwrap()[0].str_field("status"), Some("done"));
    }

    #[tokio::test]
    async fn early_close_completes_with_synthesized_status() {
        let transport = MemoryTransport::new();
        let hub = hub_with(&transport);
        let log = EventLog::new();
        let (completions, on_complete) = completion_recorder();

        let sink = StreamSink::start(&hub, "9", log.clone(), on_complete).await;
        let peer = transport.next_peer().await;
        wait_until(|| sink.is_active()).await;

        peer.push(r#"{"type":"log","message":"halfway"}"#);
        peer.hang_up();
        wait_until(|| !completions.lock().unwrap().is_empty()).await;

        assert_eq!(log.len(), 1);
        let completions = completions.lock().unwrap();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].str_field("status"), Some("closed"));
    }

    #[tokio::test]
    async fn stop_before_completion_reports_closed_once() {
        let transport = MemoryTransport::new();
        let hub = hub_with(&transport);
        let (completions, on_complete) = completion_recorder();

        let sink = StreamSink::start(&hub, "5", EventLog::new(), on_complete).await;
        let _peer = transport.next_peer().await;
        wait_until(|| sink.is_active()).await;

        assert!(sink.stop());
        assert!(!sink.stop());
        wait_until(|| !completions.lock().unwrap().is_empty()).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(completions.lock().unwrap().len(), 1);
        assert_eq!(
            completions.lock().unwrap()[0].kind(),
            Some("closed")
        );
    }
}
