//! Follow an agent run's event stream

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::core::channel_hub::{ChannelHub, Frame};
use crate::core::config::Config;
use crate::core::events::EventBus;
use crate::core::stream_sink::{is_terminal, EventLog, StreamEvent, StreamSink};
use crate::core::transport::WebSocketTransport;

const PRINT_INTERVAL: Duration = Duration::from_millis(100);

pub fn format_event(event: &StreamEvent) -> String {
    format!(
        "[{}] {:<10} {:<8} {}",
        event.timestamp.format("%H:%M:%S"),
        event.agent,
        event.kind,
        event.text
    )
}

fn print_new(log: &EventLog, printed: usize) -> usize {
    let events = log.snapshot();
    for event in events.iter().skip(printed) {
        println!("{}", format_event(event));
    }
    events.len().max(printed)
}

pub async fn run_watch(
    config: &Config,
    events: Arc<EventBus>,
    run_id: &str,
) -> Result<(), Box<dyn Error>> {
    events.channel_errored.subscribe(|errored| {
        eprintln!("⚠️  {}: {}", errored.channel_id, errored.message);
    });

    let hub = ChannelHub::new(
        Arc::new(WebSocketTransport),
        &config.realtime_base,
        Arc::clone(&events),
    );
    let log = EventLog::new();
    let (done_tx, mut done_rx) = oneshot::channel::<Frame>();

    let sink = StreamSink::start(&hub, run_id, log.clone(), move |frame| {
        let _ = done_tx.send(frame);
    })
    .await;
    eprintln!("📡 Watching {} (Ctrl+C to stop)", sink.channel_id());

    let mut printed = 0;
    let mut ticker = tokio::time::interval(PRINT_INTERVAL);
    let outcome = loop {
        tokio::select! {
            frame = &mut done_rx => break frame.ok(),
            _ = tokio::signal::ctrl_c() => {
                sink.stop();
            }
            _ = ticker.tick() => {
                printed = print_new(&log, printed);
            }
        }
    };
    print_new(&log, printed);
    hub.shutdown().await;

    match outcome {
        Some(frame) if is_terminal(&frame) => {
            println!("✅ Run {run_id} complete");
            Ok(())
        }
        _ => Err(format!("Stream for run {run_id} closed before completion").into()),
    }
}
