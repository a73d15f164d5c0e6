use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{sink, stream};
use tokio::sync::mpsc;

use crate::core::events::EventBus;
use crate::core::persona::PersonaRegistry;
use crate::core::session::{MemorySessionStore, Navigator, SessionManager};
use crate::core::transport::{Connection, Transport, TransportError};

#[derive(Default)]
pub struct RecordingNavigator {
    pub routes: Mutex<Vec<String>>,
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.routes.lock().unwrap().push(route.to_string());
    }
}

pub fn create_test_session_manager() -> Arc<SessionManager> {
    Arc::new(SessionManager::new(
        Arc::new(PersonaRegistry::builtin()),
        Box::new(MemorySessionStore::new()),
        Arc::new(RecordingNavigator::default()),
        Arc::new(EventBus::new()),
    ))
}

pub fn create_test_session_with_persona(persona_id: &str) -> Arc<SessionManager> {
    let manager = create_test_session_manager();
    manager
        .set_persona(persona_id)
        .expect("test persona should exist");
    manager
}

/// A local address with nothing listening on it.
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}/api")
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Server side of one in-memory connection.
pub struct MemoryPeer {
    pub url: String,
    to_client: mpsc::UnboundedSender<Result<String, TransportError>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    pub fn push(&self, payload: &str) {
        let _ = self.to_client.send(Ok(payload.to_string()));
    }

    pub fn fail(&self, message: &str) {
        let _ = self.to_client.send(Err(TransportError::new(message)));
    }

    /// Close the connection from the server side.
    pub fn hang_up(self) {}

    pub async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(2), self.from_client.recv())
            .await
            .ok()
            .flatten()
    }
}

/// Transport whose connections are driven by the test through [`MemoryPeer`]s.
pub struct MemoryTransport {
    refuse: bool,
    opened: AtomicUsize,
    peers_tx: mpsc::UnboundedSender<MemoryPeer>,
    peers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MemoryPeer>>,
}

impl MemoryTransport {
    pub fn new() -> Arc<Self> {
        Self::build(false)
    }

    pub fn refusing() -> Arc<Self> {
        Self::build(true)
    }

    fn build(refuse: bool) -> Arc<Self> {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            refuse,
            opened: AtomicUsize::new(0),
            peers_tx,
            peers_rx: tokio::sync::Mutex::new(peers_rx),
        })
    }

    pub async fn next_peer(&self) -> MemoryPeer {
        let mut peers = self.peers_rx.lock().await;
        tokio::time::timeout(Duration::from_secs(2), peers.recv())
            .await
            .expect("connection opened in time")
            .expect("transport alive")
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, url: &str) -> Result<Connection, TransportError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(TransportError::new("connection refused"));
        }

        let (to_client, client_rx) = mpsc::unbounded_channel();
        let (client_tx, from_client) = mpsc::unbounded_channel::<String>();

        let incoming = stream::unfold(client_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        let outgoing = sink::unfold(client_tx, |tx, text: String| async move {
            tx.send(text)
                .map_err(|_| TransportError::new("peer gone"))?;
            Ok::<_, TransportError>(tx)
        });

        let _ = self.peers_tx.send(MemoryPeer {
            url: url.to_string(),
            to_client,
            from_client,
        });

        Ok(Connection {
            outgoing: Box::pin(outgoing),
            incoming: Box::pin(incoming),
        })
    }
}
