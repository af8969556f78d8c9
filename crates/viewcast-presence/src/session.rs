//! Presence sessions: one owned session per observed livestream.
//!
//! `PresenceClient::observe` spawns a background task that connects,
//! announces presence, and applies viewer-count pushes to shared state.
//! The returned `PresenceHandle` owns the session: dropping it cancels the
//! task, which retracts presence and closes the socket on its way out.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use viewcast_common::LivestreamId;

use crate::auth::CredentialStore;
use crate::connector::Connector;
use crate::task::{session_task, SessionContext};

/// Connection status of a presence session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// All connection attempts in the last cycle failed. The viewer count
    /// stays unknown; nothing else degrades.
    Errored,
}

/// Retry tunables for one session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Connection attempts per connect cycle before marking the session
    /// errored.
    pub connect_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Factory for presence sessions. Holds the endpoint, the credential store,
/// and the transport; each `observe` produces an independent session.
pub struct PresenceClient {
    base_url: String,
    store: Arc<dyn CredentialStore>,
    connector: Arc<dyn Connector>,
    options: SessionOptions,
}

impl PresenceClient {
    pub fn new(
        base_url: impl Into<String>,
        store: Arc<dyn CredentialStore>,
        connector: Arc<dyn Connector>,
        options: SessionOptions,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            store,
            connector,
            options,
        }
    }

    /// Begin observing a livestream. `None` is a no-op: the returned handle
    /// is inert and no connection is ever attempted.
    pub fn observe(&self, livestream_id: Option<LivestreamId>) -> PresenceHandle {
        let Some(livestream_id) = livestream_id else {
            return PresenceHandle::inert();
        };

        let viewer_count = Arc::new(RwLock::new(None));
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(session_task(SessionContext {
            livestream_id: livestream_id.clone(),
            base_url: self.base_url.clone(),
            options: self.options.clone(),
            store: Arc::clone(&self.store),
            connector: Arc::clone(&self.connector),
            viewer_count: Arc::clone(&viewer_count),
            state: Arc::clone(&state),
            cancel: cancel.clone(),
        }));

        PresenceHandle {
            livestream_id: Some(livestream_id),
            viewer_count,
            state,
            cancel,
            task: Some(task),
        }
    }

    /// Switch the observed livestream: fully tear down the old session,
    /// then observe the new id. There is no in-place re-room.
    pub async fn switch(
        &self,
        old: PresenceHandle,
        livestream_id: Option<LivestreamId>,
    ) -> PresenceHandle {
        old.stop().await;
        self.observe(livestream_id)
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Owner of one presence session. Exposes the latest observed viewer count
/// and the connection status; never surfaces errors.
pub struct PresenceHandle {
    livestream_id: Option<LivestreamId>,
    viewer_count: Arc<RwLock<Option<u64>>>,
    state: Arc<RwLock<ConnectionState>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PresenceHandle {
    fn inert() -> Self {
        Self {
            livestream_id: None,
            viewer_count: Arc::new(RwLock::new(None)),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// The livestream this handle observes, if any.
    pub fn livestream_id(&self) -> Option<&LivestreamId> {
        self.livestream_id.as_ref()
    }

    /// Latest server-pushed viewer count. `None` until the first update
    /// arrives; stale values persist across disconnects.
    pub async fn viewer_count(&self) -> Option<u64> {
        *self.viewer_count.read().await
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.connection_state().await == ConnectionState::Connected
    }

    /// Graceful teardown: retract presence if announced, close the
    /// connection, and wait for the session task to finish releasing it.
    /// Safe at any point in the lifecycle, including mid-connect.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PresenceHandle {
    fn drop(&mut self) {
        // Scoped release: cancellation is enough, the task retracts
        // presence and closes the socket before it exits.
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::connector::PresenceTransport;
    use crate::protocol::ClientMessage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering::SeqCst};
    use tokio::sync::mpsc;
    use viewcast_common::PresenceError;

    // -- mock transport ----------------------------------------------------

    /// Server side of one mock connection.
    struct MockConn {
        url: String,
        from_client: mpsc::UnboundedReceiver<String>,
        to_client: mpsc::UnboundedSender<String>,
        closed: Arc<AtomicBool>,
    }

    impl MockConn {
        async fn expect_client_message(&mut self) -> ClientMessage {
            let text = tokio::time::timeout(Duration::from_secs(1), self.from_client.recv())
                .await
                .expect("timed out waiting for client message")
                .expect("client hung up");
            serde_json::from_str(&text).expect("client sent invalid JSON")
        }

        fn push(&self, msg: &str) {
            let _ = self.to_client.send(msg.to_string());
        }

        fn closed(&self) -> bool {
            self.closed.load(SeqCst)
        }
    }

    struct MockTransport {
        out: mpsc::UnboundedSender<String>,
        incoming: mpsc::UnboundedReceiver<String>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl PresenceTransport for MockTransport {
        async fn send(&mut self, text: String) -> Result<(), PresenceError> {
            self.out
                .send(text)
                .map_err(|_| PresenceError::Send("peer gone".into()))
        }

        async fn recv(&mut self) -> Result<Option<String>, PresenceError> {
            Ok(self.incoming.recv().await)
        }

        async fn close(&mut self) {
            self.closed.store(true, SeqCst);
            self.incoming.close();
        }
    }

    struct MockConnector {
        attempts: AtomicUsize,
        /// Number of upcoming connects to refuse.
        fail_next: AtomicUsize,
        /// When set, connects never resolve (simulates a stalled handshake).
        hang: AtomicBool,
        conns: mpsc::UnboundedSender<MockConn>,
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self, url: &str) -> Result<Box<dyn PresenceTransport>, PresenceError> {
            self.attempts.fetch_add(1, SeqCst);
            if self.hang.load(SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.fail_next.load(SeqCst) > 0 {
                self.fail_next.fetch_sub(1, SeqCst);
                return Err(PresenceError::Connect("connection refused".into()));
            }
            let (to_server, from_client) = mpsc::unbounded_channel();
            let (to_client, from_server) = mpsc::unbounded_channel();
            let closed = Arc::new(AtomicBool::new(false));
            let _ = self.conns.send(MockConn {
                url: url.to_string(),
                from_client,
                to_client,
                closed: Arc::clone(&closed),
            });
            Ok(Box::new(MockTransport {
                out: to_server,
                incoming: from_server,
                closed,
            }))
        }
    }

    fn mock_connector() -> (Arc<MockConnector>, mpsc::UnboundedReceiver<MockConn>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(MockConnector {
            attempts: AtomicUsize::new(0),
            fail_next: AtomicUsize::new(0),
            hang: AtomicBool::new(false),
            conns: tx,
        });
        (connector, rx)
    }

    // -- helpers -----------------------------------------------------------

    fn client_with(connector: Arc<MockConnector>, store: Arc<dyn CredentialStore>) -> PresenceClient {
        PresenceClient::new(
            "ws://test",
            store,
            connector,
            SessionOptions {
                connect_attempts: 3,
                retry_delay: Duration::from_millis(10),
            },
        )
    }

    async fn accept(conns: &mut mpsc::UnboundedReceiver<MockConn>) -> MockConn {
        tokio::time::timeout(Duration::from_secs(1), conns.recv())
            .await
            .expect("timed out waiting for connection")
            .expect("connector gone")
    }

    async fn wait_for_count(handle: &PresenceHandle, expected: Option<u64>) {
        for _ in 0..200 {
            if handle.viewer_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("viewer count never became {expected:?}");
    }

    async fn wait_for_state(handle: &PresenceHandle, expected: ConnectionState) {
        for _ in 0..200 {
            if handle.connection_state().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("connection state never became {expected:?}");
    }

    // -- tests -------------------------------------------------------------

    #[tokio::test]
    async fn observe_none_never_connects() {
        let (connector, _conns) = mock_connector();
        let client = client_with(Arc::clone(&connector), Arc::new(StaticToken::new("jwt")));

        let handle = client.observe(None);
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(connector.attempts.load(SeqCst), 0);
        assert!(handle.livestream_id().is_none());
        assert_eq!(handle.connection_state().await, ConnectionState::Disconnected);
        assert_eq!(handle.viewer_count().await, None);
    }

    #[tokio::test]
    async fn missing_credential_skips_connection() {
        let (connector, _conns) = mock_connector();
        let client = client_with(Arc::clone(&connector), Arc::new(StaticToken::absent()));

        let handle = client.observe(Some(LivestreamId::from("ls-1")));
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(connector.attempts.load(SeqCst), 0);
        assert_eq!(handle.connection_state().await, ConnectionState::Disconnected);
        handle.stop().await;
    }

    #[tokio::test]
    async fn connect_joins_and_applies_count() {
        let (connector, mut conns) = mock_connector();
        let client = client_with(connector, Arc::new(StaticToken::new("jwt")));

        let handle = client.observe(Some(LivestreamId::from("ls-1")));
        let mut conn = accept(&mut conns).await;

        assert!(conn.url.ends_with("/livestream?token=jwt"), "url was {}", conn.url);
        assert_eq!(
            conn.expect_client_message().await,
            ClientMessage::JoinLivestream {
                livestream_id: LivestreamId::from("ls-1")
            }
        );

        conn.push(r#"{"event":"viewerCount","data":{"count":42}}"#);
        wait_for_count(&handle, Some(42)).await;
        assert!(handle.is_connected().await);

        handle.stop().await;
    }

    #[tokio::test]
    async fn counts_are_last_write_wins() {
        let (connector, mut conns) = mock_connector();
        let client = client_with(connector, Arc::new(StaticToken::new("jwt")));

        let handle = client.observe(Some(LivestreamId::from("ls-1")));
        let mut conn = accept(&mut conns).await;
        conn.expect_client_message().await;

        conn.push(r#"{"event":"viewerCount","data":{"count":10}}"#);
        conn.push(r#"{"event":"viewerCount","data":{"count":7}}"#);
        conn.push(r#"{"event":"viewerCount","data":{"count":12}}"#);
        wait_for_count(&handle, Some(12)).await;

        handle.stop().await;
    }

    #[tokio::test]
    async fn stop_after_join_sends_leave_then_closes() {
        let (connector, mut conns) = mock_connector();
        let client = client_with(connector, Arc::new(StaticToken::new("jwt")));

        let handle = client.observe(Some(LivestreamId::from("ls-1")));
        let mut conn = accept(&mut conns).await;
        conn.expect_client_message().await;
        conn.push(r#"{"event":"viewerCount","data":{"count":5}}"#);
        wait_for_count(&handle, Some(5)).await;

        handle.stop().await;

        assert_eq!(
            conn.expect_client_message().await,
            ClientMessage::LeaveLivestream {
                livestream_id: LivestreamId::from("ls-1")
            }
        );
        assert!(conn.closed());
    }

    #[tokio::test]
    async fn stop_before_join_sends_no_leave() {
        let (connector, mut conns) = mock_connector();
        connector.fail_next.store(100, SeqCst);
        let client = client_with(Arc::clone(&connector), Arc::new(StaticToken::new("jwt")));

        let handle = client.observe(Some(LivestreamId::from("ls-1")));
        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.stop().await;

        assert!(conns.try_recv().is_err(), "no connection should exist");
        assert!(connector.attempts.load(SeqCst) <= 3);
    }

    #[tokio::test]
    async fn exhausted_retries_mark_errored() {
        let (connector, _conns) = mock_connector();
        connector.fail_next.store(100, SeqCst);
        let client = client_with(Arc::clone(&connector), Arc::new(StaticToken::new("jwt")));

        let handle = client.observe(Some(LivestreamId::from("ls-1")));
        wait_for_state(&handle, ConnectionState::Errored).await;

        assert_eq!(connector.attempts.load(SeqCst), 3);
        assert_eq!(handle.viewer_count().await, None);
        handle.stop().await;
    }

    #[tokio::test]
    async fn reconnect_announces_again() {
        let (connector, mut conns) = mock_connector();
        let client = client_with(Arc::clone(&connector), Arc::new(StaticToken::new("jwt")));

        let handle = client.observe(Some(LivestreamId::from("ls-1")));
        let mut conn1 = accept(&mut conns).await;
        conn1.expect_client_message().await;
        conn1.push(r#"{"event":"viewerCount","data":{"count":10}}"#);
        wait_for_count(&handle, Some(10)).await;

        // Server drops the connection; the session reconnects and
        // re-announces on the fresh connection.
        drop(conn1);
        let mut conn2 = accept(&mut conns).await;
        assert_eq!(
            conn2.expect_client_message().await,
            ClientMessage::JoinLivestream {
                livestream_id: LivestreamId::from("ls-1")
            }
        );
        assert_eq!(connector.attempts.load(SeqCst), 2);

        // Stale count persists until the new connection pushes one.
        assert_eq!(handle.viewer_count().await, Some(10));

        handle.stop().await;
    }

    #[tokio::test]
    async fn switch_tears_down_old_session_before_joining_new() {
        let (connector, mut conns) = mock_connector();
        let client = client_with(connector, Arc::new(StaticToken::new("jwt")));

        let handle = client.observe(Some(LivestreamId::from("ls-1")));
        let mut conn1 = accept(&mut conns).await;
        conn1.expect_client_message().await;
        conn1.push(r#"{"event":"viewerCount","data":{"count":3}}"#);
        wait_for_count(&handle, Some(3)).await;

        let handle2 = client.switch(handle, Some(LivestreamId::from("ls-2"))).await;

        assert_eq!(
            conn1.expect_client_message().await,
            ClientMessage::LeaveLivestream {
                livestream_id: LivestreamId::from("ls-1")
            }
        );
        assert!(conn1.closed());

        let mut conn2 = accept(&mut conns).await;
        assert_eq!(
            conn2.expect_client_message().await,
            ClientMessage::JoinLivestream {
                livestream_id: LivestreamId::from("ls-2")
            }
        );
        // The new session starts with its own unknown count.
        assert_eq!(handle2.viewer_count().await, None);

        handle2.stop().await;
    }

    #[tokio::test]
    async fn stop_during_pending_connect_releases_cleanly() {
        let (connector, mut conns) = mock_connector();
        connector.hang.store(true, SeqCst);
        let client = client_with(Arc::clone(&connector), Arc::new(StaticToken::new("jwt")));

        let handle = client.observe(Some(LivestreamId::from("ls-1")));
        for _ in 0..200 {
            if connector.attempts.load(SeqCst) >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(connector.attempts.load(SeqCst), 1);

        // Teardown must not wait on the stalled handshake.
        tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop hung on a pending connect");

        // A fresh observe of the same id establishes without interference.
        connector.hang.store(false, SeqCst);
        let handle2 = client.observe(Some(LivestreamId::from("ls-1")));
        let mut conn = accept(&mut conns).await;
        assert_eq!(
            conn.expect_client_message().await,
            ClientMessage::JoinLivestream {
                livestream_id: LivestreamId::from("ls-1")
            }
        );
        handle2.stop().await;
    }

    #[tokio::test]
    async fn server_error_message_keeps_connection_alive() {
        let (connector, mut conns) = mock_connector();
        let client = client_with(connector, Arc::new(StaticToken::new("jwt")));

        let handle = client.observe(Some(LivestreamId::from("ls-1")));
        let mut conn = accept(&mut conns).await;
        conn.expect_client_message().await;

        conn.push(r#"{"event":"error","data":{"message":"shedding load"}}"#);
        conn.push(r#"{"event":"viewerCount","data":{"count":8}}"#);
        wait_for_count(&handle, Some(8)).await;
        assert!(handle.is_connected().await);

        handle.stop().await;
    }

    #[tokio::test]
    async fn dropping_the_handle_retracts_presence() {
        let (connector, mut conns) = mock_connector();
        let client = client_with(connector, Arc::new(StaticToken::new("jwt")));

        let handle = client.observe(Some(LivestreamId::from("ls-1")));
        let mut conn = accept(&mut conns).await;
        conn.expect_client_message().await;
        conn.push(r#"{"event":"viewerCount","data":{"count":1}}"#);
        wait_for_count(&handle, Some(1)).await;

        drop(handle);

        assert_eq!(
            conn.expect_client_message().await,
            ClientMessage::LeaveLivestream {
                livestream_id: LivestreamId::from("ls-1")
            }
        );
        for _ in 0..200 {
            if conn.closed() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("connection never closed after drop");
    }
}
