//! Module `matchmaker`
//!
//! The single owner of the waitlist and pair registry. Registration and
//! unregistration arrive as events on one channel and are applied one at a
//! time, which makes every operation a critical section without holding a
//! lock across network I/O. All handle I/O (notices, closes, relaying) runs on
//! spawned tasks.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::client::{Client, ClientId};
use crate::config::ServerConfig;
use crate::connection::Payload;
use crate::error::MatchmakerError;
use crate::matchmaking::operations::MatchmakingState;
use crate::matchmaking::results::{MatchmakingSnapshot, RegisterOutcome, UnregisterOutcome};
use crate::relay::{relay, watch_waiting};

/// Bound on a teardown write when the caller doesn't pick one.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Control messages the server itself sends to clients.
#[derive(Debug, Clone)]
pub struct Notices {
    /// Sent to both clients when a pairing is established
    pub connected: Payload,
    /// Sent to the remaining client when its partner leaves
    pub partner_disconnected: Payload,
}

impl Default for Notices {
    fn default() -> Self {
        Self {
            connected: Payload::text("connected"),
            partner_disconnected: Payload::text("Partner disconnected"),
        }
    }
}

impl From<&ServerConfig> for Notices {
    fn from(config: &ServerConfig) -> Self {
        Self {
            connected: Payload::text(config.connected_notice.clone()),
            partner_disconnected: Payload::text(config.partner_disconnected_notice.clone()),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Event {
    Register(Client),
    Unregister(Client),
    Snapshot(oneshot::Sender<MatchmakingSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable entry point to the matchmaker.
///
/// `register` and `unregister` only enqueue an event and never block.
#[derive(Debug, Clone)]
pub struct MatchmakerHandle {
    events: mpsc::UnboundedSender<Event>,
}

impl MatchmakerHandle {
    /// Submit a newly connected client for pairing.
    pub fn register(&self, client: Client) -> Result<(), MatchmakerError> {
        self.submit(Event::Register(client))
    }

    /// Submit a disconnect. Safe to call repeatedly for the same client.
    pub fn unregister(&self, client: Client) -> Result<(), MatchmakerError> {
        self.submit(Event::Unregister(client))
    }

    /// Consistent view of who is waiting and who is paired, taken after every
    /// previously submitted event has been applied.
    pub async fn snapshot(&self) -> Result<MatchmakingSnapshot, MatchmakerError> {
        let (reply, response) = oneshot::channel();
        self.submit(Event::Snapshot(reply))?;
        response.await.map_err(|_| MatchmakerError::Stopped)
    }

    /// Close every client and stop the matchmaking loop.
    pub async fn shutdown(&self) -> Result<(), MatchmakerError> {
        let (reply, response) = oneshot::channel();
        self.submit(Event::Shutdown(reply))?;
        response.await.map_err(|_| MatchmakerError::Stopped)
    }

    fn submit(&self, event: Event) -> Result<(), MatchmakerError> {
        self.events.send(event).map_err(|_| MatchmakerError::Stopped)
    }

    /// A handle with no matchmaker behind it, exposing the raw event stream.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (Self { events }, receiver)
    }
}

/// Matchmaking event loop
pub struct Matchmaker {
    state: MatchmakingState,
    events: mpsc::UnboundedReceiver<Event>,
    handle: MatchmakerHandle,
    notices: Notices,
    write_timeout: Duration,
    standby: HashMap<ClientId, CancellationToken>,
}

impl Matchmaker {
    /// Start the matchmaking loop on the current runtime.
    pub fn spawn(notices: Notices) -> (MatchmakerHandle, JoinHandle<()>) {
        Self::spawn_with_timeout(notices, DEFAULT_WRITE_TIMEOUT)
    }

    /// Like `spawn`, with `write_timeout` bounding every disconnect notice and
    /// close issued during teardown and shutdown.
    pub fn spawn_with_timeout(
        notices: Notices,
        write_timeout: Duration,
    ) -> (MatchmakerHandle, JoinHandle<()>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let handle = MatchmakerHandle { events };

        let matchmaker = Matchmaker {
            state: MatchmakingState::new(),
            events: receiver,
            handle: handle.clone(),
            notices,
            write_timeout,
            standby: HashMap::new(),
        };

        let task = tokio::spawn(matchmaker.run());
        (handle, task)
    }

    async fn run(mut self) {
        info!("Matchmaker started");

        while let Some(event) = self.events.recv().await {
            match event {
                Event::Register(client) => self.on_register(client),
                Event::Unregister(client) => self.on_unregister(client),
                Event::Snapshot(reply) => {
                    let _ = reply.send(self.state.snapshot());
                }
                Event::Shutdown(done) => {
                    self.on_shutdown().await;
                    let _ = done.send(());
                    break;
                }
            }
        }

        info!("Matchmaker stopped");
    }

    fn on_register(&mut self, client: Client) {
        match self.state.register(client.clone()) {
            RegisterOutcome::Waiting { position } => {
                info!("{} waiting for a partner (position {})", client, position);
                let paired = CancellationToken::new();
                self.standby.insert(client.id(), paired.clone());
                tokio::spawn(watch_waiting(client, self.handle.clone(), paired));
            }
            RegisterOutcome::Paired { partner } => {
                // the watcher must let go of the partner's handle before its relay reads
                if let Some(paired) = self.standby.remove(&partner.id()) {
                    paired.cancel();
                }
                info!("Paired {} with {}", client, partner);
                self.start_chat(client, partner);
            }
            RegisterOutcome::AlreadyRegistered => {
                warn!("{} is already registered, ignoring", client);
            }
        }
    }

    /// Spawn both relay directions for a freshly installed pair.
    fn start_chat(&self, a: Client, b: Client) {
        tokio::spawn(relay(
            a.clone(),
            b.clone(),
            self.handle.clone(),
            Some(self.notices.connected.clone()),
        ));
        tokio::spawn(relay(
            b,
            a,
            self.handle.clone(),
            Some(self.notices.connected.clone()),
        ));
    }

    fn on_unregister(&mut self, client: Client) {
        if let Some(paired) = self.standby.remove(&client.id()) {
            paired.cancel();
        }

        let partner = match self.state.unregister(&client) {
            UnregisterOutcome::LeftWaitlist => {
                info!("{} left the waitlist", client);
                None
            }
            UnregisterOutcome::Unpaired { partner } => {
                info!("{} disconnected, ending chat with {}", client, partner);
                Some(partner)
            }
            UnregisterOutcome::Unknown => {
                debug!("{} already torn down", client);
                None
            }
        };

        tokio::spawn(teardown(
            client,
            partner,
            self.notices.partner_disconnected.clone(),
            self.write_timeout,
        ));
    }

    async fn on_shutdown(&mut self) {
        for (_, paired) in self.standby.drain() {
            paired.cancel();
        }

        let clients = self.state.drain();
        info!("Matchmaker shutting down, closing {} clients", clients.len());
        let closes =
            futures::future::join_all(clients.iter().map(|client| client.handle().close()));
        if timeout(self.write_timeout, closes).await.is_err() {
            warn!("Shutdown gave up on clients still closing after {:?}", self.write_timeout);
        }
    }
}

/// Close `client` and, alongside, give its partner a bounded chance to read
/// the notice before closing it too.
async fn teardown(client: Client, partner: Option<Client>, notice: Payload, limit: Duration) {
    let release_partner = async {
        let Some(partner) = partner else { return };
        match timeout(limit, partner.handle().send(notice)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Disconnect notice to {} not delivered: {}", partner, e),
            Err(_) => debug!("Disconnect notice to {} timed out", partner),
        }
        if timeout(limit, partner.handle().close()).await.is_err() {
            warn!("Closing {} timed out", partner);
        }
    };
    let release_client = async {
        if timeout(limit, client.handle().close()).await.is_err() {
            warn!("Closing {} timed out", client);
        }
    };

    tokio::join!(release_client, release_partner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionHandle, MemoryConnection, MemoryPeer};
    use crate::error::ConnectionError;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Arc;

    /// A client whose socket stopped draining: writes never complete.
    struct StalledConnection {
        closed: CancellationToken,
        hang_on_close: bool,
    }

    impl StalledConnection {
        fn new() -> Self {
            Self {
                closed: CancellationToken::new(),
                hang_on_close: false,
            }
        }

        fn hanging_on_close() -> Self {
            Self {
                hang_on_close: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl ConnectionHandle for StalledConnection {
        async fn recv(&self) -> Result<Payload, ConnectionError> {
            self.closed.cancelled().await;
            Err(ConnectionError::Closed)
        }

        async fn send(&self, _payload: Payload) -> Result<(), ConnectionError> {
            std::future::pending().await
        }

        async fn close(&self) {
            self.closed.cancel();
            if self.hang_on_close {
                std::future::pending::<()>().await;
            }
        }

        fn is_closed(&self) -> bool {
            self.closed.is_cancelled()
        }
    }

    fn memory_client() -> (Client, MemoryPeer) {
        let (connection, peer) = MemoryConnection::pair();
        (Client::new(Arc::new(connection)), peer)
    }

    async fn next(peer: &mut MemoryPeer) -> Option<Payload> {
        timeout(Duration::from_secs(2), peer.recv())
            .await
            .expect("timed out waiting for a message")
    }

    async fn closed(peer: &MemoryPeer) {
        timeout(Duration::from_secs(2), peer.closed())
            .await
            .expect("timed out waiting for close");
    }

    #[tokio::test]
    async fn pairing_notifies_both_clients() {
        let (matchmaker, _task) = Matchmaker::spawn(Notices::default());
        let (a, mut pa) = memory_client();
        let (b, mut pb) = memory_client();

        matchmaker.register(a.clone()).unwrap();
        matchmaker.register(b.clone()).unwrap();

        assert_eq!(next(&mut pa).await, Some(Payload::text("connected")));
        assert_eq!(next(&mut pb).await, Some(Payload::text("connected")));

        let snapshot = matchmaker.snapshot().await.unwrap();
        assert_eq!(snapshot.partner_of(a.id()), Some(b.id()));
        assert_eq!(snapshot.waiting_count(), 0);
    }

    #[tokio::test]
    async fn three_clients_scenario() {
        let (matchmaker, _task) = Matchmaker::spawn(Notices::default());
        let (c1, mut p1) = memory_client();
        let (c2, mut p2) = memory_client();
        let (c3, mut p3) = memory_client();

        matchmaker.register(c1.clone()).unwrap();
        let snapshot = matchmaker.snapshot().await.unwrap();
        assert_eq!(snapshot.waiting, vec![c1.id()]);

        matchmaker.register(c2.clone()).unwrap();
        assert_eq!(next(&mut p1).await, Some(Payload::text("connected")));
        assert_eq!(next(&mut p2).await, Some(Payload::text("connected")));

        assert!(p1.send("hello"));
        assert_eq!(next(&mut p2).await, Some(Payload::text("hello")));

        matchmaker.register(c3.clone()).unwrap();
        let snapshot = matchmaker.snapshot().await.unwrap();
        assert_eq!(snapshot.waiting, vec![c3.id()]);
        assert_eq!(snapshot.pairs.len(), 1);

        p2.disconnect();

        assert_eq!(next(&mut p1).await, Some(Payload::text("Partner disconnected")));
        assert_eq!(next(&mut p1).await, None);
        closed(&p1).await;
        closed(&p2).await;

        let snapshot = matchmaker.snapshot().await.unwrap();
        assert_eq!(snapshot.waiting, vec![c3.id()]);
        assert!(snapshot.pairs.is_empty());
        assert!(snapshot.is_absent(c1.id()));
        assert!(snapshot.is_absent(c2.id()));

        assert!(!p3.is_closed());
        assert!(p3.try_recv().is_none());
    }

    #[tokio::test]
    async fn waiting_client_disconnect_is_silent() {
        let (matchmaker, _task) = Matchmaker::spawn(Notices::default());
        let (a, mut pa) = memory_client();
        let (b, mut pb) = memory_client();

        matchmaker.register(a.clone()).unwrap();
        matchmaker.snapshot().await.unwrap();

        pa.disconnect();
        closed(&pa).await;

        let snapshot = matchmaker.snapshot().await.unwrap();
        assert!(snapshot.is_absent(a.id()));
        assert_eq!(pa.recv().await, None);

        // the departed client is not handed to the next arrival
        matchmaker.register(b.clone()).unwrap();
        let snapshot = matchmaker.snapshot().await.unwrap();
        assert_eq!(snapshot.waiting, vec![b.id()]);
        assert!(pb.try_recv().is_none());
    }

    #[tokio::test]
    async fn repeated_unregister_sends_one_notice() {
        let (matchmaker, _task) = Matchmaker::spawn(Notices::default());
        let (a, mut pa) = memory_client();
        let (b, mut pb) = memory_client();

        matchmaker.register(a.clone()).unwrap();
        matchmaker.register(b.clone()).unwrap();
        assert_eq!(next(&mut pa).await, Some(Payload::text("connected")));
        assert_eq!(next(&mut pb).await, Some(Payload::text("connected")));

        matchmaker.unregister(a.clone()).unwrap();
        matchmaker.unregister(a.clone()).unwrap();

        assert_eq!(next(&mut pb).await, Some(Payload::text("Partner disconnected")));
        assert_eq!(next(&mut pb).await, None);
        assert_eq!(next(&mut pa).await, None);

        let snapshot = matchmaker.snapshot().await.unwrap();
        assert_eq!(snapshot, MatchmakingSnapshot::default());
    }

    #[tokio::test]
    async fn paired_client_messages_reach_only_its_partner() {
        let (matchmaker, _task) = Matchmaker::spawn(Notices::default());
        let clients: Vec<_> = (0..4).map(|_| memory_client()).collect();
        let (ids, mut peers): (Vec<_>, Vec<_>) = clients.into_iter().unzip();

        for client in &ids {
            matchmaker.register(client.clone()).unwrap();
        }
        for peer in peers.iter_mut() {
            assert_eq!(next(peer).await, Some(Payload::text("connected")));
        }

        assert!(peers[0].send("to one"));
        assert!(peers[3].send(Payload::binary(vec![3, 2])));

        assert_eq!(next(&mut peers[1]).await, Some(Payload::text("to one")));
        assert_eq!(next(&mut peers[2]).await, Some(Payload::binary(vec![3, 2])));
        assert!(peers[0].try_recv().is_none());
        assert!(peers[3].try_recv().is_none());
    }

    #[tokio::test]
    async fn custom_notices_are_used() {
        let config = ServerConfig {
            connected_notice: "you are paired".into(),
            partner_disconnected_notice: "they left".into(),
            ..ServerConfig::default()
        };
        let (matchmaker, _task) = Matchmaker::spawn(Notices::from(&config));
        let (a, mut pa) = memory_client();
        let (b, mut pb) = memory_client();

        matchmaker.register(a).unwrap();
        matchmaker.register(b).unwrap();
        assert_eq!(next(&mut pa).await, Some(Payload::text("you are paired")));
        assert_eq!(next(&mut pb).await, Some(Payload::text("you are paired")));

        pb.disconnect();
        assert_eq!(next(&mut pa).await, Some(Payload::text("they left")));
    }

    #[tokio::test]
    async fn shutdown_closes_everyone_and_stops() {
        let (matchmaker, task) = Matchmaker::spawn(Notices::default());
        let peers: Vec<_> = (0..3)
            .map(|_| {
                let (client, peer) = memory_client();
                matchmaker.register(client).unwrap();
                peer
            })
            .collect();

        matchmaker.shutdown().await.unwrap();
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();

        for peer in &peers {
            assert!(peer.is_closed());
        }

        let (late, _peer) = memory_client();
        assert!(matches!(matchmaker.register(late), Err(MatchmakerError::Stopped)));
        assert!(matchmaker.snapshot().await.is_err());
    }

    #[tokio::test]
    async fn stalled_partner_does_not_hold_up_teardown() {
        let (matchmaker, _task) =
            Matchmaker::spawn_with_timeout(Notices::default(), Duration::from_millis(100));
        let stalled = Arc::new(StalledConnection::new());
        let s = Client::new(stalled.clone());
        let (a, mut pa) = memory_client();

        matchmaker.register(s.clone()).unwrap();
        matchmaker.register(a.clone()).unwrap();
        assert_eq!(next(&mut pa).await, Some(Payload::text("connected")));

        matchmaker.unregister(a.clone()).unwrap();

        closed(&pa).await;
        timeout(Duration::from_secs(2), stalled.closed.cancelled())
            .await
            .expect("stalled partner was never closed");

        let snapshot = matchmaker.snapshot().await.unwrap();
        assert!(snapshot.is_absent(a.id()));
        assert!(snapshot.is_absent(s.id()));
    }

    #[tokio::test]
    async fn shutdown_gives_up_on_clients_that_never_close() {
        let (matchmaker, task) =
            Matchmaker::spawn_with_timeout(Notices::default(), Duration::from_millis(100));
        let stuck = Client::new(Arc::new(StalledConnection::hanging_on_close()));
        let (other, peer) = memory_client();

        matchmaker.register(stuck).unwrap();
        matchmaker.register(other).unwrap();

        timeout(Duration::from_secs(2), matchmaker.shutdown())
            .await
            .expect("shutdown never finished")
            .unwrap();
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(peer.is_closed());
    }

    #[tokio::test]
    async fn both_partners_leaving_at_once_sends_one_notice() {
        let (matchmaker, _task) = Matchmaker::spawn(Notices::default());
        let (a, mut pa) = memory_client();
        let (b, mut pb) = memory_client();

        matchmaker.register(a).unwrap();
        matchmaker.register(b).unwrap();
        assert_eq!(next(&mut pa).await, Some(Payload::text("connected")));
        assert_eq!(next(&mut pb).await, Some(Payload::text("connected")));

        pa.disconnect();
        pb.disconnect();

        let mut notices = 0;
        for peer in [&mut pa, &mut pb] {
            while let Some(payload) = next(peer).await {
                assert_eq!(payload, Payload::text("Partner disconnected"));
                notices += 1;
            }
        }
        assert_eq!(notices, 1);

        let snapshot = matchmaker.snapshot().await.unwrap();
        assert_eq!(snapshot, MatchmakingSnapshot::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_arrivals_and_departures_keep_pairs_consistent() {
        let (matchmaker, _task) = Matchmaker::spawn(Notices::default());

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let matchmaker = matchmaker.clone();
                tokio::spawn(async move {
                    let (client, peer) = memory_client();
                    matchmaker.register(client.clone()).unwrap();
                    let left = i % 3 == 0;
                    if left {
                        matchmaker.unregister(client.clone()).unwrap();
                    }
                    (client, peer, left)
                })
            })
            .collect();

        let mut clients = Vec::new();
        for joined in futures::future::join_all(tasks).await {
            clients.push(joined.unwrap());
        }

        let snapshot = matchmaker.snapshot().await.unwrap();

        let mut paired = HashSet::new();
        for &(x, y) in &snapshot.pairs {
            assert!(paired.insert(x), "{} paired twice", x);
            assert!(paired.insert(y), "{} paired twice", y);
            assert_eq!(snapshot.partner_of(x), Some(y));
            assert_eq!(snapshot.partner_of(y), Some(x));
        }
        assert!(snapshot.waiting_count() <= 1);

        for (client, _peer, left) in &clients {
            let id = client.id();
            let states = [snapshot.is_waiting(id), snapshot.is_paired(id), snapshot.is_absent(id)];
            assert_eq!(states.iter().filter(|s| **s).count(), 1, "{} in several states", id);
            if *left {
                assert!(snapshot.is_absent(id), "{} still known after leaving", id);
            }
        }
    }
}
