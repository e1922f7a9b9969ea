//! The facade the application drives: one [`NetworkManager`] value, two
//! calls per frame.
//!
//! `pre_tick_update` drains the sockets, runs the reliability engine
//! over everything that arrived and executes the resulting messages
//! against the driver. `post_tick_update` runs replication, keepalives
//! and retransmission, then flushes every peer's accumulation buffers to
//! the wire. Nothing blocks and nothing runs between ticks; all waiting
//! is expressed as timers accumulated across frames.

use std::{net::SocketAddr, time::Duration};

use bytes::{Bytes, BytesMut};

use crate::{
    NetError,
    callbacks::{Callback, Callbacks, LifecycleEvent},
    driver::NetDriver,
    protocol::{
        constants::{
            CONNECT_RETRY_INTERVAL, CONNECT_TIMEOUT, DEFAULT_DISCOVERY_PORT, DEFAULT_GAME_PORT,
            INACTIVITY_TIMEOUT, MAX_MSG_BODY_SIZE, MAX_NET_FUNC_PARAMS, PING_INTERVAL,
            RECV_BUFFER_SIZE,
        },
        datum::Datum,
        header::PacketHeader,
        message::{
            Accept, Broadcast, Connect, Disconnect, Invoke, InvokeScript, Kick, KickReason,
            LoadLevel, NetMsg, Ping, Ready, Reject, RejectReason,
        },
        seqnum::SeqNum,
    },
    replication::{Replication, ReplicationRate, SpawnKind},
    session::{
        GameSession, HostProfile, NetHost, NetHostId, NetId, NetStatus, SERVER_HOST_ID,
        discovery::{self, SessionSearch},
    },
    stats::NetworkStats,
    transport::{self, Transport, UdpTransport},
};

/// Session parameters fixed before hosting or connecting.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Distinguishes this game's sessions from other traffic on the LAN.
    pub game_code: u32,
    /// Protocol/content version; mismatches are rejected at connect.
    pub version: u32,
    pub session_name: String,
    pub max_clients: u8,
    pub game_port: u16,
    pub discovery_port: u16,
    pub inactivity_timeout: Duration,
}

impl Default for NetConfig {
    fn default() -> NetConfig {
        NetConfig {
            game_code: 0,
            version: 1,
            session_name: "unnamed".into(),
            max_clients: 8,
            game_port: DEFAULT_GAME_PORT,
            discovery_port: DEFAULT_DISCOVERY_PORT,
            inactivity_timeout: INACTIVITY_TIMEOUT,
        }
    }
}

#[derive(Default)]
struct ConnectAttempt {
    since_start: Duration,
    since_retry: Duration,
}

/// Who a drained packet came from, resolved once at intake.
enum Origin {
    /// Index into the peer list.
    Peer(usize),
    /// No profile for this address; only a handshake can come of it.
    Stranger(SocketAddr),
}

/// Parses the concatenated messages of one packet body. A malformed
/// message drops the rest of the packet; everything before it stands.
fn parse_msgs(mut src: &[u8], from: SocketAddr, mut sink: impl FnMut(NetMsg)) {
    while !src.is_empty() {
        match NetMsg::decode(&mut src) {
            Ok(msg) => sink(msg),
            Err(e) => {
                tracing::debug!(from = %from, error = ?e, "malformed message, dropping rest of packet");
                return;
            }
        }
    }
}

/// The network layer's single owned entry point.
///
/// Generic over the transport so tests and demos can run the whole stack
/// on the in-memory network; applications use the `UdpTransport` default
/// and the convenience constructors that bind real sockets.
pub struct NetworkManager<T: Transport = UdpTransport> {
    config: NetConfig,
    status: NetStatus,

    transport: Option<T>,
    advert: Option<T>,
    search: Option<SessionSearch<T>>,

    /// Server: one profile per client. Client: exactly the server.
    peers: Vec<HostProfile>,
    local_id: NetHostId,

    connect: Option<ConnectAttempt>,
    level: Option<String>,

    replication: Replication,
    callbacks: Callbacks,
    stats: NetworkStats,
}

impl<T: Transport> NetworkManager<T> {
    pub fn new(config: NetConfig) -> NetworkManager<T> {
        NetworkManager {
            config,
            status: NetStatus::Local,
            transport: None,
            advert: None,
            search: None,
            peers: Vec::new(),
            local_id: SERVER_HOST_ID,
            connect: None,
            level: None,
            replication: Replication::new(),
            callbacks: Callbacks::default(),
            stats: NetworkStats::default(),
        }
    }

    pub fn status(&self) -> NetStatus {
        self.status
    }

    /// This process's id inside the session: 0 while hosting or out of
    /// session, the assigned id once accepted as a client.
    pub fn local_host_id(&self) -> NetHostId {
        self.local_id
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn num_peers(&self) -> usize {
        self.peers.len()
    }

    pub fn connected_hosts(&self) -> impl Iterator<Item = NetHost> + '_ {
        self.peers.iter().map(|p| p.host)
    }

    /// Smoothed round-trip time to the peer, once a sample exists.
    pub fn ping(&self, host_id: NetHostId) -> Option<Duration> {
        self.peers.iter().find(|p| p.id() == host_id)?.ping()
    }

    pub fn set_connect_callback(&mut self, cb: Callback) {
        self.callbacks.connect = cb;
    }

    pub fn set_accept_callback(&mut self, cb: Callback) {
        self.callbacks.accept = cb;
    }

    pub fn set_reject_callback(&mut self, cb: Callback) {
        self.callbacks.reject = cb;
    }

    pub fn set_disconnect_callback(&mut self, cb: Callback) {
        self.callbacks.disconnect = cb;
    }

    pub fn set_kick_callback(&mut self, cb: Callback) {
        self.callbacks.kick = cb;
    }

    /// Starts hosting on the two provided sockets: the game socket all
    /// session traffic runs over, and the listener that answers
    /// discovery probes.
    pub fn open_session_with(&mut self, game: T, advert: T) -> Result<(), NetError> {
        self.expect_status(NetStatus::Local)?;
        self.transport = Some(game);
        self.advert = Some(advert);
        self.status = NetStatus::Server;
        self.local_id = SERVER_HOST_ID;
        tracing::info!(name = %self.config.session_name, "session opened");
        Ok(())
    }

    /// Starts a connection attempt to `addr` over the provided socket.
    /// The Connect probe leaves immediately and is retried each second
    /// until Accept, Reject or the timeout settles the attempt.
    pub fn connect_with(&mut self, game: T, addr: SocketAddr) -> Result<(), NetError> {
        self.expect_status(NetStatus::Local)?;
        self.transport = Some(game);
        self.status = NetStatus::Connecting;
        self.connect = Some(ConnectAttempt::default());

        let mut profile = HostProfile::new(NetHost {
            addr,
            id: SERVER_HOST_ID,
        });
        let msg = self.connect_msg();
        profile.queue_msg(&msg);
        self.peers.push(profile);
        self.flush_and_send();
        tracing::info!(host = %addr, "connecting");
        Ok(())
    }

    pub fn begin_session_search_with(&mut self, probe: T) {
        self.search = Some(SessionSearch::new(
            probe,
            self.config.game_code,
            self.config.version,
            self.config.discovery_port,
        ));
        tracing::info!("session search started");
    }

    pub fn end_session_search(&mut self) {
        self.search = None;
    }

    /// Sessions discovered so far; empty while no search is running.
    pub fn sessions(&self) -> &[GameSession] {
        self.search.as_ref().map(|s| s.sessions()).unwrap_or(&[])
    }

    /// Leaves or closes the current session. Peers are told best-effort;
    /// local state is freed without waiting for any acknowledgement.
    pub fn close_session(&mut self) {
        if self.status != NetStatus::Local {
            for i in 0..self.peers.len() {
                self.peers[i].queue_msg(&NetMsg::Disconnect(Disconnect));
            }
            self.flush_and_send();
        }
        self.teardown();
    }

    /// Removes a client: a best-effort Kick goes out, then its state is
    /// freed immediately.
    pub fn kick(&mut self, host_id: NetHostId, reason: KickReason) -> Result<(), NetError> {
        self.expect_status(NetStatus::Server)?;
        let Some(pos) = self.peers.iter().position(|p| p.id() == host_id) else {
            return Err(NetError::UnknownClient(host_id));
        };
        self.peers[pos].queue_msg(&NetMsg::Kick(Kick { reason }));
        self.flush_profile(pos);
        let profile = self.peers.remove(pos);
        tracing::info!(host = %profile.addr(), id = host_id, reason = ?reason, "client kicked");
        Ok(())
    }

    /// Announces a level change. Every client unreadies until it reports
    /// back; late joiners get the same announcement at accept time.
    /// Loading the level locally is the application's own business.
    pub fn load_level(&mut self, name: impl Into<String>) -> Result<(), NetError> {
        self.expect_status(NetStatus::Server)?;
        let name = name.into();
        let msg = NetMsg::LoadLevel(LoadLevel { name: name.clone() });
        self.check_msg_size(&msg)?;
        for profile in &mut self.peers {
            profile.ready = false;
            profile.queue_msg(&msg);
        }
        tracing::info!(level = %name, "level load announced");
        self.level = Some(name);
        Ok(())
    }

    /// Registers a native actor type for replication and allocates its
    /// net id. The spawn announcement reaches clients next post-tick.
    pub fn register_actor(
        &mut self,
        type_id: u32,
        rate: ReplicationRate,
    ) -> Result<NetId, NetError> {
        self.expect_authority()?;
        Ok(self.replication.register_actor(type_id, rate))
    }

    /// Registers a blueprint-defined (script) actor for replication.
    pub fn register_blueprint(
        &mut self,
        name: impl Into<String>,
        rate: ReplicationRate,
    ) -> Result<NetId, NetError> {
        self.expect_authority()?;
        Ok(self.replication.register_blueprint(name, rate))
    }

    /// Unregisters the actor and queues its DestroyActor broadcast.
    pub fn unregister_actor(&mut self, net_id: NetId) -> Result<(), NetError> {
        self.expect_authority()?;
        if self.replication.unregister(net_id) {
            Ok(())
        } else {
            Err(NetError::UnknownActor(net_id))
        }
    }

    /// Guarantees the actor a whole-state, reliable update next tick,
    /// regardless of its tier cursor position.
    pub fn force_replication(&mut self, net_id: NetId) -> Result<(), NetError> {
        self.expect_authority()?;
        if self.replication.force(net_id) {
            Ok(())
        } else {
            Err(NetError::UnknownActor(net_id))
        }
    }

    pub fn clear_forced_replication(&mut self, net_id: NetId) -> Result<(), NetError> {
        self.expect_authority()?;
        if self.replication.clear_forced(net_id) {
            Ok(())
        } else {
            Err(NetError::UnknownActor(net_id))
        }
    }

    /// Switches the diff granularity from whole-actor to per-field.
    pub fn set_incremental_replication(&mut self, on: bool) {
        self.replication.set_incremental(on);
    }

    /// Sends a remote call on the actor: client to host, host to every
    /// ready client.
    pub fn send_net_func(
        &mut self,
        net_id: NetId,
        func: u8,
        params: Vec<Datum>,
        reliable: bool,
    ) -> Result<(), NetError> {
        if !matches!(self.status, NetStatus::Server | NetStatus::Client) {
            return Err(NetError::NotInSession(self.status));
        }
        if params.len() > MAX_NET_FUNC_PARAMS {
            return Err(NetError::TooManyParams(params.len()));
        }
        let Some(script) = self.replication.script_flag(net_id) else {
            return Err(NetError::UnknownActor(net_id));
        };
        let msg = if script {
            NetMsg::InvokeScript(InvokeScript {
                net_id,
                func,
                params,
                reliable,
            })
        } else {
            NetMsg::Invoke(Invoke {
                net_id,
                func,
                params,
                reliable,
            })
        };
        self.check_msg_size(&msg)?;
        self.queue_to_session(&msg);
        Ok(())
    }

    /// Receive half of the frame: socket drain, reliability, execution,
    /// then the timers that settle handshakes and dead peers.
    pub fn pre_tick_update(&mut self, driver: &mut dyn NetDriver, dt: Duration) {
        if let Some(search) = self.search.as_mut() {
            search.tick(dt);
        }
        self.answer_probes();

        let intake = self.drain_socket();
        self.execute(driver, intake);

        self.tick_connect(driver, dt);
        self.sweep_inactive(driver);
        self.stats.tick(dt);
    }

    /// Send half of the frame: replication output, keepalives, resend
    /// sweep, and the flush that puts every peer's buffers on the wire.
    pub fn post_tick_update(&mut self, driver: &mut dyn NetDriver, dt: Duration) {
        if self.status == NetStatus::Server {
            for msg in self.replication.take_pending() {
                self.queue_to_ready(&msg);
            }
            for msg in self.replication.tick(driver) {
                self.queue_to_ready(&msg);
            }
        }
        if matches!(self.status, NetStatus::Server | NetStatus::Client) {
            for msg in self.replication.collect_net_funcs(driver) {
                self.queue_to_session(&msg);
            }
        }

        let established = matches!(self.status, NetStatus::Server | NetStatus::Client);
        for profile in &mut self.peers {
            profile.tick_timers(dt);
            if established && profile.since_ping >= PING_INTERVAL {
                profile.since_ping = Duration::ZERO;
                profile.queue_msg(&NetMsg::Ping(Ping));
            }
            profile.sweep_resends(dt);
        }

        self.flush_and_send();
    }

    fn expect_status(&self, expected: NetStatus) -> Result<(), NetError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(NetError::WrongStatus {
                expected,
                actual: self.status,
            })
        }
    }

    /// Registration-shaped operations are valid before a session exists
    /// and while hosting one, but never on the client side.
    fn expect_authority(&self) -> Result<(), NetError> {
        match self.status {
            NetStatus::Local | NetStatus::Server => Ok(()),
            actual => Err(NetError::WrongStatus {
                expected: NetStatus::Server,
                actual,
            }),
        }
    }

    fn connect_msg(&self) -> NetMsg {
        NetMsg::Connect(Connect {
            game_code: self.config.game_code,
            version: self.config.version,
        })
    }

    fn check_msg_size(&self, msg: &NetMsg) -> Result<(), NetError> {
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        if buf.len() > MAX_MSG_BODY_SIZE {
            return Err(NetError::MessageTooLarge(buf.len()));
        }
        Ok(())
    }

    fn teardown(&mut self) {
        if self.status != NetStatus::Local {
            tracing::info!(status = ?self.status, "session closed");
        }
        self.peers.clear();
        self.transport = None;
        self.advert = None;
        self.connect = None;
        self.level = None;
        self.replication.clear();
        self.local_id = SERVER_HOST_ID;
        self.status = NetStatus::Local;
    }

    /// Queues to every ready client (authority-side fan-out).
    fn queue_to_ready(&mut self, msg: &NetMsg) {
        for profile in self.peers.iter_mut().filter(|p| p.ready) {
            profile.queue_msg(msg);
        }
    }

    /// Client: to the host. Server: to every ready client.
    fn queue_to_session(&mut self, msg: &NetMsg) {
        match self.status {
            NetStatus::Server => self.queue_to_ready(msg),
            _ => {
                for profile in &mut self.peers {
                    profile.queue_msg(msg);
                }
            }
        }
    }

    fn flush_and_send(&mut self) {
        for i in 0..self.peers.len() {
            self.flush_profile(i);
        }
    }

    fn flush_profile(&mut self, index: usize) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        let profile = &mut self.peers[index];
        profile.flush();
        for pkt in profile.outbox.drain(..) {
            let sent = transport::send_packet(transport, profile.host.addr, &pkt);
            if sent > 0 {
                self.stats.add_sent(sent);
            }
        }
    }

    /// Answers valid discovery probes out of the game socket, so the
    /// reply's source address is the endpoint a client can connect to.
    fn answer_probes(&mut self) {
        let Some(advert) = self.advert.as_mut() else {
            return;
        };
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        loop {
            match advert.try_recv_from(&mut buf) {
                Ok(Some((len, from))) => {
                    let Some(probe) = discovery::parse_broadcast(&buf[..len], from) else {
                        continue;
                    };
                    if probe.game_code != self.config.game_code {
                        tracing::trace!(from = %from, "probe for another game");
                        continue;
                    }
                    // Player counts include the hosting player.
                    let ad = Broadcast {
                        game_code: self.config.game_code,
                        version: self.config.version,
                        name: self.config.session_name.clone(),
                        max_players: self.config.max_clients.saturating_add(1),
                        num_players: (self.peers.len() as u8).saturating_add(1),
                    };
                    let pkt = discovery::frame_broadcast(&ad, SeqNum::ZERO);
                    let sent = transport::send_packet(transport, from, &pkt);
                    if sent > 0 {
                        self.stats.add_sent(sent);
                    }
                    tracing::debug!(to = %from, "advertised session");
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("advert socket error: {}", e);
                    break;
                }
            }
        }
    }

    /// Drains the game socket, runs the per-peer reliability engine and
    /// returns the messages that became deliverable, in order.
    fn drain_socket(&mut self) -> Vec<(Origin, NetMsg)> {
        let mut intake = Vec::new();
        let Some(transport) = self.transport.as_mut() else {
            return intake;
        };
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        loop {
            let (len, from) = match transport.try_recv_from(&mut buf) {
                Ok(Some(hit)) => hit,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("game socket error: {}", e);
                    break;
                }
            };
            self.stats.add_recv(len);

            let mut src = &buf[..len];
            let header = match PacketHeader::decode(&mut src) {
                Ok(h) => h,
                Err(e) => {
                    tracing::debug!(from = %from, error = ?e, "malformed packet header");
                    continue;
                }
            };

            match self.peers.iter().position(|p| p.addr() == from) {
                Some(index) => {
                    let profile = &mut self.peers[index];
                    profile.note_recv();
                    if header.is_reliable() {
                        let deliverable =
                            profile.accept_reliable(header.sequence, Bytes::copy_from_slice(src));
                        for payload in deliverable {
                            parse_msgs(&payload, from, |msg| {
                                intake.push((Origin::Peer(index), msg))
                            });
                        }
                    } else if profile.accept_unreliable(header.sequence) {
                        parse_msgs(src, from, |msg| intake.push((Origin::Peer(index), msg)));
                    }
                }
                None => {
                    parse_msgs(src, from, |msg| intake.push((Origin::Stranger(from), msg)));
                }
            }
        }
        intake
    }

    fn execute(&mut self, driver: &mut dyn NetDriver, intake: Vec<(Origin, NetMsg)>) {
        let mut dead: Vec<usize> = Vec::new();
        let mut teardown = false;
        for (origin, msg) in intake {
            if teardown {
                // The session dissolved mid-batch; the rest is void.
                break;
            }
            if let Origin::Peer(index) = origin {
                if dead.contains(&index) {
                    continue;
                }
            }
            self.execute_one(driver, origin, msg, &mut dead, &mut teardown);
        }

        dead.sort_unstable();
        dead.dedup();
        for index in dead.into_iter().rev() {
            self.peers.remove(index);
        }
        if teardown {
            self.teardown();
        }
    }

    fn execute_one(
        &mut self,
        driver: &mut dyn NetDriver,
        origin: Origin,
        msg: NetMsg,
        dead: &mut Vec<usize>,
        teardown: &mut bool,
    ) {
        match msg {
            NetMsg::Connect(c) => {
                if let Origin::Stranger(from) = origin {
                    self.handle_connect(driver, from, c);
                }
                // A Connect from an accepted peer is a retry; the
                // reliable Accept retransmits on its own.
            }
            NetMsg::Accept(a) => {
                if !matches!(origin, Origin::Peer(_)) || self.status != NetStatus::Connecting {
                    tracing::trace!("stray accept");
                    return;
                }
                self.status = NetStatus::Client;
                self.local_id = a.host_id;
                self.connect = None;
                tracing::info!(host_id = a.host_id, "connection accepted");
                self.callbacks
                    .fire(driver, &LifecycleEvent::Accept { host_id: a.host_id });
            }
            NetMsg::Reject(r) => {
                if self.status != NetStatus::Connecting {
                    return;
                }
                tracing::info!(reason = ?r.reason, "connection rejected");
                *teardown = true;
                self.callbacks
                    .fire(driver, &LifecycleEvent::Reject { reason: r.reason });
            }
            NetMsg::Disconnect(_) => {
                let Origin::Peer(index) = origin else {
                    return;
                };
                let host = self.peers[index].host;
                match self.status {
                    NetStatus::Server => {
                        dead.push(index);
                        tracing::info!(host = %host.addr, id = host.id, "client disconnected");
                    }
                    NetStatus::Client | NetStatus::Connecting => {
                        *teardown = true;
                        tracing::info!("host closed the session");
                    }
                    NetStatus::Local => return,
                }
                self.callbacks
                    .fire(driver, &LifecycleEvent::Disconnect { host });
            }
            NetMsg::Kick(k) => {
                if !matches!(origin, Origin::Peer(_)) || self.status != NetStatus::Client {
                    return;
                }
                tracing::info!(reason = ?k.reason, "kicked from session");
                *teardown = true;
                self.callbacks
                    .fire(driver, &LifecycleEvent::Kick { reason: k.reason });
            }
            NetMsg::LoadLevel(l) => {
                if !self.from_server(&origin) {
                    return;
                }
                tracing::info!(level = %l.name, "loading level");
                if driver.load_level(&l.name) {
                    self.queue_to_session(&NetMsg::Ready(Ready));
                } else {
                    tracing::error!(level = %l.name, "level load failed, not reporting ready");
                }
            }
            NetMsg::Ready(_) => {
                let Origin::Peer(index) = origin else {
                    return;
                };
                if self.status != NetStatus::Server {
                    return;
                }
                self.peers[index].ready = true;
                tracing::info!(host = %self.peers[index].addr(), "client ready");
                // Catch the late joiner up: replay the spawn set to it
                // and force a whole-state pass for everyone.
                for msg in self.replication.spawn_catalog() {
                    self.peers[index].queue_msg(&msg);
                }
                self.replication.force_all();
            }
            NetMsg::SpawnActor(s) => {
                if !self.from_server(&origin) {
                    return;
                }
                if self
                    .replication
                    .adopt(s.net_id, SpawnKind::Actor { type_id: s.type_id }, false)
                {
                    driver.spawn_actor(s.type_id, s.net_id);
                }
            }
            NetMsg::SpawnBlueprint(s) => {
                if !self.from_server(&origin) {
                    return;
                }
                let kind = SpawnKind::Blueprint {
                    name: s.name.clone(),
                };
                if self.replication.adopt(s.net_id, kind, true) {
                    driver.spawn_blueprint(&s.name, s.net_id);
                }
            }
            NetMsg::DestroyActor(d) => {
                if !self.from_server(&origin) {
                    return;
                }
                if self.replication.remove(d.net_id) {
                    driver.destroy_actor(d.net_id);
                }
            }
            NetMsg::Ping(_) => {
                // Liveness was noted at intake; the ack answers it.
            }
            NetMsg::Replicate(r) => {
                if !self.from_server(&origin) {
                    return;
                }
                driver.apply_replicated_data(r.net_id, &r.fields, false);
            }
            NetMsg::ReplicateScript(r) => {
                if !self.from_server(&origin) {
                    return;
                }
                driver.apply_replicated_data(r.net_id, &r.fields, true);
            }
            NetMsg::Invoke(i) => {
                let Origin::Peer(index) = origin else {
                    return;
                };
                let sender = self.peers[index].id();
                driver.invoke_net_func(i.net_id, i.func, &i.params, sender, false);
            }
            NetMsg::InvokeScript(i) => {
                let Origin::Peer(index) = origin else {
                    return;
                };
                let sender = self.peers[index].id();
                driver.invoke_net_func(i.net_id, i.func, &i.params, sender, true);
            }
            NetMsg::Broadcast(_) => {
                tracing::trace!("discovery broadcast on the game socket");
            }
            NetMsg::Ack(a) => {
                let Origin::Peer(index) = origin else {
                    return;
                };
                self.peers[index].process_ack(a.sequence);
            }
        }
    }

    /// A message only the session host may send: it must come from a
    /// profiled peer, and we must be on the client side of the session.
    fn from_server(&self, origin: &Origin) -> bool {
        matches!(origin, Origin::Peer(_)) && self.status == NetStatus::Client
    }

    fn handle_connect(&mut self, driver: &mut dyn NetDriver, from: SocketAddr, msg: Connect) {
        if self.status != NetStatus::Server {
            tracing::debug!(from = %from, "connect ignored while not hosting");
            return;
        }
        if self.peers.iter().any(|p| p.addr() == from) {
            // Second Connect in the same batch; already accepted.
            return;
        }
        if msg.game_code != self.config.game_code {
            self.reject(from, RejectReason::GameCodeMismatch);
            return;
        }
        if msg.version != self.config.version {
            self.reject(from, RejectReason::VersionMismatch);
            return;
        }
        let Some(host_id) = self.free_host_id() else {
            self.reject(from, RejectReason::SessionFull);
            return;
        };

        let host = NetHost { addr: from, id: host_id };
        let mut profile = HostProfile::new(host);
        profile.queue_msg(&NetMsg::Accept(Accept { host_id }));
        if let Some(level) = &self.level {
            profile.queue_msg(&NetMsg::LoadLevel(LoadLevel {
                name: level.clone(),
            }));
        }
        self.peers.push(profile);
        tracing::info!(host = %from, id = host_id, "client accepted");
        self.callbacks.fire(driver, &LifecycleEvent::Connect { host });
    }

    /// Smallest unused client id, if the session has room.
    fn free_host_id(&self) -> Option<NetHostId> {
        if self.peers.len() >= self.config.max_clients as usize {
            return None;
        }
        (1..=self.config.max_clients).find(|id| !self.peers.iter().any(|p| p.id() == *id))
    }

    /// One-shot Reject to an address we keep no state for.
    fn reject(&mut self, to: SocketAddr, reason: RejectReason) {
        tracing::debug!(to = %to, reason = ?reason, "rejecting connect");
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        let mut body = BytesMut::new();
        NetMsg::Reject(Reject { reason }).encode(&mut body);
        let pkt = transport::frame_packet(PacketHeader::new(SeqNum::ZERO, false), &body);
        let sent = transport::send_packet(transport, to, &pkt);
        if sent > 0 {
            self.stats.add_sent(sent);
        }
    }

    fn tick_connect(&mut self, driver: &mut dyn NetDriver, dt: Duration) {
        if self.status != NetStatus::Connecting {
            return;
        }
        let (expired, retry) = {
            let Some(attempt) = self.connect.as_mut() else {
                return;
            };
            attempt.since_start += dt;
            attempt.since_retry += dt;
            let expired = attempt.since_start >= CONNECT_TIMEOUT;
            let retry = !expired && attempt.since_retry >= CONNECT_RETRY_INTERVAL;
            if retry {
                attempt.since_retry = Duration::ZERO;
            }
            (expired, retry)
        };

        if expired {
            tracing::info!("connection attempt timed out");
            self.teardown();
            self.callbacks.fire(
                driver,
                &LifecycleEvent::Reject {
                    reason: RejectReason::Timeout,
                },
            );
            return;
        }
        if retry {
            let msg = self.connect_msg();
            if let Some(profile) = self.peers.first_mut() {
                profile.queue_msg(&msg);
            }
        }
    }

    /// Evicts peers that have been silent past the inactivity timeout.
    /// Indistinguishable from an explicit disconnect on purpose.
    fn sweep_inactive(&mut self, driver: &mut dyn NetDriver) {
        let timeout = self.config.inactivity_timeout;
        match self.status {
            NetStatus::Server => {
                let mut index = 0;
                while index < self.peers.len() {
                    if self.peers[index].since_recv > timeout {
                        let profile = self.peers.remove(index);
                        tracing::info!(host = %profile.addr(), id = profile.id(), "client timed out");
                        self.callbacks
                            .fire(driver, &LifecycleEvent::Disconnect { host: profile.host });
                    } else {
                        index += 1;
                    }
                }
            }
            NetStatus::Client => {
                if self.peers.first().is_some_and(|p| p.since_recv > timeout) {
                    let host = self.peers[0].host;
                    tracing::info!(host = %host.addr, "host timed out");
                    self.teardown();
                    self.callbacks
                        .fire(driver, &LifecycleEvent::Disconnect { host });
                }
            }
            _ => {}
        }
    }
}

impl NetworkManager<UdpTransport> {
    /// Binds the configured ports and starts hosting.
    pub fn open_session(&mut self) -> Result<(), NetError> {
        let game = UdpTransport::bind(("0.0.0.0", self.config.game_port))?;
        let advert = UdpTransport::bind(("0.0.0.0", self.config.discovery_port))?;
        self.open_session_with(game, advert)
    }

    /// Binds an ephemeral port and starts connecting to `addr`.
    pub fn connect(&mut self, addr: SocketAddr) -> Result<(), NetError> {
        let game = UdpTransport::bind(("0.0.0.0", 0))?;
        self.connect_with(game, addr)
    }

    /// Opens the broadcast-capable probe socket and starts querying the
    /// LAN for sessions.
    pub fn begin_session_search(&mut self) -> Result<(), NetError> {
        let probe = UdpTransport::bind_broadcast(("0.0.0.0", 0))?;
        self.begin_session_search_with(probe);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{SimNetwork, SimTransport};

    fn server(net: &SimNetwork) -> NetworkManager<SimTransport> {
        let mut manager = NetworkManager::new(NetConfig {
            game_code: 7,
            session_name: "test".into(),
            max_clients: 3,
            ..NetConfig::default()
        });
        manager
            .open_session_with(net.bind(5151), net.bind(15151))
            .unwrap();
        manager
    }

    #[test]
    fn opening_twice_is_a_status_error() {
        let net = SimNetwork::new();
        let mut manager = server(&net);
        let err = manager
            .open_session_with(net.bind(0), net.bind(0))
            .unwrap_err();
        assert!(matches!(
            err,
            NetError::WrongStatus {
                expected: NetStatus::Local,
                actual: NetStatus::Server,
            }
        ));
    }

    #[test]
    fn connecting_requires_local_status() {
        let net = SimNetwork::new();
        let mut manager = server(&net);
        let target = "10.77.0.9:5151".parse().unwrap();
        assert!(matches!(
            manager.connect_with(net.bind(0), target),
            Err(NetError::WrongStatus { .. })
        ));
    }

    #[test]
    fn load_level_requires_hosting() {
        let mut manager: NetworkManager<SimTransport> = NetworkManager::new(NetConfig::default());
        assert!(matches!(
            manager.load_level("arena"),
            Err(NetError::WrongStatus { .. })
        ));
    }

    #[test]
    fn kicking_an_unknown_client_errors() {
        let net = SimNetwork::new();
        let mut manager = server(&net);
        assert!(matches!(
            manager.kick(5, KickReason::ByHost),
            Err(NetError::UnknownClient(5))
        ));
    }

    #[test]
    fn send_net_func_guards_its_inputs() {
        let net = SimNetwork::new();
        let mut manager = server(&net);

        assert!(matches!(
            manager.send_net_func(1, 0, vec![], true),
            Err(NetError::UnknownActor(1))
        ));

        let id = manager.register_actor(4, ReplicationRate::Medium).unwrap();
        let too_many = vec![Datum::Byte(0); MAX_NET_FUNC_PARAMS + 1];
        assert!(matches!(
            manager.send_net_func(id, 0, too_many, true),
            Err(NetError::TooManyParams(_))
        ));
        assert!(manager.send_net_func(id, 0, vec![Datum::Bool(true)], true).is_ok());

        let mut idle: NetworkManager<SimTransport> = NetworkManager::new(NetConfig::default());
        assert!(matches!(
            idle.send_net_func(1, 0, vec![], true),
            Err(NetError::NotInSession(NetStatus::Local))
        ));
    }

    #[test]
    fn host_ids_fill_the_lowest_gap() {
        let net = SimNetwork::new();
        let mut manager = server(&net);
        for id in [1u8, 2, 3] {
            let addr = format!("10.77.9.{id}:40000").parse().unwrap();
            manager.peers.push(HostProfile::new(NetHost { addr, id }));
        }
        assert_eq!(manager.free_host_id(), None);

        manager.peers.retain(|p| p.id() != 2);
        assert_eq!(manager.free_host_id(), Some(2));
    }

    #[test]
    fn register_is_authority_only() {
        let net = SimNetwork::new();
        let mut client: NetworkManager<SimTransport> = NetworkManager::new(NetConfig::default());
        client
            .connect_with(net.bind(0), "10.77.0.9:5151".parse().unwrap())
            .unwrap();
        assert!(matches!(
            client.register_actor(1, ReplicationRate::Low),
            Err(NetError::WrongStatus { .. })
        ));
    }
}
