//! Broadcast-based LAN discovery.
//!
//! The searching side owns a second, broadcast-capable socket, probes
//! the discovery port on a timer and collects the advertisements that
//! come back. The hosting side's half (answering probes out of the game
//! socket, so the reply's source address is the connectable endpoint)
//! lives in the facade, built on the same helpers.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use bytes::Bytes;

use crate::{
    protocol::{
        constants::{BROADCAST_INTERVAL, RECV_BUFFER_SIZE},
        header::PacketHeader,
        message::{Broadcast, NetMsg},
        seqnum::SeqNum,
    },
    session::{GameSession, NetHost, SERVER_HOST_ID},
    transport::{self, Transport},
};

/// Parses a discovery datagram down to its advertisement, tolerating
/// any LAN noise that happens to hit the port.
pub(crate) fn parse_broadcast(pkt: &[u8], from: SocketAddr) -> Option<Broadcast> {
    let mut src = pkt;
    let _header = match PacketHeader::decode(&mut src) {
        Ok(h) => h,
        Err(e) => {
            tracing::debug!(from = %from, error = ?e, "runt discovery datagram");
            return None;
        }
    };
    match NetMsg::decode(&mut src) {
        Ok(NetMsg::Broadcast(b)) => Some(b),
        Ok(other) => {
            tracing::trace!(from = %from, ty = ?other.msg_type(), "non-discovery message on discovery path");
            None
        }
        Err(e) => {
            tracing::debug!(from = %from, error = ?e, "malformed discovery datagram");
            None
        }
    }
}

/// Frames a probe or advertisement as a single-message unreliable packet.
pub(crate) fn frame_broadcast(msg: &Broadcast, seq: SeqNum) -> Bytes {
    let mut body = bytes::BytesMut::new();
    NetMsg::Broadcast(msg.clone()).encode(&mut body);
    transport::frame_packet(PacketHeader::new(seq, false), &body)
}

/// An active LAN search: probe socket, probe timer and the session list
/// built from replies.
pub struct SessionSearch<T: Transport> {
    transport: T,
    probe_target: SocketAddr,
    game_code: u32,
    version: u32,
    since_probe: Duration,
    probe_seq: SeqNum,
    sessions: Vec<GameSession>,
}

impl<T: Transport> SessionSearch<T> {
    pub fn new(transport: T, game_code: u32, version: u32, discovery_port: u16) -> SessionSearch<T> {
        SessionSearch {
            transport,
            probe_target: SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), discovery_port),
            game_code,
            version,
            // Expired from the start so the first tick probes immediately.
            since_probe: BROADCAST_INTERVAL,
            probe_seq: SeqNum::ZERO,
            sessions: Vec::new(),
        }
    }

    /// Sessions heard from so far, newest information per host.
    pub fn sessions(&self) -> &[GameSession] {
        &self.sessions
    }

    pub(crate) fn tick(&mut self, dt: Duration) {
        self.since_probe += dt;
        if self.since_probe >= BROADCAST_INTERVAL {
            self.since_probe = Duration::ZERO;
            self.send_probe();
        }
        self.drain_replies();
    }

    fn send_probe(&mut self) {
        let probe = Broadcast::probe(self.game_code, self.version);
        let pkt = frame_broadcast(&probe, self.probe_seq);
        self.probe_seq = self.probe_seq.next();
        transport::send_packet(&mut self.transport, self.probe_target, &pkt);
        tracing::debug!(target = %self.probe_target, "session probe");
    }

    fn drain_replies(&mut self) {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        loop {
            match self.transport.try_recv_from(&mut buf) {
                Ok(Some((len, from))) => {
                    if let Some(ad) = parse_broadcast(&buf[..len], from) {
                        self.upsert(from, ad);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("search socket error: {}", e);
                    break;
                }
            }
        }
    }

    fn upsert(&mut self, from: SocketAddr, ad: Broadcast) {
        if ad.game_code != self.game_code {
            tracing::trace!(from = %from, game_code = ad.game_code, "advertisement for another game");
            return;
        }
        let session = GameSession {
            host: NetHost {
                addr: from,
                id: SERVER_HOST_ID,
            },
            name: ad.name,
            version: ad.version,
            max_players: ad.max_players,
            num_players: ad.num_players,
        };
        match self.sessions.iter_mut().find(|s| s.host.addr == from) {
            Some(existing) => *existing = session,
            None => {
                tracing::info!(host = %from, name = %session.name, "session discovered");
                self.sessions.push(session);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SimNetwork;

    const TICK: Duration = Duration::from_millis(50);

    fn advertise<T: Transport>(sock: &mut T, to: SocketAddr, name: &str, num_players: u8) {
        let ad = Broadcast {
            game_code: 7,
            version: 1,
            name: name.into(),
            max_players: 8,
            num_players,
        };
        sock.send_to(&frame_broadcast(&ad, SeqNum::ZERO), to).unwrap();
    }

    #[test]
    fn first_tick_probes_then_rate_limits() {
        let net = SimNetwork::new();
        let mut listener = net.bind(15151);
        let mut search = SessionSearch::new(net.bind(0), 7, 1, 15151);

        search.tick(TICK);
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        assert!(listener.try_recv_from(&mut buf).unwrap().is_some());

        // Well inside the probe interval: nothing new.
        search.tick(TICK);
        assert!(listener.try_recv_from(&mut buf).unwrap().is_none());

        search.tick(BROADCAST_INTERVAL);
        assert!(listener.try_recv_from(&mut buf).unwrap().is_some());
    }

    #[test]
    fn replies_build_and_refresh_the_session_list() {
        let net = SimNetwork::new();
        let mut host = net.bind(5151);
        let mut search = SessionSearch::new(net.bind(0), 7, 1, 15151);
        let search_addr = {
            // The host answers to wherever the probe came from.
            search.tick(TICK);
            search.transport.local_addr().unwrap()
        };

        advertise(&mut host, search_addr, "alpha", 1);
        search.tick(TICK);
        assert_eq!(search.sessions().len(), 1);
        assert_eq!(search.sessions()[0].name, "alpha");
        assert_eq!(search.sessions()[0].num_players, 1);
        assert_eq!(search.sessions()[0].host.addr, host.local_addr().unwrap());

        // A fresh advertisement from the same host updates in place.
        advertise(&mut host, search_addr, "alpha", 3);
        search.tick(TICK);
        assert_eq!(search.sessions().len(), 1);
        assert_eq!(search.sessions()[0].num_players, 3);
    }

    #[test]
    fn foreign_game_codes_are_ignored() {
        let net = SimNetwork::new();
        let mut host = net.bind(5151);
        let mut search = SessionSearch::new(net.bind(0), 7, 1, 15151);
        let search_addr = search.transport.local_addr().unwrap();

        let ad = Broadcast {
            game_code: 99,
            version: 1,
            name: "other".into(),
            max_players: 4,
            num_players: 1,
        };
        host.send_to(&frame_broadcast(&ad, SeqNum::ZERO), search_addr)
            .unwrap();
        search.tick(TICK);
        assert!(search.sessions().is_empty());
    }

    #[test]
    fn garbage_on_the_port_is_dropped() {
        let net = SimNetwork::new();
        let mut noise = net.bind(0);
        let mut search = SessionSearch::new(net.bind(0), 7, 1, 15151);
        let search_addr = search.transport.local_addr().unwrap();

        noise.send_to(&[0x01], search_addr).unwrap();
        noise.send_to(&[0xFF; 64], search_addr).unwrap();
        search.tick(TICK);
        assert!(search.sessions().is_empty());
    }
}
