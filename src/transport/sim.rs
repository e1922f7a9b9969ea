//! Deterministic in-memory network for tests and demos.
//!
//! Every socket bound from one [`SimNetwork`] shares a registry of
//! datagram queues keyed by fake address. Delivery is immediate and
//! FIFO, broadcast fans out to every socket on the target port, and an
//! optional seeded loss roll drops packets reproducibly, so a test that
//! fails once fails every time.

use std::{
    cell::RefCell,
    collections::{BTreeMap, VecDeque},
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    rc::Rc,
};

use crate::transport::Transport;

const EPHEMERAL_BASE: u16 = 40_000;

struct Inner {
    next_host: u8,
    queues: BTreeMap<SocketAddr, VecDeque<(SocketAddr, Vec<u8>)>>,
    loss_percent: u8,
    rng: u64,
    delivered: u64,
    dropped: u64,
}

impl Inner {
    fn roll_loss(&mut self) -> bool {
        if self.loss_percent == 0 {
            return false;
        }
        // xorshift64; plenty for a loss roll.
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 7;
        self.rng ^= self.rng << 17;
        (self.rng % 100) < self.loss_percent as u64
    }

    fn push(&mut self, from: SocketAddr, to: SocketAddr, pkt: &[u8]) {
        if self.roll_loss() {
            self.dropped += 1;
            return;
        }
        if let Some(queue) = self.queues.get_mut(&to) {
            queue.push_back((from, pkt.to_vec()));
            self.delivered += 1;
        }
    }
}

/// Handle to the shared in-memory network. Clones refer to the same
/// registry; keep one per test and bind all sockets from it.
#[derive(Clone)]
pub struct SimNetwork {
    inner: Rc<RefCell<Inner>>,
}

impl SimNetwork {
    pub fn new() -> SimNetwork {
        SimNetwork::with_seed(0x5DEECE66D)
    }

    pub fn with_seed(seed: u64) -> SimNetwork {
        SimNetwork {
            inner: Rc::new(RefCell::new(Inner {
                next_host: 0,
                queues: BTreeMap::new(),
                loss_percent: 0,
                rng: seed | 1,
                delivered: 0,
                dropped: 0,
            })),
        }
    }

    /// Bind a new socket. Port 0 picks a distinct ephemeral port; every
    /// socket also gets its own fake host address, so two "machines" can
    /// listen on the same port.
    pub fn bind(&self, port: u16) -> SimTransport {
        let mut inner = self.inner.borrow_mut();
        inner.next_host += 1;
        let host = inner.next_host;
        let port = if port == 0 {
            EPHEMERAL_BASE + host as u16
        } else {
            port
        };
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 77, 0, host)), port);
        inner.queues.insert(addr, VecDeque::new());
        SimTransport {
            net: self.clone(),
            addr,
        }
    }

    /// Percentage of sends to drop, 0..=100. Applies from the next send.
    pub fn set_loss(&self, percent: u8) {
        self.inner.borrow_mut().loss_percent = percent.min(100);
    }

    pub fn delivered(&self) -> u64 {
        self.inner.borrow().delivered
    }

    pub fn dropped(&self) -> u64 {
        self.inner.borrow().dropped
    }
}

impl Default for SimNetwork {
    fn default() -> Self {
        SimNetwork::new()
    }
}

/// One bound socket on a [`SimNetwork`].
pub struct SimTransport {
    net: SimNetwork,
    addr: SocketAddr,
}

impl Transport for SimTransport {
    fn send_to(&mut self, buf: &[u8], to: SocketAddr) -> io::Result<usize> {
        let mut inner = self.net.inner.borrow_mut();
        if to.ip() == IpAddr::V4(Ipv4Addr::BROADCAST) {
            let listeners: Vec<SocketAddr> = inner
                .queues
                .keys()
                .copied()
                .filter(|a| a.port() == to.port() && *a != self.addr)
                .collect();
            for listener in listeners {
                inner.push(self.addr, listener, buf);
            }
        } else {
            inner.push(self.addr, to, buf);
        }
        Ok(buf.len())
    }

    fn try_recv_from(&mut self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        let mut inner = self.net.inner.borrow_mut();
        let Some(queue) = inner.queues.get_mut(&self.addr) else {
            return Ok(None);
        };
        match queue.pop_front() {
            Some((from, pkt)) => {
                let len = pkt.len().min(buf.len());
                buf[..len].copy_from_slice(&pkt[..len]);
                Ok(Some((len, from)))
            }
            None => Ok(None),
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.addr)
    }
}
