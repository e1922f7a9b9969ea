//! Traffic accounting for the facade: totals since the session opened
//! and windowed upload/download rates.

use std::time::Duration;

use crate::protocol::constants::STATS_WINDOW;

/// Byte and packet counters, refreshed once per stats window.
#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    window: Duration,
    window_sent_bytes: u64,
    window_recv_bytes: u64,

    upload_rate: f32,
    download_rate: f32,

    total_sent_bytes: u64,
    total_recv_bytes: u64,
    total_sent_packets: u64,
    total_recv_packets: u64,
}

impl NetworkStats {
    pub(crate) fn add_sent(&mut self, bytes: usize) {
        self.window_sent_bytes += bytes as u64;
        self.total_sent_bytes += bytes as u64;
        self.total_sent_packets += 1;
    }

    pub(crate) fn add_recv(&mut self, bytes: usize) {
        self.window_recv_bytes += bytes as u64;
        self.total_recv_bytes += bytes as u64;
        self.total_recv_packets += 1;
    }

    /// Rolls the window forward; on expiry the rates are recomputed from
    /// what the window accumulated.
    pub(crate) fn tick(&mut self, dt: Duration) {
        self.window += dt;
        if self.window < STATS_WINDOW {
            return;
        }
        let secs = self.window.as_secs_f32();
        self.upload_rate = self.window_sent_bytes as f32 / secs;
        self.download_rate = self.window_recv_bytes as f32 / secs;
        self.window = Duration::ZERO;
        self.window_sent_bytes = 0;
        self.window_recv_bytes = 0;
    }

    /// Outgoing bytes per second over the last full window.
    pub fn upload_rate(&self) -> f32 {
        self.upload_rate
    }

    /// Incoming bytes per second over the last full window.
    pub fn download_rate(&self) -> f32 {
        self.download_rate
    }

    pub fn total_sent_bytes(&self) -> u64 {
        self.total_sent_bytes
    }

    pub fn total_recv_bytes(&self) -> u64 {
        self.total_recv_bytes
    }

    pub fn total_sent_packets(&self) -> u64 {
        self.total_sent_packets
    }

    pub fn total_recv_packets(&self) -> u64 {
        self.total_recv_packets
    }
}
