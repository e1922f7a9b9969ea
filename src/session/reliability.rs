//! The reliability engine, as further impl blocks on [`HostProfile`]:
//! message batching, the resend sweep, ack processing and the in-order
//! delivery of incoming reliable packets.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    protocol::{
        constants::{MAX_MSG_BODY_SIZE, RESEND_INTERVAL},
        header::PacketHeader,
        message::{Ack, NetMsg},
        seqnum::SeqNum,
    },
    session::{HostProfile, ReliablePacket},
    transport::frame_packet,
};

/// Weight of a new sample in the smoothed round-trip estimate.
const RTT_SMOOTHING: f32 = 0.125;

impl HostProfile {
    /// Queues a message on the channel its type dictates. The message
    /// joins the peer's accumulation buffer and leaves the process at
    /// the next flush; a buffer about to overflow the body limit is
    /// flushed first. A single message larger than the body limit is an
    /// authoring error: logged and dropped, never fragmented.
    pub(crate) fn queue_msg(&mut self, msg: &NetMsg) {
        let mut body = BytesMut::new();
        msg.encode(&mut body);
        if body.len() > MAX_MSG_BODY_SIZE {
            tracing::warn!(
                peer = %self.host.addr,
                ty = ?msg.msg_type(),
                len = body.len(),
                "dropping oversize message"
            );
            return;
        }

        if msg.is_reliable() {
            if self.reliable_buf.len() + body.len() > MAX_MSG_BODY_SIZE {
                self.flush_reliable();
            }
            self.reliable_buf.put_slice(&body);
        } else {
            if self.unreliable_buf.len() + body.len() > MAX_MSG_BODY_SIZE {
                self.flush_unreliable();
            }
            self.unreliable_buf.put_slice(&body);
        }
    }

    /// Turns both accumulation buffers into framed packets in the outbox.
    pub(crate) fn flush(&mut self) {
        self.flush_reliable();
        self.flush_unreliable();
    }

    fn flush_reliable(&mut self) {
        if self.reliable_buf.is_empty() {
            return;
        }
        let seq = self.seq_out_reliable;
        self.seq_out_reliable = seq.next();

        let body = self.reliable_buf.split().freeze();
        let pkt = frame_packet(PacketHeader::new(seq, true), &body);
        self.outbox.push(pkt.clone());
        self.outgoing.push(ReliablePacket::new(seq, pkt));
        tracing::trace!(peer = %self.host.addr, seq = %seq, len = body.len(), "reliable flush");
    }

    fn flush_unreliable(&mut self) {
        if self.unreliable_buf.is_empty() {
            return;
        }
        let seq = self.seq_out_unreliable;
        self.seq_out_unreliable = seq.next();

        let body = self.unreliable_buf.split().freeze();
        self.outbox
            .push(frame_packet(PacketHeader::new(seq, false), &body));
    }

    /// Ages the in-flight packets and re-queues any whose resend timer
    /// ran out. There is no retry cap here; a peer that never acks is
    /// caught by the inactivity timeout instead.
    pub(crate) fn sweep_resends(&mut self, dt: Duration) {
        for pkt in &mut self.outgoing {
            pkt.since_send += dt;
            pkt.age += dt;
            if pkt.since_send >= RESEND_INTERVAL {
                pkt.since_send = Duration::ZERO;
                pkt.num_sends += 1;
                self.outbox.push(pkt.payload.clone());
                tracing::trace!(
                    peer = %self.host.addr,
                    seq = %pkt.seq,
                    sends = pkt.num_sends,
                    "resend"
                );
            }
        }
    }

    /// Removes every in-flight packet at or below the acked sequence.
    /// Packets acked on their first transmission feed the RTT estimate.
    pub(crate) fn process_ack(&mut self, acked: SeqNum) {
        if let Some(pkt) = self
            .outgoing
            .iter()
            .find(|p| p.seq == acked && p.num_sends == 1)
        {
            let sample = pkt.age.as_secs_f32();
            self.rtt = Some(match self.rtt {
                Some(rtt) => rtt + (sample - rtt) * RTT_SMOOTHING,
                None => sample,
            });
        }
        self.outgoing.retain(|p| acked.less(p.seq));
    }

    /// Classifies one incoming reliable packet body and returns whatever
    /// is now deliverable, oldest first.
    ///
    /// Duplicates are re-acked but never re-delivered; packets ahead of
    /// sequence are parked unacked until the gap fills, so a cumulative
    /// ack can never cancel a packet that was not delivered.
    pub(crate) fn accept_reliable(&mut self, seq: SeqNum, payload: Bytes) -> Vec<Bytes> {
        let mut deliverable = Vec::new();

        if seq.less(self.seq_in_reliable) {
            tracing::trace!(peer = %self.host.addr, seq = %seq, "duplicate reliable packet");
            self.queue_ack(self.seq_in_reliable.prev());
            return deliverable;
        }

        if seq == self.seq_in_reliable {
            self.queue_ack(seq);
            self.seq_in_reliable = seq.next();
            deliverable.push(payload);

            // Drain buffered successors that became contiguous.
            loop {
                let next = self.seq_in_reliable;
                let Some(pos) = self.incoming.iter().position(|p| p.seq == next) else {
                    break;
                };
                let pkt = self.incoming.swap_remove(pos);
                self.queue_ack(pkt.seq);
                self.seq_in_reliable = next.next();
                deliverable.push(pkt.payload);
            }
        } else if !self.incoming.iter().any(|p| p.seq == seq) {
            self.incoming.push(ReliablePacket::new(seq, payload));
        }

        deliverable
    }

    /// Freshness gate for the unreliable channel: anything not newer
    /// than the last accepted sequence is stale and dropped whole.
    pub(crate) fn accept_unreliable(&mut self, seq: SeqNum) -> bool {
        let fresh = match self.seq_in_unreliable {
            None => true,
            Some(last) => last.less(seq),
        };
        if fresh {
            self.seq_in_unreliable = Some(seq);
        } else {
            tracing::trace!(peer = %self.host.addr, seq = %seq, "stale unreliable packet");
        }
        fresh
    }

    fn queue_ack(&mut self, seq: SeqNum) {
        self.queue_msg(&NetMsg::Ack(Ack { sequence: seq }));
    }
}
