use anyhow::bail;
use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::segment::Segment;
use crate::sequence_math::{calculate_ack, is_window_open, seq_gt, seq_lt};

/// The mutable record of one simulated session: counters, the outbound buffer and the logs of
///  all segments sent and received.
///
/// A session's state is owned by the code driving the exchange and lent to the handshake and
///  the windowed sender in turn - there is no shared or global state. The host reads everything
///  through accessors, and may only replace the sender buffer before the exchange begins.
///
/// Sequence numbers: the SYN carries `initial_sequence_number + 1`, which is also the sequence
///  number of the sender buffer's first byte (the 'data origin'). All counters start there.
#[derive(Debug, Clone)]
pub struct ProtocolState {
    initial_sequence_number: u32,
    initial_window_size: u16,

    last_byte_sent: u32,
    last_byte_acked: u32,
    current_window_size: u16,
    expected_seq: u32,

    sender_buffer: Bytes,

    sent_packets: Vec<Segment>,
    received_packets: Vec<Segment>,
}

impl ProtocolState {
    pub fn new(initial_sequence_number: u32, sender_buffer: Bytes) -> ProtocolState {
        let data_origin = initial_sequence_number.wrapping_add(1);
        ProtocolState {
            initial_sequence_number,
            initial_window_size: 0,
            last_byte_sent: data_origin,
            last_byte_acked: data_origin,
            current_window_size: 0,
            expected_seq: 0,
            sender_buffer,
            sent_packets: Vec::new(),
            received_packets: Vec::new(),
        }
    }

    /// The peer window to assume before the peer advertised one. This is zero by default, i.e.
    ///  nothing can be sent before the peer's first segment arrives.
    pub fn with_window_size(mut self, window_size: u16) -> ProtocolState {
        self.initial_window_size = window_size;
        self.current_window_size = window_size;
        self
    }

    pub fn initial_sequence_number(&self) -> u32 {
        self.initial_sequence_number
    }

    /// sequence number of the sender buffer's first byte
    pub fn data_origin(&self) -> u32 {
        self.initial_sequence_number.wrapping_add(1)
    }

    /// next sequence number to be sent
    pub fn last_byte_sent(&self) -> u32 {
        self.last_byte_sent
    }

    /// cumulative acknowledgment: the next sequence number the peer expects from us
    pub fn last_byte_acked(&self) -> u32 {
        self.last_byte_acked
    }

    /// one past the sender buffer's last byte
    pub fn last_byte_written(&self) -> u32 {
        self.data_origin().wrapping_add(self.sender_buffer.len() as u32)
    }

    pub fn current_window_size(&self) -> u16 {
        self.current_window_size
    }

    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }

    pub fn sender_buffer(&self) -> &Bytes {
        &self.sender_buffer
    }

    pub fn sent_packets(&self) -> &[Segment] {
        &self.sent_packets
    }

    pub fn received_packets(&self) -> &[Segment] {
        &self.received_packets
    }

    pub fn last_sent_packet(&self) -> Option<&Segment> {
        self.sent_packets.last()
    }

    pub fn is_window_open(&self) -> bool {
        is_window_open(self.last_byte_sent, self.last_byte_acked, self.current_window_size)
    }

    pub fn has_unsent_data(&self) -> bool {
        seq_lt(self.last_byte_sent, self.last_byte_written())
    }

    pub fn is_fully_acked(&self) -> bool {
        !seq_lt(self.last_byte_acked, self.last_byte_written())
    }

    /// true once the peer sent a FIN
    pub fn is_finished(&self) -> bool {
        self.received_packets.iter().any(|s| s.flags.fin)
    }

    /// The buffer can be replaced only before the first segment is sent - after that, sequence
    ///  numbers in the logs refer to its contents.
    pub fn set_sender_buffer(&mut self, sender_buffer: Bytes) -> anyhow::Result<()> {
        if !self.sent_packets.is_empty() {
            bail!("the sender buffer can not be replaced after the exchange has begun");
        }
        self.sender_buffer = sender_buffer;
        Ok(())
    }

    /// back to the state right after construction, keeping initial sequence number and buffer
    pub fn reset(&mut self) {
        debug!("resetting protocol state");

        let data_origin = self.data_origin();
        self.last_byte_sent = data_origin;
        self.last_byte_acked = data_origin;
        self.current_window_size = self.initial_window_size;
        self.expected_seq = 0;
        self.sent_packets.clear();
        self.received_packets.clear();
    }

    /// Appends a segment to the sent log, advancing `last_byte_sent` by its payload length.
    pub(crate) fn record_sent(&mut self, segment: Segment) {
        trace!(%segment, "sent");
        self.last_byte_sent = self.last_byte_sent.wrapping_add(segment.data.len() as u32);
        self.sent_packets.push(segment);
    }

    /// Appends a segment to the received log and takes over what the peer told us: the
    ///  next sequence number to expect from it, its window and (with the ACK flag) its
    ///  acknowledgment.
    pub(crate) fn record_received(&mut self, segment: Segment) {
        trace!(%segment, "received");

        self.expected_seq = calculate_ack(&segment);
        self.current_window_size = segment.window_size;
        if segment.flags.ack {
            if let Some(ack) = segment.acknowledgment_number {
                self.acknowledge(ack);
            }
        }
        self.received_packets.push(segment);
    }

    /// Moves `last_byte_acked` forward to `ack`. Acknowledgments never move it back, and never
    ///  beyond what was actually sent. Returns true if the counter moved.
    pub(crate) fn acknowledge(&mut self, ack: u32) -> bool {
        if !seq_gt(ack, self.last_byte_acked) {
            trace!(ack, last_byte_acked = self.last_byte_acked, "ignoring stale acknowledgment");
            return false;
        }
        if seq_gt(ack, self.last_byte_sent) {
            warn!(ack, last_byte_sent = self.last_byte_sent, "ignoring acknowledgment of data that was never sent");
            return false;
        }

        debug!(ack, newly_acked = ack.wrapping_sub(self.last_byte_acked), "acknowledged");
        self.last_byte_acked = ack;
        true
    }

    pub(crate) fn clear_sent_packets(&mut self) {
        self.sent_packets.clear();
    }
}
