use std::collections::VecDeque;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::segment::{Segment, SegmentFlags};
use crate::sequence_math::calculate_ack;
use crate::transport::SegmentTransport;

/// An in-memory receiving side for a session. It answers a SYN with SYN+ACK, accepts in-order
///  payload and answers every segment with a cumulative ACK. Payload that is not in order is
///  dropped (there is no reassembly), and the cumulative ACK tells the sender where it stands.
///
/// Every segment passed to `send_packet` is answered with exactly one reply, which is queued until
///  the session waits for it. If the session waits while no reply is queued, the peer answers the
///  segment passed as context instead.
///
/// The advertised windows can be scripted: each reply uses the next window from the list, the
///  last one repeating forever.
#[derive(Debug)]
pub struct SimulatedPeer {
    inner: RwLock<PeerInner>,
}

#[derive(Debug)]
struct PeerInner {
    sequence_number: u32,
    receive_next: Option<u32>,
    windows: VecDeque<u16>,
    pending_replies: VecDeque<Segment>,
    received_data: BytesMut,
    received_segments: Vec<Segment>,
}

impl PeerInner {
    fn next_window(&mut self) -> u16 {
        if self.windows.len() > 1 {
            self.windows.pop_front().unwrap_or_default()
        }
        else {
            self.windows.front().copied().unwrap_or_default()
        }
    }

    fn reply_to(&mut self, segment: &Segment) -> Segment {
        self.received_segments.push(segment.clone());

        let mut flags = SegmentFlags { ack: true, ..Default::default() };

        if segment.flags.syn {
            debug!(seq = segment.sequence_number, "peer received SYN");
            self.receive_next = Some(calculate_ack(segment));
            flags.syn = true;
        }
        else {
            let receive_next = *self.receive_next.get_or_insert(segment.sequence_number);
            if segment.sequence_number == receive_next {
                self.received_data.extend_from_slice(&segment.data);
                self.receive_next = Some(calculate_ack(segment));
            }
            else if !segment.data.is_empty() {
                debug!(seq = segment.sequence_number, expected = receive_next, "peer dropping out-of-order payload");
            }
        }

        let reply = Segment {
            source_port: segment.destination_port,
            destination_port: segment.source_port,
            sequence_number: self.sequence_number,
            acknowledgment_number: self.receive_next,
            data_offset: 5,
            reserved: None,
            flags,
            window_size: self.next_window(),
            checksum: 0,
            urgent_pointer: None,
            options: None,
            data: Bytes::new(),
        };
        trace!(%reply, "peer replying");
        reply
    }
}

impl SimulatedPeer {
    pub fn new(initial_sequence_number: u32, window_size: u16) -> SimulatedPeer {
        Self::with_windows(initial_sequence_number, [window_size])
    }

    pub fn with_windows(initial_sequence_number: u32, windows: impl IntoIterator<Item = u16>) -> SimulatedPeer {
        SimulatedPeer {
            inner: RwLock::new(PeerInner {
                sequence_number: initial_sequence_number,
                receive_next: None,
                windows: windows.into_iter().collect(),
                pending_replies: VecDeque::new(),
                received_data: BytesMut::new(),
                received_segments: Vec::new(),
            }),
        }
    }

    /// in-order payload received so far
    pub async fn received_data(&self) -> Bytes {
        Bytes::copy_from_slice(&self.inner.read().await.received_data)
    }

    pub async fn received_segments(&self) -> Vec<Segment> {
        self.inner.read().await.received_segments.clone()
    }
}

#[async_trait]
impl SegmentTransport for SimulatedPeer {
    async fn wait_for_segment(&self, last_sent: Option<Segment>) -> anyhow::Result<Segment> {
        let mut inner = self.inner.write().await;
        if let Some(reply) = inner.pending_replies.pop_front() {
            return Ok(reply);
        }
        match last_sent {
            Some(segment) => Ok(inner.reply_to(&segment)),
            None => Err(anyhow!("simulated peer has nothing to reply to")),
        }
    }

    async fn send_packet(&self, segment: &Segment) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        let reply = inner.reply_to(segment);
        inner.pending_replies.push_back(reply);
        Ok(())
    }
}
