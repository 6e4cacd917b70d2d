use tracing::{debug, info};

use crate::protocol_state::ProtocolState;
use crate::segment::{FlagOverrides, SegmentFactory, SegmentOverrides};
use crate::sequence_math::compute_sendable_slice;
use crate::transport::SegmentTransport;
use crate::util::random::SequenceRandom;

/// Drains the sender buffer to the peer: sends while the peer's window has room, then waits for
///  the peer's next segment to learn about acknowledgments and window changes, and repeats until
///  every byte is acknowledged.
///
/// There is no retransmission and no bound on the number of round trips. If the peer stops
///  responding (or keeps advertising a zero window), the transfer waits for as long as the
///  transport does - cancelling it is up to the caller.
pub struct WindowedSender {
    num_round_trips: u64,
}

impl WindowedSender {
    pub fn new() -> WindowedSender {
        WindowedSender {
            num_round_trips: 0,
        }
    }

    /// number of peer segments this sender waited for
    pub fn num_round_trips(&self) -> u64 {
        self.num_round_trips
    }

    pub async fn run<R, T>(&mut self, state: &mut ProtocolState, factory: &mut SegmentFactory<R>, transport: &T) -> anyhow::Result<()>
    where
        R: SequenceRandom,
        T: SegmentTransport + ?Sized,
    {
        debug!(last_byte_acked = state.last_byte_acked(), last_byte_written = state.last_byte_written(), "starting windowed transfer");

        while !state.is_fully_acked() {
            while state.is_window_open() && state.has_unsent_data() {
                let payload = compute_sendable_slice(
                    state.sender_buffer(),
                    state.data_origin(),
                    state.last_byte_sent(),
                    state.last_byte_acked(),
                    state.current_window_size(),
                );
                let segment = factory.create_segment(SegmentOverrides {
                    sequence_number: Some(state.last_byte_sent()),
                    acknowledgment_number: Some(state.expected_seq()),
                    flags: FlagOverrides::ack(),
                    data: Some(payload),
                    ..Default::default()
                });

                state.record_sent(segment.clone());
                transport.send_packet(&segment).await?;
            }

            let response = transport.wait_for_segment(state.last_sent_packet().cloned()).await?;
            state.record_received(response);
            self.num_round_trips += 1;
        }

        info!(num_round_trips = self.num_round_trips, num_bytes = state.sender_buffer().len(), "all data acknowledged");
        Ok(())
    }
}

impl Default for WindowedSender {
    fn default() -> Self {
        Self::new()
    }
}
