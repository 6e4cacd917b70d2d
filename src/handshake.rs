use anyhow::bail;
use tracing::{debug, info};

use crate::protocol_state::ProtocolState;
use crate::segment::{FlagOverrides, Segment, SegmentFactory, SegmentOverrides};
use crate::sequence_math::compute_sendable_slice;
use crate::transport::SegmentTransport;
use crate::util::random::SequenceRandom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    SynSent,
    Established,
    Failed,
}

/// The peer answered our SYN with a segment that is not a SYN
#[derive(Debug, thiserror::Error)]
#[error("handshake failed: peer responded with {response}, which does not carry the SYN flag")]
pub struct HandshakeError {
    pub response: Segment,
}

/// Drives the two-exchange handshake:
///
/// ```ascii
///  Idle --SYN--> SynSent --(peer SYN)--ACK+data--> (peer segment) Established
///                        \-(anything else)--> Failed
/// ```
///
/// The ACK we send as the second step already carries the first window-limited slice of the
///  sender buffer.
pub struct HandshakeCoordinator {
    state: HandshakeState,
}

impl HandshakeCoordinator {
    pub fn new() -> HandshakeCoordinator {
        HandshakeCoordinator {
            state: HandshakeState::Idle,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Runs the handshake on a fresh session. On a peer response without SYN, this fails with a
    ///  [HandshakeError] and the sent log is cleared, leaving no trace of the attempt. Transport
    ///  errors are returned as they are.
    pub async fn run<R, T>(&mut self, state: &mut ProtocolState, factory: &mut SegmentFactory<R>, transport: &T) -> anyhow::Result<()>
    where
        R: SequenceRandom,
        T: SegmentTransport + ?Sized,
    {
        if self.state != HandshakeState::Idle {
            bail!("a handshake was already attempted with this coordinator (state {:?})", self.state);
        }
        if !state.sent_packets().is_empty() {
            bail!("a handshake requires a fresh session, but {} segments were sent already", state.sent_packets().len());
        }

        let syn = factory.create_segment(SegmentOverrides {
            sequence_number: Some(state.data_origin()),
            flags: FlagOverrides::syn(),
            ..Default::default()
        });
        state.record_sent(syn.clone());
        self.state = HandshakeState::SynSent;
        debug!(isn = state.initial_sequence_number(), "SYN sent");

        let response = transport.wait_for_segment(Some(syn)).await?;
        if !response.flags.syn {
            debug!(%response, "peer did not respond with SYN - aborting handshake");
            state.clear_sent_packets();
            self.state = HandshakeState::Failed;
            return Err(HandshakeError { response }.into());
        }
        state.record_received(response);

        let payload = compute_sendable_slice(
            state.sender_buffer(),
            state.data_origin(),
            state.last_byte_sent(),
            state.last_byte_acked(),
            state.current_window_size(),
        );
        let ack = factory.create_segment(SegmentOverrides {
            sequence_number: Some(state.last_byte_sent()),
            acknowledgment_number: Some(state.expected_seq()),
            flags: FlagOverrides::ack(),
            data: Some(payload),
            ..Default::default()
        });
        state.record_sent(ack.clone());

        let response = transport.wait_for_segment(Some(ack)).await?;
        state.record_received(response);

        self.state = HandshakeState::Established;
        info!(expected_seq = state.expected_seq(), window = state.current_window_size(), "connection established");
        Ok(())
    }
}

impl Default for HandshakeCoordinator {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use anyhow::anyhow;
    use bytes::Bytes;
    use rstest::rstest;
    use crate::config::SessionConfig;
    use crate::sequence_math::calculate_ack;
    use crate::test_util::segment::{test_ack_segment, test_syn_ack_segment};
    use crate::test_util::transport::ScriptedTransport;
    use crate::transport::MockSegmentTransport;
    use crate::util::random::RngSequenceRandom;
    use super::*;

    const ISN: u32 = 42;

    fn factory() -> SegmentFactory<RngSequenceRandom> {
        SegmentFactory::new(Arc::new(SessionConfig::new()), RngSequenceRandom::seeded(3))
    }

    /// the peer segment used by the handshake tests: SYN and ACK set, sequence number 100
    fn peer_segment() -> Segment {
        let mut segment = test_syn_ack_segment(100, 43, 4);
        segment.source_port = 80;
        segment.destination_port = 2137;
        segment
    }

    #[tokio::test]
    async fn test_handshake_success() {
        let mut transport = MockSegmentTransport::new();
        transport.expect_wait_for_segment()
            .times(2)
            .returning(|_| Ok(peer_segment()));

        let mut state = ProtocolState::new(ISN, Bytes::from_static(b"ABCDEFGH"));
        let mut coordinator = HandshakeCoordinator::new();
        coordinator.run(&mut state, &mut factory(), &transport).await.unwrap();

        assert_eq!(coordinator.state(), HandshakeState::Established);
        assert_eq!(state.sent_packets().len(), 2);
        assert_eq!(state.received_packets().len(), 2);
        assert_eq!(state.received_packets()[0], peer_segment());
        assert_eq!(state.expected_seq(), calculate_ack(&state.received_packets()[1]));
        assert_eq!(state.expected_seq(), 100);
    }

    #[tokio::test]
    async fn test_handshake_segments() {
        let transport = ScriptedTransport::new([
            test_syn_ack_segment(500, 43, 2),
            test_ack_segment(501, 45, 3),
        ]);

        let mut state = ProtocolState::new(ISN, Bytes::from_static(b"ABCD"));
        let mut coordinator = HandshakeCoordinator::new();
        coordinator.run(&mut state, &mut factory(), &transport).await.unwrap();

        let syn = &state.sent_packets()[0];
        assert!(syn.flags.syn);
        assert!(!syn.flags.ack);
        assert_eq!(syn.sequence_number, ISN + 1);
        assert!(syn.data.is_empty());

        let ack = &state.sent_packets()[1];
        assert!(ack.flags.ack);
        assert!(!ack.flags.syn);
        assert_eq!(ack.sequence_number, ISN + 1);
        assert_eq!(ack.acknowledgment_number, Some(500));
        assert_eq!(ack.data, Bytes::from_static(b"AB"));

        // the transport saw each segment as context
        assert_eq!(transport.wait_contexts().await, vec![Some(syn.clone()), Some(ack.clone())]);

        assert_eq!(state.last_byte_sent(), ISN + 3);
        assert_eq!(state.last_byte_acked(), ISN + 3);
        assert_eq!(state.current_window_size(), 3);
        assert_eq!(state.expected_seq(), 501);
    }

    #[rstest]
    #[case::window_smaller_than_buffer(b"ABCD", 2, b"AB")]
    #[case::empty_buffer(b"", 4, b"")]
    #[case::empty_buffer_big_window(b"", 1000, b"")]
    #[case::window_exceeds_buffer(b"123", 12, b"123")]
    #[case::window_of_three(b"ABCDEFGH", 3, b"ABC")]
    #[case::zero_window(b"ABCDEFGH", 0, b"")]
    #[case::zero_window_short_buffer(b"A", 0, b"")]
    fn test_ack_payload_sizing(#[case] buffer: &'static [u8], #[case] window: u16, #[case] expected: &'static [u8]) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async move {
            let transport = ScriptedTransport::new([
                test_syn_ack_segment(500, ISN + 1, window),
                test_ack_segment(501, ISN + 1, window),
            ]);

            let mut state = ProtocolState::new(ISN, Bytes::from_static(buffer));
            HandshakeCoordinator::new().run(&mut state, &mut factory(), &transport).await.unwrap();

            assert_eq!(state.sent_packets()[1].data, Bytes::from_static(expected));
            assert_eq!(state.last_byte_sent(), ISN + 1 + expected.len() as u32);
        });
    }

    #[tokio::test]
    async fn test_handshake_fails_without_syn() {
        let mut bad_segment = peer_segment();
        bad_segment.flags.syn = false;

        let mut transport = MockSegmentTransport::new();
        transport.expect_wait_for_segment()
            .times(1)
            .returning(move |_| Ok(bad_segment.clone()));

        let mut state = ProtocolState::new(ISN, Bytes::from_static(b"ABCD"));
        let mut coordinator = HandshakeCoordinator::new();
        let result = coordinator.run(&mut state, &mut factory(), &transport).await;

        let err = result.unwrap_err();
        let handshake_error = err.downcast_ref::<HandshakeError>().expect("expected a HandshakeError");
        assert!(!handshake_error.response.flags.syn);

        assert_eq!(coordinator.state(), HandshakeState::Failed);
        assert!(state.sent_packets().is_empty());
        assert!(state.received_packets().is_empty());
        assert_eq!(state.current_window_size(), 0);
        assert_eq!(state.last_byte_sent(), ISN + 1);
    }

    #[tokio::test]
    async fn test_transport_error_is_propagated() {
        let mut transport = MockSegmentTransport::new();
        transport.expect_wait_for_segment()
            .times(1)
            .returning(|_| Err(anyhow!("connection lost")));

        let mut state = ProtocolState::new(ISN, Bytes::from_static(b"ABCD"));
        let mut coordinator = HandshakeCoordinator::new();
        let err = coordinator.run(&mut state, &mut factory(), &transport).await.unwrap_err();

        assert_eq!(err.to_string(), "connection lost");
        assert!(err.downcast_ref::<HandshakeError>().is_none());
        assert_eq!(coordinator.state(), HandshakeState::SynSent);
        assert_eq!(state.sent_packets().len(), 1);
        assert!(state.received_packets().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_on_second_exchange() {
        let mut seq = mockall::Sequence::new();
        let mut transport = MockSegmentTransport::new();
        transport.expect_wait_for_segment()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(test_syn_ack_segment(500, ISN + 1, 4)));
        transport.expect_wait_for_segment()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(anyhow!("peer went away")));

        let mut state = ProtocolState::new(ISN, Bytes::from_static(b"ABCD"));
        let mut coordinator = HandshakeCoordinator::new();
        let err = coordinator.run(&mut state, &mut factory(), &transport).await.unwrap_err();

        assert_eq!(err.to_string(), "peer went away");
        assert_eq!(state.sent_packets().len(), 2);
        assert_eq!(state.received_packets().len(), 1);
    }

    #[tokio::test]
    async fn test_coordinator_runs_only_once() {
        let transport = ScriptedTransport::new([
            test_syn_ack_segment(500, ISN + 1, 4),
            test_ack_segment(501, ISN + 1, 4),
        ]);

        let mut state = ProtocolState::new(ISN, Bytes::new());
        let mut coordinator = HandshakeCoordinator::new();
        coordinator.run(&mut state, &mut factory(), &transport).await.unwrap();

        let mut fresh_state = ProtocolState::new(ISN, Bytes::new());
        assert!(coordinator.run(&mut fresh_state, &mut factory(), &transport).await.is_err());
        assert!(fresh_state.sent_packets().is_empty());
    }

    #[tokio::test]
    async fn test_handshake_requires_fresh_session() {
        let transport = ScriptedTransport::new([
            test_syn_ack_segment(500, ISN + 1, 4),
            test_ack_segment(501, ISN + 1, 4),
        ]);

        let mut state = ProtocolState::new(ISN, Bytes::new());
        HandshakeCoordinator::new().run(&mut state, &mut factory(), &transport).await.unwrap();

        assert!(HandshakeCoordinator::new().run(&mut state, &mut factory(), &transport).await.is_err());
        assert_eq!(state.sent_packets().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_after_reset() {
        let mut bad_segment = test_ack_segment(500, ISN + 1, 4);
        bad_segment.flags.syn = false;
        let transport = ScriptedTransport::new([
            bad_segment,
            test_syn_ack_segment(500, ISN + 1, 4),
            test_ack_segment(501, ISN + 1, 4),
        ]);

        let mut state = ProtocolState::new(ISN, Bytes::from_static(b"AB"));
        let mut factory = factory();
        assert!(HandshakeCoordinator::new().run(&mut state, &mut factory, &transport).await.is_err());

        state.reset();
        let mut coordinator = HandshakeCoordinator::new();
        coordinator.run(&mut state, &mut factory, &transport).await.unwrap();
        assert_eq!(coordinator.state(), HandshakeState::Established);
        assert_eq!(state.sent_packets().len(), 2);
    }
}
