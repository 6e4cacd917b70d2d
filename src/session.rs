use std::sync::Arc;

use anyhow::bail;
use bytes::Bytes;
use tracing::debug;

use crate::config::SessionConfig;
use crate::handshake::{HandshakeCoordinator, HandshakeState};
use crate::protocol_state::ProtocolState;
use crate::segment::SegmentFactory;
use crate::transport::SegmentTransport;
use crate::util::random::{RngSequenceRandom, SequenceRandom};
use crate::windowed_sender::WindowedSender;

/// One simulated exchange: handshake followed by a sliding window transfer of the sender buffer.
///
/// A session is created per exchange and owns its [ProtocolState] exclusively, lending it to the
///  handshake coordinator and then to the windowed sender.
pub struct Session<R: SequenceRandom> {
    factory: SegmentFactory<R>,
    state: ProtocolState,
    handshake: HandshakeCoordinator,
    sender: WindowedSender,
}

impl Session<RngSequenceRandom> {
    pub fn new(config: Arc<SessionConfig>, sender_buffer: Bytes) -> anyhow::Result<Session<RngSequenceRandom>> {
        Self::new_with_random(config, RngSequenceRandom::new(), sender_buffer)
    }
}

impl <R: SequenceRandom> Session<R> {
    pub fn new_with_random(config: Arc<SessionConfig>, random: R, sender_buffer: Bytes) -> anyhow::Result<Session<R>> {
        config.validate()?;

        let mut factory = SegmentFactory::new(config, random);
        let initial_sequence_number = factory.new_initial_sequence_number();
        debug!(initial_sequence_number, num_bytes = sender_buffer.len(), "new session");

        Ok(Session {
            factory,
            state: ProtocolState::new(initial_sequence_number, sender_buffer),
            handshake: HandshakeCoordinator::new(),
            sender: WindowedSender::new(),
        })
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.handshake.state()
    }

    pub fn num_round_trips(&self) -> u64 {
        self.sender.num_round_trips()
    }

    pub fn set_sender_buffer(&mut self, sender_buffer: Bytes) -> anyhow::Result<()> {
        self.state.set_sender_buffer(sender_buffer)
    }

    pub async fn handshake<T: SegmentTransport + ?Sized>(&mut self, transport: &T) -> anyhow::Result<()> {
        self.handshake.run(&mut self.state, &mut self.factory, transport).await
    }

    /// sends the rest of the sender buffer - requires an established connection
    pub async fn transfer<T: SegmentTransport + ?Sized>(&mut self, transport: &T) -> anyhow::Result<()> {
        if self.handshake.state() != HandshakeState::Established {
            bail!("transfer requires an established connection, handshake state is {:?}", self.handshake.state());
        }
        self.sender.run(&mut self.state, &mut self.factory, transport).await
    }

    /// handshake followed by transfer
    pub async fn run<T: SegmentTransport + ?Sized>(&mut self, transport: &T) -> anyhow::Result<()> {
        self.handshake(transport).await?;
        self.transfer(transport).await
    }

    /// Discards the logs and counters of a previous attempt so the session can start over, e.g.
    ///  after a failed handshake. Initial sequence number and sender buffer are kept.
    pub fn reset(&mut self) {
        self.state.reset();
        self.handshake = HandshakeCoordinator::new();
        self.sender = WindowedSender::new();
    }
}
