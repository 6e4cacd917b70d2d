use async_trait::async_trait;
#[cfg(test)] use mockall::automock;

use crate::segment::Segment;

/// This is the boundary between the protocol core and whatever carries segments to and from
///  the peer - a mock, an in-memory simulation (see [crate::peer::SimulatedPeer]) or a real
///  network.
///
/// Both calls are suspension points of a session. Errors are propagated to the session's caller
///  unchanged; the core never retries and never times out on its own, so any timeout or
///  cancellation policy belongs to the implementation (or to the code awaiting the session).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SegmentTransport: Send + Sync {
    /// Resolves with the peer's next segment. `last_sent` is the most recently sent segment if
    ///  the caller has one to offer as context.
    async fn wait_for_segment(&self, last_sent: Option<Segment>) -> anyhow::Result<Segment>;

    /// Resolves once the segment is accepted for transmission.
    async fn send_packet(&self, segment: &Segment) -> anyhow::Result<()>;
}
