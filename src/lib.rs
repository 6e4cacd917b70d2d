//! Simulation of TCP connection establishment and window-limited data transfer, built for
//!  visualising the mechanics step by step: segments are plain structs, the network is whatever
//!  [transport::SegmentTransport] the host injects, and every segment sent or received is kept
//!  in the session's logs.

pub mod config;
pub mod handshake;
pub mod peer;
pub mod protocol_state;
pub mod segment;
pub mod sequence_math;
pub mod session;
pub mod test_util;
pub mod transport;
pub mod util;
pub mod windowed_sender;
