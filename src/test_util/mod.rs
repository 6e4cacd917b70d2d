//! Utilities for testing code that drives sessions: segment builders and a scripted transport.
//!  They are used for testing this crate itself, but they are also exported for hosts' tests
//!  of their own transports and views.

pub mod segment;
pub mod transport;
