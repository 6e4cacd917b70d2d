//! Pure sequence number arithmetic.
//!
//! Sequence numbers are `u32` and wrap around. All counters follow the same convention: they
//!  denote the *next* position (next byte to send, next byte the peer expects, one past the last
//!  written byte), so a payload of `n` bytes advances a counter by exactly `n`.

use bytes::Bytes;

use crate::segment::Segment;

/// The sequence number the receiver of `segment` expects next.
pub fn calculate_ack(segment: &Segment) -> u32 {
    segment.sequence_number.wrapping_add(segment.data.len() as u32)
}

/// Number of bytes sent but not yet acknowledged.
pub fn bytes_in_flight(last_byte_sent: u32, last_byte_acked: u32) -> u32 {
    last_byte_sent.wrapping_sub(last_byte_acked)
}

pub fn is_window_open(last_byte_sent: u32, last_byte_acked: u32, window_size: u16) -> bool {
    bytes_in_flight(last_byte_sent, last_byte_acked) < window_size as u32
}

/// Returns the part of `buffer` that may go into the next segment: starting at the first unsent
///  byte, at most as long as the unused part of the window, never extending beyond the buffer.
///
/// `initial_seq` is the sequence number of the buffer's first byte. The result is empty if the
///  window is saturated or the buffer is exhausted.
pub fn compute_sendable_slice(buffer: &Bytes, initial_seq: u32, last_byte_sent: u32, last_byte_acked: u32, window_size: u16) -> Bytes {
    let usable_window = (window_size as u32).saturating_sub(bytes_in_flight(last_byte_sent, last_byte_acked)) as usize;

    let offset = last_byte_sent.wrapping_sub(initial_seq) as usize;
    if offset >= buffer.len() {
        return Bytes::new();
    }

    let len = usable_window.min(buffer.len() - offset);
    buffer.slice(offset..offset + len)
}

/// `lhs < rhs` in wrap-around sequence space: true if `rhs` is less than 2^31 ahead of `lhs`
pub fn seq_lt(lhs: u32, rhs: u32) -> bool {
    lhs.wrapping_sub(rhs) > (1 << 31)
}

pub fn seq_le(lhs: u32, rhs: u32) -> bool {
    lhs == rhs || seq_lt(lhs, rhs)
}

pub fn seq_gt(lhs: u32, rhs: u32) -> bool {
    seq_lt(rhs, lhs)
}
