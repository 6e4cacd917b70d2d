use bytes::Bytes;
use crate::config::RECEIVER_PORT;
use crate::segment::{Segment, SegmentFlags};

/// convenience method for unit test code: a segment from the peer with the given sequence number,
///  no flags, no payload and the default window
pub fn test_segment(sequence_number: u32) -> Segment {
    Segment {
        source_port: 80,
        destination_port: RECEIVER_PORT,
        sequence_number,
        acknowledgment_number: None,
        data_offset: 5,
        reserved: None,
        flags: SegmentFlags::default(),
        window_size: 4,
        checksum: 0,
        urgent_pointer: None,
        options: None,
        data: Bytes::new(),
    }
}

pub fn test_ack_segment(sequence_number: u32, acknowledgment_number: u32, window_size: u16) -> Segment {
    Segment {
        acknowledgment_number: Some(acknowledgment_number),
        flags: SegmentFlags { ack: true, ..Default::default() },
        window_size,
        ..test_segment(sequence_number)
    }
}

pub fn test_syn_ack_segment(sequence_number: u32, acknowledgment_number: u32, window_size: u16) -> Segment {
    let mut segment = test_ack_segment(sequence_number, acknowledgment_number, window_size);
    segment.flags.syn = true;
    segment
}
