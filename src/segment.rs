use std::fmt::{Display, Formatter};
use std::sync::Arc;

use bytes::Bytes;

use crate::config::SessionConfig;
use crate::util::random::SequenceRandom;


#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentFlags {
    pub urg: bool,
    pub ack: bool,
    pub psh: bool,
    pub rst: bool,
    pub syn: bool,
    pub fin: bool,
}
impl SegmentFlags {
    /// applies those flags that are explicitly set in the overrides, leaving all others unchanged
    pub fn merge(self, overrides: &FlagOverrides) -> SegmentFlags {
        SegmentFlags {
            urg: overrides.urg.unwrap_or(self.urg),
            ack: overrides.ack.unwrap_or(self.ack),
            psh: overrides.psh.unwrap_or(self.psh),
            rst: overrides.rst.unwrap_or(self.rst),
            syn: overrides.syn.unwrap_or(self.syn),
            fin: overrides.fin.unwrap_or(self.fin),
        }
    }
}

impl Display for SegmentFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names = [
            (self.urg, "URG"),
            (self.ack, "ACK"),
            (self.psh, "PSH"),
            (self.rst, "RST"),
            (self.syn, "SYN"),
            (self.fin, "FIN"),
        ];

        let mut first = true;
        for (_, name) in names.iter().filter(|(is_set, _)| *is_set) {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}", name)?;
            first = false;
        }
        if first {
            write!(f, "-")?;
        }
        Ok(())
    }
}

/// A segment of the simulated protocol: a TCP header's fields plus payload. Checksum, urgent
///  pointer and options are carried along but never computed or interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub source_port: u16,
    pub destination_port: u16,
    /// sequence number of the first payload byte
    pub sequence_number: u32,
    /// next sequence number the sender expects from its peer - meaningful only if the ACK flag is set
    pub acknowledgment_number: Option<u32>,
    /// header length in 32-bit words (4 bits on the wire)
    pub data_offset: u8,
    pub reserved: Option<u8>,
    pub flags: SegmentFlags,
    pub window_size: u16,
    pub checksum: u16,
    pub urgent_pointer: Option<u16>,
    pub options: Option<Bytes>,
    pub data: Bytes,
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}->{} seq={}", self.flags, self.source_port, self.destination_port, self.sequence_number)?;
        if let Some(ack) = self.acknowledgment_number {
            write!(f, " ack={}", ack)?;
        }
        write!(f, " win={} len={}", self.window_size, self.data.len())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagOverrides {
    pub urg: Option<bool>,
    pub ack: Option<bool>,
    pub psh: Option<bool>,
    pub rst: Option<bool>,
    pub syn: Option<bool>,
    pub fin: Option<bool>,
}
impl FlagOverrides {
    pub fn syn() -> FlagOverrides {
        FlagOverrides { syn: Some(true), ..Default::default() }
    }

    pub fn ack() -> FlagOverrides {
        FlagOverrides { ack: Some(true), ..Default::default() }
    }
}

/// Field-by-field overrides for [SegmentFactory::create_segment]. `None` means 'use the default'.
///  Flags are merged individually rather than replacing the whole flag set.
#[derive(Debug, Clone, Default)]
pub struct SegmentOverrides {
    pub source_port: Option<u16>,
    pub destination_port: Option<u16>,
    pub sequence_number: Option<u32>,
    pub acknowledgment_number: Option<u32>,
    pub data_offset: Option<u8>,
    pub reserved: Option<u8>,
    pub flags: FlagOverrides,
    pub window_size: Option<u16>,
    pub checksum: Option<u16>,
    pub urgent_pointer: Option<u16>,
    pub options: Option<Bytes>,
    pub data: Option<Bytes>,
}

pub struct SegmentFactory<R: SequenceRandom> {
    config: Arc<SessionConfig>,
    random: R,
}
impl <R: SequenceRandom> SegmentFactory<R> {
    pub fn new(config: Arc<SessionConfig>, random: R) -> SegmentFactory<R> {
        SegmentFactory {
            config,
            random,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// draws a fresh initial sequence number from the full 32 bit range
    pub fn new_initial_sequence_number(&mut self) -> u32 {
        self.random.next_u32()
    }

    pub fn create_segment(&mut self, overrides: SegmentOverrides) -> Segment {
        let sequence_number = match overrides.sequence_number {
            Some(seq) => seq,
            None => self.random.gen_u32_inclusive(self.config.max_random_sequence_number),
        };

        Segment {
            source_port: overrides.source_port.unwrap_or(self.config.local_port),
            destination_port: overrides.destination_port.unwrap_or(self.config.remote_port),
            sequence_number,
            acknowledgment_number: overrides.acknowledgment_number,
            data_offset: overrides.data_offset.unwrap_or(self.config.data_offset),
            reserved: overrides.reserved,
            flags: SegmentFlags::default().merge(&overrides.flags),
            window_size: overrides.window_size.unwrap_or(self.config.advertised_window),
            checksum: overrides.checksum.unwrap_or(0),
            urgent_pointer: overrides.urgent_pointer,
            options: overrides.options,
            data: overrides.data.unwrap_or_default(),
        }
    }
}
