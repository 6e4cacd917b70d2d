use anyhow::bail;

/// The fixed port the simulated receiver uses as its source port
pub const RECEIVER_PORT: u16 = 2137;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// source port of segments created by this side of the session
    pub local_port: u16,
    pub remote_port: u16,

    /// header length in 32-bit words. Options are not supported, so this is 5 in practice
    pub data_offset: u8,

    /// window advertised in segments this side sends
    pub advertised_window: u16,

    /// segments without an explicit sequence number get a random one in `0..=max_random_sequence_number`
    pub max_random_sequence_number: u32,
}

impl SessionConfig {
    pub fn new() -> SessionConfig {
        SessionConfig {
            local_port: RECEIVER_PORT,
            remote_port: 80,
            data_offset: 5,
            advertised_window: 4,
            max_random_sequence_number: 1000,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(5..=15).contains(&self.data_offset) {
            bail!("data offset must be between 5 and 15 words, was {}", self.data_offset);
        }
        if self.remote_port == 0 {
            bail!("remote port must not be 0");
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}
