use std::sync::Arc;

use anyhow::bail;
use bytes::Bytes;
use clap::Parser;
use clap_derive::Parser;
use tcpsim::config::SessionConfig;
use tcpsim::peer::SimulatedPeer;
use tcpsim::session::Session;
use tcpsim::util::random::{RngSequenceRandom, SequenceRandom};
use tracing::{info, Level};

/// Runs a handshake and a sliding window transfer against an in-memory peer, and prints the
///  segments that went back and forth.
#[derive(Parser)]
struct Args {
    /// the data to transfer
    #[clap(default_value = "Hello, sliding window!")]
    data: String,

    /// windows advertised by the peer, one per reply - the last one is repeated
    #[clap(short, long, value_delimiter = ',', default_values_t = vec![4u16])]
    windows: Vec<u16>,

    /// seed for initial sequence numbers, random if omitted
    #[clap(long)]
    seed: Option<u64>,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.windows.last().copied().unwrap_or(0) == 0 {
        bail!("the last advertised window must not be 0 - the transfer would never finish");
    }

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let mut random = match args.seed {
        Some(seed) => RngSequenceRandom::seeded(seed),
        None => RngSequenceRandom::new(),
    };
    let peer_isn = random.next_u32();
    let peer = SimulatedPeer::with_windows(peer_isn, args.windows.iter().copied());

    let mut session = Session::new_with_random(Arc::new(SessionConfig::new()), random, Bytes::from(args.data))?;
    session.run(&peer).await?;

    let state = session.state();
    println!("sent:");
    for segment in state.sent_packets() {
        println!("  {}  {:?}", segment, String::from_utf8_lossy(&segment.data));
    }
    println!("received:");
    for segment in state.received_packets() {
        println!("  {}", segment);
    }

    info!(round_trips = session.num_round_trips(), "peer received {:?}", String::from_utf8_lossy(&peer.received_data().await));
    Ok(())
}
