//! Equipment simulator.
//!
//! Waits for the match start code, then fires random hits and base captures
//! between the configured players until the match end code arrives.

use clap::Parser;
use log::{debug, info, warn};
use photon_shared::{
    capture_code_for, decode_line, PlayerId, Team, MATCH_END_CODE, MATCH_START_CODE,
};
use rand::seq::SliceRandom;
use rand::Rng;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::time::{interval, Duration};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address the match server broadcasts to
    #[arg(short = 'l', long, default_value = "127.0.0.1:7500")]
    listen: SocketAddr,

    /// Address the match server receives on
    #[arg(short = 't', long, default_value = "127.0.0.1:7501")]
    target: SocketAddr,

    /// Red player ids, comma separated
    #[arg(long, value_delimiter = ',', default_value = "1,2")]
    red: Vec<PlayerId>,

    /// Green player ids, comma separated
    #[arg(long, value_delimiter = ',', default_value = "3,4")]
    green: Vec<PlayerId>,

    /// Milliseconds between generated events
    #[arg(short = 'i', long, default_value = "500")]
    interval_ms: u64,

    /// Stop after this many events even without an end code
    #[arg(short = 'n', long)]
    max_events: Option<u32>,

    /// Start sending immediately instead of waiting for the start code
    #[arg(long)]
    no_wait: bool,

    /// Chance that an event is a base capture
    #[arg(long, default_value = "0.05")]
    base_chance: f64,
}

/// Picks the next packet to send.
fn random_event<R: Rng>(rng: &mut R, args: &Args) -> Option<String> {
    let mut players: Vec<(PlayerId, Team)> = args.red.iter().map(|id| (*id, Team::Red)).collect();
    players.extend(args.green.iter().map(|id| (*id, Team::Green)));

    let (attacker, team) = *players.choose(rng)?;

    if rng.gen_bool(args.base_chance.clamp(0.0, 1.0)) {
        return Some(format!("{}:{}", attacker, capture_code_for(team)));
    }

    let targets: Vec<PlayerId> = players
        .iter()
        .map(|(id, _)| *id)
        .filter(|id| *id != attacker)
        .collect();
    let target = targets.choose(rng)?;
    Some(format!("{}:{}", attacker, target))
}

async fn recv_code(socket: &UdpSocket, buffer: &mut [u8]) -> Option<i32> {
    match socket.recv_from(buffer).await {
        Ok((len, _)) => {
            let text = String::from_utf8_lossy(&buffer[..len]);
            match text.trim().parse::<i32>() {
                Ok(code) => Some(code),
                Err(_) => {
                    warn!("Unexpected payload {:?}: {:?}", text, decode_line(&text));
                    None
                }
            }
        }
        Err(e) => {
            warn!("Receive error: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let socket = UdpSocket::bind(args.listen).await?;
    info!("Listening for server broadcasts on {}", socket.local_addr()?);
    info!("Sending equipment packets to {}", args.target);

    let mut buffer = [0u8; 1024];

    if !args.no_wait {
        info!("Waiting for start code {}...", MATCH_START_CODE);
        loop {
            match recv_code(&socket, &mut buffer).await {
                Some(MATCH_START_CODE) => break,
                Some(code) => debug!("Received {}", code),
                None => {}
            }
        }
        info!("Match started");
    }

    let mut ticker = interval(Duration::from_millis(args.interval_ms.max(1)));
    let mut rng = rand::thread_rng();
    let mut sent = 0u32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if args.max_events.is_some_and(|max| sent >= max) {
                    info!("Sent {} events, stopping", sent);
                    break;
                }

                let Some(packet) = random_event(&mut rng, &args) else {
                    warn!("Need at least two players to generate traffic");
                    break;
                };

                socket.send_to(packet.as_bytes(), args.target).await?;
                info!("Sent {}", packet);
                sent += 1;
            }

            code = recv_code(&socket, &mut buffer) => match code {
                Some(MATCH_END_CODE) => {
                    info!("Received end code after {} events", sent);
                    break;
                }
                Some(code) => debug!("Received {}", code),
                None => {}
            },
        }
    }

    Ok(())
}
