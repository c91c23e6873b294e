use clap::Parser;
use log::{error, info};
use photon_server::clock::{MAX_COUNTDOWN_SECS, MAX_MATCH_SECS};
use photon_server::config::{EndpointConfig, MatchConfig};
use photon_server::console;
use photon_server::directory::InMemoryDirectory;
use photon_server::orchestrator::Orchestrator;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address outbound codes are sent to
    #[arg(long, env = "PHOTON_SEND_ADDR", default_value = "127.0.0.1")]
    send_addr: String,

    /// Port outbound codes are sent to
    #[arg(long, env = "PHOTON_SEND_PORT", default_value = "7500")]
    send_port: u16,

    /// Local address to receive equipment packets on
    #[arg(long, env = "PHOTON_BIND_ADDR", default_value = "0.0.0.0")]
    bind_addr: String,

    /// Local port to receive equipment packets on
    #[arg(long, env = "PHOTON_RECV_PORT", default_value = "7501")]
    bind_port: u16,

    /// Default pre-game countdown in seconds
    #[arg(
        short = 'c',
        long,
        env = "PHOTON_COUNTDOWN_SECS",
        default_value = "30",
        value_parser = clap::value_parser!(u64).range(0..=MAX_COUNTDOWN_SECS)
    )]
    countdown: u64,

    /// Match length in seconds
    #[arg(
        short = 'm',
        long,
        env = "PHOTON_MATCH_SECS",
        default_value = "360",
        value_parser = clap::value_parser!(u64).range(1..=MAX_MATCH_SECS)
    )]
    match_secs: u64,

    /// Players allowed per team
    #[arg(long, default_value = "15")]
    max_team_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let endpoints =
        EndpointConfig::from_parts(&args.send_addr, args.send_port, &args.bind_addr, args.bind_port)?;
    let config = MatchConfig {
        default_countdown_secs: args.countdown,
        match_secs: args.match_secs,
        max_team_size: args.max_team_size,
        ..MatchConfig::default()
    };

    let (mut orchestrator, handle) =
        Orchestrator::new(config, endpoints, Box::new(InMemoryDirectory::new()));
    let local = orchestrator.start_network().await?;
    info!("Receiving on {}, sending to {}", local, endpoints.send_addr);

    let mut match_loop = tokio::spawn(orchestrator.run());
    let mut operator = tokio::spawn(console::run(handle.clone(), console::spawn_stdin_reader()));

    tokio::select! {
        result = &mut match_loop => {
            if let Err(e) = result {
                error!("Match loop panicked: {}", e);
            }
            return Ok(());
        }
        _ = &mut operator => {
            info!("Console closed, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    handle.shutdown();
    operator.abort();
    if let Err(e) = match_loop.await {
        error!("Match loop panicked: {}", e);
    }

    Ok(())
}
