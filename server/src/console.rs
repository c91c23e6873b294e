//! Operator console
//!
//! Reads commands from stdin and forwards them to the match loop. This is the
//! roster-entry and settings surface for running the server headless.

use crate::clock::{format_clock, MAX_COUNTDOWN_SECS};
use crate::config::EndpointConfig;
use crate::orchestrator::{HandleError, MatchHandle};
use log::{error, info, warn};
use photon_shared::{ParseTeamError, PlayerId, Team};
use std::net::SocketAddr;
use thiserror::Error;
use std::io::BufRead;
use tokio::sync::mpsc;

pub const HELP: &str = "\
commands:
  add <id> <red|green> [codename]   register a player (codename needed for new ids)
  start [countdown_secs]            begin the countdown
  clear                             discard the match and reset the clock
  rebind <send_addr> <bind_addr>    move the network, e.g. rebind 127.0.0.1:7500 0.0.0.0:7501
  stop                              stop the network
  status                            print the match as JSON
  help                              show this text
  quit                              shut down";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Add {
        id: PlayerId,
        team: Team,
        codename: Option<String>,
    },
    Start {
        countdown_secs: Option<u64>,
    },
    Clear,
    Rebind(EndpointConfig),
    Stop,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?}, try `help`")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid player id {0:?}")]
    InvalidId(String),

    #[error(transparent)]
    InvalidTeam(#[from] ParseTeamError),

    #[error("invalid countdown {0:?}, expected 0 to {max} seconds", max = MAX_COUNTDOWN_SECS)]
    InvalidCountdown(String),

    #[error("invalid address {0:?}")]
    InvalidAddress(String),
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(ConsoleError::Empty);
    };

    match verb.to_ascii_lowercase().as_str() {
        "add" => {
            const USAGE: &str = "add <id> <red|green> [codename]";
            let id = words.next().ok_or(ConsoleError::Usage(USAGE))?;
            let team = words.next().ok_or(ConsoleError::Usage(USAGE))?;
            let id = id
                .parse::<PlayerId>()
                .map_err(|_| ConsoleError::InvalidId(id.to_string()))?;
            let team = team.parse::<Team>()?;
            let codename = words.collect::<Vec<_>>().join(" ");

            Ok(ConsoleCommand::Add {
                id,
                team,
                codename: (!codename.is_empty()).then_some(codename),
            })
        }
        "start" => {
            let countdown_secs = match words.next() {
                Some(secs) => Some(
                    secs.parse::<u64>()
                        .ok()
                        .filter(|secs| *secs <= MAX_COUNTDOWN_SECS)
                        .ok_or_else(|| ConsoleError::InvalidCountdown(secs.to_string()))?,
                ),
                None => None,
            };
            Ok(ConsoleCommand::Start { countdown_secs })
        }
        "clear" => Ok(ConsoleCommand::Clear),
        "rebind" => {
            const USAGE: &str = "rebind <send_addr> <bind_addr>";
            let send = words.next().ok_or(ConsoleError::Usage(USAGE))?;
            let bind = words.next().ok_or(ConsoleError::Usage(USAGE))?;
            Ok(ConsoleCommand::Rebind(EndpointConfig::new(
                parse_addr(send)?,
                parse_addr(bind)?,
            )))
        }
        "stop" => Ok(ConsoleCommand::Stop),
        "status" => Ok(ConsoleCommand::Status),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        other => Err(ConsoleError::Unknown(other.to_string())),
    }
}

fn parse_addr(text: &str) -> Result<SocketAddr, ConsoleError> {
    text.parse()
        .map_err(|_| ConsoleError::InvalidAddress(text.to_string()))
}

/// Executes one command. Returns false when the operator asked to quit.
pub async fn execute(handle: &MatchHandle, command: ConsoleCommand) -> Result<bool, HandleError> {
    match command {
        ConsoleCommand::Add { id, team, codename } => {
            let player = handle.register_player(id, team, codename).await?;
            println!("added {} ({}) to {}", player.id, player.codename, team);
        }
        ConsoleCommand::Start { countdown_secs } => {
            if handle.start_match(countdown_secs).await? {
                println!("countdown started");
            } else {
                println!("a match is already underway, `clear` first");
            }
        }
        ConsoleCommand::Clear => {
            handle.clear().await?;
            println!("cleared");
        }
        ConsoleCommand::Rebind(endpoints) => {
            let addr = handle.rebind(endpoints).await?;
            println!("listening on {}, sending to {}", addr, endpoints.send_addr);
        }
        ConsoleCommand::Stop => {
            handle.stop_network().await?;
            println!("network stopped");
        }
        ConsoleCommand::Status => {
            let snapshot = handle.snapshot();
            println!(
                "{:?} {}  red {}  green {}",
                snapshot.phase,
                format_clock(snapshot.remaining_secs),
                snapshot.red_total,
                snapshot.green_total
            );
            match serde_json::to_string_pretty(&snapshot) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Failed to serialize snapshot: {}", e),
            }
        }
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => return Ok(false),
    }

    Ok(true)
}

/// Reads stdin on its own thread so a pending read never holds up runtime
/// shutdown. The channel closes on EOF or a read error.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    let reader = std::thread::Builder::new()
        .name("console-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
        });

    if let Err(e) = reader {
        error!("Could not start console reader: {}", e);
    }

    rx
}

/// Executes lines until the channel closes or the operator quits.
pub async fn run(handle: MatchHandle, mut lines: mpsc::UnboundedReceiver<String>) {
    info!("Console ready, type `help` for commands");

    while let Some(line) = lines.recv().await {
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(ConsoleError::Empty) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match execute(&handle, command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(HandleError::Closed) => {
                warn!("Match loop closed, leaving console");
                break;
            }
            Err(e) => println!("error: {}", e),
        }
    }
}
