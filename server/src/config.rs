//! Endpoint and match timing configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SEND_PORT: u16 = 7500;
pub const DEFAULT_BIND_PORT: u16 = 7501;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("cannot resolve address {host}:{port}: {reason}")]
    InvalidAddress {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("invalid port {0:?}")]
    InvalidPort(String),

    #[error("unknown endpoint setting {0:?}")]
    UnknownKey(String),
}

/// Where outbound codes go and where inbound packets are received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig {
    pub send_addr: SocketAddr,
    pub bind_addr: SocketAddr,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            send_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_SEND_PORT),
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_BIND_PORT),
        }
    }
}

impl EndpointConfig {
    pub fn new(send_addr: SocketAddr, bind_addr: SocketAddr) -> Self {
        Self {
            send_addr,
            bind_addr,
        }
    }

    /// Builds a config from host names and ports, resolving host names once.
    pub fn from_parts(
        send_host: &str,
        send_port: u16,
        bind_host: &str,
        bind_port: u16,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            send_addr: resolve(send_host, send_port)?,
            bind_addr: resolve(bind_host, bind_port)?,
        })
    }

    /// Applies persisted key-value settings on top of the defaults.
    ///
    /// Recognized keys are `send_addr`, `send_port`, `bind_addr` and `bind_port`.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let defaults = Self::default();
        let mut send_host = defaults.send_addr.ip().to_string();
        let mut send_port = defaults.send_addr.port();
        let mut bind_host = defaults.bind_addr.ip().to_string();
        let mut bind_port = defaults.bind_addr.port();

        for (key, value) in pairs {
            match key.trim() {
                "send_addr" => send_host = value.trim().to_string(),
                "send_port" => send_port = parse_port(value)?,
                "bind_addr" => bind_host = value.trim().to_string(),
                "bind_port" => bind_port = parse_port(value)?,
                other => return Err(ConfigError::UnknownKey(other.to_string())),
            }
        }

        Self::from_parts(&send_host, send_port, &bind_host, bind_port)
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("send_addr", self.send_addr.ip().to_string()),
            ("send_port", self.send_addr.port().to_string()),
            ("bind_addr", self.bind_addr.ip().to_string()),
            ("bind_port", self.bind_addr.port().to_string()),
        ]
    }
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidPort(value.to_string()))
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let invalid = |reason: String| ConfigError::InvalidAddress {
        host: host.to_string(),
        port,
        reason,
    };

    (host, port)
        .to_socket_addrs()
        .map_err(|e| invalid(e.to_string()))?
        .next()
        .ok_or_else(|| invalid("no addresses found".to_string()))
}

/// Timing and roster limits for a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchConfig {
    /// Countdown used when the operator does not pick one.
    pub default_countdown_secs: u64,
    /// Length of active play.
    pub match_secs: u64,
    /// How often the clock compares its deadline with now.
    pub tick_interval: Duration,
    /// Minimum spacing between the repeated match end signals.
    pub end_signal_gap: Duration,
    /// Pause after stopping the network so the OS releases the port.
    pub rebind_grace: Duration,
    /// Number of feed lines included in a snapshot.
    pub feed_tail: usize,
    pub max_team_size: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            default_countdown_secs: 30,
            match_secs: 6 * 60,
            tick_interval: Duration::from_millis(200),
            end_signal_gap: Duration::from_millis(200),
            rebind_grace: Duration::from_millis(50),
            feed_tail: 200,
            max_team_size: 15,
        }
    }
}
