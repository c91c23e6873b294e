//! Match orchestrator: the single owner of the match state and the clock
//!
//! Everything that touches the match (received packets, clock checks, operator
//! commands) arrives as a message on one event loop. The loop owns the
//! [`MatchState`], the [`MatchClock`] and the transport session; other tasks
//! talk to it through a cloneable [`MatchHandle`].

use crate::clock::{MatchClock, Phase, MAX_COUNTDOWN_SECS};
use crate::config::{EndpointConfig, MatchConfig};
use crate::directory::{resolve_player, PlayerDirectory, RegistrationError};
use crate::scoring::{self, Cue};
use crate::state::{MatchSnapshot, MatchState};
use crate::transport::{Datagram, OutboundQueue, Transport, TransportError};
use log::{debug, error, info, warn};
use photon_shared::{InboundEvent, Player, PlayerId, Team};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

/// A feed line or clock transition paired with its audio cue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub line: String,
    pub cue: Option<Cue>,
}

#[derive(Debug, Error)]
pub enum HandleError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("match loop has shut down")]
    Closed,
}

/// Requests sent from handles to the match loop.
#[derive(Debug)]
pub enum Command {
    RegisterPlayer {
        id: PlayerId,
        team: Team,
        codename: Option<String>,
        reply: oneshot::Sender<Result<Player, RegistrationError>>,
    },
    StartMatch {
        countdown_secs: Option<u64>,
        reply: oneshot::Sender<bool>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
    StopNetwork {
        reply: oneshot::Sender<()>,
    },
    Rebind {
        endpoints: EndpointConfig,
        reply: oneshot::Sender<Result<SocketAddr, TransportError>>,
    },
    LocalAddr {
        reply: oneshot::Sender<Option<SocketAddr>>,
    },
    Shutdown,
}

pub struct Orchestrator {
    config: MatchConfig,
    endpoints: EndpointConfig,
    state: MatchState,
    clock: MatchClock,
    directory: Box<dyn PlayerDirectory>,
    transport: Option<Transport>,

    // Communication channels
    outbound_tx: mpsc::UnboundedSender<i32>,
    outbound_rx: OutboundQueue,
    datagram_tx: mpsc::UnboundedSender<Datagram>,
    datagram_rx: mpsc::UnboundedReceiver<Datagram>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    snapshot_tx: watch::Sender<MatchSnapshot>,
    announce_tx: broadcast::Sender<Announcement>,
}

impl Orchestrator {
    pub fn new(
        config: MatchConfig,
        endpoints: EndpointConfig,
        directory: Box<dyn PlayerDirectory>,
    ) -> (Self, MatchHandle) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (datagram_tx, datagram_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(MatchSnapshot::default());
        let (announce_tx, _) = broadcast::channel(256);

        let handle = MatchHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            announcements: announce_tx.clone(),
        };

        let orchestrator = Self {
            clock: MatchClock::new(config.match_secs, config.end_signal_gap),
            config,
            endpoints,
            state: MatchState::new(),
            directory,
            transport: None,
            outbound_tx,
            outbound_rx: Arc::new(Mutex::new(outbound_rx)),
            datagram_tx,
            datagram_rx,
            command_rx,
            snapshot_tx,
            announce_tx,
        };

        (orchestrator, handle)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.as_ref().map(Transport::local_addr)
    }

    pub fn phase(&self) -> Phase {
        self.clock.phase()
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        self.state.snapshot(
            self.clock.phase(),
            self.clock.remaining_secs(),
            self.config.feed_tail,
        )
    }

    /// Opens the transport for the current endpoints unless one is already open.
    pub async fn start_network(&mut self) -> Result<SocketAddr, TransportError> {
        if let Some(transport) = &self.transport {
            return Ok(transport.local_addr());
        }
        self.open_transport(self.endpoints).await
    }

    /// Stops both network loops and releases the port. Safe to call when stopped.
    pub async fn stop_network(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.stop(self.config.rebind_grace).await;
        }
    }

    /// Moves the transport to new endpoints. On failure the previous endpoints
    /// are reopened and the bind error is returned.
    pub async fn rebind(&mut self, endpoints: EndpointConfig) -> Result<SocketAddr, TransportError> {
        self.stop_network().await;

        match self.open_transport(endpoints).await {
            Ok(addr) => {
                info!(
                    "Rebound network: listening on {}, sending to {}",
                    addr, endpoints.send_addr
                );
                self.endpoints = endpoints;
                Ok(addr)
            }
            Err(e) => {
                warn!("Rebind failed ({}), restoring previous endpoints", e);
                if let Err(restore) = self.open_transport(self.endpoints).await {
                    error!("Could not restore previous endpoints: {}", restore);
                }
                Err(e)
            }
        }
    }

    async fn open_transport(
        &mut self,
        endpoints: EndpointConfig,
    ) -> Result<SocketAddr, TransportError> {
        let transport = Transport::open(
            endpoints,
            Arc::clone(&self.outbound_rx),
            self.datagram_tx.clone(),
        )
        .await?;
        let addr = transport.local_addr();
        self.transport = Some(transport);
        Ok(addr)
    }

    /// Resolves the player through the directory, adds them to the roster and
    /// broadcasts their equipment id.
    pub fn register_player(
        &mut self,
        id: PlayerId,
        team: Team,
        codename: Option<&str>,
    ) -> Result<Player, RegistrationError> {
        let already_on_team = self.state.team_of(id) == Some(team);
        let limit = self.config.max_team_size;
        if !already_on_team && self.state.team_size(team) >= limit {
            return Err(RegistrationError::TeamFull { team, limit });
        }

        let player = resolve_player(self.directory.as_mut(), id, codename)?;
        self.state.add_player(&player, team);
        info!(
            "Registered player {} ({}) on {}",
            player.id, player.codename, team
        );

        self.enqueue(player.id);
        self.notify();
        Ok(player)
    }

    /// Starts the countdown. Returns false if a match is already underway or
    /// the countdown is longer than [`MAX_COUNTDOWN_SECS`].
    pub fn start_match(&mut self, countdown_secs: Option<u64>) -> bool {
        let countdown = countdown_secs.unwrap_or(self.config.default_countdown_secs);
        if countdown > MAX_COUNTDOWN_SECS {
            warn!(
                "Start ignored, countdown {}s exceeds {}s",
                countdown, MAX_COUNTDOWN_SECS
            );
            return false;
        }
        if !self.clock.begin(countdown, Instant::now()) {
            debug!("Start ignored, clock is {:?}", self.clock.phase());
            return false;
        }

        info!("Countdown started: {}s", countdown);
        self.announce("Match starting".to_string(), Some(Cue::Start));
        self.notify();
        true
    }

    /// Discards the match and returns the clock to Idle.
    pub fn clear(&mut self) {
        self.state = MatchState::new();
        self.clock = MatchClock::new(self.config.match_secs, self.config.end_signal_gap);
        info!("Match cleared");
        self.notify();
    }

    /// Applies one received packet to the match.
    pub fn handle_event(&mut self, event: &InboundEvent) {
        if let InboundEvent::Malformed { raw, reason } = event {
            warn!("Malformed packet {:?}: {}", raw, reason);
        }

        let outcome = scoring::apply(&mut self.state, event);

        for code in &outcome.broadcasts {
            self.enqueue(*code);
        }

        match outcome.log {
            Some(line) => {
                info!("{}", line);
                self.announce(line, outcome.cue);
                self.notify();
            }
            None => debug!("Ignored {:?}", event),
        }
    }

    /// Runs the clock check for `now`.
    pub fn tick_clock(&mut self, now: Instant) {
        let tick = self.clock.poll(now);

        for code in &tick.codes {
            self.enqueue(*code);
        }

        match tick.entered {
            Some(Phase::Running) => info!("Match is live"),
            Some(Phase::Ended) => {
                info!("Match over");
                self.announce("Match over".to_string(), Some(Cue::End));
            }
            _ => {}
        }

        if tick.changed {
            self.notify();
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::RegisterPlayer {
                id,
                team,
                codename,
                reply,
            } => {
                let result = self.register_player(id, team, codename.as_deref());
                let _ = reply.send(result);
            }
            Command::StartMatch {
                countdown_secs,
                reply,
            } => {
                let _ = reply.send(self.start_match(countdown_secs));
            }
            Command::Clear { reply } => {
                self.clear();
                let _ = reply.send(());
            }
            Command::StopNetwork { reply } => {
                self.stop_network().await;
                let _ = reply.send(());
            }
            Command::Rebind { endpoints, reply } => {
                let _ = reply.send(self.rebind(endpoints).await);
            }
            Command::LocalAddr { reply } => {
                let _ = reply.send(self.local_addr());
            }
            // Handled by the loop itself
            Command::Shutdown => {}
        }
    }

    /// Main loop: packets, clock checks and operator commands, one at a time.
    ///
    /// Returns once every handle is dropped or a shutdown is requested; the
    /// network is stopped on the way out.
    pub async fn run(mut self) {
        let mut clock_interval = interval(self.config.tick_interval);
        clock_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Match loop started");
        self.notify();

        loop {
            let end_signal = self.clock.next_end_signal();

            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(Command::Shutdown) | None => {
                        info!("Match loop shutting down");
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                },

                Some(datagram) = self.datagram_rx.recv() => {
                    debug!("Packet from {}: {:?}", datagram.from, datagram.event);
                    self.handle_event(&datagram.event);
                },

                _ = clock_interval.tick(), if self.clock.is_ticking() => {
                    self.tick_clock(Instant::now());
                },

                // Repeated end signals wake exactly when due instead of on the next tick
                _ = sleep_until(end_signal.unwrap_or_else(Instant::now)), if end_signal.is_some() => {
                    self.tick_clock(Instant::now());
                },
            }
        }

        self.stop_network().await;
    }

    fn enqueue(&self, code: i32) {
        if let Err(e) = self.outbound_tx.send(code) {
            error!("Failed to queue code {} for sending: {}", e.0, e);
        }
    }

    fn notify(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }

    fn announce(&self, line: String, cue: Option<Cue>) {
        if let Some(cue) = cue {
            debug!("Cue: {}", cue.name());
        }
        // No subscribers is fine
        let _ = self.announce_tx.send(Announcement { line, cue });
    }
}

/// Cloneable front door to a running [`Orchestrator`].
#[derive(Clone)]
pub struct MatchHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<MatchSnapshot>,
    announcements: broadcast::Sender<Announcement>,
}

impl MatchHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, HandleError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| HandleError::Closed)?;
        response.await.map_err(|_| HandleError::Closed)
    }

    pub async fn register_player(
        &self,
        id: PlayerId,
        team: Team,
        codename: Option<String>,
    ) -> Result<Player, HandleError> {
        Ok(self
            .request(|reply| Command::RegisterPlayer {
                id,
                team,
                codename,
                reply,
            })
            .await??)
    }

    pub async fn start_match(&self, countdown_secs: Option<u64>) -> Result<bool, HandleError> {
        self.request(|reply| Command::StartMatch {
            countdown_secs,
            reply,
        })
        .await
    }

    pub async fn clear(&self) -> Result<(), HandleError> {
        self.request(|reply| Command::Clear { reply }).await
    }

    pub async fn stop_network(&self) -> Result<(), HandleError> {
        self.request(|reply| Command::StopNetwork { reply }).await
    }

    pub async fn rebind(&self, endpoints: EndpointConfig) -> Result<SocketAddr, HandleError> {
        Ok(self
            .request(|reply| Command::Rebind { endpoints, reply })
            .await??)
    }

    pub async fn local_addr(&self) -> Result<Option<SocketAddr>, HandleError> {
        self.request(|reply| Command::LocalAddr { reply }).await
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> MatchSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Change notifications; call `borrow` on the receiver to pull the snapshot.
    pub fn subscribe_changes(&self) -> watch::Receiver<MatchSnapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe_announcements(&self) -> broadcast::Receiver<Announcement> {
        self.announcements.subscribe()
    }
}
