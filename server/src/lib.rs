//! # Laser Tag Match Server Library
//!
//! This library keeps the single authoritative record of a laser-tag match.
//! It listens to the equipment network over UDP, scores hits and base
//! captures, runs the match clock and broadcasts control codes back to the
//! equipment.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Scoring
//! Every hit and base-capture packet is applied to one [`state::MatchState`].
//! Cross-team hits earn points, friendly fire costs both players, and a base
//! capture rewards only the single verified scorer.
//!
//! ### Match Clock
//! A deadline-based clock drives the match through countdown, active play and
//! the end-of-match broadcast. Remaining time is always recomputed from a
//! monotonic deadline, so a busy scheduler never makes it drift.
//!
//! ### Equipment Broadcasts
//! Hit targets, registered players, the start code and the (triple) end code
//! are all pushed through one FIFO queue and sent in order.
//!
//! ## Architecture Design
//!
//! ### Single-Owner Event Loop
//! The [`orchestrator::Orchestrator`] owns the match state, the clock and the
//! transport session. Received packets, clock checks and operator commands
//! are all messages processed one at a time on that loop, so no lock guards
//! the match state.
//!
//! ### Network Tasks
//! The transport runs two tasks per session:
//! - **Receiver**: decodes every datagram and forwards it to the loop
//! - **Sender**: drains the outbound queue in strict FIFO order
//!
//! Both observe a stop signal, so the network can be stopped and rebound to
//! new endpoints without touching the match.
//!
//! ## Module Organization
//!
//! - `config`: endpoint and timing configuration
//! - `transport`: UDP socket lifecycle and the send/receive loops
//! - `state`: match data and the read-only snapshot
//! - `scoring`: event handlers and audio cue classification
//! - `clock`: the match phase state machine
//! - `directory`: the player directory seam
//! - `orchestrator`: the event loop and its [`orchestrator::MatchHandle`]
//! - `console`: stdin operator commands
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use photon_server::config::{EndpointConfig, MatchConfig};
//! use photon_server::directory::InMemoryDirectory;
//! use photon_server::orchestrator::Orchestrator;
//! use photon_shared::Team;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (mut orchestrator, handle) = Orchestrator::new(
//!         MatchConfig::default(),
//!         EndpointConfig::default(),
//!         Box::new(InMemoryDirectory::new()),
//!     );
//!     orchestrator.start_network().await?;
//!     let event_loop = tokio::spawn(orchestrator.run());
//!
//!     handle.register_player(1, Team::Red, Some("Opus".to_string())).await?;
//!     handle.register_player(2, Team::Green, Some("Shark".to_string())).await?;
//!     handle.start_match(Some(30)).await?;
//!
//!     event_loop.await?;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod console;
pub mod directory;
pub mod orchestrator;
pub mod scoring;
pub mod state;
pub mod transport;
