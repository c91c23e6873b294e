//! UDP transport: one bound socket, a send loop and a receive loop
//!
//! The outbound queue outlives any single transport session. The send loop
//! holds the queue lock for its lifetime, so after a stop/rebind the next
//! session picks up exactly where the previous one left off, in FIFO order.

use crate::config::EndpointConfig;
use log::{debug, error, info, warn};
use photon_shared::{decode_datagram, encode_code, InboundEvent};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// Receiving half of the outbound code queue, shared across sessions.
pub type OutboundQueue = Arc<Mutex<mpsc::UnboundedReceiver<i32>>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

/// A decoded datagram and where it came from.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub event: InboundEvent,
    pub from: SocketAddr,
}

/// An open transport session.
pub struct Transport {
    local_addr: SocketAddr,
    stop_tx: watch::Sender<bool>,
    send_task: JoinHandle<()>,
    recv_task: JoinHandle<()>,
}

impl Transport {
    /// Binds the local endpoint and starts both loops.
    pub async fn open(
        config: EndpointConfig,
        outbound: OutboundQueue,
        inbound: mpsc::UnboundedSender<Datagram>,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(config.bind_addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        if let Err(e) = socket.set_broadcast(true) {
            warn!("Could not enable broadcast on {}: {}", config.bind_addr, e);
        }

        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);
        let (stop_tx, stop_rx) = watch::channel(false);

        let send_task = tokio::spawn(run_send_loop(
            Arc::clone(&socket),
            config.send_addr,
            outbound,
            stop_rx.clone(),
        ));
        let recv_task = tokio::spawn(run_receive_loop(socket, inbound, stop_rx));

        info!(
            "Transport listening on {}, sending to {}",
            local_addr, config.send_addr
        );

        Ok(Self {
            local_addr,
            stop_tx,
            send_task,
            recv_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signals both loops, cancels them and waits `grace` for the OS to release the port.
    pub async fn stop(self, grace: Duration) {
        let _ = self.stop_tx.send(true);
        self.send_task.abort();
        self.recv_task.abort();

        // Join so the socket is dropped before the grace period starts
        let _ = self.send_task.await;
        let _ = self.recv_task.await;

        tokio::time::sleep(grace).await;
        info!("Transport on {} stopped", self.local_addr);
    }
}

/// Drains the outbound queue in order, one datagram per code.
async fn run_send_loop(
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
    outbound: OutboundQueue,
    mut stop: watch::Receiver<bool>,
) {
    let mut queue = outbound.lock().await;

    loop {
        tokio::select! {
            biased;

            _ = stop.changed() => break,

            code = queue.recv() => match code {
                Some(code) => {
                    let payload = encode_code(code);
                    match socket.send_to(payload.as_bytes(), remote).await {
                        Ok(_) => debug!("Sent {} to {}", payload, remote),
                        Err(e) => error!("Failed to send {} to {}: {}", payload, remote, e),
                    }
                }
                None => break,
            },
        }
    }
}

/// Decodes every datagram and forwards it to the match loop.
async fn run_receive_loop(
    socket: Arc<UdpSocket>,
    inbound: mpsc::UnboundedSender<Datagram>,
    mut stop: watch::Receiver<bool>,
) {
    let mut buffer = [0u8; 4096];

    loop {
        tokio::select! {
            biased;

            _ = stop.changed() => break,

            result = socket.recv_from(&mut buffer) => match result {
                Ok((len, from)) => {
                    let event = decode_datagram(&buffer[..len]);
                    if inbound.send(Datagram { event, from }).is_err() {
                        error!("Match loop is gone, stopping receiver");
                        break;
                    }
                }
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            },
        }
    }
}
