//! Server network layer: UDP tasks and the main select loop

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handler::ServerCore;
use log::{debug, error, info, warn};
use shared::{Packet, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug, Clone, PartialEq)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    /// Same packet to many recipients, encoded once.
    BroadcastPacket {
        packet: Packet,
        addrs: Vec<SocketAddr>,
    },
}

/// Stops a running [`Server`] from another task.
#[derive(Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        // The loop may already be gone; nothing left to stop then.
        let _ = self.server_tx.send(ServerMessage::Shutdown);
    }
}

/// Main server coordinating networking and game simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    core: ServerCore,
    config: ServerConfig,
    running: Arc<AtomicBool>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn bind(config: ServerConfig, core: ServerCore) -> Result<Self, ServerError> {
        let addr = config.bind_addr();
        let socket = UdpSocket::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket: Arc::new(socket),
            core,
            config,
            running: Arc::new(AtomicBool::new(true)),
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            running: Arc::clone(&self.running),
            server_tx: self.server_tx.clone(),
        }
    }

    pub fn core(&self) -> &ServerCore {
        &self.core
    }

    /// Spawns task that continuously listens for incoming packets
    ///
    /// Reads time out periodically so the task notices shutdown even when
    /// no traffic arrives. Undecodable datagrams are dropped here.
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();
        let running = Arc::clone(&self.running);
        let poll = self.config.recv_poll;
        let buffer_size = self.config.buffer_size;

        tokio::spawn(async move {
            let mut buffer = vec![0u8; buffer_size];

            while running.load(Ordering::SeqCst) {
                let received = tokio::time::timeout(poll, socket.recv_from(&mut buffer)).await;
                match received {
                    Err(_) => continue,
                    Ok(Ok((len, addr))) => match Packet::decode(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping malformed datagram from {}: {}", addr, e),
                    },
                    Ok(Err(e)) => {
                        // ICMP port unreachable from a departed client shows up here.
                        debug!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
            debug!("Receiver stopped");
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let Some(mut game_rx) = self.game_rx.take() else {
            return;
        };

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                let (packet, addrs) = match message {
                    GameMessage::SendPacket { packet, addr } => (packet, vec![addr]),
                    GameMessage::BroadcastPacket { packet, addrs } => (packet, addrs),
                };
                let Some(data) = encode_datagram(&packet) else {
                    continue;
                };
                for addr in addrs {
                    if let Err(e) = socket.send_to(&data, addr).await {
                        error!("Failed to send {} to {}: {}", packet.kind(), addr, e);
                    }
                }
            }
        });
    }

    fn dispatch(&self, messages: Vec<GameMessage>) {
        for message in messages {
            if let Err(e) = self.game_tx.send(message) {
                error!("Failed to queue packet for sending: {}", e);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(mut self) -> Result<(), ServerError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();

        let mut tick_interval = interval(self.config.update_rate);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweep_interval = interval(self.config.sweep_period);
        let mut save_interval = interval(self.config.save_interval);
        let mut refresh_interval = interval(self.config.token_refresh_interval);

        // Skip the first ticks since they fire immediately
        save_interval.tick().await;
        refresh_interval.tick().await;

        let max_delta = self.config.max_tick_delta.as_secs_f32();
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            let replies = self.core.handle_packet(packet, addr, Instant::now());
                            self.dispatch(replies);
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let mut dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    if dt > max_delta {
                        warn!(
                            "Large delta time detected ({:.3}s), capping to {:.3}s",
                            dt, max_delta
                        );
                        dt = max_delta;
                    }

                    let messages = self.core.tick(dt);
                    self.dispatch(messages);

                    let game = self.core.game();
                    if game.tick % 60 == 0 && !self.core.sessions().is_empty() {
                        debug!(
                            "Tick {}: {} players, {} enemies, {:.1}Hz",
                            game.tick,
                            game.players.len(),
                            game.enemies.len(),
                            1.0 / dt.max(f32::EPSILON)
                        );
                    }
                },

                _ = sweep_interval.tick() => {
                    let messages = self.core.sweep(Instant::now());
                    self.dispatch(messages);
                },

                _ = save_interval.tick() => {
                    let messages = self.core.autosave();
                    self.dispatch(messages);
                },

                _ = refresh_interval.tick() => {
                    self.core.refresh_tokens(Instant::now());
                },
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Encodes a packet once for every recipient. Packets that fail to encode or
/// would not fit in a single datagram are dropped with a log entry.
fn encode_datagram(packet: &Packet) -> Option<Vec<u8>> {
    let data = match packet.encode() {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to encode {}: {}", packet.kind(), e);
            return None;
        }
    };
    if data.len() > MAX_PACKET_SIZE {
        warn!(
            "Dropping {}: {} bytes exceeds the {} byte datagram limit",
            packet.kind(),
            data.len(),
            MAX_PACKET_SIZE
        );
        return None;
    }
    Some(data)
}
