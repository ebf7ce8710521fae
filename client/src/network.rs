//! Background socket thread for the client.
//!
//! The render loop owns all game state, so the socket lives on its own
//! thread running a single-threaded tokio runtime. Decoded packets are
//! handed over through a channel the render loop drains every frame, and
//! outbound packets travel the other way. Neither side ever blocks on the
//! other.

use log::{debug, error, info, warn};
use shared::{Packet, MAX_PACKET_SIZE};
use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::sleep;

pub struct NetworkHandle {
    outbound: mpsc::UnboundedSender<Packet>,
    inbound: std_mpsc::Receiver<Packet>,
    thread: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl NetworkHandle {
    /// Binds an ephemeral UDP port and starts the socket thread.
    pub fn spawn(server_addr: SocketAddr, fake_ping_ms: u64) -> std::io::Result<Self> {
        let socket = StdUdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = std_mpsc::channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let thread = std::thread::Builder::new()
            .name("client-network".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    let socket = match UdpSocket::from_std(socket) {
                        Ok(socket) => socket,
                        Err(e) => {
                            error!("Failed to register client socket: {}", e);
                            return;
                        }
                    };
                    run_socket(socket, server_addr, outbound_rx, inbound_tx, fake_ping_ms).await;
                });
            })?;

        info!("Client socket bound to {}, server {}", local_addr, server_addr);
        Ok(Self {
            outbound: outbound_tx,
            inbound: inbound_rx,
            thread,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Queues a packet. Returns false once the socket thread has stopped.
    pub fn send(&self, packet: Packet) -> bool {
        self.outbound.send(packet).is_ok()
    }

    /// Every packet received since the last call.
    pub fn drain(&self) -> Vec<Packet> {
        self.inbound.try_iter().collect()
    }

    /// Stops the socket thread and waits for it.
    pub fn shutdown(self) {
        drop(self.outbound);
        if self.thread.join().is_err() {
            error!("Client network thread panicked");
        }
    }
}

async fn run_socket(
    socket: UdpSocket,
    server_addr: SocketAddr,
    mut outbound: mpsc::UnboundedReceiver<Packet>,
    inbound: std_mpsc::Sender<Packet>,
    fake_ping_ms: u64,
) {
    let mut buffer = vec![0u8; MAX_PACKET_SIZE];
    let half_ping = Duration::from_millis(fake_ping_ms / 2);

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buffer) => match result {
                Ok((len, from)) => {
                    if from != server_addr {
                        debug!("Ignoring datagram from {}", from);
                        continue;
                    }
                    if fake_ping_ms > 0 {
                        sleep(half_ping).await;
                    }
                    match Packet::decode(&buffer[..len]) {
                        Ok(packet) => {
                            if inbound.send(packet).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Malformed packet from server: {}", e),
                    }
                }
                // Connection resets from an absent server are expected while joining.
                Err(e) => debug!("Error receiving packet: {}", e),
            },

            next = outbound.recv() => match next {
                Some(packet) => {
                    if fake_ping_ms > 0 {
                        sleep(half_ping).await;
                    }
                    match packet.encode() {
                        Ok(data) => {
                            if let Err(e) = socket.send_to(&data, server_addr).await {
                                error!("Error sending {}: {}", packet.kind(), e);
                            }
                        }
                        Err(e) => error!("Failed to encode {}: {}", packet.kind(), e),
                    }
                }
                None => break,
            },
        }
    }
    debug!("Client network thread stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_round_trip_through_socket_thread() {
        let server = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        server
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let handle = NetworkHandle::spawn(server.local_addr().unwrap(), 0).unwrap();

        assert!(handle.send(Packet::Join {
            token: "tok".to_string()
        }));

        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        let (len, from) = server.recv_from(&mut buf).unwrap();
        assert_eq!(
            Packet::decode(&buf[..len]).unwrap(),
            Packet::Join {
                token: "tok".to_string()
            }
        );

        let reply = Packet::PlayerDisconnect { player_id: 4 };
        server.send_to(&reply.encode().unwrap(), from).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut received = Vec::new();
        while received.is_empty() && Instant::now() < deadline {
            received = handle.drain();
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(received, vec![reply]);

        handle.shutdown();
    }
}
