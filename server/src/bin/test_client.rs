//! Headless bot: joins with a token, walks a square, takes a portal and saves.

use clap::Parser;
use log::{info, warn};
use rand::Rng;
use shared::{capped_step, Direction, MoveCommand, Packet, SaveRequest, Vec2, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::sleep;

#[derive(Parser, Debug)]
#[command(about = "Headless test client for the tile world server")]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1:50880")]
    server: SocketAddr,
    #[arg(short, long)]
    token: String,
    /// Side of the walked square in world units
    #[arg(long, default_value_t = 64.0)]
    side: f32,
    /// Map to portal into after walking; skipped when omitted
    #[arg(long)]
    portal_to: Option<String>,
}

const STEP_INTERVAL: Duration = Duration::from_millis(50);
const WALK_SPEED: f32 = 100.0;

struct Bot {
    socket: UdpSocket,
    server: SocketAddr,
    token: String,
    position: Vec2,
    map: String,
    updates: usize,
}

impl Bot {
    async fn send(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        self.socket.send_to(&packet.encode()?, self.server).await?;
        Ok(())
    }

    /// Waits until `pick` accepts a packet, counting snapshots on the way.
    async fn wait_for<T>(
        &mut self,
        limit: Duration,
        mut pick: impl FnMut(Packet) -> Option<T>,
    ) -> Option<T> {
        let deadline = Instant::now() + limit;
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            let received = tokio::time::timeout(left, self.socket.recv_from(&mut buf)).await;
            let Ok(Ok((len, _))) = received else {
                break;
            };
            match Packet::decode(&buf[..len]) {
                Ok(packet) => {
                    if matches!(packet, Packet::Update(_)) {
                        self.updates += 1;
                    }
                    if let Some(found) = pick(packet) {
                        return Some(found);
                    }
                }
                Err(e) => warn!("Undecodable packet: {}", e),
            }
        }
        None
    }

    async fn walk_to(&mut self, to: Vec2) -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = rand::thread_rng();
        let max_step = WALK_SPEED * STEP_INTERVAL.as_secs_f32();
        while self.position.distance(to) > 0.5 {
            let step = capped_step(self.position, to, max_step);
            self.position = self.position.add(step);
            let cmd = MoveCommand {
                token: self.token.clone(),
                x: self.position.x,
                y: self.position.y,
                direction: Direction::from_delta(step, Direction::Down),
                moving: true,
                current_map: self.map.clone(),
                z_index: 0,
                attacking: false,
                running: false,
            };
            self.send(&Packet::Move(cmd)).await?;
            // A little jitter so several bots do not send in lockstep.
            let jitter = rng.gen_range(0..10);
            sleep(STEP_INTERVAL + Duration::from_millis(jitter)).await;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Test client bound to {}", socket.local_addr()?);

    let mut bot = Bot {
        socket,
        server: args.server,
        token: args.token.clone(),
        position: Vec2::ZERO,
        map: String::new(),
        updates: 0,
    };

    bot.send(&Packet::Join {
        token: args.token.clone(),
    })
    .await?;

    let assigned = bot
        .wait_for(Duration::from_secs(3), |packet| match packet {
            Packet::AssignId {
                player_id,
                player_data,
            } => Some((player_id, player_data)),
            _ => None,
        })
        .await;
    let Some((player_id, data)) = assigned else {
        warn!("No assign_id within 3s; is the token valid?");
        return Ok(());
    };
    info!(
        "Joined as player {} ({}) on {} at ({:.1}, {:.1})",
        player_id, data.name, data.current_map, data.x, data.y
    );
    bot.position = Vec2::new(data.x, data.y);
    bot.map = data.current_map;

    let origin = bot.position;
    for corner in [
        Vec2::new(args.side, 0.0),
        Vec2::new(args.side, args.side),
        Vec2::new(0.0, args.side),
        Vec2::ZERO,
    ] {
        bot.walk_to(origin.add(corner)).await?;
    }
    info!("Walked the square, {} snapshots so far", bot.updates);

    if let Some(target) = args.portal_to {
        bot.send(&Packet::PortalEnter {
            token: args.token.clone(),
            target_map: target.clone(),
            spawn_x: origin.x,
            spawn_y: origin.y,
            spawn_z_index: None,
        })
        .await?;
        let switched = bot
            .wait_for(Duration::from_secs(3), |packet| match packet {
                Packet::MapSwitch { map, x, y } => Some((map, x, y)),
                _ => None,
            })
            .await;
        match switched {
            Some((map, x, y)) => {
                info!("Switched to {} at ({:.1}, {:.1})", map, x, y);
                bot.map = map;
                bot.position = Vec2::new(x, y);
            }
            None => warn!("No map_switch for portal to {}", target),
        }
    }

    bot.send(&Packet::Save(SaveRequest {
        token: args.token.clone(),
        x: bot.position.x,
        y: bot.position.y,
        direction: Direction::Down,
        current_map: bot.map.clone(),
        z_index: 0,
    }))
    .await?;
    let confirmed = bot
        .wait_for(Duration::from_secs(3), |packet| match packet {
            Packet::SaveConfirm { message } => Some(message),
            _ => None,
        })
        .await;
    match confirmed {
        Some(message) => info!("Server: {}", message),
        None => warn!("No save confirmation"),
    }

    info!("Test client finished after {} snapshots", bot.updates);
    Ok(())
}
