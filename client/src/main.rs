use clap::Parser;
use client::config::ClientConfig;
use client::game::ClientGame;
use client::input::InputManager;
use client::network::NetworkHandle;
use client::rendering::{RenderConfig, Renderer};
use log::{error, info, warn};
use macroquad::prelude::*;
use shared::DirectoryMapSource;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Longest frame step fed to the simulation, so a stalled window does not
/// teleport the player through walls.
const MAX_FRAME_TIME: f32 = 0.1;

#[derive(Parser, Debug)]
#[command(author, version, about = "Tile world client", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:50880")]
    server: SocketAddr,

    /// Session token issued by the login service
    #[arg(short = 't', long)]
    token: String,

    /// Directory holding the map collision assets
    #[arg(short = 'm', long, default_value = "assets/maps")]
    maps_dir: PathBuf,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: u32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: u32,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        Self {
            server_addr: args.server,
            token: args.token,
            maps_dir: args.maps_dir,
            width: args.width,
            height: args.height,
            fake_ping_ms: args.fake_ping,
            ..ClientConfig::default()
        }
    }
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Tile World".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }
    env_logger::init();

    let config = ClientConfig::from(Args::parse());

    info!("Starting client...");
    info!("Connecting to: {}", config.server_addr);
    if config.fake_ping_ms > 0 {
        info!("Simulating {}ms latency", config.fake_ping_ms);
    }
    info!("Controls: WASD/arrows to move, Shift to run, Space to attack, F5 to save");
    info!("Press F1 to toggle collision overlay");

    let network = match NetworkHandle::spawn(config.server_addr, config.fake_ping_ms) {
        Ok(network) => network,
        Err(e) => {
            error!("Failed to open client socket: {}", e);
            return;
        }
    };

    let render_config = RenderConfig {
        debug_geometry: false,
        fake_ping_ms: config.fake_ping_ms,
    };
    let mut renderer = Renderer::new(config.width, config.height);
    let mut input_manager = InputManager::new();
    let maps = DirectoryMapSource::new(&config.maps_dir);
    let mut game = ClientGame::new(config, maps);
    let mut debug_geometry = false;

    while !is_key_pressed(KeyCode::Escape) {
        let now = get_time();
        for packet in network.drain() {
            game.handle_packet(packet, now);
        }

        let (toggles, frame_input) = input_manager.update();
        if toggles.debug_geometry {
            debug_geometry = !debug_geometry;
            info!("Collision overlay: {}", debug_geometry);
        }

        let dt = get_frame_time().min(MAX_FRAME_TIME);
        for packet in game.update(frame_input, dt, now) {
            if !network.send(packet) {
                warn!("Network thread is gone, outbound packet dropped");
            }
        }

        renderer.render(
            game.scene(now),
            RenderConfig {
                debug_geometry,
                ..render_config
            },
        );
        next_frame().await;
    }

    network.shutdown();
}
