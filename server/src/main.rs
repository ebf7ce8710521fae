use clap::Parser;
use log::{error, info};
use server::auth::StaticCredentials;
use server::config::{ServerConfig, WorldConfig};
use server::handler::ServerCore;
use server::network::Server;
use server::persistence::{FileStore, MemoryStore, PlayerStore};
use shared::DirectoryMapSource;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative server for the tile world")]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[arg(short, long, default_value_t = 50880)]
    port: u16,
    /// Seconds between simulation ticks
    #[arg(long, default_value_t = 0.05)]
    update_rate: f64,
    /// Seconds of silence before a session is dropped
    #[arg(long, default_value_t = 10.0)]
    timeout: f64,
    /// Seconds between timeout sweeps
    #[arg(long, default_value_t = 1.0)]
    prr: f64,
    /// Receive buffer size in bytes
    #[arg(long, default_value_t = 4096)]
    buffer_size: usize,
    /// Seconds between autosaves
    #[arg(long, default_value_t = 30)]
    save_interval: u64,
    /// Seconds a verified token stays cached
    #[arg(long, default_value_t = 30)]
    token_ttl: u64,
    /// Seconds between token refreshes with the credential service
    #[arg(long, default_value_t = 60)]
    token_refresh: u64,
    /// Largest tick delta in seconds before it is clamped
    #[arg(long, default_value_t = 0.25)]
    max_tick_delta: f64,
    /// World description (maps directory, credentials, enemies)
    #[arg(short, long)]
    world: Option<PathBuf>,
    /// Save file; player state is kept in memory only when omitted
    #[arg(short, long)]
    save_file: Option<PathBuf>,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            update_rate: Duration::from_secs_f64(args.update_rate),
            timeout: Duration::from_secs_f64(args.timeout),
            sweep_period: Duration::from_secs_f64(args.prr),
            buffer_size: args.buffer_size,
            save_interval: Duration::from_secs(args.save_interval),
            token_cache_ttl: Duration::from_secs(args.token_ttl),
            token_refresh_interval: Duration::from_secs(args.token_refresh),
            max_tick_delta: Duration::from_secs_f64(args.max_tick_delta),
            world_file: args.world,
            save_file: args.save_file,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Tip: set RUST_LOG=info (or debug) to see server logs");
    }
    env_logger::init();

    let config = ServerConfig::from(Args::parse());

    let world = match &config.world_file {
        Some(path) => WorldConfig::load(path)?,
        None => WorldConfig::default(),
    };
    info!(
        "World: default map {}, {} credentials, {} enemies, maps from {}",
        world.default_map,
        world.credentials.len(),
        world.enemies.len(),
        world.maps_dir.display()
    );

    let store: Box<dyn PlayerStore> = match &config.save_file {
        Some(path) => Box::new(FileStore::open(path)?),
        None => Box::new(MemoryStore::new()),
    };

    let core = ServerCore::new(
        &config,
        &world,
        DirectoryMapSource::new(&world.maps_dir),
        StaticCredentials::new(&world.credentials),
        store,
    );

    let server = Server::bind(config, core).await?;
    let shutdown = server.shutdown_handle();
    let mut server_handle = tokio::spawn(server.run());

    tokio::select! {
        result = &mut server_handle => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server stopped: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
            }
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            shutdown.shutdown();
        }
    }

    if let Err(e) = server_handle.await {
        error!("Server task panicked: {}", e);
    }
    Ok(())
}
