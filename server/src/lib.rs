//! # Tile World Server
//!
//! Authoritative server for the tile world. It owns the canonical position,
//! map and elevation layer of every player and enemy, and broadcasts a full
//! snapshot to every connected client on each tick.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Clients report where they believe their player is. The server moves its
//! own copy toward that position at a capped speed, clipped against the
//! same collision geometry the clients use, and derives the elevation layer
//! from the tile under the player's feet. Enemies are simulated here only.
//!
//! ### Sessions
//! Every message carries a pre-issued token. The first valid message from a
//! token opens a session, loads saved state and assigns a player id. Later
//! messages refresh the session's address, so a client that restarts or
//! changes port keeps its player. Sessions that go quiet are swept and
//! everyone else is told the player left.
//!
//! ### Persistence
//! Players that changed since their last save are written on a fixed
//! interval, and on request. A failed save leaves the player dirty so the
//! next run tries again.
//!
//! ## Architecture
//!
//! The main loop owns all mutable state through [`handler::ServerCore`]; no
//! lock guards the entity tables. Around it run a few tasks:
//! - **Network Receiver**: reads and decodes datagrams, with a read timeout
//!   so it notices shutdown
//! - **Network Sender**: drains the outgoing queue; a failed send to one
//!   address never stops a broadcast to the others
//! - **Timers** inside the main `select!`: simulation tick, timeout sweep,
//!   autosave and token refresh
//!
//! ## Module Organization
//!
//! - `session`: token to player id mapping, address refresh, timeouts
//! - `auth`: credential service contract and the token cache
//! - `persistence`: save/load contract with memory and file stores
//! - `game` and `enemy`: the simulation
//! - `handler`: packet dispatch and periodic jobs
//! - `network`: sockets, channels and the main loop
//! - `config` and `error`: settings and startup failures
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::auth::StaticCredentials;
//! use server::config::{ServerConfig, WorldConfig};
//! use server::handler::ServerCore;
//! use server::network::Server;
//! use server::persistence::MemoryStore;
//! use shared::DirectoryMapSource;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let world = WorldConfig::default();
//!     let core = ServerCore::new(
//!         &config,
//!         &world,
//!         DirectoryMapSource::new(&world.maps_dir),
//!         StaticCredentials::new(&world.credentials),
//!         MemoryStore::new(),
//!     );
//!
//!     let server = Server::bind(config, core).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod enemy;
pub mod error;
pub mod game;
pub mod handler;
pub mod network;
pub mod persistence;
pub mod session;
