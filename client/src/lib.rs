//! # Game Client Library
//!
//! Client side of the tile world: local prediction with continuous
//! reconciliation, snapshot interpolation of everyone else, portal
//! transitions, and a background socket thread.
//!
//! ## Architecture Overview
//!
//! The macroquad render loop owns all game state in a [`game::ClientGame`].
//! Networking runs on a separate thread ([`network::NetworkHandle`]) with its
//! own single-threaded tokio runtime; decoded packets reach the render loop
//! through a channel that is drained once per frame, so the game state is
//! never touched from two threads.
//!
//! ### Client-Side Prediction
//! Input moves the local player immediately, checked against the client's
//! own copy of the map's collision and elevation rectangles.
//!
//! ### Reconciliation
//! Whenever a snapshot carries the local player, its position becomes the
//! server position. Every frame the predicted position is pulled a fixed
//! fraction of the way toward it, or snapped when the two are too far apart.
//! There is no input history and no replay.
//!
//! ### Interpolation
//! Remote players and enemies move toward their latest snapshot position at
//! a constant speed and never overshoot. A map change snaps instead.
//!
//! ## Module Organization
//!
//! - `config`: smoothing and presentation tuning
//! - `prediction`: the local player and the reconciliation step
//! - `interpolation`: remote entity roster
//! - `portal`: the map transition state machine
//! - `game`: packet handling and per-frame update, no window required
//! - `network`: socket thread
//! - `input`, `rendering`: macroquad front end
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::game::{ClientGame, FrameInput};
//! use client::network::NetworkHandle;
//! use shared::DirectoryMapSource;
//!
//! let config = ClientConfig {
//!     token: "secret".to_string(),
//!     ..ClientConfig::default()
//! };
//! let network = NetworkHandle::spawn(config.server_addr, 0).unwrap();
//! let maps = DirectoryMapSource::new(&config.maps_dir);
//! let mut game = ClientGame::new(config, maps);
//!
//! let mut now = 0.0;
//! loop {
//!     for packet in network.drain() {
//!         game.handle_packet(packet, now);
//!     }
//!     for packet in game.update(FrameInput::default(), 1.0 / 60.0, now) {
//!         network.send(packet);
//!     }
//!     now += 1.0 / 60.0;
//! }
//! ```

pub mod config;
pub mod game;
pub mod input;
pub mod interpolation;
pub mod network;
pub mod portal;
pub mod prediction;
pub mod rendering;
