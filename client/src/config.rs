use shared::{PLAYER_RUN_MULTIPLIER, PLAYER_WALK_SPEED};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Tuning of the client's network smoothing and presentation.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: SocketAddr,
    pub token: String,
    pub maps_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Extra delay added to each direction, for testing under latency.
    pub fake_ping_ms: u64,
    /// Divergence from the server above which the local player snaps.
    pub snap_threshold: f32,
    /// Fraction of the divergence corrected per frame below the threshold.
    pub correction_factor: f32,
    /// Units per second remote entities move toward their latest target.
    pub interpolation_speed: f32,
    pub move_speed: f32,
    pub run_multiplier: f32,
    /// Seconds for each half of the portal fade.
    pub fade_duration: f64,
    pub portal_resend_interval: f64,
    /// Upper bound on the time between two `move` messages.
    pub move_send_interval: f64,
    pub join_retry_interval: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 50880)),
            token: String::new(),
            maps_dir: PathBuf::from("assets/maps"),
            width: 800,
            height: 600,
            fake_ping_ms: 0,
            snap_threshold: 64.0,
            correction_factor: 0.1,
            interpolation_speed: 200.0,
            move_speed: PLAYER_WALK_SPEED,
            run_multiplier: PLAYER_RUN_MULTIPLIER,
            fade_duration: 0.4,
            portal_resend_interval: 0.5,
            move_send_interval: 0.05,
            join_retry_interval: 1.0,
        }
    }
}
