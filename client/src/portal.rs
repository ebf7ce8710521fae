//! Client side of a map transition.
//!
//! Stepping onto a portal freezes input and starts a fade out while
//! `portal_enter` is resent until the server answers with `map_switch`.
//! The new map then fades in. A portal fires again only after the player
//! has stepped off every portal, so arriving on one does not bounce back.

use shared::{CollisionMap, Rect};

#[derive(Debug, Clone, PartialEq)]
pub struct PortalRequest {
    pub target_map: String,
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub spawn_z_index: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionState {
    Idle,
    AwaitingSwitch {
        request: PortalRequest,
        since: f64,
        last_sent: f64,
    },
    FadingIn {
        since: f64,
    },
}

#[derive(Debug)]
pub struct PortalTransition {
    state: TransitionState,
    armed: bool,
    fade_duration: f64,
    resend_interval: f64,
}

impl PortalTransition {
    pub fn new(fade_duration: f64, resend_interval: f64) -> Self {
        Self {
            state: TransitionState::Idle,
            armed: true,
            fade_duration,
            resend_interval,
        }
    }

    pub fn state(&self) -> &TransitionState {
        &self.state
    }

    /// Looks for a portal under `footprint`. Returns the request to send
    /// when one fires.
    pub fn check(&mut self, footprint: &Rect, map: &CollisionMap, now: f64) -> Option<PortalRequest> {
        let portal = map.portal_at(footprint);
        if portal.is_none() {
            self.armed = true;
        }
        if !self.armed || self.state != TransitionState::Idle {
            return None;
        }
        let portal = portal?;

        let request = PortalRequest {
            target_map: portal.target_map.clone(),
            spawn_x: portal.spawn_x,
            spawn_y: portal.spawn_y,
            spawn_z_index: portal.spawn_z_index,
        };
        self.armed = false;
        self.state = TransitionState::AwaitingSwitch {
            request: request.clone(),
            since: now,
            last_sent: now,
        };
        Some(request)
    }

    /// The pending request again, once per resend interval.
    pub fn poll_resend(&mut self, now: f64) -> Option<PortalRequest> {
        let interval = self.resend_interval;
        match &mut self.state {
            TransitionState::AwaitingSwitch {
                request, last_sent, ..
            } if now - *last_sent >= interval => {
                *last_sent = now;
                Some(request.clone())
            }
            _ => None,
        }
    }

    /// Called when `map_switch` arrives. The spawn point is usually on the
    /// return portal, so portals stay disarmed until the player walks off.
    pub fn on_map_switch(&mut self, now: f64) {
        self.armed = false;
        self.state = TransitionState::FadingIn { since: now };
    }

    pub fn update(&mut self, now: f64) {
        if let TransitionState::FadingIn { since } = self.state {
            if now - since >= self.fade_duration {
                self.state = TransitionState::Idle;
            }
        }
    }

    pub fn input_frozen(&self) -> bool {
        matches!(self.state, TransitionState::AwaitingSwitch { .. })
    }

    /// Opacity of the black overlay, 0 when nothing is covered.
    pub fn fade_alpha(&self, now: f64) -> f32 {
        let progress = |since: f64| ((now - since) / self.fade_duration).clamp(0.0, 1.0) as f32;
        match &self.state {
            TransitionState::Idle => 0.0,
            TransitionState::AwaitingSwitch { since, .. } => progress(*since),
            TransitionState::FadingIn { since } => 1.0 - progress(*since),
        }
    }
}
