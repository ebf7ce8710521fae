//! Local player prediction and continuous reconciliation
//!
//! Input moves the local player immediately against the client's copy of
//! the collision map. Whenever the server reports a position for the local
//! player, the predicted position is pulled toward it a little every frame,
//! or snapped when the two have drifted too far apart.

use shared::{CollisionMap, Direction, PlayerData, Rect, Vec2, PLAYER_FOOTPRINT};

/// One reconciliation step from `predicted` toward `server`.
pub fn reconcile_step(predicted: Vec2, server: Vec2, snap_threshold: f32, factor: f32) -> Vec2 {
    let error = server.sub(predicted);
    if error.length() > snap_threshold {
        server
    } else {
        predicted.add(error.scale(factor))
    }
}

#[derive(Debug, Clone)]
pub struct LocalPlayer {
    pub id: u32,
    pub name: String,
    pub position: Vec2,
    /// Latest authoritative position, if any arrived since the last map change
    pub server_position: Option<Vec2>,
    pub direction: Direction,
    pub current_map: String,
    pub z_index: i32,
    pub moving: bool,
    pub running: bool,
    pub attacking: bool,
}

impl LocalPlayer {
    pub fn from_assignment(id: u32, data: &PlayerData) -> Self {
        Self {
            id,
            name: data.name.clone(),
            position: Vec2::new(data.x, data.y),
            server_position: None,
            direction: data.direction,
            current_map: data.current_map.clone(),
            z_index: data.z_index,
            moving: false,
            running: false,
            attacking: false,
        }
    }

    /// Applies one frame of input and returns the offset actually moved.
    ///
    /// `input` is a raw direction; its length does not matter.
    pub fn apply_input(&mut self, input: Vec2, speed: f32, dt: f32, map: &CollisionMap) -> Vec2 {
        let desired = input.normalize().scale(speed * dt);
        let allowed = map.resolve_movement(self.footprint(), desired, self.z_index);

        self.position = self.position.add(allowed);
        self.direction = Direction::from_delta(input, self.direction);
        self.moving = !input.is_zero();

        if let Some(z) = map.elevation_at(self.footprint().feet()) {
            self.z_index = z;
        }
        allowed
    }

    /// Pulls the predicted position toward the last server position.
    pub fn reconcile(&mut self, snap_threshold: f32, factor: f32) {
        if let Some(server) = self.server_position {
            self.position = reconcile_step(self.position, server, snap_threshold, factor);
        }
    }

    /// Moves to a new map; the old server position no longer applies.
    pub fn switch_map(&mut self, map: &str, position: Vec2) {
        self.current_map = map.to_string();
        self.position = position;
        self.server_position = None;
        self.moving = false;
    }

    pub fn footprint(&self) -> Rect {
        PLAYER_FOOTPRINT.at(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Collider, Elevation};

    fn player() -> LocalPlayer {
        LocalPlayer::from_assignment(
            1,
            &PlayerData {
                x: 0.0,
                y: 0.0,
                direction: Direction::Down,
                current_map: "A".to_string(),
                z_index: 0,
                name: "Alyx".to_string(),
            },
        )
    }

    #[test]
    fn test_small_error_is_smoothed() {
        let next = reconcile_step(Vec2::ZERO, Vec2::new(10.0, 0.0), 64.0, 0.1);
        assert_approx_eq!(next.x, 1.0);
        assert_approx_eq!(next.y, 0.0);
    }

    #[test]
    fn test_large_error_snaps() {
        let next = reconcile_step(Vec2::ZERO, Vec2::new(100.0, 0.0), 64.0, 0.1);
        assert_eq!(next, Vec2::new(100.0, 0.0));
    }

    #[test]
    fn test_apply_input_moves_at_speed() {
        let mut p = player();
        let moved = p.apply_input(Vec2::new(1.0, 1.0), 100.0, 0.1, &CollisionMap::empty("A"));
        assert_approx_eq!(moved.length(), 10.0, 1e-4);
        assert_approx_eq!(p.position.x, p.position.y);
        assert!(p.moving);
    }

    #[test]
    fn test_apply_input_respects_walls_and_elevation() {
        let map = CollisionMap {
            colliders: vec![Collider {
                rect: Rect::new(34.0, 0.0, 10.0, 100.0),
                z_index: 0,
            }],
            elevations: vec![Elevation {
                rect: Rect::new(0.0, 0.0, 100.0, 100.0),
                z_index: 1,
            }],
            ..CollisionMap::empty("A")
        };
        let mut p = player();
        let moved = p.apply_input(Vec2::new(1.0, 0.0), 100.0, 0.1, &map);

        assert_eq!(moved, Vec2::ZERO);
        assert_eq!(p.direction, Direction::Right);
        assert_eq!(p.z_index, 1);

        // On layer 1 the wall no longer blocks.
        let moved = p.apply_input(Vec2::new(1.0, 0.0), 100.0, 0.1, &map);
        assert_approx_eq!(moved.x, 10.0);
    }

    #[test]
    fn test_reconcile_without_server_position_is_noop() {
        let mut p = player();
        p.position = Vec2::new(5.0, 5.0);
        p.reconcile(64.0, 0.1);
        assert_eq!(p.position, Vec2::new(5.0, 5.0));

        p.server_position = Some(Vec2::new(15.0, 5.0));
        p.reconcile(64.0, 0.1);
        assert_approx_eq!(p.position.x, 6.0);
    }

    #[test]
    fn test_switch_map_clears_server_position() {
        let mut p = player();
        p.server_position = Some(Vec2::new(1.0, 1.0));
        p.switch_map("B", Vec2::new(10.0, 20.0));
        assert_eq!(p.current_map, "B");
        assert_eq!(p.position, Vec2::new(10.0, 20.0));
        assert!(p.server_position.is_none());
    }
}
