//! Server-simulated enemies that chase the nearest player on their map.

use crate::config::EnemyConfig;
use shared::{CollisionMap, Direction, EnemySnapshot, Footprint, Motion, Vec2};

#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: u32,
    pub enemy_type: String,
    pub motion: Motion,
    pub direction: Direction,
    pub current_map: String,
    pub z_index: i32,
    pub moving: bool,
    pub hp: i32,
    pub rows: u32,
    pub columns: u32,
    pub footprint: Footprint,
}

impl Enemy {
    pub fn from_config(config: &EnemyConfig) -> Self {
        Self {
            id: config.id,
            enemy_type: config.enemy_type.clone(),
            motion: Motion::new(config.spawn(), config.speed),
            direction: Direction::Down,
            current_map: config.map.clone(),
            z_index: 0,
            moving: true,
            hp: config.hp,
            rows: config.rows,
            columns: config.columns,
            footprint: config.footprint(),
        }
    }

    /// Points the enemy at `target`, or leaves its last target when there is none.
    pub fn chase(&mut self, target: Option<Vec2>) {
        if let Some(target) = target {
            self.motion.target = target;
            self.moving = true;
        }
    }

    /// Advances one tick on `map`. Stops when arrived or blocked on both axes.
    pub fn advance(&mut self, dt: f32, map: &CollisionMap) {
        self.motion.prev = self.motion.position;
        if !self.moving {
            return;
        }

        let desired = self.motion.step(dt);
        if desired.is_zero() {
            self.moving = false;
            return;
        }

        let footprint = self.footprint.at(self.motion.position);
        let allowed = map.resolve_movement(footprint, desired, self.z_index);
        if allowed.is_zero() {
            self.moving = false;
            return;
        }

        self.motion.position = self.motion.position.add(allowed);
        self.direction = Direction::from_delta(allowed, self.direction);
    }

    /// Takes the layer of the elevation under the enemy's feet, if any.
    pub fn update_elevation(&mut self, map: &CollisionMap) {
        let feet = self.footprint.at(self.motion.position).feet();
        if let Some(z) = map.elevation_at(feet) {
            self.z_index = z;
        }
    }

    pub fn snapshot(&self) -> EnemySnapshot {
        EnemySnapshot {
            id: self.id,
            enemy_type: self.enemy_type.clone(),
            x: self.motion.position.x,
            y: self.motion.position.y,
            direction: self.direction,
            moving: self.moving,
            current_map: self.current_map.clone(),
            rows: self.rows,
            columns: self.columns,
            z_index: self.z_index,
            hp: self.hp,
            speed: self.motion.speed,
        }
    }
}

/// Position of the player closest to `from`.
///
/// Candidates must be given in ascending id order; only a strictly closer
/// candidate replaces the current pick, so equal distances go to the lowest id.
pub fn nearest<I>(from: Vec2, candidates: I) -> Option<Vec2>
where
    I: IntoIterator<Item = (u32, Vec2)>,
{
    let mut best: Option<(f32, Vec2)> = None;
    for (_, position) in candidates {
        let distance = from.distance(position);
        match best {
            Some((best_distance, _)) if distance >= best_distance => {}
            _ => best = Some((distance, position)),
        }
    }
    best.map(|(_, position)| position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_roster;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Collider, Elevation, Rect};

    fn bull() -> Enemy {
        let mut config = default_roster()[2].clone();
        config.x = 0.0;
        config.y = 0.0;
        Enemy::from_config(&config)
    }

    #[test]
    fn test_nearest_prefers_lowest_id_on_tie() {
        let from = Vec2::ZERO;
        let picked = nearest(
            from,
            vec![
                (1, Vec2::new(10.0, 0.0)),
                (2, Vec2::new(0.0, 10.0)),
                (3, Vec2::new(50.0, 0.0)),
            ],
        );
        assert_eq!(picked, Some(Vec2::new(10.0, 0.0)));
        assert_eq!(nearest(from, Vec::new()), None);
    }

    #[test]
    fn test_advance_moves_toward_target() {
        let mut enemy = bull();
        enemy.chase(Some(Vec2::new(100.0, 0.0)));
        enemy.advance(0.5, &CollisionMap::empty("m"));

        assert_approx_eq!(enemy.motion.position.x, 20.0);
        assert_eq!(enemy.direction, Direction::Right);
        assert!(enemy.moving);
    }

    #[test]
    fn test_blocked_enemy_stops() {
        let mut enemy = bull();
        let map = CollisionMap {
            colliders: vec![Collider {
                rect: Rect::new(24.0, -100.0, 10.0, 300.0),
                z_index: 0,
            }],
            ..CollisionMap::empty("m")
        };
        enemy.chase(Some(Vec2::new(100.0, 0.0)));
        enemy.advance(0.5, &map);

        assert_eq!(enemy.motion.position, Vec2::ZERO);
        assert!(!enemy.moving);
    }

    #[test]
    fn test_arrival_stops_and_chase_restarts() {
        let mut enemy = bull();
        enemy.advance(0.1, &CollisionMap::empty("m"));
        assert!(!enemy.moving);

        enemy.chase(None);
        assert!(!enemy.moving);
        enemy.chase(Some(Vec2::new(5.0, 5.0)));
        assert!(enemy.moving);
    }

    #[test]
    fn test_elevation_is_sticky() {
        let mut enemy = bull();
        let map = CollisionMap {
            elevations: vec![Elevation {
                rect: Rect::new(0.0, 0.0, 100.0, 100.0),
                z_index: 2,
            }],
            ..CollisionMap::empty("m")
        };
        enemy.update_elevation(&map);
        assert_eq!(enemy.z_index, 2);

        enemy.motion.teleport(Vec2::new(500.0, 500.0));
        enemy.update_elevation(&map);
        assert_eq!(enemy.z_index, 2);
    }
}
