//! Smoothing of remote players and enemies between server snapshots.
//!
//! Each snapshot only sets a new target. Every frame the rendered position
//! moves toward that target at a fixed speed and never past it.

use shared::{capped_step, Direction, EnemySnapshot, PlayerSnapshot, Vec2, WorldSnapshot};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Player {
        name: String,
        attacking: bool,
    },
    Enemy {
        enemy_type: String,
        rows: u32,
        columns: u32,
        hp: i32,
    },
}

#[derive(Debug, Clone)]
pub struct RemoteEntity {
    pub id: u32,
    pub kind: EntityKind,
    /// Where the entity is drawn this frame
    pub render: Vec2,
    pub prev: Vec2,
    pub target: Vec2,
    pub direction: Direction,
    pub moving: bool,
    pub current_map: String,
    pub z_index: i32,
    pub last_update: f64,
}

impl RemoteEntity {
    fn new(id: u32, kind: EntityKind, position: Vec2, current_map: &str, now: f64) -> Self {
        Self {
            id,
            kind,
            render: position,
            prev: position,
            target: position,
            direction: Direction::Down,
            moving: false,
            current_map: current_map.to_string(),
            z_index: 0,
            last_update: now,
        }
    }

    fn from_player(snapshot: &PlayerSnapshot, now: f64) -> Self {
        let kind = EntityKind::Player {
            name: snapshot.name.clone(),
            attacking: snapshot.attacking,
        };
        let position = Vec2::new(snapshot.x, snapshot.y);
        let mut entity = Self::new(snapshot.id, kind, position, &snapshot.current_map, now);
        entity.direction = snapshot.direction;
        entity.moving = snapshot.moving;
        entity.z_index = snapshot.z_index;
        entity
    }

    fn from_enemy(snapshot: &EnemySnapshot, now: f64) -> Self {
        let kind = EntityKind::Enemy {
            enemy_type: snapshot.enemy_type.clone(),
            rows: snapshot.rows,
            columns: snapshot.columns,
            hp: snapshot.hp,
        };
        let position = Vec2::new(snapshot.x, snapshot.y);
        let mut entity = Self::new(snapshot.id, kind, position, &snapshot.current_map, now);
        entity.direction = snapshot.direction;
        entity.moving = snapshot.moving;
        entity.z_index = snapshot.z_index;
        entity
    }

    /// Retargets toward `position`. A map change snaps instead.
    pub fn retarget(&mut self, position: Vec2, current_map: &str, now: f64) {
        if self.current_map != current_map {
            self.current_map = current_map.to_string();
            self.render = position;
            self.prev = position;
            self.target = position;
        } else {
            self.prev = self.render;
            self.target = position;
        }
        self.last_update = now;
    }

    pub fn advance(&mut self, speed: f32, dt: f32) {
        self.render = self.render.add(capped_step(self.render, self.target, speed * dt));
    }

    pub fn name(&self) -> &str {
        match &self.kind {
            EntityKind::Player { name, .. } => name,
            EntityKind::Enemy { enemy_type, .. } => enemy_type,
        }
    }
}

/// Every remote entity the client knows about.
#[derive(Debug)]
pub struct Roster {
    players: BTreeMap<u32, RemoteEntity>,
    enemies: BTreeMap<u32, RemoteEntity>,
    speed: f32,
}

impl Roster {
    pub fn new(speed: f32) -> Self {
        Self {
            players: BTreeMap::new(),
            enemies: BTreeMap::new(),
            speed,
        }
    }

    /// Folds one snapshot in. The entry for `local_id` is skipped.
    ///
    /// Players missing from the snapshot stay until a disconnect notice;
    /// enemies missing from it are gone.
    pub fn apply_snapshot(&mut self, snapshot: &WorldSnapshot, local_id: Option<u32>, now: f64) {
        for p in &snapshot.players {
            if Some(p.id) == local_id {
                continue;
            }
            let position = Vec2::new(p.x, p.y);
            match self.players.get_mut(&p.id) {
                Some(entity) => {
                    entity.retarget(position, &p.current_map, now);
                    entity.direction = p.direction;
                    entity.moving = p.moving;
                    entity.z_index = p.z_index;
                    entity.kind = EntityKind::Player {
                        name: p.name.clone(),
                        attacking: p.attacking,
                    };
                }
                None => {
                    self.players.insert(p.id, RemoteEntity::from_player(p, now));
                }
            }
        }

        self.enemies
            .retain(|id, _| snapshot.enemies.iter().any(|e| e.id == *id));
        for e in &snapshot.enemies {
            let position = Vec2::new(e.x, e.y);
            match self.enemies.get_mut(&e.id) {
                Some(entity) => {
                    entity.retarget(position, &e.current_map, now);
                    entity.direction = e.direction;
                    entity.moving = e.moving;
                    entity.z_index = e.z_index;
                    if let EntityKind::Enemy { hp, .. } = &mut entity.kind {
                        *hp = e.hp;
                    }
                }
                None => {
                    self.enemies.insert(e.id, RemoteEntity::from_enemy(e, now));
                }
            }
        }
    }

    pub fn remove_player(&mut self, id: u32) -> bool {
        self.players.remove(&id).is_some()
    }

    pub fn advance(&mut self, dt: f32) {
        for entity in self.players.values_mut().chain(self.enemies.values_mut()) {
            entity.advance(self.speed, dt);
        }
    }

    pub fn player(&self, id: u32) -> Option<&RemoteEntity> {
        self.players.get(&id)
    }

    pub fn enemy(&self, id: u32) -> Option<&RemoteEntity> {
        self.enemies.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn enemy_count(&self) -> usize {
        self.enemies.len()
    }

    /// Entities drawn on `map`, ordered by layer then by vertical position.
    pub fn visible<'a>(&'a self, map: &str) -> Vec<&'a RemoteEntity> {
        let mut visible: Vec<&RemoteEntity> = self
            .players
            .values()
            .chain(self.enemies.values())
            .filter(|e| e.current_map == map)
            .collect();
        visible.sort_by(|a, b| {
            a.z_index
                .cmp(&b.z_index)
                .then(a.render.y.total_cmp(&b.render.y))
        });
        visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn player_at(id: u32, x: f32, y: f32, map: &str) -> PlayerSnapshot {
        PlayerSnapshot {
            id,
            name: format!("Player{}", id),
            x,
            y,
            prev_x: x,
            prev_y: y,
            target_x: x,
            target_y: y,
            direction: Direction::Down,
            moving: false,
            current_map: map.to_string(),
            z_index: 0,
            attacking: false,
            timestamp: 0.0,
        }
    }

    fn enemy_at(id: u32, x: f32, y: f32) -> EnemySnapshot {
        EnemySnapshot {
            id,
            enemy_type: "bull".to_string(),
            x,
            y,
            direction: Direction::Down,
            moving: true,
            current_map: "A".to_string(),
            rows: 8,
            columns: 6,
            z_index: 0,
            hp: 100,
            speed: 40.0,
        }
    }

    fn snapshot(players: Vec<PlayerSnapshot>, enemies: Vec<EnemySnapshot>) -> WorldSnapshot {
        WorldSnapshot {
            players,
            enemies,
            world_time: "12:00:00".to_string(),
        }
    }

    #[test]
    fn test_new_entity_appears_at_snapshot_position() {
        let mut roster = Roster::new(200.0);
        roster.apply_snapshot(&snapshot(vec![player_at(2, 10.0, 20.0, "A")], vec![]), None, 0.0);
        let p = roster.player(2).unwrap();
        assert_eq!(p.render, Vec2::new(10.0, 20.0));
        assert_eq!(p.name(), "Player2");
    }

    #[test]
    fn test_advance_approaches_target_without_overshoot() {
        let mut roster = Roster::new(200.0);
        roster.apply_snapshot(&snapshot(vec![player_at(2, 0.0, 0.0, "A")], vec![]), None, 0.0);
        roster.apply_snapshot(&snapshot(vec![player_at(2, 10.0, 0.0, "A")], vec![]), None, 0.05);

        roster.advance(0.016);
        assert_approx_eq!(roster.player(2).unwrap().render.x, 3.2, 1e-4);

        for _ in 0..10 {
            roster.advance(0.016);
        }
        let render = roster.player(2).unwrap().render;
        assert_approx_eq!(render.x, 10.0);
        assert_approx_eq!(render.y, 0.0);
    }

    #[test]
    fn test_retarget_starts_from_rendered_position() {
        let mut roster = Roster::new(100.0);
        roster.apply_snapshot(&snapshot(vec![player_at(2, 0.0, 0.0, "A")], vec![]), None, 0.0);
        roster.apply_snapshot(&snapshot(vec![player_at(2, 10.0, 0.0, "A")], vec![]), None, 0.0);
        roster.advance(0.05);
        roster.apply_snapshot(&snapshot(vec![player_at(2, 20.0, 0.0, "A")], vec![]), None, 0.0);

        let p = roster.player(2).unwrap();
        assert_approx_eq!(p.prev.x, 5.0, 1e-4);
        assert_eq!(p.target, Vec2::new(20.0, 0.0));
    }

    #[test]
    fn test_map_change_snaps() {
        let mut roster = Roster::new(200.0);
        roster.apply_snapshot(&snapshot(vec![player_at(2, 0.0, 0.0, "A")], vec![]), None, 0.0);
        roster.apply_snapshot(&snapshot(vec![player_at(2, 500.0, 40.0, "B")], vec![]), None, 0.0);

        let p = roster.player(2).unwrap();
        assert_eq!(p.render, Vec2::new(500.0, 40.0));
        assert_eq!(p.prev, p.target);
        assert_eq!(p.current_map, "B");
    }

    #[test]
    fn test_local_player_is_skipped() {
        let mut roster = Roster::new(200.0);
        let snap = snapshot(vec![player_at(1, 0.0, 0.0, "A"), player_at(2, 0.0, 0.0, "A")], vec![]);
        roster.apply_snapshot(&snap, Some(1), 0.0);
        assert!(roster.player(1).is_none());
        assert_eq!(roster.player_count(), 1);
    }

    #[test]
    fn test_absent_players_kept_absent_enemies_dropped() {
        let mut roster = Roster::new(200.0);
        roster.apply_snapshot(
            &snapshot(vec![player_at(2, 0.0, 0.0, "A")], vec![enemy_at(1, 0.0, 0.0)]),
            None,
            0.0,
        );
        roster.apply_snapshot(&snapshot(vec![], vec![]), None, 0.1);

        assert!(roster.player(2).is_some());
        assert_eq!(roster.enemy_count(), 0);

        assert!(roster.remove_player(2));
        assert!(!roster.remove_player(2));
    }

    #[test]
    fn test_visible_filters_by_map() {
        let mut roster = Roster::new(200.0);
        let snap = snapshot(
            vec![player_at(2, 0.0, 50.0, "A"), player_at(3, 0.0, 0.0, "B")],
            vec![enemy_at(1, 0.0, 10.0)],
        );
        roster.apply_snapshot(&snap, None, 0.0);

        let ids: Vec<u32> = roster.visible("A").iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
