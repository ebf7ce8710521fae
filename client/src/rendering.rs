use crate::game::Scene;
use crate::interpolation::{EntityKind, RemoteEntity};
use macroquad::prelude::*;
use shared::{CollisionMap, FRAME_SIZE, PLAYER_FOOTPRINT};

#[derive(Debug, Clone, Copy)]
pub struct RenderConfig {
    pub debug_geometry: bool,
    pub fake_ping_ms: u64,
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: u32, height: u32) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    /// Draws one frame. `scene` is `None` until the server assigns an id.
    pub fn render(&mut self, scene: Option<Scene<'_>>, config: RenderConfig) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        let Some(scene) = scene else {
            draw_text("Connecting...", 10.0, 20.0, 20.0, WHITE);
            return;
        };

        // Camera follows the local player.
        let local = scene.local;
        let origin = (
            local.position.x + FRAME_SIZE / 2.0 - self.width / 2.0,
            local.position.y + FRAME_SIZE / 2.0 - self.height / 2.0,
        );

        if config.debug_geometry {
            self.draw_geometry(scene.map, origin);
        }

        let remotes = scene.roster.visible(&local.current_map);
        for entity in remotes.iter().filter(|e| e.z_index <= local.z_index) {
            self.draw_remote(entity, origin);
        }
        self.draw_sprite(
            local.position.x - origin.0,
            local.position.y - origin.1,
            GREEN,
            &local.name,
        );
        for entity in remotes.iter().filter(|e| e.z_index > local.z_index) {
            self.draw_remote(entity, origin);
        }

        self.draw_ui(&scene, config);

        if scene.fade_alpha > 0.0 {
            draw_rectangle(
                0.0,
                0.0,
                self.width,
                self.height,
                Color::new(0.0, 0.0, 0.0, scene.fade_alpha),
            );
        }
    }

    fn draw_geometry(&mut self, map: &CollisionMap, origin: (f32, f32)) {
        for elevation in &map.elevations {
            let r = elevation.rect;
            draw_rectangle(
                r.x - origin.0,
                r.y - origin.1,
                r.w,
                r.h,
                Color::from_rgba(0, 120, 255, 40 + 30 * elevation.z_index.clamp(0, 5) as u8),
            );
        }
        for collider in &map.colliders {
            let r = collider.rect;
            draw_rectangle_lines(r.x - origin.0, r.y - origin.1, r.w, r.h, 1.0, RED);
        }
        for portal in &map.portals {
            let r = portal.rect;
            draw_rectangle(
                r.x - origin.0,
                r.y - origin.1,
                r.w,
                r.h,
                Color::from_rgba(200, 0, 255, 90),
            );
            draw_text(&portal.target_map, r.x - origin.0, r.y - origin.1 - 2.0, 12.0, WHITE);
        }
    }

    fn draw_remote(&mut self, entity: &RemoteEntity, origin: (f32, f32)) {
        let x = entity.render.x - origin.0;
        let y = entity.render.y - origin.1;
        match &entity.kind {
            EntityKind::Player { attacking, .. } => {
                let color = if *attacking {
                    ORANGE
                } else {
                    Color::from_rgba(255, 68, 68, 255)
                };
                self.draw_sprite(x, y, color, entity.name());
            }
            EntityKind::Enemy { hp, .. } => {
                self.draw_sprite(x, y, Color::from_rgba(140, 90, 40, 255), entity.name());
                let width = FRAME_SIZE * (*hp).clamp(0, 100) as f32 / 100.0;
                draw_rectangle(x, y - 4.0, width, 3.0, RED);
            }
        }
    }

    fn draw_sprite(&mut self, x: f32, y: f32, color: Color, label: &str) {
        let foot = PLAYER_FOOTPRINT;
        draw_rectangle_lines(x, y, FRAME_SIZE, FRAME_SIZE, 1.0, Color::from_rgba(80, 80, 80, 255));
        draw_rectangle(
            x + foot.offset_x - 8.0,
            y + foot.offset_y - 24.0,
            foot.width + 16.0,
            foot.height + 24.0,
            color,
        );
        draw_text(label, x + 4.0, y - 8.0, 14.0, WHITE);
    }

    fn draw_ui(&mut self, scene: &Scene<'_>, config: RenderConfig) {
        let local = scene.local;
        let lines = [
            format!("{}  (id {})", local.name, local.id),
            format!("Map: {}  z: {}", local.current_map, local.z_index),
            format!("World time: {}", scene.world_time),
            format!(
                "Players: {}  Enemies: {}",
                scene.roster.player_count() + 1,
                scene.roster.enemy_count()
            ),
        ];
        for (i, line) in lines.iter().enumerate() {
            draw_text(line, 10.0, 20.0 + i as f32 * 16.0, 16.0, WHITE);
        }
        if config.fake_ping_ms > 0 {
            let text = format!("+{}ms simulated", config.fake_ping_ms);
            draw_text(&text, 10.0, 20.0 + lines.len() as f32 * 16.0, 16.0, YELLOW);
        }

        if let Some(toast) = scene.toast {
            let size = measure_text(toast, None, 20, 1.0);
            draw_text(
                toast,
                (self.width - size.width) / 2.0,
                self.height - 40.0,
                20.0,
                YELLOW,
            );
        }
    }
}
