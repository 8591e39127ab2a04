//! Pointer tracking
//!
//! Turns raw [`InputEvent`]s into per-pointer state in simulation space
//! (`[0, 1]²`, y up) and, once per frame, into splat requests. Each pointer
//! runs `idle → down → (moved)* → up → idle`. A press queues one burst splat;
//! movement queues continuous splats along the drag (or hover, for the mouse).

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::color::{generate_color, wrap, ColorRgb, BURST_GAIN};
use super::events::{InputEvent, PointerId};
use crate::simulation::resolution::{scale_by_pixel_ratio, SurfaceSize};

/// Pointer id of the mouse.
pub const MOUSE_POINTER_ID: PointerId = -1;

/// Narrow surfaces compress horizontal movement.
pub fn correct_delta_x(delta: f32, aspect_ratio: f32) -> f32 {
    if aspect_ratio < 1.0 {
        delta * aspect_ratio
    } else {
        delta
    }
}

/// Wide surfaces compress vertical movement.
pub fn correct_delta_y(delta: f32, aspect_ratio: f32) -> f32 {
    if aspect_ratio > 1.0 {
        delta / aspect_ratio
    } else {
        delta
    }
}

/// Splat radius that stays circular on wide surfaces.
pub fn correct_radius(radius: f32, aspect_ratio: f32) -> f32 {
    if aspect_ratio > 1.0 {
        radius * aspect_ratio
    } else {
        radius
    }
}

/// Logical client coordinates to simulation space.
pub fn client_to_texcoord(x: f32, y: f32, surface: &SurfaceSize) -> Vec2 {
    let (width, height) = surface.physical();
    let px = scale_by_pixel_ratio(x, surface.pixel_ratio) as f32;
    let py = scale_by_pixel_ratio(y, surface.pixel_ratio) as f32;
    Vec2::new(px / width as f32, 1.0 - py / height as f32)
}

/// State of one input pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    pub id: PointerId,
    pub texcoord: Vec2,
    pub prev_texcoord: Vec2,
    /// Aspect-corrected movement since the previous sample
    pub delta: Vec2,
    pub down: bool,
    /// Moved since the last splat
    pub moved: bool,
    pub color: ColorRgb,
    /// Has a known position
    placed: bool,
}

impl Pointer {
    pub fn new(id: PointerId, color: ColorRgb) -> Self {
        Self {
            id,
            texcoord: Vec2::ZERO,
            prev_texcoord: Vec2::ZERO,
            delta: Vec2::ZERO,
            down: false,
            moved: false,
            color,
            placed: false,
        }
    }

    /// Pointer resting at `texcoord`.
    pub fn at(id: PointerId, texcoord: Vec2, color: ColorRgb) -> Self {
        Self {
            texcoord,
            prev_texcoord: texcoord,
            placed: true,
            ..Self::new(id, color)
        }
    }

    pub fn press(&mut self, texcoord: Vec2, color: ColorRgb) {
        self.down = true;
        self.moved = false;
        self.texcoord = texcoord;
        self.prev_texcoord = texcoord;
        self.delta = Vec2::ZERO;
        self.color = color;
        self.placed = true;
    }

    pub fn move_to(&mut self, texcoord: Vec2, aspect_ratio: f32) {
        if !self.placed {
            // First contact has nothing to measure against
            *self = Self::at(self.id, texcoord, self.color);
            return;
        }

        self.prev_texcoord = self.texcoord;
        self.texcoord = texcoord;
        let raw = self.texcoord - self.prev_texcoord;
        self.delta = Vec2::new(
            correct_delta_x(raw.x, aspect_ratio),
            correct_delta_y(raw.y, aspect_ratio),
        );
        self.moved = self.delta.x.abs() > 0.0 || self.delta.y.abs() > 0.0;
    }

    pub fn release(&mut self) {
        self.down = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplatKind {
    /// Follows pointer movement
    Continuous,
    /// One-shot random impulse on press
    Burst,
}

/// One impulse to inject into the velocity and dye fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplatRequest {
    pub kind: SplatKind,
    pub point: Vec2,
    pub force: Vec2,
    pub color: ColorRgb,
}

/// Every pointer of a session plus the color rotation timer.
pub struct PointerTracker {
    pointers: Vec<Pointer>,
    rng: StdRng,
    color_timer: f32,
    bursts: Vec<SplatRequest>,
}

impl PointerTracker {
    /// Tracker with only the mouse pointer.
    pub fn new(mut rng: StdRng) -> Self {
        let mouse = Pointer::new(MOUSE_POINTER_ID, generate_color(&mut rng));
        Self {
            pointers: vec![mouse],
            rng,
            color_timer: 0.0,
            bursts: Vec::new(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn pointers(&self) -> &[Pointer] {
        &self.pointers
    }

    pub fn pointer(&self, id: PointerId) -> Option<&Pointer> {
        self.pointers.iter().find(|pointer| pointer.id == id)
    }

    /// Register `pointer`, replacing any pointer with the same id.
    pub fn add_pointer(&mut self, pointer: Pointer) {
        match self.pointers.iter_mut().find(|existing| existing.id == pointer.id) {
            Some(existing) => *existing = pointer,
            None => self.pointers.push(pointer),
        }
    }

    pub fn generate_color(&mut self) -> ColorRgb {
        generate_color(&mut self.rng)
    }

    fn index_of(&mut self, id: PointerId) -> usize {
        if let Some(index) = self.pointers.iter().position(|pointer| pointer.id == id) {
            return index;
        }
        let color = generate_color(&mut self.rng);
        self.pointers.push(Pointer::new(id, color));
        log::debug!("Tracking pointer {}", id);
        self.pointers.len() - 1
    }

    pub fn handle_event(&mut self, event: InputEvent, surface: &SurfaceSize) {
        match event {
            InputEvent::PointerDown { id, x, y } => {
                let index = self.index_of(id);
                let texcoord = client_to_texcoord(x, y, surface);
                let color = generate_color(&mut self.rng);
                self.pointers[index].press(texcoord, color);

                let burst_color = generate_color(&mut self.rng).scaled(BURST_GAIN);
                let force = Vec2::new(
                    10.0 * (self.rng.gen::<f32>() - 0.5),
                    30.0 * (self.rng.gen::<f32>() - 0.5),
                );
                self.bursts.push(SplatRequest {
                    kind: SplatKind::Burst,
                    point: texcoord,
                    force,
                    color: burst_color,
                });
            }
            InputEvent::PointerMove { id, x, y } => {
                let index = self.index_of(id);
                let texcoord = client_to_texcoord(x, y, surface);
                self.pointers[index].move_to(texcoord, surface.aspect_ratio());
            }
            InputEvent::PointerUp { id } => {
                if let Some(pointer) = self.pointers.iter_mut().find(|pointer| pointer.id == id) {
                    pointer.release();
                }
            }
        }
    }

    /// Advance the color rotation; every pointer gets a new color each time
    /// the timer wraps.
    pub fn update_colors(&mut self, dt: f32, color_update_speed: f32) {
        self.color_timer += dt * color_update_speed;
        if self.color_timer >= 1.0 {
            self.color_timer = wrap(self.color_timer, 0.0, 1.0);
            for pointer in &mut self.pointers {
                pointer.color = generate_color(&mut self.rng);
            }
        }
    }

    /// Queued bursts, then one continuous splat per moved pointer.
    pub fn take_splats(&mut self, splat_force: f32) -> Vec<SplatRequest> {
        let mut splats = std::mem::take(&mut self.bursts);
        for pointer in &mut self.pointers {
            if pointer.moved {
                pointer.moved = false;
                splats.push(SplatRequest {
                    kind: SplatKind::Continuous,
                    point: pointer.texcoord,
                    force: pointer.delta * splat_force,
                    color: pointer.color,
                });
            }
        }
        splats
    }
}
