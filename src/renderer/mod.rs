//! Rendering contract
//!
//! The simulation never talks to a graphics API. Each frame it hands every
//! alive, visible entity to a [`Renderer`] in ascending z-index order;
//! entities sharing a z-index keep their insertion order.

use glam::Vec2;

use crate::sim::entity::{EntityId, EntityKind};

/// What a renderer needs to draw one entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite<'a> {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Tile id for textured blocks
    pub tile_id: Option<u32>,
    pub position: Vec2,
    pub rotation: f32,
    pub half_extents: Vec2,
    /// Opacity (0-1)
    pub alpha: f32,
    /// Text content for score labels
    pub text: Option<&'a str>,
}

/// Anything that can be drawn
pub trait Drawable {
    fn z_index(&self) -> i32;
    fn sprite(&self) -> Sprite<'_>;
}

/// Draw target supplied by the platform layer
pub trait Renderer {
    fn draw(&mut self, drawable: &dyn Drawable);

    /// Full-screen flash intensity (0-1), once per frame after the entities
    fn glare(&mut self, _intensity: f32) {}
}

/// Submit drawables to `renderer` sorted by z-index, stable for ties
pub fn draw_sorted<'a, D, I>(renderer: &mut dyn Renderer, drawables: I)
where
    D: Drawable + 'a,
    I: IntoIterator<Item = &'a D>,
{
    let mut ordered: Vec<&D> = drawables.into_iter().collect();
    ordered.sort_by_key(|d| d.z_index());
    for drawable in ordered {
        renderer.draw(drawable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dot {
        id: u64,
        z: i32,
    }

    impl Drawable for Dot {
        fn z_index(&self) -> i32 {
            self.z
        }

        fn sprite(&self) -> Sprite<'_> {
            Sprite {
                id: EntityId(self.id),
                kind: EntityKind::Particle,
                tile_id: None,
                position: Vec2::ZERO,
                rotation: 0.0,
                half_extents: Vec2::ONE,
                alpha: 1.0,
                text: None,
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        order: Vec<u64>,
    }

    impl Renderer for Recorder {
        fn draw(&mut self, drawable: &dyn Drawable) {
            self.order.push(drawable.sprite().id.0);
        }
    }

    #[test]
    fn test_z_order_is_stable() {
        let dots = [
            Dot { id: 1, z: 2 },
            Dot { id: 2, z: 0 },
            Dot { id: 3, z: 2 },
            Dot { id: 4, z: 1 },
            Dot { id: 5, z: 0 },
        ];
        let mut recorder = Recorder::default();
        draw_sorted(&mut recorder, &dots);
        assert_eq!(recorder.order, vec![2, 5, 4, 1, 3]);
    }
}
