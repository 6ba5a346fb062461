//! Game simulation
//!
//! All gameplay logic lives here:
//! - Fixed physics timestep, sub-stepped per frame
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering, audio or platform dependencies beyond the collaborator traits

pub mod collision;
pub mod combo;
pub mod entity;
pub mod level;
pub mod physics;
pub mod spawn;
pub mod state;
pub mod tick;

pub use collision::{CollisionResolver, Effect, ResolverConfig};
pub use combo::ComboTracker;
pub use entity::{
    BlockData, Entity, EntityData, EntityId, EntityKind, EntityStore, KillEvent, KindTraits,
    PaddleData,
};
pub use level::{
    JsonLevels, LevelCatalog, LevelData, LevelError, LevelSource, Material, MaterialOverride,
    TileCell, TileParam,
};
pub use physics::{BodyKind, BodySpec, ContactEvent, Layer, PhysicsWorld, Shape, WorldConfig};
pub use spawn::{LevelLayout, build_level};
pub use state::{ExtraLifeSchedule, GameMode, GameState};
pub use tick::{Game, TickInput};
