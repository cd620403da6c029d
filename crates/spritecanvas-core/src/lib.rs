//! **spritecanvas-core**: a fixed-grid sprite-tile canvas.
//!
//! A [`TileCanvas`] holds up to 64×64 static tiles and up to 8 freely
//! positioned sprites. Each frame it flattens them into one vertex buffer
//! (six vertices per quad, tiles before sprites) and hands it to a
//! [`RenderBackend`]. Sprite lookups go through a [`SpriteSheet`].
//!
//! This crate is backend agnostic. [`HeadlessBackend`] records draws in
//! memory; GPU output lives in `spritecanvas-wgpu`.

pub mod backend;
pub mod canvas;
pub mod error;
pub mod geom;
pub mod headless;
pub mod sheet;
pub mod vertex;

pub use backend::{CanvasResources, DrawCall, RenderBackend};
pub use canvas::{
    CanvasConfig, MAX_SPRITES, MAX_TILES, MAX_TILES_X, MAX_TILES_Y, MAX_VERTICES, Sprite,
    TileCanvas,
};
pub use error::{BackendError, CanvasError};
pub use geom::{Point, TileRect};
pub use headless::HeadlessBackend;
pub use sheet::{GridSheet, SheetImage, SpriteId, SpriteSheet, UvRect};
pub use vertex::Vertex;
