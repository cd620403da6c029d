//! The [`TileCanvas`]: a fixed grid of static tiles plus a handful of freely
//! positioned sprites, flattened into one vertex buffer per frame.
//!
//! Lifecycle:
//!
//! ```text
//! Uninitialized --setup(valid config)--> Valid --discard--> Uninitialized
//! ```
//!
//! Every operation other than [`setup`](TileCanvas::setup),
//! [`discard`](TileCanvas::discard) and [`is_valid`](TileCanvas::is_valid)
//! requires a valid canvas and panics otherwise.
//!
//! Vertex layout: all tile quads in row-major grid order, then all active
//! sprite quads in slot order, so sprites always draw over tiles.

use crate::backend::{CanvasResources, DrawCall, MeshSetup, RenderBackend};
use crate::error::CanvasError;
use crate::geom::{Point, TileRect};
use crate::sheet::{SpriteId, SpriteSheet};
use crate::vertex::{QuadRect, VERTICES_PER_QUAD, Vertex, VertexBuffer};

/// Maximum grid width in tiles.
pub const MAX_TILES_X: i32 = 64;
/// Maximum grid height in tiles.
pub const MAX_TILES_Y: i32 = 64;
/// Maximum number of dynamic sprite slots.
pub const MAX_SPRITES: usize = 8;
/// Maximum number of tiles.
pub const MAX_TILES: usize = (MAX_TILES_X * MAX_TILES_Y) as usize;
/// Vertex capacity: one quad per tile and per sprite.
pub const MAX_VERTICES: usize = (MAX_TILES + MAX_SPRITES) * VERTICES_PER_QUAD;

// ---------------------------------------------------------------------------
// CanvasConfig
// ---------------------------------------------------------------------------

/// Canvas geometry, fixed between `setup` and `discard`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CanvasConfig {
    /// Grid width in tiles (1..=64).
    pub tiles_x: i32,
    /// Grid height in tiles (1..=64).
    pub tiles_y: i32,
    /// Tile width in pixels.
    pub tile_width: i32,
    /// Tile height in pixels.
    pub tile_height: i32,
    /// Number of usable sprite slots (0..=8).
    pub num_sprites: usize,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            tiles_x: 32,
            tiles_y: 32,
            tile_width: 8,
            tile_height: 8,
            num_sprites: MAX_SPRITES,
        }
    }
}

impl CanvasConfig {
    pub fn new(tiles_x: i32, tiles_y: i32, tile_width: i32, tile_height: i32, num_sprites: usize) -> Self {
        Self {
            tiles_x,
            tiles_y,
            tile_width,
            tile_height,
            num_sprites,
        }
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), CanvasError> {
        fn check(field: &'static str, value: i32, min: i32, max: i32) -> Result<(), CanvasError> {
            if value < min || value > max {
                return Err(CanvasError::InvalidConfig {
                    field,
                    value,
                    min,
                    max,
                });
            }
            Ok(())
        }
        check("tiles_x", self.tiles_x, 1, MAX_TILES_X)?;
        check("tiles_y", self.tiles_y, 1, MAX_TILES_Y)?;
        check("tile_width", self.tile_width, 1, i32::MAX / MAX_TILES_X)?;
        check("tile_height", self.tile_height, 1, i32::MAX / MAX_TILES_Y)?;
        let num_sprites = i32::try_from(self.num_sprites).unwrap_or(i32::MAX);
        check("num_sprites", num_sprites, 0, MAX_SPRITES as i32)?;
        Ok(())
    }

    /// Canvas width in pixels.
    #[inline]
    pub fn canvas_width(&self) -> i32 {
        self.tiles_x * self.tile_width
    }

    /// Canvas height in pixels.
    #[inline]
    pub fn canvas_height(&self) -> i32 {
        self.tiles_y * self.tile_height
    }
}

// ---------------------------------------------------------------------------
// Sprite
// ---------------------------------------------------------------------------

/// An active dynamic sprite: a sheet sprite drawn at an explicit pixel
/// rectangle of the canvas.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sprite {
    pub id: SpriteId,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

// ---------------------------------------------------------------------------
// TileCanvas
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Active {
    config: CanvasConfig,
    resources: CanvasResources,
}

/// Fixed-grid sprite-tile canvas drawing through a [`RenderBackend`] with
/// sprites from a [`SpriteSheet`].
///
/// The canvas owns its backend resources from `setup` until `discard`;
/// dropping a valid canvas discards it.
pub struct TileCanvas<B: RenderBackend, S: SpriteSheet> {
    backend: B,
    sheet: S,
    active: Option<Active>,
    /// Row-major, `tiles_x` cells per row.
    tiles: Box<[Option<SpriteId>]>,
    sprites: [Option<Sprite>; MAX_SPRITES],
    vertices: VertexBuffer,
}

impl<B: RenderBackend, S: SpriteSheet> TileCanvas<B, S> {
    /// Create an uninitialized canvas. Storage is allocated up front at the
    /// fixed maxima; no backend resources are created until `setup`.
    pub fn new(backend: B, sheet: S) -> Self {
        Self {
            backend,
            sheet,
            active: None,
            tiles: vec![None; MAX_TILES].into_boxed_slice(),
            sprites: [None; MAX_SPRITES],
            vertices: VertexBuffer::with_capacity(MAX_VERTICES),
        }
    }

    // --- lifecycle ---

    /// Validate `config`, reset all tiles and sprite slots, and acquire the
    /// mesh, program, draw state and texture from the backend.
    ///
    /// On error the canvas stays invalid and holds no resources.
    pub fn setup(&mut self, config: CanvasConfig) -> Result<(), CanvasError> {
        if self.active.is_some() {
            return Err(CanvasError::AlreadyValid);
        }
        config.validate()?;

        let mesh = MeshSetup {
            max_vertices: MAX_VERTICES,
            vertex_stride: std::mem::size_of::<Vertex>(),
        };
        let resources = CanvasResources::acquire(&mut self.backend, &mesh, self.sheet.image())?;

        self.tiles.fill(None);
        self.sprites = [None; MAX_SPRITES];
        self.vertices.clear();
        self.active = Some(Active { config, resources });
        log::debug!(
            "canvas setup: {}x{} tiles of {}x{} px ({}x{} px), {} sprites",
            config.tiles_x,
            config.tiles_y,
            config.tile_width,
            config.tile_height,
            config.canvas_width(),
            config.canvas_height(),
            config.num_sprites
        );
        Ok(())
    }

    /// Release the backend resources. The canvas becomes invalid. Calling
    /// this on an invalid canvas does nothing.
    pub fn discard(&mut self) {
        match self.active.take() {
            Some(active) => {
                active.resources.release(&mut self.backend);
                self.vertices.clear();
                log::debug!("canvas discarded");
            }
            None => log::debug!("discard on invalid canvas ignored"),
        }
    }

    /// True between a successful `setup` and the matching `discard`.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.active.is_some()
    }

    // --- geometry ---

    /// The active configuration.
    pub fn config(&self) -> &CanvasConfig {
        &self.active().config
    }

    pub fn num_tiles_x(&self) -> i32 {
        self.config().tiles_x
    }

    pub fn num_tiles_y(&self) -> i32 {
        self.config().tiles_y
    }

    pub fn num_sprites(&self) -> usize {
        self.config().num_sprites
    }

    /// Canvas width in pixels.
    pub fn canvas_width(&self) -> i32 {
        self.config().canvas_width()
    }

    /// Canvas height in pixels.
    pub fn canvas_height(&self) -> i32 {
        self.config().canvas_height()
    }

    /// The whole grid as a tile rect.
    pub fn bounds(&self) -> TileRect {
        let c = self.config();
        TileRect::new(0, 0, c.tiles_x, c.tiles_y)
    }

    /// Restrict `tile_x` to `[0, num_tiles_x)`.
    #[inline]
    pub fn clamp_x(&self, tile_x: i32) -> i32 {
        tile_x.clamp(0, self.num_tiles_x() - 1)
    }

    /// Restrict `tile_y` to `[0, num_tiles_y)`.
    #[inline]
    pub fn clamp_y(&self, tile_y: i32) -> i32 {
        tile_y.clamp(0, self.num_tiles_y() - 1)
    }

    // --- grid ---

    /// Write a `width × height` block of tiles from a row-major character
    /// map, translating each character through the sheet's character map.
    /// Unknown characters become empty tiles. Cells falling outside the
    /// grid are dropped.
    ///
    /// Panics if `char_map` does not hold exactly `width * height`
    /// characters or if a character maps to a sprite that is not on the
    /// sheet.
    pub fn copy_char_map(&mut self, tile_x: i32, tile_y: i32, width: i32, height: i32, char_map: &str) {
        let grid = self.bounds();
        assert!(
            width >= 0 && height >= 0,
            "char map size {width}x{height} is negative"
        );
        let expected = (width as usize) * (height as usize);
        let len = char_map.chars().count();
        assert_eq!(
            len, expected,
            "char map of {width}x{height} needs {expected} characters, got {len}"
        );

        let target = TileRect::new(tile_x, tile_y, width, height);
        let clipped = grid.clip(target);
        if clipped.area() < expected {
            log::trace!(
                "char map {target} clipped to {clipped}, {} cells dropped",
                expected - clipped.area()
            );
        }

        let stride = grid.width as usize;
        for (i, ch) in char_map.chars().enumerate() {
            let x = tile_x.checked_add((i % width as usize) as i32);
            let y = tile_y.checked_add((i / width as usize) as i32);
            let (Some(x), Some(y)) = (x, y) else {
                continue;
            };
            let p = Point::new(x, y);
            if !clipped.contains(p) {
                continue;
            }
            let sprite = self.sheet.sprite_for_char(ch);
            if let Some(id) = sprite {
                self.check_sprite(id);
            }
            self.tiles[p.y as usize * stride + p.x as usize] = sprite;
        }
    }

    /// Set a single tile. `None` empties it.
    ///
    /// Panics if the coordinates are outside the grid (use
    /// [`clamp_x`](Self::clamp_x) / [`clamp_y`](Self::clamp_y) first) or if
    /// the sprite is not on the sheet.
    pub fn set_tile(&mut self, sprite: Option<SpriteId>, tile_x: i32, tile_y: i32) {
        let idx = self.tile_index(tile_x, tile_y);
        if let Some(id) = sprite {
            self.check_sprite(id);
        }
        self.tiles[idx] = sprite;
    }

    /// The sprite at a tile, or `None` for an empty tile.
    ///
    /// Panics if the coordinates are outside the grid.
    pub fn tile(&self, tile_x: i32, tile_y: i32) -> Option<SpriteId> {
        self.tiles[self.tile_index(tile_x, tile_y)]
    }

    /// Number of non-empty tiles in the grid.
    pub fn occupied_tiles(&self) -> usize {
        let c = self.config();
        self.tiles[..(c.tiles_x * c.tiles_y) as usize]
            .iter()
            .filter(|t| t.is_some())
            .count()
    }

    // --- sprites ---

    /// Overwrite sprite slot `index`. A `None` sprite deactivates the slot.
    ///
    /// Panics if `index` is not below the configured sprite count or if the
    /// sprite is not on the sheet.
    pub fn set_sprite(
        &mut self,
        index: usize,
        sprite: Option<SpriteId>,
        pixel_x: i32,
        pixel_y: i32,
        pixel_width: i32,
        pixel_height: i32,
    ) {
        let num_sprites = self.num_sprites();
        assert!(
            index < num_sprites,
            "sprite index {index} out of range (canvas has {num_sprites} sprites)"
        );
        if let Some(id) = sprite {
            self.check_sprite(id);
        }
        self.sprites[index] = sprite.map(|id| Sprite {
            id,
            x: pixel_x,
            y: pixel_y,
            width: pixel_width,
            height: pixel_height,
        });
    }

    /// The sprite in slot `index`, or `None` if the slot is inactive.
    pub fn sprite(&self, index: usize) -> Option<&Sprite> {
        let num_sprites = self.num_sprites();
        assert!(
            index < num_sprites,
            "sprite index {index} out of range (canvas has {num_sprites} sprites)"
        );
        self.sprites[index].as_ref()
    }

    /// Number of active sprite slots.
    pub fn active_sprites(&self) -> usize {
        self.sprites[..self.num_sprites()]
            .iter()
            .filter(|s| s.is_some())
            .count()
    }

    /// Empty every tile and deactivate every sprite slot. Resources are
    /// kept.
    pub fn clear(&mut self) {
        self.active();
        self.tiles.fill(None);
        self.sprites = [None; MAX_SPRITES];
    }

    // --- vertices ---

    /// Regenerate the vertex buffer from the current tiles and sprites and
    /// return it. Positions are normalized to the canvas, texture
    /// coordinates to the sheet.
    pub fn update_vertices(&mut self) -> &[Vertex] {
        let Some(active) = self.active.as_ref() else {
            panic!("canvas used before setup or after discard");
        };
        let c = active.config;
        let cw = c.canvas_width() as f32;
        let ch = c.canvas_height() as f32;
        // x + w may exceed i32
        let quad = |x: i32, y: i32, w: i32, h: i32| QuadRect {
            x0: x as f32 / cw,
            y0: y as f32 / ch,
            x1: (x as i64 + w as i64) as f32 / cw,
            y1: (y as i64 + h as i64) as f32 / ch,
        };

        self.vertices.clear();
        let stride = c.tiles_x as usize;
        for y in 0..c.tiles_y {
            let row = &self.tiles[y as usize * stride..(y as usize + 1) * stride];
            for (x, tile) in row.iter().enumerate() {
                if let Some(id) = *tile {
                    let pos = quad(
                        x as i32 * c.tile_width,
                        y * c.tile_height,
                        c.tile_width,
                        c.tile_height,
                    );
                    self.vertices.push_quad(pos, self.sheet.uv_rect(id));
                }
            }
        }
        for sprite in self.sprites[..c.num_sprites].iter().flatten() {
            let pos = quad(sprite.x, sprite.y, sprite.width, sprite.height);
            self.vertices.push_quad(pos, self.sheet.uv_rect(sprite.id));
        }
        self.vertices.as_slice()
    }

    /// Vertices produced by the last regeneration.
    pub fn vertices(&self) -> &[Vertex] {
        self.vertices.as_slice()
    }

    /// Number of vertices produced by the last regeneration.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Regenerate the vertex buffer, upload it and submit one draw.
    pub fn render(&mut self) {
        let resources = self.active().resources;
        self.update_vertices();
        let num_vertices = self.vertices.len();
        log::trace!("canvas render: {num_vertices} vertices");
        self.backend
            .update_vertices(resources.mesh, self.vertices.as_bytes());
        self.backend.draw(&DrawCall {
            draw_state: resources.draw_state,
            texture: resources.texture,
            num_vertices,
        });
    }

    // --- collaborators ---

    pub fn sheet(&self) -> &S {
        &self.sheet
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Handles held while valid.
    pub fn resources(&self) -> Option<CanvasResources> {
        self.active.as_ref().map(|a| a.resources)
    }

    // --- internals ---

    fn active(&self) -> &Active {
        match self.active.as_ref() {
            Some(a) => a,
            None => panic!("canvas used before setup or after discard"),
        }
    }

    fn tile_index(&self, tile_x: i32, tile_y: i32) -> usize {
        let c = self.config();
        assert!(
            (0..c.tiles_x).contains(&tile_x) && (0..c.tiles_y).contains(&tile_y),
            "tile ({tile_x}, {tile_y}) outside {}x{} grid",
            c.tiles_x,
            c.tiles_y
        );
        tile_y as usize * c.tiles_x as usize + tile_x as usize
    }

    fn check_sprite(&self, id: SpriteId) {
        assert!(
            self.sheet.contains(id),
            "sprite {} not on sheet ({} sprites)",
            id.0,
            self.sheet.len()
        );
    }
}

impl<B: RenderBackend, S: SpriteSheet> Drop for TileCanvas<B, S> {
    fn drop(&mut self) {
        if self.active.is_some() {
            self.discard();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::backend::{DrawStateId, MeshId, ProgramId, Resource, TextureId};
    use crate::error::BackendError;
    use crate::headless::{HeadlessBackend, ResourceKind};
    use crate::sheet::{GridSheet, SheetImage};

    const WALL: SpriteId = SpriteId(0);
    const DOT: SpriteId = SpriteId(1);
    const PILL: SpriteId = SpriteId(2);
    const PLAYER: SpriteId = SpriteId(4);

    /// 4×2 sheet of 8×8 sprites; '#', '.', 'o' map to ids 0..3.
    fn sheet() -> GridSheet {
        let image = SheetImage::from_fn(32, 16, |_, _| [255; 4]);
        GridSheet::new(image, 8, 8)
            .unwrap()
            .with_chars("#.o", WALL)
    }

    fn canvas(tiles_x: i32, tiles_y: i32, num_sprites: usize) -> TileCanvas<HeadlessBackend, GridSheet> {
        let mut c = TileCanvas::new(HeadlessBackend::new(), sheet());
        c.setup(CanvasConfig::new(tiles_x, tiles_y, 16, 16, num_sprites))
            .unwrap();
        c
    }

    #[test]
    fn setup_and_discard() {
        let mut c = TileCanvas::new(HeadlessBackend::new(), sheet());
        assert!(!c.is_valid());
        c.setup(CanvasConfig::new(64, 64, 8, 8, 8)).unwrap();
        assert!(c.is_valid());
        assert_eq!(c.backend().live_resources(), 4);
        assert_eq!((c.canvas_width(), c.canvas_height()), (512, 512));
        c.discard();
        assert!(!c.is_valid());
        assert_eq!(c.backend().live_resources(), 0);
        // second discard is a no-op
        c.discard();
        assert!(!c.is_valid());
    }

    #[test]
    fn setup_rejects_out_of_range_config() {
        let mut c = TileCanvas::new(HeadlessBackend::new(), sheet());
        for cfg in [
            CanvasConfig::new(65, 10, 8, 8, 0),
            CanvasConfig::new(10, 65, 8, 8, 0),
            CanvasConfig::new(0, 10, 8, 8, 0),
            CanvasConfig::new(10, 10, 0, 8, 0),
            CanvasConfig::new(10, 10, 8, 8, 9),
        ] {
            assert!(matches!(
                c.setup(cfg),
                Err(CanvasError::InvalidConfig { .. })
            ));
            assert!(!c.is_valid());
            assert_eq!(c.backend().live_resources(), 0);
        }
    }

    #[test]
    fn setup_twice_is_an_error() {
        let mut c = canvas(4, 4, 1);
        assert_eq!(
            c.setup(CanvasConfig::new(4, 4, 8, 8, 1)),
            Err(CanvasError::AlreadyValid)
        );
        assert!(c.is_valid());
    }

    #[test]
    fn backend_failure_leaves_canvas_invalid() {
        let mut be = HeadlessBackend::new();
        be.fail_on(ResourceKind::Texture);
        let mut c = TileCanvas::new(be, sheet());
        let err = c.setup(CanvasConfig::default()).unwrap_err();
        assert!(matches!(err, CanvasError::Backend(_)));
        assert!(!c.is_valid());
        assert_eq!(c.backend().live_resources(), 0);
        // a retry succeeds once the backend recovers
        c.setup(CanvasConfig::default()).unwrap();
        assert!(c.is_valid());
    }

    #[test]
    fn setup_resets_state() {
        let mut c = canvas(4, 4, 2);
        c.set_tile(Some(WALL), 1, 1);
        c.set_sprite(0, Some(PLAYER), 0, 0, 8, 8);
        c.discard();
        c.setup(CanvasConfig::new(4, 4, 8, 8, 2)).unwrap();
        assert_eq!(c.tile(1, 1), None);
        assert_eq!(c.sprite(0), None);
    }

    #[test]
    fn clamp_stays_in_grid_and_is_idempotent() {
        let c = canvas(10, 5, 0);
        for v in -100..100 {
            let x = c.clamp_x(v);
            let y = c.clamp_y(v);
            assert!((0..10).contains(&x));
            assert!((0..5).contains(&y));
            assert_eq!(c.clamp_x(x), x);
            assert_eq!(c.clamp_y(y), y);
        }
        assert_eq!(c.clamp_x(-3), 0);
        assert_eq!(c.clamp_x(42), 9);
        assert_eq!(c.clamp_y(4), 4);
    }

    #[test]
    fn single_tile_produces_one_quad() {
        let mut c = canvas(10, 10, 0);
        c.set_tile(Some(DOT), 3, 2);
        c.render();
        let v = c.vertices();
        assert_eq!(v.len(), 6);
        // tile (3,2) of 16 px in a 160 px canvas
        assert_eq!(v[0], Vertex::new(0.3, 0.2, 0.25, 0.0));
        assert_eq!(v[2], Vertex::new(0.4, 0.3, 0.5, 0.5));
        let rec = c.backend().last_draw().unwrap();
        assert_eq!(rec.call.num_vertices, 6);
        assert_eq!(rec.vertices, v.to_vec());
    }

    #[test]
    fn empty_tile_draws_nothing() {
        let mut c = canvas(4, 4, 0);
        c.set_tile(Some(WALL), 0, 0);
        c.set_tile(None, 0, 0);
        c.render();
        assert_eq!(c.num_vertices(), 0);
        assert_eq!(c.backend().last_draw().unwrap().call.num_vertices, 0);
    }

    #[test]
    fn sprite_deactivate_and_restore() {
        let mut c = canvas(4, 4, 2);
        c.set_sprite(1, Some(PLAYER), 4, 4, 16, 16);
        assert_eq!(c.update_vertices().len(), 6);
        c.set_sprite(1, None, 0, 0, 0, 0);
        assert_eq!(c.update_vertices().len(), 0);
        c.set_sprite(1, Some(PLAYER), 8, 0, 16, 16);
        assert_eq!(c.update_vertices().len(), 6);
        assert_eq!(c.vertices()[0].x, 8.0 / 64.0);
        assert_eq!(c.active_sprites(), 1);
    }

    #[test]
    fn copy_char_map_inside_bounds() {
        let mut c = canvas(10, 10, 0);
        c.copy_char_map(2, 3, 3, 3, "#.#.o.#.#");
        let expect = [
            [Some(WALL), Some(DOT), Some(WALL)],
            [Some(DOT), Some(PILL), Some(DOT)],
            [Some(WALL), Some(DOT), Some(WALL)],
        ];
        for (dy, row) in expect.iter().enumerate() {
            for (dx, want) in row.iter().enumerate() {
                assert_eq!(c.tile(2 + dx as i32, 3 + dy as i32), *want);
            }
        }
        assert_eq!(c.occupied_tiles(), 9);
    }

    #[test]
    fn copy_char_map_drops_out_of_bounds_columns() {
        let mut c = canvas(10, 10, 0);
        // columns 10 and 11 fall outside the grid
        c.copy_char_map(9, 0, 3, 3, "#..o##.o.");
        assert_eq!(c.tile(9, 0), Some(WALL));
        assert_eq!(c.tile(9, 1), Some(PILL));
        assert_eq!(c.tile(9, 2), Some(DOT));
        assert_eq!(c.occupied_tiles(), 3);
        // row 0 must not wrap into row 1
        assert_eq!(c.tile(0, 1), None);
        assert_eq!(c.tile(1, 1), None);
    }

    #[test]
    fn copy_char_map_negative_origin() {
        let mut c = canvas(4, 4, 0);
        c.copy_char_map(-1, -1, 2, 2, "...#");
        assert_eq!(c.tile(0, 0), Some(WALL));
        assert_eq!(c.occupied_tiles(), 1);
    }

    #[test]
    fn unknown_chars_are_empty() {
        let mut c = canvas(4, 4, 0);
        c.set_tile(Some(WALL), 1, 0);
        c.copy_char_map(0, 0, 2, 1, "? ");
        assert_eq!(c.tile(0, 0), None);
        assert_eq!(c.tile(1, 0), None);
    }

    #[test]
    fn tiles_are_ordered_before_sprites() {
        let mut c = canvas(8, 8, 3);
        c.set_sprite(0, Some(PLAYER), 0, 0, 16, 16);
        c.set_tile(Some(WALL), 7, 7);
        c.set_sprite(2, Some(PLAYER), 32, 32, 16, 16);
        c.set_tile(Some(DOT), 0, 0);
        let v = c.update_vertices();
        assert_eq!(v.len(), 24);
        let wall = sheet().uv_rect(WALL);
        let dot = sheet().uv_rect(DOT);
        let player = sheet().uv_rect(PLAYER);
        assert_eq!((v[0].u, v[0].v), (dot.u0, dot.v0));
        assert_eq!((v[6].u, v[6].v), (wall.u0, wall.v0));
        assert_eq!((v[12].u, v[12].v), (player.u0, player.v0));
        assert_eq!((v[18].x, v[18].y), (0.25, 0.25));
    }

    #[test]
    fn vertex_count_matches_occupancy() {
        let mut c = canvas(64, 64, 8);
        for y in 0..64 {
            for x in 0..64 {
                c.set_tile(Some(SpriteId(((x + y) % 8) as u16)), x, y);
            }
        }
        for i in 0..8 {
            c.set_sprite(i, Some(PLAYER), 0, 0, 8, 8);
        }
        c.render();
        assert_eq!(c.num_vertices(), MAX_VERTICES);
        assert_eq!(
            c.num_vertices(),
            6 * (c.occupied_tiles() + c.active_sprites())
        );
    }

    #[test]
    fn regeneration_is_idempotent() {
        let mut c = canvas(6, 6, 1);
        c.copy_char_map(0, 0, 3, 2, "#.o.#.");
        c.set_sprite(0, Some(PLAYER), 5, 7, 9, 11);
        let first = c.update_vertices().to_vec();
        let second = c.update_vertices().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn clear_keeps_resources() {
        let mut c = canvas(4, 4, 1);
        c.set_tile(Some(WALL), 0, 0);
        c.set_sprite(0, Some(PLAYER), 0, 0, 8, 8);
        c.clear();
        assert_eq!(c.update_vertices().len(), 0);
        assert!(c.is_valid());
        assert_eq!(c.backend().live_resources(), 4);
    }

    #[test]
    fn copy_char_map_near_coordinate_limit_is_dropped() {
        let mut c = canvas(10, 10, 0);
        c.copy_char_map(i32::MAX - 1, 0, 3, 1, "###");
        c.copy_char_map(0, i32::MAX - 1, 1, 3, "###");
        assert_eq!(c.occupied_tiles(), 0);
    }

    #[test]
    fn sprite_near_coordinate_limit_renders() {
        let mut c = canvas(4, 4, 1);
        c.set_sprite(0, Some(PLAYER), i32::MAX - 4, i32::MIN, 16, 16);
        c.render();
        assert_eq!(c.num_vertices(), 6);
        let v = c.vertices();
        assert!(v[1].x > 1.0);
        assert!(v[0].y < 0.0);
    }

    /// Sheet whose character map points past its own sprites.
    struct BrokenSheet(GridSheet);

    impl SpriteSheet for BrokenSheet {
        fn len(&self) -> usize {
            self.0.len()
        }
        fn sprite_for_char(&self, ch: char) -> Option<SpriteId> {
            (ch == '!').then_some(SpriteId(200))
        }
        fn uv_rect(&self, id: SpriteId) -> crate::sheet::UvRect {
            self.0.uv_rect(id)
        }
        fn image(&self) -> &SheetImage {
            self.0.image()
        }
    }

    #[test]
    #[should_panic(expected = "sprite 200 not on sheet")]
    fn char_map_to_unknown_sprite_panics() {
        let mut c = TileCanvas::new(HeadlessBackend::new(), BrokenSheet(sheet()));
        c.setup(CanvasConfig::new(4, 4, 8, 8, 0)).unwrap();
        c.copy_char_map(0, 0, 2, 1, ".!");
    }

    /// Backend handle that stays inspectable after the canvas is dropped.
    struct Shared(Rc<RefCell<HeadlessBackend>>);

    impl RenderBackend for Shared {
        fn create_mesh(&mut self, setup: &MeshSetup) -> Result<MeshId, BackendError> {
            self.0.borrow_mut().create_mesh(setup)
        }
        fn create_program(&mut self) -> Result<ProgramId, BackendError> {
            self.0.borrow_mut().create_program()
        }
        fn create_draw_state(
            &mut self,
            mesh: MeshId,
            program: ProgramId,
        ) -> Result<DrawStateId, BackendError> {
            self.0.borrow_mut().create_draw_state(mesh, program)
        }
        fn create_texture(&mut self, image: &SheetImage) -> Result<TextureId, BackendError> {
            self.0.borrow_mut().create_texture(image)
        }
        fn destroy(&mut self, resource: Resource) {
            self.0.borrow_mut().destroy(resource)
        }
        fn update_vertices(&mut self, mesh: MeshId, data: &[u8]) {
            self.0.borrow_mut().update_vertices(mesh, data)
        }
        fn draw(&mut self, call: &DrawCall) {
            self.0.borrow_mut().draw(call)
        }
    }

    #[test]
    fn drop_releases_resources() {
        let be = Rc::new(RefCell::new(HeadlessBackend::new()));
        {
            let mut c = TileCanvas::new(Shared(Rc::clone(&be)), sheet());
            c.setup(CanvasConfig::default()).unwrap();
            c.set_tile(Some(WALL), 0, 0);
            c.render();
            assert_eq!(be.borrow().live_resources(), 4);
        }
        assert_eq!(be.borrow().live_resources(), 0);
        assert_eq!(be.borrow().draws().len(), 1);
    }

    #[test]
    #[should_panic(expected = "outside 10x10 grid")]
    fn set_tile_out_of_range_panics() {
        let mut c = canvas(10, 10, 0);
        c.set_tile(Some(WALL), 10, 0);
    }

    #[test]
    #[should_panic(expected = "sprite index 2 out of range")]
    fn set_sprite_out_of_range_panics() {
        let mut c = canvas(4, 4, 2);
        c.set_sprite(2, Some(PLAYER), 0, 0, 8, 8);
    }

    #[test]
    #[should_panic(expected = "not on sheet")]
    fn unknown_sprite_panics() {
        let mut c = canvas(4, 4, 0);
        c.set_tile(Some(SpriteId(99)), 0, 0);
    }

    #[test]
    #[should_panic(expected = "needs 4 characters, got 3")]
    fn short_char_map_panics() {
        let mut c = canvas(4, 4, 0);
        c.copy_char_map(0, 0, 2, 2, "###");
    }

    #[test]
    #[should_panic(expected = "before setup or after discard")]
    fn render_before_setup_panics() {
        let mut c = TileCanvas::new(HeadlessBackend::new(), sheet());
        c.render();
    }

    #[test]
    #[should_panic(expected = "before setup or after discard")]
    fn mutation_after_discard_panics() {
        let mut c = canvas(4, 4, 0);
        c.discard();
        c.set_tile(Some(WALL), 0, 0);
    }
}
