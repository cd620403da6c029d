//! Sprite sheets: sprite identifiers, texture-coordinate lookup and the
//! character map.
//!
//! The canvas never owns pixel data decisions. It asks a [`SpriteSheet`]
//! which sprite a map character stands for and where a sprite lives on the
//! sheet texture. [`GridSheet`] is the stock implementation for sheets laid
//! out as a regular grid of equally sized sprites.

use std::collections::HashMap;

use crate::error::CanvasError;

// ---------------------------------------------------------------------------
// SpriteId / UvRect
// ---------------------------------------------------------------------------

/// Opaque key into a sprite sheet.
///
/// "No sprite" is expressed as `Option<SpriteId>::None`, never as a magic
/// value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpriteId(pub u16);

impl SpriteId {
    /// Index of the sprite on its sheet.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Normalized texture-coordinate rectangle of a sprite on its sheet.
/// `(u0, v0)` is the top-left corner, `(u1, v1)` the bottom-right.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

// ---------------------------------------------------------------------------
// SheetImage
// ---------------------------------------------------------------------------

/// RGBA8 pixels of a sprite sheet, row-major, 4 bytes per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl SheetImage {
    /// Wrap raw RGBA8 pixels. Fails if the buffer length does not match
    /// `width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, CanvasError> {
        if width == 0 || height == 0 || pixels.len() != (width as usize) * (height as usize) * 4 {
            return Err(CanvasError::InvalidImage {
                width,
                height,
                len: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn<F: FnMut(u32, u32) -> [u8; 4]>(width: u32, height: u32, mut f: F) -> Self {
        let mut pixels = Vec::with_capacity((width as usize) * (height as usize) * 4);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 bytes.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        let p = &self.pixels[i..i + 4];
        Some([p[0], p[1], p[2], p[3]])
    }
}

// ---------------------------------------------------------------------------
// SpriteSheet
// ---------------------------------------------------------------------------

/// Read-only sprite lookups used by the canvas.
///
/// Implementations are pure: the same input always yields the same output.
pub trait SpriteSheet {
    /// Number of sprites on the sheet. Valid ids are `0..len()`.
    fn len(&self) -> usize;

    /// Whether the sheet has no sprites.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` names a sprite on this sheet.
    fn contains(&self, id: SpriteId) -> bool {
        id.index() < self.len()
    }

    /// Sprite drawn for a character-map character, or `None` if the
    /// character has no mapping (rendered as an empty tile).
    fn sprite_for_char(&self, ch: char) -> Option<SpriteId>;

    /// Texture coordinates of `id`. Only called with ids for which
    /// [`contains`](SpriteSheet::contains) is true.
    fn uv_rect(&self, id: SpriteId) -> UvRect;

    /// Pixels uploaded as the canvas texture.
    fn image(&self) -> &SheetImage;
}

// ---------------------------------------------------------------------------
// GridSheet
// ---------------------------------------------------------------------------

/// A sheet cut into a regular grid of `sprite_width × sprite_height` cells.
///
/// Sprite ids are assigned row-major: id 0 is the top-left cell, id 1 the
/// cell to its right, and so on.
#[derive(Clone, Debug)]
pub struct GridSheet {
    image: SheetImage,
    sprite_width: u32,
    sprite_height: u32,
    columns: u32,
    rows: u32,
    char_map: HashMap<char, SpriteId>,
}

impl GridSheet {
    /// Cut `image` into sprites of the given size. Partial cells at the
    /// right and bottom edges are ignored.
    pub fn new(image: SheetImage, sprite_width: u32, sprite_height: u32) -> Result<Self, CanvasError> {
        if sprite_width == 0
            || sprite_height == 0
            || sprite_width > image.width()
            || sprite_height > image.height()
        {
            return Err(CanvasError::InvalidSpriteSize {
                width: sprite_width,
                height: sprite_height,
            });
        }
        let columns = image.width() / sprite_width;
        let rows = image.height() / sprite_height;
        if (columns * rows) as usize > u16::MAX as usize + 1 {
            return Err(CanvasError::InvalidSpriteSize {
                width: sprite_width,
                height: sprite_height,
            });
        }
        Ok(Self {
            image,
            sprite_width,
            sprite_height,
            columns,
            rows,
            char_map: HashMap::new(),
        })
    }

    /// Map `ch` to `id` (builder). A later mapping for the same character
    /// replaces the earlier one.
    pub fn with_char(mut self, ch: char, id: SpriteId) -> Self {
        self.map_char(ch, id);
        self
    }

    /// Map each character of `chars` to consecutive ids starting at
    /// `first` (builder).
    pub fn with_chars(mut self, chars: &str, first: SpriteId) -> Self {
        for (i, ch) in chars.chars().enumerate() {
            self.map_char(ch, SpriteId(first.0 + i as u16));
        }
        self
    }

    /// Map `ch` to `id`.
    ///
    /// Panics if `id` is not on the sheet.
    pub fn map_char(&mut self, ch: char, id: SpriteId) {
        assert!(
            self.contains(id),
            "sprite {} not on sheet ({} sprites)",
            id.0,
            self.len()
        );
        self.char_map.insert(ch, id);
    }

    /// Size of a single sprite in pixels.
    #[inline]
    pub fn sprite_size(&self) -> (u32, u32) {
        (self.sprite_width, self.sprite_height)
    }

    /// Sheet layout in sprites (columns, rows).
    #[inline]
    pub fn grid_size(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    /// Pixel rectangle `(x, y, w, h)` of `id` on the sheet image.
    pub fn pixel_rect(&self, id: SpriteId) -> (u32, u32, u32, u32) {
        let i = id.0 as u32;
        let x = (i % self.columns) * self.sprite_width;
        let y = (i / self.columns) * self.sprite_height;
        (x, y, self.sprite_width, self.sprite_height)
    }
}

impl SpriteSheet for GridSheet {
    fn len(&self) -> usize {
        (self.columns * self.rows) as usize
    }

    fn sprite_for_char(&self, ch: char) -> Option<SpriteId> {
        self.char_map.get(&ch).copied()
    }

    fn uv_rect(&self, id: SpriteId) -> UvRect {
        let (x, y, w, h) = self.pixel_rect(id);
        let iw = self.image.width() as f32;
        let ih = self.image.height() as f32;
        UvRect {
            u0: x as f32 / iw,
            v0: y as f32 / ih,
            u1: (x + w) as f32 / iw,
            v1: (y + h) as f32 / ih,
        }
    }

    fn image(&self) -> &SheetImage {
        &self.image
    }
}
