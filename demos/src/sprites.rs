//! The demo sprite sheet.
//!
//! Sprites are 8×8 pixel-art patterns embedded as strings; each character
//! is a palette entry and `.` is transparent. The sheet is laid out as one
//! row of [`SHEET_COLUMNS`] sprites.

use spritecanvas_core::{CanvasError, GridSheet, SheetImage, SpriteId};

/// Sprite edge length in pixels.
pub const SPRITE_SIZE: u32 = 8;
/// Sprites per sheet row.
pub const SHEET_COLUMNS: u32 = 8;

pub const WALL: SpriteId = SpriteId(0);
pub const DOT: SpriteId = SpriteId(1);
pub const PILL: SpriteId = SpriteId(2);
pub const DOOR: SpriteId = SpriteId(3);
pub const PLAYER: SpriteId = SpriteId(4);
pub const GHOST_RED: SpriteId = SpriteId(5);
pub const GHOST_PINK: SpriteId = SpriteId(6);
pub const GHOST_CYAN: SpriteId = SpriteId(7);

/// Character map used by the maze text.
pub const CHAR_MAP: [(char, SpriteId); 4] = [('#', WALL), ('.', DOT), ('o', PILL), ('-', DOOR)];

const PATTERNS: [[&str; 8]; 8] = [
    // WALL
    [
        "BBBBBBBB", "B......B", "B.BBBB.B", "B.B..B.B", "B.B..B.B", "B.BBBB.B", "B......B",
        "BBBBBBBB",
    ],
    // DOT
    [
        "........", "........", "........", "...WW...", "...WW...", "........", "........",
        "........",
    ],
    // PILL
    [
        "........", "..WWWW..", ".WWWWWW.", ".WWWWWW.", ".WWWWWW.", ".WWWWWW.", "..WWWW..",
        "........",
    ],
    // DOOR
    [
        "........", "........", "........", "PPPPPPPP", "PPPPPPPP", "........", "........",
        "........",
    ],
    // PLAYER
    [
        "..YYYY..", ".YYYYYY.", "YYYYY...", "YYYY....", "YYYY....", "YYYYY...", ".YYYYYY.",
        "..YYYY..",
    ],
    // GHOST_RED
    [
        "..RRRR..", ".RRRRRR.", "RREERREE", "RRKERRKE", "RRRRRRRR", "RRRRRRRR", "RRRRRRRR",
        "R.RR.RR.",
    ],
    // GHOST_PINK
    [
        "..PPPP..", ".PPPPPP.", "PPEEPPEE", "PPKEPPKE", "PPPPPPPP", "PPPPPPPP", "PPPPPPPP",
        "P.PP.PP.",
    ],
    // GHOST_CYAN
    [
        "..CCCC..", ".CCCCCC.", "CCEECCEE", "CCKECCKE", "CCCCCCCC", "CCCCCCCC", "CCCCCCCC",
        "C.CC.CC.",
    ],
];

fn palette(ch: u8) -> [u8; 4] {
    match ch {
        b'B' => [33, 33, 222, 255],
        b'W' => [255, 184, 151, 255],
        b'Y' => [255, 255, 0, 255],
        b'R' => [255, 0, 0, 255],
        b'P' => [255, 184, 255, 255],
        b'C' => [0, 255, 255, 255],
        b'E' => [222, 222, 255, 255],
        b'K' => [33, 33, 222, 255],
        _ => [0, 0, 0, 0],
    }
}

/// Rasterize the patterns into an RGBA sheet image.
pub fn sheet_image() -> SheetImage {
    let rows = (PATTERNS.len() as u32).div_ceil(SHEET_COLUMNS);
    SheetImage::from_fn(SHEET_COLUMNS * SPRITE_SIZE, rows * SPRITE_SIZE, |x, y| {
        let index = (y / SPRITE_SIZE) * SHEET_COLUMNS + x / SPRITE_SIZE;
        PATTERNS
            .get(index as usize)
            .and_then(|p| p[(y % SPRITE_SIZE) as usize].as_bytes().get((x % SPRITE_SIZE) as usize))
            .map_or([0; 4], |&ch| palette(ch))
    })
}

/// The demo sheet with its character map.
pub fn build_sheet() -> Result<GridSheet, CanvasError> {
    let mut sheet = GridSheet::new(sheet_image(), SPRITE_SIZE, SPRITE_SIZE)?;
    for (ch, id) in CHAR_MAP {
        sheet.map_char(ch, id);
    }
    Ok(sheet)
}
