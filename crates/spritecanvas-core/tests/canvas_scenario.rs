use spritecanvas_core::{
    CanvasConfig, GridSheet, HeadlessBackend, SheetImage, SpriteId, SpriteSheet, TileCanvas,
};

const SPRITE_A: SpriteId = SpriteId(0);
const SPRITE_B: SpriteId = SpriteId(1);
const SPRITE_C: SpriteId = SpriteId(2);

fn sheet() -> GridSheet {
    let image = SheetImage::from_fn(48, 16, |x, _| [(x * 5) as u8, 0, 0, 255]);
    GridSheet::new(image, 16, 16).unwrap()
}

#[test]
fn two_tiles_and_one_sprite() {
    let mut canvas = TileCanvas::new(HeadlessBackend::new(), sheet());
    canvas
        .setup(CanvasConfig::new(10, 10, 16, 16, 2))
        .unwrap();
    assert!(canvas.is_valid());

    canvas.set_tile(Some(SPRITE_A), 0, 0);
    canvas.set_tile(Some(SPRITE_B), 9, 9);
    canvas.set_sprite(0, Some(SPRITE_C), 5, 5, 16, 16);
    canvas.render();

    let draw = canvas.backend().last_draw().unwrap();
    assert_eq!(draw.call.num_vertices, 18);
    let v = &draw.vertices;
    assert_eq!(v.len(), 18);

    let uv = |id| canvas.sheet().uv_rect(id);
    // tile A at the origin
    assert_eq!((v[0].x, v[0].y), (0.0, 0.0));
    assert_eq!((v[0].u, v[0].v), (uv(SPRITE_A).u0, uv(SPRITE_A).v0));
    // tile B in the bottom-right cell
    assert_eq!((v[6].x, v[6].y), (0.9, 0.9));
    assert_eq!((v[8].x, v[8].y), (1.0, 1.0));
    assert_eq!((v[6].u, v[6].v), (uv(SPRITE_B).u0, uv(SPRITE_B).v0));
    // sprite C last, at pixel (5, 5) of a 160 px canvas
    assert_eq!((v[12].x, v[12].y), (5.0 / 160.0, 5.0 / 160.0));
    assert_eq!((v[12].u, v[12].v), (uv(SPRITE_C).u0, uv(SPRITE_C).v0));

    canvas.discard();
    assert!(!canvas.is_valid());
    assert_eq!(canvas.backend().live_resources(), 0);
}

#[test]
fn char_map_level_with_sprites() {
    let sheet = sheet().with_char('#', SPRITE_A).with_char('.', SPRITE_B);
    let mut canvas = TileCanvas::new(HeadlessBackend::new(), sheet);
    canvas.setup(CanvasConfig::new(5, 3, 8, 8, 1)).unwrap();

    let level = concat!("#####", "#...#", "#####");
    canvas.copy_char_map(0, 0, 5, 3, level);
    canvas.set_sprite(0, Some(SPRITE_C), 8, 8, 8, 8);
    canvas.render();
    assert_eq!(canvas.num_vertices(), 6 * (15 + 1));

    // next frame: sprite hidden
    canvas.set_sprite(0, None, 0, 0, 0, 0);
    canvas.render();
    assert_eq!(canvas.num_vertices(), 6 * 15);
    assert_eq!(canvas.backend().draws().len(), 2);
}
