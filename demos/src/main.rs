//! Maze demo (wgpu window).

use std::time::Duration;

use spritecanvas_core::{CanvasConfig, CanvasError, GridSheet};
use spritecanvas_demos::maze::{MAZE_HEIGHT, MAZE_WIDTH};
use spritecanvas_demos::sprites::{self, SPRITE_SIZE};
use spritecanvas_demos::world::World;
use spritecanvas_wgpu::{Scene, WgpuCanvas, WgpuConfig, WgpuDriver};

const TICK: Duration = Duration::from_micros(16_667);
// Cap catch-up after a stall.
const MAX_TICKS_PER_FRAME: u32 = 8;

struct MazeScene {
    world: World,
    pending: Duration,
}

impl Scene for MazeScene {
    type Sheet = GridSheet;

    fn canvas_config(&self) -> CanvasConfig {
        let size = SPRITE_SIZE as i32;
        CanvasConfig::new(MAZE_WIDTH, MAZE_HEIGHT, size, size, self.world.num_sprites())
    }

    fn build_sheet(&mut self) -> Result<GridSheet, CanvasError> {
        sprites::build_sheet()
    }

    fn start(&mut self, canvas: &mut WgpuCanvas<GridSheet>) {
        self.world.reset_level(canvas);
        self.world.sync_sprites(canvas);
    }

    fn frame(&mut self, canvas: &mut WgpuCanvas<GridSheet>, dt: Duration) -> bool {
        self.pending += dt;
        let mut ticks = 0;
        while self.pending >= TICK && ticks < MAX_TICKS_PER_FRAME {
            self.pending -= TICK;
            self.world.step(canvas);
            ticks += 1;
        }
        if ticks == MAX_TICKS_PER_FRAME {
            self.pending = Duration::ZERO;
        }
        self.world.sync_sprites(canvas);
        true
    }
}

fn main() {
    env_logger::init();

    let seed = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0x5eed);
    let scene = MazeScene {
        world: World::new(seed),
        pending: Duration::ZERO,
    };
    let driver = WgpuDriver::new(WgpuConfig {
        title: "spritecanvas maze".into(),
        ..Default::default()
    });

    if let Err(e) = driver.run(scene) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
