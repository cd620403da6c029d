//! Wandering actors on the maze, mirrored into canvas sprites.
//!
//! Actors move one pixel per tick. At every tile center they pick a new
//! direction among the open ones, never reversing unless stuck. The player
//! clears dots from the canvas tiles it passes over; when the last one is
//! gone the level text is copied back in.

use rand::rngs::SmallRng;
use rand::{RngExt, SeedableRng};

use spritecanvas_core::{Point, RenderBackend, SpriteId, SpriteSheet, TileCanvas};

use crate::maze::{MAZE, MAZE_HEIGHT, MAZE_WIDTH, Maze};
use crate::sprites::{DOT, GHOST_CYAN, GHOST_PINK, GHOST_RED, PILL, PLAYER, SPRITE_SIZE};

const TILE: i32 = SPRITE_SIZE as i32;

/// Movement direction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dir {
    Up,
    Right,
    Down,
    Left,
}

impl Dir {
    pub const ALL: [Dir; 4] = [Dir::Up, Dir::Right, Dir::Down, Dir::Left];

    pub fn delta(self) -> Point {
        match self {
            Dir::Up => Point::new(0, -1),
            Dir::Right => Point::new(1, 0),
            Dir::Down => Point::new(0, 1),
            Dir::Left => Point::new(-1, 0),
        }
    }

    pub fn reverse(self) -> Dir {
        match self {
            Dir::Up => Dir::Down,
            Dir::Right => Dir::Left,
            Dir::Down => Dir::Up,
            Dir::Left => Dir::Right,
        }
    }
}

/// A sprite moving through the maze.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub sprite: SpriteId,
    /// Top-left corner in canvas pixels.
    pub pos: Point,
    pub dir: Dir,
}

impl Actor {
    fn at_tile(sprite: SpriteId, tile: Point, dir: Dir) -> Self {
        Self {
            sprite,
            pos: Point::new(tile.x * TILE, tile.y * TILE),
            dir,
        }
    }

    /// Whether the actor sits exactly on a tile.
    pub fn aligned(&self) -> bool {
        self.pos.x % TILE == 0 && self.pos.y % TILE == 0
    }

    /// The tile containing the actor's top-left corner.
    pub fn tile(&self) -> Point {
        Point::new(self.pos.x.div_euclid(TILE), self.pos.y.div_euclid(TILE))
    }
}

/// Demo state: the maze, the player and the ghosts.
pub struct World {
    maze: Maze,
    rng: SmallRng,
    player: Actor,
    ghosts: Vec<Actor>,
    food_left: usize,
    levels_cleared: u32,
}

impl World {
    pub fn new(seed: u64) -> Self {
        let maze = Maze::new();
        let food_left = maze.food_count();
        Self {
            maze,
            rng: SmallRng::seed_from_u64(seed),
            player: Actor::at_tile(PLAYER, Point::new(9, 13), Dir::Left),
            ghosts: vec![
                Actor::at_tile(GHOST_RED, Point::new(9, 9), Dir::Left),
                Actor::at_tile(GHOST_PINK, Point::new(1, 1), Dir::Right),
                Actor::at_tile(GHOST_CYAN, Point::new(17, 1), Dir::Left),
            ],
            food_left,
            levels_cleared: 0,
        }
    }

    /// Sprite slots used: the player plus one per ghost.
    pub fn num_sprites(&self) -> usize {
        1 + self.ghosts.len()
    }

    pub fn player(&self) -> &Actor {
        &self.player
    }

    pub fn ghosts(&self) -> &[Actor] {
        &self.ghosts
    }

    pub fn food_left(&self) -> usize {
        self.food_left
    }

    pub fn levels_cleared(&self) -> u32 {
        self.levels_cleared
    }

    /// Copy the level text into the canvas grid.
    pub fn reset_level<B: RenderBackend, S: SpriteSheet>(&mut self, canvas: &mut TileCanvas<B, S>) {
        canvas.copy_char_map(0, 0, MAZE_WIDTH, MAZE_HEIGHT, MAZE);
        self.food_left = self.maze.food_count();
        log::info!("level reset, {} dots", self.food_left);
    }

    /// Advance one tick.
    pub fn step<B: RenderBackend, S: SpriteSheet>(&mut self, canvas: &mut TileCanvas<B, S>) {
        let player = self.player;
        if player.aligned() {
            let tile = player.tile();
            let (x, y) = (canvas.clamp_x(tile.x), canvas.clamp_y(tile.y));
            if matches!(canvas.tile(x, y), Some(id) if id == DOT || id == PILL) {
                canvas.set_tile(None, x, y);
                self.food_left = self.food_left.saturating_sub(1);
            }
        }
        self.player = self.advance(player, true, canvas);

        for i in 0..self.ghosts.len() {
            let ghost = self.ghosts[i];
            self.ghosts[i] = self.advance(ghost, false, canvas);
        }

        if self.food_left == 0 {
            self.levels_cleared += 1;
            self.reset_level(canvas);
        }
    }

    /// Write every actor into its sprite slot.
    pub fn sync_sprites<B: RenderBackend, S: SpriteSheet>(&self, canvas: &mut TileCanvas<B, S>) {
        let actors = std::iter::once(&self.player).chain(self.ghosts.iter());
        for (slot, actor) in actors.enumerate() {
            canvas.set_sprite(
                slot,
                Some(actor.sprite),
                actor.pos.x,
                actor.pos.y,
                TILE,
                TILE,
            );
        }
    }

    fn advance<B: RenderBackend, S: SpriteSheet>(
        &mut self,
        mut actor: Actor,
        hungry: bool,
        canvas: &TileCanvas<B, S>,
    ) -> Actor {
        if actor.aligned() {
            actor.dir = self.choose_dir(&actor, hungry, canvas);
        }
        let tile = actor.tile();
        if actor.aligned() && !self.maze.is_open(tile + actor.dir.delta()) {
            return actor;
        }
        actor.pos = actor.pos + actor.dir.delta();
        actor
    }

    fn choose_dir<B: RenderBackend, S: SpriteSheet>(
        &mut self,
        actor: &Actor,
        hungry: bool,
        canvas: &TileCanvas<B, S>,
    ) -> Dir {
        let tile = actor.tile();
        let mut options: Vec<Dir> = Dir::ALL
            .into_iter()
            .filter(|&d| d != actor.dir.reverse() && self.maze.is_open(tile + d.delta()))
            .collect();
        if options.is_empty() {
            return actor.dir.reverse();
        }
        if hungry {
            let with_food: Vec<Dir> = options
                .iter()
                .copied()
                .filter(|&d| {
                    let p = tile + d.delta();
                    canvas.bounds().contains(p) && canvas.tile(p.x, p.y).is_some()
                })
                .collect();
            if !with_food.is_empty() {
                options = with_food;
            }
        }
        options[self.rng.random_range(0..options.len())]
    }
}
