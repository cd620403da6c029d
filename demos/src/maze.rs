//! The demo level as a character map.

use spritecanvas_core::Point;

pub const MAZE_WIDTH: i32 = 19;
pub const MAZE_HEIGHT: i32 = 15;

/// Row-major level text, `MAZE_WIDTH` characters per row.
pub const MAZE: &str = concat!(
    "###################",
    "#o.......#.......o#",
    "#.##.###.#.###.##.#",
    "#.................#",
    "#.##.#.#####.#.##.#",
    "#....#...#...#....#",
    "####.###.#.###.####",
    "#.......#-#.......#",
    "####.#.#...#.#.####",
    "#....#.......#....#",
    "#.##.#.#####.#.##.#",
    "#o.#.....#.....#.o#",
    "##.#.###.#.###.#.##",
    "#.................#",
    "###################",
);

/// Walkability lookup over [`MAZE`].
#[derive(Clone, Debug)]
pub struct Maze {
    cells: Vec<u8>,
}

impl Default for Maze {
    fn default() -> Self {
        Self::new()
    }
}

impl Maze {
    pub fn new() -> Self {
        Self {
            cells: MAZE.bytes().collect(),
        }
    }

    /// Character at tile `p`, or `None` outside the maze.
    pub fn at(&self, p: Point) -> Option<u8> {
        if p.x < 0 || p.y < 0 || p.x >= MAZE_WIDTH || p.y >= MAZE_HEIGHT {
            return None;
        }
        self.cells.get((p.y * MAZE_WIDTH + p.x) as usize).copied()
    }

    /// Walls and the ghost-house door block movement.
    pub fn is_open(&self, p: Point) -> bool {
        matches!(self.at(p), Some(ch) if ch != b'#' && ch != b'-')
    }

    /// Number of dots and pills in a fresh level.
    pub fn food_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c == b'.' || c == b'o').count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maze_text_is_rectangular() {
        assert_eq!(MAZE.len(), (MAZE_WIDTH * MAZE_HEIGHT) as usize);
        assert!(MAZE.is_ascii());
    }

    #[test]
    fn border_is_closed() {
        let maze = Maze::new();
        for x in 0..MAZE_WIDTH {
            assert!(!maze.is_open(Point::new(x, 0)));
            assert!(!maze.is_open(Point::new(x, MAZE_HEIGHT - 1)));
        }
        for y in 0..MAZE_HEIGHT {
            assert!(!maze.is_open(Point::new(0, y)));
            assert!(!maze.is_open(Point::new(MAZE_WIDTH - 1, y)));
        }
    }

    #[test]
    fn door_blocks() {
        let maze = Maze::new();
        assert_eq!(maze.at(Point::new(9, 7)), Some(b'-'));
        assert!(!maze.is_open(Point::new(9, 7)));
        assert!(maze.is_open(Point::new(9, 8)));
        assert!(!maze.is_open(Point::new(-1, 3)));
    }

    #[test]
    fn food_count() {
        assert_eq!(Maze::new().food_count(), 142);
    }
}
