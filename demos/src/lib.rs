//! Demo content for spritecanvas: a small maze with wandering actors.

pub mod maze;
pub mod sprites;
pub mod world;
