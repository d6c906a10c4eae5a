pub mod grid_world;

pub use grid_world::{Action, Cell, GridWorld, GridWorldConfig, Pos};
