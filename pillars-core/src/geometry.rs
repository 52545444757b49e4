//! World coordinates shared by the session, the tower generator and hosts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Host world identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(pub u32);

/// A normalized integer cell coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    pub world: WorldId,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CellPos {
    pub fn new(world: WorldId, x: i32, y: i32, z: i32) -> Self {
        Self { world, x, y, z }
    }

    /// Cell containing a continuous position (floor on every axis)
    pub fn from_position(pos: &Position) -> Self {
        Self {
            world: pos.world,
            x: pos.x.floor() as i32,
            y: pos.y.floor() as i32,
            z: pos.z.floor() as i32,
        }
    }

    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            world: self.world,
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

impl fmt::Display for CellPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@({}, {}, {})", self.world.0, self.x, self.y, self.z)
    }
}

/// Continuous actor position with look direction
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub world: WorldId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl Position {
    pub fn new(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self {
            world,
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Standing spot on top of a column: centered on the cell, `height` cells up
    pub fn above_cell(cell: &CellPos, height: u32) -> Self {
        Self::new(
            cell.world,
            f64::from(cell.x) + 0.5,
            f64::from(cell.y) + f64::from(height),
            f64::from(cell.z) + 0.5,
        )
    }

    pub fn with_look(mut self, yaw: f32, pitch: f32) -> Self {
        self.yaw = yaw;
        self.pitch = pitch;
        self
    }

    /// Same world and coordinates, ignoring look direction
    pub fn same_place(&self, other: &Position) -> bool {
        self.world == other.world && self.x == other.x && self.y == other.y && self.z == other.z
    }
}
