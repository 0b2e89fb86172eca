//! The six axis-aligned lattice directions.
//!
//! Directions are plain `usize` indices in the order +X, +Y, +Z, -X, -Y, -Z,
//! so the inverse of a direction is always three steps away.

use glam::IVec3;

/// Number of lattice directions.
pub const DIRECTION_COUNT: usize = 6;

/// Position offsets indexed by direction: +X, +Y, +Z, -X, -Y, -Z.
pub const OFFSETS: [IVec3; DIRECTION_COUNT] = [
    IVec3::X,
    IVec3::Y,
    IVec3::Z,
    IVec3::NEG_X,
    IVec3::NEG_Y,
    IVec3::NEG_Z,
];

/// Short names used in error messages and logs.
pub const DIRECTION_NAMES: [&str; DIRECTION_COUNT] = ["+x", "+y", "+z", "-x", "-y", "-z"];

/// Direction index for +X.
pub const POS_X: usize = 0;
/// Direction index for +Y.
pub const POS_Y: usize = 1;
/// Direction index for +Z.
pub const POS_Z: usize = 2;
/// Direction index for -X.
pub const NEG_X: usize = 3;
/// Direction index for -Y.
pub const NEG_Y: usize = 4;
/// Direction index for -Z.
pub const NEG_Z: usize = 5;

/// The inverse of a direction.
#[inline]
pub const fn opposite(direction: usize) -> usize {
    (direction + 3) % DIRECTION_COUNT
}

/// Direction from `a` to `b`, if they are lattice neighbors.
pub fn direction_between(a: IVec3, b: IVec3) -> Option<usize> {
    let delta = b - a;
    OFFSETS.iter().position(|&offset| offset == delta)
}
