//! Small integer helpers shared by chunk-space conversions.

use glam::IVec3;

/// Manhattan distance between two grid cells.
pub fn grid_distance(a: IVec3, b: IVec3) -> i32 {
    let d = (a - b).abs();
    d.x + d.y + d.z
}

/// Rounds toward negative infinity.
pub fn floor_to_int(value: f32) -> i32 {
    value.floor() as i32
}

/// Rounds toward positive infinity.
pub fn ceil_to_int(value: f32) -> i32 {
    value.ceil() as i32
}
