//! Tera arrays: pluggable per-block 3D storage.
//!
//! Every chunk keeps its block ids, sunlight, light and extra data in boxed
//! [`TeraArray`] trait objects. Several encodings exist (bit-packed dense
//! arrays of 4, 8 or 16 bits, a layer-sparse byte array and a null array);
//! the [`TeraArrayRegistry`] maps their string ids to factories and the
//! [`TeraDeflator`] re-encodes an array into the smallest lossless one.

mod deflate;
mod dense;
mod null;
mod registry;
mod sparse;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use deflate::TeraDeflator;
pub use dense::DenseTeraArray;
pub use null::TeraNullArray;
pub use registry::{TeraArrayEntry, TeraArrayRegistry};
pub(crate) use registry::dense8_entry;
pub use sparse::SparseTeraArray8;

/// Encoding id of the 4-bit dense array.
pub const DENSE4: &str = "dense4";
/// Encoding id of the 8-bit dense array.
pub const DENSE8: &str = "dense8";
/// Encoding id of the 16-bit dense array.
pub const DENSE16: &str = "dense16";
/// Encoding id of the layer-sparse 8-bit array.
pub const SPARSE8: &str = "sparse8";
/// Encoding id of the array that stores nothing.
pub const NULL: &str = "null";

/// Dimensions of a tera array in blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArraySize {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl ArraySize {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Total number of cells.
    pub const fn volume(&self) -> usize {
        self.x * self.y * self.z
    }

    /// Total number of cells, or `None` if it does not fit in `usize`.
    ///
    /// Sizes read from the wire go through this before anything is allocated.
    pub fn checked_volume(&self) -> Option<usize> {
        self.x.checked_mul(self.y)?.checked_mul(self.z)
    }

    /// Number of cells in one horizontal layer.
    pub const fn layer_area(&self) -> usize {
        self.x * self.z
    }

    /// Linear index of a cell. Storage is layer-major: all of `y = 0`, then `y = 1`, ...
    #[inline]
    pub const fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (y * self.z + z) * self.x + x
    }

    /// Returns `true` if the signed local coordinate lies inside the array.
    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        x >= 0
            && y >= 0
            && z >= 0
            && (x as usize) < self.x
            && (y as usize) < self.y
            && (z as usize) < self.z
    }

    pub(crate) fn to_wire(self) -> [u32; 3] {
        [self.x as u32, self.y as u32, self.z as u32]
    }

    pub(crate) fn from_wire(size: [u32; 3]) -> Self {
        Self::new(size[0] as usize, size[1] as usize, size[2] as usize)
    }
}

impl fmt::Display for ArraySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

/// Errors raised by the tera array registry and payload decoding.
#[derive(Debug, Error)]
pub enum TeraArrayError {
    #[error("unknown tera array encoding: {0}")]
    UnknownEncoding(String),
    #[error("tera array encoding already registered: {0}")]
    DuplicateEncoding(String),
    #[error("malformed {encoding} payload: {reason}")]
    MalformedPayload { encoding: String, reason: String },
    #[error("tera array has size {actual}, expected {expected}")]
    SizeMismatch { expected: ArraySize, actual: ArraySize },
    #[error("tera array payload: {0}")]
    Postcard(#[from] postcard::Error),
}

/// A fixed-size 3D array of small unsigned values.
///
/// Coordinates are local and must lie inside [`size`](TeraArray::size);
/// callers check bounds first. Values wider than the encoding are truncated.
pub trait TeraArray: Send + Sync + fmt::Debug {
    /// Registry id of the encoding.
    fn encoding(&self) -> &'static str;

    fn size(&self) -> ArraySize;

    /// Bits stored per element (0 for the null array).
    fn element_bits(&self) -> u8;

    fn is_sparse(&self) -> bool;

    fn get(&self, x: usize, y: usize, z: usize) -> u16;

    /// Stores `value` and returns the previous value.
    fn set(&mut self, x: usize, y: usize, z: usize, value: u16) -> u16;

    /// Stores `value` only if the current value equals `expected`.
    fn set_if(&mut self, x: usize, y: usize, z: usize, value: u16, expected: u16) -> bool {
        if self.get(x, y, z) == expected {
            self.set(x, y, z, value);
            true
        } else {
            false
        }
    }

    fn fill(&mut self, value: u16);

    /// Approximate heap footprint in bytes.
    fn estimated_memory(&self) -> usize;

    /// Deep copy with the same encoding.
    fn copy(&self) -> Box<dyn TeraArray>;

    /// Largest value stored anywhere in the array.
    fn max_value(&self) -> u16 {
        let size = self.size();
        let mut max = 0;
        for y in 0..size.y {
            for z in 0..size.z {
                for x in 0..size.x {
                    max = max.max(self.get(x, y, z));
                }
            }
        }
        max
    }

    /// Appends the encoding-specific payload bytes.
    fn write_data(&self, out: &mut Vec<u8>);
}

/// Copies every value of `source` into `target`. Both must have the same size.
pub(crate) fn copy_values(source: &dyn TeraArray, target: &mut dyn TeraArray) {
    let size = source.size();
    for y in 0..size.y {
        for z in 0..size.z {
            for x in 0..size.x {
                target.set(x, y, z, source.get(x, y, z));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_is_layer_major() {
        let size = ArraySize::new(16, 256, 16);
        assert_eq!(size.index(0, 0, 0), 0);
        assert_eq!(size.index(1, 0, 0), 1);
        assert_eq!(size.index(0, 0, 1), 16);
        assert_eq!(size.index(0, 1, 0), 256);
        assert_eq!(size.index(15, 255, 15), size.volume() - 1);
    }

    #[test]
    fn test_checked_volume_overflow() {
        assert_eq!(ArraySize::new(16, 256, 16).checked_volume(), Some(65536));
        assert_eq!(ArraySize::new(usize::MAX, 2, 1).checked_volume(), None);
        assert_eq!(ArraySize::from_wire([u32::MAX; 3]).checked_volume(), None);
    }

    #[test]
    fn test_contains_rejects_negative_and_edge() {
        let size = ArraySize::new(16, 16, 16);
        assert!(size.contains(0, 0, 0));
        assert!(size.contains(15, 15, 15));
        assert!(!size.contains(-1, 0, 0));
        assert!(!size.contains(0, 16, 0));
    }

    #[test]
    fn test_default_set_if_and_max_value() {
        let mut array = DenseTeraArray::new(DENSE8, 8, ArraySize::new(4, 4, 4));
        assert!(array.set_if(1, 2, 3, 9, 0));
        assert!(!array.set_if(1, 2, 3, 5, 0));
        assert_eq!(array.get(1, 2, 3), 9);
        assert_eq!(array.max_value(), 9);
    }
}
