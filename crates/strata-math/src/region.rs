use glam::{IVec3, Vec3};

/// Axis-aligned integer volume described by its minimum corner and size.
///
/// Invariant: `max = min + size - 1` on every axis. Any region with a
/// non-positive size component collapses to [`Region3i::EMPTY`], so equality
/// and hashing on `(min, size)` treat all empty regions as one value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region3i {
    min: IVec3,
    size: IVec3,
}

impl Default for Region3i {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Region3i {
    /// The single empty region.
    pub const EMPTY: Region3i = Region3i {
        min: IVec3::ZERO,
        size: IVec3::ZERO,
    };

    /// Creates a region from its minimum corner and size.
    pub fn from_min_and_size(min: IVec3, size: IVec3) -> Self {
        if size.x <= 0 || size.y <= 0 || size.z <= 0 {
            return Self::EMPTY;
        }
        Self { min, size }
    }

    /// Creates a region spanning `min..=max` on every axis.
    pub fn from_min_max(min: IVec3, max: IVec3) -> Self {
        Self::from_min_and_size(min, max - min + IVec3::ONE)
    }

    /// Creates a region spanning `center - extents ..= center + extents`.
    pub fn from_center_extents(center: IVec3, extents: IVec3) -> Self {
        Self::from_min_max(center - extents, center + extents)
    }

    /// Creates the region bounded by two arbitrary corners.
    pub fn bounded(a: IVec3, b: IVec3) -> Self {
        Self::from_min_max(a.min(b), a.max(b))
    }

    /// Smallest region containing every non-empty region in `regions`.
    pub fn encompassing<I>(regions: I) -> Self
    where
        I: IntoIterator<Item = Region3i>,
    {
        let mut bounds: Option<(IVec3, IVec3)> = None;
        for region in regions.into_iter().filter(|r| !r.is_empty()) {
            bounds = Some(match bounds {
                None => (region.min, region.max()),
                Some((min, max)) => (min.min(region.min), max.max(region.max())),
            });
        }
        match bounds {
            Some((min, max)) => Self::from_min_max(min, max),
            None => Self::EMPTY,
        }
    }

    pub fn min(&self) -> IVec3 {
        self.min
    }

    pub fn size(&self) -> IVec3 {
        self.size
    }

    /// Inclusive maximum corner.
    pub fn max(&self) -> IVec3 {
        self.min + self.size - IVec3::ONE
    }

    pub fn is_empty(&self) -> bool {
        self.size.x <= 0 || self.size.y <= 0 || self.size.z <= 0
    }

    /// Number of cells in the region.
    pub fn volume(&self) -> i64 {
        if self.is_empty() {
            return 0;
        }
        i64::from(self.size.x) * i64::from(self.size.y) * i64::from(self.size.z)
    }

    /// Geometric center, in cell units.
    pub fn center(&self) -> Vec3 {
        self.min.as_vec3() + self.size.as_vec3() * 0.5
    }

    /// Overlap of two regions, or [`Region3i::EMPTY`] if they are disjoint.
    pub fn intersect(&self, other: &Region3i) -> Region3i {
        if self.is_empty() || other.is_empty() {
            return Self::EMPTY;
        }
        Self::from_min_max(self.min.max(other.min), self.max().min(other.max()))
    }

    /// Grows the region by `amount` on both sides of every axis.
    pub fn expand(&self, amount: IVec3) -> Region3i {
        if self.is_empty() {
            return Self::EMPTY;
        }
        Self::from_min_and_size(self.min - amount, self.size + amount * 2)
    }

    /// Grows the region by the same amount on every axis.
    pub fn expand_uniform(&self, amount: i32) -> Region3i {
        self.expand(IVec3::splat(amount))
    }

    /// Smallest region containing both this region and `pos`.
    pub fn expand_to_contain(&self, pos: IVec3) -> Region3i {
        if self.is_empty() {
            return Self::from_min_and_size(pos, IVec3::ONE);
        }
        Self::from_min_max(self.min.min(pos), self.max().max(pos))
    }

    /// Returns the region shifted by `offset`.
    pub fn translate(&self, offset: IVec3) -> Region3i {
        if self.is_empty() {
            return Self::EMPTY;
        }
        Self::from_min_and_size(self.min + offset, self.size)
    }

    /// Returns `true` if `pos` lies inside the region (boundary included).
    pub fn encompasses(&self, pos: IVec3) -> bool {
        if self.is_empty() {
            return false;
        }
        let max = self.max();
        pos.x >= self.min.x
            && pos.x <= max.x
            && pos.y >= self.min.y
            && pos.y <= max.y
            && pos.z >= self.min.z
            && pos.z <= max.z
    }

    /// Closest cell of the region to `pos`. Returns `pos` unchanged for an empty region.
    pub fn nearest_point_to(&self, pos: IVec3) -> IVec3 {
        if self.is_empty() {
            return pos;
        }
        pos.clamp(self.min, self.max())
    }

    /// Iterates cells with X varying fastest, then Z, then Y.
    pub fn iter(&self) -> RegionIter {
        RegionIter {
            region: *self,
            next: (!self.is_empty()).then_some(self.min),
        }
    }
}

impl IntoIterator for Region3i {
    type Item = IVec3;
    type IntoIter = RegionIter;

    fn into_iter(self) -> RegionIter {
        self.iter()
    }
}

impl IntoIterator for &Region3i {
    type Item = IVec3;
    type IntoIter = RegionIter;

    fn into_iter(self) -> RegionIter {
        self.iter()
    }
}

/// Iterator over the cells of a [`Region3i`].
#[derive(Clone, Debug)]
pub struct RegionIter {
    region: Region3i,
    next: Option<IVec3>,
}

impl Iterator for RegionIter {
    type Item = IVec3;

    fn next(&mut self) -> Option<IVec3> {
        let current = self.next?;
        let min = self.region.min;
        let max = self.region.max();

        let mut next = current;
        next.x += 1;
        if next.x > max.x {
            next.x = min.x;
            next.z += 1;
            if next.z > max.z {
                next.z = min.z;
                next.y += 1;
            }
        }
        self.next = (next.y <= max.y).then_some(next);
        Some(current)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_positive_size_is_empty() {
        let r = Region3i::from_min_and_size(IVec3::new(4, 4, 4), IVec3::new(2, 0, 2));
        assert_eq!(r, Region3i::EMPTY);
        assert!(r.is_empty());
        assert_eq!(r.iter().count(), 0);
        assert_eq!(r.volume(), 0);
    }

    #[test]
    fn test_max_is_min_plus_size_minus_one() {
        let r = Region3i::from_min_and_size(IVec3::new(-2, 0, 3), IVec3::new(4, 1, 2));
        assert_eq!(r.max(), IVec3::new(1, 0, 4));
    }

    #[test]
    fn test_center_extents() {
        let r = Region3i::from_center_extents(IVec3::ZERO, IVec3::new(1, 0, 1));
        assert_eq!(r.min(), IVec3::new(-1, 0, -1));
        assert_eq!(r.size(), IVec3::new(3, 1, 3));
        assert_eq!(r.volume(), 9);
    }

    #[test]
    fn test_bounded_sorts_corners() {
        let r = Region3i::bounded(IVec3::new(3, -1, 2), IVec3::new(0, 2, -2));
        assert_eq!(r.min(), IVec3::new(0, -1, -2));
        assert_eq!(r.max(), IVec3::new(3, 2, 2));
    }

    #[test]
    fn test_iteration_order_x_then_z_then_y() {
        let r = Region3i::from_min_and_size(IVec3::ZERO, IVec3::new(2, 2, 2));
        let cells: Vec<IVec3> = r.iter().collect();
        assert_eq!(
            cells,
            vec![
                IVec3::new(0, 0, 0),
                IVec3::new(1, 0, 0),
                IVec3::new(0, 0, 1),
                IVec3::new(1, 0, 1),
                IVec3::new(0, 1, 0),
                IVec3::new(1, 1, 0),
                IVec3::new(0, 1, 1),
                IVec3::new(1, 1, 1),
            ]
        );
    }

    #[test]
    fn test_intersect_disjoint_is_empty() {
        let a = Region3i::from_min_and_size(IVec3::ZERO, IVec3::splat(2));
        let b = Region3i::from_min_and_size(IVec3::splat(5), IVec3::splat(2));
        assert!(a.intersect(&b).is_empty());

        let c = Region3i::from_min_and_size(IVec3::ONE, IVec3::splat(4));
        let i = a.intersect(&c);
        assert_eq!(i, Region3i::from_min_and_size(IVec3::ONE, IVec3::ONE));
    }

    #[test]
    fn test_expand_and_encompasses() {
        let r = Region3i::from_center_extents(IVec3::ZERO, IVec3::ZERO);
        let e = r.expand(IVec3::new(4, 0, 4));
        assert!(e.encompasses(IVec3::new(4, 0, -4)));
        assert!(!e.encompasses(IVec3::new(5, 0, 0)));
        assert!(!e.encompasses(IVec3::new(0, 1, 0)));
        assert!(Region3i::EMPTY.expand_uniform(3).is_empty());
    }

    #[test]
    fn test_expand_to_contain() {
        let r = Region3i::EMPTY.expand_to_contain(IVec3::new(2, 2, 2));
        assert_eq!(r.volume(), 1);
        let r = r.expand_to_contain(IVec3::new(-1, 2, 3));
        assert_eq!(r.min(), IVec3::new(-1, 2, 2));
        assert_eq!(r.max(), IVec3::new(2, 2, 3));
    }

    #[test]
    fn test_encompassing_skips_empty() {
        let a = Region3i::from_min_and_size(IVec3::ZERO, IVec3::ONE);
        let b = Region3i::from_min_and_size(IVec3::new(3, 0, 0), IVec3::ONE);
        let r = Region3i::encompassing([a, Region3i::EMPTY, b]);
        assert_eq!(r.min(), IVec3::ZERO);
        assert_eq!(r.max(), IVec3::new(3, 0, 0));
        assert!(Region3i::encompassing(Vec::new()).is_empty());
    }

    #[test]
    fn test_nearest_point_and_translate() {
        let r = Region3i::from_min_and_size(IVec3::ZERO, IVec3::splat(4));
        assert_eq!(r.nearest_point_to(IVec3::new(-5, 2, 9)), IVec3::new(0, 2, 3));
        let t = r.translate(IVec3::new(1, 1, 1));
        assert_eq!(t.min(), IVec3::ONE);
        assert_eq!(t.size(), r.size());
    }

    #[test]
    fn test_center() {
        let r = Region3i::from_min_and_size(IVec3::ZERO, IVec3::new(2, 4, 6));
        assert_eq!(r.center(), Vec3::new(1.0, 2.0, 3.0));
    }
}
