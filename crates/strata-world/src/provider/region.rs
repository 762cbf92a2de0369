//! Observed regions: the chunks kept around each observer.

use std::fmt;
use std::sync::Arc;

use glam::{IVec3, Vec3};
use parking_lot::RwLock;
use strata_math::{Region3i, ceil_to_int};
use strata_voxel::ChunkType;

/// Identity of an observer, unique per provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// Something the provider keeps chunks loaded around.
pub trait Observer: Send + Sync {
    fn id(&self) -> ObserverId;

    /// Current world position, or `None` while the observer has no location.
    fn world_position(&self) -> Option<Vec3>;
}

/// An observer whose position is set from outside, e.g. by a player controller.
#[derive(Debug)]
pub struct TrackedObserver {
    id: ObserverId,
    position: RwLock<Option<Vec3>>,
}

impl TrackedObserver {
    pub fn new(id: ObserverId, position: Option<Vec3>) -> Self {
        Self {
            id,
            position: RwLock::new(position),
        }
    }

    pub fn set_position(&self, position: Option<Vec3>) {
        *self.position.write() = position;
    }
}

impl Observer for TrackedObserver {
    fn id(&self) -> ObserverId {
        self.id
    }

    fn world_position(&self) -> Option<Vec3> {
        *self.position.read()
    }
}

/// The chunk region watched on behalf of one observer.
pub struct CacheRegion {
    observer: Arc<dyn Observer>,
    chunk_type: ChunkType,
    extents: IVec3,
    center: IVec3,
    dirty: bool,
}

impl CacheRegion {
    /// Watches `distance` chunks across, centered on the observer.
    pub fn new(observer: Arc<dyn Observer>, distance: i32, chunk_type: ChunkType) -> Self {
        let half_distance = ceil_to_int(distance as f32 / 2.0);
        let position = observer.world_position();
        Self {
            observer,
            chunk_type,
            extents: chunk_type.chunk_extents(half_distance),
            center: position.map_or(IVec3::ZERO, |p| world_to_chunk_pos(p, chunk_type)),
            dirty: position.is_some(),
        }
    }

    pub fn observer_id(&self) -> ObserverId {
        self.observer.id()
    }

    /// `true` when the region moved (or appeared) since the last produce.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_up_to_date(&mut self) {
        self.dirty = false;
    }

    /// Chunk position of the observer as of the last [`update`](Self::update).
    pub fn center(&self) -> IVec3 {
        self.center
    }

    /// Re-reads the observer position; a moved center marks the region dirty.
    pub fn update(&mut self) {
        match self.observer.world_position() {
            None => self.dirty = false,
            Some(position) => {
                let center = world_to_chunk_pos(position, self.chunk_type);
                if center != self.center {
                    self.center = center;
                    self.dirty = true;
                }
            }
        }
    }

    /// Chunks around the observer's current position; empty without one.
    pub fn region(&self) -> Region3i {
        match self.observer.world_position() {
            Some(position) => Region3i::from_center_extents(
                world_to_chunk_pos(position, self.chunk_type),
                self.extents,
            ),
            None => Region3i::EMPTY,
        }
    }
}

impl fmt::Debug for CacheRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegion")
            .field("observer", &self.observer.id())
            .field("center", &self.center)
            .field("extents", &self.extents)
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Per-component division by the chunk size, truncated toward zero.
fn world_to_chunk_pos(position: Vec3, chunk_type: ChunkType) -> IVec3 {
    (position / chunk_type.size().as_vec3()).as_ivec3()
}
