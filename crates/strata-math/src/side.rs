//! The six axis-aligned sides of a block, with a static property table.

use glam::IVec3;

/// One face direction of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// +Y
    Top = 0,
    /// -Y
    Bottom = 1,
    /// -X
    Left = 2,
    /// +X
    Right = 3,
    /// -Z
    Front = 4,
    /// +Z
    Back = 5,
}

struct SideInfo {
    vector: IVec3,
    reverse: Side,
    clockwise: Side,
    horizontal: bool,
}

const SIDE_TABLE: [SideInfo; 6] = [
    SideInfo {
        vector: IVec3::new(0, 1, 0),
        reverse: Side::Bottom,
        clockwise: Side::Top,
        horizontal: false,
    },
    SideInfo {
        vector: IVec3::new(0, -1, 0),
        reverse: Side::Top,
        clockwise: Side::Bottom,
        horizontal: false,
    },
    SideInfo {
        vector: IVec3::new(-1, 0, 0),
        reverse: Side::Right,
        clockwise: Side::Back,
        horizontal: true,
    },
    SideInfo {
        vector: IVec3::new(1, 0, 0),
        reverse: Side::Left,
        clockwise: Side::Front,
        horizontal: true,
    },
    SideInfo {
        vector: IVec3::new(0, 0, -1),
        reverse: Side::Back,
        clockwise: Side::Left,
        horizontal: true,
    },
    SideInfo {
        vector: IVec3::new(0, 0, 1),
        reverse: Side::Front,
        clockwise: Side::Right,
        horizontal: true,
    },
];

impl Side {
    /// All sides in discriminant order.
    pub const ALL: [Side; 6] = [
        Side::Top,
        Side::Bottom,
        Side::Left,
        Side::Right,
        Side::Front,
        Side::Back,
    ];

    /// The four sides perpendicular to Y.
    pub const HORIZONTAL: [Side; 4] = [Side::Left, Side::Right, Side::Front, Side::Back];

    fn info(self) -> &'static SideInfo {
        &SIDE_TABLE[self as usize]
    }

    /// Unit offset pointing out of this side.
    pub fn vector(self) -> IVec3 {
        self.info().vector
    }

    /// The opposite side.
    pub fn reverse(self) -> Side {
        self.info().reverse
    }

    /// Quarter turn clockwise around +Y (viewed from above). Vertical sides map to themselves.
    pub fn rotate_clockwise(self) -> Side {
        self.info().clockwise
    }

    pub fn is_horizontal(self) -> bool {
        self.info().horizontal
    }
}
