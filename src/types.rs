/// Represents a single 3D point in frame pixel space
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Number of points in the hand landmark topology.
pub const HAND_POINTS: usize = 21;

// Landmark indices (wrist = 0, then 4 points per finger, base to tip)
pub const THUMB_MCP: usize = 2;
pub const THUMB_TIP: usize = 4;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

/// One detected hand. Y grows downwards, like image rows.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    pub points: [Point3D; HAND_POINTS],
    pub score: f32,
}

impl HandLandmarks {
    pub fn new(points: [Point3D; HAND_POINTS], score: f32) -> Self {
        Self { points, score }
    }

    pub fn y(&self, index: usize) -> f32 {
        self.points[index].y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    ThumbsUp,
}

impl Gesture {
    pub fn label(&self) -> &'static str {
        match self {
            Gesture::ThumbsUp => "THUMBS_UP",
        }
    }
}
