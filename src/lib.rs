pub mod read;
pub mod skeleton;
mod write;

use cgmath::Vector3;
use ndarray::{Array2, ArrayView1};

pub use write::{DEFAULT_FRAME_TIME, DEFAULT_SCALE};

/// One subject/action's motion: frames x source channels, columns indexed
/// 1-based per the dataset documentation.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSequence {
    pub data: Array2<f64>,
}

impl PoseSequence {
    pub fn len(&self) -> usize {
        self.data.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channels(&self) -> usize {
        self.data.dim().1
    }

    pub fn frames(&self) -> impl Iterator<Item = ArrayView1<'_, f64>> {
        self.data.outer_iter()
    }
}

/// One frame reordered into the skeleton template's channel layout.
///
/// `position` is the rescaled root translation; `rotations` holds one Euler
/// triplet per table entry, fields x/y/z carrying the X/Y/Z angles. Emission
/// order per joint is (Z, X, Y).
#[derive(Debug, Clone, PartialEq)]
pub struct BvhFrame {
    pub position: Vector3<f64>,
    pub rotations: Vec<Vector3<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Motion {
    pub frame_time: f64,
    pub frames: Vec<BvhFrame>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid pose container: {0}")]
    InvalidInput(String),

    #[error("pose frame has {len} channels but column {column} is required")]
    MalformedFrame { column: usize, len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to serialize motion: {0}")]
    Serialize(String),
}
