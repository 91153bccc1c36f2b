//! The fixed H3.6M skeleton schema.
//!
//! `ROT_ORDER` is versioned together with `assets/base_H36M_hierarchy.bvh`:
//! the table lists source columns in the traversal order of that template,
//! so neither may be reordered without the other.

use lazy_static::lazy_static;

use std::collections::HashMap;

/// Joint names in the traversal order of the hierarchy template.
pub const JOINT_NAMES: [&str; 25] = [
    "Hips",
    "Spine",
    "Spine1",
    "Neck",
    "Head",
    "LeftShoulder",
    "LeftArm",
    "LeftForeArm",
    "LeftHand",
    "LeftHandThumb",
    "L_Wrist_End",
    "RightShoulder",
    "RightArm",
    "RightForeArm",
    "RightHand",
    "RightHandThumb",
    "R_Wrist_End",
    "LeftUpLeg",
    "LeftLeg",
    "LeftFoot",
    "LeftToeBase",
    "RightUpLeg",
    "RightLeg",
    "RightFoot",
    "RightToeBase",
];

/// 1-based source columns of each joint's (X, Y, Z) Euler angles, one entry
/// per `JOINT_NAMES` slot. The first entry is the root orientation.
pub const ROT_ORDER: [[usize; 3]; 25] = [
    [5, 6, 4],
    [32, 33, 31],
    [35, 36, 34],
    [38, 39, 37],
    [41, 42, 40],
    [44, 45, 43],
    [47, 48, 46],
    [50, 51, 49],
    [53, 54, 52],
    [56, 57, 55],
    [59, 60, 58],
    [62, 63, 61],
    [65, 66, 64],
    [68, 69, 67],
    [71, 72, 70],
    [74, 75, 73],
    [77, 78, 76],
    [20, 21, 19],
    [23, 24, 22],
    [26, 27, 25],
    [29, 30, 28],
    [8, 9, 7],
    [11, 12, 10],
    [14, 15, 13],
    [17, 18, 16],
];

/// 1-based source columns of the root translation.
pub const ROOT_TRANSLATION: [usize; 3] = [1, 2, 3];

/// Channel count of a translated frame, which for this skeleton equals the
/// width of a source pose vector.
pub const CHANNELS: usize = 3 + 3 * ROT_ORDER.len();

lazy_static! {
    /// Joint name -> source columns, for cross-checking against the template.
    pub static ref SOURCE_COLUMNS: HashMap<&'static str, [usize; 3]> = JOINT_NAMES
        .iter()
        .copied()
        .zip(ROT_ORDER.iter().copied())
        .collect();
}
