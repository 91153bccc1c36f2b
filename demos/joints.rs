use cdf2bvh::skeleton::{CHANNELS, JOINT_NAMES, SOURCE_COLUMNS};

fn main() {
    println!("{} joints, {} channels per frame", JOINT_NAMES.len(), CHANNELS);
    for name in JOINT_NAMES.iter() {
        let [x, y, z] = SOURCE_COLUMNS[name];
        println!("{:<16} x: {:<2} y: {:<2} z: {:<2}", name, x, y, z);
    }
}
