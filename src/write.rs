use cookie_factory::combinator::string;
use cookie_factory::multi::all;
use cookie_factory::sequence::tuple;
use cookie_factory::*;

use cgmath::Vector3;
use ndarray::ArrayView1;

use super::*;

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

/// Divisor applied to the root translation (the dataset unit over the
/// template unit).
pub const DEFAULT_SCALE: f64 = 100.;

/// Seconds per frame written to the motion header. The capture rate is not
/// stored in the pose container, so this stays caller-overridable.
pub const DEFAULT_FRAME_TIME: f64 = 0.02;

impl BvhFrame {
    /// Reorders one flat pose vector into the template's channel layout.
    ///
    /// `joints` lists each joint's 1-based (X, Y, Z) source columns in
    /// template traversal order; columns 1..=3 are the root translation,
    /// divided by `scale`.
    pub fn from_flat(frame: ArrayView1<'_, f64>, joints: &[[usize; 3]], scale: f64) -> Result<Self, Error> {
        let len = frame.len();
        let channel = |column: usize| {
            frame
                .get(column - 1)
                .copied()
                .ok_or(Error::MalformedFrame { column, len })
        };

        let position = Vector3::new(channel(1)? / scale, channel(2)? / scale, channel(3)? / scale);
        let mut rotations = Vec::with_capacity(joints.len());
        for &[x, y, z] in joints {
            rotations.push(Vector3::new(channel(x)?, channel(y)?, channel(z)?));
        }
        Ok(BvhFrame { position, rotations })
    }

    /// Channel values in emission order: root translation, then (Z, X, Y)
    /// per joint.
    pub fn channels(&self) -> impl Iterator<Item = f64> + '_ {
        vec![self.position.x, self.position.y, self.position.z]
            .into_iter()
            .chain(self.rotations.iter().flat_map(|r| vec![r.z, r.x, r.y]))
    }

    fn write<'a, W: io::Write + 'a>(&'a self) -> impl SerializeFn<W> + 'a {
        let rotations = self
            .rotations
            .iter()
            .map(|r| string(format!("{} {} {} ", r.z, r.x, r.y)));
        tuple((
            string(format!(" {} {} {} ", self.position.x, self.position.y, self.position.z)),
            all(rotations),
            string("\n "),
        ))
    }
}

impl Motion {
    /// Translates every frame of a pose sequence in order.
    pub fn from_pose(
        pose: &PoseSequence,
        joints: &[[usize; 3]],
        scale: f64,
        frame_time: f64,
    ) -> Result<Self, Error> {
        let frames = pose
            .frames()
            .map(|frame| BvhFrame::from_flat(frame, joints, scale))
            .collect::<Result<_, _>>()?;
        Ok(Motion { frame_time, frames })
    }

    /// Serializes the MOTION block in the dialect bvh consumers of the
    /// original converter expect, stray whitespace included.
    pub fn write<'a, W: io::Write + 'a>(&'a self) -> impl SerializeFn<W> + 'a {
        tuple((
            string("\nMOTION \n"),
            string(format!("Frames:\t{} \n", self.frames.len())),
            string(format!("Frame Time: {} \n", self.frame_time)),
            all(self.frames.iter().map(BvhFrame::write)),
        ))
    }

    /// Appends the MOTION block to `path`, which is expected to be a fresh
    /// copy of the hierarchy template.
    pub fn append_to(&self, path: &Path) -> Result<(), Error> {
        let file = OpenOptions::new().append(true).open(path)?;
        gen(self.write(), file).map_err(|e| Error::Serialize(format!("{:?}", e)))?;
        Ok(())
    }
}
