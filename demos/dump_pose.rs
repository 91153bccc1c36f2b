use anyhow::{Context, Result};
use log::*;
use structopt::StructOpt;

use cdf2bvh::PoseSequence;

use std::fs;
use std::path::PathBuf;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "dump_pose",
    about = "prints the shape and first frame of a cdf pose file"
)]
struct Opt {
    /// Input file
    #[structopt(parse(from_os_str))]
    input: PathBuf,

    /// Pose variable name
    #[structopt(default_value = "Pose")]
    variable: String,
}

fn main() -> Result<()> {
    env_logger::init();

    info!("starting up");

    let opt = Opt::from_args();
    let data = fs::read(&opt.input).context("failed to open pose file")?;
    let pose = PoseSequence::parse(&data, &opt.variable)?;

    println!("{} frame(s) of {} channel(s)", pose.len(), pose.channels());
    if let Some(first) = pose.frames().next() {
        println!("first frame: {:?}", first);
    }

    Ok(())
}
