use anyhow::{bail, ensure, Context, Result};
use log::*;
use structopt::StructOpt;

use cdf2bvh::skeleton;
use cdf2bvh::{Motion, PoseSequence};

use std::fs;
use std::path::{Path, PathBuf};

mod descriptor;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "cdf2bvh",
    about = "fills a bvh skeleton template with motion from H3.6M cdf pose files"
)]
struct Opt {
    /// Path to a single cdf pose file (must be a `D3 Angles` pose)
    #[structopt(short, long, parse(from_os_str))]
    pose: Option<PathBuf>,

    /// Folder scanned recursively for cdf pose files
    #[structopt(short, long, parse(from_os_str))]
    folder: Option<PathBuf>,

    /// Destination directory for the created bvh files
    #[structopt(short, long, parse(from_os_str))]
    dest: Option<PathBuf>,

    /// Skeleton hierarchy template prepended to every output
    #[structopt(long, parse(from_os_str))]
    skeleton: Option<PathBuf>,

    /// Divisor applied to the root translation
    #[structopt(long)]
    scale: Option<f64>,

    /// Seconds per frame written to the motion header
    #[structopt(long)]
    frame_time: Option<f64>,

    /// Name of the pose variable inside the cdf container
    #[structopt(long)]
    variable: Option<String>,
}

/// What one finished conversion produced.
#[derive(Debug)]
struct Converted {
    output: PathBuf,
    frames: usize,
}

fn main() -> Result<()> {
    env_logger::init();

    info!("starting up");

    let config: descriptor::Config = match fs::read_to_string("./config.toml") {
        Ok(data) => match toml::from_str(&data) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to parse config file: {}", e);
                Default::default()
            }
        },
        Err(_) => Default::default(),
    };

    let opt = Opt::from_args();
    let batch = opt.folder.is_some();

    let scale = opt.scale.or(config.scale).unwrap_or(cdf2bvh::DEFAULT_SCALE);
    ensure!(scale != 0., "scale must be non-zero");
    let frame_time = opt
        .frame_time
        .or(config.frame_time)
        .unwrap_or(cdf2bvh::DEFAULT_FRAME_TIME);
    let variable = opt.variable.or(config.variable).unwrap_or_else(|| "Pose".into());

    let inputs = resolve_inputs(opt.pose.as_deref(), opt.folder.as_deref())?;

    let dest = match opt.dest.or(config.dest) {
        Some(dest) => dest,
        None => {
            warn!("no destination given, using ./bvh-files");
            PathBuf::from("bvh-files")
        }
    };
    if !dest.is_dir() {
        fs::create_dir_all(&dest)
            .with_context(|| format!("failed to create destination {}", dest.display()))?;
    }

    let template = opt
        .skeleton
        .or(config.skeleton)
        .unwrap_or_else(|| PathBuf::from("base_H36M_hierarchy.bvh"));
    ensure!(
        template.is_file(),
        "skeleton template {} does not exist",
        template.display()
    );

    let mut converted = 0usize;
    let mut failed = 0usize;
    for (index, input) in inputs.iter().enumerate() {
        match convert_one(input, &dest, &template, scale, frame_time, &variable, index) {
            Ok(done) => {
                info!("created {} ({} frames)", done.output.display(), done.frames);
                converted += 1;
            }
            Err(e) => {
                error!("{}: {:#}", input.display(), e);
                failed += 1;
            }
        }
    }

    info!("{} file(s) converted, {} failed", converted, failed);

    if failed > 0 && (!batch || converted == 0) {
        bail!("{} of {} conversion(s) failed", failed, converted + failed);
    }

    Ok(())
}

fn resolve_inputs(pose: Option<&Path>, folder: Option<&Path>) -> Result<Vec<PathBuf>> {
    ensure!(
        pose.is_some() || folder.is_some(),
        "specify a pose file (--pose) or a folder to scan (--folder)"
    );

    let mut inputs = vec![];
    if let Some(pose) = pose {
        ensure!(pose.is_file(), "pose file {} does not exist", pose.display());
        inputs.push(pose.to_path_buf());
    }
    if let Some(folder) = folder {
        ensure!(folder.is_dir(), "folder {} does not exist", folder.display());
        for entry in walkdir::WalkDir::new(folder) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            match path.extension() {
                Some(ext) if ext.eq_ignore_ascii_case("cdf") => inputs.push(path),
                _ => trace!("skipping {}", path.display()),
            }
        }
    }
    Ok(inputs)
}

/// `<stem minus whitespace>.bvh`, falling back to the batch index when the
/// name is already taken in the destination.
fn output_path(input: &Path, dest: &Path, index: usize) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("pose_{}", index));
    let stem: String = stem.split_whitespace().collect();
    let named = dest.join(format!("{}.bvh", stem));
    if named.exists() {
        dest.join(format!("{}_{}.bvh", stem, index))
    } else {
        named
    }
}

fn convert_one(
    input: &Path,
    dest: &Path,
    template: &Path,
    scale: f64,
    frame_time: f64,
    variable: &str,
    index: usize,
) -> Result<Converted> {
    let data = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let pose = PoseSequence::parse(&data, variable)?;
    let motion = Motion::from_pose(&pose, &skeleton::ROT_ORDER, scale, frame_time)?;

    let output = output_path(input, dest, index);
    fs::copy(template, &output)
        .with_context(|| format!("failed to copy skeleton template to {}", output.display()))?;
    motion.append_to(&output)?;

    Ok(Converted {
        output,
        frames: motion.frames.len(),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn outputs_with_shared_basenames_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let first = output_path(Path::new("/data/S1/Walking 1.cdf"), dir.path(), 0);
        assert_eq!(first.file_name().unwrap().to_string_lossy(), "Walking1.bvh");
        fs::write(&first, b"taken").unwrap();

        let second = output_path(Path::new("/data/S5/Walking 1.cdf"), dir.path(), 4);
        assert_eq!(second.file_name().unwrap().to_string_lossy(), "Walking1_4.bvh");
        assert_ne!(first, second);
    }

    #[test]
    fn folder_scan_finds_cdf_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("S1")).unwrap();
        fs::write(dir.path().join("Directions.cdf"), b"").unwrap();
        fs::write(dir.path().join("S1").join("Eating.CDF"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let inputs = resolve_inputs(None, Some(dir.path())).unwrap();
        assert_eq!(inputs.len(), 2);
        assert!(inputs.iter().all(|p| p.extension().is_some()));
    }

    #[test]
    fn missing_arguments_fail_fast() {
        assert!(resolve_inputs(None, None).is_err());
        assert!(resolve_inputs(Some(Path::new("/no/such/file.cdf")), None).is_err());
        assert!(resolve_inputs(None, Some(Path::new("/no/such/folder"))).is_err());
    }
}
