use serde::{Deserialize, Serialize};

use std::path::PathBuf;

/// Optional `config.toml` defaults; explicit flags win over these.
#[derive(Default, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    pub dest: Option<PathBuf>,
    pub skeleton: Option<PathBuf>,
    pub scale: Option<f64>,
    pub frame_time: Option<f64>,
    pub variable: Option<String>,
}
