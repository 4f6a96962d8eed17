use mctruth::engine::config::RealignConfig;
use std::path::PathBuf;

pub struct AppConfig {
    pub input_dir: PathBuf,
    pub output_path: Option<PathBuf>,
    pub realign: RealignConfig,
    pub parallel: bool,
}
