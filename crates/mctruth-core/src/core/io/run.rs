use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Event bookkeeping of a simulated run, stored as `run.toml` next to the event files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RunDescriptor {
    pub events: usize,
    /// Events stored per kinematics file. Counted from the first file when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_per_file: Option<usize>,
}

#[derive(Debug, Error)]
pub enum RunLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid run descriptor '{path}': events-per-file must be at least 1")]
    ZeroEventsPerFile { path: String },
}

impl RunDescriptor {
    pub fn load(path: &Path) -> Result<Self, RunLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| RunLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let descriptor: RunDescriptor =
            toml::from_str(&content).map_err(|e| RunLoadError::Toml {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
        if descriptor.events_per_file == Some(0) {
            return Err(RunLoadError::ZeroEventsPerFile {
                path: path.to_string_lossy().to_string(),
            });
        }
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_reads_kebab_case_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(&path, "events = 12\nevents-per-file = 5\n").unwrap();

        let run = RunDescriptor::load(&path).unwrap();
        assert_eq!(run.events, 12);
        assert_eq!(run.events_per_file, Some(5));
    }

    #[test]
    fn events_per_file_is_optional() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(&path, "events = 3\n").unwrap();

        assert_eq!(RunDescriptor::load(&path).unwrap().events_per_file, None);
    }

    #[test]
    fn load_rejects_unknown_keys_and_zero_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");

        fs::write(&path, "events = 3\nseed = 7\n").unwrap();
        assert!(matches!(
            RunDescriptor::load(&path),
            Err(RunLoadError::Toml { .. })
        ));

        fs::write(&path, "events = 3\nevents-per-file = 0\n").unwrap();
        assert!(matches!(
            RunDescriptor::load(&path),
            Err(RunLoadError::ZeroEventsPerFile { .. })
        ));
    }

    #[test]
    fn missing_file_reports_its_path() {
        let err = RunDescriptor::load(Path::new("/nonexistent/run.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/run.toml"));
    }
}
