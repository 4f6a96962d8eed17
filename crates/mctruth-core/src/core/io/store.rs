use super::kinematics::{KinematicsFile, KinematicsFileError, KinematicsTable};
use super::run::{RunDescriptor, RunLoadError};
use super::trackrefs::{TrackRefsFile, TrackRefsFileError, TrackRefsTable};
use super::traits::EventFile;
use crate::core::models::reference::ReferenceTree;
use crate::core::models::stack::KinematicsStack;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const RUN_DESCRIPTOR: &str = "run.toml";

/// Suffix of the file set `number`: empty for the first set, the number otherwise.
pub fn file_extension(number: usize) -> String {
    if number == 0 {
        String::new()
    } else {
        number.to_string()
    }
}

pub fn kinematics_file_name(number: usize) -> String {
    format!("kinematics{}.csv", file_extension(number))
}

pub fn trackrefs_file_name(number: usize) -> String {
    format!("trackrefs{}.csv", file_extension(number))
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Run(#[from] RunLoadError),
    #[error("Kinematics file '{path}': {source}")]
    Kinematics {
        path: String,
        #[source]
        source: KinematicsFileError,
    },
    #[error("Track reference file '{path}': {source}")]
    TrackRefs {
        path: String,
        #[source]
        source: TrackRefsFileError,
    },
    #[error("Event {0} is not stored in the open file set")]
    EventNotFound(usize),
}

/// Kinematics and track references of one event as they were stored.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedEvent {
    pub kinematics: KinematicsStack,
    /// `None` when the run carries no track references for this event.
    pub references: Option<ReferenceTree>,
}

/// Source of the events of one run, organized in numbered file sets.
pub trait EventStore {
    fn event_count(&self) -> usize;
    fn events_per_file(&self) -> usize;
    fn current_file(&self) -> usize;
    fn open_file(&mut self, number: usize) -> Result<(), StoreError>;
    fn load_event(&mut self, event: usize) -> Result<LoadedEvent, StoreError>;
}

/// Event store backed by a directory holding `run.toml`, `kinematics{n}.csv` and
/// optionally `trackrefs{n}.csv`.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    run: RunDescriptor,
    events_per_file: usize,
    file_number: usize,
    kinematics: KinematicsTable,
    references: Option<TrackRefsTable>,
}

impl DirectoryStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_at(root, 0)
    }

    /// Opens the run in `root` with file set `number` loaded.
    pub fn open_at(root: impl AsRef<Path>, number: usize) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        let run = RunDescriptor::load(&root.join(RUN_DESCRIPTOR))?;
        let kinematics = read_kinematics(&root, number)?;
        let references = read_references(&root, number)?;

        let events_per_file = match run.events_per_file {
            Some(n) => n,
            None if number == 0 => kinematics.len().max(1),
            None => read_kinematics(&root, 0)?.len().max(1),
        };
        debug!(
            root = %root.display(),
            events = run.events,
            events_per_file,
            "Opened event directory."
        );

        Ok(Self {
            root,
            run,
            events_per_file,
            file_number: number,
            kinematics,
            references,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run(&self) -> RunDescriptor {
        self.run
    }
}

fn read_kinematics(root: &Path, number: usize) -> Result<KinematicsTable, StoreError> {
    let path = root.join(kinematics_file_name(number));
    KinematicsFile::read_from_path(&path).map_err(|source| StoreError::Kinematics {
        path: path.to_string_lossy().to_string(),
        source,
    })
}

fn read_references(root: &Path, number: usize) -> Result<Option<TrackRefsTable>, StoreError> {
    let path = root.join(trackrefs_file_name(number));
    if !path.exists() {
        warn!(
            "Track reference file {} not found; its events carry no track references.",
            path.display()
        );
        return Ok(None);
    }
    TrackRefsFile::read_from_path(&path)
        .map(Some)
        .map_err(|source| StoreError::TrackRefs {
            path: path.to_string_lossy().to_string(),
            source,
        })
}

impl EventStore for DirectoryStore {
    fn event_count(&self) -> usize {
        self.run.events
    }

    fn events_per_file(&self) -> usize {
        self.events_per_file
    }

    fn current_file(&self) -> usize {
        self.file_number
    }

    fn open_file(&mut self, number: usize) -> Result<(), StoreError> {
        self.kinematics = read_kinematics(&self.root, number)?;
        self.references = read_references(&self.root, number)?;
        self.file_number = number;
        debug!(file = number, "Switched to file set.");
        Ok(())
    }

    fn load_event(&mut self, event: usize) -> Result<LoadedEvent, StoreError> {
        let kinematics = self
            .kinematics
            .get(&event)
            .cloned()
            .ok_or(StoreError::EventNotFound(event))?;
        let references = self.references.as_ref().map(|table| table.tree(event));
        Ok(LoadedEvent {
            kinematics,
            references,
        })
    }
}

/// Event store holding every event in memory, split into virtual file sets.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    events: Vec<LoadedEvent>,
    events_per_file: usize,
    file_number: usize,
    opened_files: Vec<usize>,
}

impl MemoryStore {
    pub fn new(events: Vec<LoadedEvent>, events_per_file: usize) -> Self {
        Self {
            events,
            events_per_file: events_per_file.max(1),
            file_number: 0,
            opened_files: Vec::new(),
        }
    }

    /// File sets opened after construction, in order.
    pub fn opened_files(&self) -> &[usize] {
        &self.opened_files
    }
}

impl EventStore for MemoryStore {
    fn event_count(&self) -> usize {
        self.events.len()
    }

    fn events_per_file(&self) -> usize {
        self.events_per_file
    }

    fn current_file(&self) -> usize {
        self.file_number
    }

    fn open_file(&mut self, number: usize) -> Result<(), StoreError> {
        self.file_number = number;
        self.opened_files.push(number);
        Ok(())
    }

    fn load_event(&mut self, event: usize) -> Result<LoadedEvent, StoreError> {
        if event / self.events_per_file != self.file_number {
            return Err(StoreError::EventNotFound(event));
        }
        self.events
            .get(event)
            .cloned()
            .ok_or(StoreError::EventNotFound(event))
    }
}
