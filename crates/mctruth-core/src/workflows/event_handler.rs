use crate::core::io::store::{DirectoryStore, EventStore, LoadedEvent, StoreError};
use crate::core::models::particle::Particle;
use crate::core::models::reference::{ReferenceTree, TrackReference};
use crate::core::models::stack::{AncestryProvider, KinematicsStack};
use crate::engine::config::{IntegrityPolicy, RealignConfig};
use crate::engine::diagnostics::Diagnostics;
use crate::engine::error::{DataIntegrityError, EngineError};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::realign::realign;
use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Event {event} is out of range (the run has {events} events)")]
    EventOutOfRange { event: usize, events: usize },

    #[error("Track {track} is out of range (the event has {tracks} tracks)")]
    TrackOutOfRange { track: usize, tracks: usize },

    #[error("No event is loaded")]
    NoEvent,
}

/// Bookkeeping of one loaded event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSummary {
    pub event: usize,
    pub tracks: usize,
    pub primaries: usize,
    pub references: usize,
    /// Whether the references were stored in the legacy layout and realigned.
    pub realigned: bool,
    pub out_of_range_labels: usize,
    pub integrity: Option<DataIntegrityError>,
}

#[derive(Debug)]
struct LoadedState {
    event: usize,
    kinematics: KinematicsStack,
    references: Option<Vec<Vec<TrackReference>>>,
    diagnostics: Option<Diagnostics>,
}

/// Gives access to the Monte-Carlo truth of a run, event by event.
///
/// Kinematics and track references come from an [`EventStore`]. References stored
/// in the legacy layout are realigned to the kinematics tree when the event is
/// loaded, so that every track index maps to its own group of references.
pub struct McEventHandler<'a, S: EventStore> {
    store: S,
    config: RealignConfig,
    reporter: ProgressReporter<'a>,
    event_count: usize,
    cursor: Option<usize>,
    state: Option<LoadedState>,
}

impl<'a, S: EventStore> McEventHandler<'a, S> {
    pub fn new(store: S, config: RealignConfig) -> Self {
        let mut handler = Self {
            store,
            config,
            reporter: ProgressReporter::new(),
            event_count: 0,
            cursor: None,
            state: None,
        };
        handler.init();
        handler
    }

    pub fn with_reporter(mut self, reporter: ProgressReporter<'a>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Rewinds to before the first event and drops any loaded event.
    pub fn init(&mut self) {
        self.event_count = self.store.event_count();
        self.cursor = None;
        self.state = None;
        info!(events = self.event_count, "Number of events in this run.");
    }

    /// Loads the event after the last one begun. Returns `false` past the last event.
    pub fn begin_event(&mut self) -> Result<bool, EventError> {
        let next = self.cursor.map_or(0, |e| e + 1);
        self.cursor = Some(next);
        if next >= self.event_count {
            warn!(event = next, "Event number out of range.");
            return Ok(false);
        }
        self.get_event(next)?;
        Ok(true)
    }

    /// Loads event `event`, switching file sets when the event lives in another one.
    #[instrument(skip(self), name = "get_event")]
    pub fn get_event(&mut self, event: usize) -> Result<(), EventError> {
        if event >= self.event_count {
            return Err(EventError::EventOutOfRange {
                event,
                events: self.event_count,
            });
        }
        self.state = None;

        let file = event / self.store.events_per_file().max(1);
        if file != self.store.current_file() {
            self.store.open_file(file)?;
        }

        let LoadedEvent {
            kinematics,
            references,
        } = self.store.load_event(event)?;
        self.reporter.report(Progress::EventStart { event });

        let (references, diagnostics) = match references {
            Some(ReferenceTree::Legacy(batches)) => {
                let realignment = realign(&kinematics, &batches, &self.config, &self.reporter);
                if self.config.integrity_policy == IntegrityPolicy::Fail {
                    realignment.check_integrity().map_err(EngineError::from)?;
                }
                let diagnostics = realignment.diagnostics().clone();
                (Some(realignment.into_groups()), Some(diagnostics))
            }
            Some(ReferenceTree::PerTrack(mut groups)) => {
                let tracks = kinematics.track_count();
                if groups.len() > tracks {
                    warn!(
                        event,
                        groups = groups.len(),
                        tracks,
                        "Per-track references extend beyond the kinematics tree; extra groups dropped."
                    );
                }
                groups.resize_with(tracks, Vec::new);
                (Some(groups), None)
            }
            None => {
                warn!(event, "No track reference information available.");
                self.reporter.report(Progress::Message(format!(
                    "Event {} carries no track references",
                    event
                )));
                (None, None)
            }
        };

        info!(
            event,
            particles = kinematics.track_count(),
            primaries = kinematics.primary_count(),
            "Event loaded."
        );
        self.cursor = Some(event);
        self.state = Some(LoadedState {
            event,
            kinematics,
            references,
            diagnostics,
        });
        self.reporter.report(Progress::EventFinish);
        Ok(())
    }

    /// Releases the loaded event, returning its per-track references.
    pub fn finish_event(&mut self) -> Option<Vec<Vec<TrackReference>>> {
        self.state.take().and_then(|state| state.references)
    }

    pub fn event_count(&self) -> usize {
        self.event_count
    }

    pub fn current_event(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.event)
    }

    pub fn kinematics(&self) -> Option<&KinematicsStack> {
        self.state.as_ref().map(|s| &s.kinematics)
    }

    pub fn track_count(&self) -> usize {
        self.kinematics().map_or(0, |k| k.track_count())
    }

    pub fn primary_count(&self) -> usize {
        self.kinematics().map_or(0, |k| k.primary_count())
    }

    /// Per-track references of the loaded event, if the run has any.
    pub fn references(&self) -> Option<&[Vec<TrackReference>]> {
        self.state
            .as_ref()
            .and_then(|s| s.references.as_deref())
    }

    /// Diagnostics of the realignment of the loaded event, if it needed one.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        self.state.as_ref().and_then(|s| s.diagnostics.as_ref())
    }

    /// Particle `track` and its references (`None` when the run has no references).
    pub fn particle_and_references(
        &self,
        track: usize,
    ) -> Result<(&Particle, Option<&[TrackReference]>), EventError> {
        let state = self.state.as_ref().ok_or(EventError::NoEvent)?;
        let particle = state
            .kinematics
            .particle(track)
            .ok_or(EventError::TrackOutOfRange {
                track,
                tracks: state.kinematics.track_count(),
            })?;
        let references = state
            .references
            .as_ref()
            .map(|groups| groups[track].as_slice());
        Ok((particle, references))
    }

    /// First track at or after `from` that left at least one reference.
    pub fn find_next_with_references(&self, from: usize) -> Option<usize> {
        let groups = self.references()?;
        (from..groups.len()).find(|&track| !groups[track].is_empty())
    }

    pub fn summary(&self) -> Option<EventSummary> {
        let state = self.state.as_ref()?;
        Some(EventSummary {
            event: state.event,
            tracks: state.kinematics.track_count(),
            primaries: state.kinematics.primary_count(),
            references: state
                .references
                .as_ref()
                .map_or(0, |groups| groups.iter().map(Vec::len).sum()),
            realigned: state.diagnostics.is_some(),
            out_of_range_labels: state
                .diagnostics
                .as_ref()
                .map_or(0, |d| d.out_of_range.len()),
            integrity: state.diagnostics.as_ref().and_then(|d| d.integrity),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl McEventHandler<'_, DirectoryStore> {
    /// Reconnects the handler to the run stored in `path`.
    pub fn notify(&mut self, path: impl AsRef<Path>) -> Result<(), EventError> {
        info!(path = %path.as_ref().display(), "Switching event directory.");
        self.store = DirectoryStore::open(path)?;
        self.init();
        Ok(())
    }
}
