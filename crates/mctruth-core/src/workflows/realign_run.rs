use super::event_handler::{EventError, EventSummary, McEventHandler};
use crate::core::io::store::EventStore;
use crate::core::io::trackrefs::{ReferenceLayout, TrackRefsTable};
use crate::core::models::reference::{ReferenceTree, TrackReference};
use crate::engine::progress::{Progress, ProgressReporter};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Per-track references of one event together with its bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct RealignedEvent {
    pub summary: EventSummary,
    pub groups: Vec<Vec<TrackReference>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RealignResult {
    pub events: Vec<RealignedEvent>,
}

impl RealignResult {
    pub fn reference_count(&self) -> usize {
        self.events.iter().map(|e| e.summary.references).sum()
    }

    /// Events whose group count did not match their kinematics tree.
    pub fn integrity_failures(&self) -> impl Iterator<Item = &EventSummary> {
        self.events
            .iter()
            .map(|e| &e.summary)
            .filter(|s| s.integrity.is_some())
    }

    pub fn merge(&mut self, other: RealignResult) {
        self.events.extend(other.events);
        self.events.sort_by_key(|e| e.summary.event);
    }

    /// Converts the result into a per-track reference table.
    pub fn to_table(&self) -> TrackRefsTable {
        let events: BTreeMap<_, _> = self
            .events
            .iter()
            .map(|e| (e.summary.event, ReferenceTree::PerTrack(e.groups.clone())))
            .collect();
        TrackRefsTable {
            layout: ReferenceLayout::PerTrack,
            events,
        }
    }
}

/// Loads `events` through `handler` and collects their per-track references.
///
/// Events are visited in the given order; the handler switches file sets as needed.
/// Events without any track references are skipped with a warning.
#[instrument(skip_all, name = "realign_workflow")]
pub fn run<S, I>(handler: &mut McEventHandler<S>, events: I) -> Result<RealignResult, EventError>
where
    S: EventStore,
    I: IntoIterator<Item = usize>,
{
    let mut result = RealignResult::default();

    for event in events {
        handler.get_event(event)?;
        let Some(summary) = handler.summary() else {
            continue;
        };
        match handler.finish_event() {
            Some(groups) => result.events.push(RealignedEvent { summary, groups }),
            None => warn!(event, "Event skipped: no track references to realign."),
        }
    }

    info!(
        events = result.events.len(),
        references = result.reference_count(),
        mismatches = result.integrity_failures().count(),
        "Realignment run finished."
    );
    Ok(result)
}

/// Same as [`run`] over every event of the handler's run.
pub fn run_all<S: EventStore>(handler: &mut McEventHandler<S>) -> Result<RealignResult, EventError> {
    let events = handler.event_count();
    run(handler, 0..events)
}

/// Events of file set `file` in a run of `events` events stored `events_per_file` per set.
pub fn events_of_file(file: usize, events: usize, events_per_file: usize) -> std::ops::Range<usize> {
    let per_file = events_per_file.max(1);
    let start = (file * per_file).min(events);
    let end = ((file + 1) * per_file).min(events);
    start..end
}

/// Number of file sets needed for `events` events.
pub fn file_count(events: usize, events_per_file: usize) -> usize {
    events.div_ceil(events_per_file.max(1))
}

/// Like [`run`], reporting one task step per event to `reporter`.
pub fn run_with_progress<S: EventStore>(
    handler: &mut McEventHandler<S>,
    events: &[usize],
    reporter: &ProgressReporter,
) -> Result<RealignResult, EventError> {
    reporter.report(Progress::TaskStart {
        total_steps: events.len() as u64,
    });
    let mut result = RealignResult::default();
    for &event in events {
        result.merge(run(handler, [event])?);
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    Ok(result)
}
