//! Realignment of legacy track-reference streams to the kinematics tree.
//!
//! In the legacy layout the references of one event are stored as a sequence of
//! batches, one per transported primary and its secondaries, with one branch per
//! subsystem. The batches are in transport order, which runs from the last primary
//! to the first, so the mapping from a track index to a batch has to be
//! rediscovered from the labels:
//!
//! 1. Secondaries: primaries are visited from `P-1` down to `0` while a forward
//!    cursor walks the stream. The secondaries of primary `ip` occupy the index
//!    range between its first daughter and the first daughter of the next lower
//!    primary that has secondaries. All of them are collected from the single batch
//!    where the first label of that range shows up.
//! 2. Primaries: primaries are visited from `0` up to `P-1` while a backward cursor
//!    walks the stream from its last batch, reading batches until the highest
//!    primary label seen reaches `ip`. The batch read last is examined again for
//!    the next primary.
//!
//! Every visited track index emits one group; the emitted count must match the
//! number of tracks.

use super::config::RealignConfig;
use super::cursor::{BackwardCursor, ForwardCursor};
use super::diagnostics::{Diagnostics, LabelOutOfRange};
use super::error::DataIntegrityError;
use super::progress::{Progress, ProgressReporter};
use super::stream::ReferenceStream;
use crate::core::models::reference::TrackReference;
use crate::core::models::stack::AncestryProvider;
use tracing::{debug, info, instrument, trace, warn};

/// Indices of the secondaries produced by one primary during transport.
///
/// The range is inclusive and may be empty (`first > last`) when the ancestry is
/// not ordered as transport appends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondaryRange {
    pub first: usize,
    pub last: usize,
}

impl SecondaryRange {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.first > self.last
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.last - self.first + 1
        }
    }

    #[inline]
    pub fn contains(&self, label: i64) -> bool {
        label >= self.first as i64 && label <= self.last as i64
    }
}

/// Secondary range of `primary`, or `None` when it produced no secondaries.
///
/// The upper bound is one below the first secondary of the closest lower-indexed
/// primary that has secondaries; without such a primary it is the last track.
pub fn secondary_range<A>(ancestry: &A, primary: usize) -> Option<SecondaryRange>
where
    A: AncestryProvider + ?Sized,
{
    let primaries = ancestry.primary_count();
    let is_secondary = |index: &usize| *index >= primaries;

    let first = ancestry.first_daughter(primary).filter(is_secondary)?;
    let last = (0..primary)
        .rev()
        .find_map(|previous| ancestry.first_daughter(previous).filter(is_secondary))
        .map_or(ancestry.track_count().saturating_sub(1), |next| next - 1);

    Some(SecondaryRange { first, last })
}

/// Outcome of the forward search for the batch holding a secondary range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Located {
    /// The batch at this position holds references of the range.
    Hits(usize),
    /// The batch at this position already belongs to another primary: the range
    /// left no references.
    Gap(usize),
    /// The stream ended before either was found.
    Exhausted,
}

/// Scans forward from `from` for the first batch that decides `range`; on a `Gap` the
/// cursor resumes at that batch, so the next primary starts its search there.
pub fn locate_secondaries<S>(
    stream: &S,
    from: ForwardCursor,
    primary: usize,
    range: SecondaryRange,
) -> Located
where
    S: ReferenceStream + ?Sized,
{
    let primary = primary as i64;
    for position in from.position()..stream.batch_count() {
        let Some(batch) = stream.batch(position) else {
            continue;
        };
        for reference in batch.iter() {
            let label = i64::from(reference.label);
            if range.contains(label) {
                return Located::Hits(position);
            }
            if label > range.last as i64 || label < primary {
                return Located::Gap(position);
            }
        }
    }
    Located::Exhausted
}

/// Track references regrouped by track index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Realignment {
    groups: Vec<Vec<TrackReference>>,
    fill_order: Vec<usize>,
    diagnostics: Diagnostics,
}

impl Realignment {
    pub fn track_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group(&self, track: usize) -> Option<&[TrackReference]> {
        self.groups.get(track).map(Vec::as_slice)
    }

    pub fn groups(&self) -> &[Vec<TrackReference>] {
        &self.groups
    }

    /// Track index of every emitted group, in emission order.
    pub fn fill_order(&self) -> &[usize] {
        &self.fill_order
    }

    pub fn reference_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn check_integrity(&self) -> Result<(), DataIntegrityError> {
        match self.diagnostics.integrity {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn into_groups(self) -> Vec<Vec<TrackReference>> {
        self.groups
    }
}

struct GroupSink {
    groups: Vec<Vec<TrackReference>>,
    fill_order: Vec<usize>,
}

impl GroupSink {
    fn with_tracks(tracks: usize) -> Self {
        Self {
            groups: vec![Vec::new(); tracks],
            fill_order: Vec::with_capacity(tracks),
        }
    }

    fn fill(&mut self, track: usize, references: Vec<TrackReference>) {
        self.fill_order.push(track);
        match self.groups.get_mut(track) {
            Some(group) => group.extend(references),
            None => warn!(
                track,
                tracks = self.groups.len(),
                "Group emitted for a track outside the kinematics tree; references dropped."
            ),
        }
    }

    fn fill_empty(&mut self, range: SecondaryRange) {
        if !range.is_empty() {
            for track in range.first..=range.last {
                self.fill(track, Vec::new());
            }
        }
    }
}

/// Regroups the references of a legacy stream by track index.
///
/// A group-count mismatch is logged and recorded in the returned diagnostics; the
/// output is handed back regardless.
#[instrument(skip_all, name = "realign_track_references")]
pub fn realign<A, S>(
    ancestry: &A,
    stream: &S,
    config: &RealignConfig,
    reporter: &ProgressReporter,
) -> Realignment
where
    A: AncestryProvider + ?Sized,
    S: ReferenceStream + ?Sized,
{
    let tracks = ancestry.track_count();
    debug!(
        tracks,
        primaries = ancestry.primary_count(),
        batches = stream.batch_count(),
        "Realigning track references."
    );

    let mut sink = GroupSink::with_tracks(tracks);
    let mut diagnostics = Diagnostics::default();

    reporter.phase("Secondaries", || {
        realign_secondaries(ancestry, stream, config, reporter, &mut sink, &mut diagnostics)
    });
    reporter.phase("Primaries", || {
        realign_primaries(ancestry, stream, reporter, &mut sink)
    });

    let emitted = sink.fill_order.len();
    if emitted != tracks {
        let err = DataIntegrityError {
            expected: tracks,
            actual: emitted,
        };
        warn!("{}", err);
        diagnostics.integrity = Some(err);
    }

    let realignment = Realignment {
        groups: sink.groups,
        fill_order: sink.fill_order,
        diagnostics,
    };
    info!(
        groups = emitted,
        references = realignment.reference_count(),
        out_of_range = realignment.diagnostics.out_of_range.len(),
        "Track references realigned."
    );
    realignment
}

fn realign_secondaries<A, S>(
    ancestry: &A,
    stream: &S,
    config: &RealignConfig,
    reporter: &ProgressReporter,
    sink: &mut GroupSink,
    diagnostics: &mut Diagnostics,
) where
    A: AncestryProvider + ?Sized,
    S: ReferenceStream + ?Sized,
{
    let primaries = ancestry.primary_count();
    reporter.report(Progress::TaskStart {
        total_steps: primaries as u64,
    });

    let mut cursor = ForwardCursor::start();
    for primary in (0..primaries).rev() {
        reporter.report(Progress::TaskIncrement);
        let Some(range) = secondary_range(ancestry, primary) else {
            continue;
        };

        let located = locate_secondaries(stream, cursor, primary, range);
        trace!(
            primary,
            first = range.first,
            last = range.last,
            cursor = cursor.position(),
            ?located,
            "Searched secondary range."
        );

        match located {
            Located::Hits(position) => {
                cursor = cursor.resume_at(position);
                collect_secondaries(stream, position, primary, range, config, sink, diagnostics);
            }
            Located::Gap(position) => {
                cursor = cursor.resume_at(position);
                sink.fill_empty(range);
            }
            Located::Exhausted => sink.fill_empty(range),
        }
    }

    reporter.report(Progress::TaskFinish);
}

fn collect_secondaries<S>(
    stream: &S,
    position: usize,
    primary: usize,
    range: SecondaryRange,
    config: &RealignConfig,
    sink: &mut GroupSink,
    diagnostics: &mut Diagnostics,
) where
    S: ReferenceStream + ?Sized,
{
    let Some(batch) = stream.batch(position) else {
        sink.fill_empty(range);
        return;
    };

    let mut scratch: Vec<Vec<TrackReference>> = vec![Vec::new(); range.len()];
    for reference in batch.iter() {
        let label = i64::from(reference.label);
        // The primary's own references are picked up by the backward scan.
        if label == primary as i64 {
            continue;
        }
        if !range.contains(label) {
            let warning = LabelOutOfRange {
                batch: position,
                label: reference.label,
                lower: range.first,
                upper: range.last,
            };
            if config.log_label_warnings {
                warn!("Track reference {}", warning);
            }
            diagnostics.out_of_range.push(warning);
            continue;
        }
        scratch[label as usize - range.first].push(reference.retagged());
    }

    for (offset, references) in scratch.into_iter().enumerate() {
        sink.fill(range.first + offset, references);
    }
}

fn realign_primaries<A, S>(
    ancestry: &A,
    stream: &S,
    reporter: &ProgressReporter,
    sink: &mut GroupSink,
) where
    A: AncestryProvider + ?Sized,
    S: ReferenceStream + ?Sized,
{
    let primaries = ancestry.primary_count();
    reporter.report(Progress::TaskStart {
        total_steps: primaries as u64,
    });

    let mut cursor = BackwardCursor::at_end(stream.batch_count());
    for primary in 0..primaries {
        let target = primary as i64;
        let mut highest_primary_label: i64 = -1;
        let mut references = Vec::new();

        while highest_primary_label < target {
            let Some(position) = cursor.retreat() else {
                break;
            };
            let Some(batch) = stream.batch(position) else {
                continue;
            };
            for reference in batch.iter() {
                let label = i64::from(reference.label);
                if label < primaries as i64 && label > highest_primary_label {
                    highest_primary_label = label;
                }
                if label == target {
                    references.push(reference.retagged());
                }
            }
        }
        cursor.step_forward();

        trace!(
            primary,
            references = references.len(),
            cursor = ?cursor.position(),
            "Collected primary references."
        );
        sink.fill(primary, references);
        reporter.report(Progress::TaskIncrement);
    }

    reporter.report(Progress::TaskFinish);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::particle::Particle;
    use crate::core::models::reference::{Batch, Origin};
    use crate::core::models::stack::KinematicsStack;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn stack(tracks: usize, primaries: usize, first_daughters: &[(usize, usize)]) -> KinematicsStack {
        let mut particles: Vec<Particle> = (0..tracks).map(|_| Particle::new(211)).collect();
        for &(primary, first) in first_daughters {
            particles[primary].first_daughter = Some(first);
            particles[primary].last_daughter = Some(first);
        }
        KinematicsStack::new(particles, primaries).unwrap()
    }

    fn batch(labels: &[i32]) -> Batch {
        labels
            .iter()
            .map(|&label| TrackReference::new(label, Origin::Tpc))
            .collect()
    }

    fn run(stack: &KinematicsStack, stream: &[Batch]) -> Realignment {
        realign(
            stack,
            stream,
            &RealignConfig::default(),
            &ProgressReporter::new(),
        )
    }

    fn labels(realignment: &Realignment, track: usize) -> Vec<i32> {
        realignment
            .group(track)
            .unwrap()
            .iter()
            .map(|r| r.label)
            .collect()
    }

    fn assert_groups_are_consistent(realignment: &Realignment) {
        for (track, group) in realignment.groups().iter().enumerate() {
            for reference in group {
                assert_eq!(reference.label as usize, track);
                assert_eq!(reference.detector_id, Some(reference.origin.detector_id()));
            }
        }
    }

    mod ranges {
        use super::*;

        #[test]
        fn last_primary_falls_back_to_the_last_track() {
            let stack = stack(10, 4, &[(3, 4)]);
            assert_eq!(
                secondary_range(&stack, 3),
                Some(SecondaryRange { first: 4, last: 9 })
            );
        }

        #[test]
        fn upper_bound_comes_from_the_closest_lower_primary_with_secondaries() {
            let stack = stack(10, 3, &[(2, 3), (0, 8)]);
            assert_eq!(
                secondary_range(&stack, 2),
                Some(SecondaryRange { first: 3, last: 7 })
            );
            assert_eq!(
                secondary_range(&stack, 0),
                Some(SecondaryRange { first: 8, last: 9 })
            );
        }

        #[test]
        fn primaries_without_secondaries_have_no_range() {
            // Track 1 points at another primary, track 0 has no daughters at all.
            let stack = stack(6, 3, &[(1, 2), (2, 3)]);
            assert_eq!(secondary_range(&stack, 0), None);
            assert_eq!(secondary_range(&stack, 1), None);
            assert_eq!(
                secondary_range(&stack, 2),
                Some(SecondaryRange { first: 3, last: 5 })
            );
        }

        #[test]
        fn unordered_ancestry_gives_an_empty_range() {
            let stack = stack(6, 2, &[(1, 4), (0, 2)]);
            let range = secondary_range(&stack, 1).unwrap();
            assert!(range.is_empty());
            assert_eq!(range.len(), 0);
        }
    }

    mod scenarios {
        use super::*;

        #[test]
        fn transport_ordered_batch_is_split_by_label() {
            let stack = stack(10, 4, &[(3, 4)]);
            let stream = vec![batch(&[3, 4, 4, 5, 6, 6, 9, 9, 0])];

            let out = run(&stack, &stream);

            assert_eq!(labels(&out, 0), vec![0]);
            assert!(labels(&out, 1).is_empty());
            assert!(labels(&out, 2).is_empty());
            assert_eq!(labels(&out, 3), vec![3]);
            assert_eq!(labels(&out, 4), vec![4, 4]);
            assert_eq!(labels(&out, 5), vec![5]);
            assert_eq!(labels(&out, 6), vec![6, 6]);
            assert!(labels(&out, 7).is_empty());
            assert!(labels(&out, 8).is_empty());
            assert_eq!(labels(&out, 9), vec![9, 9]);
            assert_eq!(out.reference_count(), 9);
            assert!(out
                .groups()
                .iter()
                .flatten()
                .all(|r| r.detector_id == Some(1)));
            assert_groups_are_consistent(&out);
            assert_eq!(out.check_integrity(), Ok(()));
            assert_eq!(out.fill_order(), &[4, 5, 6, 7, 8, 9, 0, 1, 2, 3]);

            // Label 0 sits in the secondaries' batch but outside their range.
            assert_eq!(
                out.diagnostics().out_of_range,
                vec![LabelOutOfRange {
                    batch: 0,
                    label: 0,
                    lower: 4,
                    upper: 9
                }]
            );
        }

        #[test]
        fn label_below_the_primary_ends_the_secondary_search_as_a_gap() {
            let stack = stack(10, 4, &[(3, 4)]);
            let stream = vec![batch(&[0, 4, 4, 5, 6, 6, 9, 9, 3])];

            assert_eq!(
                locate_secondaries(
                    &stream,
                    ForwardCursor::start(),
                    3,
                    SecondaryRange { first: 4, last: 9 }
                ),
                Located::Gap(0)
            );

            let out = run(&stack, &stream);
            for track in 4..10 {
                assert!(labels(&out, track).is_empty());
            }
            assert_eq!(labels(&out, 0), vec![0]);
            assert_eq!(labels(&out, 3), vec![3]);
            assert_eq!(out.check_integrity(), Ok(()));
        }

        #[test]
        fn gap_in_acceptance_leaves_empty_groups_and_keeps_the_boundary_batch() {
            let stack = stack(10, 3, &[(2, 3), (1, 5), (0, 8)]);
            let stream = vec![batch(&[2, 3, 4]), batch(&[1]), batch(&[9, 0, 8])];

            assert_eq!(
                locate_secondaries(
                    &stream,
                    ForwardCursor::start(),
                    1,
                    SecondaryRange { first: 5, last: 7 }
                ),
                Located::Gap(2)
            );

            let out = run(&stack, &stream);
            for track in 5..=7 {
                assert!(labels(&out, track).is_empty());
            }
            // The next primary resumes on the boundary batch and finds its secondaries there.
            assert_eq!(labels(&out, 8), vec![8]);
            assert_eq!(labels(&out, 9), vec![9]);
            assert_eq!(labels(&out, 3), vec![3]);
            assert_eq!(labels(&out, 4), vec![4]);
            for primary in 0..3 {
                assert_eq!(labels(&out, primary), vec![primary as i32]);
            }
            assert_eq!(out.reference_count(), 7);
            assert!(out.diagnostics().is_clean());
            assert_groups_are_consistent(&out);
        }

        #[test]
        fn primaries_only_input_is_a_plain_partition_by_label() {
            let stack = stack(3, 3, &[]);
            let stream = vec![batch(&[2, 2]), batch(&[1, 0, 1])];

            let out = run(&stack, &stream);

            let mut expected: BTreeMap<usize, usize> = BTreeMap::new();
            for reference in stream.iter().flat_map(Batch::iter) {
                *expected.entry(reference.label as usize).or_default() += 1;
            }
            for (track, count) in expected {
                assert_eq!(out.group(track).unwrap().len(), count);
            }
            assert_eq!(out.fill_order(), &[0, 1, 2]);
            assert_eq!(out.reference_count(), 5);
            assert_groups_are_consistent(&out);
        }

        #[test]
        fn references_keep_their_subsystem_as_detector_id() {
            let stack = stack(3, 1, &[(0, 1)]);
            let mut entry = Batch::new();
            entry.push(TrackReference::new(1, Origin::Muon));
            entry.push(TrackReference::new(0, Origin::Run));
            entry.push(TrackReference::new(2, Origin::Its));
            let out = run(&stack, &[entry]);

            assert_eq!(out.group(0).unwrap()[0].detector_id, Some(-1));
            assert_eq!(out.group(1).unwrap()[0].detector_id, Some(5));
            assert_eq!(out.group(2).unwrap()[0].detector_id, Some(0));
        }
    }

    mod boundaries {
        use super::*;

        #[test]
        fn first_batch_is_examined_again_after_the_backward_scan_runs_out() {
            let stack = stack(3, 3, &[]);
            let stream = vec![batch(&[2, 1]), batch(&[0])];

            let out = run(&stack, &stream);

            assert_eq!(labels(&out, 0), vec![0]);
            assert_eq!(labels(&out, 1), vec![1]);
            assert_eq!(labels(&out, 2), vec![2]);
        }

        #[test]
        fn single_batch_serves_every_primary_exactly_once() {
            let stack = stack(3, 3, &[]);
            let stream = vec![batch(&[2, 1, 0, 0, 1, 2])];

            let out = run(&stack, &stream);

            for primary in 0..3 {
                assert_eq!(labels(&out, primary), vec![primary as i32; 2]);
            }
            assert_eq!(out.reference_count(), 6);
        }

        #[test]
        fn empty_stream_yields_one_empty_group_per_track() {
            let stack = stack(5, 2, &[(1, 2), (0, 4)]);
            let out = run(&stack, &[]);

            assert_eq!(out.track_count(), 5);
            assert_eq!(out.reference_count(), 0);
            assert_eq!(out.check_integrity(), Ok(()));
        }

        #[test]
        fn empty_event_is_trivially_aligned() {
            let stack = stack(0, 0, &[]);
            let out = run(&stack, &[batch(&[])]);

            assert_eq!(out.track_count(), 0);
            assert!(out.fill_order().is_empty());
            assert!(out.diagnostics().is_clean());
        }
    }

    mod integrity {
        use super::*;

        #[test]
        fn orphaned_secondary_is_reported_as_a_group_count_mismatch() {
            // Secondary 2 lies in no primary's range.
            let stack = stack(6, 2, &[(1, 3), (0, 5)]);
            let stream = vec![batch(&[1, 3, 4]), batch(&[0, 5])];

            let out = run(&stack, &stream);

            assert_eq!(
                out.check_integrity(),
                Err(DataIntegrityError {
                    expected: 6,
                    actual: 5
                })
            );
            // The output is still complete for the tracks that were visited.
            assert_eq!(out.track_count(), 6);
            assert_eq!(labels(&out, 3), vec![3]);
            assert_eq!(labels(&out, 5), vec![5]);
            assert_eq!(labels(&out, 0), vec![0]);
            assert_eq!(labels(&out, 1), vec![1]);
        }

        #[test]
        fn label_warnings_are_collected_even_when_not_logged() {
            let stack = stack(4, 1, &[(0, 1)]);
            let config = RealignConfig {
                log_label_warnings: false,
                ..RealignConfig::default()
            };
            let stream = vec![batch(&[1, 7, -3, 2])];

            let out = realign(&stack, &stream, &config, &ProgressReporter::new());

            let warned: Vec<i32> = out
                .diagnostics()
                .out_of_range
                .iter()
                .map(|w| w.label)
                .collect();
            assert_eq!(warned, vec![7, -3]);
            assert_eq!(labels(&out, 1), vec![1]);
            assert_eq!(labels(&out, 2), vec![2]);
        }
    }

    #[test]
    fn progress_reports_both_phases() {
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|p| {
            events.lock().unwrap().push(p);
        }));
        let stack = stack(4, 2, &[(1, 2)]);
        realign(&stack, &[batch(&[1, 2, 3])], &RealignConfig::default(), &reporter);
        drop(reporter);

        let events = events.into_inner().unwrap();
        let phases: Vec<&str> = events
            .iter()
            .filter_map(|p| match p {
                Progress::PhaseStart { name } => Some(*name),
                _ => None,
            })
            .collect();
        assert_eq!(phases, vec!["Secondaries", "Primaries"]);
        let increments = events
            .iter()
            .filter(|p| matches!(p, Progress::TaskIncrement))
            .count();
        assert_eq!(increments, 4);
    }
}
