use crate::core::io::traits::EventFile;
use crate::core::models::reference::{Batch, Origin, ReferenceTree, TrackReference};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackRefsFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unrecognized column layout: expected an 'entry' or a 'track' column")]
    UnknownLayout,
    #[error("Event {event}: {message}")]
    Inconsistency { event: usize, message: String },
}

/// How the references of a file are organized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceLayout {
    /// One row group per stream entry, tagged with the subsystem branch name.
    Legacy,
    /// One row group per track, tagged with the normalized detector id.
    PerTrack,
}

/// Track references of every event in one file.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRefsTable {
    pub layout: ReferenceLayout,
    pub events: BTreeMap<usize, ReferenceTree>,
}

impl TrackRefsTable {
    pub fn new(layout: ReferenceLayout) -> Self {
        Self {
            layout,
            events: BTreeMap::new(),
        }
    }

    /// References of `event`; an event without rows has an empty tree in the file's layout.
    pub fn tree(&self, event: usize) -> ReferenceTree {
        self.events
            .get(&event)
            .cloned()
            .unwrap_or_else(|| match self.layout {
                ReferenceLayout::Legacy => ReferenceTree::Legacy(Vec::new()),
                ReferenceLayout::PerTrack => ReferenceTree::PerTrack(Vec::new()),
            })
    }
}

/// Largest entry or track index a row may carry.
pub const MAX_ROW_INDEX: usize = 1 << 24;

const LEGACY_COLUMNS: [&str; 11] = [
    "event", "entry", "branch", "label", "x", "y", "z", "px", "py", "pz", "time",
];
const TRACK_COLUMNS: [&str; 11] = [
    "event", "track", "detector", "label", "x", "y", "z", "px", "py", "pz", "time",
];

fn checked_index(event: usize, column: &str, index: usize) -> Result<usize, TrackRefsFileError> {
    if index > MAX_ROW_INDEX {
        return Err(TrackRefsFileError::Inconsistency {
            event,
            message: format!("{} index {} exceeds the limit of {}", column, index, MAX_ROW_INDEX),
        });
    }
    Ok(index)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LegacyRow {
    event: usize,
    entry: usize,
    branch: String,
    label: i32,
    x: f64,
    y: f64,
    z: f64,
    px: f64,
    py: f64,
    pz: f64,
    time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TrackRow {
    event: usize,
    track: usize,
    detector: i32,
    label: i32,
    x: f64,
    y: f64,
    z: f64,
    px: f64,
    py: f64,
    pz: f64,
    time: f64,
}

pub struct TrackRefsFile;

impl TrackRefsFile {
    fn read_legacy<R: Read>(
        reader: &mut csv::Reader<R>,
    ) -> Result<TrackRefsTable, TrackRefsFileError> {
        let mut entries: BTreeMap<usize, Vec<Batch>> = BTreeMap::new();
        for row in reader.deserialize::<LegacyRow>() {
            let row = row?;
            let origin: Origin =
                row.branch
                    .parse()
                    .map_err(|e| TrackRefsFileError::Inconsistency {
                        event: row.event,
                        message: format!("{}", e),
                    })?;
            let entry = checked_index(row.event, "entry", row.entry)?;
            let batches = entries.entry(row.event).or_default();
            if batches.len() <= entry {
                batches.resize_with(entry + 1, Batch::new);
            }
            batches[entry].push(
                TrackReference::new(row.label, origin)
                    .at(Point3::new(row.x, row.y, row.z))
                    .with_momentum(Vector3::new(row.px, row.py, row.pz))
                    .with_time(row.time),
            );
        }

        let mut table = TrackRefsTable::new(ReferenceLayout::Legacy);
        table.events = entries
            .into_iter()
            .map(|(event, batches)| (event, ReferenceTree::Legacy(batches)))
            .collect();
        Ok(table)
    }

    fn read_per_track<R: Read>(
        reader: &mut csv::Reader<R>,
    ) -> Result<TrackRefsTable, TrackRefsFileError> {
        let mut tracks: BTreeMap<usize, Vec<Vec<TrackReference>>> = BTreeMap::new();
        for row in reader.deserialize::<TrackRow>() {
            let row = row?;
            let origin = usize::try_from(i64::from(row.detector) + 1)
                .ok()
                .and_then(Origin::from_slot)
                .ok_or_else(|| TrackRefsFileError::Inconsistency {
                    event: row.event,
                    message: format!("unknown detector id {}", row.detector),
                })?;
            let track = checked_index(row.event, "track", row.track)?;
            let groups = tracks.entry(row.event).or_default();
            if groups.len() <= track {
                groups.resize_with(track + 1, Vec::new);
            }
            let mut reference = TrackReference::new(row.label, origin)
                .at(Point3::new(row.x, row.y, row.z))
                .with_momentum(Vector3::new(row.px, row.py, row.pz))
                .with_time(row.time);
            reference.detector_id = Some(row.detector);
            groups[track].push(reference);
        }

        let mut table = TrackRefsTable::new(ReferenceLayout::PerTrack);
        table.events = tracks
            .into_iter()
            .map(|(event, groups)| (event, ReferenceTree::PerTrack(groups)))
            .collect();
        Ok(table)
    }

    /// Writes the per-track groups of one event as rows of the per-track layout.
    ///
    /// The writer must not emit headers itself; [`EventFile::write_to`] writes the
    /// header row once for the whole table.
    pub fn write_groups<W: Write>(
        csv_writer: &mut csv::Writer<W>,
        event: usize,
        groups: &[Vec<TrackReference>],
    ) -> Result<(), TrackRefsFileError> {
        for (track, group) in groups.iter().enumerate() {
            for reference in group {
                csv_writer.serialize(TrackRow {
                    event,
                    track,
                    detector: reference
                        .detector_id
                        .unwrap_or_else(|| reference.origin.detector_id()),
                    label: reference.label,
                    x: reference.position.x,
                    y: reference.position.y,
                    z: reference.position.z,
                    px: reference.momentum.x,
                    py: reference.momentum.y,
                    pz: reference.momentum.z,
                    time: reference.time,
                })?;
            }
        }
        Ok(())
    }

    fn write_batches<W: Write>(
        csv_writer: &mut csv::Writer<W>,
        event: usize,
        batches: &[Batch],
    ) -> Result<(), TrackRefsFileError> {
        for (entry, batch) in batches.iter().enumerate() {
            for reference in batch.iter() {
                csv_writer.serialize(LegacyRow {
                    event,
                    entry,
                    branch: reference.origin.branch_name().to_string(),
                    label: reference.label,
                    x: reference.position.x,
                    y: reference.position.y,
                    z: reference.position.z,
                    px: reference.momentum.x,
                    py: reference.momentum.y,
                    pz: reference.momentum.z,
                    time: reference.time,
                })?;
            }
        }
        Ok(())
    }
}

impl EventFile for TrackRefsFile {
    type Table = TrackRefsTable;
    type Error = TrackRefsFileError;

    fn read_from(reader: impl Read) -> Result<Self::Table, Self::Error> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        if headers.iter().any(|h| h == "entry") {
            Self::read_legacy(&mut csv_reader)
        } else if headers.iter().any(|h| h == "track") {
            Self::read_per_track(&mut csv_reader)
        } else {
            Err(TrackRefsFileError::UnknownLayout)
        }
    }

    fn write_to(table: &Self::Table, writer: impl Write) -> Result<(), Self::Error> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        // The header is written up front so that a table without any reference
        // still records its layout.
        match table.layout {
            ReferenceLayout::Legacy => csv_writer.write_record(LEGACY_COLUMNS)?,
            ReferenceLayout::PerTrack => csv_writer.write_record(TRACK_COLUMNS)?,
        }
        for (&event, tree) in &table.events {
            match (table.layout, tree) {
                (ReferenceLayout::Legacy, ReferenceTree::Legacy(batches)) => {
                    Self::write_batches(&mut csv_writer, event, batches)?
                }
                (ReferenceLayout::PerTrack, ReferenceTree::PerTrack(groups)) => {
                    Self::write_groups(&mut csv_writer, event, groups)?
                }
                (layout, _) => {
                    return Err(TrackRefsFileError::Inconsistency {
                        event,
                        message: format!("tree does not match the {:?} layout of the table", layout),
                    });
                }
            }
        }
        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_HEADER: &str = "event,entry,branch,label,x,y,z,px,py,pz,time\n";
    const TRACK_HEADER: &str = "event,track,detector,label,x,y,z,px,py,pz,time\n";

    #[test]
    fn legacy_rows_become_batches_per_entry() {
        let body = format!(
            "{}0,0,TPC,3,1,2,3,0,0,1,1e-9\n\
             0,0,ITS,4,0.5,0.5,0.5,0,0,1,2e-9\n\
             0,2,TOF,0,0,0,370,0,0,1,3e-9\n\
             2,0,MUON,1,0,0,-900,0,0,-4,1e-8\n",
            LEGACY_HEADER
        );
        let table = TrackRefsFile::read_from(body.as_bytes()).unwrap();

        assert_eq!(table.layout, ReferenceLayout::Legacy);
        let ReferenceTree::Legacy(batches) = table.tree(0) else {
            panic!("expected a legacy tree");
        };
        assert_eq!(batches.len(), 3);
        let first: Vec<i32> = batches[0].iter().map(|r| r.label).collect();
        assert_eq!(first, vec![4, 3]);
        assert!(batches[1].is_empty());
        assert_eq!(batches[2].branch(Origin::Tof)[0].position.z, 370.0);
        assert_eq!(table.tree(1), ReferenceTree::Legacy(Vec::new()));
    }

    #[test]
    fn per_track_rows_keep_their_detector_id() {
        let body = format!(
            "{}0,0,-1,0,0,0,0,0,0,0,0\n0,2,1,2,0,0,0,0,0,0,0\n",
            TRACK_HEADER
        );
        let table = TrackRefsFile::read_from(body.as_bytes()).unwrap();

        assert_eq!(table.layout, ReferenceLayout::PerTrack);
        let ReferenceTree::PerTrack(groups) = table.tree(0) else {
            panic!("expected a per-track tree");
        };
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0][0].origin, Origin::Run);
        assert_eq!(groups[0][0].detector_id, Some(-1));
        assert!(groups[1].is_empty());
        assert_eq!(groups[2][0].origin, Origin::Tpc);
    }

    #[test]
    fn unknown_branch_is_an_inconsistency() {
        let body = format!("{}7,0,HMPID,1,0,0,0,0,0,0,0\n", LEGACY_HEADER);
        let err = TrackRefsFile::read_from(body.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            TrackRefsFileError::Inconsistency { event: 7, .. }
        ));
    }

    #[test]
    fn unknown_detector_id_is_an_inconsistency() {
        let body = format!("{}0,0,9,0,0,0,0,0,0,0,0\n", TRACK_HEADER);
        let err = TrackRefsFile::read_from(body.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("unknown detector id 9"));
    }

    #[test]
    fn headers_without_entry_or_track_are_rejected() {
        let err = TrackRefsFile::read_from("event,label\n0,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TrackRefsFileError::UnknownLayout));
    }

    #[test]
    fn legacy_table_survives_a_write_and_read() {
        let body = format!(
            "{}1,0,AliRun,0,0,0,0,0,0,0,0\n1,0,TRD,5,1.5,-2.5,250,0.1,0.2,0.3,4e-9\n1,1,FRAME,2,0,0,0,0,0,0,0\n",
            LEGACY_HEADER
        );
        let table = TrackRefsFile::read_from(body.as_bytes()).unwrap();
        let mut buffer = Vec::new();
        TrackRefsFile::write_to(&table, &mut buffer).unwrap();
        assert_eq!(TrackRefsFile::read_from(buffer.as_slice()).unwrap(), table);
    }

    #[test]
    fn mismatched_tree_layout_cannot_be_written() {
        let mut table = TrackRefsTable::new(ReferenceLayout::PerTrack);
        table.events.insert(0, ReferenceTree::Legacy(vec![Batch::new()]));
        let err = TrackRefsFile::write_to(&table, Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            TrackRefsFileError::Inconsistency { event: 0, .. }
        ));
    }

    #[test]
    fn oversized_entry_index_is_an_inconsistency() {
        for entry in ["10000000000", "18446744073709551615"] {
            let body = format!("{}3,{},TPC,1,0,0,0,0,0,0,0\n", LEGACY_HEADER, entry);
            let err = TrackRefsFile::read_from(body.as_bytes()).unwrap_err();
            assert!(matches!(
                err,
                TrackRefsFileError::Inconsistency { event: 3, .. }
            ));
        }
    }

    #[test]
    fn oversized_track_index_is_an_inconsistency() {
        let body = format!("{}0,18446744073709551615,1,0,0,0,0,0,0,0,0\n", TRACK_HEADER);
        let err = TrackRefsFile::read_from(body.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("track index"));
    }

    #[test]
    fn largest_detector_id_is_reported_as_unknown() {
        let body = format!("{}0,0,2147483647,0,0,0,0,0,0,0,0\n", TRACK_HEADER);
        let err = TrackRefsFile::read_from(body.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            TrackRefsFileError::Inconsistency { event: 0, .. }
        ));
    }

    #[test]
    fn per_track_table_without_references_keeps_its_layout() {
        let mut table = TrackRefsTable::new(ReferenceLayout::PerTrack);
        table
            .events
            .insert(0, ReferenceTree::PerTrack(vec![Vec::new(), Vec::new()]));
        let mut buffer = Vec::new();
        TrackRefsFile::write_to(&table, &mut buffer).unwrap();
        assert_eq!(buffer, TRACK_HEADER.as_bytes());

        let read = TrackRefsFile::read_from(buffer.as_slice()).unwrap();
        assert_eq!(read.layout, ReferenceLayout::PerTrack);
        assert_eq!(read.tree(0), ReferenceTree::PerTrack(Vec::new()));
    }

    #[test]
    fn empty_legacy_table_keeps_its_layout() {
        let table = TrackRefsTable::new(ReferenceLayout::Legacy);
        let mut buffer = Vec::new();
        TrackRefsFile::write_to(&table, &mut buffer).unwrap();
        assert_eq!(buffer, LEGACY_HEADER.as_bytes());
        assert_eq!(TrackRefsFile::read_from(buffer.as_slice()).unwrap(), table);
    }
}
