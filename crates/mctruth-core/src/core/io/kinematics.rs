use crate::core::io::traits::EventFile;
use crate::core::models::particle::Particle;
use crate::core::models::stack::{AncestryProvider, KinematicsStack, StackError};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Kinematics trees of every event in one file, keyed by event number.
pub type KinematicsTable = BTreeMap<usize, KinematicsStack>;

#[derive(Debug, Error)]
pub enum KinematicsFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Event {event}: {message}")]
    Inconsistency { event: usize, message: String },
    #[error("Event {event}: {source}")]
    Stack {
        event: usize,
        #[source]
        source: StackError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ParticleRow {
    event: usize,
    index: usize,
    primary: bool,
    pdg: i32,
    mother: i64,
    first_daughter: i64,
    last_daughter: i64,
    vx: f64,
    vy: f64,
    vz: f64,
    px: f64,
    py: f64,
    pz: f64,
}

fn decode_link(event: usize, value: i64) -> Result<Option<usize>, KinematicsFileError> {
    match value {
        -1 => Ok(None),
        v if v >= 0 => Ok(Some(v as usize)),
        v => Err(KinematicsFileError::Inconsistency {
            event,
            message: format!("negative particle index {}", v),
        }),
    }
}

fn encode_link(link: Option<usize>) -> i64 {
    link.map_or(-1, |index| index as i64)
}

#[derive(Default)]
struct EventRows {
    particles: Vec<Particle>,
    primaries: usize,
    secondary_seen: bool,
}

pub struct KinematicsFile;

impl EventFile for KinematicsFile {
    type Table = KinematicsTable;
    type Error = KinematicsFileError;

    fn read_from(reader: impl Read) -> Result<Self::Table, Self::Error> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut events: BTreeMap<usize, EventRows> = BTreeMap::new();

        for row in csv_reader.deserialize::<ParticleRow>() {
            let row = row?;
            let rows = events.entry(row.event).or_default();

            if row.index != rows.particles.len() {
                return Err(KinematicsFileError::Inconsistency {
                    event: row.event,
                    message: format!(
                        "expected particle {} but found particle {}",
                        rows.particles.len(),
                        row.index
                    ),
                });
            }
            if row.primary {
                if rows.secondary_seen {
                    return Err(KinematicsFileError::Inconsistency {
                        event: row.event,
                        message: format!("primary particle {} follows a secondary", row.index),
                    });
                }
                rows.primaries += 1;
            } else {
                rows.secondary_seen = true;
            }

            let particle = Particle {
                pdg_code: row.pdg,
                mother: decode_link(row.event, row.mother)?,
                first_daughter: decode_link(row.event, row.first_daughter)?,
                last_daughter: decode_link(row.event, row.last_daughter)?,
                vertex: Point3::new(row.vx, row.vy, row.vz),
                momentum: Vector3::new(row.px, row.py, row.pz),
            };
            rows.particles.push(particle);
        }

        events
            .into_iter()
            .map(|(event, rows)| {
                KinematicsStack::new(rows.particles, rows.primaries)
                    .map(|stack| (event, stack))
                    .map_err(|source| KinematicsFileError::Stack { event, source })
            })
            .collect()
    }

    fn write_to(table: &Self::Table, writer: impl Write) -> Result<(), Self::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for (&event, stack) in table {
            for (index, particle) in stack.particles().iter().enumerate() {
                csv_writer.serialize(ParticleRow {
                    event,
                    index,
                    primary: stack.is_primary(index),
                    pdg: particle.pdg_code,
                    mother: encode_link(particle.mother),
                    first_daughter: encode_link(particle.first_daughter),
                    last_daughter: encode_link(particle.last_daughter),
                    vx: particle.vertex.x,
                    vy: particle.vertex.y,
                    vz: particle.vertex.z,
                    px: particle.momentum.x,
                    py: particle.momentum.y,
                    pz: particle.momentum.z,
                })?;
            }
        }
        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "event,index,primary,pdg,mother,first_daughter,last_daughter,vx,vy,vz,px,py,pz\n";

    fn read(body: &str) -> Result<KinematicsTable, KinematicsFileError> {
        KinematicsFile::read_from(format!("{}{}", HEADER, body).as_bytes())
    }

    #[test]
    fn reads_events_with_primaries_and_secondaries() {
        let table = read(
            "0,0,true,211,-1,2,3,0,0,0,0.1,0.2,1.0\n\
             0,1,true,-211,-1,-1,-1,0,0,0,0.3,0.1,2.0\n\
             0,2,false,22,0,-1,-1,1,1,1,0.05,0,0\n\
             0,3,false,22,0,-1,-1,1,1,1,0.05,0,0\n\
             1,0,true,2212,-1,-1,-1,0,0,0,0,0,7000\n",
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        let first = &table[&0];
        assert_eq!(first.track_count(), 4);
        assert_eq!(first.primary_count(), 2);
        assert_eq!(first.first_daughter(0), Some(2));
        assert_eq!(first.particle(2).unwrap().mother, Some(0));
        assert_eq!(first.particle(1).unwrap().pdg_code, -211);
        assert_eq!(table[&1].track_count(), 1);
    }

    #[test]
    fn rejects_gaps_in_particle_indices() {
        let err = read("0,0,true,211,-1,-1,-1,0,0,0,0,0,0\n0,2,false,22,-1,-1,-1,0,0,0,0,0,0\n")
            .unwrap_err();
        assert!(matches!(
            err,
            KinematicsFileError::Inconsistency { event: 0, .. }
        ));
    }

    #[test]
    fn rejects_primaries_after_secondaries() {
        let err = read("3,0,false,22,-1,-1,-1,0,0,0,0,0,0\n3,1,true,211,-1,-1,-1,0,0,0,0,0,0\n")
            .unwrap_err();
        assert!(err.to_string().contains("follows a secondary"));
    }

    #[test]
    fn rejects_links_outside_the_event() {
        let err = read("0,0,true,211,-1,4,4,0,0,0,0,0,0\n").unwrap_err();
        assert!(matches!(
            err,
            KinematicsFileError::Stack {
                event: 0,
                source: StackError::DanglingLink { target: 4, .. }
            }
        ));
    }

    #[test]
    fn rejects_negative_indices_other_than_the_sentinel() {
        let err = read("0,0,true,211,-2,-1,-1,0,0,0,0,0,0\n").unwrap_err();
        assert!(err.to_string().contains("negative particle index -2"));
    }

    #[test]
    fn written_table_reads_back_identically() {
        let table = read(
            "5,0,true,211,-1,1,1,0,0,0,0.5,0.5,3\n\
             5,1,false,11,0,-1,-1,0.1,0.2,0.3,0.01,0.02,0.03\n",
        )
        .unwrap();
        let mut buffer = Vec::new();
        KinematicsFile::write_to(&table, &mut buffer).unwrap();
        let reread = KinematicsFile::read_from(buffer.as_slice()).unwrap();
        assert_eq!(reread, table);
    }
}
