use super::error::DataIntegrityError;
use std::fmt;

/// A reference found in the batch of a secondary range whose label lies outside that range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelOutOfRange {
    /// Position of the batch in the reference stream.
    pub batch: usize,
    pub label: i32,
    pub lower: usize,
    pub upper: usize,
}

impl fmt::Display for LabelOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "track reference label {} in batch {} is outside [{}, {}]",
            self.label, self.batch, self.lower, self.upper
        )
    }
}

/// Everything a realignment pass reported without aborting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub out_of_range: Vec<LabelOutOfRange>,
    pub integrity: Option<DataIntegrityError>,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        self.out_of_range.is_empty() && self.integrity.is_none()
    }
}
