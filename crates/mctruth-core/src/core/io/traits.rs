use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Defines the interface for reading and writing per-run event tables.
///
/// A table holds one record per event number; implementors handle the layout
/// of the file and the validation of its rows.
pub trait EventFile {
    /// The in-memory form of the table.
    type Table;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a table from a reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails, the rows are inconsistent, or I/O
    /// operations encounter issues.
    fn read_from(reader: impl Read) -> Result<Self::Table, Self::Error>;

    /// Writes a table to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(table: &Self::Table, writer: impl Write) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self::Table, Self::Error> {
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file))
    }

    fn write_to_path<P: AsRef<Path>>(table: &Self::Table, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(table, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
