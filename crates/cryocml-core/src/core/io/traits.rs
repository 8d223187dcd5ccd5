use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Defines the interface for reading and writing density-map file formats.
///
/// A density file holds a dense 3-D grid of samples; a stack of 2-D images is a
/// grid whose third dimension counts the images. Implementors handle the binary
/// layout of one specific format.
pub trait DensityFile {
    /// The type of metadata carried alongside the samples.
    type Metadata;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a grid and its metadata from a reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed, the sample encoding is not
    /// supported, or the reader ends early.
    fn read_from(reader: &mut impl Read) -> Result<(DensityGrid, Self::Metadata), Self::Error>;

    /// Writes a grid to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(grid: &DensityGrid, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads a grid from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<(DensityGrid, Self::Metadata), Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes a grid to a file path, creating or truncating the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(grid: &DensityGrid, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(grid, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Samples of a density file, `x` fastest, then `y`, then `z`.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    pub dims: [usize; 3],
    pub data: Vec<f64>,
}
